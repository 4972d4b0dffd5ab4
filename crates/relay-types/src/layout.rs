//! Button layouts attached to relayed messages.
//!
//! A layout is at most [`MAX_ROWS`] rows of at most [`MAX_BUTTONS_PER_ROW`]
//! buttons. The first row may be a pinned row (reply navigation) that the
//! vote logic never touches; every other row holds count-bearing vote buttons.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_ROWS: usize = 5;
pub const MAX_BUTTONS_PER_ROW: usize = 5;

/// Custom id of the first button of a pinned reply row.
pub const REPLY_MARKER: &str = "reply";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    #[default]
    Secondary,
    Success,
    Danger,
    Link,
}

/// Button as handed over by the host. Nothing is validated yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawButton {
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub style: ButtonStyle,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub components: Vec<RawButton>,
}

/// Row excluded from vote reflow. Its buttons are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedRow {
    pub buttons: Vec<RawButton>,
}

/// A reaction tally button. The label shown to users is the count.
///
/// Vote buttons are never links. A url on an incoming vote button is not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteButton {
    pub key: String,
    pub emoji: String,
    pub count: u32,
    pub style: ButtonStyle,
    pub disabled: bool,
}

impl VoteButton {
    /// Fresh button for a reaction nobody had used on the message yet.
    pub fn first_vote(key: &str) -> Self {
        Self {
            key: key.to_string(),
            emoji: key.to_string(),
            count: 1,
            style: ButtonStyle::Secondary,
            disabled: false,
        }
    }

    pub fn label(&self) -> String {
        self.count.to_string()
    }

    fn to_raw(&self) -> RawButton {
        RawButton {
            custom_id: Some(self.key.clone()),
            emoji: Some(self.emoji.clone()),
            label: Some(self.label()),
            style: self.style,
            url: None,
            disabled: self.disabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Pinned(PinnedRow),
    Votes(Vec<VoteButton>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    MissingId,
    MissingEmoji,
    MissingLabel,
    NonNumericLabel(String),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId => write!(f, "no custom id"),
            Self::MissingEmoji => write!(f, "no emoji"),
            Self::MissingLabel => write!(f, "no label"),
            Self::NonNumericLabel(label) => write!(f, "label '{}' is not a count", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("malformed button at row {row}, position {index}: {reason}")]
    MalformedLayout {
        row: usize,
        index: usize,
        reason: MalformedReason,
    },

    #[error("layout exceeds 5x5, {dropped} button(s) over capacity")]
    CapacityExceeded { dropped: usize },
}

/// Result of a lenient parse: the usable layout plus everything that was dropped.
#[derive(Debug, Clone)]
pub struct ParsedLayout {
    pub layout: ButtonLayout,
    pub skipped: Vec<LayoutError>,
}

/// Result of reflowing vote buttons into rows.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub layout: ButtonLayout,
    /// Vote buttons that did not fit under the row ceiling.
    pub dropped: usize,
}

/// Validated layout. Only constructible through [`ButtonLayout::parse`],
/// [`ButtonLayout::parse_lenient`] and [`ButtonLayout::assemble`], all of
/// which keep the pinned row first and the 5x5 ceiling intact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonLayout {
    rows: Vec<Row>,
}

impl ButtonLayout {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Strict parse: the first malformed vote button or capacity violation fails
    /// the whole layout.
    pub fn parse(raw: &[RawRow]) -> Result<Self, LayoutError> {
        if raw.len() > MAX_ROWS {
            let dropped = raw[MAX_ROWS..].iter().map(|r| r.components.len()).sum();
            return Err(LayoutError::CapacityExceeded { dropped });
        }
        if let Some(row) = raw.iter().find(|r| r.components.len() > MAX_BUTTONS_PER_ROW) {
            return Err(LayoutError::CapacityExceeded {
                dropped: row.components.len() - MAX_BUTTONS_PER_ROW,
            });
        }

        let (pinned, vote_rows) = split_pinned(raw);
        let mut rows = Vec::with_capacity(raw.len());
        if let Some(pinned) = pinned {
            rows.push(Row::Pinned(pinned));
        }

        let offset = usize::from(!rows.is_empty());
        for (r, raw_row) in vote_rows.iter().enumerate() {
            let mut buttons = Vec::with_capacity(raw_row.components.len());
            for (index, raw_button) in raw_row.components.iter().enumerate() {
                let button = parse_vote_button(raw_button).map_err(|reason| {
                    LayoutError::MalformedLayout { row: r + offset, index, reason }
                })?;
                if button.count > 0 {
                    buttons.push(button);
                }
            }
            if !buttons.is_empty() {
                rows.push(Row::Votes(buttons));
            }
        }

        Ok(Self { rows })
    }

    /// Lenient parse: malformed vote buttons are skipped and reported, and the
    /// remaining ones are reflowed under the row ceiling.
    pub fn parse_lenient(raw: &[RawRow]) -> ParsedLayout {
        let mut skipped = Vec::new();
        let (mut pinned, vote_rows) = split_pinned(raw);

        if let Some(row) = pinned.as_mut() {
            if row.buttons.len() > MAX_BUTTONS_PER_ROW {
                skipped.push(LayoutError::CapacityExceeded {
                    dropped: row.buttons.len() - MAX_BUTTONS_PER_ROW,
                });
                row.buttons.truncate(MAX_BUTTONS_PER_ROW);
            }
        }

        let offset = usize::from(pinned.is_some());
        let mut buttons = Vec::new();
        for (r, raw_row) in vote_rows.iter().enumerate() {
            for (index, raw_button) in raw_row.components.iter().enumerate() {
                match parse_vote_button(raw_button) {
                    Ok(button) if button.count > 0 => buttons.push(button),
                    Ok(_) => {}
                    Err(reason) => skipped.push(LayoutError::MalformedLayout {
                        row: r + offset,
                        index,
                        reason,
                    }),
                }
            }
        }

        let assembled = Self::assemble(pinned, buttons);
        if assembled.dropped > 0 {
            skipped.push(LayoutError::CapacityExceeded { dropped: assembled.dropped });
        }

        ParsedLayout { layout: assembled.layout, skipped }
    }

    /// Reflow vote buttons into rows of [`MAX_BUTTONS_PER_ROW`] behind the
    /// optional pinned row. Buttons past the row ceiling are dropped.
    pub fn assemble(pinned: Option<PinnedRow>, mut buttons: Vec<VoteButton>) -> Assembled {
        let reserved = usize::from(pinned.is_some());
        let max_buttons = (MAX_ROWS - reserved) * MAX_BUTTONS_PER_ROW;
        let dropped = buttons.len().saturating_sub(max_buttons);

        let mut rows = Vec::with_capacity(MAX_ROWS);
        if let Some(pinned) = pinned {
            rows.push(Row::Pinned(pinned));
        }

        buttons.truncate(max_buttons);
        let mut iter = buttons.into_iter().peekable();
        while iter.peek().is_some() {
            rows.push(Row::Votes(iter.by_ref().take(MAX_BUTTONS_PER_ROW).collect()));
        }

        Assembled { layout: Self { rows }, dropped }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn pinned(&self) -> Option<&PinnedRow> {
        match self.rows.first() {
            Some(Row::Pinned(row)) => Some(row),
            _ => None,
        }
    }

    pub fn has_pinned(&self) -> bool {
        self.pinned().is_some()
    }

    /// All vote buttons in display order, flattened across rows.
    pub fn vote_buttons(&self) -> impl Iterator<Item = &VoteButton> {
        self.rows.iter().flat_map(|row| match row {
            Row::Votes(buttons) => buttons.as_slice(),
            Row::Pinned(_) => &[][..],
        })
    }

    pub fn count_for(&self, key: &str) -> Option<u32> {
        self.vote_buttons().find(|b| b.key == key).map(|b| b.count)
    }

    /// Rows that can still be added before the ceiling, with one row reserved
    /// when a pinned row is present.
    pub fn capacity_remaining(&self) -> usize {
        let reserved = usize::from(self.has_pinned());
        let vote_rows = self.rows.len() - reserved;
        (MAX_ROWS - reserved).saturating_sub(vote_rows)
    }

    pub fn to_raw(&self) -> Vec<RawRow> {
        self.rows
            .iter()
            .map(|row| match row {
                Row::Pinned(pinned) => RawRow { components: pinned.buttons.clone() },
                Row::Votes(buttons) => RawRow {
                    components: buttons.iter().map(VoteButton::to_raw).collect(),
                },
            })
            .collect()
    }
}

fn split_pinned(raw: &[RawRow]) -> (Option<PinnedRow>, &[RawRow]) {
    let is_reply_row = raw
        .first()
        .and_then(|row| row.components.first())
        .and_then(|button| button.custom_id.as_deref())
        == Some(REPLY_MARKER);

    if is_reply_row {
        let pinned = PinnedRow { buttons: raw[0].components.clone() };
        (Some(pinned), &raw[1..])
    } else {
        (None, raw)
    }
}

fn parse_vote_button(raw: &RawButton) -> Result<VoteButton, MalformedReason> {
    let key = raw.custom_id.as_ref().ok_or(MalformedReason::MissingId)?;
    let emoji = raw.emoji.as_ref().ok_or(MalformedReason::MissingEmoji)?;
    let label = raw.label.as_ref().ok_or(MalformedReason::MissingLabel)?;
    let count = label
        .trim()
        .parse::<u32>()
        .map_err(|_| MalformedReason::NonNumericLabel(label.clone()))?;

    Ok(VoteButton {
        key: key.clone(),
        emoji: emoji.clone(),
        count,
        style: raw.style,
        disabled: raw.disabled,
    })
}
