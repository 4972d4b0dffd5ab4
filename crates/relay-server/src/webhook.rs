use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use relay_sync::MirrorOutbound;
use relay_types::layout::{ButtonLayout, ButtonStyle, RawButton, RawRow};
use relay_types::models::BroadcastDestination;

const ACTION_ROW: u8 = 1;
const BUTTON: u8 = 2;

/// Edits mirrors through each destination's webhook.
pub struct WebhookOutbound {
    client: reqwest::Client,
    api_base: String,
}

impl WebhookOutbound {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    fn message_url(&self, destination: &BroadcastDestination, mirror_message_id: &str) -> String {
        format!(
            "{}/webhooks/{}/{}/messages/{}",
            self.api_base, destination.webhook_id, destination.webhook_token, mirror_message_id
        )
    }
}

#[async_trait]
impl MirrorOutbound for WebhookOutbound {
    async fn replace_layout(
        &self,
        destination: &BroadcastDestination,
        mirror_message_id: &str,
        layout: &ButtonLayout,
    ) -> anyhow::Result<()> {
        let body = json!({ "components": components(&layout.to_raw()) });

        self.client
            .patch(self.message_url(destination, mirror_message_id))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        debug!(
            "Webhook {} edited message {}",
            destination.webhook_id, mirror_message_id
        );
        Ok(())
    }
}

/// Wire form of a set of button rows.
pub fn components(rows: &[RawRow]) -> Vec<Value> {
    rows.iter()
        .map(|row| {
            json!({
                "type": ACTION_ROW,
                "components": row.components.iter().map(button).collect::<Vec<_>>(),
            })
        })
        .collect()
}

fn button(raw: &RawButton) -> Value {
    let mut value = json!({
        "type": BUTTON,
        "style": style_code(raw.style),
        "disabled": raw.disabled,
    });

    if let Some(label) = &raw.label {
        value["label"] = json!(label);
    }
    if let Some(emoji) = &raw.emoji {
        value["emoji"] = partial_emoji(emoji);
    }
    // Link buttons carry a url and no custom id.
    match (&raw.url, raw.style) {
        (Some(url), ButtonStyle::Link) => value["url"] = json!(url),
        _ => {
            if let Some(custom_id) = &raw.custom_id {
                value["custom_id"] = json!(custom_id);
            }
        }
    }
    value
}

/// Reaction keys are either a unicode emoji (possibly percent-encoded) or a
/// custom emoji identifier: `name:id`, `a:name:id` or `<a:name:id>`.
fn partial_emoji(key: &str) -> Value {
    let bare = key
        .strip_prefix('<')
        .and_then(|k| k.strip_suffix('>'))
        .unwrap_or(key);

    if let Some((head, id)) = bare.rsplit_once(':') {
        if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
            let (animated, name) = match head.split_once(':') {
                Some(("a", name)) => (true, name),
                Some(("", name)) => (false, name),
                _ => (false, head),
            };
            return json!({ "name": name, "id": id, "animated": animated });
        }
    }

    let name = urlencoding::decode(key)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| key.to_string());
    json!({ "name": name })
}

fn style_code(style: ButtonStyle) -> u8 {
    match style {
        ButtonStyle::Primary => 1,
        ButtonStyle::Secondary => 2,
        ButtonStyle::Success => 3,
        ButtonStyle::Danger => 4,
        ButtonStyle::Link => 5,
    }
}
