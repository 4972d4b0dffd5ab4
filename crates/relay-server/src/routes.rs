use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, info};

use relay_db::Database;
use relay_sync::{ReactionRelay, RelayReport};
use relay_types::api::{
    OriginUserResponse, ReactionEventResponse, ReactionStatus, RecordMirrorRequest,
    RegisterDestinationRequest, UpdateDestinationRequest,
};
use relay_types::events::ReactionEvent;
use relay_types::models::{BroadcastDestination, MessageMirror, MessageRef};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub relay: ReactionRelay,
    pub ingest_token: String,
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// -- Reactions --

/// Always answers 200: the report tells the host what happened.
///
/// The relay runs on its own task so a dropped connection cannot stop it
/// between the vote write and the fan-out.
pub async fn handle_reaction(
    State(state): State<AppState>,
    Json(event): Json<ReactionEvent>,
) -> Json<ReactionEventResponse> {
    let unchanged = event.current_layout.clone();

    let task = tokio::spawn(async move { state.relay.handle_reaction_event(event).await });
    let report = match task.await {
        Ok(report) => report,
        Err(e) => {
            error!("Reaction task failed: {}", e);
            RelayReport::Failed(e.to_string())
        }
    };

    let response = match report {
        RelayReport::Applied { layout, outcomes } => {
            let failed = outcomes.iter().filter(|o| !o.is_success()).count();
            ReactionEventResponse {
                status: ReactionStatus::Applied,
                reason: None,
                components: layout.to_raw(),
                delivered: outcomes.len() - failed,
                failed,
            }
        }
        RelayReport::Ignored(reason) => ReactionEventResponse {
            status: ReactionStatus::Ignored,
            reason: Some(reason.as_str().to_string()),
            components: unchanged,
            delivered: 0,
            failed: 0,
        },
        RelayReport::Failed(reason) => ReactionEventResponse {
            status: ReactionStatus::Failed,
            reason: Some(reason),
            components: unchanged,
            delivered: 0,
            failed: 0,
        },
    };

    Json(response)
}

pub async fn origin_user(
    State(state): State<AppState>,
    Path((channel_id, message_id)): Path<(String, String)>,
) -> Result<Json<OriginUserResponse>, StatusCode> {
    let message = MessageRef { channel_id, message_id };

    let user_id = state
        .relay
        .store()
        .resolve_origin_user(&message)
        .await
        .map_err(|e| {
            error!("Origin lookup for {} failed: {}", message.message_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(OriginUserResponse { user_id }))
}

// -- Destinations --

pub async fn register_destination(
    State(state): State<AppState>,
    Json(req): Json<RegisterDestinationRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let required = [
        &req.channel_id,
        &req.network_type,
        &req.guild_id,
        &req.webhook_id,
        &req.webhook_token,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let destination = BroadcastDestination {
        channel_id: req.channel_id,
        network_type: req.network_type,
        guild_id: req.guild_id,
        webhook_id: req.webhook_id,
        webhook_token: req.webhook_token,
        important_role_id: None,
        auto_ban_level: 0,
    };

    state.db.save_destination(&destination).map_err(|e| {
        error!("Could not save destination {}: {:#}", destination.channel_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!(
        "Channel {} joined network '{}'",
        destination.channel_id, destination.network_type
    );
    Ok((StatusCode::CREATED, Json(destination)))
}

pub async fn update_destination(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(req): Json<UpdateDestinationRequest>,
) -> Result<StatusCode, StatusCode> {
    let role = req.important_role_id.as_deref().filter(|r| !r.is_empty());

    let updated = state
        .db
        .update_destination_settings(&channel_id, role, req.auto_ban_level)
        .map_err(|e| {
            error!("Could not update destination {}: {:#}", channel_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if updated { Ok(StatusCode::NO_CONTENT) } else { Err(StatusCode::NOT_FOUND) }
}

pub async fn delete_destination(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let deleted = state.db.delete_destination(&channel_id).map_err(|e| {
        error!("Could not delete destination {}: {:#}", channel_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }
    info!("Channel {} left its network", channel_id);
    Ok(StatusCode::NO_CONTENT)
}

// -- Mirrors --

pub async fn record_mirror(
    State(state): State<AppState>,
    Json(req): Json<RecordMirrorRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.channel_id.is_empty() || req.mirror_message_id.is_empty() || req.origin_message_id.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mirror = MessageMirror {
        origin_channel_id: req.origin_channel_id,
        origin_message_id: req.origin_message_id,
        channel_id: req.channel_id,
        mirror_message_id: req.mirror_message_id,
        guild_id: req.guild_id,
        timestamp: req.timestamp.unwrap_or_else(Utc::now),
        author_id: req.author_id,
        author_name: req.author_name,
        origin_kind: req.origin_kind,
    };

    state.db.save_mirror(&mirror).map_err(|e| {
        error!("Could not record mirror {}: {:#}", mirror.mirror_message_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((StatusCode::CREATED, Json(mirror)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_sync::{MirrorOutbound, RelaySettings, SqliteStore};
    use relay_types::layout::{ButtonLayout, RawButton, RawRow};
    use relay_types::models::ReactionToggle;
    use std::sync::Mutex;
    use std::time::Duration;

    struct NoopOutbound;

    #[async_trait]
    impl MirrorOutbound for NoopOutbound {
        async fn replace_layout(&self, _: &BroadcastDestination, _: &str, _: &ButtonLayout) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn state() -> AppState {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(SqliteStore::new(db.clone()));
        let relay = ReactionRelay::new(store, Arc::new(NoopOutbound), RelaySettings::default());
        Arc::new(AppStateInner {
            db,
            relay,
            ingest_token: "s3cret".into(),
        })
    }

    fn register(channel_id: &str) -> RegisterDestinationRequest {
        RegisterDestinationRequest {
            channel_id: channel_id.into(),
            network_type: "chat".into(),
            guild_id: format!("g-{}", channel_id),
            webhook_id: format!("w-{}", channel_id),
            webhook_token: "token".into(),
        }
    }

    fn mirror(channel_id: &str, message_id: &str) -> RecordMirrorRequest {
        RecordMirrorRequest {
            origin_channel_id: "c1".into(),
            origin_message_id: "m1".into(),
            channel_id: channel_id.into(),
            mirror_message_id: message_id.into(),
            guild_id: format!("g-{}", channel_id),
            timestamp: None,
            author_id: "U9".into(),
            author_name: "Author".into(),
            origin_kind: 0,
        }
    }

    async fn seed(state: &AppState) {
        for (channel, message) in [("c1", "m1"), ("c2", "m2")] {
            register_destination(State(state.clone()), Json(register(channel)))
                .await
                .unwrap();
            record_mirror(State(state.clone()), Json(mirror(channel, message)))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn reaction_response_carries_new_layout() {
        let state = state();
        seed(&state).await;
        let event = ReactionEvent {
            channel_id: "c2".into(),
            message_id: "m2".into(),
            acting_user_id: "U1".into(),
            actor_is_bot: false,
            reaction_key: "👍".into(),
            current_layout: vec![],
        };

        let Json(response) = handle_reaction(State(state), Json(event)).await;

        assert!(matches!(response.status, ReactionStatus::Applied));
        assert_eq!(response.delivered, 1);
        assert_eq!(response.failed, 0);
        assert_eq!(
            response.components,
            vec![RawRow {
                components: vec![RawButton {
                    custom_id: Some("👍".into()),
                    emoji: Some("👍".into()),
                    label: Some("1".into()),
                    ..Default::default()
                }],
            }]
        );
    }

    /// Outbound that answers only after `delay`.
    struct SlowOutbound {
        delay: Duration,
        edited: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MirrorOutbound for SlowOutbound {
        async fn replace_layout(&self, _: &BroadcastDestination, mirror_message_id: &str, _: &ButtonLayout) -> anyhow::Result<()> {
            tokio::time::sleep(self.delay).await;
            self.edited.lock().unwrap().push(mirror_message_id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn dropped_request_still_completes_the_sync() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let outbound = Arc::new(SlowOutbound {
            delay: Duration::from_millis(100),
            edited: Mutex::new(Vec::new()),
        });
        let relay = ReactionRelay::new(
            Arc::new(SqliteStore::new(db.clone())),
            outbound.clone(),
            RelaySettings::default(),
        );
        let state = Arc::new(AppStateInner {
            db: db.clone(),
            relay,
            ingest_token: "s3cret".into(),
        });
        seed(&state).await;
        let event = ReactionEvent {
            channel_id: "c2".into(),
            message_id: "m2".into(),
            acting_user_id: "U1".into(),
            actor_is_bot: false,
            reaction_key: "👍".into(),
            current_layout: vec![],
        };

        // The client goes away long before the fan-out answers.
        let cut_short = tokio::time::timeout(
            Duration::from_millis(20),
            handle_reaction(State(state), Json(event)),
        )
        .await;
        assert!(cut_short.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let toggle = ReactionToggle {
            message_id: "m1".into(),
            user_id: "U1".into(),
            reaction_key: "👍".into(),
        };
        assert!(db.has_toggle(&toggle).unwrap());
        assert_eq!(*outbound.edited.lock().unwrap(), ["m1"]);
    }

    #[tokio::test]
    async fn ignored_reaction_echoes_layout() {
        let state = state();
        let layout = vec![RawRow::default()];
        let event = ReactionEvent {
            channel_id: "nowhere".into(),
            message_id: "m1".into(),
            acting_user_id: "U1".into(),
            actor_is_bot: false,
            reaction_key: "👍".into(),
            current_layout: layout.clone(),
        };

        let Json(response) = handle_reaction(State(state), Json(event)).await;

        assert!(matches!(response.status, ReactionStatus::Ignored));
        assert_eq!(response.reason.as_deref(), Some("channel_not_relayed"));
        assert_eq!(response.components, layout);
    }

    #[tokio::test]
    async fn origin_user_resolves_from_any_mirror() {
        let state = state();
        seed(&state).await;

        let Json(found) = origin_user(State(state.clone()), Path(("c2".into(), "m2".into())))
            .await
            .unwrap();
        assert_eq!(found.user_id, "U9");

        let missing = origin_user(State(state), Path(("c2".into(), "nope".into()))).await;
        assert_eq!(missing.err(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn destination_lifecycle() {
        let state = state();

        let mut blank = register("c1");
        blank.webhook_token = " ".into();
        assert_eq!(
            register_destination(State(state.clone()), Json(blank)).await.err(),
            Some(StatusCode::BAD_REQUEST)
        );

        register_destination(State(state.clone()), Json(register("c1")))
            .await
            .unwrap();

        let update = UpdateDestinationRequest {
            important_role_id: Some("R1".into()),
            auto_ban_level: 2,
        };
        let status = update_destination(State(state.clone()), Path("c1".into()), Json(update)).await;
        assert_eq!(status, Ok(StatusCode::NO_CONTENT));
        let saved = state.db.find_destination("c1").unwrap().unwrap();
        assert_eq!(saved.important_role_id.as_deref(), Some("R1"));
        assert_eq!(saved.auto_ban_level, 2);

        // An empty role clears it.
        let clear = UpdateDestinationRequest {
            important_role_id: Some(String::new()),
            auto_ban_level: 2,
        };
        update_destination(State(state.clone()), Path("c1".into()), Json(clear))
            .await
            .unwrap();
        assert_eq!(state.db.find_destination("c1").unwrap().unwrap().important_role_id, None);

        assert_eq!(
            delete_destination(State(state.clone()), Path("c1".into())).await,
            Ok(StatusCode::NO_CONTENT)
        );
        assert_eq!(
            delete_destination(State(state), Path("c1".into())).await,
            Err(StatusCode::NOT_FOUND)
        );
    }
}
