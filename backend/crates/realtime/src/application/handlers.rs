//! Built-in message handlers

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::application::router::{HandlerContext, MessageHandler};
use crate::domain::message::{OutboundMessage, kinds};
use crate::error::RouterError;

/// Payload for messages whose `data` is ignored
#[derive(Debug, Default, Deserialize)]
pub struct NoPayload {}

/// `ping` -> `pong { timestamp }`
pub struct PingHandler;

#[async_trait]
impl MessageHandler for PingHandler {
    type Payload = NoPayload;

    async fn handle(&self, ctx: &HandlerContext<'_>, _: NoPayload) -> Result<(), RouterError> {
        ctx.connection
            .send(&OutboundMessage::bare(kinds::PONG, ctx.now_ms()));
        Ok(())
    }
}

/// `request_analytics` -> `analytics_update` to the requester
pub struct AnalyticsRequestHandler;

#[async_trait]
impl MessageHandler for AnalyticsRequestHandler {
    type Payload = NoPayload;

    async fn handle(&self, ctx: &HandlerContext<'_>, _: NoPayload) -> Result<(), RouterError> {
        let analytics = ctx.services.snapshots.analytics().await?;
        ctx.reply(kinds::ANALYTICS_UPDATE, analytics);
        Ok(())
    }
}

/// `request_system_status` -> `system_status` with live connection counts
pub struct SystemStatusRequestHandler;

#[async_trait]
impl MessageHandler for SystemStatusRequestHandler {
    type Payload = NoPayload;

    async fn handle(&self, ctx: &HandlerContext<'_>, _: NoPayload) -> Result<(), RouterError> {
        let registry = &ctx.services.registry;
        let connections = json!({
            "total": registry.len(),
            "byRole": registry.counts_by_role(),
        });

        let status = match ctx.services.snapshots.system_status().await? {
            Value::Object(mut map) => {
                map.insert("connections".to_string(), connections);
                Value::Object(map)
            }
            other => json!({ "status": other, "connections": connections }),
        };
        ctx.reply(kinds::SYSTEM_STATUS, status);
        Ok(())
    }
}

/// `user_activity` -> admin audience, tagged with sender and server time.
/// The sender never receives its own event.
pub struct UserActivityHandler;

#[async_trait]
impl MessageHandler for UserActivityHandler {
    type Payload = Map<String, Value>;

    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        mut data: Map<String, Value>,
    ) -> Result<(), RouterError> {
        let now = ctx.now_ms();
        data.insert("userId".to_string(), Value::String(ctx.principal.id.clone()));
        data.insert("timestamp".to_string(), Value::from(now));

        let message = OutboundMessage::new(kinds::USER_ACTIVITY, Value::Object(data), now);
        ctx.services
            .broadcaster
            .to_admins(&message, Some(&ctx.principal.id));
        Ok(())
    }
}

/// `job_update` / `content_update` -> admin audience, then `<kind>_success` to the sender
pub struct RecordUpdateHandler {
    kind: &'static str,
}

impl RecordUpdateHandler {
    pub fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl MessageHandler for RecordUpdateHandler {
    type Payload = Map<String, Value>;

    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        mut data: Map<String, Value>,
    ) -> Result<(), RouterError> {
        let now = ctx.now_ms();
        data.insert("updatedBy".to_string(), Value::String(ctx.principal.id.clone()));
        data.insert("timestamp".to_string(), Value::from(now));
        let data = Value::Object(data);

        let sent = ctx
            .services
            .broadcaster
            .to_admins(&OutboundMessage::new(self.kind, data.clone(), now), None);
        tracing::debug!(kind = self.kind, principal_id = %ctx.principal.id, sent, "Record update broadcast");

        ctx.reply(kinds::success(self.kind), data);
        Ok(())
    }
}
