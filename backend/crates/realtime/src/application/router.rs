//! Message Router
//!
//! Registration table from message type to a typed handler. Payloads are
//! decoded per handler; unknown types, bad payloads, handler errors and
//! handler panics all stop at [`MessageRouter::dispatch`].

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use kernel::clock::SharedClock;
use kernel::principal::Principal;
use security::{AlertKind, AlertLog, NewAlert, Severity};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::application::broadcaster::Broadcaster;
use crate::application::handlers;
use crate::application::registry::ConnectionRegistry;
use crate::domain::connection::ConnectionHandle;
use crate::domain::message::{InboundMessage, OutboundMessage, kinds};
use crate::domain::snapshot::SnapshotSource;
use crate::error::RouterError;

/// Shared dependencies handed to every handler
#[derive(Clone)]
pub struct Services {
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Arc<Broadcaster>,
    pub snapshots: Arc<dyn SnapshotSource>,
    pub alerts: Arc<AlertLog>,
    pub clock: SharedClock,
}

/// Per-dispatch view: who sent the message and where replies go
pub struct HandlerContext<'a> {
    pub principal: &'a Principal,
    pub connection: &'a ConnectionHandle,
    pub services: &'a Services,
}

impl HandlerContext<'_> {
    pub fn now_ms(&self) -> i64 {
        self.services.clock.now_ms()
    }

    /// Send to the requesting connection only
    pub fn reply(&self, kind: impl Into<std::borrow::Cow<'static, str>>, data: Value) -> bool {
        self.connection
            .send(&OutboundMessage::new(kind, data, self.now_ms()))
    }
}

#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Decoded from the envelope's `data`; a missing `data` decodes from `{}`
    type Payload: DeserializeOwned + Send + 'static;

    async fn handle(&self, ctx: &HandlerContext<'_>, payload: Self::Payload) -> Result<(), RouterError>;
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn call(&self, ctx: &HandlerContext<'_>, kind: &str, data: Value) -> Result<(), RouterError>;
}

#[async_trait]
impl<H: MessageHandler> ErasedHandler for H {
    async fn call(&self, ctx: &HandlerContext<'_>, kind: &str, data: Value) -> Result<(), RouterError> {
        let data = if data.is_null() {
            Value::Object(Map::new())
        } else {
            data
        };
        let payload = serde_json::from_value::<H::Payload>(data).map_err(|source| {
            RouterError::InvalidPayload {
                kind: kind.to_string(),
                source,
            }
        })?;
        self.handle(ctx, payload).await
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Handled,
    UnknownType,
    Failed(RouterError),
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled)
    }
}

pub struct MessageRouter {
    handlers: HashMap<&'static str, Arc<dyn ErasedHandler>>,
    services: Services,
}

impl MessageRouter {
    /// Router with no handlers
    pub fn new(services: Services) -> Self {
        Self {
            handlers: HashMap::new(),
            services,
        }
    }

    /// Router with the built-in message types
    pub fn with_builtin_handlers(services: Services) -> Self {
        let mut router = Self::new(services);
        router.register(kinds::PING, handlers::PingHandler);
        router.register(kinds::REQUEST_ANALYTICS, handlers::AnalyticsRequestHandler);
        router.register(kinds::REQUEST_SYSTEM_STATUS, handlers::SystemStatusRequestHandler);
        router.register(kinds::USER_ACTIVITY, handlers::UserActivityHandler);
        router.register(kinds::JOB_UPDATE, handlers::RecordUpdateHandler::new(kinds::JOB_UPDATE));
        router.register(
            kinds::CONTENT_UPDATE,
            handlers::RecordUpdateHandler::new(kinds::CONTENT_UPDATE),
        );
        router
    }

    /// Add or replace the handler for `kind`
    pub fn register<H: MessageHandler>(&mut self, kind: &'static str, handler: H) -> &mut Self {
        if self.handlers.insert(kind, Arc::new(handler)).is_some() {
            tracing::debug!(kind, "Message handler replaced");
        }
        self
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub async fn dispatch(
        &self,
        principal: &Principal,
        connection: &ConnectionHandle,
        message: InboundMessage,
    ) -> DispatchOutcome {
        let Some(handler) = self.handlers.get(message.kind.as_str()) else {
            tracing::warn!(
                principal_id = %principal.id,
                kind = %message.kind,
                "Unknown message type dropped"
            );
            return DispatchOutcome::UnknownType;
        };

        tracing::debug!(principal_id = %principal.id, kind = %message.kind, "Dispatching message");

        let ctx = HandlerContext {
            principal,
            connection,
            services: &self.services,
        };

        let result = AssertUnwindSafe(handler.call(&ctx, &message.kind, message.data))
            .catch_unwind()
            .await;

        let err = match result {
            Ok(Ok(())) => return DispatchOutcome::Handled,
            Ok(Err(err)) => err,
            Err(_) => RouterError::HandlerPanicked,
        };
        self.report(principal, &message.kind, &err);
        DispatchOutcome::Failed(err)
    }

    fn report(&self, principal: &Principal, kind: &str, err: &RouterError) {
        if !err.is_fault() {
            tracing::warn!(principal_id = %principal.id, kind, error = %err, "Message rejected");
            return;
        }

        tracing::error!(principal_id = %principal.id, kind, error = %err, "Message handler fault");
        self.services.alerts.record(
            NewAlert::new(
                AlertKind::HandlerFault,
                Severity::Medium,
                format!("Handler for '{kind}' failed"),
            )
            .with_identifier(principal.id.clone())
            .with_context(serde_json::json!({ "kind": kind, "error": err.to_string() })),
        );
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("MessageRouter").field("kinds", &kinds).finish()
    }
}
