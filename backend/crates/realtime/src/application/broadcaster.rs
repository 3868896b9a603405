//! Broadcaster
//!
//! Fire-and-forget fan-out over a registry snapshot. Each message is
//! serialized once; recipients whose handle is no longer open are skipped.
//! Counts returned are frames queued, not frames delivered.

use std::sync::Arc;

use kernel::clock::SharedClock;
use kernel::principal::UserRole;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::application::registry::ConnectionRegistry;
use crate::domain::connection::{ConnectionHandle, Frame};
use crate::domain::message::{OutboundMessage, kinds};

/// Role groups that receive admin feeds
pub const ADMIN_AUDIENCE: [UserRole; 2] = [UserRole::Admin, UserRole::SuperAdmin];

#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    clock: SharedClock,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, clock: SharedClock) -> Self {
        Self { registry, clock }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    fn fan_out<'a>(
        &self,
        recipients: impl IntoIterator<Item = &'a (String, ConnectionHandle)>,
        frame: &Frame,
        exclude: Option<&str>,
    ) -> usize {
        recipients
            .into_iter()
            .filter(|(id, _)| exclude != Some(id.as_str()))
            .filter(|(_, handle)| handle.is_open())
            .filter(|(_, handle)| handle.send_frame(frame.clone()))
            .count()
    }

    /// Every open connection in `role`'s group
    #[instrument(skip(self, message), fields(kind = %message.kind))]
    pub fn to_role(&self, role: UserRole, message: &OutboundMessage) -> usize {
        self.to_role_except(role, message, None)
    }

    pub fn to_role_except(
        &self,
        role: UserRole,
        message: &OutboundMessage,
        exclude: Option<&str>,
    ) -> usize {
        let Some(frame) = message.to_frame() else {
            return 0;
        };
        let recipients = self.registry.handles_in(role);
        let sent = self.fan_out(&recipients, &frame, exclude);
        debug!(role = %role, kind = %message.kind, sent, "Broadcast to role");
        sent
    }

    /// Admin and super-admin groups, optionally skipping one principal
    pub fn to_admins(&self, message: &OutboundMessage, exclude: Option<&str>) -> usize {
        let Some(frame) = message.to_frame() else {
            return 0;
        };
        let recipients: Vec<_> = ADMIN_AUDIENCE
            .iter()
            .flat_map(|role| self.registry.handles_in(*role))
            .collect();
        let sent = self.fan_out(&recipients, &frame, exclude);
        debug!(kind = %message.kind, sent, "Broadcast to admins");
        sent
    }

    /// Exactly one principal; false if absent or closed
    pub fn to_principal(&self, principal_id: &str, message: &OutboundMessage) -> bool {
        match self.registry.get(principal_id) {
            Some(connection) if connection.handle.is_open() => connection.handle.send(message),
            _ => false,
        }
    }

    /// Every registered connection
    #[instrument(skip(self, message), fields(kind = %message.kind))]
    pub fn to_all(&self, message: &OutboundMessage) -> usize {
        let Some(frame) = message.to_frame() else {
            return 0;
        };
        let recipients = self.registry.all_handles();
        self.fan_out(&recipients, &frame, None)
    }

    /// Push a `notification` to one principal
    pub fn notify_principal(&self, principal_id: &str, notification: Value) -> bool {
        let message = OutboundMessage::new(kinds::NOTIFICATION, notification, self.clock.now_ms());
        self.to_principal(principal_id, &message)
    }

    /// Push `system_status` to everyone
    pub fn broadcast_system_status(&self, status: Value) -> usize {
        let message = OutboundMessage::new(kinds::SYSTEM_STATUS, status, self.clock.now_ms());
        self.to_all(&message)
    }

    /// Push `analytics_update` to the admin audience
    pub fn broadcast_analytics(&self, analytics: Value) -> usize {
        let message = OutboundMessage::new(kinds::ANALYTICS_UPDATE, analytics, self.clock.now_ms());
        self.to_admins(&message, None)
    }
}
