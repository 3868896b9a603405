//! Alert notifier that writes to the tracing pipeline

use crate::domain::entities::SecurityAlert;
use crate::domain::repository::AlertNotifier;

/// Logs high-severity alerts at `error` level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertNotifier;

impl AlertNotifier for TracingAlertNotifier {
    fn notify(&self, alert: &SecurityAlert) {
        tracing::error!(
            alert_id = %alert.id,
            kind = %alert.kind,
            ip = alert.ip.as_deref().unwrap_or("-"),
            identifier = alert.identifier.as_deref().unwrap_or("-"),
            context = %alert.context,
            "HIGH SEVERITY SECURITY ALERT: {}",
            alert.message
        );
    }
}
