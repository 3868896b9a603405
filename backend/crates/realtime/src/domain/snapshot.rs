//! Read-only source of aggregate figures for snapshot replies

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RouterError;

#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    /// Payload of `analytics_update`
    async fn analytics(&self) -> Result<Value, RouterError>;

    /// Payload of `system_status` (connection counts are added by the handler)
    async fn system_status(&self) -> Result<Value, RouterError>;
}
