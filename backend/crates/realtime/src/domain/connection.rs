//! Connection model
//!
//! A [`ConnectionHandle`] is the send capability for one live transport:
//! a bounded queue drained by that connection's writer task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use kernel::id::ConnectionId;
use kernel::principal::UserRole;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::message::OutboundMessage;

/// Serialized outbound frame, shared between recipients of a broadcast
pub type Frame = Arc<str>;

#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Frame>,
}

impl ConnectionHandle {
    /// New handle plus the receiving end for the writer task
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// False once the writer is gone
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a frame without waiting; a full or closed queue drops it
    pub fn send_frame(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Outbound queue full, frame dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn send(&self, message: &OutboundMessage) -> bool {
        match message.to_frame() {
            Some(frame) => self.send_frame(frame),
            None => false,
        }
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

/// Registry entry for one principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub principal_id: String,
    pub role: UserRole,
    pub handle: ConnectionHandle,
    pub connected_at: i64,
    pub last_activity: i64,
}

/// Gateway state machine per connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionPhase {
    Connecting = 0,
    Authenticating = 1,
    Open = 2,
    Rejected = 3,
    Closing = 4,
    Closed = 5,
}

impl ConnectionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionPhase::Connecting,
            1 => ConnectionPhase::Authenticating,
            2 => ConnectionPhase::Open,
            3 => ConnectionPhase::Rejected,
            4 => ConnectionPhase::Closing,
            _ => ConnectionPhase::Closed,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Authenticating => "authenticating",
            ConnectionPhase::Open => "open",
            ConnectionPhase::Rejected => "rejected",
            ConnectionPhase::Closing => "closing",
            ConnectionPhase::Closed => "closed",
        }
    }
}

/// Atomic phase cell; transitions are compare-and-swap so teardown runs once
#[derive(Debug)]
pub struct Lifecycle {
    phase: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(ConnectionPhase::Connecting as u8),
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Move `from -> to`; false if the current phase is not `from`
    pub fn transition(&self, from: ConnectionPhase, to: ConnectionPhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Open -> Closing`; true for exactly one caller
    pub fn begin_close(&self) -> bool {
        self.transition(ConnectionPhase::Open, ConnectionPhase::Closing)
    }

    pub fn finish_close(&self) {
        self.phase.store(ConnectionPhase::Closed as u8, Ordering::Release);
    }
}
