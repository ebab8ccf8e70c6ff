use core::any::Any;
use core::fmt;
use std::sync::Arc;

use gridsim_nav::PathOutcome;

use crate::PathTicket;

/// Open set of message kinds. Behaviour code defines its own alongside the built-in ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageKind(pub &'static str);

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Broadcast by an agent reaching the end of a walk. Payload: the arrival [`gridsim_nav::Cell`].
pub const ARRIVAL: MessageKind = MessageKind("arrival");
/// Broadcast by an agent that could not reach its destination. Payload: where it gave up.
pub const PATH_FAILED: MessageKind = MessageKind("path_failed");
/// Sent by the world to an agent whose path request completed. Payload: [`PathReply`].
pub const PATH_READY: MessageKind = MessageKind("path_ready");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every registered agent except the sender.
    Broadcast,
    One(u64),
    /// Each listed agent once, in list order; unknown ids are skipped.
    Many(Vec<u64>),
}

/// A message between agents.
#[derive(Clone)]
pub struct Telegram {
    pub sender: u64,
    pub recipients: Recipients,
    pub kind: MessageKind,
    pub payload: Option<Arc<dyn Any + Send + Sync>>,
    /// Absolute simulated time of delivery; 0 for immediate messages.
    pub dispatch_time: f64,
}

impl Telegram {
    pub fn new(sender: u64, recipients: Recipients, kind: MessageKind) -> Self {
        Self {
            sender,
            recipients,
            kind,
            payload: None,
            dispatch_time: 0.0,
        }
    }

    pub fn broadcast(sender: u64, kind: MessageKind) -> Self {
        Self::new(sender, Recipients::Broadcast, kind)
    }

    pub fn to(sender: u64, receiver: u64, kind: MessageKind) -> Self {
        Self::new(sender, Recipients::One(receiver), kind)
    }

    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    /// The payload, if present and of type `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref::<T>()
    }

    pub fn is(&self, kind: MessageKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Debug for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telegram")
            .field("sender", &self.sender)
            .field("recipients", &self.recipients)
            .field("kind", &self.kind)
            .field("payload", &self.payload.is_some())
            .field("dispatch_time", &self.dispatch_time)
            .finish()
    }
}

/// Payload of [`PATH_READY`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathReply {
    pub ticket: PathTicket,
    pub outcome: PathOutcome,
}
