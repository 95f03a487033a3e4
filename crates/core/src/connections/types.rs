//! Connection types

use std::sync::{Arc, Weak};

use slotmap::new_key_type;

use crate::object::{Object, ObjectId};
use crate::variant::Variant;

new_key_type! {
    /// Key of one signal connection
    pub struct ConnectionKey;
}

/// Closure slot receiving the signal arguments
pub type SlotFn = Arc<dyn Fn(&[Variant]) + Send + Sync>;

/// How a signal reaches its receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionType {
    /// Direct on the receiver's thread, queued otherwise
    #[default]
    Auto,
    /// Run immediately on the emitting thread
    Direct,
    /// Post to the receiver's thread
    Queued,
    /// Post to the receiver's thread and wait for completion
    BlockingQueued,
}

impl ConnectionType {
    /// Refuse the connection if an identical one exists
    pub const fn unique(self) -> ConnectOptions {
        ConnectOptions {
            kind: self,
            unique: true,
        }
    }
}

/// Connection type plus the unique flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConnectOptions {
    pub kind: ConnectionType,
    pub unique: bool,
}

impl From<ConnectionType> for ConnectOptions {
    fn from(kind: ConnectionType) -> Self {
        Self {
            kind,
            unique: false,
        }
    }
}

/// Reasons a connection is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("{0} is not a signal")]
    NotASignal(String),

    #[error("No such signal {signal} in {class}")]
    SignalNotFound { class: String, signal: String },

    #[error("No such slot {slot} in {class}")]
    SlotNotFound { class: String, slot: String },

    #[error("Slot {0} is a cloned overload and cannot be connected")]
    ClonedSlot(String),

    #[error("Incompatible arguments: {signal} -> {slot}")]
    IncompatibleArguments { signal: String, slot: String },

    #[error("Connection already exists")]
    AlreadyConnected,

    #[error("Receiver has no live handle")]
    DeadReceiver,
}

/// Target of a connection
#[derive(Clone)]
pub(crate) enum Slot {
    /// Absolute method index in the receiver's class
    Method(usize),
    Function(SlotFn),
}

#[derive(Clone)]
pub(crate) struct Connection {
    pub signal_index: usize,
    pub receiver: Weak<dyn Object>,
    pub receiver_id: ObjectId,
    pub slot: Slot,
    pub kind: ConnectionType,
}

impl Connection {
    pub fn is_same_target(&self, receiver_id: ObjectId, slot_index: usize) -> bool {
        self.receiver_id == receiver_id && matches!(self.slot, Slot::Method(i) if i == slot_index)
    }
}
