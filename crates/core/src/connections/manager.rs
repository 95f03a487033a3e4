//! Connection table - connect, disconnect and queries
//!
//! The table lives in the active runtime, so connections made by the host
//! and by attached plugins are one table.

use std::sync::Arc;

use super::types::{ConnectError, ConnectOptions, Connection, ConnectionKey, Slot};
use crate::meta::{check_connect_args, MetaMethod, MetaObject, MethodAttributes, MethodType};
use crate::object::Object;
use crate::runtime::runtime;
use crate::variant::Variant;

/// Absolute index of `method` in `meta`, matching on name, parameters and class
pub(crate) fn method_index(meta: &MetaObject, method: &MetaMethod) -> Option<usize> {
    (0..meta.method_count()).find(|&i| meta.method(i) == Some(method))
}

fn resolve_signal(sender: &dyn Object, signal: &MetaMethod) -> Result<usize, ConnectError> {
    if signal.method_type() != MethodType::Signal {
        tracing::warn!("connect: {} is not a signal", signal.signature());
        return Err(ConnectError::NotASignal(signal.signature()));
    }

    let meta = sender.meta_object();
    method_index(meta, signal).ok_or_else(|| {
        tracing::warn!(
            "connect: no such signal {} in {}",
            signal.signature(),
            meta.class_name()
        );
        ConnectError::SignalNotFound {
            class: meta.class_name().to_string(),
            signal: signal.signature(),
        }
    })
}

fn insert(sender: &dyn Object, connection: Connection) -> ConnectionKey {
    runtime().insert_connection(sender, connection)
}

/// Connect `signal` of `sender` to `slot` of `receiver`
///
/// The slot's parameter types must be a prefix of the signal's. The
/// receiver must have been created through [`new_object`]; the connection
/// holds it weakly.
///
/// [`new_object`]: crate::object::new_object
#[tracing::instrument(skip_all, fields(signal = %signal.signature(), slot = %slot.signature()))]
pub fn connect(
    sender: &dyn Object,
    signal: &MetaMethod,
    receiver: &dyn Object,
    slot: &MetaMethod,
    options: impl Into<ConnectOptions>,
) -> Result<ConnectionKey, ConnectError> {
    let options = options.into();
    let signal_index = resolve_signal(sender, signal)?;

    let receiver_meta = receiver.meta_object();
    let Some(slot_index) = method_index(receiver_meta, slot) else {
        tracing::warn!(
            "connect: no such slot {} in {}",
            slot.signature(),
            receiver_meta.class_name()
        );
        return Err(ConnectError::SlotNotFound {
            class: receiver_meta.class_name().to_string(),
            slot: slot.signature(),
        });
    };

    if slot.attributes().contains(MethodAttributes::CLONED) {
        tracing::warn!("connect: slot {} is a cloned overload", slot.signature());
        return Err(ConnectError::ClonedSlot(slot.signature()));
    }

    if !check_connect_args(signal.parameter_types(), slot.parameter_types()) {
        tracing::warn!(
            "connect: incompatible arguments {} -> {}",
            signal.signature(),
            slot.signature()
        );
        return Err(ConnectError::IncompatibleArguments {
            signal: signal.signature(),
            slot: slot.signature(),
        });
    }

    let Some(handle) = receiver.base().handle() else {
        tracing::warn!("connect: receiver {} has no handle", receiver.base().id());
        return Err(ConnectError::DeadReceiver);
    };

    let receiver_id = receiver.base().id();
    if options.unique {
        let duplicate = snapshot(sender, signal_index)
            .iter()
            .any(|(_, c)| c.is_same_target(receiver_id, slot_index));
        if duplicate {
            tracing::warn!(
                "connect: {} -> {} already connected",
                signal.signature(),
                slot.signature()
            );
            return Err(ConnectError::AlreadyConnected);
        }
    }

    let key = insert(
        sender,
        Connection {
            signal_index,
            receiver: Arc::downgrade(&handle),
            receiver_id,
            slot: Slot::Method(slot_index),
            kind: options.kind,
        },
    );

    tracing::debug!(
        "Connected {}::{} -> {}::{}",
        sender.meta_object().class_name(),
        signal.signature(),
        receiver_meta.class_name(),
        slot.signature()
    );
    Ok(key)
}

/// Connect by signature, e.g. `connect_by_name(a, "valueChanged(int)", b, "setValue(int)", ..)`
///
/// The slot may be any method of the receiver, including a signal.
pub fn connect_by_name(
    sender: &dyn Object,
    signal: &str,
    receiver: &dyn Object,
    slot: &str,
    options: impl Into<ConnectOptions>,
) -> Result<ConnectionKey, ConnectError> {
    let sender_meta = sender.meta_object();
    let signal_method = sender_meta
        .index_of_signal(signal)
        .and_then(|i| sender_meta.method(i))
        .ok_or_else(|| {
            tracing::warn!(
                "connect: no such signal {} in {}",
                signal,
                sender_meta.class_name()
            );
            ConnectError::SignalNotFound {
                class: sender_meta.class_name().to_string(),
                signal: signal.to_string(),
            }
        })?;

    let receiver_meta = receiver.meta_object();
    let slot_method = receiver_meta
        .index_of_slot(slot)
        .or_else(|| receiver_meta.index_of_method(slot))
        .and_then(|i| receiver_meta.method(i))
        .ok_or_else(|| {
            tracing::warn!(
                "connect: no such slot {} in {}",
                slot,
                receiver_meta.class_name()
            );
            ConnectError::SlotNotFound {
                class: receiver_meta.class_name().to_string(),
                slot: slot.to_string(),
            }
        })?;

    connect(sender, signal_method, receiver, slot_method, options)
}

/// Connect a signal to a closure
///
/// The closure runs in the context of `context`: on its thread, and only
/// while it is alive. The unique flag is ignored for closures.
pub fn connect_fn<F>(
    sender: &dyn Object,
    signal: &str,
    context: &dyn Object,
    f: F,
    options: impl Into<ConnectOptions>,
) -> Result<ConnectionKey, ConnectError>
where
    F: Fn(&[Variant]) + Send + Sync + 'static,
{
    let options = options.into();
    let meta = sender.meta_object();
    let signal_method = meta
        .index_of_signal(signal)
        .and_then(|i| meta.method(i))
        .ok_or_else(|| {
            tracing::warn!("connect: no such signal {} in {}", signal, meta.class_name());
            ConnectError::SignalNotFound {
                class: meta.class_name().to_string(),
                signal: signal.to_string(),
            }
        })?;
    let signal_index = resolve_signal(sender, signal_method)?;

    let Some(handle) = context.base().handle() else {
        tracing::warn!("connect: context {} has no handle", context.base().id());
        return Err(ConnectError::DeadReceiver);
    };

    Ok(insert(
        sender,
        Connection {
            signal_index,
            receiver: Arc::downgrade(&handle),
            receiver_id: context.base().id(),
            slot: Slot::Function(Arc::new(f)),
            kind: options.kind,
        },
    ))
}

/// Remove one connection; returns false if it no longer exists
pub fn disconnect(key: ConnectionKey) -> bool {
    let removed = runtime().remove_connection(key);
    if removed {
        tracing::trace!("Disconnected {:?}", key);
    }
    removed
}

/// Remove the connections of `sender`, optionally only those of one signal
///
/// Returns the number removed.
pub fn disconnect_all(sender: &dyn Object, signal: Option<&str>) -> usize {
    let signal_index = match signal {
        Some(signature) => match sender.meta_object().index_of_signal(signature) {
            Some(index) => Some(index),
            None => return 0,
        },
        None => None,
    };
    runtime().remove_connections_of(sender, signal_index)
}

/// Number of live receivers connected to `signal` of `sender`
pub fn receivers(sender: &dyn Object, signal: &str) -> usize {
    let Some(signal_index) = sender.meta_object().index_of_signal(signal) else {
        return 0;
    };
    snapshot(sender, signal_index)
        .iter()
        .filter(|(_, c)| c.receiver.strong_count() > 0)
        .count()
}

/// Whether anything is connected to `signal` of `sender`
pub fn is_signal_connected(sender: &dyn Object, signal: &MetaMethod) -> bool {
    method_index(sender.meta_object(), signal)
        .is_some_and(|index| !snapshot(sender, index).is_empty())
}

/// Copy the connections of one signal in connection order
pub(crate) fn snapshot(sender: &dyn Object, signal_index: usize) -> Vec<(ConnectionKey, Connection)> {
    runtime().connections_of(sender, signal_index)
}

/// Drop connections, used when a sender is destroyed
pub(crate) fn remove_connections(keys: &[ConnectionKey]) {
    runtime().release_connections(keys);
}

pub(crate) mod local {
    use std::sync::LazyLock;

    use parking_lot::RwLock;
    use slotmap::SlotMap;

    use crate::connections::types::{Connection, ConnectionKey};
    use crate::object::Object;

    /// All live connections; each sender keeps its own ordered key list
    static CONNECTIONS: LazyLock<RwLock<SlotMap<ConnectionKey, Connection>>> =
        LazyLock::new(|| RwLock::new(SlotMap::with_key()));

    pub fn insert(sender: &dyn Object, connection: Connection) -> ConnectionKey {
        let key = CONNECTIONS.write().insert(connection);
        sender.base().connection_keys().push(key);
        key
    }

    // removed connections are dropped after the table lock is released, since
    // a closure slot may own the last handle of an object with connections

    pub fn remove(key: ConnectionKey) -> bool {
        let removed = CONNECTIONS.write().remove(key);
        removed.is_some()
    }

    /// Keys of disconnected entries are pruned from the sender's list. Every
    /// copy of the crate reaches this one table, so an unknown key is always
    /// a removed one.
    pub fn snapshot(sender: &dyn Object, signal_index: usize) -> Vec<(ConnectionKey, Connection)> {
        let mut keys = sender.base().connection_keys();
        let table = CONNECTIONS.read();
        keys.retain(|key| table.contains_key(*key));
        keys.iter()
            .filter_map(|key| table.get(*key).map(|c| (*key, c.clone())))
            .filter(|(_, c)| c.signal_index == signal_index)
            .collect()
    }

    pub fn remove_all(sender: &dyn Object, signal_index: Option<usize>) -> usize {
        let mut removed = Vec::new();
        {
            let mut keys = sender.base().connection_keys();
            let mut table = CONNECTIONS.write();
            keys.retain(|key| {
                let Some(connection) = table.get(*key) else {
                    return false;
                };
                if signal_index.is_some_and(|i| connection.signal_index != i) {
                    return true;
                }
                removed.extend(table.remove(*key));
                false
            });
        }
        removed.len()
    }

    pub fn release(keys: &[ConnectionKey]) {
        let removed: Vec<Connection> = {
            let mut table = CONNECTIONS.write();
            keys.iter().filter_map(|key| table.remove(*key)).collect()
        };
        drop(removed);
    }
}
