//! Signal emission and cross-thread delivery

use super::manager::method_index;
use super::types::ConnectionType;
use crate::events;
use crate::meta::{InvokeError, MetaMethod, MetaObject};
use crate::object::{Object, ObjectHandle, ObjectId};
use crate::runtime::runtime;
use crate::variant::Variant;

/// Object whose signal invoked the slot currently running on this thread
pub fn sender() -> Option<ObjectHandle> {
    runtime().current_sender().and_then(|(_, handle)| handle)
}

/// Id of the current sender; available even when it has no handle
pub fn sender_id() -> Option<ObjectId> {
    runtime().current_sender().map(|(id, _)| id)
}

fn is_current_thread(obj: &dyn Object) -> bool {
    obj.base().thread() == crate::runtime::current_thread()
}

/// Deliver signal `signal_index` of `sender` to every connected slot
///
/// Connections are snapshotted first, so slots may connect and disconnect
/// freely. Delivery follows connection order.
pub fn activate(sender: &dyn Object, signal_index: usize, args: &[Variant]) {
    runtime().activate(sender, signal_index, args);
}

/// Emit a signal by signature or bare name
///
/// Returns false when the sender's class has no such signal.
pub fn emit(sender: &dyn Object, signal: &str, args: &[Variant]) -> bool {
    match sender.meta_object().index_of_signal(signal) {
        Some(index) => {
            activate(sender, index, args);
            true
        }
        None => {
            tracing::warn!(
                "emit: no such signal {} in {}",
                signal,
                sender.meta_object().class_name()
            );
            false
        }
    }
}

/// Emit the signal described by `method`
pub fn emit_method(sender: &dyn Object, method: &MetaMethod, args: &[Variant]) {
    match method_index(sender.meta_object(), method) {
        Some(index) => activate(sender, index, args),
        None => tracing::warn!(
            "emit: {} is not a signal of {}",
            method.signature(),
            sender.meta_object().class_name()
        ),
    }
}

fn find_invokable<'a>(meta: &'a MetaObject, name: &str) -> Option<&'a MetaMethod> {
    let name = name.trim();
    let index = if name.contains('(') {
        meta.index_of_method(name)
    } else {
        (0..meta.method_count()).find(|&i| meta.method(i).is_some_and(|m| m.name() == name))
    };
    index.and_then(|i| meta.method(i))
}

/// Invoke a method of `obj` by name or signature with the given delivery type
///
/// Queued calls return `Variant::Invalid` once posted. Blocking calls wait
/// for the target thread and return the method's result.
pub fn invoke_method(
    obj: &dyn Object,
    name: &str,
    kind: ConnectionType,
    args: &[Variant],
) -> Result<Variant, InvokeError> {
    let meta = obj.meta_object();
    let method = find_invokable(meta, name).ok_or_else(|| {
        tracing::warn!("invoke_method: no such method {}::{}", meta.class_name(), name);
        InvokeError::NotInvokable(name.to_string())
    })?;

    let kind = match kind {
        ConnectionType::Auto if is_current_thread(obj) => ConnectionType::Direct,
        ConnectionType::Auto => ConnectionType::Queued,
        ConnectionType::BlockingQueued if is_current_thread(obj) => {
            tracing::warn!(
                "invoke_method: blocking call to {}::{} on its own thread would deadlock",
                meta.class_name(),
                name
            );
            ConnectionType::Direct
        }
        kind => kind,
    };

    if kind == ConnectionType::Direct {
        return method.invoke(Some(obj), args);
    }

    let Some(handle) = obj.base().handle() else {
        return Err(InvokeError::NotInvokable(method.signature()));
    };
    let Some(index) = method_index(meta, method) else {
        return Err(InvokeError::NotInvokable(method.signature()));
    };

    let thread = obj.base().thread();
    let weak = std::sync::Arc::downgrade(&handle);
    drop(handle);
    let args = args.to_vec();
    let (result_tx, result_rx) = crossbeam_channel::bounded(1);

    let task = move || {
        let result = match weak.upgrade() {
            Some(target) => match target.meta_object().method(index) {
                Some(method) => method.invoke(Some(&*target), &args),
                None => Err(InvokeError::NotInvokable(format!("#{index}"))),
            },
            None => Err(InvokeError::NotInvokable(format!("#{index}"))),
        };
        if let Err(e) = &result {
            tracing::warn!("Queued invocation failed: {}", e);
        }
        let _ = result_tx.send(result);
    };

    if kind == ConnectionType::BlockingQueued {
        events::post_event_blocking(thread, task)
            .map_err(|_| InvokeError::NotInvokable(method.signature()))?;
        result_rx
            .recv()
            .map_err(|_| InvokeError::NotInvokable(method.signature()))?
    } else {
        events::post_event(thread, task)
            .map_err(|_| InvokeError::NotInvokable(method.signature()))?;
        Ok(Variant::Invalid)
    }
}

pub(crate) mod local {
    use std::cell::RefCell;
    use std::sync::Weak;

    use super::is_current_thread;
    use crate::connections::manager::{disconnect, snapshot};
    use crate::connections::types::{ConnectionType, Slot};
    use crate::events;
    use crate::object::{Object, ObjectHandle, ObjectId};
    use crate::variant::Variant;

    thread_local! {
        /// Senders of the slots currently running on this thread, innermost last
        static SENDERS: RefCell<Vec<(ObjectId, Option<Weak<dyn Object>>)>> =
            const { RefCell::new(Vec::new()) };
    }

    /// Pops the current sender when the slot returns or unwinds
    struct SenderGuard;

    impl SenderGuard {
        fn push(id: ObjectId, sender: Option<Weak<dyn Object>>) -> Self {
            SENDERS.with(|s| s.borrow_mut().push((id, sender)));
            SenderGuard
        }
    }

    impl Drop for SenderGuard {
        fn drop(&mut self) {
            SENDERS.with(|s| {
                s.borrow_mut().pop();
            });
        }
    }

    pub fn current_sender() -> Option<(ObjectId, Option<ObjectHandle>)> {
        SENDERS.with(|s| {
            s.borrow()
                .last()
                .map(|(id, weak)| (*id, weak.as_ref().and_then(Weak::upgrade)))
        })
    }

    fn deliver(receiver: &dyn Object, slot: &Slot, args: &[Variant]) {
        match slot {
            Slot::Method(index) => {
                let meta = receiver.meta_object();
                let Some(method) = meta.method(*index) else {
                    tracing::warn!("Slot index {} out of range for {}", index, meta.class_name());
                    return;
                };
                let count = method.parameter_count().min(args.len());
                if let Err(e) = method.invoke(Some(receiver), &args[..count]) {
                    tracing::warn!(
                        "Slot {}::{} failed: {}",
                        meta.class_name(),
                        method.signature(),
                        e
                    );
                }
            }
            Slot::Function(f) => f(args),
        }
    }

    pub fn activate(sender: &dyn Object, signal_index: usize, args: &[Variant]) {
        if sender.base().signals_blocked() {
            return;
        }

        let connections = snapshot(sender, signal_index);
        if connections.is_empty() {
            return;
        }

        let sender_weak = sender.base().self_ref.get().cloned();
        let sender_id = sender.base().id();
        let mut dead = Vec::new();

        for (key, connection) in connections {
            let Some(receiver) = connection.receiver.upgrade() else {
                dead.push(key);
                continue;
            };

            let kind = match connection.kind {
                ConnectionType::Auto if is_current_thread(&*receiver) => ConnectionType::Direct,
                ConnectionType::Auto => ConnectionType::Queued,
                kind => kind,
            };

            match kind {
                ConnectionType::BlockingQueued if is_current_thread(&*receiver) => {
                    tracing::warn!(
                        "BlockingQueued connection to {} on the receiver's own thread would deadlock, delivering directly",
                        receiver.meta_object().class_name()
                    );
                    let _guard = SenderGuard::push(sender_id, sender_weak.clone());
                    deliver(&*receiver, &connection.slot, args);
                }
                ConnectionType::Queued | ConnectionType::BlockingQueued => {
                    let thread = receiver.base().thread();
                    let receiver_weak = connection.receiver.clone();
                    let slot = connection.slot.clone();
                    let args = args.to_vec();
                    let sender_weak = sender_weak.clone();
                    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

                    let task = move || {
                        if let Some(receiver) = receiver_weak.upgrade() {
                            let _guard = SenderGuard::push(sender_id, sender_weak);
                            deliver(&*receiver, &slot, &args);
                        }
                        let _ = done_tx.send(());
                    };
                    // the task may not outlive the receiver's handle here
                    drop(receiver);

                    let posted = if kind == ConnectionType::BlockingQueued {
                        events::post_event_blocking(thread, task)
                    } else {
                        events::post_event(thread, task)
                    };
                    if posted.is_ok() && kind == ConnectionType::BlockingQueued {
                        let _ = done_rx.recv();
                    }
                }
                _ => {
                    let _guard = SenderGuard::push(sender_id, sender_weak.clone());
                    deliver(&*receiver, &connection.slot, args);
                }
            }
        }

        for key in dead {
            disconnect(key);
        }
    }
}
