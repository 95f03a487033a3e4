//! Signal/slot connections
//!
//! A connection binds a signal of a sender to a slot (a method or closure)
//! of a receiver. Emitting the signal delivers its arguments to every
//! connected slot, directly or through the receiver thread's posted-event
//! queue depending on the [`ConnectionType`].
//!
//! # Example
//!
//! ```ignore
//! let key = connect_by_name(&*slider, "valueChanged(i32)", &*label, "setNumber(i32)", ConnectionType::Auto)?;
//! slider.set_value(3); // label.setNumber(3) runs
//! disconnect(key);
//! ```

pub mod dispatch;
pub mod manager;
pub mod types;

pub use dispatch::{activate, emit, emit_method, invoke_method, sender, sender_id};
pub(crate) use manager::remove_connections;
pub use manager::{
    connect, connect_by_name, connect_fn, disconnect, disconnect_all, is_signal_connected,
    receivers,
};
pub use types::{ConnectError, ConnectOptions, ConnectionKey, ConnectionType, SlotFn};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{discard_posted_events, process_posted_events};
    use crate::meta::{method_jar, MetaObject, MetaObjectBuilder, MethodAttributes, MethodBuilder};
    use crate::object::testing::{Counter, Other};
    use crate::object::{new_object, Object, ObjectBase, ObjectExt};
    use crate::variant::Variant;
    use parking_lot::Mutex;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, OnceLock};

    #[test]
    fn test_direct_connection_by_name() {
        let a = new_object(Counter::new(0));
        let b = new_object(Counter::new(0));

        connect_by_name(&*a, "valueChanged(int)", &*b, "record(int)", ConnectionType::Direct)
            .unwrap();
        a.set_value(5);
        a.set_value(5); // unchanged, no emission
        a.set_value(6);

        assert_eq!(*b.log.lock(), vec![5, 6]);
        assert_eq!(receivers(&*a, "valueChanged(i32)"), 1);
    }

    #[test]
    fn test_connection_order_and_shorter_slot() {
        let a = new_object(Counter::new(0));
        let b = new_object(Counter::new(0));

        connect_by_name(&*a, "valueChanged", &*b, "record", ConnectionType::Auto).unwrap();
        connect_by_name(&*a, "valueChanged(i32)", &*b, "ping()", ConnectionType::Auto).unwrap();
        a.set_value(9);

        assert_eq!(*b.log.lock(), vec![9, -1]);
    }

    #[test]
    fn test_connect_validation() {
        let a = new_object(Counter::new(0));
        let other = new_object(Other::default());
        let meta = a.meta_object();
        let set_value = meta.method(meta.index_of_slot("setValue(i32)").unwrap()).unwrap();
        let record = meta.method(meta.index_of_slot("record(i32)").unwrap()).unwrap();

        assert!(matches!(
            connect(&*a, set_value, &*a, record, ConnectionType::Direct),
            Err(ConnectError::NotASignal(_))
        ));
        assert!(matches!(
            connect_by_name(&*a, "valueChanged(i32)", &*other, "takeText(String)", ConnectionType::Direct),
            Err(ConnectError::IncompatibleArguments { .. })
        ));
        assert!(matches!(
            connect_by_name(&*a, "missing()", &*other, "toggle()", ConnectionType::Direct),
            Err(ConnectError::SignalNotFound { .. })
        ));
        assert!(matches!(
            connect_by_name(&*a, "pinged()", &*other, "missing()", ConnectionType::Direct),
            Err(ConnectError::SlotNotFound { .. })
        ));

        // a receiver without a handle cannot be tracked
        let loose = Other::default();
        assert_eq!(
            connect_by_name(&*a, "pinged()", &loose, "toggle()", ConnectionType::Direct),
            Err(ConnectError::DeadReceiver)
        );
    }

    #[test]
    fn test_unique_connection() {
        let a = new_object(Counter::new(0));
        let other = new_object(Other::default());

        connect_by_name(&*a, "pinged()", &*other, "toggle()", ConnectionType::Auto.unique())
            .unwrap();
        assert_eq!(
            connect_by_name(&*a, "pinged()", &*other, "toggle()", ConnectionType::Auto.unique()),
            Err(ConnectError::AlreadyConnected)
        );
        // without the flag duplicates are allowed
        connect_by_name(&*a, "pinged()", &*other, "toggle()", ConnectionType::Auto).unwrap();
        assert_eq!(receivers(&*a, "pinged()"), 2);

        emit(&*a, "pinged()", &[]);
        assert!(!other.flag());
    }

    struct Overloaded {
        base: ObjectBase,
        hits: Mutex<Vec<i32>>,
    }

    impl Object for Overloaded {
        fn meta_object(&self) -> &'static MetaObject {
            static META: OnceLock<&'static MetaObject> = OnceLock::new();
            META.get_or_init(|| {
                MetaObjectBuilder::for_type::<Overloaded>("ConnectionTestOverloaded")
                    .method(
                        MethodBuilder::slot("hit(i32)")
                            .invoke(method_jar(|o: &Overloaded, v: i32| o.hits.lock().push(v))),
                    )
                    .method(
                        MethodBuilder::slot("hit()")
                            .attributes(MethodAttributes::CLONED)
                            .invoke(method_jar(|o: &Overloaded| o.hits.lock().push(0))),
                    )
                    .build()
            })
        }

        fn base(&self) -> &ObjectBase {
            &self.base
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_cloned_slot_rejected() {
        let a = new_object(Counter::new(0));
        let target = new_object(Overloaded {
            base: ObjectBase::new(),
            hits: Mutex::new(Vec::new()),
        });

        assert!(matches!(
            connect_by_name(&*a, "valueChanged(i32)", &*target, "hit()", ConnectionType::Direct),
            Err(ConnectError::ClonedSlot(_))
        ));
        connect_by_name(&*a, "valueChanged(i32)", &*target, "hit(i32)", ConnectionType::Direct)
            .unwrap();
        a.set_value(2);
        assert_eq!(*target.hits.lock(), vec![2]);
    }

    #[test]
    fn test_disconnect() {
        let a = new_object(Counter::new(0));
        let b = new_object(Counter::new(0));

        let key = connect_by_name(&*a, "valueChanged(i32)", &*b, "record(i32)", ConnectionType::Direct)
            .unwrap();
        connect_by_name(&*a, "pinged()", &*b, "ping()", ConnectionType::Direct).unwrap();

        let signal = a.meta_object().method(a.meta_object().index_of_signal("valueChanged").unwrap());
        assert!(is_signal_connected(&*a, signal.unwrap()));

        assert!(disconnect(key));
        assert!(!disconnect(key));
        assert!(!is_signal_connected(&*a, signal.unwrap()));
        a.set_value(1);
        assert!(b.log.lock().is_empty());

        connect_by_name(&*a, "valueChanged(i32)", &*b, "record(i32)", ConnectionType::Direct)
            .unwrap();
        assert_eq!(disconnect_all(&*a, Some("pinged()")), 1);
        assert_eq!(receivers(&*a, "valueChanged(i32)"), 1);
        assert_eq!(disconnect_all(&*a, None), 1);
        assert_eq!(receivers(&*a, "valueChanged(i32)"), 0);
    }

    #[test]
    fn test_dead_receiver_pruned() {
        let a = new_object(Counter::new(0));
        let b = new_object(Counter::new(0));
        connect_by_name(&*a, "valueChanged(i32)", &*b, "record(i32)", ConnectionType::Direct)
            .unwrap();

        drop(b);
        assert_eq!(receivers(&*a, "valueChanged(i32)"), 0);
        a.set_value(3);
        assert_eq!(a.value(), 3);
    }

    #[test]
    fn test_blocked_signals_are_not_delivered() {
        let a = new_object(Counter::new(0));
        let b = new_object(Counter::new(0));
        connect_by_name(&*a, "valueChanged(i32)", &*b, "record(i32)", ConnectionType::Direct)
            .unwrap();

        a.base().block_signals(true);
        a.set_value(4);
        a.base().block_signals(false);
        a.set_value(5);
        assert_eq!(*b.log.lock(), vec![5]);
    }

    #[test]
    fn test_closure_sees_sender() {
        let a = new_object(Counter::new(0));
        let context = new_object(Other::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        connect_fn(
            &*a,
            "valueChanged(i32)",
            &*context,
            move |args| {
                let from = sender().map(|s| s.base().id());
                sink.lock().push((args[0].to_i64(), from));
            },
            ConnectionType::Direct,
        )
        .unwrap();

        a.set_value(11);
        assert_eq!(*seen.lock(), vec![(Some(11), Some(a.base().id()))]);
        assert!(sender().is_none());
        assert!(sender_id().is_none());
    }

    #[test]
    fn test_signal_to_signal() {
        let a = new_object(Counter::new(0));
        let relay = new_object(Counter::new(0));
        let end = new_object(Counter::new(0));

        connect_by_name(&*a, "valueChanged(i32)", &*relay, "valueChanged(i32)", ConnectionType::Direct)
            .unwrap();
        connect_by_name(&*relay, "valueChanged(i32)", &*end, "record(i32)", ConnectionType::Direct)
            .unwrap();

        a.set_value(7);
        assert_eq!(*end.log.lock(), vec![7]);
        assert_eq!(relay.value(), 0);
    }

    #[test]
    fn test_queued_on_current_thread_waits_for_processing() {
        // own thread so no other test drains this queue
        let result = std::thread::spawn(|| {
            let a = new_object(Counter::new(0));
            let b = new_object(Counter::new(0));
            connect_by_name(&*a, "valueChanged(i32)", &*b, "record(i32)", ConnectionType::Queued)
                .unwrap();
            a.set_value(1);
            let before = b.log.lock().clone();
            process_posted_events();
            let after = b.log.lock().clone();
            discard_posted_events();
            (before, after)
        })
        .join()
        .unwrap();

        assert_eq!(result, (vec![], vec![1]));
    }

    #[test]
    fn test_auto_connection_crosses_threads() {
        let a = new_object(Counter::new(0));
        let b = new_object(Counter::new(0));
        connect_by_name(&*a, "valueChanged(i32)", &*b, "record(i32)", ConnectionType::Auto)
            .unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let (id_tx, id_rx) = crossbeam_channel::bounded(1);
        let worker = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                id_tx.send(std::thread::current().id()).unwrap();
                while !stop.load(Ordering::SeqCst) {
                    process_posted_events();
                    std::thread::yield_now();
                }
                process_posted_events();
                discard_posted_events();
            })
        };

        let worker_id = id_rx.recv().unwrap();
        b.base().move_to_thread(worker_id);
        a.set_value(8);
        stop.store(true, Ordering::SeqCst);
        worker.join().unwrap();

        assert_eq!(*b.log.lock(), vec![8]);
        assert_eq!(*b.threads.lock(), vec![worker_id]);
    }

    #[test]
    fn test_blocking_queued_waits_for_receiver() {
        let a = new_object(Counter::new(0));
        let b = new_object(Counter::new(0));
        connect_by_name(&*a, "valueChanged(i32)", &*b, "record(i32)", ConnectionType::BlockingQueued)
            .unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let (id_tx, id_rx) = crossbeam_channel::bounded(1);
        let worker = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                id_tx.send(std::thread::current().id()).unwrap();
                while !stop.load(Ordering::SeqCst) {
                    process_posted_events();
                    std::thread::yield_now();
                }
                discard_posted_events();
            })
        };

        let worker_id = id_rx.recv().unwrap();
        b.base().move_to_thread(worker_id);
        a.set_value(12);
        // delivered before emission returned
        assert_eq!(*b.log.lock(), vec![12]);

        stop.store(true, Ordering::SeqCst);
        worker.join().unwrap();
    }

    #[test]
    fn test_blocking_queued_same_thread_runs_directly() {
        let a = new_object(Counter::new(0));
        let b = new_object(Counter::new(0));
        connect_by_name(&*a, "valueChanged(i32)", &*b, "record(i32)", ConnectionType::BlockingQueued)
            .unwrap();

        a.set_value(3);
        assert_eq!(*b.log.lock(), vec![3]);
    }

    #[test]
    fn test_invoke_method() {
        let counter = new_object(Counter::new(1));
        assert_eq!(
            invoke_method(&*counter, "add", ConnectionType::Direct, &[Variant::Int(2), Variant::Int(3)]),
            Ok(Variant::Int(6))
        );
        assert!(invoke_method(&*counter, "nothing", ConnectionType::Direct, &[]).is_err());

        let result = std::thread::spawn(|| {
            let counter = new_object(Counter::new(0));
            let queued =
                invoke_method(&*counter, "setValue(int)", ConnectionType::Queued, &[Variant::Int(4)]);
            let before = counter.value();
            process_posted_events();
            discard_posted_events();
            (queued, before, counter.property("value"))
        })
        .join()
        .unwrap();

        assert_eq!(result, (Ok(Variant::Invalid), 0, Variant::Int(4)));
    }
}
