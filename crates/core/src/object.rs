//! Object model
//!
//! Reflectable types implement [`Object`] and embed an [`ObjectBase`], which
//! carries identity, ownership links, thread affinity, dynamic properties
//! and the list of outgoing signal connections.
//!
//! Objects are shared as [`ObjectHandle`] (`Arc<dyn Object>`) and use
//! interior mutability, so every accessor takes `&self`.
//!
//! [`ObjectBase`] guards its state with `std::sync` locks. An object built
//! by a plugin library is locked by code from two copies of the crate, and
//! only the futex-backed std locks park and wake threads without a
//! per-copy global table.
//!
//! # Example
//!
//! ```ignore
//! let sample = new_object(Sample::default());
//! sample.set_property("volume", 0.5f32);
//! assert_eq!(sample.property("volume").value::<f32>(), Some(0.5));
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    Weak,
};
use std::thread::ThreadId;

use crate::connections::{self, ConnectionKey};
use crate::meta::{InvokeError, MetaObject};
use crate::runtime::runtime;
use crate::variant::Variant;

/// Shared owning handle to an object
pub type ObjectHandle = Arc<dyn Object>;

/// Unique object identity
pub type ObjectId = u64;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn allocate_id() -> ObjectId {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

// a panic while holding one of these locks leaves plain data behind
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A reflectable object
pub trait Object: Any + Send + Sync {
    /// Descriptor of the object's most-derived class
    fn meta_object(&self) -> &'static MetaObject;

    /// Shared object state
    fn base(&self) -> &ObjectBase;

    fn as_any(&self) -> &dyn Any;

    /// Embedded object of the parent class, for classes that extend another
    fn super_object(&self) -> Option<&dyn Object> {
        None
    }
}

/// Downcast through the chain of embedded parent-class objects
pub fn downcast_object<T: Object>(obj: &dyn Object) -> Option<&T> {
    let mut current = Some(obj);
    while let Some(object) = current {
        if let Some(target) = object.as_any().downcast_ref::<T>() {
            return Some(target);
        }
        current = object.super_object();
    }
    None
}

/// Wrap a new object in a handle
///
/// The object learns its own handle, which `sender()`, parent links and
/// queued delivery rely on. Objects should always be created through here.
pub fn new_object<T: Object>(object: T) -> Arc<T> {
    let handle = Arc::new(object);
    let weak: Weak<dyn Object> = Arc::downgrade(&handle) as Weak<dyn Object>;
    if handle.base().self_ref.set(weak).is_err() {
        tracing::warn!(
            "Object {} was already attached to a handle",
            handle.base().id()
        );
    }
    handle
}

/// Shared state embedded in every object
pub struct ObjectBase {
    id: ObjectId,
    name: RwLock<String>,
    pub(crate) self_ref: OnceLock<Weak<dyn Object>>,
    parent: RwLock<Option<Weak<dyn Object>>>,
    children: RwLock<Vec<ObjectHandle>>,
    thread: RwLock<ThreadId>,
    signals_blocked: AtomicBool,
    dynamic_properties: RwLock<BTreeMap<String, Variant>>,
    connections: Mutex<Vec<ConnectionKey>>,
}

impl ObjectBase {
    /// Fresh state with affinity to the current thread
    pub fn new() -> Self {
        Self {
            id: runtime().next_object_id(),
            name: RwLock::new(String::new()),
            self_ref: OnceLock::new(),
            parent: RwLock::new(None),
            children: RwLock::new(Vec::new()),
            thread: RwLock::new(runtime().current_thread()),
            signals_blocked: AtomicBool::new(false),
            dynamic_properties: RwLock::new(BTreeMap::new()),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn object_name(&self) -> String {
        read(&self.name).clone()
    }

    pub fn set_object_name(&self, name: &str) {
        *write(&self.name) = name.to_string();
    }

    /// The object's own handle, if it was created through [`new_object`]
    pub fn handle(&self) -> Option<ObjectHandle> {
        self.self_ref.get().and_then(Weak::upgrade)
    }

    // ---------------------------------------------------------------------
    // Ownership

    pub fn parent(&self) -> Option<ObjectHandle> {
        read(&self.parent).as_ref().and_then(Weak::upgrade)
    }

    pub fn has_parent(&self) -> bool {
        self.parent().is_some()
    }

    pub fn children(&self) -> Vec<ObjectHandle> {
        read(&self.children).clone()
    }

    // ---------------------------------------------------------------------
    // Thread affinity

    /// Thread whose posted-event queue receives queued calls for this object
    pub fn thread(&self) -> ThreadId {
        *read(&self.thread)
    }

    /// Change thread affinity of this object and its children
    pub fn move_to_thread(&self, thread: ThreadId) {
        *write(&self.thread) = thread;
        for child in self.children() {
            child.base().move_to_thread(thread);
        }
        tracing::trace!("Object {} moved to {:?}", self.id, thread);
    }

    // ---------------------------------------------------------------------
    // Signals

    pub fn signals_blocked(&self) -> bool {
        self.signals_blocked.load(Ordering::Acquire)
    }

    /// Block or unblock signal emission; returns the previous state
    pub fn block_signals(&self, block: bool) -> bool {
        self.signals_blocked.swap(block, Ordering::AcqRel)
    }

    // ---------------------------------------------------------------------
    // Dynamic properties

    pub fn dynamic_property(&self, name: &str) -> Variant {
        read(&self.dynamic_properties)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Set a dynamic property; an invalid value removes it
    pub fn set_dynamic_property(&self, name: &str, value: Variant) {
        let mut properties = write(&self.dynamic_properties);
        if value.is_valid() {
            properties.insert(name.to_string(), value);
        } else {
            properties.remove(name);
        }
    }

    pub fn dynamic_property_names(&self) -> Vec<String> {
        read(&self.dynamic_properties).keys().cloned().collect()
    }

    /// Keys of the outgoing connections, in connection order
    pub(crate) fn connection_keys(&self) -> MutexGuard<'_, Vec<ConnectionKey>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ObjectBase {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObjectBase {
    fn drop(&mut self) {
        let keys = std::mem::take(
            self.connections
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if !keys.is_empty() {
            connections::remove_connections(&keys);
        }
    }
}

impl std::fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBase")
            .field("id", &self.id)
            .field("name", &*read(&self.name))
            .field("thread", &self.thread())
            .finish()
    }
}

/// Set or clear the parent of `child`
///
/// The parent keeps its children alive. A child moves to its parent's thread.
pub fn set_parent(child: &ObjectHandle, parent: Option<&ObjectHandle>) {
    let child_id = child.base().id();

    if let Some(old) = child.base().parent() {
        write(&old.base().children).retain(|c| c.base().id() != child_id);
    }

    match parent {
        Some(parent) => {
            *write(&child.base().parent) = Some(Arc::downgrade(parent));
            write(&parent.base().children).push(Arc::clone(child));
            child.base().move_to_thread(parent.base().thread());
        }
        None => *write(&child.base().parent) = None,
    }
}

/// Conversion to `&dyn Object` for both concrete and erased objects
pub trait AsObject {
    fn as_object(&self) -> &dyn Object;
}

impl<T: Object> AsObject for T {
    fn as_object(&self) -> &dyn Object {
        self
    }
}

impl AsObject for dyn Object {
    fn as_object(&self) -> &dyn Object {
        self
    }
}

/// Name-based access helpers
pub trait ObjectExt: AsObject {
    /// Read a declared property, falling back to dynamic properties
    fn property(&self, name: &str) -> Variant {
        let obj = self.as_object();
        let meta = obj.meta_object();
        match meta.index_of_property(name).and_then(|i| meta.property(i)) {
            Some(property) => property.read(obj),
            None => obj.base().dynamic_property(name),
        }
    }

    /// Write a declared property
    ///
    /// Undeclared names are stored as dynamic properties and return false.
    fn set_property(&self, name: &str, value: impl Into<Variant>) -> bool {
        let obj = self.as_object();
        let meta = obj.meta_object();
        match meta.index_of_property(name).and_then(|i| meta.property(i)) {
            Some(property) => property.write(obj, value),
            None => {
                obj.base().set_dynamic_property(name, value.into());
                false
            }
        }
    }

    fn inherits(&self, class_name: &str) -> bool {
        self.as_object().meta_object().inherits(class_name)
    }

    fn downcast_ref<T: Object>(&self) -> Option<&T> {
        downcast_object::<T>(self.as_object())
    }

    /// Invoke a method by signature directly on this thread
    fn invoke(&self, signature: &str, args: &[Variant]) -> Result<Variant, InvokeError> {
        let obj = self.as_object();
        let meta = obj.meta_object();
        let method = meta
            .index_of_method(signature)
            .and_then(|i| meta.method(i))
            .ok_or_else(|| InvokeError::NotInvokable(signature.to_string()))?;
        method.invoke(Some(obj), args)
    }
}

impl<T: AsObject + ?Sized> ObjectExt for T {}

#[cfg(test)]
pub(crate) mod testing {
    //! Small classes shared by unit tests

    use parking_lot::Mutex;

    use super::*;
    use crate::meta::{
        method_jar, read_jar, reset_jar, write_jar, MetaObjectBuilder, MethodBuilder,
        PropertyBuilder,
    };
    use std::sync::atomic::AtomicI32;

    pub struct Counter {
        base: ObjectBase,
        value: AtomicI32,
        pub log: Mutex<Vec<i32>>,
        pub threads: Mutex<Vec<ThreadId>>,
    }

    impl Counter {
        pub fn new(value: i32) -> Self {
            Self {
                base: ObjectBase::new(),
                value: AtomicI32::new(value),
                log: Mutex::new(Vec::new()),
                threads: Mutex::new(Vec::new()),
            }
        }

        pub fn value(&self) -> i32 {
            self.value.load(Ordering::SeqCst)
        }

        pub fn set_value(&self, value: i32) {
            if self.value.swap(value, Ordering::SeqCst) != value {
                connections::emit(self, "valueChanged(i32)", &[Variant::Int(value)]);
            }
        }

        pub fn record(&self, value: i32) {
            self.log.lock().push(value);
            self.threads.lock().push(std::thread::current().id());
        }

        pub fn static_meta_object() -> &'static MetaObject {
            static META: OnceLock<&'static MetaObject> = OnceLock::new();
            META.get_or_init(|| {
                MetaObjectBuilder::for_type::<Counter>("Counter")
                    .property(
                        PropertyBuilder::new::<i32>("value")
                            .read(read_jar(|c: &Counter| c.value()))
                            .write(write_jar(|c: &Counter, v: i32| c.set_value(v)))
                            .reset(reset_jar(|c: &Counter| c.set_value(0)))
                            .notify("valueChanged(i32)")
                            .setter_name("setValue"),
                    )
                    .method(MethodBuilder::signal("valueChanged(i32)"))
                    .method(MethodBuilder::signal("pinged()"))
                    .method(
                        MethodBuilder::slot("setValue(i32)")
                            .invoke(method_jar(|c: &Counter, v: i32| c.set_value(v))),
                    )
                    .method(
                        MethodBuilder::slot("record(i32)")
                            .invoke(method_jar(|c: &Counter, v: i32| c.record(v))),
                    )
                    .method(
                        MethodBuilder::slot("ping()")
                            .invoke(method_jar(|c: &Counter| c.record(-1))),
                    )
                    .method(
                        MethodBuilder::method("add(i32,i32)")
                            .return_type("i32")
                            .invoke(method_jar(|c: &Counter, a: i32, b: i32| c.value() + a + b)),
                    )
                    .factory(|| new_object(Counter::new(0)))
                    .build()
            })
        }
    }

    impl Object for Counter {
        fn meta_object(&self) -> &'static MetaObject {
            Self::static_meta_object()
        }

        fn base(&self) -> &ObjectBase {
            &self.base
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Default)]
    pub struct Other {
        base: ObjectBase,
        flag: AtomicBool,
    }

    impl Other {
        pub fn flag(&self) -> bool {
            self.flag.load(Ordering::SeqCst)
        }
    }

    impl Object for Other {
        fn meta_object(&self) -> &'static MetaObject {
            static META: OnceLock<&'static MetaObject> = OnceLock::new();
            META.get_or_init(|| {
                MetaObjectBuilder::for_type::<Other>("Other")
                    .property(
                        PropertyBuilder::new::<bool>("flag").read(read_jar(|o: &Other| o.flag())),
                    )
                    .method(MethodBuilder::slot("toggle()").invoke(method_jar(|o: &Other| {
                        o.flag.fetch_xor(true, Ordering::SeqCst);
                    })))
                    .method(MethodBuilder::slot("takeText(String)"))
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

    /// A class extending [`Counter`] by embedding it
    pub struct BoundedCounter {
        counter: Counter,
        pub limit: i32,
    }

    impl BoundedCounter {
        pub fn new(limit: i32) -> Self {
            Self {
                counter: Counter::new(0),
                limit,
            }
        }
    }

    impl Object for BoundedCounter {
        fn meta_object(&self) -> &'static MetaObject {
            static META: OnceLock<&'static MetaObject> = OnceLock::new();
            META.get_or_init(|| {
                MetaObjectBuilder::for_type::<BoundedCounter>("BoundedCounter")
                    .super_class(Counter::static_meta_object)
                    .property(
                        PropertyBuilder::new::<i32>("limit")
                            .read(read_jar(|b: &BoundedCounter| b.limit)),
                    )
                    .build()
            })
        }

        fn base(&self) -> &ObjectBase {
            self.counter.base()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn super_object(&self) -> Option<&dyn Object> {
            Some(&self.counter)
        }
    }
}
