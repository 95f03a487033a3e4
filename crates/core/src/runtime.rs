//! Process-wide runtime
//!
//! Every operation that reads or writes process-wide state (connection
//! table, posted-event queues, object ids, class and type registries,
//! current sender, thread identity) goes through the active [`Runtime`].
//!
//! A plugin `cdylib` links its own copy of this crate, together with its own
//! copies of `std`, `parking_lot` and `tracing`. Left alone, each copy would
//! keep separate tables and would even number threads differently. When the
//! host loads a plugin it hands over its runtime through
//! `metaplug_plugin_attach`; from then on the plugin's calls run the host's
//! code against the host's state. A library that was attached holds entries
//! in those tables (closures, meta objects, tasks), so it is never unloaded.
//!
//! # ABI tag
//!
//! [`abi_tag`] extends the SDK tag (SDK version and compiler) with this
//! crate's version and a fingerprint of the types that cross the library
//! boundary. The host only attaches a library whose tag matches its own.

use std::any::TypeId;
use std::ffi::{CStr, CString};
use std::mem::{align_of, size_of};
use std::sync::{LazyLock, OnceLock};
use std::thread::ThreadId;

use metaplug_sdk::RawRuntime;

use crate::connections::types::Connection;
use crate::connections::{dispatch, manager, ConnectionKey};
use crate::events::{self, PostError, Task};
use crate::meta::{enums, MetaEnum, MetaMethod, MetaObject, MetaProperty};
use crate::metatype;
use crate::object::{self, Object, ObjectBase, ObjectHandle, ObjectId};
use crate::registry;
use crate::variant::Variant;

/// Services backed by process-wide state
///
/// Implemented once, by [`LocalRuntime`]. Callers always go through
/// [`runtime()`], which picks the host's implementation once attached.
pub(crate) trait Runtime: Send + Sync {
    fn current_thread(&self) -> ThreadId;
    fn next_object_id(&self) -> ObjectId;

    fn register_meta_object(&self, meta: &'static MetaObject);
    fn find_meta_object(&self, class_name: &str) -> Option<&'static MetaObject>;
    fn meta_object_of(&self, type_id: TypeId) -> Option<&'static MetaObject>;
    fn registered_classes(&self) -> Vec<String>;

    fn register_type(&self, normalized: &str) -> u32;
    fn user_type_id(&self, normalized: &str) -> Option<u32>;
    fn user_type_name(&self, id: u32) -> Option<String>;
    fn register_enum(&self, type_id: TypeId, meta: &'static MetaEnum);
    fn enum_for_type(&self, type_id: TypeId) -> Option<&'static MetaEnum>;
    fn find_enum(&self, scope: &str, name: &str) -> Option<&'static MetaEnum>;

    fn insert_connection(&self, sender: &dyn Object, connection: Connection) -> ConnectionKey;
    fn remove_connection(&self, key: ConnectionKey) -> bool;
    fn connections_of(
        &self,
        sender: &dyn Object,
        signal_index: usize,
    ) -> Vec<(ConnectionKey, Connection)>;
    fn remove_connections_of(&self, sender: &dyn Object, signal_index: Option<usize>) -> usize;
    fn release_connections(&self, keys: &[ConnectionKey]);

    fn activate(&self, sender: &dyn Object, signal_index: usize, args: &[Variant]);
    fn current_sender(&self) -> Option<(ObjectId, Option<ObjectHandle>)>;

    fn post_event(&self, thread: ThreadId, task: Task, blocking: bool) -> Result<(), PostError>;
    fn process_posted_events(&self) -> usize;
    fn pending_event_count(&self, thread: ThreadId) -> usize;
    fn discard_posted_events(&self) -> usize;

    /// Logger of the host, if it installed one
    fn log_dispatch(&self) -> Option<tracing::Dispatch>;
}

/// The runtime of this copy of the crate
pub(crate) struct LocalRuntime;

impl Runtime for LocalRuntime {
    fn current_thread(&self) -> ThreadId {
        std::thread::current().id()
    }

    fn next_object_id(&self) -> ObjectId {
        object::allocate_id()
    }

    fn register_meta_object(&self, meta: &'static MetaObject) {
        registry::local::register(meta);
    }

    fn find_meta_object(&self, class_name: &str) -> Option<&'static MetaObject> {
        registry::local::find(class_name)
    }

    fn meta_object_of(&self, type_id: TypeId) -> Option<&'static MetaObject> {
        registry::local::of_type(type_id)
    }

    fn registered_classes(&self) -> Vec<String> {
        registry::local::classes()
    }

    fn register_type(&self, normalized: &str) -> u32 {
        metatype::local::register(normalized)
    }

    fn user_type_id(&self, normalized: &str) -> Option<u32> {
        metatype::local::id(normalized)
    }

    fn user_type_name(&self, id: u32) -> Option<String> {
        metatype::local::name(id)
    }

    fn register_enum(&self, type_id: TypeId, meta: &'static MetaEnum) {
        enums::local::register(type_id, meta);
    }

    fn enum_for_type(&self, type_id: TypeId) -> Option<&'static MetaEnum> {
        enums::local::of_type(type_id)
    }

    fn find_enum(&self, scope: &str, name: &str) -> Option<&'static MetaEnum> {
        enums::local::find(scope, name)
    }

    fn insert_connection(&self, sender: &dyn Object, connection: Connection) -> ConnectionKey {
        manager::local::insert(sender, connection)
    }

    fn remove_connection(&self, key: ConnectionKey) -> bool {
        manager::local::remove(key)
    }

    fn connections_of(
        &self,
        sender: &dyn Object,
        signal_index: usize,
    ) -> Vec<(ConnectionKey, Connection)> {
        manager::local::snapshot(sender, signal_index)
    }

    fn remove_connections_of(&self, sender: &dyn Object, signal_index: Option<usize>) -> usize {
        manager::local::remove_all(sender, signal_index)
    }

    fn release_connections(&self, keys: &[ConnectionKey]) {
        manager::local::release(keys);
    }

    fn activate(&self, sender: &dyn Object, signal_index: usize, args: &[Variant]) {
        dispatch::local::activate(sender, signal_index, args);
    }

    fn current_sender(&self) -> Option<(ObjectId, Option<ObjectHandle>)> {
        dispatch::local::current_sender()
    }

    fn post_event(&self, thread: ThreadId, task: Task, blocking: bool) -> Result<(), PostError> {
        events::queue::local::post(thread, task, blocking)
    }

    fn process_posted_events(&self) -> usize {
        events::queue::local::process()
    }

    fn pending_event_count(&self, thread: ThreadId) -> usize {
        events::queue::local::pending(thread)
    }

    fn discard_posted_events(&self) -> usize {
        events::queue::local::discard()
    }

    fn log_dispatch(&self) -> Option<tracing::Dispatch> {
        tracing::dispatcher::has_been_set()
            .then(|| tracing::dispatcher::get_default(tracing::Dispatch::clone))
    }
}

static LOCAL: LocalRuntime = LocalRuntime;

/// Fat reference to [`LOCAL`], so plugins receive the host's vtable
static LOCAL_REF: &(dyn Runtime + 'static) = &LOCAL;

static ATTACHED: OnceLock<&'static dyn Runtime> = OnceLock::new();

/// The active runtime: the host's once attached, else this copy's own
pub(crate) fn runtime() -> &'static dyn Runtime {
    ATTACHED.get().copied().unwrap_or(LOCAL_REF)
}

/// Thread identity as numbered by the active runtime
///
/// Plugin code must not compare `std::thread::current().id()` with ids
/// produced by the host; its copy of `std` numbers threads independently.
pub fn current_thread() -> ThreadId {
    runtime().current_thread()
}

/// Whether this copy of the crate forwards to a host runtime
pub fn is_attached() -> bool {
    ATTACHED.get().is_some()
}

/// Pointer to this copy's runtime, handed to plugin libraries
pub fn raw_runtime() -> *const RawRuntime {
    std::ptr::from_ref::<&'static dyn Runtime>(&LOCAL_REF).cast()
}

/// Forward this copy of the crate to the runtime behind `raw`
///
/// Attaching to this copy's own runtime is a no-op. Returns false for a null
/// pointer, or when already attached to a different runtime.
///
/// # Safety
/// `raw` must come from [`raw_runtime`] in a build whose [`abi_tag`] equals
/// this one.
pub unsafe fn attach(raw: *const RawRuntime) -> bool {
    if raw.is_null() {
        return false;
    }

    let host: &'static dyn Runtime = *raw.cast::<&'static dyn Runtime>();
    if std::ptr::addr_eq(host, LOCAL_REF) {
        return true;
    }

    let attached = *ATTACHED.get_or_init(|| host);
    if !std::ptr::addr_eq(attached, host) {
        tracing::warn!("Runtime already attached to a different host");
        return false;
    }

    if let Some(dispatch) = host.log_dispatch() {
        // fails only when this copy already installed its own logger
        let _ = tracing::dispatcher::set_global_default(dispatch);
    }
    tracing::debug!("Attached to host runtime");
    true
}

/// Full ABI tag of this build
pub fn abi_tag() -> &'static CStr {
    static TAG: LazyLock<CString> = LazyLock::new(|| {
        let tag = format!(
            "{}/core-{}/layout-{:016x}",
            metaplug_sdk::abi_tag_str(),
            env!("CARGO_PKG_VERSION"),
            layout_fingerprint()
        );
        CString::new(tag).unwrap_or_default()
    });
    TAG.as_c_str()
}

/// FNV-1a over the size and alignment of every type shared with plugins
fn layout_fingerprint() -> u64 {
    let shapes = [
        size_of::<MetaObject>(),
        align_of::<MetaObject>(),
        size_of::<MetaMethod>(),
        size_of::<MetaProperty>(),
        size_of::<MetaEnum>(),
        size_of::<ObjectBase>(),
        align_of::<ObjectBase>(),
        size_of::<Connection>(),
        size_of::<Variant>(),
        align_of::<Variant>(),
        size_of::<Task>(),
        size_of::<&'static dyn Runtime>(),
    ];

    shapes.iter().fold(0xcbf2_9ce4_8422_2325_u64, |hash, shape| {
        (hash ^ *shape as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
