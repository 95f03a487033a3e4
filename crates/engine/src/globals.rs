//! Process-wide globals
//!
//! The main thread is recorded once and used as the default thread affinity
//! for plugin objects created without an owner.

use std::sync::OnceLock;
use std::thread::ThreadId;

/// Main thread identity
static MAIN_THREAD: OnceLock<ThreadId> = OnceLock::new();

/// Record the calling thread as the main thread
///
/// Called once during application start-up. Returns error if already set.
pub fn init_main_thread() -> Result<ThreadId, &'static str> {
    let id = std::thread::current().id();
    MAIN_THREAD
        .set(id)
        .map_err(|_| "Main thread already initialized")?;
    tracing::debug!("Main thread recorded: {:?}", id);
    Ok(id)
}

/// Get the main thread identity
///
/// If no thread was recorded yet, the first caller becomes the main thread.
pub fn main_thread_id() -> ThreadId {
    *MAIN_THREAD.get_or_init(|| std::thread::current().id())
}

/// Check if current thread is the main thread
pub fn is_main_thread() -> bool {
    MAIN_THREAD
        .get()
        .map(|id| std::thread::current().id() == *id)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_thread_is_stable() {
        let first = main_thread_id();
        let second = std::thread::spawn(main_thread_id)
            .join()
            .expect("thread panicked");
        assert_eq!(first, second);
        assert!(init_main_thread().is_err());
    }
}
