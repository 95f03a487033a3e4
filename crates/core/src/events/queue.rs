//! Per-thread posted-event queues

use std::thread::ThreadId;

use crate::runtime::runtime;

/// A unit of work posted to a thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Capacity of each thread's queue
pub const QUEUE_CAPACITY: usize = 1024;

/// Error returned when a task cannot be posted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PostError {
    #[error("Event queue is full")]
    Full,

    #[error("Event queue is disconnected")]
    Disconnected,
}

/// Post a task to run on `thread`
///
/// Safe to call from any thread. The task is dropped if the queue is full.
#[tracing::instrument(skip(task))]
pub fn post_event<F>(thread: ThreadId, task: F) -> Result<(), PostError>
where
    F: FnOnce() + Send + 'static,
{
    runtime().post_event(thread, Box::new(task), false)
}

/// Post a task, blocking while the queue is full
///
/// Never call this for the current thread: a full queue would never drain.
#[tracing::instrument(skip(task))]
pub fn post_event_blocking<F>(thread: ThreadId, task: F) -> Result<(), PostError>
where
    F: FnOnce() + Send + 'static,
{
    runtime().post_event(thread, Box::new(task), true)
}

/// Run the tasks posted to the current thread
///
/// At most [`QUEUE_CAPACITY`] tasks run per call, so tasks that post back to
/// the same thread cannot starve the caller. Returns the number processed.
pub fn process_posted_events() -> usize {
    runtime().process_posted_events()
}

/// Number of tasks waiting for `thread`
pub fn pending_event_count(thread: ThreadId) -> usize {
    runtime().pending_event_count(thread)
}

/// Drop the queue of the current thread, discarding pending tasks
///
/// Call before a worker thread exits.
pub fn discard_posted_events() -> usize {
    runtime().discard_posted_events()
}

pub(crate) mod local {
    use std::sync::LazyLock;
    use std::thread::ThreadId;

    use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
    use dashmap::DashMap;

    use super::{PostError, Task, QUEUE_CAPACITY};

    struct EventQueue {
        sender: Sender<Task>,
        receiver: Receiver<Task>,
    }

    impl EventQueue {
        fn new() -> Self {
            let (sender, receiver) = bounded(QUEUE_CAPACITY);
            Self { sender, receiver }
        }
    }

    static QUEUES: LazyLock<DashMap<ThreadId, EventQueue>> = LazyLock::new(DashMap::new);

    fn sender_for(thread: ThreadId) -> Sender<Task> {
        QUEUES
            .entry(thread)
            .or_insert_with(EventQueue::new)
            .sender
            .clone()
    }

    pub fn post(thread: ThreadId, task: Task, blocking: bool) -> Result<(), PostError> {
        let sender = sender_for(thread);
        if blocking {
            return sender.send(task).map_err(|e| {
                tracing::error!("Failed to post event (blocking): {}", e);
                PostError::Disconnected
            });
        }

        match sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Event queue for {:?} full, dropping event", thread);
                Err(PostError::Full)
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("Event queue for {:?} disconnected", thread);
                Err(PostError::Disconnected)
            }
        }
    }

    pub fn process() -> usize {
        let thread = std::thread::current().id();
        // clone the receiver so tasks may post while we drain
        let Some(receiver) = QUEUES.get(&thread).map(|q| q.receiver.clone()) else {
            return 0;
        };

        let mut count = 0;
        while let Ok(task) = receiver.try_recv() {
            task();
            count += 1;

            if count >= QUEUE_CAPACITY {
                break;
            }
        }

        if count > 0 {
            tracing::trace!("Processed {} posted events on {:?}", count, thread);
        }
        count
    }

    pub fn pending(thread: ThreadId) -> usize {
        QUEUES.get(&thread).map_or(0, |q| q.receiver.len())
    }

    pub fn discard() -> usize {
        let thread = std::thread::current().id();
        QUEUES
            .remove(&thread)
            .map_or(0, |(_, queue)| queue.receiver.len())
    }
}
