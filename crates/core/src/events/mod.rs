//! Posted events
//!
//! Every thread that owns objects has a bounded queue of tasks. Queued
//! signal deliveries are posted to the receiver's thread and run when that
//! thread calls [`process_posted_events`].

pub mod queue;

pub use queue::*;
