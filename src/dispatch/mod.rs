//! Asynchronous dispatch pipeline: queue, producer, and consumer workers.
//!
//! Request acceptance and delivery are decoupled by a bounded in-process
//! queue of request ids. The [`queue::Producer`] publishes an id once the
//! request is durably recorded; [`queue::run_workers`] spawns the consumer
//! pool, each worker driving the [`worker::DispatchWorker`] state machine to
//! a terminal status per consumed id.
//!
//! Delivery is at-least-once from the worker's perspective: reprocessing an
//! id converges because the row store refuses to revert a terminal status.

pub mod queue;
pub mod worker;

pub use queue::{dispatch_queue, run_workers, Producer};
pub use worker::DispatchWorker;
