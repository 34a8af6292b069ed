//! Bounded background workers that drain their backlog before they stop.
//!
//! This library moves work off the threads that produce it: a worker owns one OS thread and a
//! bounded channel, any number of producer threads write items into the channel, and the worker
//! thread processes them one at a time. It was written for asynchronous logging (keeping slow log
//! I/O off CPU-bound application threads), but nothing in it is specific to logging.
//!
//! # Overview
//!
//! [`BackgroundWorker`] is the generic building block. It provides:
//!
//! - **Backpressure**: the channel holds at most [`Capacity`] items. Once it is full, writers block
//!   until the worker has made room, which bounds the memory used by a slow worker.
//! - **Graceful shutdown**: [`BackgroundWorker::shutdown`] (or dropping the worker) signals the
//!   worker thread to stop, and then waits for it to *finalize*: everything still buffered in the
//!   channel is drained and processed before the thread exits.
//! - **Liveness**: a [`Liveness`] flag that is `true` while the worker runs and turns `false`
//!   exactly once, after finalization. A write either succeeds and is processed, or is handed
//!   back in a [`Rejected`] error once the worker has started to finalize. Nothing disappears.
//!
//! Two specializations cover the common use cases:
//!
//! - [`MessageWorker`] passes every message to one fixed handler. Its [`Writer`] implements
//!   [`Sink`], so it can replace a synchronous destination.
//! - [`ActionWorker`] runs closures, so each submission can go somewhere else.
//!   [`ActionWorker::run`] blocks until the submitted closure has completed.
//!
//! [`scoped`] and [`scoped_actions`] tie a worker's lifetime to a closure.
//!
//! # Failure handling
//!
//! A processing function reports failure by panicking. The panic is caught and logged on the worker
//! thread and is never propagated to producers or to the owner: the worker stops as if it had been
//! shut down, finalizes, and rejects all later writes. If the processing function panics while
//! the backlog is being finalized, the rest of the backlog is discarded. [`Finalized`] reports
//! both.
//!
//! This crate logs through the [`log`] facade. Named workers (see [`WorkerBuilder::name`]) log
//! their lifecycle at `trace` level.
//!
//! # Usage
//!
//! ```
//! use sluice::{BackgroundWorker, Exit};
//! use std::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel();
//! let worker = BackgroundWorker::builder()
//!     .name("uploader")
//!     .capacity(16)
//!     .spawn(move |chunk: Vec<u8>| tx.send(chunk.len()).unwrap())
//!     .unwrap();
//!
//! for size in [3, 1, 4] {
//!     worker.write(vec![0; size]).unwrap();
//! }
//!
//! // All chunks are processed before `shutdown` returns.
//! let finalized = worker.shutdown();
//! assert_eq!(finalized.exit, Exit::Cancelled);
//! assert_eq!(rx.iter().collect::<Vec<_>>(), [3, 1, 4]);
//! ```
//!
//! [`log`]: https://crates.io/crates/log

mod action;
mod channel;
mod completion;
mod drop;
mod liveness;
mod message;
mod scope;
mod sink;
mod sync;
#[cfg(test)]
mod test;
mod worker;

pub use action::{Action, ActionWorker};
pub use channel::{bounded, Capacity, Receiver, Rejected, Sender, TryEnqueueError};
pub use completion::{completion, Abandoned, Completion, Receipt};
pub use liveness::Liveness;
pub use message::MessageWorker;
pub use scope::{scoped, scoped_actions};
pub use sink::Sink;
pub use worker::{BackgroundWorker, Exit, Finalized, Process, Writer, WorkerBuilder};
