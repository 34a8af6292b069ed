//! Workers whose lifetime is bound to a closure.
//!
//! [`scoped`] spawns a [`MessageWorker`], lends it to a closure, and shuts it down when the closure
//! is done, whether it returns or unwinds. Every message written inside the closure has been
//! handled by the time [`scoped`] returns.

use std::io;

use crate::{action::ActionWorker, channel::Capacity, message::MessageWorker};

/// Runs `body` with a [`MessageWorker`] that passes messages to `handler`, then shuts it down.
///
/// The worker is shut down on every exit path of `body`. If `body` panics, the worker still
/// drains its backlog before the panic continues to unwind.
///
/// Returns an error only if the worker thread could not be spawned, in which case `body` is not
/// run.
///
/// # Examples
///
/// ```
/// use sluice::{scoped, Capacity, Sink};
/// use std::sync::{Arc, Mutex};
///
/// let lines = Arc::new(Mutex::new(Vec::new()));
/// let out = lines.clone();
/// let handler = move |line: String| out.lock().unwrap().push(line);
///
/// let count = scoped(Capacity::new(4).unwrap(), handler, |worker| {
///     let sink = worker.sink();
///     for i in 0..10 {
///         sink.accept(format!("line {i}"));
///     }
///     10
/// })
/// .unwrap();
///
/// assert_eq!(lines.lock().unwrap().len(), count);
/// ```
pub fn scoped<M, F, B, R>(capacity: Capacity, handler: F, body: B) -> io::Result<R>
where
    M: Send + 'static,
    F: FnMut(M) + Send + 'static,
    B: FnOnce(&MessageWorker<M>) -> R,
{
    let worker = MessageWorker::spawn(capacity, handler)?;
    // If `body` unwinds, dropping `worker` performs the shutdown instead.
    let result = body(&worker);
    let finalized = worker.shutdown();
    if !finalized.is_complete() {
        log::warn!(
            "scoped worker discarded {} message(s) during shutdown",
            finalized.discarded
        );
    }
    Ok(result)
}

/// Runs `body` with an [`ActionWorker`], then shuts it down.
///
/// This behaves like [`scoped`]: every action submitted by `body` has run (or was abandoned
/// because an earlier one panicked) when this returns.
pub fn scoped_actions<B, R>(capacity: Capacity, body: B) -> io::Result<R>
where
    B: FnOnce(&ActionWorker) -> R,
{
    let worker = ActionWorker::spawn(capacity)?;
    let result = body(&worker);
    worker.shutdown();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::{
        sink::Sink,
        test::{recorder, silent_panic},
        Liveness,
    };

    fn cap(n: usize) -> Capacity {
        Capacity::new(n).unwrap()
    }

    #[test]
    fn shuts_down_after_body() {
        let (seen, record) = recorder::<u32>();
        let mut liveness = None;
        let sum = scoped(cap(2), record, |worker| {
            liveness = Some(worker.liveness());
            for i in 1..=4 {
                worker.write(i).unwrap();
            }
            10
        })
        .unwrap();

        assert_eq!(sum, 10);
        assert!(!liveness.unwrap().is_alive());
        assert_eq!(*seen.lock().unwrap(), [1, 2, 3, 4]);
    }

    #[test]
    fn shuts_down_when_body_panics() {
        let (seen, record) = recorder::<&str>();
        let mut liveness: Option<Liveness> = None;
        catch_unwind(AssertUnwindSafe(|| {
            scoped(cap(8), record, |worker| {
                liveness = Some(worker.liveness());
                worker.accept("before");
                silent_panic("body failed");
                worker.accept("after");
            })
        }))
        .unwrap_err();

        assert!(!liveness.unwrap().is_alive());
        assert_eq!(*seen.lock().unwrap(), ["before"]);
    }

    #[test]
    fn scoped_actions_run_before_return() {
        let (seen, record) = recorder::<u32>();
        scoped_actions(cap(1), |worker| {
            for i in 0..3 {
                let record = record.clone();
                worker.submit(move || record(i)).unwrap();
            }
        })
        .unwrap();
        assert_eq!(*seen.lock().unwrap(), [0, 1, 2]);
    }
}
