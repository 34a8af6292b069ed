use std::{fmt, io};

use crate::{
    channel::{Capacity, Rejected},
    completion::{completion, Abandoned, Receipt},
    liveness::Liveness,
    worker::{BackgroundWorker, Finalized},
};

/// A deferred computation queued on an [`ActionWorker`].
///
/// Actions own whatever they capture; it moves through the channel with them.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

pub(crate) fn run(action: Action) {
    action()
}

/// A [`BackgroundWorker`] that runs the closures submitted to it.
///
/// Where a [`MessageWorker`] sends every message to the same handler, each action decides for
/// itself what to do, so different submissions can go to different destinations. This costs one
/// allocation per submission.
///
/// Actions run one at a time, in submission order for any single producer. An action that panics
/// stops the worker, just like a panicking handler stops a [`MessageWorker`].
///
/// # Examples
///
/// Wait until a message has actually reached its destination:
///
/// ```
/// use sluice::{ActionWorker, Capacity};
/// use std::sync::{Arc, Mutex};
///
/// let worker = ActionWorker::spawn(Capacity::new(16).unwrap()).unwrap();
/// let audit_log = Arc::new(Mutex::new(Vec::new()));
///
/// let log = audit_log.clone();
/// worker
///     .run(move || log.lock().unwrap().push("user logged in"))
///     .unwrap();
///
/// // `run` returned, so the action has completed.
/// assert_eq!(*audit_log.lock().unwrap(), ["user logged in"]);
/// ```
///
/// [`MessageWorker`]: crate::MessageWorker
pub struct ActionWorker {
    inner: BackgroundWorker<Action>,
}

impl ActionWorker {
    /// Spawns an unnamed [`ActionWorker`].
    ///
    /// Use [`BackgroundWorker::builder`] and [`WorkerBuilder::spawn_actions`] to name the thread.
    ///
    /// [`WorkerBuilder::spawn_actions`]: crate::WorkerBuilder::spawn_actions
    pub fn spawn(capacity: Capacity) -> io::Result<Self> {
        BackgroundWorker::spawn(capacity, run).map(Self::from_worker)
    }

    pub(crate) fn from_worker(inner: BackgroundWorker<Action>) -> Self {
        Self { inner }
    }

    /// Queues `f` to be run on the worker thread, blocking while the worker's channel is full.
    ///
    /// If the worker has stopped, the boxed action is handed back in a [`Rejected`] error.
    pub fn submit<F>(&self, f: F) -> Result<(), Rejected<Action>>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.write(Box::new(f))
    }

    /// Queues `f` and returns a [`Receipt`] for its result.
    ///
    /// The result is delivered as the last thing the action does, so once [`Receipt::wait`]
    /// returns `Ok`, every side effect of `f` has happened. If `f` panics, or the worker stops
    /// without running it, the receipt resolves to [`Abandoned`].
    pub fn call<F, R>(&self, f: F) -> Result<Receipt<R>, Rejected<Action>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (completion, receipt) = completion();
        self.submit(move || completion.fulfill(f()))?;
        Ok(receipt)
    }

    /// Runs `f` on the worker thread and blocks until it has completed.
    ///
    /// Returns [`Abandoned`] if the worker has stopped or `f` panicked.
    pub fn run<F, R>(&self, f: F) -> Result<R, Abandoned>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self.call(f) {
            Ok(receipt) => receipt.wait(),
            Err(_) => {
                log::debug!("action submitted to a stopped worker");
                Err(Abandoned::new())
            }
        }
    }

    pub fn liveness(&self) -> Liveness {
        self.inner.liveness()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    /// Signals the worker to stop, without waiting for it. See [`BackgroundWorker::cancel`].
    pub fn cancel(&mut self) {
        self.inner.cancel();
    }

    /// Stops the worker once every action submitted so far has run.
    ///
    /// See [`BackgroundWorker::shutdown`].
    pub fn shutdown(self) -> Finalized {
        self.inner.shutdown()
    }
}

impl fmt::Debug for ActionWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionWorker").field(&self.inner).finish()
    }
}
