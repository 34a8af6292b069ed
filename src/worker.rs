use std::{
    fmt, io,
    panic::{self, resume_unwind, AssertUnwindSafe},
    thread::{self, JoinHandle},
};

use crate::{
    action::{self, ActionWorker},
    channel::{self, Capacity, Receiver, Rejected, Sender},
    drop::defer,
    liveness::{self, Alive, Liveness},
    message::MessageWorker,
    sink::Sink,
};

/// Processes the items consumed by a [`BackgroundWorker`].
///
/// This is implemented for every `FnMut(T)` closure that can be sent to the consumer thread. A
/// processing function reports failure by panicking: the consumer thread catches the panic and
/// stops (see [`Exit::Panicked`]).
pub trait Process<T>: Send + 'static {
    fn process(&mut self, item: T);
}

impl<T, F> Process<T> for F
where
    F: FnMut(T) + Send + 'static,
{
    #[inline]
    fn process(&mut self, item: T) {
        self(item)
    }
}

/// A builder object that can be used to configure and spawn a [`BackgroundWorker`].
#[derive(Clone)]
pub struct WorkerBuilder {
    name: Option<String>,
    capacity: Capacity,
}

impl WorkerBuilder {
    /// Sets the name of the worker thread.
    ///
    /// Named workers also log their lifecycle events (at `trace` level) under this name.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the channel capacity of the worker.
    ///
    /// By default, a capacity of 1 is used, which means that a write will block whenever an item
    /// is already waiting for the worker.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[inline]
    pub fn capacity(self, capacity: usize) -> Self {
        assert_ne!(capacity, 0, "capacity must be at least 1");
        Self {
            capacity: Capacity::new(capacity).unwrap_or(Capacity::ONE),
            ..self
        }
    }

    /// Spawns a [`BackgroundWorker`] whose consumer thread hands every item to `process`.
    pub fn spawn<T, P>(self, process: P) -> io::Result<BackgroundWorker<T>>
    where
        T: Send + 'static,
        P: Process<T>,
    {
        let (sender, receiver) = channel::bounded(self.capacity);
        let (stop_sender, stop) = crossbeam_channel::bounded(0);
        let (alive, liveness) = liveness::liveness();
        let mut builder = thread::Builder::new();
        if let Some(name) = self.name.clone() {
            builder = builder.name(name);
        }
        let consumer = Consumer {
            name: self.name,
            receiver,
            stop,
            process,
        };
        let handle = builder.spawn(move || consumer.run(alive))?;

        Ok(BackgroundWorker {
            writer: Writer { sender },
            stop: Some(stop_sender),
            handle: Some(handle),
            liveness,
        })
    }

    /// Spawns a [`MessageWorker`] that passes every message to `handler`.
    pub fn spawn_messages<M, F>(self, handler: F) -> io::Result<MessageWorker<M>>
    where
        M: Send + 'static,
        F: FnMut(M) + Send + 'static,
    {
        self.spawn(handler).map(MessageWorker::from_worker)
    }

    /// Spawns an [`ActionWorker`] that runs every action submitted to it.
    pub fn spawn_actions(self) -> io::Result<ActionWorker> {
        self.spawn(action::run).map(ActionWorker::from_worker)
    }
}

/// Why a worker's consumer thread stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The worker was cancelled or shut down by its owner.
    Cancelled,
    /// The processing function panicked while handling an item. The panic is logged and not
    /// propagated; writes to the worker are rejected from then on.
    Panicked,
}

/// What happened while a worker was finalized.
///
/// Returned by [`BackgroundWorker::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finalized {
    /// Why the steady-state loop stopped.
    pub exit: Exit,
    /// Number of backlog items taken from the channel after it was closed.
    pub drained: usize,
    /// Number of drained items that were never passed to the processing function, because it
    /// panicked on an earlier one.
    pub discarded: usize,
}

impl Finalized {
    /// Returns whether every drained item made it through the processing function.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.discarded == 0
    }
}

/// State moved onto the consumer thread.
struct Consumer<T, P> {
    name: Option<String>,
    receiver: Receiver<T>,
    /// Never receives anything; disconnects when the owner cancels the worker.
    stop: crossbeam_channel::Receiver<()>,
    process: P,
}

impl<T, P: Process<T>> Consumer<T, P> {
    fn run(self, alive: Alive) -> Finalized {
        // Dropped last: the flag flips after the backlog is processed, even if something below
        // unwinds.
        let _alive = alive;
        let Consumer {
            name,
            mut receiver,
            stop,
            mut process,
        } = self;
        let _guard;
        if let Some(name) = &name {
            log::trace!("worker '{name}' starting");
            let name = name.clone();
            _guard = defer(move || log::trace!("worker '{name}' exiting"));
        }
        let label = name.as_deref().unwrap_or("<unnamed>");

        // `dequeue_unless` checks `stop` before every item, so a continuous stream of writes
        // cannot keep the worker from stopping. The owner's `Writer` keeps the channel connected,
        // so running out of items means it was cancelled too.
        let steady = panic::catch_unwind(AssertUnwindSafe(|| {
            while let Some(item) = receiver.dequeue_unless(&stop) {
                process.process(item);
            }
            Exit::Cancelled
        }));
        let exit = match steady {
            Ok(exit) => exit,
            Err(payload) => {
                log::error!(
                    "worker '{label}' handler panicked: {}",
                    panic_message(&*payload)
                );
                Exit::Panicked
            }
        };

        // Once closed, nothing else can get in, so the drain below sees every write that was
        // accepted. Blocked and later writes are rejected.
        receiver.close();
        let backlog = receiver.drain();
        drop(receiver);
        let drained = backlog.len();
        log::debug!("worker '{label}' stopping ({exit:?}), draining {drained} item(s)");

        let mut processed = 0;
        let finalization = panic::catch_unwind(AssertUnwindSafe(|| {
            for item in backlog {
                processed += 1;
                process.process(item);
            }
        }));
        let discarded = drained - processed;
        if let Err(payload) = finalization {
            log::warn!(
                "worker '{label}' handler panicked while draining: {}",
                panic_message(&*payload)
            );
            log::warn!("worker '{label}' discarding {discarded} item(s)");
        }

        Finalized {
            exit,
            drained,
            discarded,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// A cloneable handle that writes items to a [`BackgroundWorker`].
///
/// [`Writer`]s can be handed to any number of producer threads. They do not keep the worker
/// alive: once the worker has stopped, writes are rejected.
pub struct Writer<T> {
    sender: Sender<T>,
}

impl<T> Clone for Writer<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> Writer<T> {
    /// Writes an item to the worker.
    ///
    /// If the worker's channel is full, this blocks until the worker has made room. This is the
    /// only form of backpressure a worker applies to its producers.
    ///
    /// A write that returns `Ok` is always processed, even if the worker is being shut down at the
    /// same time (unless the processing function panics while finalizing, see
    /// [`Finalized::discarded`]). Once the worker has started finalizing (it was cancelled, or its
    /// processing function panicked), the item is handed back in a [`Rejected`] error instead.
    /// Producers that are blocked waiting for room at that moment are released with the same
    /// error, even though finalization frees up the channel.
    pub fn write(&self, item: T) -> Result<(), Rejected<T>> {
        self.sender.enqueue(item)
    }

    /// Returns the number of items waiting to be processed.
    #[inline]
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    #[inline]
    pub fn capacity(&self) -> Capacity {
        self.sender.capacity()
    }
}

impl<T> Sink<T> for Writer<T> {
    fn accept(&self, msg: T) {
        if self.write(msg).is_err() {
            log::warn!("dropping message written to a stopped worker");
        }
    }
}

impl<T> fmt::Debug for Writer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("pending", &self.pending())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// An owned background thread that consumes items of type `T` from a bounded channel.
///
/// The thread hands every item to the processing function it was spawned with, one at a time,
/// until the worker is cancelled. It then *finalizes*: everything still buffered in the channel is
/// drained and processed, and only then does the worker report itself as dead through its
/// [`Liveness`] flag.
///
/// This type enforces structured concurrency: dropping it shuts the worker down just like
/// [`BackgroundWorker::shutdown`] does, so no backlog is lost and no thread outlives its owner.
pub struct BackgroundWorker<T: Send + 'static> {
    writer: Writer<T>,
    /// Dropped to signal cancellation.
    stop: Option<crossbeam_channel::Sender<()>>,
    handle: Option<JoinHandle<Finalized>>,
    liveness: Liveness,
}

impl<T: Send + 'static> Drop for BackgroundWorker<T> {
    fn drop(&mut self) {
        self.cancel();
        self.liveness.wait();

        if let Some(handle) = self.handle.take() {
            // Handler panics are caught on the consumer thread, so this only forwards bugs in the
            // consumer loop itself.
            if let Err(payload) = handle.join() {
                if !thread::panicking() {
                    resume_unwind(payload);
                }
            }
        }
    }
}

impl BackgroundWorker<()> {
    /// Returns a builder that can be used to configure and spawn a [`BackgroundWorker`].
    #[inline]
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder {
            name: None,
            capacity: Capacity::ONE,
        }
    }
}

impl<T: Send + 'static> BackgroundWorker<T> {
    /// Spawns an unnamed worker with the given channel capacity.
    pub fn spawn<P: Process<T>>(capacity: Capacity, process: P) -> io::Result<Self> {
        WorkerBuilder {
            name: None,
            capacity,
        }
        .spawn(process)
    }

    /// Writes an item to the worker, blocking while its channel is full.
    ///
    /// See [`Writer::write`].
    #[inline]
    pub fn write(&self, item: T) -> Result<(), Rejected<T>> {
        self.writer.write(item)
    }

    /// Returns a cloneable handle that can write to this worker from other threads.
    pub fn writer(&self) -> Writer<T> {
        self.writer.clone()
    }

    /// Returns a handle that observes whether the consumer thread is still running.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Returns the number of items waiting to be processed.
    #[inline]
    pub fn pending(&self) -> usize {
        self.writer.pending()
    }

    /// Signals the worker to stop, without waiting for it.
    ///
    /// The consumer thread notices the signal as soon as it is waiting for an item, or after it
    /// has finished processing the current one. It then finalizes as described on
    /// [`BackgroundWorker`]. Use [`Liveness::wait`] or [`BackgroundWorker::shutdown`] to wait for
    /// that to complete. Calling this more than once has no further effect.
    pub fn cancel(&mut self) {
        if self.stop.take().is_some() {
            log::trace!("worker cancelled");
        }
    }

    /// Stops the worker and blocks until its backlog is processed.
    ///
    /// This cancels the worker, waits until its [`Liveness`] flag reports it as dead, and returns
    /// a report of the finalization. Shutdown always completes: a panic in the processing function
    /// is logged and reflected in the returned [`Finalized`], never propagated.
    pub fn shutdown(mut self) -> Finalized {
        self.cancel();
        self.liveness.wait();

        let handle = self.handle.take().unwrap();
        match handle.join() {
            Ok(finalized) => finalized,
            Err(payload) => resume_unwind(payload),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for BackgroundWorker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundWorker")
            .field("alive", &self.is_alive())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
