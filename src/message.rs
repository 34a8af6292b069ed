use std::{fmt, io};

use crate::{
    channel::{Capacity, Rejected},
    liveness::Liveness,
    sink::Sink,
    worker::{BackgroundWorker, Finalized, Writer},
};

/// A [`BackgroundWorker`] bound to one fixed message handler.
///
/// The handler is chosen when the worker is spawned and is moved onto the worker thread, so it
/// has no access to whoever writes a message. Writing a message is all a producer can do, which
/// makes a [`MessageWorker`] (or rather its [`Writer`], see [`MessageWorker::sink`]) usable as a
/// drop-in replacement for a synchronous [`Sink`] that does its work off the calling thread.
///
/// # Examples
///
/// ```
/// use sluice::{Capacity, MessageWorker, Sink};
/// use std::io::Write;
///
/// let worker = MessageWorker::spawn(Capacity::new(64).unwrap(), |line: String| {
///     writeln!(std::io::stderr(), "{line}").ok();
/// })
/// .unwrap();
///
/// let sink = worker.sink();
/// std::thread::spawn(move || sink.accept("hello from another thread".into()))
///     .join()
///     .unwrap();
///
/// // Every line written before this point is flushed to stderr before `shutdown` returns.
/// let finalized = worker.shutdown();
/// assert!(finalized.is_complete());
/// ```
pub struct MessageWorker<M: Send + 'static> {
    inner: BackgroundWorker<M>,
}

impl<M: Send + 'static> MessageWorker<M> {
    /// Spawns an unnamed [`MessageWorker`] that passes every message to `handler`.
    ///
    /// Use [`BackgroundWorker::builder`] and [`WorkerBuilder::spawn_messages`] to name the thread.
    ///
    /// [`WorkerBuilder::spawn_messages`]: crate::WorkerBuilder::spawn_messages
    pub fn spawn<F>(capacity: Capacity, handler: F) -> io::Result<Self>
    where
        F: FnMut(M) + Send + 'static,
    {
        BackgroundWorker::spawn(capacity, handler).map(Self::from_worker)
    }

    /// Spawns a [`MessageWorker`] that forwards every message to a synchronous `sink`.
    ///
    /// The sink is moved onto the worker thread, so slow sinks (files, sockets) no longer hold up
    /// the threads producing messages.
    pub fn spawn_sink<S>(capacity: Capacity, sink: S) -> io::Result<Self>
    where
        S: Sink<M> + Send + 'static,
    {
        Self::spawn(capacity, move |msg| sink.accept(msg))
    }

    pub(crate) fn from_worker(inner: BackgroundWorker<M>) -> Self {
        Self { inner }
    }

    /// Writes a message to the worker, blocking while its channel is full.
    ///
    /// See [`Writer::write`].
    #[inline]
    pub fn write(&self, msg: M) -> Result<(), Rejected<M>> {
        self.inner.write(msg)
    }

    /// Returns a cloneable [`Sink`] that writes to this worker.
    pub fn sink(&self) -> Writer<M> {
        self.inner.writer()
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

    /// Stops the worker once every message written so far has been handled.
    ///
    /// See [`BackgroundWorker::shutdown`].
    pub fn shutdown(self) -> Finalized {
        self.inner.shutdown()
    }
}

impl<M: Send + 'static> Sink<M> for MessageWorker<M> {
    fn accept(&self, msg: M) {
        if self.write(msg).is_err() {
            log::warn!("dropping message written to a stopped worker");
        }
    }
}

impl<M: Send + 'static> fmt::Debug for MessageWorker<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageWorker").field(&self.inner).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        thread,
    };

    use super::*;
    use crate::{test::recorder, worker::Exit};

    fn assert_send<T: Send>() {}

    #[test]
    fn writer_acts_as_sink() {
        let (seen, record) = recorder::<&str>();
        let worker = MessageWorker::spawn(Capacity::new(2).unwrap(), record).unwrap();

        let sink = worker.sink();
        for line in ["a", "b", "c", "d"] {
            sink.accept(line);
        }
        worker.accept("e");

        let finalized = worker.shutdown();
        assert_eq!(finalized.exit, Exit::Cancelled);
        assert_eq!(*seen.lock().unwrap(), ["a", "b", "c", "d", "e"]);

        // The worker is gone; the message is logged and dropped instead of blocking forever.
        sink.accept("f");
        assert_eq!(seen.lock().unwrap().len(), 5);
    }

    #[test]
    fn wraps_a_synchronous_sink() {
        let file = Arc::new(Mutex::new(String::new()));
        let f = file.clone();
        let sink = move |line: String| {
            let mut file = f.lock().unwrap();
            file.push_str(&line);
            file.push('\n');
        };

        let worker = MessageWorker::spawn_sink(Capacity::new(8).unwrap(), sink).unwrap();
        let producers: Vec<_> = (0..3)
            .map(|t| {
                let sink = worker.sink();
                thread::spawn(move || sink.accept(format!("thread {t}")))
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        worker.shutdown();

        let file = file.lock().unwrap();
        assert_eq!(file.lines().count(), 3);
        for t in 0..3 {
            assert!(file.contains(&format!("thread {t}\n")));
        }
    }

    #[test]
    fn named_worker_via_builder() {
        let (seen, record) = recorder::<u8>();
        let worker = BackgroundWorker::builder()
            .name("log-writer")
            .capacity(4)
            .spawn_messages(record)
            .unwrap();
        worker.write(1u8).unwrap();
        assert!(worker.is_alive());
        let liveness = worker.liveness();
        worker.shutdown();
        assert!(!liveness.is_alive());
        assert_eq!(*seen.lock().unwrap(), [1]);
    }

    #[test]
    fn message_worker_is_send() {
        assert_send::<MessageWorker<String>>();
    }
}
