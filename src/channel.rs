//! The bounded hand-off channel between producers and a worker's consumer thread.
//!
//! [`bounded`] creates a connected [`Sender`]/[`Receiver`] pair. The [`Sender`] can be cloned
//! freely and shared between any number of producer threads, while the [`Receiver`] is unique and
//! all of its consuming methods take `&mut self`: a channel always has exactly one consumer.
//!
//! Apart from the usual blocking [`Sender::enqueue`] and [`Receiver::dequeue`], the receiving end
//! offers [`Receiver::close`], which stops the channel from accepting new items, and
//! [`Receiver::drain`], which takes everything that is currently buffered without waiting for
//! anything more to arrive. Workers close and then drain their channel when they are shut down, so
//! an item is either refused or reaches the consumer, never both and never neither.

use std::{error::Error, fmt, num::NonZeroUsize, sync::Arc};

use crossbeam_channel::{select, TryRecvError, TrySendError};

use crate::sync::{Condvar, Mutex};

/// The maximum number of items a channel can hold before producers are blocked.
///
/// A capacity is never zero: a zero-capacity channel could not buffer the backlog that a worker
/// is supposed to drain on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Capacity(NonZeroUsize);

impl Capacity {
    /// A capacity of one item.
    pub const ONE: Self = Self(NonZeroUsize::MIN);

    /// Creates a [`Capacity`] of `n` items, or returns [`None`] if `n` is 0.
    #[inline]
    pub const fn new(n: usize) -> Option<Self> {
        match NonZeroUsize::new(n) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl From<NonZeroUsize> for Capacity {
    fn from(n: NonZeroUsize) -> Self {
        Self(n)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Admission control shared by both ends.
///
/// Items only enter the channel while `closed` is locked and `false`, so once the receiver has set
/// it, the buffered items are final. Producers waiting for room sleep on `room` instead of inside
/// crossbeam, which lets closing wake them up without dropping the buffered items.
struct Gate {
    closed: Mutex<bool>,
    room: Condvar,
}

/// Creates a bounded channel that buffers up to `capacity` items.
pub fn bounded<T>(capacity: Capacity) -> (Sender<T>, Receiver<T>) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity.get());
    let gate = Arc::new(Gate {
        closed: Mutex::new(false),
        room: Condvar::new(),
    });
    (
        Sender {
            inner: sender,
            gate: gate.clone(),
            capacity,
        },
        Receiver {
            inner: receiver,
            gate,
            capacity,
        },
    )
}

/// The producing end of a bounded channel.
pub struct Sender<T> {
    inner: crossbeam_channel::Sender<T>,
    gate: Arc<Gate>,
    capacity: Capacity,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> Sender<T> {
    /// Appends `item` to the channel, blocking while the channel is full.
    ///
    /// Once the channel is closed (see [`Receiver::close`]), the item can never be consumed, so it
    /// is handed back in a [`Rejected`] error. Producers that are blocked on a full channel when it
    /// is closed are woken up and get their item back the same way. An item for which this returns
    /// `Ok` was buffered before the channel closed, and is seen by the next [`Receiver::drain`].
    pub fn enqueue(&self, mut item: T) -> Result<(), Rejected<T>> {
        let mut closed = self.gate.closed.lock();
        loop {
            if *closed {
                return Err(Rejected(item));
            }
            match self.inner.try_send(item) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(back)) => {
                    item = back;
                    closed = self.gate.room.wait(closed);
                }
                Err(TrySendError::Disconnected(back)) => return Err(Rejected(back)),
            }
        }
    }

    /// Appends `item` to the channel if there is room for it, without blocking.
    pub fn try_enqueue(&self, item: T) -> Result<(), TryEnqueueError<T>> {
        let closed = self.gate.closed.lock();
        if *closed {
            return Err(TryEnqueueError::Disconnected(item));
        }
        self.inner.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => TryEnqueueError::Full(item),
            TrySendError::Disconnected(item) => TryEnqueueError::Disconnected(item),
        })
    }

    /// Returns the number of items currently buffered.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns whether the next [`Sender::enqueue`] would block.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }
}

/// The consuming end of a bounded channel.
///
/// There is only ever one [`Receiver`] per channel. Dropping it closes the channel and drops the
/// buffered items with it.
pub struct Receiver<T> {
    inner: crossbeam_channel::Receiver<T>,
    gate: Arc<Gate>,
    capacity: Capacity,
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> Receiver<T> {
    /// Removes and returns the oldest item, blocking while the channel is empty.
    ///
    /// Returns [`None`] once every [`Sender`] has been dropped and no items are left.
    pub fn dequeue(&mut self) -> Option<T> {
        let item = self.inner.recv().ok()?;
        self.made_room();
        Some(item)
    }

    /// Removes and returns the oldest item if there is one, without blocking.
    pub fn try_dequeue(&mut self) -> Option<T> {
        let item = self.inner.try_recv().ok()?;
        self.made_room();
        Some(item)
    }

    /// Like [`Receiver::dequeue`], but gives up as soon as `stop` is disconnected.
    ///
    /// Returns [`None`] if `stop` is disconnected (also when it already was before the call and an
    /// item is available) or if every [`Sender`] is gone.
    pub(crate) fn dequeue_unless(&mut self, stop: &crossbeam_channel::Receiver<()>) -> Option<T> {
        if let Err(TryRecvError::Disconnected) = stop.try_recv() {
            return None;
        }
        let item = select! {
            recv(self.inner) -> item => item.ok()?,
            recv(stop) -> _ => return None,
        };
        self.made_room();
        Some(item)
    }

    /// Removes and returns every item that is buffered at the time of the call, oldest first.
    ///
    /// This never blocks. If the channel is open, items enqueued concurrently with the call are
    /// left in the channel: since this [`Receiver`] is the only consumer, the first `len()` items
    /// it pulls are exactly the items that were present when the drain started. After
    /// [`Receiver::close`], nothing can be added anymore, so this takes everything that will ever
    /// be sent.
    pub fn drain(&mut self) -> Vec<T> {
        let present = self.inner.len();
        let mut items = Vec::with_capacity(present);
        items.extend(self.inner.try_iter().take(present));
        if !items.is_empty() {
            self.made_room();
        }
        items
    }

    /// Stops the channel from accepting items.
    ///
    /// Items that are already buffered stay in the channel. Every later [`Sender::enqueue`] fails
    /// with [`Rejected`], including those currently blocked waiting for room.
    pub fn close(&mut self) {
        let mut closed = self.gate.closed.lock();
        if !*closed {
            *closed = true;
            self.gate.room.notify_all();
        }
    }

    /// Returns whether [`Receiver::close`] was called.
    pub fn is_closed(&self) -> bool {
        *self.gate.closed.lock()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    fn made_room(&self) {
        // Taking the lock orders this after any producer's failed `try_send`, so the producer is
        // already waiting and the wakeup is not lost.
        let _closed = self.gate.closed.lock();
        self.gate.room.notify_all();
    }
}

/// An item that could not be enqueued because the channel was closed or its [`Receiver`] is gone.
///
/// The item is handed back to the producer. When writing to a worker, this means that the worker
/// has stopped (it was shut down, or its handler panicked).
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Rejected<T>(pub T);

impl<T> Rejected<T> {
    /// Returns the item that was not enqueued.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rejected { .. }")
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("item rejected because the receiving end has stopped")
    }
}

impl<T> Error for Rejected<T> {}

/// Error returned by [`Sender::try_enqueue`].
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum TryEnqueueError<T> {
    /// The channel is at capacity.
    Full(T),
    /// The channel was closed, or the [`Receiver`] has been dropped.
    Disconnected(T),
}

impl<T> TryEnqueueError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryEnqueueError::Full(item) | TryEnqueueError::Disconnected(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, TryEnqueueError::Full(_))
    }
}

impl<T> fmt::Debug for TryEnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryEnqueueError::Full(_) => f.write_str("Full(..)"),
            TryEnqueueError::Disconnected(_) => f.write_str("Disconnected(..)"),
        }
    }
}

impl<T> fmt::Display for TryEnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryEnqueueError::Full(_) => f.write_str("channel is full"),
            TryEnqueueError::Disconnected(_) => {
                f.write_str("item rejected because the receiving end has stopped")
            }
        }
    }
}

impl<T> Error for TryEnqueueError<T> {}
