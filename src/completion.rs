use std::{error::Error, fmt, mem, sync::Arc};

use crate::sync::{Condvar, Mutex};

/// Creates a connected pair of [`Completion`] and [`Receipt`].
///
/// This is the one-shot signal that [`ActionWorker::call`] uses to tell a submitting thread that
/// its action has run, but it works just as well on its own.
///
/// [`ActionWorker::call`]: crate::ActionWorker::call
pub fn completion<T>() -> (Completion<T>, Receipt<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending),
        condvar: Condvar::new(),
    });
    (
        Completion {
            shared: Some(shared.clone()),
        },
        Receipt { shared },
    )
}

enum State<T> {
    Pending,
    Done(T),
    Abandoned,
    Taken,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    condvar: Condvar,
}

impl<T> Shared<T> {
    fn settle(&self, state: State<T>) {
        *self.state.lock() = state;
        self.condvar.notify_all();
    }
}

/// The sending half of a one-shot signal.
///
/// Calling [`Completion::fulfill`] wakes the thread waiting on the connected [`Receipt`]. Dropping
/// the [`Completion`] without fulfilling it (for example, because the code holding it panicked)
/// wakes the waiter with an [`Abandoned`] error instead.
pub struct Completion<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.settle(State::Abandoned);
        }
    }
}

impl<T> Completion<T> {
    /// Fulfills the completion with `value`, waking the waiter if there is one.
    ///
    /// If the [`Receipt`] was dropped, `value` is dropped too and nothing happens.
    pub fn fulfill(mut self, value: T) {
        if let Some(shared) = self.shared.take() {
            shared.settle(State::Done(value));
        }
    }
}

/// The receiving half of a one-shot signal.
pub struct Receipt<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receipt<T> {
    /// Blocks the calling thread until the connected [`Completion`] is fulfilled or dropped.
    pub fn wait(self) -> Result<T, Abandoned> {
        let mut state = self
            .shared
            .condvar
            .wait_while(self.shared.state.lock(), |s| matches!(s, State::Pending));
        match mem::replace(&mut *state, State::Taken) {
            State::Done(value) => Ok(value),
            State::Abandoned => Err(Abandoned::new()),
            State::Pending | State::Taken => unreachable!(),
        }
    }

    /// Returns whether [`Receipt::wait`] would return without blocking.
    pub fn is_ready(&self) -> bool {
        !matches!(*self.shared.state.lock(), State::Pending)
    }
}

/// The [`Completion`] connected to a [`Receipt`] was dropped without being fulfilled.
///
/// When the [`Receipt`] came from an [`ActionWorker`], this means that the action panicked, or that
/// the worker stopped before it could run the action.
///
/// [`ActionWorker`]: crate::ActionWorker
#[derive(Debug, Clone)]
pub struct Abandoned {
    _priv: (),
}

impl Abandoned {
    pub(crate) fn new() -> Self {
        Self { _priv: () }
    }
}

impl fmt::Display for Abandoned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("completion was dropped without being fulfilled")
    }
}

impl Error for Abandoned {}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn fulfillment() {
        let (completion, receipt) = completion();
        assert!(!receipt.is_ready());
        completion.fulfill(42);
        assert!(receipt.is_ready());
        assert_eq!(receipt.wait().unwrap(), 42);
    }

    #[test]
    fn drop_abandons() {
        let (completion, receipt) = completion::<()>();
        drop(completion);
        assert!(receipt.is_ready());
        receipt.wait().unwrap_err();
    }

    #[test]
    fn wakes_waiter_on_other_thread() {
        let (completion, receipt) = completion();
        let waiter = thread::spawn(move || receipt.wait());
        completion.fulfill("done");
        assert_eq!(waiter.join().unwrap().unwrap(), "done");
    }

    #[test]
    fn fulfill_after_receipt_dropped() {
        let (completion, receipt) = completion();
        drop(receipt);
        completion.fulfill(String::from("ignored"));
    }

    #[test]
    fn halves_are_send() {
        assert_send::<Completion<()>>();
        assert_send::<Receipt<()>>();
    }
}
