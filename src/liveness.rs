use std::{fmt, sync::Arc};

use crate::sync::{Condvar, Mutex};

struct Cell {
    alive: Mutex<bool>,
    condvar: Condvar,
}

/// Creates a live flag and its single writer.
pub(crate) fn liveness() -> (Alive, Liveness) {
    let cell = Arc::new(Cell {
        alive: Mutex::new(true),
        condvar: Condvar::new(),
    });
    (Alive { cell: cell.clone() }, Liveness { cell })
}

/// The only writer of a [`Liveness`] flag, owned by the consumer thread.
///
/// Dropping it marks the worker as dead. Since this happens when the value goes out of scope, the
/// flag is flipped even if the consumer thread unwinds.
pub(crate) struct Alive {
    cell: Arc<Cell>,
}

impl Drop for Alive {
    fn drop(&mut self) {
        *self.cell.alive.lock() = false;
        self.cell.condvar.notify_all();
    }
}

/// Observes whether a worker's consumer thread is still running.
///
/// The flag is `true` when the worker is spawned, and becomes `false` exactly once, after the
/// worker has finished processing its backlog. It never becomes `true` again.
///
/// [`Liveness`] handles can be cloned and outlive the worker they were obtained from.
#[derive(Clone)]
pub struct Liveness {
    cell: Arc<Cell>,
}

impl Liveness {
    /// Returns whether the worker is still alive.
    ///
    /// The answer may be stale by the time it is returned, unless it is `false`.
    pub fn is_alive(&self) -> bool {
        *self.cell.alive.lock()
    }

    /// Blocks the calling thread until the worker has stopped.
    ///
    /// Everything the consumer thread did before stopping (in particular, processing the drained
    /// backlog) is visible to the caller once this returns.
    pub fn wait(&self) {
        drop(self.cell.condvar.wait_while(self.cell.alive.lock(), |alive| *alive));
    }
}

impl fmt::Debug for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Liveness")
            .field("alive", &self.is_alive())
            .finish()
    }
}
