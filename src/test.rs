//! Internal unit test utilities.

use std::{
    panic::resume_unwind,
    sync::{Arc, Condvar, Mutex},
};

/// Panics without invoking the panic hook, so expected panics don't clutter the test output.
pub fn silent_panic(msg: &str) {
    resume_unwind(Box::new(msg.to_string()));
}

/// Returns a shared log of items and a cloneable handler that appends to it.
pub fn recorder<T: Send + 'static>() -> (
    Arc<Mutex<Vec<T>>>,
    impl Fn(T) + Clone + Send + Sync + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    (seen, move |item| log.lock().unwrap().push(item))
}

/// A latch that blocks every waiter until it is opened once.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        *self.0 .0.lock().unwrap() = true;
        self.0 .1.notify_all();
    }

    pub fn wait(&self) {
        let (open, condvar) = &*self.0;
        drop(condvar.wait_while(open.lock().unwrap(), |open| !*open).unwrap());
    }
}
