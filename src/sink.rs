/// Anything that accepts a message and performs a side effect with it.
///
/// This is the shape a logging destination has from the point of view of application code. A
/// [`MessageWorker`] can stand in for any synchronous sink: its [`Writer`] implements [`Sink`],
/// and the only observable difference is that [`Sink::accept`] may block while the worker's
/// channel is full.
///
/// Every `Fn(M)` closure is a [`Sink`], and so are references and boxes of one.
///
/// [`MessageWorker`]: crate::MessageWorker
/// [`Writer`]: crate::Writer
pub trait Sink<M> {
    fn accept(&self, msg: M);
}

impl<M, F: Fn(M)> Sink<M> for F {
    #[inline]
    fn accept(&self, msg: M) {
        self(msg)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn log_twice<S: Sink<&'static str>>(sink: S) {
        sink.accept("one");
        sink.accept("two");
    }

    #[test]
    fn closures_are_sinks() {
        let lines = RefCell::new(Vec::new());
        let push = |msg: &'static str| lines.borrow_mut().push(msg);
        log_twice(&push);

        let boxed: Box<dyn Fn(&'static str) + '_> = Box::new(&push);
        log_twice(boxed);
        assert_eq!(*lines.borrow(), ["one", "two", "one", "two"]);
    }
}
