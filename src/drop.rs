//! Utilities related to destructors and drop.

/// Drop guard returned by [`defer`].
#[must_use = "`Defer` should be assigned to a variable, or it will be dropped immediately"]
pub struct Defer<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for Defer<F> {
    fn drop(&mut self) {
        if let Some(cb) = self.0.take() {
            cb();
        }
    }
}

/// Returns a value that runs `cb` when dropped, including during unwinding.
pub fn defer<F: FnOnce()>(cb: F) -> Defer<F> {
    Defer(Some(cb))
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        panic::{catch_unwind, AssertUnwindSafe},
    };

    use super::*;
    use crate::test::silent_panic;

    #[test]
    fn runs_on_unwind() {
        let ran = Cell::new(false);
        catch_unwind(AssertUnwindSafe(|| {
            let _guard = defer(|| ran.set(true));
            silent_panic("boom");
        }))
        .unwrap_err();
        assert!(ran.get());
    }

    #[test]
    fn guards_run_in_reverse_order() {
        let order = Cell::new(0);
        {
            let _outer = defer(|| {
                assert_eq!(order.get(), 1);
                order.set(2);
            });
            let _inner = defer(|| order.set(1));
        }
        assert_eq!(order.get(), 2);
    }
}
