//! Debug-only check that hash and equality hooks do not call back into the
//! table that is running them.
//!
//! `Table` opens a `HookScope` around every stretch of code that invokes
//! `Hooks::hash` or `Hooks::equals`. A hook that reaches the same table
//! through an aliasing pointer would see a probe half done, so in debug builds
//! the nested operation panics and names both operations. Release builds keep
//! no state.

use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct HookScope {
    // Table operation whose hooks are currently running.
    #[cfg(debug_assertions)]
    running: Cell<Option<&'static str>>,
    // Send but !Sync.
    _nosync: PhantomData<Cell<()>>,
}

impl HookScope {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            running: Cell::new(None),
            _nosync: PhantomData,
        }
    }

    /// Mark `op` as running hooks until the returned guard drops.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> HookGuard<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.running.get() {
                panic!("table re-entered by `{op}` from a hook running under `{outer}`");
            }
            self.running.set(Some(op));
            HookGuard { scope: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            HookGuard { _z: PhantomData }
        }
    }
}

pub(crate) struct HookGuard<'a> {
    #[cfg(debug_assertions)]
    scope: &'a HookScope,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for HookGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.scope.running.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::HookScope;

    #[test]
    fn sequential_operations_do_not_trip() {
        let s = HookScope::new();
        drop(s.enter("get"));
        drop(s.enter("put"));
        let _g = s.enter("remove");
    }

    #[cfg(debug_assertions)]
    #[test]
    fn nested_operation_names_both_sides() {
        let s = HookScope::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _outer = s.enter("put");
            let _inner = s.enter("get");
        }));
        let msg = res
            .expect_err("nested hook scope must panic")
            .downcast::<String>()
            .expect("formatted panic message");
        assert!(msg.contains("`get`") && msg.contains("`put`"), "{msg}");

        // Unwinding released the outer scope.
        let _g = s.enter("get");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn nested_operation_is_unchecked_in_release() {
        let s = HookScope::new();
        let _outer = s.enter("put");
        let _inner = s.enter("get");
    }
}
