//! The lock-free continuation chain of a future core.
//!
//! Continuations are pushed with a CAS loop onto an intrusive atomic LIFO
//! stack, and drained by swapping the whole stack for null; the drain is
//! the exclusive owner of the detached list's linkage. LIFO order is
//! intentional (the cheapest lock-free push) and acceptable because nothing
//! depends on the order continuations run in.
use crate::{
    loom::{
        cell::UnsafeCell,
        sync::atomic::{AtomicPtr, Ordering::*},
    },
    schedule::Job,
};
use core::ptr::{self, NonNull};

/// A single registered continuation: one link in the chain, owning the
/// one-shot thunk to run when the future completes.
pub(crate) struct Continuation {
    /// The next node in the chain.
    ///
    /// Written only while the node is unpublished (during the push loop)
    /// and read only by the drain that detached it.
    next: UnsafeCell<Option<NonNull<Continuation>>>,
    thunk: Job,
}

/// An atomic intrusive LIFO stack of [`Continuation`]s.
pub(crate) struct ThenChain {
    head: AtomicPtr<Continuation>,
}

/// An iterator draining a detached chain, yielding ownership of each node.
pub(crate) struct Drain {
    next: Option<NonNull<Continuation>>,
}

// === impl Continuation ===

impl Continuation {
    pub(crate) fn new(thunk: Job) -> Box<Self> {
        Box::new(Self {
            next: UnsafeCell::new(None),
            thunk,
        })
    }

    /// Runs the continuation, consuming it.
    pub(crate) fn invoke(self: Box<Self>) {
        (self.thunk)()
    }
}

// === impl ThenChain ===

impl ThenChain {
    loom_const_fn! {
        pub(crate) fn new() -> Self {
            Self {
                head: AtomicPtr::new(ptr::null_mut()),
            }
        }
    }

    /// Publishes `cont` as the new head of the chain.
    pub(crate) fn push(&self, cont: Box<Continuation>) {
        let ptr = NonNull::from(Box::leak(cont));
        let mut head = self.head.load(Relaxed);
        loop {
            unsafe {
                ptr.as_ref().next.with_mut(|next| *next = NonNull::new(head));
            }

            match self
                .head
                .compare_exchange_weak(head, ptr.as_ptr(), AcqRel, Acquire)
            {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    /// Detaches the entire chain, returning an iterator that owns it.
    pub(crate) fn take_all(&self) -> Drain {
        let head = self.head.swap(ptr::null_mut(), AcqRel);
        Drain {
            next: NonNull::new(head),
        }
    }
}

impl Drop for ThenChain {
    fn drop(&mut self) {
        // Continuations that were never drained are dropped without being
        // invoked; each node keeps its downstream future alive, so dropping
        // the thunk releases that reference.
        drop(self.take_all());
    }
}

// === impl Drain ===

impl Iterator for Drain {
    type Item = Box<Continuation>;

    fn next(&mut self) -> Option<Self::Item> {
        let curr = self.next.take()?;
        unsafe {
            // the drain owns the detached list, so it is the only one
            // reading this node's linkage.
            let node = Box::from_raw(curr.as_ptr());
            self.next = node.next.with_mut(|next| (*next).take());
            Some(node)
        }
    }
}

impl Drop for Drain {
    fn drop(&mut self) {
        for cont in self {
            drop(cont);
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering::Relaxed},
        Arc,
    };

    fn counting(order: &Arc<std::sync::Mutex<Vec<usize>>>, n: usize) -> Box<Continuation> {
        let order = order.clone();
        Continuation::new(Box::new(move || order.lock().unwrap().push(n)))
    }

    #[test]
    fn drains_lifo() {
        let chain = ThenChain::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for n in 0..3 {
            chain.push(counting(&order, n));
        }

        for cont in chain.take_all() {
            cont.invoke();
        }
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);

        // a second drain finds nothing
        assert_eq!(chain.take_all().count(), 0);
    }

    #[test]
    fn dropping_chain_does_not_invoke() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));

        struct DropFlag(Arc<AtomicUsize>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.fetch_add(1, Relaxed);
            }
        }

        let chain = ThenChain::new();
        for _ in 0..2 {
            let invoked = invoked.clone();
            let flag = DropFlag(dropped.clone());
            chain.push(Continuation::new(Box::new(move || {
                let _flag = &flag;
                invoked.fetch_add(1, Relaxed);
            })));
        }

        drop(chain);
        assert_eq!(invoked.load(Relaxed), 0);
        assert_eq!(dropped.load(Relaxed), 2);
    }
}
