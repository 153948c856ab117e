use super::super::*;
use crate::{
    schedule::{Immediate, Intercept, Job, Schedule},
    util::trace_init,
};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering::Relaxed},
        Arc,
    },
};

/// A scheduler that throws every job away, for exercising deferred
/// execution: the producer can only ever run on a waiter's thread.
#[derive(Copy, Clone, Debug)]
struct Discard;

impl Schedule for Discard {
    fn submit(&self, job: Job) {
        drop(job);
    }
}

#[test]
fn launch_bits() {
    assert!(Launch::ASYNC.contains(Launch::ASYNC));
    assert!(!Launch::ASYNC.contains(Launch::DEFERRED));
    assert!((Launch::ASYNC | Launch::DEFERRED).contains(Launch::DEFERRED));
    assert!(Launch::NONE.contains(Launch::NONE));
    assert!(!Launch::NONE.contains(Launch::ASYNC));

    let mut launch = Launch::NONE;
    launch |= Launch::ASYNC;
    assert_eq!(launch, Launch::ASYNC);

    assert_eq!(format!("{:?}", Launch::NONE), "Launch::NONE");
    assert_eq!(format!("{:?}", Launch::ASYNC | Launch::DEFERRED), "ASYNC | DEFERRED");
}

#[test]
fn ready_future_is_ready() {
    let _trace = trace_init();
    let fut = make_ready_future(27);
    assert!(fut.is_ready());
    assert_eq!(*fut.get(), 27);
    // waiting on a ready future returns immediately
    fut.wait();
    assert_eq!(*fut.get(), 27);
}

#[test]
fn ready_future_by_reference() {
    let target = String::from("borrowed");
    let fut = make_ready_future(&target);
    assert!(fut.is_ready());
    assert_eq!(*fut.get(), &target);
}

#[test]
fn ready_future_of_unit() {
    let fut = make_ready_future(());
    assert!(fut.is_ready());
    fut.get();
}

#[test]
fn immediate_spawn_runs_synchronously() {
    let _trace = trace_init();
    let fut = spawn(|| 6 * 7, &Immediate, Launch::NONE);
    assert!(fut.is_ready());
    assert_eq!(*fut.get(), 42);
}

#[test]
fn deferred_producer_runs_on_the_waiter() {
    let _trace = trace_init();
    let caller = std::thread::current().id();
    let fut = spawn(
        move || {
            assert_eq!(std::thread::current().id(), caller);
            9
        },
        &Discard,
        Launch::DEFERRED,
    );
    assert!(!fut.is_ready());
    assert_eq!(*fut.get(), 9);
    assert!(fut.is_ready());
}

#[test]
fn producer_runs_at_most_once() {
    let _trace = trace_init();
    let runs = Arc::new(AtomicUsize::new(0));
    let fut = spawn(
        {
            let runs = runs.clone();
            move || runs.fetch_add(1, Relaxed)
        },
        &Discard,
        Launch::DEFERRED,
    );
    fut.wait();
    fut.wait();
    assert_eq!(*fut.get(), 0);
    assert_eq!(runs.load(Relaxed), 1);
}

#[test]
fn intercept_captures_instead_of_running() {
    let _trace = trace_init();
    let interceptor = Intercept::new();
    let fut = spawn(|| 5, &interceptor, Launch::NONE);
    assert!(!fut.is_ready());

    let run = interceptor.take().expect("the run must have been captured");
    assert!(interceptor.take().is_none());

    run();
    assert!(fut.is_ready());
    assert_eq!(*fut.get(), 5);
}

#[test]
fn then_on_a_ready_future_runs_now() {
    let _trace = trace_init();
    let fut = make_ready_future(2);
    let chained = fut.then(|fut| *fut.get() + 3, &Immediate, Launch::NONE);
    assert!(chained.is_ready());
    assert_eq!(*chained.get(), 5);
}

#[test]
fn then_runs_after_completion() {
    let _trace = trace_init();
    let interceptor = Intercept::new();
    let fut = spawn(|| 2, &interceptor, Launch::NONE);
    let chained = fut.then(|fut| *fut.get() + 3, &Immediate, Launch::NONE);
    assert!(!chained.is_ready());

    interceptor.take().expect("captured")();
    assert!(chained.is_ready());
    assert_eq!(*chained.get(), 5);
}

#[test]
fn continuations_drain_even_when_installed_after_ready() {
    let _trace = trace_init();
    let fired = Arc::new(AtomicUsize::new(0));
    let fut = make_ready_future(1);
    for _ in 0..3 {
        let fired = fired.clone();
        let _ = fut.then(move |_| fired.fetch_add(1, Relaxed), &Immediate, Launch::NONE);
    }
    assert_eq!(fired.load(Relaxed), 3);
}

#[test]
#[should_panic(expected = "future producer panicked: boom")]
fn producer_panic_propagates_to_get() {
    let fut = spawn(|| -> u32 { panic!("boom") }, &Immediate, Launch::NONE);
    assert!(fut.is_ready());
    let _ = fut.get();
}

#[test]
fn producer_panic_propagates_to_every_get() {
    let fut = spawn(|| -> u32 { panic!("boom") }, &Immediate, Launch::NONE);
    for _ in 0..2 {
        let err = catch_unwind(AssertUnwindSafe(|| *fut.get())).unwrap_err();
        let message = err
            .downcast_ref::<String>()
            .expect("the propagated panic carries a message");
        assert!(message.contains("boom"), "unexpected message: {message}");
    }
}

#[test]
fn when_all_of_nothing_is_ready() {
    let empty = when_all(Vec::<Future<u32>>::new());
    assert!(empty.is_ready());
    assert!(empty.get().is_empty());

    let unit = when_all(());
    assert!(unit.is_ready());
}

#[test]
fn when_all_over_ready_inputs_resolves_synchronously() {
    let _trace = trace_init();
    let all = when_all(vec![make_ready_future(1), make_ready_future(2)]);
    assert!(all.is_ready());
    let values: Vec<u32> = all.get().iter().map(|input| *input.get()).collect();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn when_all_fires_once_on_the_last_input() {
    let _trace = trace_init();
    let first = Intercept::new();
    let second = Intercept::new();
    let a = spawn(|| 1, &first, Launch::NONE);
    let b = spawn(|| 2, &second, Launch::NONE);
    let all = when_all(vec![a, b]);
    assert!(!all.is_ready());

    first.take().expect("captured")();
    assert!(!all.is_ready());

    second.take().expect("captured")();
    assert!(all.is_ready());
    let values: Vec<u32> = all.get().iter().map(|input| *input.get()).collect();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn when_all_tuple_preserves_shape() {
    let _trace = trace_init();
    let interceptor = Intercept::new();
    let pending = spawn(|| 3.5, &interceptor, Launch::NONE);
    let all = when_all((make_ready_future(1), make_ready_future("x"), pending));
    assert!(!all.is_ready());

    interceptor.take().expect("captured")();
    assert!(all.is_ready());
    let (a, b, c) = all.get();
    assert_eq!((*a.get(), *b.get(), *c.get()), (1, "x", 3.5));
}

#[test]
fn when_all_does_not_short_circuit_on_failure() {
    let _trace = trace_init();
    let all = when_all(vec![
        spawn(|| -> u32 { panic!("boom") }, &Immediate, Launch::NONE),
        spawn(|| 2, &Immediate, Launch::NONE),
    ]);
    assert!(all.is_ready());
    let inputs = all.get();
    assert!(catch_unwind(AssertUnwindSafe(|| *inputs[0].get())).is_err());
    assert_eq!(*inputs[1].get(), 2);
}

#[test]
fn handles_share_one_value() {
    let fut = make_ready_future(vec![1, 2, 3]);
    let clone = fut.clone();
    assert_eq!(fut.get().as_ptr(), clone.get().as_ptr());
}

#[test]
fn core_is_released_when_handles_and_run_are_gone() {
    let witness = Arc::new(());
    let interceptor = Intercept::new();
    let fut = spawn(
        {
            let witness = witness.clone();
            move || witness
        },
        &interceptor,
        Launch::NONE,
    );

    // handle + captured run + our local
    assert_eq!(Arc::strong_count(&witness), 2);
    drop(fut);
    assert_eq!(Arc::strong_count(&witness), 2);

    // dropping the captured run drops the producer and with it the witness
    drop(interceptor.take().expect("captured"));
    assert_eq!(Arc::strong_count(&witness), 1);
}

#[test]
fn dropped_continuations_release_their_downstream() {
    let _trace = trace_init();
    let interceptor = Intercept::new();
    let upstream = spawn(|| 1, &interceptor, Launch::NONE);
    let run = interceptor.take().expect("captured");

    let witness = Arc::new(());
    let chained = upstream.then(
        {
            let witness = witness.clone();
            move |_| witness
        },
        &Immediate,
        Launch::NONE,
    );
    assert_eq!(Arc::strong_count(&witness), 2);

    // the upstream run never happens; dropping everything that refers to
    // the chain must still release the downstream producer.
    drop(run);
    drop(upstream);
    drop(chained);
    assert_eq!(Arc::strong_count(&witness), 1);
}

#[test]
fn send_sync_bounds() {
    use crate::util::test::assert_send_sync;
    assert_send_sync::<Future<u32>>();
    assert_send_sync::<Launch>();
    assert_send_sync::<WaitStatus>();
}
