//! Fan-in composition: a future that resolves when every input has.
use super::{make_ready_future, Future, Launch};
use crate::{
    loom::sync::{
        atomic::{AtomicUsize, Ordering::*},
        Arc, Mutex,
    },
    schedule::{Immediate, Intercept, Job},
};

/// Returns a future that resolves once every future in `inputs` has.
///
/// Accepts either a `Vec` of homogeneous futures or a tuple of up to eight
/// heterogeneous ones, and resolves to the same container of (by then
/// resolved) input handles, moved into the output:
///
/// ```
/// use enoki::{make_ready_future, when_all};
///
/// let whole_vec = when_all(vec![make_ready_future(1), make_ready_future(2)]);
/// let summed: i32 = whole_vec.get().iter().map(|input| *input.get()).sum();
/// assert_eq!(summed, 3);
///
/// let pair = when_all((make_ready_future(1), make_ready_future("two")));
/// let (one, two) = pair.get();
/// assert_eq!((*one.get(), *two.get()), (1, "two"));
/// ```
///
/// A failed input does not short-circuit the aggregate: the output resolves
/// when every input has resolved, and a propagated producer panic surfaces
/// only when `get` is called on that element.
///
/// The empty cases (an empty `Vec`, or the unit tuple `()`) resolve
/// immediately.
pub fn when_all<W: WhenAll>(inputs: W) -> Future<W> {
    inputs.when_all()
}

/// A container of futures that [`when_all`] can fan in over.
///
/// Implemented for `Vec<Future<T>>`, for tuples of futures up to arity
/// eight, and for `()`.
pub trait WhenAll: Send + Sync + Sized + 'static {
    /// See [`when_all`].
    fn when_all(self) -> Future<Self>;
}

/// Shared state of one fan-in: how many inputs are still pending, and the
/// captured run of the output future, fired by whichever input resolves
/// last.
struct FanIn {
    remaining: AtomicUsize,
    thunk: Mutex<Option<Job>>,
}

// === impl FanIn ===

impl FanIn {
    fn armed(inputs: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(inputs),
            thunk: Mutex::new(None),
        })
    }

    /// Whether every input has already resolved.
    ///
    /// The relaxed load is only an optimization for the output producer's
    /// walk; the ordering that makes input values visible is the acquire
    /// status load inside each input's `wait`.
    fn resolved(&self) -> bool {
        self.remaining.load(Relaxed) == 0
    }

    /// Records one resolved input, firing the output's run on the last.
    fn complete_one(&self) {
        if self.remaining.fetch_sub(1, Relaxed) == 1 {
            let thunk = self
                .thunk
                .lock()
                .expect("fan-in lock is never poisoned")
                .take()
                .expect("the output future's run is transferred before any input can resolve");
            thunk();
        }
    }

    /// Constructs the output future around `producer` without scheduling
    /// it, transferring the captured run into this fan-in.
    ///
    /// The transfer completes before any input continuation is installed,
    /// so the run is always in place by the time [`complete_one`] can fire
    /// it.
    ///
    /// [`complete_one`]: Self::complete_one
    fn intercept<R: Send + Sync + 'static>(
        this: &Arc<Self>,
        producer: Box<dyn FnOnce() -> R + Send>,
    ) -> Future<R> {
        let interceptor = Intercept::new();
        let output = Future::new(producer, &interceptor, Launch::ASYNC | Launch::DEFERRED);
        let thunk = interceptor
            .take()
            .expect("the interception invoker saves every submitted run");
        *this.thunk.lock().expect("fan-in lock is never poisoned") = Some(thunk);
        output
    }

    /// Installs the decrement continuation on `input`, running on the
    /// thread that resolves it.
    fn arm_input<T: Send + Sync + 'static>(this: &Arc<Self>, input: &Future<T>) {
        let fan_in = this.clone();
        let _ = input.then(
            move |_resolved| fan_in.complete_one(),
            &Immediate,
            Launch::NONE,
        );
    }
}

impl<T: Send + Sync + 'static> WhenAll for Vec<Future<T>> {
    fn when_all(self) -> Future<Self> {
        if self.is_empty() {
            return make_ready_future(self);
        }

        let fan_in = FanIn::armed(self.len());
        let handles = self.clone();

        let walk = fan_in.clone();
        let producer = move || {
            for input in &self {
                if walk.resolved() {
                    break;
                }
                input.wait();
            }
            self
        };
        let output = FanIn::intercept(&fan_in, Box::new(producer));

        for input in &handles {
            FanIn::arm_input(&fan_in, input);
        }

        output
    }
}

impl WhenAll for () {
    fn when_all(self) -> Future<Self> {
        make_ready_future(())
    }
}

macro_rules! impl_when_all_tuple {
    ($( $len:literal => ($($Input:ident => $idx:tt),+) )+) => {$(
        impl<$($Input),+> WhenAll for ($(Future<$Input>,)+)
        where
            $($Input: Send + Sync + 'static),+
        {
            fn when_all(self) -> Future<Self> {
                let fan_in = FanIn::armed($len);
                let handles = ($(self.$idx.clone(),)+);

                let walk = fan_in.clone();
                let producer = move || {
                    $(
                        if !walk.resolved() {
                            self.$idx.wait();
                        }
                    )+
                    self
                };
                let output = FanIn::intercept(&fan_in, Box::new(producer));

                $(
                    FanIn::arm_input(&fan_in, &handles.$idx);
                )+

                output
            }
        }
    )+};
}

impl_when_all_tuple! {
    1 => (A => 0)
    2 => (A => 0, B => 1)
    3 => (A => 0, B => 1, C => 2)
    4 => (A => 0, B => 1, C => 2, D => 3)
    5 => (A => 0, B => 1, C => 2, D => 3, E => 4)
    6 => (A => 0, B => 1, C => 2, D => 3, E => 4, F => 5)
    7 => (A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6)
    8 => (A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6, H => 7)
}
