/// An [exponential backoff] for spin loops.
///
/// Retry loops on the completion path use this to spin with an
/// exponentially increasing number of spin-loop hints, up to a maximum,
/// when a compare-and-swap loses to another thread.
///
/// [exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff
#[derive(Debug, Copy, Clone)]
pub struct Backoff {
    exp: u8,
}

// === impl Backoff ===

impl Backoff {
    /// The maximum exponent: each call to [`spin`](Self::spin) issues at
    /// most `2^MAX_EXPONENT` spin-loop hints.
    pub const MAX_EXPONENT: u8 = 8;

    /// Returns a new exponential backoff.
    #[must_use]
    pub const fn new() -> Self {
        Self { exp: 0 }
    }

    /// Backs off in a spin loop.
    ///
    /// Each time this function is called, it issues `2^exp` [spin loop
    /// hints], where `exp` is the current exponent value (starting at 0),
    /// then increments the exponent if it has not yet reached
    /// [`Self::MAX_EXPONENT`].
    ///
    /// [spin loop hints]: core::hint::spin_loop
    #[inline(always)]
    pub fn spin(&mut self) {
        #[cfg_attr(loom, allow(unused_variables))]
        let spins = 1 << self.exp;

        #[cfg(not(loom))]
        for _ in 0..spins {
            crate::loom::hint::spin_loop();
        }

        #[cfg(loom)]
        {
            test_debug!("would back off for {spins} spins");
            loom::thread::yield_now();
        }

        if self.exp < Self::MAX_EXPONENT {
            self.exp += 1
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
