//! The global enforcement bit.
//!
//! A one-shot monotone transition: it starts false, is flipped to true at
//! most once (at startup, on a log match, or on a trigger signal) and is
//! never reset. The trigger side may run inside a signal handler, so the
//! transition is a bare atomic store with no other side effects.

use std::sync::atomic::{AtomicBool, Ordering};

static ENFORCED: AtomicBool = AtomicBool::new(false);

/// Async-signal-safe.
pub fn enforce_now() {
    ENFORCED.store(true, Ordering::SeqCst);
}

pub fn is_enforced() -> bool {
    ENFORCED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforce_is_sticky() {
        enforce_now();
        assert!(is_enforced());
        enforce_now();
        assert!(is_enforced());
    }
}
