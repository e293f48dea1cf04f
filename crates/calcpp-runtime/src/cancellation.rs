#![forbid(unsafe_code)]

//! Stop flags for worker generations.
//!
//! A worker thread cannot be interrupted mid-computation. Each spawned
//! worker instead gets a [`CancellationSource`] for its generation, and
//! every thread serving that generation holds a [`CancellationToken`] it
//! checks before posting. Once the channel terminates a generation, nothing
//! that generation computes afterwards reaches the outbox.
//!
//! ```
//! use calcpp_runtime::cancellation::CancellationSource;
//!
//! let source = CancellationSource::new(3);
//! let token = source.token();
//! assert!(!token.is_cancelled());
//! assert!(source.cancel());
//! assert!(!source.cancel());
//! assert!(token.is_cancelled());
//! assert_eq!(token.generation(), 3);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read side, held by the threads of one worker generation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    generation: u64,
    stopped: Arc<AtomicBool>,
}

impl CancellationToken {
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Write side, owned by the worker transport.
///
/// Dropping the source leaves its tokens running; transports cancel
/// explicitly in `terminate`.
#[derive(Debug)]
pub struct CancellationSource {
    generation: u64,
    stopped: Arc<AtomicBool>,
}

impl CancellationSource {
    #[must_use]
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            generation: self.generation,
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Stop the generation. Returns `true` only for the call that stopped it.
    pub fn cancel(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn stop_reaches_serving_thread() {
        let source = CancellationSource::new(1);
        let token = source.token();
        let handle = thread::spawn(move || {
            while !token.is_cancelled() {
                thread::yield_now();
            }
            token.generation()
        });
        source.cancel();
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn only_first_cancel_reports_stop() {
        let source = CancellationSource::new(9);
        assert!(source.cancel());
        assert!(!source.cancel());
        assert!(source.is_cancelled());
    }

    #[test]
    fn dropping_source_leaves_token_running() {
        let token = CancellationSource::new(2).token();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn generations_are_independent() {
        let old = CancellationSource::new(1);
        let new = CancellationSource::new(2);
        let (old_token, new_token) = (old.token(), new.token());
        old.cancel();
        assert!(old_token.is_cancelled());
        assert!(!new_token.is_cancelled());
    }
}
