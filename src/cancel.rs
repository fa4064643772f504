//! Cooperative cancellation.
//!
//! Every cancel-aware call in the engine takes a [`StopToken`] and polls it
//! at loop boundaries: before each object during stacking, each slider
//! during timing expansion, each score in the batch path and each peak in
//! the strain loops. A triggered token surfaces as
//! [`LoadError::LoadInterrupted`](crate::errors::LoadError::LoadInterrupted).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The requesting side of a stop token.
#[derive(Clone, Debug, Default)]
pub struct StopSource {
    flag: Arc<AtomicBool>,
}

impl StopSource {
    /// Creates a new, untriggered source.
    pub fn new() -> StopSource {
        StopSource::default()
    }

    /// Requests a stop; all associated tokens observe it.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// A token observing this source.
    pub fn token(&self) -> StopToken {
        StopToken {
            flag: Some(Arc::clone(&self.flag)),
        }
    }
}

/// The observing side of a stop token.
///
/// The default token never reports a stop, mirroring a detached
/// `stop_token`; pass it where cancellation is not needed.
#[derive(Clone, Debug, Default)]
pub struct StopToken {
    flag: Option<Arc<AtomicBool>>,
}

impl StopToken {
    /// A token that never stops.
    pub fn none() -> StopToken {
        StopToken::default()
    }

    /// Whether a stop has been requested.
    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_observes_source() {
        let source = StopSource::new();
        let token = source.token();
        assert!(!token.stop_requested());
        source.request_stop();
        assert!(token.stop_requested());
        assert!(!StopToken::none().stop_requested());
    }
}
