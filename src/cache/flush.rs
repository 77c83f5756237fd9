//! Once-per-request flush flags.
//!
//! Flushing the template cache or the cache-block store is expensive and may be
//! requested many times while handling one request. Each flush kind runs at
//! most once between two calls to [`FlushState::begin_request`] unless the
//! caller forces it.

use std::sync::atomic::{AtomicBool, Ordering};

/// Flags recording which flushes already ran in the current request.
#[derive(Debug, Default)]
pub struct FlushState {
    templates: AtomicBool,
    blocks: AtomicBool,
}

impl FlushState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the template-cache flush. Returns whether the flush should run.
    pub fn claim_templates(&self, force: bool) -> bool {
        Self::claim(&self.templates, force)
    }

    /// Claim the cache-block flush. Returns whether the flush should run.
    pub fn claim_blocks(&self, force: bool) -> bool {
        Self::claim(&self.blocks, force)
    }

    fn claim(flag: &AtomicBool, force: bool) -> bool {
        let already = flag.swap(true, Ordering::SeqCst);
        force || !already
    }

    pub fn templates_flushed(&self) -> bool {
        self.templates.load(Ordering::SeqCst)
    }

    pub fn blocks_flushed(&self) -> bool {
        self.blocks.load(Ordering::SeqCst)
    }

    /// Mark the start of a new logical request, re-arming both flushes.
    pub fn begin_request(&self) {
        self.templates.store(false, Ordering::SeqCst);
        self.blocks.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_runs_once_per_request() {
        let state = FlushState::new();
        assert!(state.claim_templates(false));
        assert!(!state.claim_templates(false));
        assert!(state.templates_flushed());

        // Independent flags
        assert!(!state.blocks_flushed());
        assert!(state.claim_blocks(false));
        assert!(!state.claim_blocks(false));
    }

    #[test]
    fn test_force_always_runs() {
        let state = FlushState::new();
        assert!(state.claim_templates(true));
        assert!(state.claim_templates(true));
        assert!(!state.claim_templates(false));
    }

    #[test]
    fn test_begin_request_rearms() {
        let state = FlushState::new();
        state.claim_templates(false);
        state.claim_blocks(false);

        state.begin_request();
        assert!(!state.templates_flushed());
        assert!(state.claim_templates(false));
        assert!(state.claim_blocks(false));
    }
}
