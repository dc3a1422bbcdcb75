//! Bounded memory of command failures already reported to users.
//!
//! A failure is reported in-channel only the first time its signature is
//! seen. The set is an LRU so a long-running bot that keeps hitting new
//! errors does not grow without bound; an evicted signature will be
//! reported again on its next occurrence.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::error::HandlerError;

/// Default number of signatures remembered.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => unreachable!(),
};

/// Identity of a failure: the failing command plus the error it raised.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FailureSignature(String);

impl FailureSignature {
    pub fn new(command: &str, error: &HandlerError) -> Self {
        Self(format!("{}: {}", command, error))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Recently seen failure signatures.
#[derive(Debug)]
pub struct FailureCache {
    seen: LruCache<FailureSignature, ()>,
}

impl FailureCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            seen: LruCache::new(capacity),
        }
    }

    /// Record `signature`, returning `true` if it was not already remembered.
    pub fn first_sighting(&mut self, signature: FailureSignature) -> bool {
        if self.seen.get(&signature).is_some() {
            return false;
        }
        self.seen.put(signature, ());
        true
    }

    pub fn contains(&self, signature: &FailureSignature) -> bool {
        self.seen.contains(signature)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for FailureCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
