//! Process-wide storage for the public log prefix.
//!
//! The prefix is set once when logging is enabled and read for every
//! public record afterwards. Re-enabling overwrites it (last writer wins).

use std::sync::{Arc, OnceLock, RwLock};

/// Holds the prefix prepended to public log records.
///
/// The prefix sits behind an `RwLock`: `set` takes the write lock, so
/// concurrent writers serialize and the last one wins, while `get` holds
/// the read lock only long enough to clone the `Arc`.
///
/// A fresh registry has no prefix; that is a valid state and formats as an
/// empty prefix. Most code uses the process-wide instance returned by
/// [`global`], but tests and embedders can create their own and hand it to
/// [`CompliantFormat`](crate::CompliantFormat).
///
/// # Examples
///
/// ```
/// use compliant_logging::PrefixRegistry;
///
/// let registry = PrefixRegistry::new();
/// assert_eq!(registry.get(), None);
///
/// registry.set("SystemLog:");
/// assert_eq!(registry.get().as_deref(), Some("SystemLog:"));
/// ```
#[derive(Debug, Default)]
pub struct PrefixRegistry {
    prefix: RwLock<Option<Arc<str>>>,
}

impl PrefixRegistry {
    /// Creates a registry with no prefix set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `prefix`, replacing any previous value.
    pub fn set(&self, prefix: impl Into<Arc<str>>) {
        let mut slot = self
            .prefix
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(prefix.into());
    }

    /// Returns the current prefix, or `None` before the first `set`.
    pub fn get(&self) -> Option<Arc<str>> {
        self.prefix
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Returns the process-wide registry.
pub fn global() -> &'static Arc<PrefixRegistry> {
    static GLOBAL: OnceLock<Arc<PrefixRegistry>> = OnceLock::new();
    GLOBAL.get_or_init(|| Arc::new(PrefixRegistry::new()))
}

/// Sets the process-wide public prefix.
pub fn set_prefix(prefix: impl Into<Arc<str>>) {
    global().set(prefix);
}

/// Returns the process-wide public prefix, if one has been set.
pub fn get_prefix() -> Option<Arc<str>> {
    global().get()
}
