//! Configuration knobs: wire prefixes, reserve hints, and the maximum
//! array-grow delta. Kept as a plain struct with a `Default` impl and a
//! thread-local active instance; there is no on-disk configuration
//! surface in this crate.

use std::cell::RefCell;

/// Runtime-tunable knobs for parsing and printing.
#[derive(Clone, Debug)]
pub struct Config {
    /// Prefix that marks a string literal as a path token. Default
    /// `"$cppon-path:"`.
    pub path_prefix: String,
    /// Prefix that marks a string literal as a base64 blob. Default
    /// `"$cppon-blob:"`.
    pub blob_prefix: String,
    /// Prefix that marks a string literal as a typed number token.
    /// Default `"$cppon-number:"`.
    pub number_prefix: String,
    /// Minimum initial capacity reserved for newly parsed objects and
    /// arrays.
    pub min_container_reserve: usize,
    /// Per-element byte hint used by the printer when reserving buffer
    /// capacity ahead of a write.
    pub printer_element_reserve: usize,
    /// Maximum amount by which an indexed array write may exceed the
    /// current size before `ExcessiveArrayResize` is raised.
    pub max_array_delta: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            path_prefix: "$cppon-path:".to_string(),
            blob_prefix: "$cppon-blob:".to_string(),
            number_prefix: "$cppon-number:".to_string(),
            min_container_reserve: 8,
            printer_element_reserve: 16,
            max_array_delta: 1024,
        }
    }
}

thread_local! {
    static ACTIVE: RefCell<Config> = RefCell::new(Config::default());
}

/// Runs `f` with a read-only view of the thread's active configuration.
pub fn with_active<R>(f: impl FnOnce(&Config) -> R) -> R {
    ACTIVE.with(|c| f(&c.borrow()))
}

/// Replaces the thread's active configuration, returning the previous
/// one.
pub fn set_active(config: Config) -> Config {
    ACTIVE.with(|c| std::mem::replace(&mut c.borrow_mut(), config))
}

/// Resets the thread's active configuration to [`Config::default`].
pub fn reset_active() {
    ACTIVE.with(|c| *c.borrow_mut() = Config::default());
}
