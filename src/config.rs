//! Device-count configuration.
//!
//! Every backend captures its device count once, when the instance is
//! created, so the count is stable for the lifetime of that backend. This
//! module decides what that count is.
//!
//! # Resolution order
//!
//! 1. A per-context value from [`ContextConfig`](crate::context::ContextConfig).
//! 2. A process-wide override set with [`set_xrt_device_count`] or
//!    [`set_native_device_count`].
//! 3. The `XRT_DEVICE_COUNT` / `NATIVE_DEVICE_COUNT` environment variables.
//! 4. The built-in default: the size of the `rayon` global thread pool for
//!    `xrt` (one logical device per worker), [`DEFAULT_NATIVE_DEVICE_COUNT`]
//!    for `native`.
//!
//! Overrides are stored in atomics, in the same spirit as a global backend
//! switch: they are expected to change rarely and never during compute.

use core::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

/// Environment variable overriding the `xrt` device count.
pub const XRT_DEVICE_COUNT_ENV: &str = "XRT_DEVICE_COUNT";

/// Environment variable overriding the `native` device count.
pub const NATIVE_DEVICE_COUNT_ENV: &str = "NATIVE_DEVICE_COUNT";

/// Device count of the `native` backend when nothing else is configured.
pub const DEFAULT_NATIVE_DEVICE_COUNT: usize = 4;

/// `0` means "not set".
static XRT_DEVICE_COUNT_OVERRIDE: AtomicUsize = AtomicUsize::new(0);
static NATIVE_DEVICE_COUNT_OVERRIDE: AtomicUsize = AtomicUsize::new(0);

/// Sets the process-wide `xrt` device count used by backends created after
/// this call. Passing `0` clears the override.
///
/// # Example
/// ```
/// use xrt_runtime::config::{set_xrt_device_count, xrt_device_count};
/// set_xrt_device_count(2);
/// assert_eq!(xrt_device_count(), 2);
/// set_xrt_device_count(0);
/// ```
pub fn set_xrt_device_count(count: usize) {
    XRT_DEVICE_COUNT_OVERRIDE.store(count, Ordering::Relaxed);
}

/// Sets the process-wide `native` device count used by backends created
/// after this call. Passing `0` clears the override.
pub fn set_native_device_count(count: usize) {
    NATIVE_DEVICE_COUNT_OVERRIDE.store(count, Ordering::Relaxed);
}

/// Returns the `xrt` device count a newly created backend would use.
pub fn xrt_device_count() -> usize {
    resolve(
        &XRT_DEVICE_COUNT_OVERRIDE,
        XRT_DEVICE_COUNT_ENV,
        rayon::current_num_threads,
    )
}

/// Returns the `native` device count a newly created backend would use.
pub fn native_device_count() -> usize {
    resolve(&NATIVE_DEVICE_COUNT_OVERRIDE, NATIVE_DEVICE_COUNT_ENV, || {
        DEFAULT_NATIVE_DEVICE_COUNT
    })
}

fn resolve(overridden: &AtomicUsize, env: &str, default: impl FnOnce() -> usize) -> usize {
    match overridden.load(Ordering::Relaxed) {
        0 => from_env(env).unwrap_or_else(|| default().max(1)),
        n => n,
    }
}

fn from_env(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match parse_device_count(&raw) {
        Some(n) => Some(n),
        None => {
            warn!(variable = name, value = %raw, "ignoring invalid device count");
            None
        }
    }
}

/// Parses a positive device count.
fn parse_device_count(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|&n| n > 0)
}
