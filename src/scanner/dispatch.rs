//! Scanner tier dispatch.
//!
//! Picks which implementation of `find_byte`/`skip_spaces`/`scan_digits`
//! backs the public functions in [`super`], and caches that choice as a
//! trio of function pointers so the hot path pays one indirect call
//! instead of re-evaluating the tier on every invocation.
//!
//! There is a process-wide override and a per-thread override; the
//! effective tier is thread override, else process override, else
//! auto-detected capability, in that order. Changing either override
//! invalidates the calling thread's cache on next use and is logged at
//! debug level.

use std::cell::Cell;
use std::sync::atomic::{AtomicU8, Ordering};

use super::scalar;
use super::swar;

/// Width tier of the scanner's batched primitives. All tiers are
/// observably equivalent; the only difference is how many bytes are
/// inspected per iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// One byte at a time, no batching.
    Scalar,
    /// Two `u64` SWAR lanes (16 bytes) per iteration.
    Wide128,
    /// Four `u64` SWAR lanes (32 bytes) per iteration.
    Wide256,
    /// Eight `u64` SWAR lanes (64 bytes) per iteration.
    Wide512,
}

impl Level {
    fn from_tag(tag: u8) -> Option<Level> {
        match tag {
            1 => Some(Level::Scalar),
            2 => Some(Level::Wide128),
            3 => Some(Level::Wide256),
            4 => Some(Level::Wide512),
            _ => None,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Level::Scalar => 1,
            Level::Wide128 => 2,
            Level::Wide256 => 3,
            Level::Wide512 => 4,
        }
    }
}

const NO_OVERRIDE: u8 = 0;

static GLOBAL_OVERRIDE: AtomicU8 = AtomicU8::new(NO_OVERRIDE);

thread_local! {
    static THREAD_OVERRIDE: Cell<u8> = Cell::new(NO_OVERRIDE);
    static CACHE: Cell<Option<(u8, u8, CachedFns)>> = Cell::new(None);
}

type FindByteFn = fn(&[u8], u8, usize, usize) -> Option<usize>;
type SkipSpacesFn = fn(&[u8], usize, usize) -> Option<usize>;
type ScanDigitsFn = fn(&[u8], usize, usize) -> usize;

#[derive(Clone, Copy)]
struct CachedFns {
    find_byte: FindByteFn,
    skip_spaces: SkipSpacesFn,
    scan_digits: ScanDigitsFn,
}

/// Detects the host's scanning capability. SWAR lane math has no real
/// hardware dependency (it's plain `u64` arithmetic), so this always
/// reports the widest tier; the detection hook exists so a future
/// genuine-SIMD backend has somewhere to plug in without changing the
/// public dispatch surface.
fn detect_capability() -> Level {
    Level::Wide512
}

fn effective_level() -> Level {
    let thread_tag = THREAD_OVERRIDE.with(Cell::get);
    if let Some(level) = Level::from_tag(thread_tag) {
        return level;
    }
    let global_tag = GLOBAL_OVERRIDE.load(Ordering::Relaxed);
    if let Some(level) = Level::from_tag(global_tag) {
        return level;
    }
    detect_capability()
}

fn fns_for(level: Level) -> CachedFns {
    match level {
        Level::Scalar => CachedFns {
            find_byte: scalar::find_byte,
            skip_spaces: scalar::skip_spaces,
            scan_digits: scalar::scan_digits,
        },
        Level::Wide128 => CachedFns {
            find_byte: |s, b, o, c| swar::find_byte(s, b, o, c, 2),
            skip_spaces: |s, o, c| swar::skip_spaces(s, o, c, 2),
            scan_digits: |s, o, c| swar::scan_digits(s, o, c, 2),
        },
        Level::Wide256 => CachedFns {
            find_byte: |s, b, o, c| swar::find_byte(s, b, o, c, 4),
            skip_spaces: |s, o, c| swar::skip_spaces(s, o, c, 4),
            scan_digits: |s, o, c| swar::scan_digits(s, o, c, 4),
        },
        Level::Wide512 => CachedFns {
            find_byte: |s, b, o, c| swar::find_byte(s, b, o, c, 8),
            skip_spaces: |s, o, c| swar::skip_spaces(s, o, c, 8),
            scan_digits: |s, o, c| swar::scan_digits(s, o, c, 8),
        },
    }
}

fn current_fns() -> CachedFns {
    let thread_tag = THREAD_OVERRIDE.with(Cell::get);
    let global_tag = GLOBAL_OVERRIDE.load(Ordering::Relaxed);
    CACHE.with(|cache| {
        if let Some((cached_thread, cached_global, fns)) = cache.get() {
            if cached_thread == thread_tag && cached_global == global_tag {
                return fns;
            }
        }
        let fns = fns_for(effective_level());
        cache.set(Some((thread_tag, global_tag, fns)));
        fns
    })
}

pub(super) fn cached_find_byte() -> FindByteFn {
    current_fns().find_byte
}

pub(super) fn cached_skip_spaces() -> SkipSpacesFn {
    current_fns().skip_spaces
}

pub(super) fn cached_scan_digits() -> ScanDigitsFn {
    current_fns().scan_digits
}

/// Overrides the scanner tier for every thread that doesn't set its own
/// [`set_thread_level`]. Pass `None` to go back to auto-detection.
pub fn set_global_level(level: Option<Level>) {
    let tag = level.map(Level::tag).unwrap_or(NO_OVERRIDE);
    GLOBAL_OVERRIDE.store(tag, Ordering::Relaxed);
    tracing::debug!(?level, "scanner: global tier override changed");
}

/// Overrides the scanner tier for the calling thread only, taking
/// precedence over [`set_global_level`]. Pass `None` to defer to the
/// global override (or auto-detection).
pub fn set_thread_level(level: Option<Level>) {
    let tag = level.map(Level::tag).unwrap_or(NO_OVERRIDE);
    THREAD_OVERRIDE.with(|cell| cell.set(tag));
    tracing::debug!(?level, "scanner: thread tier override changed");
}

/// Returns the tier that would currently service a scan on the calling
/// thread.
pub fn current_level() -> Level {
    effective_level()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_detect_is_wide512() {
        set_thread_level(None);
        set_global_level(None);
        assert_eq!(current_level(), Level::Wide512);
    }

    #[test]
    fn thread_override_beats_global_override() {
        set_global_level(Some(Level::Scalar));
        set_thread_level(Some(Level::Wide256));
        assert_eq!(current_level(), Level::Wide256);
        set_thread_level(None);
        assert_eq!(current_level(), Level::Scalar);
        set_global_level(None);
    }

    #[test]
    fn all_tiers_agree_with_scalar_on_find_byte() {
        let buf = b"the quick brown fox jumps over the lazy dog, 0123456789!";
        for level in [Level::Scalar, Level::Wide128, Level::Wide256, Level::Wide512] {
            set_thread_level(Some(level));
            assert_eq!(
                super::find_byte(buf, b'x', 0, buf.len()),
                Some(19),
                "tier {level:?} disagreed on find_byte"
            );
        }
        set_thread_level(None);
    }

    #[test]
    fn all_tiers_agree_with_scalar_on_scan_digits() {
        let buf = b"0123456789, trailer\0";
        for level in [Level::Scalar, Level::Wide128, Level::Wide256, Level::Wide512] {
            set_thread_level(Some(level));
            assert_eq!(
                super::scan_digits(buf, 0, 10),
                10,
                "tier {level:?} disagreed on scan_digits"
            );
        }
        set_thread_level(None);
    }
}
