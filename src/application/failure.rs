//! Failure boundary around dispatch.
//!
//! Both `Err(HandlerError)` and panics are normalized into a [`Failure`]
//! carrying the message, source location and backtrace. Panic details come
//! from a process-wide hook that stashes them in a thread-local slot; the
//! slot is read on the same thread right after `catch_unwind` returns.
//! Panics raised inside [`guard`] are reported by the caller's log entry
//! only; the previously installed hook still sees every other panic.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use crate::dispatcher::HandlerError;

/// What went wrong during a request, ready for logging and reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub file: String,
    pub line: u32,
    pub trace: String,
    pub panicked: bool,
}

impl From<HandlerError> for Failure {
    fn from(err: HandlerError) -> Self {
        Self {
            message: err.message().to_string(),
            file: err.file().to_string(),
            line: err.line(),
            trace: err.backtrace().to_string(),
            panicked: false,
        }
    }
}

struct PanicSite {
    file: String,
    line: u32,
    trace: String,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as running inside [`guard`] until dropped.
struct GuardScope;

impl GuardScope {
    fn enter() -> Self {
        GUARD_DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

fn inside_guard() -> bool {
    GUARD_DEPTH.with(Cell::get) > 0
}

static HOOK: Once = Once::new();

/// Install the recording hook, chaining to whatever hook was set before.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let site = PanicSite {
                file: info.location().map(|l| l.file().to_string()).unwrap_or_default(),
                line: info.location().map_or(0, |l| l.line()),
                trace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(site));
            if !inside_guard() {
                previous(info);
            }
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Run `f`, turning errors and panics into a [`Failure`].
pub fn guard<T, F>(f: F) -> Result<T, Failure>
where
    F: FnOnce() -> Result<T, HandlerError>,
{
    install_panic_hook();
    LAST_PANIC.with(|slot| slot.borrow_mut().take());
    let outcome = {
        let _scope = GuardScope::enter();
        panic::catch_unwind(AssertUnwindSafe(f))
    };
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Failure::from(err)),
        Err(payload) => {
            let site = LAST_PANIC.with(|slot| slot.borrow_mut().take());
            let (file, line, trace) = match site {
                Some(s) => (s.file, s.line, s.trace),
                None => (String::new(), 0, String::new()),
            };
            Err(Failure {
                message: panic_message(payload.as_ref()),
                file,
                line,
                trace,
                panicked: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_passes_through() {
        assert_eq!(guard(|| Ok::<_, HandlerError>(5)), Ok(5));
    }

    #[test]
    fn test_error_keeps_location() {
        let failure = guard(|| -> Result<(), HandlerError> { Err(HandlerError::msg("nope")) })
            .unwrap_err();
        assert_eq!(failure.message, "nope");
        assert!(failure.file.ends_with("failure.rs"));
        assert!(failure.line > 0);
        assert!(!failure.panicked);
    }

    #[test]
    fn test_panic_is_captured() {
        let failure = guard(|| -> Result<(), HandlerError> { panic!("kaboom {}", 7) }).unwrap_err();
        assert_eq!(failure.message, "kaboom 7");
        assert!(failure.file.ends_with("failure.rs"));
        assert!(failure.panicked);
    }

    #[test]
    fn test_guard_scope_is_released() {
        assert!(!inside_guard());
        let outer = guard(|| -> Result<(), HandlerError> {
            assert!(inside_guard());
            let nested = guard(|| -> Result<(), HandlerError> { panic!("inner") });
            assert!(nested.is_err());
            assert!(inside_guard());
            panic!("outer")
        });
        assert_eq!(outer.unwrap_err().message, "outer");
        assert!(!inside_guard());
    }

    #[test]
    fn test_static_str_payload() {
        let failure = guard(|| -> Result<(), HandlerError> { panic!("plain") }).unwrap_err();
        assert_eq!(failure.message, "plain");
    }
}
