//! Runs user code behind an error boundary.
//!
//! Test, lifecycle and declaration code may panic (`assert!`, `unwrap`, ...). [`capture`] catches the
//! unwind and converts the payload into a [`TestError`]: std assertion panics become assertion
//! failures, everything else an error of kind `panic`. An `assert!` with a context message panics
//! with the context alone, so its condition is read back from the source at the panic location. A process-wide panic hook records the panic
//! location and keeps quiet while the current thread is capturing; outside of that it defers to the
//! previously installed hook.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use crate::assertion::{AssertionFailure, Frame, Traceback};
use crate::error::TestError;

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<Frame>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

// Longest `assert!` invocation read back from source.
const MAX_INVOCATION_LINES: usize = 32;

fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let frame = info.location().map(Frame::from_location);
                LAST_PANIC.with(|slot| *slot.borrow_mut() = frame);
            } else {
                previous(info);
            }
        }));
    });
}

/// Calls `f`, converting a panic into a [`TestError`].
pub fn capture<T, F>(f: F) -> Result<T, TestError>
where
    F: FnOnce() -> Result<T, TestError>,
{
    install_hook();
    let was_capturing = CAPTURING.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|flag| flag.set(was_capturing));

    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let location = LAST_PANIC.with(|slot| slot.borrow_mut().take());
            Err(from_panic(payload.as_ref(), location))
        }
    }
}

fn from_panic(payload: &(dyn Any + Send), location: Option<Frame>) -> TestError {
    let message = panic_message(payload);
    if let Some(failure) = AssertionFailure::from_panic_message(&message, location.clone()) {
        return failure.into();
    }
    if let Some(frame) = &location {
        let recovered = invocation_source(frame).and_then(|source| {
            AssertionFailure::from_assert_invocation(&source, &message, frame.clone())
        });
        if let Some(failure) = recovered {
            return failure.into();
        }
    }
    TestError::Raised {
        kind: "panic".to_string(),
        message,
        traceback: location.map(Traceback::from_frame).unwrap_or_default(),
    }
}

/// Source text from the panic line onwards, if the file is readable from here.
fn invocation_source(frame: &Frame) -> Option<String> {
    let text = fs::read_to_string(&frame.file).ok()?;
    let start = usize::try_from(frame.line).ok()?.checked_sub(1)?;
    let lines: Vec<&str> = text.lines().skip(start).take(MAX_INVOCATION_LINES).collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
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
