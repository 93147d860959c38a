//! Process-wide boundary policy: what a fatal error does, whether forward
//! passes synchronize the device, and the per-thread last error.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Once;

use serde::Deserialize;
use tracing::error;

use crate::config::RuntimeConfig;
use crate::error::{Result, TorchError};
use crate::inference::SyncPolicy;

/// Exit status used when a fatal error terminates the process.
pub const EXIT_FAILURE: i32 = 1;

/// What the C boundary does after reporting a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatalPolicy {
    /// Terminate the process with `EXIT_FAILURE`.
    #[default]
    Exit,
    /// Record the message for `torch_last_error` and return a null handle.
    Report,
}

impl FatalPolicy {
    fn from_repr(value: u8) -> Self {
        match value {
            1 => Self::Report,
            _ => Self::Exit,
        }
    }

    fn repr(self) -> u8 {
        match self {
            Self::Exit => 0,
            Self::Report => 1,
        }
    }
}

static FATAL_POLICY: AtomicU8 = AtomicU8::new(0);
static DEVICE_SYNC: AtomicBool = AtomicBool::new(true);
static LOGGING: Once = Once::new();

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Current fatal-error policy.
pub fn fatal_policy() -> FatalPolicy {
    FatalPolicy::from_repr(FATAL_POLICY.load(Ordering::Acquire))
}

/// Replace the fatal-error policy, returning the previous one.
pub fn set_fatal_policy(policy: FatalPolicy) -> FatalPolicy {
    FatalPolicy::from_repr(FATAL_POLICY.swap(policy.repr(), Ordering::AcqRel))
}

/// Current post-forward synchronization policy.
pub fn device_sync() -> SyncPolicy {
    if DEVICE_SYNC.load(Ordering::Acquire) {
        SyncPolicy::Always
    } else {
        SyncPolicy::Never
    }
}

/// Replace the synchronization policy, returning the previous one.
pub fn set_device_sync(sync: SyncPolicy) -> SyncPolicy {
    let previous = DEVICE_SYNC.swap(sync == SyncPolicy::Always, Ordering::AcqRel);
    if previous {
        SyncPolicy::Always
    } else {
        SyncPolicy::Never
    }
}

/// Apply the `runtime` section of a loaded configuration.
pub fn apply_runtime_config(config: &RuntimeConfig) {
    set_fatal_policy(config.on_fatal);
    set_device_sync(config.device_sync);
}

fn set_error(message: impl Into<String>) {
    let msg = message.into();
    let cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = Some(cstr);
    });
}

fn clear_error() {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

/// Pointer to this thread's last error, or null.
pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|cell| match &*cell.borrow() {
        Some(msg) => msg.as_ptr(),
        None => ptr::null(),
    })
}

/// Install a stderr subscriber unless the host already installed one.
///
/// Runs at most once per process. Hosts that install a subscriber after
/// this point get an error from `try_init` and a panic from `init`.
pub(crate) fn ensure_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one boundary call.
///
/// Errors and panics are reported on stderr and then handled per the fatal
/// policy: the process exits, or the message is stored and `fallback` is
/// returned.
pub(crate) fn guard<T>(fallback: T, op: impl FnOnce() -> Result<T>) -> T {
    ensure_logging();
    clear_error();
    let outcome = panic::catch_unwind(AssertUnwindSafe(op))
        .unwrap_or_else(|payload| Err(TorchError::Panic(panic_message(payload))));
    match outcome {
        Ok(value) => value,
        Err(err) => {
            error!("{}", err);
            match fatal_policy() {
                FatalPolicy::Exit => std::process::exit(EXIT_FAILURE),
                FatalPolicy::Report => {
                    set_error(err.to_string());
                    fallback
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn last_error() -> Option<String> {
        let ptr = last_error_ptr();
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
        }
    }

    #[test]
    fn test_guard_reports_and_clears() {
        set_fatal_policy(FatalPolicy::Report);

        let v = guard(0, || Err(TorchError::invalid_argument("bad ndim")));
        assert_eq!(v, 0);
        assert_eq!(last_error().as_deref(), Some("Invalid argument: bad ndim"));

        let v = guard(0, || Ok(5));
        assert_eq!(v, 5);
        assert!(last_error().is_none());
    }

    #[test]
    fn test_guard_catches_panics() {
        set_fatal_policy(FatalPolicy::Report);
        let v: i32 = guard(-1, || panic!("boom"));
        assert_eq!(v, -1);
        assert_eq!(last_error().as_deref(), Some("panic: boom"));
    }

    #[test]
    fn test_policy_deserialize() {
        let p: FatalPolicy = serde_yaml::from_str("report").unwrap();
        assert_eq!(p, FatalPolicy::Report);
        assert_eq!(FatalPolicy::from_repr(9), FatalPolicy::Exit);
    }
}
