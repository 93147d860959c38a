//! Opaque owning handles.
//!
//! A handle is the address of a boxed value. Debug builds keep a registry of
//! live handles so double release, use after release and kind mix-ups fail
//! loudly; release builds trust the caller.

use std::ffi::c_void;
use std::fmt;

use tch::Tensor;
use tracing::debug;

use crate::error::{Result, TorchError};
use crate::inference::Model;

/// Opaque handle to a tensor.
pub type TensorHandle = *mut c_void;

/// Opaque handle to a loaded model.
pub type ModelHandle = *mut c_void;

/// Kind of object behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Tensor,
    Model,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tensor => write!(f, "tensor"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// Types that cross the boundary behind a handle.
pub(crate) trait Handled: Sized {
    const KIND: HandleKind;
}

impl Handled for Tensor {
    const KIND: HandleKind = HandleKind::Tensor;
}

impl Handled for Model {
    const KIND: HandleKind = HandleKind::Model;
}

/// Box `value` and hand out its address.
pub(crate) fn into_handle<T: Handled>(value: T) -> *mut c_void {
    let handle = Box::into_raw(Box::new(value)) as *mut c_void;
    registry::insert(T::KIND, handle as usize);
    debug!(kind = %T::KIND, handle = ?handle, "handle created");
    handle
}

/// Borrow the value behind a live handle.
///
/// # Safety
///
/// `handle` must come from [`into_handle`] for the same `T` and not have
/// been released.
pub(crate) unsafe fn borrow<'a, T: Handled>(handle: *mut c_void) -> Result<&'a T> {
    if handle.is_null() {
        return Err(TorchError::NullHandle(T::KIND));
    }
    registry::check(T::KIND, handle as usize)?;
    Ok(&*(handle as *const T))
}

/// Mutably borrow the value behind a live handle.
///
/// # Safety
///
/// As [`borrow`], and no other reference to the value may be alive.
pub(crate) unsafe fn borrow_mut<'a, T: Handled>(handle: *mut c_void) -> Result<&'a mut T> {
    if handle.is_null() {
        return Err(TorchError::NullHandle(T::KIND));
    }
    registry::check(T::KIND, handle as usize)?;
    Ok(&mut *(handle as *mut T))
}

/// Drop the value behind a handle. Null is a no-op.
///
/// # Safety
///
/// As [`borrow`]; the handle must not be used afterwards.
pub(crate) unsafe fn release<T: Handled>(handle: *mut c_void) -> Result<()> {
    if handle.is_null() {
        return Ok(());
    }
    registry::remove(T::KIND, handle as usize)?;
    drop(Box::from_raw(handle as *mut T));
    debug!(kind = %T::KIND, handle = ?handle, "handle released");
    Ok(())
}

#[cfg(debug_assertions)]
mod registry {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::HandleKind;
    use crate::error::{Result, TorchError};

    static LIVE: Lazy<Mutex<HashMap<usize, HandleKind>>> = Lazy::new(|| Mutex::new(HashMap::new()));

    fn live() -> std::sync::MutexGuard<'static, HashMap<usize, HandleKind>> {
        LIVE.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(super) fn insert(kind: HandleKind, addr: usize) {
        live().insert(addr, kind);
    }

    pub(super) fn check(kind: HandleKind, addr: usize) -> Result<()> {
        match live().get(&addr) {
            Some(k) if *k == kind => Ok(()),
            _ => Err(TorchError::StaleHandle(kind, addr)),
        }
    }

    pub(super) fn remove(kind: HandleKind, addr: usize) -> Result<()> {
        let mut guard = live();
        match guard.get(&addr) {
            Some(k) if *k == kind => {
                guard.remove(&addr);
                Ok(())
            }
            _ => Err(TorchError::StaleHandle(kind, addr)),
        }
    }
}

#[cfg(not(debug_assertions))]
mod registry {
    use super::HandleKind;
    use crate::error::Result;

    #[inline]
    pub(super) fn insert(_kind: HandleKind, _addr: usize) {}

    #[inline]
    pub(super) fn check(_kind: HandleKind, _addr: usize) -> Result<()> {
        Ok(())
    }

    #[inline]
    pub(super) fn remove(_kind: HandleKind, _addr: usize) -> Result<()> {
        Ok(())
    }
}
