/*!
 * Native handle ownership and the liveness guard.
 */
use chrono::{DateTime, Utc};

use crate::driver::RawHandle;
use crate::error::{DeviceError, Result};

/// The native record owned by a device object.
///
/// A handle starts live and goes dead exactly once. There is no way back: the
/// raw driver handle is only reachable through [`DeviceHandle::check_live`].
#[derive(Debug)]
pub struct DeviceHandle {
    driver_handle: RawHandle,
    is_live: bool,
    opened_at: DateTime<Utc>,
}

impl DeviceHandle {
    pub(crate) fn new(driver_handle: RawHandle) -> Self {
        Self {
            driver_handle,
            is_live: true,
            opened_at: Utc::now(),
        }
    }

    /// Validity guard: the raw handle if still live, `DeadObject` otherwise
    pub fn check_live(&self) -> Result<RawHandle> {
        if self.is_live {
            Ok(self.driver_handle)
        } else {
            Err(DeviceError::DeadObject)
        }
    }

    /// Whether the handle is still live
    pub fn is_live(&self) -> bool {
        self.is_live
    }

    /// When the driver open succeeded
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Mark the handle dead, returning the raw handle if it was live.
    ///
    /// Only the first call yields a handle, so whoever gets it is the one
    /// responsible for closing it.
    pub(crate) fn kill(&mut self) -> Option<RawHandle> {
        if self.is_live {
            self.is_live = false;
            Some(self.driver_handle)
        } else {
            None
        }
    }
}
