/*!
 * Synchronous adapter over the driver primitives.
 *
 * The adapter turns every driver call into a `DriverResult` and never fails
 * on its own: a panicking driver is caught and reported as
 * `FtStatus::OTHER_ERROR`, so the caller always decides how a failure is
 * surfaced.
 */
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, trace};

use crate::driver::{DeviceDriver, DeviceInfo, LineControl, PurgeMask, RawHandle};
use crate::error::{DeviceError, Result};
use crate::serial::SerialNumber;
use crate::status::FtStatus;

/// Status plus payload of one driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverResult<T> {
    /// Status reported by the driver
    pub status: FtStatus,
    /// Payload, meaningful only when `status` is `FtStatus::OK`
    pub payload: T,
}

impl<T> DriverResult<T> {
    fn new(status: FtStatus, payload: T) -> Self {
        Self { status, payload }
    }

    /// Convert into a `Result`, classifying a failed status.
    ///
    /// `subject` names what the call was about and ends up in the error.
    pub fn into_result(self, operation: &'static str, subject: &str) -> Result<T> {
        if self.status.is_ok() {
            Ok(self.payload)
        } else {
            Err(DeviceError::from_status(operation, self.status, subject))
        }
    }
}

/// Shared, thread-safe wrapper around a `DeviceDriver`
#[derive(Debug, Clone)]
pub struct DriverCallAdapter {
    driver: Arc<dyn DeviceDriver>,
}

impl DriverCallAdapter {
    /// Wrap a driver
    pub fn new(driver: Arc<dyn DeviceDriver>) -> Self {
        Self { driver }
    }

    /// Open a device by serial number
    pub fn open(&self, serial: &SerialNumber) -> DriverResult<Option<RawHandle>> {
        let (status, handle) = self.call("open", None, |driver| driver.open(serial.as_str()));
        DriverResult::new(status, handle)
    }

    /// Close a handle
    pub fn close(&self, handle: RawHandle) -> DriverResult<()> {
        let status = self.call("close", Some(handle), |driver| driver.close(handle));
        DriverResult::new(status, ())
    }

    /// Flush device buffers
    pub fn purge(&self, handle: RawHandle, mask: PurgeMask) -> DriverResult<()> {
        let status = self.call("purge", Some(handle), |driver| driver.purge(handle, mask));
        DriverResult::new(status, ())
    }

    /// Change a modem control line
    pub fn set_line(&self, handle: RawHandle, line: LineControl) -> DriverResult<()> {
        let status = self.call(line.operation(), Some(handle), |driver| {
            driver.set_line(handle, line)
        });
        DriverResult::new(status, ())
    }

    /// Read the modem status word
    pub fn modem_status(&self, handle: RawHandle) -> DriverResult<u32> {
        let (status, raw) = self.call("modem_status", Some(handle), |driver| {
            driver.modem_status(handle)
        });
        DriverResult::new(status, raw)
    }

    /// Read the device identity
    pub fn device_info(&self, handle: RawHandle) -> DriverResult<Option<DeviceInfo>> {
        let (status, info) = self.call("device_info", Some(handle), |driver| {
            driver.device_info(handle)
        });
        DriverResult::new(status, info)
    }

    fn call<R, F>(&self, operation: &'static str, handle: Option<RawHandle>, f: F) -> R
    where
        R: StatusOutcome,
        F: FnOnce(&dyn DeviceDriver) -> R,
    {
        let driver = self.driver.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| f(driver))) {
            Ok(outcome) => {
                trace!(
                    operation,
                    handle = handle.map(RawHandle::as_raw),
                    status = %outcome.status(),
                    "Driver call returned"
                );
                outcome
            }
            Err(_) => {
                error!(operation, "Driver call panicked");
                R::from_failure(FtStatus::OTHER_ERROR)
            }
        }
    }
}

/// Raw return shapes of driver primitives
trait StatusOutcome {
    fn status(&self) -> FtStatus;
    fn from_failure(status: FtStatus) -> Self;
}

impl StatusOutcome for FtStatus {
    fn status(&self) -> FtStatus {
        *self
    }

    fn from_failure(status: FtStatus) -> Self {
        status
    }
}

impl<T: Default> StatusOutcome for (FtStatus, T) {
    fn status(&self) -> FtStatus {
        self.0
    }

    fn from_failure(status: FtStatus) -> Self {
        (status, T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sim::{DriverCall, SimulatedDriver};

    fn adapter(driver: &Arc<SimulatedDriver>) -> DriverCallAdapter {
        DriverCallAdapter::new(driver.clone())
    }

    #[test]
    fn test_open_reports_status_and_handle() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let adapter = adapter(&driver);

        let result = adapter.open(&SerialNumber::new("A1B2C3").unwrap());
        assert_eq!(result.status, FtStatus::OK);
        assert!(result.payload.is_some());

        let result = adapter.open(&SerialNumber::new("ZZZ").unwrap());
        assert_eq!(result.status, FtStatus::DEVICE_NOT_FOUND);
        assert!(result.payload.is_none());
    }

    #[test]
    fn test_into_result_classifies() {
        let result = DriverResult::new(FtStatus::DEVICE_NOT_FOUND, None::<RawHandle>);
        let err = result.into_result("open", "A1B2C3").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceNotFound);

        let ok = DriverResult::new(FtStatus::OK, 7u32).into_result("modem_status", "A1B2C3");
        assert_eq!(ok.unwrap(), 7);
    }

    #[test]
    fn test_panicking_driver_is_contained() {
        let driver = Arc::new(SimulatedDriver::new().with_panicking_device("BOOM"));
        let adapter = adapter(&driver);

        let result = adapter.open(&SerialNumber::new("BOOM").unwrap());
        assert_eq!(result.status, FtStatus::OTHER_ERROR);
        assert!(result.payload.is_none());
    }

    #[test]
    fn test_calls_are_forwarded_unchanged() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let adapter = adapter(&driver);
        let handle = adapter
            .open(&SerialNumber::new("A1B2C3").unwrap())
            .payload
            .unwrap();

        assert!(adapter.purge(handle, PurgeMask::BOTH).status.is_ok());
        assert!(adapter.set_line(handle, LineControl::SetRts).status.is_ok());

        let calls = driver.calls();
        assert_eq!(calls[1], DriverCall::Purge(handle, PurgeMask::BOTH));
        assert_eq!(calls[2], DriverCall::SetLine(handle, LineControl::SetRts));
    }
}
