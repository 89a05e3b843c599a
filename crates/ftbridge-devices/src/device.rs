/*!
 * The user-visible device object.
 *
 * An `FtdiDevice` owns exactly one native handle. Every operation goes through
 * the validity guard first, then the driver adapter, then the status
 * classification. Operations run inline on the controller; none of them is
 * handed to the worker pool.
 */
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use ftbridge_core::types::Value;

use crate::adapter::DriverCallAdapter;
use crate::args;
use crate::driver::{DeviceInfo, LineControl, ModemStatus, PurgeMask, RawHandle};
use crate::error::{DeviceError, Result};
use crate::handle::DeviceHandle;
use crate::serial::SerialNumber;
use crate::status::FtStatus;

/// An open FTDI device.
///
/// Device objects are `!Send`: they are created on the controller and stay
/// there. Dropping a device that is still open closes it.
pub struct FtdiDevice {
    class_name: Rc<str>,
    serial: SerialNumber,
    handle: RefCell<DeviceHandle>,
    adapter: DriverCallAdapter,
    _controller: PhantomData<Rc<()>>,
}

impl FtdiDevice {
    pub(crate) fn new(
        class_name: Rc<str>,
        serial: SerialNumber,
        handle: DeviceHandle,
        adapter: DriverCallAdapter,
    ) -> Self {
        Self {
            class_name,
            serial,
            handle: RefCell::new(handle),
            adapter,
            _controller: PhantomData,
        }
    }

    /// Name of the device class this object was built from
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Serial number the device was opened with
    pub fn serial_number(&self) -> &str {
        self.serial.as_str()
    }

    /// When the device was opened
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.handle.borrow().opened_at()
    }

    /// Whether the device still owns a live handle.
    ///
    /// Makes no driver call.
    pub fn is_open(&self) -> bool {
        self.handle.borrow().is_live()
    }

    /// Flush the receive and/or transmit buffers.
    ///
    /// `mask` must be `PurgeMask::RX`, `PurgeMask::TX` or both; anything else
    /// is rejected without calling the driver.
    pub fn purge(&self, mask: u32) -> Result<()> {
        let handle = self.live()?;
        let mask = PurgeMask::from_bits(mask)?;
        debug!(serial = %self.serial, mask = mask.bits(), "Purging device buffers");
        self.adapter
            .purge(handle, mask)
            .into_result("purge", self.serial.as_str())
    }

    /// Host-facing `purge(mask)`
    pub fn purge_with_args(&self, args: &[Value]) -> Result<()> {
        let mask = args::required(args, 0, "mask")?;
        self.live()?;
        self.purge(args::expect_u32(mask, "mask")?)
    }

    /// Assert DTR
    pub fn set_dtr(&self) -> Result<()> {
        self.set_line(LineControl::SetDtr)
    }

    /// Deassert DTR
    pub fn clr_dtr(&self) -> Result<()> {
        self.set_line(LineControl::ClrDtr)
    }

    /// Assert RTS
    pub fn set_rts(&self) -> Result<()> {
        self.set_line(LineControl::SetRts)
    }

    /// Deassert RTS
    pub fn clr_rts(&self) -> Result<()> {
        self.set_line(LineControl::ClrRts)
    }

    /// Change a modem control line.
    ///
    /// Every call reaches the driver, even if the line is already in the
    /// requested state.
    pub fn set_line(&self, line: LineControl) -> Result<()> {
        let handle = self.live()?;
        debug!(serial = %self.serial, ?line, "Changing modem control line");
        self.adapter
            .set_line(handle, line)
            .into_result(line.operation(), self.serial.as_str())
    }

    /// Read the modem and line status
    pub fn modem_status(&self) -> Result<ModemStatus> {
        let handle = self.live()?;
        self.adapter
            .modem_status(handle)
            .into_result("modem_status", self.serial.as_str())
            .map(ModemStatus::from_raw)
    }

    /// Read the device identity from the driver
    pub fn info(&self) -> Result<DeviceInfo> {
        let handle = self.live()?;
        self.adapter
            .device_info(handle)
            .into_result("device_info", self.serial.as_str())?
            .ok_or(DeviceError::Driver {
                operation: "device_info",
                status: FtStatus::OTHER_ERROR,
            })
    }

    /// Close the device.
    ///
    /// The handle is dead afterwards even if the driver reports a failure, so
    /// a handle the driver may already have released is never used again.
    pub fn close(&self) -> Result<()> {
        let handle = self
            .handle
            .borrow_mut()
            .kill()
            .ok_or(DeviceError::DeadObject)?;
        debug!(serial = %self.serial, "Closing device");
        self.adapter
            .close(handle)
            .into_result("close", self.serial.as_str())
    }

    fn live(&self) -> Result<RawHandle> {
        self.handle.borrow().check_live()
    }

    #[cfg(test)]
    pub(crate) fn raw_handle(&self) -> RawHandle {
        self.handle.borrow().check_live().unwrap()
    }
}

impl fmt::Debug for FtdiDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtdiDevice")
            .field("class_name", &self.class_name)
            .field("serial", &self.serial)
            .field("is_open", &self.is_open())
            .finish()
    }
}

impl Drop for FtdiDevice {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().kill() {
            let result = self.adapter.close(handle);
            if result.status.is_ok() {
                debug!(serial = %self.serial, "Closed device on drop");
            } else {
                warn!(serial = %self.serial, status = %result.status, "Failed to close device on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio_test::{assert_err, assert_ok};

    use crate::error::ErrorKind;
    use crate::sim::{DriverCall, SimulatedDriver};

    fn open(driver: &Arc<SimulatedDriver>, serial: &str) -> FtdiDevice {
        let adapter = DriverCallAdapter::new(driver.clone());
        let serial = SerialNumber::new(serial).unwrap();
        let raw = adapter.open(&serial).payload.unwrap();
        FtdiDevice::new(Rc::from("FTDI_Device"), serial, DeviceHandle::new(raw), adapter)
    }

    #[test_log::test]
    fn test_line_control_calls() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let device = open(&driver, "A1B2C3");
        let handle = device.raw_handle();

        assert_ok!(device.set_dtr());
        assert_ok!(device.clr_dtr());
        assert_ok!(device.set_rts());
        assert_ok!(device.clr_rts());

        assert_eq!(
            driver.calls()[1..],
            [
                DriverCall::SetLine(handle, LineControl::SetDtr),
                DriverCall::SetLine(handle, LineControl::ClrDtr),
                DriverCall::SetLine(handle, LineControl::SetRts),
                DriverCall::SetLine(handle, LineControl::ClrRts),
            ]
        );
    }

    #[test]
    fn test_set_dtr_twice_is_not_deduplicated() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let device = open(&driver, "A1B2C3");

        assert_ok!(device.set_dtr());
        assert_ok!(device.set_dtr());
        assert_eq!(driver.line_calls(), 2);
    }

    #[test]
    fn test_purge_masks() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let device = open(&driver, "A1B2C3");
        let handle = device.raw_handle();

        for bits in [1, 2, 3] {
            assert_ok!(device.purge(bits));
        }
        for bits in [0, 4, 7, 0xffff_ffff] {
            let err = assert_err!(device.purge(bits));
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }

        assert_eq!(
            driver.calls()[1..],
            [
                DriverCall::Purge(handle, PurgeMask::RX),
                DriverCall::Purge(handle, PurgeMask::TX),
                DriverCall::Purge(handle, PurgeMask::BOTH),
            ]
        );
    }

    #[test]
    fn test_purge_with_args() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let device = open(&driver, "A1B2C3");

        assert_eq!(
            device.purge_with_args(&[]).unwrap_err().kind(),
            ErrorKind::MissingArgument
        );
        assert_eq!(
            device.purge_with_args(&[Value::from("3")]).unwrap_err().kind(),
            ErrorKind::WrongArgumentType
        );
        assert_eq!(
            device.purge_with_args(&[Value::from(0u32)]).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_ok!(device.purge_with_args(&[Value::from(3u32)]));
        assert_eq!(driver.purge_calls(), 1);
    }

    #[test]
    fn test_dead_object_makes_no_driver_call() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let device = open(&driver, "A1B2C3");

        assert_ok!(device.close());
        assert!(!device.is_open());
        let calls_after_close = driver.calls().len();

        let results = [
            device.set_dtr(),
            device.clr_dtr(),
            device.set_rts(),
            device.clr_rts(),
            device.purge(3),
            device.purge(0),
            device.purge_with_args(&[Value::from(3u32)]),
            device.modem_status().map(|_| ()),
            device.info().map(|_| ()),
            device.close(),
        ];
        for result in results {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::DeadObject);
        }

        assert_eq!(driver.calls().len(), calls_after_close);
    }

    #[test]
    fn test_driver_failure_is_classified() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let device = open(&driver, "A1B2C3");
        driver.fail_next(FtStatus::IO_ERROR);

        let err = assert_err!(device.set_rts());
        assert_eq!(err.kind(), ErrorKind::Driver);
        assert_eq!(err.status(), Some(FtStatus::IO_ERROR));
        assert!(device.is_open());
        assert_ok!(device.set_rts());
    }

    #[test]
    fn test_status_queries() {
        let driver = Arc::new(
            SimulatedDriver::new()
                .with_device("A1B2C3")
                .with_modem_status("A1B2C3", 0x30),
        );
        let device = open(&driver, "A1B2C3");

        let status = assert_ok!(device.modem_status());
        assert!(status.cts && status.dsr);
        assert!(!status.dcd);

        let info = assert_ok!(device.info());
        assert_eq!(info.serial_number, "A1B2C3");
        assert_eq!(info.vendor_id, 0x0403);

        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["cts"], serde_json::json!(true));
    }

    #[test]
    fn test_drop_closes_once() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let device = open(&driver, "A1B2C3");
        drop(device);
        assert_eq!(driver.close_calls(), 1);
        assert_eq!(driver.open_handles(), 0);

        let device = open(&driver, "A1B2C3");
        assert_ok!(device.close());
        drop(device);
        assert_eq!(driver.close_calls(), 2);
    }

    #[test]
    fn test_close_failure_still_kills_handle() {
        let driver = Arc::new(SimulatedDriver::new().with_device("A1B2C3"));
        let device = open(&driver, "A1B2C3");
        driver.fail_next(FtStatus::IO_ERROR);

        assert_eq!(device.close().unwrap_err().kind(), ErrorKind::Driver);
        assert!(!device.is_open());
        assert_eq!(device.set_dtr().unwrap_err().kind(), ErrorKind::DeadObject);
    }
}
