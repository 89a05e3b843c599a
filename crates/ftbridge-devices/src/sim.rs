/*!
 * In-memory driver.
 *
 * `SimulatedDriver` behaves like a D2XX driver with a fixed set of attached
 * devices. It records every call it receives, can be told to fail the next
 * call with a given status, and enforces the single-owner rule: a device that
 * is already open reports `FT_DEVICE_NOT_OPENED`.
 */
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::driver::{ChipType, DeviceDriver, DeviceInfo, LineControl, PurgeMask, RawHandle};
use crate::status::FtStatus;

/// A call received by the simulated driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    /// `open(serial_number)`
    Open(String),
    /// `close(handle)`
    Close(RawHandle),
    /// `purge(handle, mask)`
    Purge(RawHandle, PurgeMask),
    /// `set_line(handle, line)`
    SetLine(RawHandle, LineControl),
    /// `modem_status(handle)`
    ModemStatus(RawHandle),
    /// `device_info(handle)`
    DeviceInfo(RawHandle),
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Available,
    Failing(FtStatus),
    Panicking,
}

#[derive(Debug)]
struct SimDevice {
    behavior: Behavior,
    modem_status: u32,
}

#[derive(Debug, Default)]
struct SimState {
    devices: HashMap<String, SimDevice>,
    open: HashMap<RawHandle, String>,
    calls: Vec<DriverCall>,
    fail_next: Option<FtStatus>,
}

impl SimState {
    fn device_mut(&mut self, serial: &str) -> &mut SimDevice {
        self.devices.entry(serial.to_string()).or_insert(SimDevice {
            behavior: Behavior::Available,
            modem_status: 0,
        })
    }

    /// Shared prologue of every handle-based call
    fn begin(&mut self, call: DriverCall, handle: RawHandle) -> FtStatus {
        self.calls.push(call);
        if let Some(status) = self.fail_next.take() {
            return status;
        }
        if self.open.contains_key(&handle) {
            FtStatus::OK
        } else {
            FtStatus::INVALID_HANDLE
        }
    }
}

/// Driver backed by an in-memory device table
#[derive(Debug)]
pub struct SimulatedDriver {
    state: Mutex<SimState>,
    next_handle: AtomicU64,
    open_delay: Option<Duration>,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    /// A driver with no attached devices
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            next_handle: AtomicU64::new(0x1000),
            open_delay: None,
        }
    }

    /// Attach a device that opens normally
    pub fn with_device(mut self, serial: &str) -> Self {
        self.state_mut().device_mut(serial).behavior = Behavior::Available;
        self
    }

    /// Attach a device whose open always fails with `status`
    pub fn with_failing_device(mut self, serial: &str, status: FtStatus) -> Self {
        self.state_mut().device_mut(serial).behavior = Behavior::Failing(status);
        self
    }

    /// Attach a device whose open panics inside the driver
    pub fn with_panicking_device(mut self, serial: &str) -> Self {
        self.state_mut().device_mut(serial).behavior = Behavior::Panicking;
        self
    }

    /// Set the raw modem status word reported for a device
    pub fn with_modem_status(mut self, serial: &str, raw: u32) -> Self {
        self.state_mut().device_mut(serial).modem_status = raw;
        self
    }

    /// Make every open block its worker thread for `delay`
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Fail the next call, whatever it is, with `status`
    pub fn fail_next(&self, status: FtStatus) {
        self.lock().fail_next = Some(status);
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    /// Number of `open` calls received
    pub fn open_calls(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Open(_)))
    }

    /// Number of `close` calls received
    pub fn close_calls(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Close(_)))
    }

    /// Number of `purge` calls received
    pub fn purge_calls(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Purge(..)))
    }

    /// Number of line control calls received
    pub fn line_calls(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::SetLine(..)))
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> usize {
        self.lock().open.len()
    }

    fn count(&self, filter: impl Fn(&DriverCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| filter(call)).count()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut SimState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_handle(&self) -> Option<RawHandle> {
        RawHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }
}

impl DeviceDriver for SimulatedDriver {
    fn open(&self, serial_number: &str) -> (FtStatus, Option<RawHandle>) {
        if let Some(delay) = self.open_delay {
            thread::sleep(delay);
        }

        let behavior = {
            let mut state = self.lock();
            state.calls.push(DriverCall::Open(serial_number.to_string()));
            if let Some(status) = state.fail_next.take() {
                return (status, None);
            }
            let Some(device) = state.devices.get(serial_number) else {
                return (FtStatus::DEVICE_NOT_FOUND, None);
            };
            let behavior = device.behavior;
            if let Behavior::Available = behavior {
                if state.open.values().any(|owner| owner == serial_number) {
                    return (FtStatus::DEVICE_NOT_OPENED, None);
                }
                let Some(handle) = self.allocate_handle() else {
                    return (FtStatus::INSUFFICIENT_RESOURCES, None);
                };
                state.open.insert(handle, serial_number.to_string());
                trace!(serial = serial_number, handle = handle.as_raw(), "Simulated open");
                return (FtStatus::OK, Some(handle));
            }
            behavior
        };

        match behavior {
            Behavior::Failing(status) => (status, None),
            Behavior::Panicking => panic!("simulated driver fault opening {}", serial_number),
            Behavior::Available => (FtStatus::OTHER_ERROR, None),
        }
    }

    fn close(&self, handle: RawHandle) -> FtStatus {
        let mut state = self.lock();
        let status = state.begin(DriverCall::Close(handle), handle);
        if status.is_ok() {
            state.open.remove(&handle);
        }
        status
    }

    fn purge(&self, handle: RawHandle, mask: PurgeMask) -> FtStatus {
        self.lock().begin(DriverCall::Purge(handle, mask), handle)
    }

    fn set_line(&self, handle: RawHandle, line: LineControl) -> FtStatus {
        self.lock().begin(DriverCall::SetLine(handle, line), handle)
    }

    fn modem_status(&self, handle: RawHandle) -> (FtStatus, u32) {
        let mut state = self.lock();
        let status = state.begin(DriverCall::ModemStatus(handle), handle);
        if !status.is_ok() {
            return (status, 0);
        }
        let raw = state
            .open
            .get(&handle)
            .and_then(|serial| state.devices.get(serial))
            .map_or(0, |device| device.modem_status);
        (status, raw)
    }

    fn device_info(&self, handle: RawHandle) -> (FtStatus, Option<DeviceInfo>) {
        let mut state = self.lock();
        let status = state.begin(DriverCall::DeviceInfo(handle), handle);
        if !status.is_ok() {
            return (status, None);
        }
        let info = state.open.get(&handle).map(|serial| DeviceInfo {
            chip_type: ChipType::Ft232R,
            vendor_id: 0x0403,
            product_id: 0x6001,
            serial_number: serial.clone(),
            description: "FT232R USB UART".to_string(),
        });
        (status, info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_owner() {
        let driver = SimulatedDriver::new().with_device("A1B2C3");

        let (status, first) = driver.open("A1B2C3");
        assert_eq!(status, FtStatus::OK);
        let first = first.unwrap();

        assert_eq!(driver.open("A1B2C3"), (FtStatus::DEVICE_NOT_OPENED, None));
        assert_eq!(driver.close(first), FtStatus::OK);
        assert_eq!(driver.open("A1B2C3").0, FtStatus::OK);
        assert_eq!(driver.open_calls(), 3);
    }

    #[test]
    fn test_unknown_handles_and_devices() {
        let driver = SimulatedDriver::new().with_failing_device("BAD", FtStatus::IO_ERROR);
        let bogus = RawHandle::from_raw(1).unwrap();

        assert_eq!(driver.open("MISSING"), (FtStatus::DEVICE_NOT_FOUND, None));
        assert_eq!(driver.open("BAD"), (FtStatus::IO_ERROR, None));
        assert_eq!(driver.purge(bogus, PurgeMask::RX), FtStatus::INVALID_HANDLE);
        assert_eq!(driver.close(bogus), FtStatus::INVALID_HANDLE);
        assert_eq!(driver.open_handles(), 0);
    }

    #[test]
    fn test_fail_next_is_one_shot() {
        let driver = SimulatedDriver::new().with_device("A1B2C3");
        let handle = driver.open("A1B2C3").1.unwrap();

        driver.fail_next(FtStatus::IO_ERROR);
        assert_eq!(driver.set_line(handle, LineControl::SetDtr), FtStatus::IO_ERROR);
        assert_eq!(driver.set_line(handle, LineControl::SetDtr), FtStatus::OK);
        assert_eq!(driver.line_calls(), 2);
    }
}
