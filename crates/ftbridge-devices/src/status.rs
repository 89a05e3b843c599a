/*!
 * Driver status codes and their classification.
 *
 * Every driver primitive reports an `FtStatus`. Before anything user visible
 * happens, a status goes through [`classify`], which sorts it into one of the
 * four outcome classes the rest of the crate reasons about.
 */
use std::fmt;

use serde::{Deserialize, Serialize};

/// Status code returned by a D2XX-style driver call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FtStatus(u32);

impl FtStatus {
    /// The call succeeded
    pub const OK: FtStatus = FtStatus(0);
    /// The handle passed to the driver is not valid
    pub const INVALID_HANDLE: FtStatus = FtStatus(1);
    /// No device matches the requested identifier
    pub const DEVICE_NOT_FOUND: FtStatus = FtStatus(2);
    /// The device exists but could not be opened
    pub const DEVICE_NOT_OPENED: FtStatus = FtStatus(3);
    /// Generic I/O failure
    pub const IO_ERROR: FtStatus = FtStatus(4);
    /// The driver ran out of resources
    pub const INSUFFICIENT_RESOURCES: FtStatus = FtStatus(5);
    /// A parameter was rejected by the driver
    pub const INVALID_PARAMETER: FtStatus = FtStatus(6);
    /// Unsupported baud rate
    pub const INVALID_BAUD_RATE: FtStatus = FtStatus(7);
    /// The device is not opened for erase
    pub const DEVICE_NOT_OPENED_FOR_ERASE: FtStatus = FtStatus(8);
    /// The device is not opened for write
    pub const DEVICE_NOT_OPENED_FOR_WRITE: FtStatus = FtStatus(9);
    /// Writing to the device failed
    pub const FAILED_TO_WRITE_DEVICE: FtStatus = FtStatus(10);
    /// EEPROM read failed
    pub const EEPROM_READ_FAILED: FtStatus = FtStatus(11);
    /// EEPROM write failed
    pub const EEPROM_WRITE_FAILED: FtStatus = FtStatus(12);
    /// EEPROM erase failed
    pub const EEPROM_ERASE_FAILED: FtStatus = FtStatus(13);
    /// No EEPROM fitted
    pub const EEPROM_NOT_PRESENT: FtStatus = FtStatus(14);
    /// EEPROM is blank
    pub const EEPROM_NOT_PROGRAMMED: FtStatus = FtStatus(15);
    /// Invalid arguments
    pub const INVALID_ARGS: FtStatus = FtStatus(16);
    /// Operation not supported by this device or driver
    pub const NOT_SUPPORTED: FtStatus = FtStatus(17);
    /// Unspecified driver failure
    pub const OTHER_ERROR: FtStatus = FtStatus(18);
    /// The device list has not been built yet
    pub const DEVICE_LIST_NOT_READY: FtStatus = FtStatus(19);

    /// Wrap a raw status value
    pub const fn from_raw(raw: u32) -> Self {
        FtStatus(raw)
    }

    /// The raw status value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether the status reports success
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Symbolic driver name of the status, if the code is known
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "FT_OK",
            1 => "FT_INVALID_HANDLE",
            2 => "FT_DEVICE_NOT_FOUND",
            3 => "FT_DEVICE_NOT_OPENED",
            4 => "FT_IO_ERROR",
            5 => "FT_INSUFFICIENT_RESOURCES",
            6 => "FT_INVALID_PARAMETER",
            7 => "FT_INVALID_BAUD_RATE",
            8 => "FT_DEVICE_NOT_OPENED_FOR_ERASE",
            9 => "FT_DEVICE_NOT_OPENED_FOR_WRITE",
            10 => "FT_FAILED_TO_WRITE_DEVICE",
            11 => "FT_EEPROM_READ_FAILED",
            12 => "FT_EEPROM_WRITE_FAILED",
            13 => "FT_EEPROM_ERASE_FAILED",
            14 => "FT_EEPROM_NOT_PRESENT",
            15 => "FT_EEPROM_NOT_PROGRAMMED",
            16 => "FT_INVALID_ARGS",
            17 => "FT_NOT_SUPPORTED",
            18 => "FT_OTHER_ERROR",
            19 => "FT_DEVICE_LIST_NOT_READY",
            _ => return None,
        };
        Some(name)
    }

    /// Human-readable description of the status
    pub fn description(self) -> &'static str {
        match self.0 {
            0 => "Success",
            1 => "Invalid handle",
            2 => "Device not found",
            3 => "Device not opened",
            4 => "I/O error",
            5 => "Insufficient resources",
            6 => "Invalid parameter",
            7 => "Invalid baud rate",
            8 => "Device not opened for erase",
            9 => "Device not opened for write",
            10 => "Failed to write to device",
            11 => "EEPROM read failed",
            12 => "EEPROM write failed",
            13 => "EEPROM erase failed",
            14 => "EEPROM not present",
            15 => "EEPROM not programmed",
            16 => "Invalid arguments",
            17 => "Not supported",
            18 => "Other error",
            19 => "Device list not ready",
            _ => "Unknown driver status",
        }
    }
}

impl fmt::Display for FtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "FT_STATUS {}", self.0),
        }
    }
}

impl From<u32> for FtStatus {
    fn from(raw: u32) -> Self {
        FtStatus(raw)
    }
}

/// Outcome class of a driver status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// The call succeeded
    Success,
    /// No such device
    DeviceNotFound,
    /// The device is present but already claimed; any handle the driver
    /// produced alongside this status is unusable
    DeviceAlreadyOpen,
    /// Any other failure, carrying the raw status for diagnostics
    GenericDriverFailure(FtStatus),
}

/// Classify a driver status.
///
/// The mapping is total: unknown codes land in `GenericDriverFailure`.
pub fn classify(status: FtStatus) -> StatusClass {
    match status {
        FtStatus::OK => StatusClass::Success,
        FtStatus::DEVICE_NOT_FOUND => StatusClass::DeviceNotFound,
        FtStatus::DEVICE_NOT_OPENED => StatusClass::DeviceAlreadyOpen,
        other => StatusClass::GenericDriverFailure(other),
    }
}
