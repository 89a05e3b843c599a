/*!
 * Error type for device operations.
 */
use std::fmt;

use thiserror::Error;

use ftbridge_core::error::Error as CoreError;

use crate::status::{classify, FtStatus, StatusClass};

/// Error type for device operations
#[derive(Error, Debug)]
pub enum DeviceError {
    /// A required argument was not supplied
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// An argument had the wrong host type
    #[error("Wrong argument type for {name}: expected {expected}, got {actual}")]
    WrongArgumentType {
        /// Argument name
        name: String,
        /// Expected type
        expected: String,
        /// Type actually supplied
        actual: String,
    },

    /// An argument had the right type but an unacceptable value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The device object no longer owns a live handle
    #[error("Dead device object")]
    DeadObject,

    /// The driver found no device with the requested serial number
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device exists but could not be opened
    #[error("Device could not be opened as it may be already open: {0}")]
    DeviceAlreadyOpen(String),

    /// Any other driver failure
    #[error("Driver call {operation} failed: {status}")]
    Driver {
        /// Driver primitive that failed
        operation: &'static str,
        /// Status reported by the driver
        status: FtStatus,
    },

    /// The driver opened the device but the device object could not be built
    #[error("Device construction failed: {0}")]
    Construction(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Machine-checkable kind of a `DeviceError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing argument
    MissingArgument,
    /// Wrong argument type
    WrongArgumentType,
    /// Invalid argument value
    InvalidArgument,
    /// Dead device object
    DeadObject,
    /// Device not found
    DeviceNotFound,
    /// Device already open
    DeviceAlreadyOpen,
    /// Generic driver failure
    Driver,
    /// Device object construction failed
    Construction,
    /// Core runtime failure
    Core,
}

/// Family an `ErrorKind` belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Detected while validating arguments, before any driver call
    Argument,
    /// The handle is no longer live
    DeadObject,
    /// Classified from a driver status
    DriverStatus,
    /// Failure while building the result of a successful open
    InternalConstruction,
}

impl ErrorKind {
    /// Short stable code for the kind
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::MissingArgument => "missarg",
            ErrorKind::WrongArgumentType | ErrorKind::InvalidArgument => "wrongarg",
            ErrorKind::DeadObject => "deadobj",
            ErrorKind::DeviceNotFound => "notfound",
            ErrorKind::DeviceAlreadyOpen => "alreadyopen",
            ErrorKind::Driver => "driver",
            ErrorKind::Construction => "construct",
            ErrorKind::Core => "core",
        }
    }

    /// Family of the kind
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::MissingArgument
            | ErrorKind::WrongArgumentType
            | ErrorKind::InvalidArgument => ErrorCategory::Argument,
            ErrorKind::DeadObject => ErrorCategory::DeadObject,
            ErrorKind::DeviceNotFound | ErrorKind::DeviceAlreadyOpen | ErrorKind::Driver => {
                ErrorCategory::DriverStatus
            }
            ErrorKind::Construction | ErrorKind::Core => ErrorCategory::InternalConstruction,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl DeviceError {
    /// Create a new missing argument error
    pub fn missing_argument<S: AsRef<str>>(name: S) -> Self {
        DeviceError::MissingArgument(name.as_ref().to_string())
    }

    /// Create a new wrong argument type error
    pub fn wrong_argument_type<S: AsRef<str>>(name: S, expected: S, actual: S) -> Self {
        DeviceError::WrongArgumentType {
            name: name.as_ref().to_string(),
            expected: expected.as_ref().to_string(),
            actual: actual.as_ref().to_string(),
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::InvalidArgument(msg.as_ref().to_string())
    }

    /// Create a new construction error
    pub fn construction<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::Construction(msg.as_ref().to_string())
    }

    /// Map a failed driver status to an error.
    ///
    /// `subject` names what the call was about (the serial number for open)
    /// and is used in the not-found and already-open messages.
    pub fn from_status(operation: &'static str, status: FtStatus, subject: &str) -> Self {
        match classify(status) {
            StatusClass::DeviceNotFound => DeviceError::DeviceNotFound(subject.to_string()),
            StatusClass::DeviceAlreadyOpen => DeviceError::DeviceAlreadyOpen(subject.to_string()),
            StatusClass::GenericDriverFailure(status) => DeviceError::Driver { operation, status },
            // A success status has no error; callers only get here on a bug.
            StatusClass::Success => DeviceError::Driver { operation, status },
        }
    }

    /// Machine-checkable kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::MissingArgument(_) => ErrorKind::MissingArgument,
            DeviceError::WrongArgumentType { .. } => ErrorKind::WrongArgumentType,
            DeviceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DeviceError::DeadObject => ErrorKind::DeadObject,
            DeviceError::DeviceNotFound(_) => ErrorKind::DeviceNotFound,
            DeviceError::DeviceAlreadyOpen(_) => ErrorKind::DeviceAlreadyOpen,
            DeviceError::Driver { .. } => ErrorKind::Driver,
            DeviceError::Construction(_) => ErrorKind::Construction,
            DeviceError::Core(_) => ErrorKind::Core,
        }
    }

    /// Raw driver status behind the error, if any
    pub fn status(&self) -> Option<FtStatus> {
        match self {
            DeviceError::DeviceNotFound(_) => Some(FtStatus::DEVICE_NOT_FOUND),
            DeviceError::DeviceAlreadyOpen(_) => Some(FtStatus::DEVICE_NOT_OPENED),
            DeviceError::Driver { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        let err = DeviceError::from_status("open", FtStatus::DEVICE_NOT_FOUND, "A1B2C3");
        assert_eq!(err.kind(), ErrorKind::DeviceNotFound);
        assert_eq!(err.to_string(), "Device not found: A1B2C3");

        let err = DeviceError::from_status("open", FtStatus::DEVICE_NOT_OPENED, "A1B2C3");
        assert_eq!(err.kind(), ErrorKind::DeviceAlreadyOpen);
        assert_eq!(err.status(), Some(FtStatus::DEVICE_NOT_OPENED));

        let err = DeviceError::from_status("purge", FtStatus::IO_ERROR, "A1B2C3");
        assert_eq!(err.kind(), ErrorKind::Driver);
        assert_eq!(err.status(), Some(FtStatus::IO_ERROR));
        assert_eq!(err.to_string(), "Driver call purge failed: FT_IO_ERROR (4)");
    }

    #[test]
    fn test_kind_codes_and_categories() {
        assert_eq!(DeviceError::DeadObject.kind().code(), "deadobj");
        assert_eq!(DeviceError::missing_argument("serialNumber").kind().code(), "missarg");
        assert_eq!(DeviceError::invalid_argument("mask").kind().code(), "wrongarg");

        assert_eq!(ErrorKind::InvalidArgument.category(), ErrorCategory::Argument);
        assert_eq!(ErrorKind::DeadObject.category(), ErrorCategory::DeadObject);
        assert_eq!(ErrorKind::DeviceAlreadyOpen.category(), ErrorCategory::DriverStatus);
        assert_eq!(ErrorKind::Construction.category(), ErrorCategory::InternalConstruction);
    }

    #[test]
    fn test_core_error_conversion() {
        let err: DeviceError = CoreError::wrong_thread("open completion").into();
        assert_eq!(err.kind(), ErrorKind::Core);
        assert!(err.status().is_none());
    }
}
