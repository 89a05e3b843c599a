/*!
 * Fixed-capacity serial number buffer.
 */
use std::fmt;

use crate::error::{DeviceError, Result};

/// Capacity of the serial number buffer, terminator included
pub const SERIAL_CAPACITY: usize = 128;

/// A serial number copied out of the caller's argument.
///
/// The buffer is inline and `Copy`, so a request owns its own copy and can
/// hand it to a worker thread without sharing anything with the call site.
/// Identifiers that do not fit (one byte is kept for the driver's NUL
/// terminator) are rejected, never truncated.
#[derive(Clone, Copy)]
pub struct SerialNumber {
    buf: [u8; SERIAL_CAPACITY],
    len: usize,
}

impl SerialNumber {
    /// Longest accepted serial number, in bytes
    pub const MAX_LEN: usize = SERIAL_CAPACITY - 1;

    /// Copy a serial number into a new buffer
    pub fn new(serial: &str) -> Result<Self> {
        let bytes = serial.as_bytes();
        if bytes.len() > Self::MAX_LEN {
            return Err(DeviceError::invalid_argument(format!(
                "Device serial number is {} bytes long, at most {} are supported",
                bytes.len(),
                Self::MAX_LEN
            )));
        }
        if bytes.contains(&0) {
            return Err(DeviceError::invalid_argument(
                "Device serial number must not contain NUL characters",
            ));
        }

        let mut buf = [0u8; SERIAL_CAPACITY];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            buf,
            len: bytes.len(),
        })
    }

    /// The serial number as text
    pub fn as_str(&self) -> &str {
        // Only ever filled from a `&str` in `new`.
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the serial number is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SerialNumber").field(&self.as_str()).finish()
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for SerialNumber {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for SerialNumber {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_copy_serial() {
        let serial = SerialNumber::new("A1B2C3").unwrap();
        assert_eq!(serial.as_str(), "A1B2C3");
        assert_eq!(serial.len(), 6);
        assert_eq!(serial.to_string(), "A1B2C3");
    }

    #[test]
    fn test_capacity_boundary() {
        let longest = "X".repeat(SerialNumber::MAX_LEN);
        assert_eq!(SerialNumber::new(&longest).unwrap().len(), 127);

        let too_long = "X".repeat(SERIAL_CAPACITY);
        let err = SerialNumber::new(&too_long).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_multibyte_serial() {
        let serial = SerialNumber::new("périphérique").unwrap();
        assert_eq!(serial.as_str(), "périphérique");
    }

    #[test]
    fn test_interior_nul_rejected() {
        let err = SerialNumber::new("A1\0B2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_empty_serial() {
        let serial = SerialNumber::new("").unwrap();
        assert!(serial.is_empty());
    }
}
