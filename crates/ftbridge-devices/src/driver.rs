/*!
 * Driver capability and the value types that cross it.
 *
 * `DeviceDriver` is the blocking, status-returning interface of a D2XX-style
 * library. Implementations must be callable from any thread: `open` runs on
 * the worker pool, every other primitive runs inline on the controller.
 */
use std::fmt::Debug;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};
use crate::status::FtStatus;

/// Opaque native handle produced by a successful driver open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(NonZeroU64);

impl RawHandle {
    /// Wrap a raw driver handle; a null handle yields `None`
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(RawHandle)
    }

    /// The raw driver handle
    pub fn as_raw(self) -> u64 {
        self.0.get()
    }
}

/// Receive/transmit buffer selection for a purge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurgeMask(u32);

impl PurgeMask {
    /// Flush the receive buffer (`FT_PURGE_RX`)
    pub const RX: PurgeMask = PurgeMask(1);
    /// Flush the transmit buffer (`FT_PURGE_TX`)
    pub const TX: PurgeMask = PurgeMask(2);
    /// Flush both buffers
    pub const BOTH: PurgeMask = PurgeMask(3);

    /// Validate a raw mask.
    ///
    /// Only `RX`, `TX` and `RX | TX` are accepted; zero and any other bit are
    /// rejected before the driver ever sees them.
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            1..=3 => Ok(PurgeMask(bits)),
            _ => Err(DeviceError::invalid_argument(format!(
                "Mask must be a combination of FT_PURGE_RX and FT_PURGE_TX, got {:#x}",
                bits
            ))),
        }
    }

    /// The raw mask passed to the driver
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether the receive buffer is selected
    pub fn rx(self) -> bool {
        self.0 & Self::RX.0 != 0
    }

    /// Whether the transmit buffer is selected
    pub fn tx(self) -> bool {
        self.0 & Self::TX.0 != 0
    }
}

/// Modem control line change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineControl {
    /// Assert DTR
    SetDtr,
    /// Deassert DTR
    ClrDtr,
    /// Assert RTS
    SetRts,
    /// Deassert RTS
    ClrRts,
}

impl LineControl {
    /// Name of the driver primitive
    pub fn operation(self) -> &'static str {
        match self {
            LineControl::SetDtr => "set_dtr",
            LineControl::ClrDtr => "clr_dtr",
            LineControl::SetRts => "set_rts",
            LineControl::ClrRts => "clr_rts",
        }
    }
}

/// Modem and line status reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemStatus {
    /// Clear To Send
    pub cts: bool,
    /// Data Set Ready
    pub dsr: bool,
    /// Ring Indicator
    pub ri: bool,
    /// Data Carrier Detect
    pub dcd: bool,
    /// Overrun error
    pub overrun_error: bool,
    /// Parity error
    pub parity_error: bool,
    /// Framing error
    pub framing_error: bool,
    /// Break interrupt
    pub break_interrupt: bool,
    /// Raw status word as returned by the driver
    pub raw: u32,
}

impl ModemStatus {
    /// Decode the status word: modem bits in byte 0, line status in byte 1
    pub fn from_raw(raw: u32) -> Self {
        let modem = raw & 0xff;
        let line = (raw >> 8) & 0xff;
        Self {
            cts: modem & 0x10 != 0,
            dsr: modem & 0x20 != 0,
            ri: modem & 0x40 != 0,
            dcd: modem & 0x80 != 0,
            overrun_error: line & 0x02 != 0,
            parity_error: line & 0x04 != 0,
            framing_error: line & 0x08 != 0,
            break_interrupt: line & 0x10 != 0,
            raw,
        }
    }
}

/// FTDI chip family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChipType {
    /// FT232B / FT245B
    Bm,
    /// FT8U232AM / FT8U245AM
    Am,
    /// FT8U100AX
    Ax100,
    /// FT2232C / FT2232D
    Ft2232C,
    /// FT232R / FT245R
    Ft232R,
    /// FT2232H
    Ft2232H,
    /// FT4232H
    Ft4232H,
    /// FT232H
    Ft232H,
    /// FT-X series
    XSeries,
    /// Any type code not listed above
    Unknown(u32),
}

impl ChipType {
    /// Decode the driver's device type code
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => ChipType::Bm,
            1 => ChipType::Am,
            2 => ChipType::Ax100,
            4 => ChipType::Ft2232C,
            5 => ChipType::Ft232R,
            6 => ChipType::Ft2232H,
            7 => ChipType::Ft4232H,
            8 => ChipType::Ft232H,
            9 => ChipType::XSeries,
            other => ChipType::Unknown(other),
        }
    }
}

/// Identity of an open device as reported by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Chip family
    pub chip_type: ChipType,
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    /// Serial number string
    pub serial_number: String,
    /// Product description string
    pub description: String,
}

/// Blocking driver interface.
///
/// Every primitive reports an `FtStatus` instead of failing; payloads are
/// only meaningful when the status is `FtStatus::OK`.
pub trait DeviceDriver: Send + Sync + Debug {
    /// Open the device with the given serial number
    fn open(&self, serial_number: &str) -> (FtStatus, Option<RawHandle>);

    /// Close a handle
    fn close(&self, handle: RawHandle) -> FtStatus;

    /// Flush the selected buffers
    fn purge(&self, handle: RawHandle, mask: PurgeMask) -> FtStatus;

    /// Change a modem control line
    fn set_line(&self, handle: RawHandle, line: LineControl) -> FtStatus;

    /// Read the modem and line status word
    fn modem_status(&self, handle: RawHandle) -> (FtStatus, u32);

    /// Read the device identity
    fn device_info(&self, handle: RawHandle) -> (FtStatus, Option<DeviceInfo>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_purge_mask_validation() {
        assert_eq!(PurgeMask::from_bits(1).unwrap(), PurgeMask::RX);
        assert_eq!(PurgeMask::from_bits(2).unwrap(), PurgeMask::TX);
        assert_eq!(PurgeMask::from_bits(3).unwrap(), PurgeMask::BOTH);

        for bits in [0, 4, 5, 7, 0x100, u32::MAX] {
            let err = PurgeMask::from_bits(bits).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_purge_mask_bits_pass_through() {
        let both = PurgeMask::BOTH;
        assert!(both.rx() && both.tx());
        assert!(PurgeMask::RX.rx() && !PurgeMask::RX.tx());
        assert_eq!(PurgeMask::TX.bits(), 2);
    }

    #[test]
    fn test_raw_handle() {
        assert!(RawHandle::from_raw(0).is_none());
        assert_eq!(RawHandle::from_raw(0xdead).map(RawHandle::as_raw), Some(0xdead));
    }

    #[test]
    fn test_modem_status_decoding() {
        let status = ModemStatus::from_raw(0x0000_0230);
        assert!(status.cts);
        assert!(status.dsr);
        assert!(!status.ri);
        assert!(!status.dcd);
        assert!(status.overrun_error);
        assert!(!status.framing_error);
        assert_eq!(status.raw, 0x230);

        let status = ModemStatus::from_raw(0x1cc0);
        assert!(status.ri && status.dcd);
        assert!(status.parity_error && status.framing_error && status.break_interrupt);
    }

    #[test]
    fn test_chip_type_decoding() {
        assert_eq!(ChipType::from_raw(5), ChipType::Ft232R);
        assert_eq!(ChipType::from_raw(8), ChipType::Ft232H);
        assert_eq!(ChipType::from_raw(3), ChipType::Unknown(3));
    }
}
