/*!
 * ftbridge Devices
 *
 * This crate exposes FTDI devices to a single-threaded controller. Opening a
 * device runs the blocking driver call on a worker thread and settles a
 * future back on the controller; every other device operation is a short
 * synchronous driver call.
 */

#![warn(missing_docs)]

pub mod adapter;
pub mod args;
pub mod device;
pub mod driver;
pub mod error;
pub mod handle;
pub mod module;
pub mod open;
pub mod serial;
pub mod sim;
pub mod status;

// Re-export core types
pub use ftbridge_core::prelude;

pub use adapter::{DriverCallAdapter, DriverResult};
pub use device::FtdiDevice;
pub use driver::{ChipType, DeviceDriver, DeviceInfo, LineControl, ModemStatus, PurgeMask, RawHandle};
pub use error::{DeviceError, ErrorCategory, ErrorKind};
pub use module::{DeviceClass, FtdiModule};
pub use open::{OpenRequest, OpenState};
pub use serial::SerialNumber;
pub use status::{classify, FtStatus, StatusClass};

/// ftbridge devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the device crate
pub fn init() -> Result<(), ftbridge_core::error::Error> {
    tracing::info!("ftbridge devices {} initialized", VERSION);
    Ok(())
}
