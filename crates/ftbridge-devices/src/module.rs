/*!
 * Module entry point.
 *
 * `FtdiModule` holds the read-only data established at initialization (the
 * device class) and is where open requests start.
 */
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info};

use ftbridge_core::config::ModuleConfig;
use ftbridge_core::logging::{component_span, operation_span};
use ftbridge_core::runtime::Runtime;
use ftbridge_core::types::Value;

use crate::adapter::DriverCallAdapter;
use crate::args;
use crate::device::FtdiDevice;
use crate::driver::DeviceDriver;
use crate::error::{DeviceError, Result};
use crate::handle::DeviceHandle;
use crate::open::{self, OpenRequest};
use crate::serial::SerialNumber;

type Initializer = Box<dyn Fn(&FtdiDevice) -> Result<()>>;

/// Recipe for building device objects.
///
/// An optional initializer runs on every new device before it is handed to
/// the caller. If it fails (or panics) the open is rejected with
/// `Construction` and the freshly opened handle is closed.
pub struct DeviceClass {
    name: Rc<str>,
    initializer: Option<Initializer>,
}

impl DeviceClass {
    /// A class with no initializer
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        Self {
            name: Rc::from(name.as_ref()),
            initializer: None,
        }
    }

    /// A class named after the module configuration
    pub fn from_config(config: &ModuleConfig) -> Self {
        Self::new(&config.device_class)
    }

    /// Run `initializer` on every device built from this class
    pub fn with_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&FtdiDevice) -> Result<()> + 'static,
    {
        self.initializer = Some(Box::new(initializer));
        self
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn instantiate(
        &self,
        serial: SerialNumber,
        handle: DeviceHandle,
        adapter: DriverCallAdapter,
    ) -> Result<FtdiDevice> {
        let device = FtdiDevice::new(self.name.clone(), serial, handle, adapter);

        let Some(initializer) = &self.initializer else {
            return Ok(device);
        };

        // On the error paths `device` is dropped here, which closes it.
        match panic::catch_unwind(AssertUnwindSafe(|| initializer(&device))) {
            Ok(Ok(())) if device.is_open() => Ok(device),
            Ok(Ok(())) => Err(DeviceError::construction(format!(
                "{} initializer closed the device",
                self.name
            ))),
            Ok(Err(e)) => Err(DeviceError::construction(format!(
                "{} initializer failed: {}",
                self.name, e
            ))),
            Err(_) => Err(DeviceError::construction(format!(
                "{} initializer panicked",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceClass")
            .field("name", &self.name)
            .field("has_initializer", &self.initializer.is_some())
            .finish()
    }
}

/// FTDI module bound to a controller runtime
pub struct FtdiModule<'rt> {
    runtime: &'rt Runtime,
    adapter: DriverCallAdapter,
    class: Rc<DeviceClass>,
    in_flight: Rc<Cell<usize>>,
}

impl<'rt> FtdiModule<'rt> {
    /// Initialize the module.
    ///
    /// Must be called on the controller. The device class is fixed from here
    /// on.
    pub fn init(
        runtime: &'rt Runtime,
        driver: Arc<dyn DeviceDriver>,
        class: DeviceClass,
    ) -> Result<Self> {
        let span = component_span("ftdi_module", Some(class.name()));
        let _enter = span.enter();

        runtime.ensure_controller("FtdiModule::init")?;
        info!(class = class.name(), "FTDI module initialized");

        Ok(Self {
            runtime,
            adapter: DriverCallAdapter::new(driver),
            class: Rc::new(class),
            in_flight: Rc::new(Cell::new(0)),
        })
    }

    /// Initialize with the device class named in the runtime configuration
    pub fn init_from_config(runtime: &'rt Runtime, driver: Arc<dyn DeviceDriver>) -> Result<Self> {
        let class = DeviceClass::from_config(&runtime.config().get().module);
        Self::init(runtime, driver, class)
    }

    /// The device class used for every open
    pub fn device_class(&self) -> &DeviceClass {
        &self.class
    }

    /// Start opening the device with `serial`.
    ///
    /// Argument problems are reported here, before anything is scheduled.
    /// Driver and construction failures arrive through the returned future.
    pub fn open_device(&self, serial: &str) -> Result<OpenRequest> {
        let span = operation_span("open_device", self.class.name());
        let _enter = span.enter();

        let serial = SerialNumber::new(serial)?;
        debug!(serial = %serial, "Opening device");

        Ok(open::schedule(
            self.runtime,
            self.class.clone(),
            self.adapter.clone(),
            serial,
            self.in_flight.clone(),
        ))
    }

    /// Host-facing `openDevice(serialNumber)`.
    ///
    /// Only the first argument is read; extra arguments are ignored.
    pub fn open_device_with_args(&self, args: &[Value]) -> Result<OpenRequest> {
        let serial = args::required(args, 0, "serialNumber")?;
        self.open_device(args::expect_str(serial, "serialNumber")?)
    }

    /// Number of open requests that have not settled yet
    pub fn pending_opens(&self) -> usize {
        self.in_flight.get()
    }
}

impl fmt::Debug for FtdiModule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtdiModule")
            .field("class", &self.class)
            .field("pending_opens", &self.pending_opens())
            .finish()
    }
}
