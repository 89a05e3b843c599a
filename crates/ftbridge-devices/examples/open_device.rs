use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use tracing::{info, warn};

use ftbridge_core::config::ConfigBuilder;
use ftbridge_core::runtime::Runtime;
use ftbridge_devices::sim::SimulatedDriver;
use ftbridge_devices::{FtdiModule, PurgeMask};

fn main() -> anyhow::Result<()> {
    // Configuration: defaults overridden by FTBRIDGE__* environment variables
    let config = ConfigBuilder::new()
        .with_environment_prefix("FTBRIDGE")
        .build()
        .context("loading configuration")?;
    ftbridge_core::init_with_config(&config)?;
    ftbridge_devices::init()?;

    let runtime = Runtime::with_config(config)?;

    // Two attached devices, one of them slow to open
    let driver = Arc::new(
        SimulatedDriver::new()
            .with_device("A1B2C3")
            .with_device("D4E5F6")
            .with_modem_status("A1B2C3", 0x30)
            .with_open_delay(Duration::from_millis(50)),
    );
    let module = FtdiModule::init_from_config(&runtime, driver.clone())?;

    let requests = ["A1B2C3", "D4E5F6", "NOPE00"]
        .into_iter()
        .map(|serial| module.open_device(serial))
        .collect::<Result<Vec<_>, _>>()?;
    info!(pending = module.pending_opens(), "Open requests scheduled");

    let results = runtime.block_on(join_all(requests));

    for result in results {
        match result {
            Ok(device) => {
                device.purge(PurgeMask::BOTH.bits())?;
                device.set_dtr()?;
                device.set_rts()?;
                let status = device.modem_status()?;
                let info = device.info()?;
                info!(
                    serial = device.serial_number(),
                    chip = ?info.chip_type,
                    cts = status.cts,
                    dsr = status.dsr,
                    "Device ready"
                );
                device.close()?;
            }
            Err(e) => warn!(kind = %e.kind(), "Open failed: {}", e),
        }
    }

    info!(calls = driver.calls().len(), "Driver calls made");
    runtime.shutdown(Duration::from_secs(1));
    Ok(())
}
