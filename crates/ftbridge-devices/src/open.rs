/*!
 * Asynchronous device open.
 *
 * An open request moves through
 * `Idle -> Scheduled -> Executing -> Completing -> Resolved | Rejected`.
 * Only the driver call runs on a worker thread. Everything that touches
 * controller-owned state (building the device object, settling the caller's
 * future, releasing the work unit) happens in a completion task queued on the
 * controller.
 */
use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, ThreadId};

use futures::ready;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use ftbridge_core::error::Error as CoreError;
use ftbridge_core::runtime::Runtime;
use ftbridge_core::types::Id;

use crate::adapter::DriverCallAdapter;
use crate::device::FtdiDevice;
use crate::driver::RawHandle;
use crate::error::{DeviceError, Result};
use crate::handle::DeviceHandle;
use crate::module::DeviceClass;
use crate::serial::SerialNumber;
use crate::status::{classify, FtStatus, StatusClass};

/// Lifecycle state of an open request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpenState {
    /// Not scheduled yet
    Idle = 0,
    /// Queued for a worker thread
    Scheduled = 1,
    /// The driver open is running on a worker thread
    Executing = 2,
    /// The controller is processing the driver result
    Completing = 3,
    /// Settled with a device object
    Resolved = 4,
    /// Settled with an error
    Rejected = 5,
}

impl OpenState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => OpenState::Scheduled,
            2 => OpenState::Executing,
            3 => OpenState::Completing,
            4 => OpenState::Resolved,
            5 => OpenState::Rejected,
            0 => OpenState::Idle,
            other => unreachable!("invalid open state byte {}", other),
        }
    }

    /// Whether the request has settled
    pub fn is_terminal(self) -> bool {
        matches!(self, OpenState::Resolved | OpenState::Rejected)
    }
}

/// State shared between a request, its worker and its caller
#[derive(Debug, Clone)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(OpenState::Idle as u8)))
    }

    fn get(&self) -> OpenState {
        OpenState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: OpenState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Ownership token for one scheduled open.
///
/// Counted in the module's in-flight total from scheduling until it is
/// dropped in the completion task.
struct WorkUnit {
    in_flight: Rc<Cell<usize>>,
}

impl WorkUnit {
    fn acquire(in_flight: Rc<Cell<usize>>) -> Self {
        in_flight.set(in_flight.get() + 1);
        Self { in_flight }
    }
}

impl Drop for WorkUnit {
    fn drop(&mut self) {
        self.in_flight.set(self.in_flight.get().saturating_sub(1));
    }
}

/// A handle the driver opened that no device object owns yet.
///
/// Closed on drop unless adopted, so a result that never reaches the
/// completion stage (runtime torn down, completion task discarded) does not
/// leak the native handle.
struct OpenedHandle {
    raw: RawHandle,
    adapter: DriverCallAdapter,
    adopted: bool,
}

impl OpenedHandle {
    fn adopt(mut self) -> RawHandle {
        self.adopted = true;
        self.raw
    }
}

impl Drop for OpenedHandle {
    fn drop(&mut self) {
        if self.adopted {
            return;
        }
        let result = self.adapter.close(self.raw);
        warn!(
            handle = self.raw.as_raw(),
            status = %result.status,
            "Closed opened handle that was never adopted"
        );
    }
}

/// What the worker hands back to the controller
enum OpenOutcome {
    /// The driver reported success with a handle
    Opened(OpenedHandle),
    /// Anything else; a stray handle is reported but not owned
    Failed {
        status: FtStatus,
        stray: Option<RawHandle>,
    },
}

impl OpenOutcome {
    fn from_driver(adapter: &DriverCallAdapter, serial: &SerialNumber) -> Self {
        let result = adapter.open(serial);
        match (result.status.is_ok(), result.payload) {
            (true, Some(raw)) => OpenOutcome::Opened(OpenedHandle {
                raw,
                adapter: adapter.clone(),
                adopted: false,
            }),
            (_, stray) => OpenOutcome::Failed {
                status: result.status,
                stray,
            },
        }
    }
}

/// Controller-side record of one open, consumed when it settles
struct PendingOpenRequest {
    id: Id,
    serial: SerialNumber,
    sink: oneshot::Sender<Result<FtdiDevice>>,
    work_unit: WorkUnit,
    state: StateCell,
    controller: ThreadId,
}

impl PendingOpenRequest {
    /// Settle the caller's future and release the work unit.
    ///
    /// Takes `self` by value: the sink can be used once only.
    fn settle(self, outcome: Result<FtdiDevice>) {
        let PendingOpenRequest {
            id,
            sink,
            work_unit,
            state,
            ..
        } = self;

        match &outcome {
            Ok(device) => {
                state.set(OpenState::Resolved);
                debug!(request = %id, serial = device.serial_number(), "Device open resolved");
            }
            Err(e) => {
                state.set(OpenState::Rejected);
                debug!(request = %id, kind = %e.kind(), "Device open rejected: {}", e);
            }
        }

        // A caller that dropped its future gets nothing; a device sent back
        // here is dropped, which closes it.
        if sink.send(outcome).is_err() {
            warn!(request = %id, "Open request abandoned by its caller before settling");
        }

        drop(work_unit);
        trace!(request = %id, "Released open work unit");
    }
}

/// Future returned by `open_device`.
///
/// Resolves to the opened device or to exactly one error.
pub struct OpenRequest {
    id: Id,
    serial: SerialNumber,
    state: StateCell,
    receiver: oneshot::Receiver<Result<FtdiDevice>>,
}

impl OpenRequest {
    /// Correlation id of the request, as it appears in logs
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Serial number being opened
    pub fn serial_number(&self) -> &str {
        self.serial.as_str()
    }

    /// Current lifecycle state
    pub fn state(&self) -> OpenState {
        self.state.get()
    }
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("id", &self.id)
            .field("serial", &self.serial)
            .field("state", &self.state())
            .finish()
    }
}

impl Future for OpenRequest {
    type Output = Result<FtdiDevice>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(Pin::new(&mut this.receiver).poll(cx));
        Poll::Ready(outcome.unwrap_or_else(|_| {
            Err(CoreError::runtime("runtime shut down before the open request settled").into())
        }))
    }
}

/// Schedule a driver open for `serial` and return the caller's future.
pub(crate) fn schedule(
    runtime: &Runtime,
    class: Rc<DeviceClass>,
    adapter: DriverCallAdapter,
    serial: SerialNumber,
    in_flight: Rc<Cell<usize>>,
) -> OpenRequest {
    let id = Id::new();
    let state = StateCell::new();
    let (sink, receiver) = oneshot::channel();

    let pending = PendingOpenRequest {
        id: id.clone(),
        serial,
        sink,
        work_unit: WorkUnit::acquire(in_flight),
        state: state.clone(),
        controller: runtime.controller_thread(),
    };
    state.set(OpenState::Scheduled);
    debug!(request = %id, serial = %serial, "Scheduled device open");

    // The worker gets its own copy of the serial number and the adapter,
    // nothing else.
    let worker_adapter = adapter.clone();
    let worker_state = state.clone();
    let work = runtime.spawn_worker(move || {
        worker_state.set(OpenState::Executing);
        OpenOutcome::from_driver(&worker_adapter, &serial)
    });

    runtime.spawn_controller(complete(pending, work, class, adapter));

    OpenRequest {
        id,
        serial,
        state,
        receiver,
    }
}

/// Completion stage; runs on the controller once the worker returns
async fn complete(
    pending: PendingOpenRequest,
    work: JoinHandle<OpenOutcome>,
    class: Rc<DeviceClass>,
    adapter: DriverCallAdapter,
) {
    let joined = work.await;
    pending.state.set(OpenState::Completing);

    let outcome = match (check_controller(pending.controller), joined) {
        (Err(e), _) => Err(e),
        (Ok(()), Ok(result)) => adopt(&pending, result, &class, adapter),
        (Ok(()), Err(e)) => Err(DeviceError::construction(format!(
            "open worker did not finish: {}",
            e
        ))),
    };

    pending.settle(outcome);
}

/// Fail unless running on the controller.
///
/// Completion tasks are spawned on the controller's `LocalSet` and cannot
/// migrate, so this only trips if that wiring changes.
fn check_controller(controller: ThreadId) -> Result<()> {
    if thread::current().id() == controller {
        Ok(())
    } else {
        Err(CoreError::wrong_thread("open completion").into())
    }
}

/// Turn a worker outcome into a device object or an error
fn adopt(
    pending: &PendingOpenRequest,
    outcome: OpenOutcome,
    class: &DeviceClass,
    adapter: DriverCallAdapter,
) -> Result<FtdiDevice> {
    let serial = pending.serial.as_str();
    let (status, stray) = match outcome {
        OpenOutcome::Opened(handle) => {
            return class.instantiate(pending.serial, DeviceHandle::new(handle.adopt()), adapter);
        }
        OpenOutcome::Failed { status, stray } => (status, stray),
    };

    match (classify(status), stray) {
        (StatusClass::Success, _) => Err(DeviceError::Driver {
            operation: "open",
            status: FtStatus::INVALID_HANDLE,
        }),
        (StatusClass::DeviceAlreadyOpen, Some(raw)) => {
            // The driver may or may not own this handle; leave it alone.
            warn!(
                request = %pending.id,
                handle = raw.as_raw(),
                "Ignoring handle returned with FT_DEVICE_NOT_OPENED"
            );
            Err(DeviceError::from_status("open", status, serial))
        }
        (_, _) => Err(DeviceError::from_status("open", status, serial)),
    }
}
