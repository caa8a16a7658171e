//! Process-wide dispatch of requests onto MBPU device workers.
//!
//! One manager owns every worker and a single shared request channel; any
//! idle pusher picks up the next request, so load spreads across units
//! without explicit scheduling. Callers block on a per-request sink until
//! the matching completion (or the drain sentinel) comes back.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{bounded, Sender};
use tracing::info;

use crate::device::{DeviceIo, MdlxDevice};
use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::{MdlxError, Result};
use crate::metrics::MetricServer;
use crate::worker::{self, RequestWrapper, WorkerHandle};

/// Metric socket directory used when the caller passes `""`.
const DEFAULT_SOCKET_DIR: &str = "/var/run/";

static MANAGER: Mutex<Option<Manager>> = Mutex::new(None);

/// Owns the shared request channel and all device workers.
///
/// Most code drives the process-wide instance through [`init`], [`request`]
/// and [`shutdown`]; constructing a `Manager` directly is how tests inject
/// mock devices.
#[derive(Debug)]
pub struct Manager {
    request_tx: Sender<RequestWrapper>,
    workers: Vec<WorkerHandle>,
}

impl Manager {
    /// Open `device_count` real MBPU units and start their workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are out of range, the metric
    /// socket directory does not exist, or any device or socket fails to
    /// open.
    pub fn open(device_count: usize, max_pending: usize, metric_socket_dir: &str) -> Result<Self> {
        let mut devices: Vec<Arc<dyn DeviceIo>> = Vec::with_capacity(device_count);
        for index in 0..device_count {
            devices.push(Arc::new(MdlxDevice::open(index)?));
        }
        Self::with_devices(devices, max_pending, metric_socket_dir)
    }

    /// Start workers around the given device adapters.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are out of range, the metric
    /// socket directory does not exist, or a metric socket fails to bind.
    pub fn with_devices(
        devices: Vec<Arc<dyn DeviceIo>>,
        max_pending: usize,
        metric_socket_dir: &str,
    ) -> Result<Self> {
        if devices.is_empty() {
            return Err(MdlxError::setup("device count must be at least 1"));
        }
        if max_pending == 0 {
            return Err(MdlxError::setup("max_pending must be at least 1"));
        }
        let socket_dir = resolve_socket_dir(metric_socket_dir)?;

        let (request_tx, request_rx) = bounded::<RequestWrapper>(0);

        let mut workers = Vec::with_capacity(devices.len());
        for (index, dev) in devices.into_iter().enumerate() {
            let emergency = Arc::new(AtomicBool::new(false));
            let metrics = MetricServer::start(
                index,
                Arc::clone(&dev),
                Arc::clone(&emergency),
                socket_dir.join(format!("mbpu{index}.sock")),
            )?;
            workers.push(worker::spawn(
                index,
                dev,
                max_pending,
                request_rx.clone(),
                emergency,
                metrics,
            )?);
        }

        info!(
            devices = workers.len(),
            max_pending, "MBPU manager initialized"
        );
        Ok(Self {
            request_tx,
            workers,
        })
    }

    /// Submit one request and block until its completion.
    ///
    /// Returns the device-down sentinel (status −1, empty signature) when
    /// the worker that accepted the request has entered emergency drain.
    #[must_use]
    pub fn request(&self, env: RequestEnvelope) -> ResponseEnvelope {
        dispatch(&self.request_tx, env)
    }

    /// Close the request channel and wait for every worker to wind down.
    ///
    /// In-flight requests still receive their completions before the
    /// pollers exit; metric sockets are stopped and removed last.
    pub fn shutdown(self) {
        drop(self.request_tx);
        for handle in self.workers {
            handle.join();
        }
        info!("MBPU manager closed");
    }
}

fn dispatch(request_tx: &Sender<RequestWrapper>, env: RequestEnvelope) -> ResponseEnvelope {
    let (sink, completion) = bounded::<ResponseEnvelope>(1);
    if request_tx.send(RequestWrapper { env, sink }).is_err() {
        // every worker is gone
        return ResponseEnvelope::device_down();
    }
    // a dropped sink means the request was drained
    completion
        .recv()
        .unwrap_or_else(|_| ResponseEnvelope::device_down())
}

fn resolve_socket_dir(dir: &str) -> Result<PathBuf> {
    if dir.is_empty() {
        return Ok(PathBuf::from(DEFAULT_SOCKET_DIR));
    }
    let path = PathBuf::from(dir);
    std::fs::metadata(&path)
        .map_err(|e| MdlxError::setup(format!("metric socket dir {}: {e}", path.display())))?;
    Ok(path)
}

// ── Process-wide singleton ───────────────────────────────────────────────

fn manager_slot() -> std::sync::MutexGuard<'static, Option<Manager>> {
    MANAGER.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Initialize the process-wide manager.
///
/// Opens `device_count` MBPU units, each pipelining up to `max_pending`
/// requests, with metric sockets under `metric_socket_dir` (`""` selects
/// `/var/run/`).
///
/// # Errors
///
/// Returns [`MdlxError::AlreadyInitialized`] if a manager is live, or any
/// setup error from opening devices and sockets.
pub fn init(device_count: usize, max_pending: usize, metric_socket_dir: &str) -> Result<()> {
    let mut slot = manager_slot();
    if slot.is_some() {
        return Err(MdlxError::AlreadyInitialized);
    }
    *slot = Some(Manager::open(device_count, max_pending, metric_socket_dir)?);
    Ok(())
}

/// Tear down the process-wide manager.
///
/// # Errors
///
/// Returns [`MdlxError::NotInitialized`] if no manager is live.
pub fn shutdown() -> Result<()> {
    let manager = manager_slot().take().ok_or(MdlxError::NotInitialized)?;
    manager.shutdown();
    Ok(())
}

/// Submit one request through the process-wide manager and block for its
/// completion.
///
/// Status 0 means success, −1 a drained request (device down or manager
/// shut down mid-flight); other values are device-defined error codes.
///
/// # Errors
///
/// Returns [`MdlxError::NotInitialized`] if no manager is live.
pub fn request(env: RequestEnvelope) -> Result<ResponseEnvelope> {
    // clone the sender out of the lock so concurrent callers and shutdown
    // never wait on a blocked request
    let request_tx = manager_slot()
        .as_ref()
        .ok_or(MdlxError::NotInitialized)?
        .request_tx
        .clone();
    Ok(dispatch(&request_tx, env))
}
