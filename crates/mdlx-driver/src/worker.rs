//! Per-unit device worker: the pusher/poller pair.
//!
//! Each MBPU unit is driven by two long-running threads. The pusher takes
//! requests off the shared channel, installs their sinks in the slot table,
//! and writes frames; the poller reads completions and routes them back by
//! slot id. They coordinate through an `available` window counter, a
//! bounded token channel arming the poller one read per request, and a
//! zero-capacity park/wake handshake that puts the pusher to sleep while
//! the window is full.
//!
//! Any fatal device error flips the worker into emergency: the pusher fails
//! every pending caller through the slot table, a drain thread takes over
//! the shared request channel, and every later request is failed with
//! status −1 until shutdown.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{error, info, warn};

use crate::codec;
use crate::device::DeviceIo;
use crate::envelope::RequestEnvelope;
use crate::error::Result;
use crate::metrics::MetricServer;
use crate::slot::{ResponseSink, SlotTable};

/// One request paired with the sink its completion is delivered on.
#[derive(Debug)]
pub(crate) struct RequestWrapper {
    pub(crate) env: RequestEnvelope,
    pub(crate) sink: ResponseSink,
}

/// Join handles of one unit's threads plus its metric server.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    index: usize,
    pusher: JoinHandle<()>,
    poller: JoinHandle<()>,
    metrics: MetricServer,
}

impl WorkerHandle {
    /// Wait for the pusher and poller, then stop the metric server.
    ///
    /// A hung metric thread is reported but never blocks shutdown.
    pub(crate) fn join(mut self) {
        if self.pusher.join().is_err() {
            error!("mdlx{}: pusher panicked", self.index);
        }
        if self.poller.join().is_err() {
            error!("mdlx{}: poller panicked", self.index);
        }
        if let Err(e) = self.metrics.stop() {
            error!("mdlx{}: {e}", self.index);
        }
    }
}

/// Start the pusher and poller for one unit.
pub(crate) fn spawn(
    index: usize,
    dev: Arc<dyn DeviceIo>,
    max_pending: usize,
    requests: Receiver<RequestWrapper>,
    emergency: Arc<AtomicBool>,
    metrics: MetricServer,
) -> Result<WorkerHandle> {
    let slots = Arc::new(SlotTable::new(max_pending));
    let available = Arc::new(AtomicUsize::new(max_pending));
    let (token_tx, token_rx) = bounded::<()>(max_pending);
    let (park_tx, park_rx) = bounded::<()>(0);
    let (wake_tx, wake_rx) = bounded::<()>(0);
    let (emergency_tx, emergency_rx) = bounded::<()>(1);

    let pusher = Pusher {
        index,
        dev: Arc::clone(&dev),
        requests,
        slots: Arc::clone(&slots),
        available: Arc::clone(&available),
        token_tx,
        park_tx,
        wake_rx,
        emergency_rx,
        emergency: Arc::clone(&emergency),
    };
    let poller = Poller {
        index,
        dev,
        slots,
        available,
        token_rx,
        park_rx,
        wake_tx,
        emergency_tx,
        emergency,
    };

    let pusher = thread::Builder::new()
        .name(format!("mdlx{index}-push"))
        .spawn(move || pusher.run())?;
    let poller = thread::Builder::new()
        .name(format!("mdlx{index}-poll"))
        .spawn(move || poller.run())?;

    Ok(WorkerHandle {
        index,
        pusher,
        poller,
        metrics,
    })
}

struct Pusher {
    index: usize,
    dev: Arc<dyn DeviceIo>,
    requests: Receiver<RequestWrapper>,
    slots: Arc<SlotTable>,
    available: Arc<AtomicUsize>,
    token_tx: Sender<()>,
    park_tx: Sender<()>,
    wake_rx: Receiver<()>,
    emergency_rx: Receiver<()>,
    emergency: Arc<AtomicBool>,
}

impl Pusher {
    fn run(self) {
        info!("mdlx{}: pusher running", self.index);
        loop {
            // emergency beats new work
            if self.emergency_rx.try_recv().is_ok() {
                self.enter_emergency(None);
                break;
            }
            select! {
                recv(self.emergency_rx) -> _ => {
                    self.enter_emergency(None);
                    break;
                }
                recv(self.requests) -> msg => {
                    let Ok(req) = msg else {
                        info!("mdlx{}: request channel closed, pusher stopping", self.index);
                        break;
                    };
                    if !self.push(req) {
                        break;
                    }
                }
            }
        }
        // dropping the token sender lets the poller exit once the
        // outstanding completions have drained
    }

    /// Submit one request to the device. Returns false when the worker
    /// must stop.
    fn push(&self, req: RequestWrapper) -> bool {
        if self.available.load(Ordering::SeqCst) == 0 {
            // window full: hand the poller a park token and sleep until it
            // frees a slot
            if self.park_tx.send(()).is_err() || self.wake_rx.recv().is_err() {
                error!("mdlx{}: poller gone while parked", self.index);
                self.enter_emergency(Some(req));
                return false;
            }
        }

        // arm the poller for one completion
        if self.token_tx.send(()).is_err() {
            error!("mdlx{}: poll channel closed", self.index);
            self.enter_emergency(Some(req));
            return false;
        }

        let slot = loop {
            match self.slots.put(req.sink.clone()) {
                Ok(slot) => break slot,
                Err(_) => {
                    // the poller has bumped `available` but not yet vacated
                    // the slot; clears immediately
                    warn!("mdlx{}: slot table momentarily full, retrying", self.index);
                    std::hint::spin_loop();
                }
            }
        };

        let frame = req.env.to_frame(slot);
        match self.dev.write_frame(&frame) {
            Ok(()) => {
                self.available.fetch_sub(1, Ordering::SeqCst);
                true
            }
            Err(e) => {
                error!("mdlx{}: request write failed: {e}", self.index);
                // the sink is already installed, so fail_all covers this
                // caller too
                self.enter_emergency(None);
                false
            }
        }
    }

    fn enter_emergency(&self, unsent: Option<RequestWrapper>) {
        self.emergency.store(true, Ordering::SeqCst);
        let failed = self.slots.fail_all();
        error!(
            "mdlx{}: device down, failed {failed} pending requests",
            self.index
        );
        // an uninstalled request's sink disconnects on drop, which the
        // caller reads as the drain outcome
        drop(unsent);
        spawn_drain(self.index, self.requests.clone());
    }
}

struct Poller {
    index: usize,
    dev: Arc<dyn DeviceIo>,
    slots: Arc<SlotTable>,
    available: Arc<AtomicUsize>,
    token_rx: Receiver<()>,
    park_rx: Receiver<()>,
    wake_tx: Sender<()>,
    emergency_tx: Sender<()>,
    emergency: Arc<AtomicBool>,
}

impl Poller {
    fn run(self) {
        info!("mdlx{}: poller running", self.index);
        while let Ok(()) = self.token_rx.recv() {
            if let Err(e) = self.poll_one() {
                error!("mdlx{}: poll failed: {e}", self.index);
                self.emergency.store(true, Ordering::SeqCst);
                let _ = self.emergency_tx.try_send(());
                break;
            }
        }
        info!("mdlx{}: poller stopping", self.index);
        // dropping park_rx/wake_tx releases a pusher parked mid-handshake
    }

    fn poll_one(&self) -> Result<()> {
        let frame = self.dev.read_response()?;
        let (slot, env) = codec::deserialize_response(&frame)?;
        let sink = self.slots.take(slot)?;
        let _ = sink.send(env);

        // free one window slot, waking the pusher if it is parked
        if self.park_rx.try_recv().is_ok() {
            self.available.fetch_add(1, Ordering::SeqCst);
            let _ = self.wake_tx.send(());
        } else {
            self.available.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Fail every request arriving on the shared channel until shutdown.
fn spawn_drain(index: usize, requests: Receiver<RequestWrapper>) {
    let spawned = thread::Builder::new()
        .name(format!("mdlx{index}-drain"))
        .spawn(move || {
            info!("mdlx{index}: failing requests until shutdown");
            while let Ok(req) = requests.recv() {
                // dropping the sink delivers the −1 drain outcome
                drop(req);
            }
            info!("mdlx{index}: drain finished");
        });
    if let Err(e) = spawned {
        error!("mdlx{index}: could not spawn drain thread: {e}");
    }
}
