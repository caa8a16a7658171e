//! Per-unit metric export over a Unix stream socket.
//!
//! One connection means one snapshot: the server reads the metric register
//! block, writes a single JSON line, and closes. The socket stays up
//! through an emergency (the `user` registers remain readable when the
//! datapath is down) and reports `m_emergency` accordingly.

use std::io::Write;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{error, info, warn};

use crate::codec;
use crate::device::DeviceIo;
use crate::error::{MdlxError, Result};

/// How often the accept loop checks for a connection or the stop flag.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Stop protocol: observe the thread once per second, this many times.
const STOP_CHECKS: u64 = 10;

/// Unix socket server exporting one unit's metric snapshot.
#[derive(Debug)]
pub(crate) struct MetricServer {
    index: usize,
    stop: Arc<AtomicBool>,
    finished: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl MetricServer {
    /// Bind `socket_path` and start the accept loop.
    ///
    /// A stale socket file from an earlier run is removed before binding.
    pub(crate) fn start(
        index: usize,
        dev: Arc<dyn DeviceIo>,
        emergency: Arc<AtomicBool>,
        socket_path: PathBuf,
    ) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }
        let listener = UnixListener::bind(&socket_path)
            .map_err(|e| MdlxError::setup(format!("bind {}: {e}", socket_path.display())))?;
        listener.set_nonblocking(true)?;

        let stop = Arc::new(AtomicBool::new(false));
        let (finished_tx, finished) = bounded::<()>(1);
        let thread = thread::Builder::new().name(format!("mdlx{index}-metric")).spawn({
            let stop = Arc::clone(&stop);
            move || accept_loop(index, &listener, &*dev, &emergency, &stop, &socket_path, &finished_tx)
        })?;

        info!("mdlx{index}: metric server listening");
        Ok(Self {
            index,
            stop,
            finished,
            thread: Some(thread),
        })
    }

    /// Stop the accept loop and remove the socket file.
    ///
    /// Observes the thread once per second for up to ten seconds; a thread
    /// still running after that is reported as hung, never waited out.
    ///
    /// # Errors
    ///
    /// Returns [`MdlxError::MetricHung`] if the thread does not stop.
    pub(crate) fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.stop.store(true, Ordering::SeqCst);

        let mut checks_left = STOP_CHECKS;
        loop {
            match self.finished.recv_timeout(Duration::from_secs(1)) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    checks_left -= 1;
                    if checks_left == 0 {
                        error!("mdlx{}: metric server is not stopping", self.index);
                        return Err(MdlxError::MetricHung {
                            waited_s: STOP_CHECKS,
                        });
                    }
                    warn!(
                        "mdlx{}: metric server still running, checks left: {checks_left}",
                        self.index
                    );
                }
            }
        }

        let _ = thread.join();
        info!("mdlx{}: metric server stopped", self.index);
        Ok(())
    }
}

impl Drop for MetricServer {
    fn drop(&mut self) {
        // ask the thread to wind down; join only happens through stop()
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn accept_loop(
    index: usize,
    listener: &UnixListener,
    dev: &dyn DeviceIo,
    emergency: &AtomicBool,
    stop: &AtomicBool,
    socket_path: &Path,
    finished: &Sender<()>,
) {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                if let Err(e) = serve(stream, dev, emergency) {
                    warn!("mdlx{index}: metric connection failed: {e}");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                error!("mdlx{index}: metric accept failed: {e}");
                break;
            }
        }
    }

    if let Err(e) = std::fs::remove_file(socket_path) {
        warn!(
            "mdlx{index}: could not remove {}: {e}",
            socket_path.display()
        );
    }
    let _ = finished.send(());
}

fn serve(mut stream: UnixStream, dev: &dyn DeviceIo, emergency: &AtomicBool) -> Result<()> {
    // the accepted stream must block for the single write
    stream.set_nonblocking(false)?;

    let block = dev.read_metrics()?;
    let metric = codec::deserialize_metric(&block)?;

    let (vccint, vccaux, vccbram) = metric.voltages();
    let (sign_count, verify_count, error_count) = metric.counters();
    let emergency_flag = u8::from(emergency.load(Ordering::SeqCst));
    let line = format!(
        r#"{{ "m_temperature":{}, "m_vccint":{}, "m_vccaux":{}, "m_vccbram":{}, "m_signCount":{},"m_verifyCount":{},"m_errorCount":{}, "m_emergency":{} }}"#,
        metric.temperature(),
        vccint,
        vccaux,
        vccbram,
        sign_count,
        verify_count,
        error_count,
        emergency_flag,
    );

    stream.write_all(line.as_bytes())?;
    Ok(())
}
