//! Host driver for the MBPU ECDSA accelerator.
//!
//! Offloads NIST P-256 sign and verify operations to FPGA units reached
//! through XDMA character devices. Callers get a synchronous [`request`]
//! while the driver pipelines up to `max_pending` operations per unit:
//! every request frame carries a slot id, completions come back on an
//! independent stream in any order, and the slot id routes each one to the
//! thread that submitted it.
//!
//! # Architecture
//!
//! ```text
//! caller ─┐                       ┌─ pusher ── /dev/mdlxN_h2c_0 ─┐
//! caller ─┼─ shared channel ──────┤                              FPGA
//! caller ─┘                       └─ poller ── /dev/mdlxN_c2h_0 ─┘
//!              per-request sink ◄── slot table ◄──┘
//! ```
//!
//! One pusher/poller pair per unit; a per-unit Unix socket serves metric
//! snapshots. A device fault drains every pending and future request with
//! status −1 until [`shutdown`].
//!
//! # Quick start
//!
//! ```no_run
//! use mdlx_driver::{create_random_k, RequestEnvelope, SignRequest};
//!
//! # fn main() -> mdlx_driver::Result<()> {
//! mdlx_driver::init(1, 64, "")?;
//!
//! let d = [0x51u8; 32]; // signing key
//! let h = [0xeau8; 32]; // message digest
//! let k = create_random_k(&d, &h)?;
//!
//! let resp = mdlx_driver::request(RequestEnvelope::Sign(SignRequest::new(&d, &k, &h)?))?;
//! assert_eq!(resp.status(), 0);
//! let (r, s) = resp.signature();
//! println!("r = {r:02x?}, s = {s:02x?}");
//!
//! mdlx_driver::shutdown()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod codec;
mod device;
mod envelope;
mod error;
mod io;
mod manager;
mod metrics;
mod nonce;
mod slot;
mod worker;

pub use codec::{deserialize_metric, deserialize_response, serialize_sign, serialize_verify};
pub use device::{DeviceIo, MdlxDevice};
pub use envelope::{MetricEnvelope, RequestEnvelope, ResponseEnvelope, SignRequest, VerifyRequest};
pub use error::{MdlxError, Result};
pub use manager::{init, request, shutdown, Manager};
pub use nonce::create_random_k;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        create_random_k, DeviceIo, Manager, MdlxDevice, MdlxError, RequestEnvelope,
        ResponseEnvelope, Result, SignRequest, VerifyRequest,
    };
}
