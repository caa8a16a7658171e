//! Character-device node naming.
//!
//! The XDMA driver exposes each MBPU unit `N` as four nodes under `/dev`:
//! `mdlx<N>_h2c_0` (host to card, write-only), `mdlx<N>_c2h_0` (card to
//! host, read-only), `mdlx<N>_control` (read-only), `mdlx<N>_user`
//! (read-write). All four are opened exclusively by one driver instance.

use std::path::PathBuf;

/// Shared `/dev/mdlx<N>` prefix for a unit.
#[must_use]
pub fn prefix(index: usize) -> String {
    format!("/dev/mdlx{index}")
}

/// Host-to-card stream node (request frames).
#[must_use]
pub fn h2c(index: usize) -> PathBuf {
    PathBuf::from(format!("{}_h2c_0", prefix(index)))
}

/// Card-to-host stream node (response frames).
#[must_use]
pub fn c2h(index: usize) -> PathBuf {
    PathBuf::from(format!("{}_c2h_0", prefix(index)))
}

/// XDMA channel-status node.
#[must_use]
pub fn control(index: usize) -> PathBuf {
    PathBuf::from(format!("{}_control", prefix(index)))
}

/// Sensor/counter/core-control node.
#[must_use]
pub fn user(index: usize) -> PathBuf {
    PathBuf::from(format!("{}_user", prefix(index)))
}
