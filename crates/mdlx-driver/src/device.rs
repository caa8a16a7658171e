//! MBPU device adapter and the I/O seam the workers drive.

use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use mdlx_chip::{frames, nodes, regs};
use rustix::fs::OFlags;

use crate::error::{MdlxError, Result};
use crate::io::IoHandle;

/// I/O seam between the dispatch machinery and one MBPU unit.
///
/// `write_frame` is called only by the unit's pusher and `read_response`
/// only by its poller, so each stream is single-flight; the two streams and
/// the register operations may run concurrently, and implementations back
/// them with independent handles.
pub trait DeviceIo: Debug + Send + Sync {
    /// Blocking write of one whole request frame.
    ///
    /// # Errors
    ///
    /// Returns an error on any failed or short transfer; the worker treats
    /// that as the device being down.
    fn write_frame(&self, frame: &[u8]) -> Result<()>;

    /// Blocking read of exactly one response frame.
    ///
    /// # Errors
    ///
    /// Returns an error on any failed or short transfer.
    fn read_response(&self) -> Result<[u8; frames::RESPONSE_SIZE]>;

    /// Probe the H2C/C2H channel-ready signatures.
    ///
    /// # Errors
    ///
    /// Returns [`MdlxError::ChannelUnavailable`] when a signature mismatches.
    fn check_available(&self) -> Result<()>;

    /// Read the 28-byte metric register block.
    ///
    /// # Errors
    ///
    /// Returns an error on any failed or short register read.
    fn read_metrics(&self) -> Result<[u8; frames::METRIC_SET_SIZE]>;

    /// Pulse the ECC core reset, clearing the C2H FIFO.
    ///
    /// # Errors
    ///
    /// Returns an error on any failed or short register write.
    fn reset(&self) -> Result<()>;

    /// Bitstream identification word, rendered as hex.
    ///
    /// # Errors
    ///
    /// Returns an error on any failed or short register read.
    fn version(&self) -> Result<String>;
}

/// One MBPU unit reached through its four character devices.
///
/// All four nodes are opened exclusively; a second open of the same unit
/// fails. The unit is reset on open so the C2H FIFO starts empty.
#[derive(Debug)]
pub struct MdlxDevice {
    index: usize,
    h2c: File,
    c2h: File,
    ctrl: File,
    user: File,
}

impl MdlxDevice {
    /// Open unit `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if any node is missing or cannot be opened
    /// exclusively, or if the post-open reset fails.
    pub fn open(index: usize) -> Result<Self> {
        tracing::debug!("opening MBPU unit {index}");

        let h2c = open_node(&nodes::h2c(index), false, true)?;
        let c2h = open_node(&nodes::c2h(index), true, false)?;
        let ctrl = open_node(&nodes::control(index), true, false)?;
        let user = open_node(&nodes::user(index), true, true)?;

        let dev = Self {
            index,
            h2c,
            c2h,
            ctrl,
            user,
        };
        dev.reset()?;

        tracing::info!("opened MBPU unit {index}");
        Ok(dev)
    }

    /// Get the unit index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    fn h2c_io(&self) -> IoHandle {
        IoHandle::new(self.h2c.as_raw_fd(), "h2c")
    }

    fn c2h_io(&self) -> IoHandle {
        IoHandle::new(self.c2h.as_raw_fd(), "c2h")
    }

    fn ctrl_io(&self) -> IoHandle {
        IoHandle::new(self.ctrl.as_raw_fd(), "control")
    }

    fn user_io(&self) -> IoHandle {
        IoHandle::new(self.user.as_raw_fd(), "user")
    }
}

fn open_node(path: &Path, read: bool, write: bool) -> Result<File> {
    if !path.exists() {
        return Err(MdlxError::device_not_found(path));
    }

    // flag bits are small positive values
    #[allow(clippy::cast_possible_wrap)]
    let excl_flag = OFlags::EXCL.bits() as i32;

    let file = OpenOptions::new()
        .read(read)
        .write(write)
        .custom_flags(excl_flag)
        .open(path)?;
    Ok(file)
}

impl DeviceIo for MdlxDevice {
    fn write_frame(&self, frame: &[u8]) -> Result<()> {
        self.h2c_io().write_all(frame)
    }

    fn read_response(&self) -> Result<[u8; frames::RESPONSE_SIZE]> {
        let mut frame = [0u8; frames::RESPONSE_SIZE];
        self.c2h_io().read_exact(&mut frame)?;
        Ok(frame)
    }

    fn check_available(&self) -> Result<()> {
        let probes = [
            ("H2C", regs::control::H2C_STATUS, regs::control::H2C_READY),
            ("C2H", regs::control::C2H_STATUS, regs::control::C2H_READY),
        ];

        let mut word = [0u8; regs::RW_UNIT];
        for (channel, offset, ready) in probes {
            self.ctrl_io().pread_exact(&mut word, offset)?;
            if word != ready {
                return Err(MdlxError::ChannelUnavailable { channel });
            }
        }
        Ok(())
    }

    fn read_metrics(&self) -> Result<[u8; frames::METRIC_SET_SIZE]> {
        let mut block = [0u8; frames::METRIC_SET_SIZE];
        for (chunk, offset) in block
            .chunks_exact_mut(regs::RW_UNIT)
            .zip(regs::user::METRIC_BLOCK)
        {
            self.user_io().pread_exact(chunk, offset)?;
        }
        Ok(block)
    }

    fn reset(&self) -> Result<()> {
        for word in regs::user::RESET_SEQUENCE {
            self.user_io().pwrite_all(&word, regs::user::ECC_RESET)?;
        }
        Ok(())
    }

    fn version(&self) -> Result<String> {
        let mut word = [0u8; regs::RW_UNIT];
        self.user_io().pread_exact(&mut word, regs::user::FPGA_INFO)?;
        Ok(format!("{:x}", u32::from_le_bytes(word)))
    }
}

impl Drop for MdlxDevice {
    fn drop(&mut self) {
        tracing::info!("closing MBPU unit {}", self.index);
    }
}
