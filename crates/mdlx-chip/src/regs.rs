//! Register map of the MBPU `control` and `user` BARs.
//!
//! All register access is in 4-byte units at 4-byte alignment; a transfer
//! that moves fewer bytes is a fault, not a retry condition.

/// Width of every register access, in bytes.
pub const RW_UNIT: usize = 4;

// ── control BAR (XDMA channel status) ────────────────────────────────────

/// Registers of the read-only `control` node.
pub mod control {
    /// H2C channel identity/status word.
    pub const H2C_STATUS: u64 = 0x0000;
    /// C2H channel identity/status word.
    pub const C2H_STATUS: u64 = 0x1000;

    /// Value read from [`H2C_STATUS`] when the channel is usable.
    pub const H2C_READY: [u8; 4] = [0x06, 0x80, 0xc0, 0x1f];
    /// Value read from [`C2H_STATUS`] when the channel is usable.
    pub const C2H_READY: [u8; 4] = [0x06, 0x80, 0xc1, 0x1f];
}

// ── user BAR (sensors, counters, core control) ───────────────────────────

/// Registers of the read-write `user` node.
pub mod user {
    /// XADC die temperature code.
    pub const XADC_TEMPERATURE: u64 = 0x2400;
    /// XADC VCCINT supply code.
    pub const XADC_VCCINT: u64 = 0x2404;
    /// XADC VCCAUX supply code.
    pub const XADC_VCCAUX: u64 = 0x2408;
    /// XADC VCCBRAM supply code.
    pub const XADC_VCCBRAM: u64 = 0x2418;

    /// Bitstream identification word.
    pub const FPGA_INFO: u64 = 0x1_8000;
    /// ECC core reset; written 0, all-ones, 0 to clear the C2H FIFO.
    pub const ECC_RESET: u64 = 0x1_800C;
    /// Completed sign operations.
    pub const COUNT_SIGN: u64 = 0x1_8010;
    /// Completed verify operations.
    pub const COUNT_VERIFY: u64 = 0x1_8014;
    /// Operations completed with an error status.
    pub const COUNT_ERROR: u64 = 0x1_8018;

    /// The seven registers of the metric block, in wire order.
    pub const METRIC_BLOCK: [u64; 7] = [
        XADC_TEMPERATURE,
        XADC_VCCINT,
        XADC_VCCAUX,
        XADC_VCCBRAM,
        COUNT_SIGN,
        COUNT_VERIFY,
        COUNT_ERROR,
    ];

    /// Register values written to [`ECC_RESET`], in order.
    pub const RESET_SEQUENCE: [[u8; 4]; 3] =
        [[0x00; 4], [0xff, 0xff, 0xff, 0xff], [0x00; 4]];
}

// ── XADC code conversion ─────────────────────────────────────────────────

/// Raw XADC code conversion, per the UltraScale sysmon transfer functions.
pub mod xadc {
    /// Convert a raw temperature code to degrees Celsius.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn temperature_celsius(code: u32) -> f32 {
        (code as f32) * 501.3743 / 65536.0 - 273.6777
    }

    /// Convert a raw supply-voltage code to volts (3 V full scale).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn supply_volts(code: u32) -> f32 {
        (code as f32) / 65536.0 * 3.0
    }
}
