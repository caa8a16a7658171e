//! Typed request, response, and metric envelopes.
//!
//! Envelopes are the in-memory shape of the wire frames in
//! [`mdlx_chip::frames`]. Request fields are fixed 32-byte big-endian
//! integers; the constructors left-pad shorter inputs so a small `r` or `d`
//! can never shift the frame layout.

use mdlx_chip::frames::SCALAR_LEN;

use crate::error::{MdlxError, Result};

/// One 32-byte big-endian request field.
pub(crate) type Scalar = [u8; SCALAR_LEN];

fn left_pad(field: &'static str, src: &[u8]) -> Result<Scalar> {
    if src.len() > SCALAR_LEN {
        return Err(MdlxError::OversizedField {
            field,
            len: src.len(),
        });
    }
    let mut out = [0u8; SCALAR_LEN];
    out[SCALAR_LEN - src.len()..].copy_from_slice(src);
    Ok(out)
}

/// Work unit submitted by a caller.
#[derive(Debug, Clone)]
pub enum RequestEnvelope {
    /// Signature generation.
    Sign(SignRequest),
    /// Signature verification.
    Verify(VerifyRequest),
}

/// Inputs of one ECDSA signature generation.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub(crate) d: Scalar,
    pub(crate) k: Scalar,
    pub(crate) h: Scalar,
}

impl SignRequest {
    /// Build from the private key `d`, per-signature nonce `k`, and message
    /// digest `h`, each a big-endian integer of at most 32 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MdlxError::OversizedField`] if any input exceeds 32 bytes.
    pub fn new(d: &[u8], k: &[u8], h: &[u8]) -> Result<Self> {
        Ok(Self {
            d: left_pad("d", d)?,
            k: left_pad("k", k)?,
            h: left_pad("h", h)?,
        })
    }
}

/// Inputs of one ECDSA signature verification.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub(crate) qx: Scalar,
    pub(crate) qy: Scalar,
    pub(crate) r: Scalar,
    pub(crate) s: Scalar,
    pub(crate) h: Scalar,
}

impl VerifyRequest {
    /// Build from the public key `(qx, qy)`, signature `(r, s)`, and message
    /// digest `h`, each a big-endian integer of at most 32 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MdlxError::OversizedField`] if any input exceeds 32 bytes.
    pub fn new(qx: &[u8], qy: &[u8], r: &[u8], s: &[u8], h: &[u8]) -> Result<Self> {
        Ok(Self {
            qx: left_pad("qx", qx)?,
            qy: left_pad("qy", qy)?,
            r: left_pad("r", r)?,
            s: left_pad("s", s)?,
            h: left_pad("h", h)?,
        })
    }
}

/// Parsed completion delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    status: i32,
    r: Vec<u8>,
    s: Vec<u8>,
}

impl ResponseEnvelope {
    pub(crate) const fn new(status: i32, r: Vec<u8>, s: Vec<u8>) -> Self {
        Self { status, r, s }
    }

    /// Sentinel delivered when the device is down: status −1, no signature.
    pub(crate) const fn device_down() -> Self {
        Self {
            status: -1,
            r: Vec::new(),
            s: Vec::new(),
        }
    }

    /// Device status word: 0 on success, −1 on device drain, other values
    /// are device-defined error codes.
    #[must_use]
    pub const fn status(&self) -> i32 {
        self.status
    }

    /// Signature `(r, s)`. Empty on a drained request.
    #[must_use]
    pub fn signature(&self) -> (&[u8], &[u8]) {
        (&self.r, &self.s)
    }
}

/// Parsed `user` register block.
///
/// Sensor readings are pre-formatted decimal strings with six fractional
/// digits, ready for the metric line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEnvelope {
    pub(crate) temperature: String,
    pub(crate) vccint: String,
    pub(crate) vccaux: String,
    pub(crate) vccbram: String,
    pub(crate) sign_count: u32,
    pub(crate) verify_count: u32,
    pub(crate) error_count: u32,
}

impl MetricEnvelope {
    /// Die temperature in degrees Celsius.
    #[must_use]
    pub fn temperature(&self) -> &str {
        &self.temperature
    }

    /// Supply voltages `(vccint, vccaux, vccbram)` in volts.
    #[must_use]
    pub fn voltages(&self) -> (&str, &str, &str) {
        (&self.vccint, &self.vccaux, &self.vccbram)
    }

    /// Operation counters `(sign, verify, error)`.
    #[must_use]
    pub const fn counters(&self) -> (u32, u32, u32) {
        (self.sign_count, self.verify_count, self.error_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_fields_left_pad() {
        let req = SignRequest::new(&[0x01], &[0xab, 0xcd], &[]).unwrap();
        assert_eq!(req.d[31], 0x01);
        assert!(req.d[..31].iter().all(|&b| b == 0));
        assert_eq!(&req.k[30..], &[0xab, 0xcd]);
        assert_eq!(req.h, [0u8; 32]);
    }

    #[test]
    fn oversized_field_rejected() {
        let long = [0u8; 33];
        let err = SignRequest::new(&long, &[], &[]).unwrap_err();
        assert!(matches!(
            err,
            MdlxError::OversizedField { field: "d", len: 33 }
        ));
    }

    #[test]
    fn device_down_sentinel_is_empty() {
        let resp = ResponseEnvelope::device_down();
        assert_eq!(resp.status(), -1);
        let (r, s) = resp.signature();
        assert!(r.is_empty() && s.is_empty());
    }
}
