//! Fixed-layout frame codec.
//!
//! Pure functions between envelopes and the wire layout in
//! [`mdlx_chip::frames`]; no I/O happens here. Serialization cannot fail
//! (envelope constructors already enforce field sizes); deserialization
//! rejects any buffer that is not exactly one frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mdlx_chip::frames::{
    METRIC_SET_SIZE, RESPONSE_SIZE, SCALAR_LEN, SIGN_MAGIC, SIGN_REQUEST_SIZE, VERIFY_MAGIC,
    VERIFY_REQUEST_SIZE,
};
use mdlx_chip::regs::xadc;

use crate::envelope::{MetricEnvelope, RequestEnvelope, ResponseEnvelope, SignRequest, VerifyRequest};
use crate::error::{MdlxError, Result};

impl RequestEnvelope {
    /// Serialize into the wire frame carrying `slot` in the header.
    #[must_use]
    pub fn to_frame(&self, slot: u64) -> Bytes {
        match self {
            Self::Sign(req) => serialize_sign(req, slot),
            Self::Verify(req) => serialize_verify(req, slot),
        }
    }
}

/// Serialize one sign request into its 128-byte frame.
#[must_use]
pub fn serialize_sign(req: &SignRequest, slot: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(SIGN_REQUEST_SIZE);
    buf.put_u64(SIGN_MAGIC);
    buf.put_u64(slot);
    buf.put_slice(&req.d);
    buf.put_slice(&req.k);
    buf.put_slice(&req.h);
    buf.put_bytes(0, SIGN_REQUEST_SIZE - buf.len());
    buf.freeze()
}

/// Serialize one verify request into its 192-byte frame.
#[must_use]
pub fn serialize_verify(req: &VerifyRequest, slot: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(VERIFY_REQUEST_SIZE);
    buf.put_u64(VERIFY_MAGIC);
    buf.put_u64(slot);
    buf.put_slice(&req.qx);
    buf.put_slice(&req.qy);
    buf.put_slice(&req.r);
    buf.put_slice(&req.s);
    buf.put_slice(&req.h);
    buf.put_bytes(0, VERIFY_REQUEST_SIZE - buf.len());
    buf.freeze()
}

/// Parse one 96-byte response frame into its slot id and envelope.
///
/// The slot id occupies the full 8 header bytes on the wire even though the
/// device only ever echoes values below `max_pending`; range checking is the
/// slot table's job.
///
/// # Errors
///
/// Returns [`MdlxError::WrongResponseSize`] for any other buffer length.
pub fn deserialize_response(frame: &[u8]) -> Result<(u64, ResponseEnvelope)> {
    if frame.len() != RESPONSE_SIZE {
        return Err(MdlxError::WrongResponseSize { got: frame.len() });
    }

    let mut buf = frame;
    buf.advance(4);
    #[allow(clippy::cast_possible_wrap)]
    let status = buf.get_u32() as i32;
    let slot = buf.get_u64();
    let r = buf.copy_to_bytes(SCALAR_LEN).to_vec();
    let s = buf.copy_to_bytes(SCALAR_LEN).to_vec();
    // remaining 16 bytes are padding

    Ok((slot, ResponseEnvelope::new(status, r, s)))
}

/// Parse one 28-byte metric register block.
///
/// # Errors
///
/// Returns [`MdlxError::WrongMetricSize`] for any other buffer length.
pub fn deserialize_metric(block: &[u8]) -> Result<MetricEnvelope> {
    if block.len() != METRIC_SET_SIZE {
        return Err(MdlxError::WrongMetricSize { got: block.len() });
    }

    let mut buf = block;
    let temperature = format!("{:.6}", xadc::temperature_celsius(buf.get_u32_le()));
    let vccint = format!("{:.6}", xadc::supply_volts(buf.get_u32_le()));
    let vccaux = format!("{:.6}", xadc::supply_volts(buf.get_u32_le()));
    let vccbram = format!("{:.6}", xadc::supply_volts(buf.get_u32_le()));
    let sign_count = buf.get_u32_le();
    let verify_count = buf.get_u32_le();
    let error_count = buf.get_u32_le();

    Ok(MetricEnvelope {
        temperature,
        vccint,
        vccaux,
        vccbram,
        sign_count,
        verify_count,
        error_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdlx_chip::frames::{
        RESPONSE_R_OFFSET, RESPONSE_SLOT_OFFSET, RESPONSE_STATUS_OFFSET, RESPONSE_S_OFFSET,
    };

    fn hex32(s: &str) -> Vec<u8> {
        assert_eq!(s.len(), 64);
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    const D: &str = "519b423d715f8b581f4fa8ee59f4771a5b44c8130b4e3eacca54a56dda72b464";
    const K: &str = "94a1bbb14b906a61a280f245f9e93c7f3b4a6247824f5d33b9670787642a68de";
    const H: &str = "ea5cd45052849c4ae816bbc44ed833e832af8a619ba47268aabca2744c4c6268";

    #[test]
    fn sign_frame_layout() {
        let req = SignRequest::new(&hex32(D), &hex32(K), &hex32(H)).unwrap();
        let frame = serialize_sign(&req, 16);

        assert_eq!(frame.len(), SIGN_REQUEST_SIZE);
        assert_eq!(
            &frame[..16],
            &[
                0xAA, 0xAA, 0xAA, 0xAA, 0x00, 0x00, 0x00, 0x00, //
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
            ]
        );
        assert_eq!(&frame[16..48], &hex32(D)[..]);
        assert_eq!(&frame[48..80], &hex32(K)[..]);
        assert_eq!(&frame[80..112], &hex32(H)[..]);
        assert!(frame[112..].iter().all(|&b| b == 0));
    }

    #[test]
    fn verify_frame_header() {
        let qx = hex32("e305d41ab27b39c84230ab2faf34fb15e9d0543f4ac19d2520b94d71df9be5bf");
        let qy = hex32("0b97c506c163237d6e9264f7148336e524d32174754198066995a252b1a51f4e");
        let r = hex32("5806c2774086b61c97afd87585215c09fe57233f232278c0e8976d35f0570641");
        let s = hex32("6d8a758eb8edfeecbdab2e413bee8bc73a88a887f97a54c2a967de0afcb8b0af");
        let h = b"Hello World";

        let req = VerifyRequest::new(&qx, &qy, &r, &s, h).unwrap();
        let frame = serialize_verify(&req, 16);

        assert_eq!(frame.len(), VERIFY_REQUEST_SIZE);
        assert_eq!(
            &frame[..16],
            &[
                0xBB, 0xBB, 0xBB, 0xBB, 0x00, 0x00, 0x00, 0x00, //
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
            ]
        );
        assert_eq!(&frame[16..48], &qx[..]);
        // "Hello World" left-pads into the tail of h
        assert_eq!(&frame[144 + 32 - h.len()..176], &h[..]);
    }

    #[test]
    fn response_frame_round_trips() {
        let mut frame = [0u8; RESPONSE_SIZE];
        frame[RESPONSE_STATUS_OFFSET..RESPONSE_STATUS_OFFSET + 4]
            .copy_from_slice(&7u32.to_be_bytes());
        frame[RESPONSE_SLOT_OFFSET..RESPONSE_SLOT_OFFSET + 8].copy_from_slice(&42u64.to_be_bytes());
        frame[RESPONSE_R_OFFSET..RESPONSE_R_OFFSET + 32].copy_from_slice(&[0x11; 32]);
        frame[RESPONSE_S_OFFSET..RESPONSE_S_OFFSET + 32].copy_from_slice(&[0x22; 32]);

        let (slot, env) = deserialize_response(&frame).unwrap();
        assert_eq!(slot, 42);
        assert_eq!(env.status(), 7);
        assert_eq!(env.signature(), (&[0x11u8; 32][..], &[0x22u8; 32][..]));
    }

    #[test]
    fn short_inputs_pad_into_place() {
        let req = SignRequest::new(&[0xab], &[0x01, 0x02], &[]).unwrap();
        let frame = serialize_sign(&req, 3);

        // a device-side parse of the padded fields recovers the inputs
        assert!(frame[16..47].iter().all(|&b| b == 0));
        assert_eq!(frame[47], 0xab);
        assert_eq!(&frame[78..80], &[0x01, 0x02]);
        assert!(frame[80..112].iter().all(|&b| b == 0));
    }

    #[test]
    fn response_wrong_size_rejected() {
        let err = deserialize_response(&[0u8; 48]).unwrap_err();
        assert!(matches!(err, MdlxError::WrongResponseSize { got: 48 }));
    }

    #[test]
    fn metric_block_decodes_reference_values() {
        let block: [u8; 28] = [
            0xEC, 0xA0, 0x00, 0x00, // temperature
            0xDA, 0x45, 0x00, 0x00, // vccint
            0x7A, 0x9A, 0x00, 0x00, // vccaux
            0xE2, 0x45, 0x00, 0x00, // vccbram
            0x00, 0x00, 0x00, 0x00, // sign count
            0x00, 0x00, 0x00, 0x00, // verify count
            0x00, 0x00, 0x00, 0x00, // error count
        ];

        let m = deserialize_metric(&block).unwrap();
        assert_eq!(m.temperature(), "41.486725");
        assert_eq!(m.voltages(), ("0.818573", "1.810272", "0.818939"));
        assert_eq!(m.counters(), (0, 0, 0));
    }

    #[test]
    fn metric_wrong_size_rejected() {
        let err = deserialize_metric(&[0u8; 27]).unwrap_err();
        assert!(matches!(err, MdlxError::WrongMetricSize { got: 27 }));
    }
}
