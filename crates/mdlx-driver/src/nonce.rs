//! Per-signature nonce generation for the sign offload path.
//!
//! The device computes the scalar multiplication but the host supplies the
//! nonce `k`, so its quality is entirely this module's problem. The
//! construction mixes the private key, OS entropy, and the message digest
//! through SHA-512 into an AES-256-CTR keystream, then samples a field
//! element uniformly from `[1, N-1]` (the extra 8 sampled bytes make the
//! reduction bias negligible). P-256 parameters are fixed here; the device
//! implements no other curve.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;
use ctr::Ctr128BE;
use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};

use crate::error::{MdlxError, Result};

type AesCtr = Ctr128BE<Aes256>;

/// Fixed CTR IV of the nonce keystream.
const AES_IV: &[u8; 16] = b"IV for ECDSA CTR";

/// Order of the P-256 base point.
const P256_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84, //
    0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63, 0x25, 0x51,
];

/// OS entropy mixed into the keystream key.
const ENTROPY_LEN: usize = (256 + 7) / 16;

/// Keystream bytes sampled before the modular reduction.
const SAMPLE_LEN: usize = 32 + 8;

/// Derive a per-signature nonce `k` in `[1, N-1]` for P-256.
///
/// `d` is the signing key and `h` the message digest; both are folded into
/// the keystream key together with fresh entropy. Returns `k` as its
/// minimal big-endian byte representation (at most 32 bytes, never empty).
///
/// # Errors
///
/// Returns [`MdlxError::Entropy`] if the OS entropy source fails.
pub fn create_random_k(d: &[u8], h: &[u8]) -> Result<Vec<u8>> {
    let mut entropy = [0u8; ENTROPY_LEN];
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| MdlxError::Entropy {
            reason: e.to_string(),
        })?;

    // key = leading 32 bytes of SHA-512(d || entropy || h)
    let mut md = Sha512::new();
    md.update(d);
    md.update(entropy);
    md.update(h);
    let digest = md.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest[..32]);

    // CTR keystream over zeros is the raw cipher output
    let mut sample = [0u8; SAMPLE_LEN];
    let mut csprng = AesCtr::new(&key.into(), AES_IV.into());
    csprng.apply_keystream(&mut sample);

    // reduce into [1, N-1]
    let n_minus_one = BigUint::from_bytes_be(&P256_ORDER) - 1u32;
    let k = BigUint::from_bytes_be(&sample) % n_minus_one + 1u32;
    Ok(k.to_bytes_be())
}
