//! # Shamir Codec
//!
//! Splits a byte-string secret into `n` shares with a reconstruction
//! threshold of `k`, and reconstructs it from any `k` of them. Each byte
//! position of the secret gets its own random polynomial of degree `k-1`
//! over GF(256) with the secret byte as the constant term; share `i` is
//! the evaluation of every polynomial at `x = i`.
//!
//! The scheme is information-theoretically secure: `k-1` shares give an
//! attacker exactly zero bits of information about the secret. Share
//! x-coordinates are 1-based (x = 0 is reserved for the secret itself).
//!
//! Polynomial coefficients come from the OS CSPRNG, fresh per byte
//! position per split. Reconstruction is Lagrange interpolation at x = 0.
//!
//! ## Wire form
//!
//! A [`Share`] serializes as `{"X": <int>, "Y": "<base64>"}`. That exact
//! shape is the plaintext inside the password envelope, so it is part of
//! the file-format contract, not an implementation detail.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroize;

use super::gf256::{self, Gf256Error};

/// Errors from the split/combine codec.
#[derive(Debug, Error)]
pub enum ShamirError {
    /// The threshold must be at least 2 (1-of-n is just copies).
    #[error("threshold must be >= 2, got {0}")]
    ThresholdTooLow(usize),

    /// Split was asked for fewer shares than the threshold, or combine
    /// received fewer shares than the threshold requires.
    #[error("insufficient shares: need {required}, got {got}")]
    InsufficientShares {
        /// How many shares the operation needs.
        required: usize,
        /// How many it was given.
        got: usize,
    },

    /// Cannot create more than 255 shares (x-coordinates are non-zero bytes).
    #[error("cannot create more than 255 shares, got {0}")]
    TooManyShares(usize),

    /// The secret is empty — nothing to split.
    #[error("secret must not be empty")]
    EmptySecret,

    /// Duplicate (or zero) share x-coordinates were provided.
    #[error("duplicate or zero share number: {0}")]
    DuplicateShares(u8),

    /// Shares have inconsistent data lengths.
    #[error("share data lengths are inconsistent: expected {expected}, got {got}")]
    InconsistentShareLengths {
        /// Expected length from the first share.
        expected: usize,
        /// Actual length of the offending share.
        got: usize,
    },

    /// Field arithmetic failed. Unreachable once preconditions hold;
    /// surfaced rather than panicking.
    #[error("field arithmetic error: {0}")]
    Field(#[from] Gf256Error),
}

/// A single share of a split secret: the point `(x, y)` on the secret
/// polynomials.
///
/// `x` is a non-zero byte and identifies the share; `y` has one byte per
/// byte of the original secret. A share is meaningless in isolation —
/// `threshold` of them are needed to recover anything.
///
/// `y` is key material and is zeroized when the share is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// The x-coordinate of this share's evaluation point (1-based).
    #[serde(rename = "X")]
    pub x: u8,

    /// The share data — one byte per byte of the original secret.
    #[serde(rename = "Y", serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub y: Vec<u8>,
}

impl Drop for Share {
    fn drop(&mut self) {
        self.y.zeroize();
    }
}

fn to_base64<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_str(&BASE64.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(de)?;
    BASE64.decode(s).map_err(serde::de::Error::custom)
}

/// Split a secret into `total` shares with reconstruction threshold
/// `threshold`.
///
/// For each byte of the secret, generates a random polynomial of degree
/// `threshold - 1` with the secret byte as the constant term, then
/// evaluates it at points x = 1, 2, ..., total.
///
/// # Errors
///
/// - [`ShamirError::EmptySecret`] if the secret has no bytes
/// - [`ShamirError::ThresholdTooLow`] if `threshold < 2`
/// - [`ShamirError::InsufficientShares`] if `total < threshold`
/// - [`ShamirError::TooManyShares`] if `total > 255`
pub fn split(secret: &[u8], threshold: usize, total: usize) -> Result<Vec<Share>, ShamirError> {
    if secret.is_empty() {
        return Err(ShamirError::EmptySecret);
    }
    if threshold < 2 {
        return Err(ShamirError::ThresholdTooLow(threshold));
    }
    if total < threshold {
        return Err(ShamirError::InsufficientShares {
            required: threshold,
            got: total,
        });
    }
    if total > 255 {
        return Err(ShamirError::TooManyShares(total));
    }

    let mut shares: Vec<Share> = (1..=total)
        .map(|i| Share {
            x: i as u8,
            y: Vec::with_capacity(secret.len()),
        })
        .collect();

    let mut rng = rand::rngs::OsRng;

    // For each byte of the secret, construct a random polynomial and
    // evaluate it at every share's x-coordinate.
    let mut coefficients = vec![0u8; threshold];
    for &secret_byte in secret {
        coefficients[0] = secret_byte;
        // Fresh CSPRNG output for the higher-degree coefficients on every
        // byte position.
        rng.fill_bytes(&mut coefficients[1..]);

        for share in shares.iter_mut() {
            share.y.push(gf256::eval_polynomial(&coefficients, share.x));
        }
    }
    coefficients.zeroize();

    Ok(shares)
}

/// Reconstruct a secret from at least `threshold` shares.
///
/// Only the first `threshold` shares are used, in caller order. Every
/// used share must have a distinct non-zero x-coordinate and the same
/// data length.
///
/// **Note**: supplying fewer shares than the split's original threshold
/// (but still `>= threshold` as passed here) yields *incorrect* data
/// without error — the shares themselves carry no way to detect it. The
/// ceremony layer guards against this with the master-secret hash.
pub fn combine(shares: &[Share], threshold: usize) -> Result<Vec<u8>, ShamirError> {
    if threshold < 2 {
        return Err(ShamirError::ThresholdTooLow(threshold));
    }
    if shares.len() < threshold {
        return Err(ShamirError::InsufficientShares {
            required: threshold,
            got: shares.len(),
        });
    }
    let used = &shares[..threshold];

    let expected_len = used[0].y.len();
    for share in &used[1..] {
        if share.y.len() != expected_len {
            return Err(ShamirError::InconsistentShareLengths {
                expected: expected_len,
                got: share.y.len(),
            });
        }
    }

    let mut seen = [false; 256];
    for share in used {
        if share.x == 0 || seen[share.x as usize] {
            return Err(ShamirError::DuplicateShares(share.x));
        }
        seen[share.x as usize] = true;
    }

    let xs: Vec<u8> = used.iter().map(|s| s.x).collect();
    let mut secret = Vec::with_capacity(expected_len);
    let mut ys = vec![0u8; threshold];

    for byte_idx in 0..expected_len {
        for (slot, share) in ys.iter_mut().zip(used) {
            *slot = share.y[byte_idx];
        }
        secret.push(gf256::lagrange_interpolate_at_zero(&xs, &ys)?);
    }
    ys.zeroize();

    Ok(secret)
}
