//! # Sealed Secrets
//!
//! [`SealedBytes`] is the container every password, derived key, and
//! plaintext master secret lives in while the engine holds it. It owns a
//! heap buffer, hands out only scoped borrows, cannot be cloned, and on
//! drop overwrites the buffer with `passes` rounds of CSPRNG output
//! before the final zero fill.
//!
//! The random passes exist for the same reason secure-delete tools do
//! them: a single zero pass leaves the previous contents recoverable from
//! some storage tiers, and the cost of a few extra fills on a 32-byte
//! buffer is nothing. The zeroize crate's compiler fences keep the final
//! clear from being optimized away.

use rand::RngCore;
use zeroize::Zeroize;

/// Default overwrite passes when none are configured.
pub const DEFAULT_WIPE_PASSES: u8 = 3;

/// An owned buffer of sensitive bytes with guaranteed multi-pass
/// overwrite on release.
///
/// Deliberately implements neither `Clone` nor `Serialize`, and its
/// `Debug` shows only the length. Read access goes through
/// [`expose`](Self::expose); the borrow ends before the buffer can move.
pub struct SealedBytes {
    buf: Vec<u8>,
    passes: u8,
}

impl SealedBytes {
    /// Seals an existing byte buffer. The vector is taken by value so no
    /// second copy of the secret stays behind in the caller.
    pub fn new(buf: Vec<u8>, passes: u8) -> Self {
        Self {
            buf,
            passes: passes.max(1),
        }
    }

    /// Seals the UTF-8 bytes of a string, consuming it.
    pub fn from_string(s: String, passes: u8) -> Self {
        Self::new(s.into_bytes(), passes)
    }

    /// Seals `len` fresh bytes from the OS CSPRNG.
    pub fn random(len: usize, passes: u8) -> Self {
        let mut buf = vec![0u8; len];
        rand::rngs::OsRng.fill_bytes(&mut buf);
        Self::new(buf, passes)
    }

    /// Scoped read access to the sealed bytes.
    pub fn expose(&self) -> &[u8] {
        &self.buf
    }

    /// Number of sealed bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Drop for SealedBytes {
    fn drop(&mut self) {
        let mut rng = rand::rngs::OsRng;
        for _ in 0..self.passes {
            rng.fill_bytes(&mut self.buf);
        }
        self.buf.zeroize();
    }
}

impl std::fmt::Debug for SealedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SealedBytes({} bytes)", self.buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_returns_the_sealed_bytes() {
        let sealed = SealedBytes::new(vec![1, 2, 3], 3);
        assert_eq!(sealed.expose(), &[1, 2, 3]);
        assert_eq!(sealed.len(), 3);
        assert!(!sealed.is_empty());
    }

    #[test]
    fn from_string_seals_utf8_bytes() {
        let sealed = SealedBytes::from_string("hunter2".to_string(), 1);
        assert_eq!(sealed.expose(), b"hunter2");
    }

    #[test]
    fn random_draws_requested_length() {
        let a = SealedBytes::random(32, 1);
        let b = SealedBytes::random(32, 1);
        assert_eq!(a.len(), 32);
        // Two 32-byte CSPRNG draws colliding means the RNG is broken.
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn zero_passes_is_clamped_to_one() {
        let sealed = SealedBytes::new(vec![9; 8], 0);
        assert_eq!(sealed.passes, 1);
    }

    #[test]
    fn debug_does_not_leak_contents() {
        let sealed = SealedBytes::new(b"super secret".to_vec(), 3);
        let rendered = format!("{sealed:?}");
        assert!(!rendered.contains("super"));
        assert!(rendered.contains("12 bytes"));
    }
}
