//! Data bank: one large buffer of random lowercase letters.
//!
//! Payloads are zero-copy slices of the bank, so the expected bytes for a
//! round trip are simply the slice that was sent.

use bytes::Bytes;
use rand::Rng;

use super::HarnessError;

/// Bytes the bank and generated payloads are drawn from
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Length of the random part of generated names
pub const NAME_LEN: usize = 12;

/// Generate `size` random lowercase ASCII bytes.
pub fn generate_data<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Vec<u8> {
    (0..size)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

/// Generate a random blob name, `<prefix>-<12 letters>` or just the letters.
pub fn random_name<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    let letters: String = (0..NAME_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();

    if prefix.is_empty() {
        letters
    } else {
        format!("{}-{}", prefix, letters)
    }
}

/// A payload selected for one round trip
#[derive(Debug, Clone)]
pub struct Payload {
    /// Fresh name the payload is uploaded under
    pub name: String,
    /// Offset of the slice within the bank
    pub offset: usize,
    /// The exact bytes that must come back
    pub data: Bytes,
}

/// Immutable pool of random bytes shared by all workers
#[derive(Debug, Clone)]
pub struct DataBank {
    data: Bytes,
}

impl DataBank {
    /// Fill a bank of `size` bytes.
    pub fn build<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        Self {
            data: Bytes::from(generate_data(size, rng)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Check that slices of `min..=max` bytes can be drawn from this bank.
    pub fn check_range(&self, min: usize, max: usize) -> Result<(), HarnessError> {
        if min > max || max > self.data.len() {
            return Err(HarnessError::InvalidPayloadRange {
                min,
                max,
                bank: self.data.len(),
            });
        }
        Ok(())
    }

    /// Pick a random slice with a length uniform in `min..=max` and a fresh name.
    pub fn pick_payload<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        min: usize,
        max: usize,
        name_prefix: &str,
    ) -> Result<Payload, HarnessError> {
        self.check_range(min, max)?;

        let len = rng.gen_range(min..=max);
        let offset = rng.gen_range(0..=self.data.len() - len);

        Ok(Payload {
            name: random_name(name_prefix, rng),
            offset,
            data: self.data.slice(offset..offset + len),
        })
    }
}
