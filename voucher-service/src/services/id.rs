//! Voucher identifier generation.
//!
//! Identifiers look like `PGM-1735689600000-K3ZQ`: a human-legible prefix,
//! the issuance instant in unix milliseconds, and a random base-36 suffix.
//! The millisecond component never repeats within one generator, so ids
//! stay unique and sort by creation even under bursts of issuance.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};

const SUFFIX_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 4;

#[derive(Debug)]
pub struct VoucherIdGenerator {
    prefix: String,
    last_millis: AtomicI64,
}

impl VoucherIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last_millis: AtomicI64::new(0),
        }
    }

    /// Generate an id for a voucher issued at `now`.
    pub fn generate(&self, now: DateTime<Utc>) -> String {
        let millis = self.next_millis(now.timestamp_millis());
        format!("{}-{}-{}", self.prefix, millis, random_suffix())
    }

    /// Strictly increasing millisecond stamp, never behind the wall clock.
    fn next_millis(&self, wall: i64) -> i64 {
        let mut last = self.last_millis.load(Ordering::Relaxed);
        loop {
            let next = if wall > last { wall } else { last + 1 };
            match self.last_millis.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}
