//! Snowflake ID Generator
//!
//! 64-bit IDs laid out as `millis since EPOCH_MS (42) | machine (10) | sequence (12)`.
//! Rooms, channels, files, messages and uploads all draw from one generator.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

/// Service epoch (2024-01-01T00:00:00.000Z)
const EPOCH_MS: u64 = 1_704_067_200_000;

const MACHINE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Lock-free snowflake generator.
///
/// The last issued `(millis, sequence)` pair lives in one atomic word so that
/// concurrent callers never hand out the same pair. When a millisecond's
/// sequence space runs out, IDs borrow from the next millisecond.
pub struct SnowflakeGenerator {
    machine_id: u64,
    state: AtomicU64,
}

impl SnowflakeGenerator {
    pub fn new(machine_id: u64) -> Self {
        Self {
            machine_id: machine_id & ((1 << MACHINE_BITS) - 1),
            state: AtomicU64::new(0),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> i64 {
        let now = elapsed_millis();
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            let last_millis = current >> SEQUENCE_BITS;
            let next = if now > last_millis {
                now << SEQUENCE_BITS
            } else {
                current + 1
            };
            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => {
                    let millis = next >> SEQUENCE_BITS;
                    let sequence = next & SEQUENCE_MASK;
                    let id = (millis << (MACHINE_BITS + SEQUENCE_BITS))
                        | (self.machine_id << SEQUENCE_BITS)
                        | sequence;
                    return id as i64;
                }
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

fn elapsed_millis() -> u64 {
    (Utc::now().timestamp_millis().max(0) as u64).saturating_sub(EPOCH_MS)
}

/// Creation instant encoded in a snowflake ID.
pub fn issued_at(snowflake: i64) -> DateTime<Utc> {
    let millis = ((snowflake as u64) >> (MACHINE_BITS + SEQUENCE_BITS)) + EPOCH_MS;
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
