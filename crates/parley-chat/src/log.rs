//! Fixed-capacity circular message log with a revision counter.
//!
//! Every append bumps `revision` by one. Consumers remember the revision
//! they last saw and ask for everything newer with
//! [`MessageLog::produce_since`]. The log never grows: once full, each
//! append overwrites the oldest message, so a consumer that falls more than
//! `capacity` revisions behind silently loses the oldest part of its
//! backlog.

/// Ring buffer of chat messages.
#[derive(Debug, Clone)]
pub struct MessageLog {
    /// `None` marks a slot that has never been written.
    slots: Vec<Option<String>>,
    /// Next slot to write. Always in `0..slots.len()`.
    write: usize,
    revision: u64,
}

impl MessageLog {
    /// Creates an empty log holding at most `capacity` messages.
    ///
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            write: 0,
            revision: 0,
        }
    }

    /// Appends a message, overwriting the oldest one if the log is full.
    pub fn append(&mut self, text: impl Into<String>) {
        self.slots[self.write] = Some(text.into());
        self.write = (self.write + 1) % self.slots.len();
        self.revision += 1;
    }

    /// Returns every retained message newer than `consumer_revision`,
    /// oldest first.
    ///
    /// At most `capacity` messages are returned. A `consumer_revision` at or
    /// beyond the current revision yields an empty vector.
    pub fn produce_since(&self, consumer_revision: u64) -> Vec<String> {
        let capacity = self.slots.len();
        let delta = self.pending_since(consumer_revision).min(capacity as u64) as usize;

        let start = floor_mod(self.write as i64 - delta as i64, capacity);
        (0..delta)
            .map(|offset| &self.slots[(start + offset) % capacity])
            .map_while(|slot| slot.clone())
            .collect()
    }

    /// Number of revisions a consumer at `consumer_revision` has not seen,
    /// including any that have already been overwritten.
    pub fn pending_since(&self, consumer_revision: u64) -> u64 {
        self.revision.saturating_sub(consumer_revision)
    }

    /// The revision of the most recent append (0 before any append).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Maximum number of retained messages.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of messages currently retained.
    pub fn len(&self) -> usize {
        self.revision.min(self.slots.len() as u64) as usize
    }

    /// Returns `true` if nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.revision == 0
    }
}

/// Euclidean remainder: always in `0..modulus`, even for negative `index`.
///
/// Rust's `%` keeps the sign of the dividend (`-1 % 3 == -1`), which would
/// index before the start of the ring.
///
/// `modulus` must be in `1..=i64::MAX`. Ring capacities are always in that
/// range; anything else is a caller bug and panics in debug builds.
pub fn floor_mod(index: i64, modulus: usize) -> usize {
    debug_assert!(
        modulus > 0 && modulus <= i64::MAX as usize,
        "floor_mod modulus out of range: {modulus}"
    );
    index.rem_euclid(modulus as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(capacity: usize, messages: &[&str]) -> MessageLog {
        let mut log = MessageLog::new(capacity);
        for m in messages {
            log.append(*m);
        }
        log
    }

    // =====================================================================
    // floor_mod()
    // =====================================================================

    #[test]
    fn test_floor_mod_handles_extreme_inputs() {
        let max = i64::MAX as usize;
        assert_eq!(floor_mod(i64::MIN, max), max - 1);
        assert_eq!(floor_mod(i64::MAX, max), 0);
        assert_eq!(floor_mod(-1, max), max - 1);
        assert_eq!(floor_mod(i64::MIN, 1), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "modulus out of range")]
    fn test_floor_mod_zero_modulus_panics_in_debug() {
        floor_mod(5, 0);
    }

    #[test]
    #[cfg(all(debug_assertions, target_pointer_width = "64"))]
    #[should_panic(expected = "modulus out of range")]
    fn test_floor_mod_modulus_beyond_i64_panics_in_debug() {
        floor_mod(5, i64::MAX as usize + 1);
    }

    #[test]
    fn test_floor_mod_negative_wraps_into_range() {
        assert_eq!(floor_mod(-1, 3), 2);
        assert_eq!(floor_mod(-3, 3), 0);
        assert_eq!(floor_mod(-4, 3), 2);
        assert_eq!(floor_mod(-3, 20), 17);
    }

    #[test]
    fn test_floor_mod_matches_plain_remainder_for_non_negative() {
        for i in 0..50 {
            assert_eq!(floor_mod(i, 7), (i % 7) as usize);
        }
    }

    #[test]
    fn test_floor_mod_always_in_range_and_periodic() {
        for modulus in 1..=9usize {
            for i in -40i64..=40 {
                let r = floor_mod(i, modulus);
                assert!(r < modulus, "floor_mod({i}, {modulus}) = {r}");
                assert_eq!(r, floor_mod(i + modulus as i64, modulus));
            }
        }
    }

    // =====================================================================
    // append()
    // =====================================================================

    #[test]
    fn test_append_increments_revision_by_one() {
        let mut log = MessageLog::new(3);
        for expected in 1..=10 {
            log.append("x");
            assert_eq!(log.revision(), expected);
        }
    }

    #[test]
    fn test_new_log_is_empty() {
        let log = MessageLog::new(5);
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert_eq!(log.revision(), 0);
        assert!(log.produce_since(0).is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let log = log_with(0, &["a", "b"]);
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.produce_since(0), vec!["b"]);
    }

    #[test]
    fn test_len_saturates_at_capacity() {
        let log = log_with(3, &["a", "b"]);
        assert_eq!(log.len(), 2);
        let log = log_with(3, &["a", "b", "c", "d", "e"]);
        assert_eq!(log.len(), 3);
    }

    // =====================================================================
    // produce_since()
    // =====================================================================

    #[test]
    fn test_produce_since_overwrites_oldest_when_full() {
        let log = log_with(3, &["a", "b", "c", "d"]);

        assert_eq!(log.revision(), 4);
        assert_eq!(log.produce_since(0), vec!["b", "c", "d"]);
        assert_eq!(log.produce_since(3), vec!["d"]);
    }

    #[test]
    fn test_produce_since_partial_fill_stops_at_empty_slots() {
        // Two writes into five slots: never-written slots are not returned.
        let log = log_with(5, &["a", "b"]);
        assert_eq!(log.produce_since(0), vec!["a", "b"]);
        assert_eq!(log.produce_since(1), vec!["b"]);
    }

    #[test]
    fn test_produce_since_current_or_future_revision_is_empty() {
        let log = log_with(3, &["a", "b"]);
        assert!(log.produce_since(2).is_empty());
        assert!(log.produce_since(99).is_empty());
    }

    #[test]
    fn test_produce_since_returns_min_of_delta_and_capacity() {
        let capacity = 4;
        let mut log = MessageLog::new(capacity);
        for n in 0..11u64 {
            log.append(format!("m{n}"));
            for r in 0..=log.revision() {
                let got = log.produce_since(r);
                let expected = (log.revision() - r).min(capacity as u64) as usize;
                assert_eq!(got.len(), expected, "revision {} since {r}", log.revision());
            }
        }
    }

    #[test]
    fn test_produce_since_is_ascending_and_unmodified_across_wraps() {
        let mut log = MessageLog::new(4);
        for n in 1..=13u64 {
            log.append(format!("m{n}"));
        }
        // Revision 13, capacity 4 → m10..m13 retained.
        assert_eq!(log.produce_since(0), vec!["m10", "m11", "m12", "m13"]);
        assert_eq!(log.produce_since(11), vec!["m12", "m13"]);
    }

    #[test]
    fn test_empty_string_is_a_real_message() {
        let log = log_with(3, &["", "b"]);
        assert_eq!(log.produce_since(0), vec!["", "b"]);
    }

    #[test]
    fn test_pending_since_counts_lost_revisions_too() {
        let log = log_with(2, &["a", "b", "c", "d", "e"]);
        assert_eq!(log.pending_since(0), 5);
        assert_eq!(log.produce_since(0).len(), 2);
        assert_eq!(log.pending_since(7), 0);
    }
}
