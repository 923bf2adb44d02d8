//! Sequence numbering on the producer side and gap detection on the consumer
//! side. There is no retransmission: a gap is only reported.

use tracing::debug;

/// Hands out per-session sequence numbers starting at 1.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    /// Start a new encoder session.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Take the next sequence number. Wraps after `u32::MAX`.
    pub fn next_sequence(&mut self) -> u32 {
        let current = self.next;
        self.next = self.next.wrapping_add(1);
        current
    }

    /// The number the next call will return.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A discontinuity between the expected and the received sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub expected: u32,
    pub received: u32,
}

impl Gap {
    /// Number of records skipped, assuming forward progress.
    pub fn missing(&self) -> u32 {
        self.received.wrapping_sub(self.expected)
    }

    /// True when the received number lies behind the expected one
    /// (a restarted encoder session or a reordered record).
    pub fn is_regression(&self) -> bool {
        self.missing() > u32::MAX / 2
    }
}

/// Consumer-side check of `expected != received`.
///
/// The first observed number only establishes the baseline. After every
/// observation the expectation moves to `received + 1`, so one lost record
/// yields exactly one gap.
#[derive(Debug, Clone, Default)]
pub struct GapDetector {
    expected: Option<u32>,
    gaps: u64,
}

impl GapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `received` and report a gap if it was not the expected number.
    pub fn observe(&mut self, received: u32) -> Option<Gap> {
        let gap = match self.expected {
            Some(expected) if expected != received => Some(Gap { expected, received }),
            _ => None,
        };
        if let Some(gap) = gap {
            self.gaps += 1;
            debug!(
                expected = gap.expected,
                received = gap.received,
                missing = gap.missing(),
                "sequence gap detected"
            );
        }
        self.expected = Some(received.wrapping_add(1));
        gap
    }

    /// Number expected next, if any record has been observed.
    pub fn expected(&self) -> Option<u32> {
        self.expected
    }

    /// Total gaps reported so far.
    pub fn gap_count(&self) -> u64 {
        self.gaps
    }
}
