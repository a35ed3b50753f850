// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rolling pacing metrics and grading for harness runs.

/// One cycle's worth of pacing data, fed into [`PacingTracker::observe`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PacingSample {
    /// A frame was queued for scanout.
    pub presented: bool,
    /// The producer held the shared frame past the acquire timeout.
    pub busy: bool,
    /// Vertical blanks skipped by the wait that ended the cycle.
    pub skipped_vblanks: u64,
    /// Wall time of the whole cycle, including the vertical-blank wait, in ms.
    pub cycle_ms: f64,
}

/// Letter grade for presentation pacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PacingGrade {
    /// Nearly every blank carries a fresh frame.
    A,
    /// Occasional skips or busy cycles.
    B,
    /// Degraded but watchable.
    C,
    /// Frequent skips or a starved consumer.
    D,
}

impl PacingGrade {
    /// Returns a short label for reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`PacingTracker::observe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PacingReport {
    /// Current grade.
    pub grade: PacingGrade,
    /// Skipped vertical blanks per 1000 cycles.
    pub skip_rate_per_1000: f64,
    /// Busy cycles per 1000 cycles.
    pub busy_rate_per_1000: f64,
    /// Cycles observed.
    pub total_cycles: u64,
    /// Cycles that presented a frame.
    pub presented_cycles: u64,
    /// Vertical blanks skipped in total.
    pub skipped_vblanks: u64,
}

/// Rolling pacing tracker with a fixed-size cycle-time history.
#[derive(Debug)]
pub struct PacingTracker<const N: usize> {
    cycle_ms: [f64; N],
    cursor: usize,
    total_cycles: u64,
    presented_cycles: u64,
    busy_cycles: u64,
    skipped_vblanks: u64,
}

impl<const N: usize> Default for PacingTracker<N> {
    fn default() -> Self {
        Self::new(16.67)
    }
}

impl<const N: usize> PacingTracker<N> {
    /// Creates a tracker with `seed_ms` prefilled in the history.
    #[must_use]
    pub const fn new(seed_ms: f64) -> Self {
        Self {
            cycle_ms: [seed_ms; N],
            cursor: 0,
            total_cycles: 0,
            presented_cycles: 0,
            busy_cycles: 0,
            skipped_vblanks: 0,
        }
    }

    /// Observes one cycle and returns an updated report.
    pub fn observe(&mut self, sample: PacingSample) -> PacingReport {
        self.total_cycles = self.total_cycles.saturating_add(1);
        if N > 0 {
            self.cycle_ms[self.cursor] = sample.cycle_ms;
            self.cursor = (self.cursor + 1) % N;
        }
        if sample.presented {
            self.presented_cycles = self.presented_cycles.saturating_add(1);
        }
        if sample.busy {
            self.busy_cycles = self.busy_cycles.saturating_add(1);
        }
        self.skipped_vblanks = self.skipped_vblanks.saturating_add(sample.skipped_vblanks);
        self.report()
    }

    /// Report over everything observed so far.
    #[must_use]
    pub fn report(&self) -> PacingReport {
        let per_1000 = |count: u64| {
            if self.total_cycles == 0 {
                0.0
            } else {
                count as f64 * 1000.0 / self.total_cycles as f64
            }
        };
        let skip_rate = per_1000(self.skipped_vblanks);
        let busy_rate = per_1000(self.busy_cycles);
        PacingReport {
            grade: grade_for(skip_rate, busy_rate),
            skip_rate_per_1000: skip_rate,
            busy_rate_per_1000: busy_rate,
            total_cycles: self.total_cycles,
            presented_cycles: self.presented_cycles,
            skipped_vblanks: self.skipped_vblanks,
        }
    }

    /// Returns the cycle-time history oldest to newest.
    #[must_use]
    pub fn cycle_deltas(&self) -> [f64; N] {
        let mut out = [0.0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.cycle_ms[(self.cursor + i) % N];
        }
        out
    }

    /// Returns an ASCII sparkline over [`cycle_deltas`](Self::cycle_deltas).
    #[must_use]
    pub fn sparkline_ascii(&self, min_ms: f64, max_ms: f64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        let span = (max_ms - min_ms).max(f64::EPSILON);
        self.cycle_deltas()
            .iter()
            .map(|ms| {
                let t = (ms.clamp(min_ms, max_ms) - min_ms) / span;
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "index is clamped to ASCII level count"
                )]
                let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
                LEVELS[level.min(LEVELS.len() - 1)] as char
            })
            .collect()
    }
}

fn grade_for(skip_rate_per_1000: f64, busy_rate_per_1000: f64) -> PacingGrade {
    const THRESHOLDS: [(PacingGrade, f64, f64); 3] = [
        (PacingGrade::A, 1.0, 50.0),
        (PacingGrade::B, 5.0, 150.0),
        (PacingGrade::C, 15.0, 400.0),
    ];
    THRESHOLDS
        .iter()
        .find(|(_, skip, busy)| skip_rate_per_1000 < *skip && busy_rate_per_1000 < *busy)
        .map_or(PacingGrade::D, |(grade, _, _)| *grade)
}
