//! Tick-driven fade runner
//!
//! A fade is a fixed number of volume steps on a fixed time slice:
//!
//! - Fade-in: 50ms slices, `fade_in_ms / 50 + 1` steps, the count runs up
//!   from 1 and always uses the triangle shape. It ends as soon as the
//!   faded volume reaches the real volume.
//! - Fade-out: 100ms slices, `min(remaining, fade_out_ms) / 100` steps, the
//!   count runs down to 0 with the configured shape. After the last step
//!   the volume is forced to silence and the runner stays finished until
//!   the item stops.
//!
//! Slice deadlines advance from the fade start, not from the tick that
//! executed the step, so a late tick does not stretch the fade.

use spindle_common::FadeShape;
use std::time::Duration;
use tokio::time::Instant;

pub const FADE_IN_SLICE_MS: i64 = 50;
pub const FADE_OUT_SLICE_MS: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// One executed step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeStep {
    /// Volume multiplier for this step
    pub index: f64,
    /// Fade-out only: this was the last step
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct FadeRun {
    direction: FadeDirection,
    shape: FadeShape,
    count: i64,
    total: i64,
    next_step: Instant,
    finished: bool,
}

impl FadeRun {
    /// Fade-in over `fade_in_ms`, first step due at `now`
    pub fn fade_in(fade_in_ms: i64, now: Instant) -> Self {
        Self {
            direction: FadeDirection::In,
            shape: FadeShape::Triangle,
            count: 1,
            total: fade_in_ms.max(0) / FADE_IN_SLICE_MS + 1,
            next_step: now,
            finished: false,
        }
    }

    /// Fade-out over the shorter of the remaining play time and `fade_out_ms`
    pub fn fade_out(remaining_ms: i64, fade_out_ms: i64, shape: FadeShape, now: Instant) -> Self {
        let span = remaining_ms.min(fade_out_ms).max(0);
        let total = span / FADE_OUT_SLICE_MS;
        Self {
            direction: FadeDirection::Out,
            shape,
            count: total,
            total,
            next_step: now,
            finished: false,
        }
    }

    pub fn is_fade_in(&self) -> bool {
        self.direction == FadeDirection::In
    }

    /// Number of steps in the whole ramp
    pub fn total_steps(&self) -> i64 {
        self.total
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.finished && now >= self.next_step
    }

    pub fn slice(&self) -> Duration {
        let ms = match self.direction {
            FadeDirection::In => FADE_IN_SLICE_MS,
            FadeDirection::Out => FADE_OUT_SLICE_MS,
        };
        Duration::from_millis(ms as u64)
    }

    /// Execute the current step and schedule the next one
    pub fn step(&mut self) -> FadeStep {
        let index = self.shape.index(self.count, self.total);

        match self.direction {
            FadeDirection::In => self.count += 1,
            FadeDirection::Out => {
                self.count -= 1;
                if self.count <= 0 {
                    self.finished = true;
                }
            }
        }
        self.next_step += self.slice();

        FadeStep {
            index,
            finished: self.finished,
        }
    }
}
