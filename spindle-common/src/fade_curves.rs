//! Fade shape implementations for fade-in and fade-out volume ramps
//!
//! A fade is executed as a sequence of ticks. At every tick the player asks
//! for the volume multiplier ("fade index") for the current tick count:
//!
//! - Fade-in counts up from 1 toward the total, always using [`FadeShape::Triangle`]
//! - Fade-out counts down from the total toward 0 using the configured shape
//!
//! All shapes map normalized progress `x` in `[0, 1]` onto a multiplier in
//! `[0, 1]` with `f(0) = 0` and `f(1) = 1`.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Fade shape (curve family) used to compute the volume ramp multiplier
///
/// Each shape provides a different perceptual quality:
/// - Triangle: constant rate of change
/// - QuarterSine: fast start, gentle finish
/// - HalfSine: smooth acceleration and deceleration
/// - Quadratic: slow start, fast finish
/// - InvertedParabola: fast start, slow finish
/// - ExponentialSine: steep middle section with long shoulders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeShape {
    /// Triangle (linear): v(x) = x
    #[default]
    Triangle,

    /// Quarter sine: v(x) = sin(πx/2)
    QuarterSine,

    /// Half sine: v(x) = (1 - cos(πx)) / 2
    HalfSine,

    /// Quadratic: v(x) = x²
    Quadratic,

    /// Inverted parabola: v(x) = 1 - (1 - x)²
    InvertedParabola,

    /// Exponential sine: v(x) = 1 - cos(π/4 · ((2x - 1)³ + 1))
    ExponentialSine,
}

impl FadeShape {
    /// Apply the shape to normalized progress
    ///
    /// # Arguments
    /// * `x` - Normalized position through the fade (clamped to 0.0..=1.0)
    ///
    /// # Returns
    /// Volume multiplier (0.0 = silence, 1.0 = full volume), clamped
    pub fn apply(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);

        let v = match self {
            FadeShape::Triangle => x,
            FadeShape::QuarterSine => (x * FRAC_PI_2).sin(),
            FadeShape::HalfSine => (1.0 - (x * PI).cos()) / 2.0,
            FadeShape::Quadratic => x * x,
            FadeShape::InvertedParabola => 1.0 - (1.0 - x) * (1.0 - x),
            FadeShape::ExponentialSine => {
                let cube = (2.0 * x - 1.0).powi(3);
                1.0 - (FRAC_PI_4 * (cube + 1.0)).cos()
            }
        };

        v.clamp(0.0, 1.0)
    }

    /// Calculate the fade index for a tick count
    ///
    /// `elapsed_ticks` is the position in the ramp (count up for a fade-in,
    /// count down for a fade-out) and `total_ticks` the number of ticks in the
    /// whole ramp. The boundaries are exact: zero elapsed ticks always yields
    /// 0.0 and `elapsed >= total` always yields 1.0.
    pub fn index(&self, elapsed_ticks: i64, total_ticks: i64) -> f64 {
        if elapsed_ticks <= 0 {
            return 0.0;
        }
        if elapsed_ticks >= total_ticks {
            return 1.0;
        }
        self.apply(elapsed_ticks as f64 / total_ticks as f64)
    }

    /// Parse shape from a configuration string
    ///
    /// Accepted values (case insensitive):
    /// - 'triangle', 'linear'
    /// - 'quarter_sine', 'quarter-sine'
    /// - 'half_sine', 'half-sine'
    /// - 'quadratic'
    /// - 'inverted_parabola', 'inverted-parabola'
    /// - 'exponential_sine', 'exponential-sine'
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "triangle" | "linear" => Some(FadeShape::Triangle),
            "quarter_sine" | "quarter-sine" => Some(FadeShape::QuarterSine),
            "half_sine" | "half-sine" => Some(FadeShape::HalfSine),
            "quadratic" => Some(FadeShape::Quadratic),
            "inverted_parabola" | "inverted-parabola" => Some(FadeShape::InvertedParabola),
            "exponential_sine" | "exponential-sine" => Some(FadeShape::ExponentialSine),
            _ => None,
        }
    }

    /// Canonical configuration value (lowercase, underscored)
    pub fn to_config_string(&self) -> &'static str {
        match self {
            FadeShape::Triangle => "triangle",
            FadeShape::QuarterSine => "quarter_sine",
            FadeShape::HalfSine => "half_sine",
            FadeShape::Quadratic => "quadratic",
            FadeShape::InvertedParabola => "inverted_parabola",
            FadeShape::ExponentialSine => "exponential_sine",
        }
    }

    /// Get human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeShape::Triangle => "Triangle",
            FadeShape::QuarterSine => "Quarter Sine",
            FadeShape::HalfSine => "Half Sine",
            FadeShape::Quadratic => "Quadratic",
            FadeShape::InvertedParabola => "Inverted Parabola",
            FadeShape::ExponentialSine => "Exponential Sine",
        }
    }

    /// Get all available fade shapes
    ///
    /// Useful for configuration validation and UI selection lists
    pub fn all_variants() -> &'static [FadeShape] {
        &[
            FadeShape::Triangle,
            FadeShape::QuarterSine,
            FadeShape::HalfSine,
            FadeShape::Quadratic,
            FadeShape::InvertedParabola,
            FadeShape::ExponentialSine,
        ]
    }
}

impl std::fmt::Display for FadeShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
