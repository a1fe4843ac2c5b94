//! Fade curves for crossfade envelopes
//!
//! Positions are normalised: 0.0 is the start of the ramp, 1.0 its end.
//! Fade-out is always the mirror of fade-in so a pair sums sensibly.

use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MixlineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeCurve {
    /// v(t) = t
    #[default]
    Linear,
    /// v(t) = sin(t * pi/2), constant perceived loudness across the join
    #[serde(alias = "equal_power")]
    EqualPower,
    /// v(t) = 0.5 * (1 - cos(pi * t))
    #[serde(alias = "s_curve")]
    SCurve,
}

impl FadeCurve {
    /// Gain for the incoming side, 0.0 to 1.0
    pub fn fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
        }
    }

    /// Gain for the outgoing side, 1.0 to 0.0
    pub fn fade_out(&self, position: f32) -> f32 {
        self.fade_in(1.0 - position.clamp(0.0, 1.0))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::EqualPower => "equalpower",
            FadeCurve::SCurve => "scurve",
        }
    }
}

impl fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FadeCurve {
    type Err = MixlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "linear" => Ok(FadeCurve::Linear),
            "equalpower" => Ok(FadeCurve::EqualPower),
            "scurve" => Ok(FadeCurve::SCurve),
            other => Err(MixlineError::InvalidConfig {
                reason: format!("unknown fade curve '{}'", other),
            }),
        }
    }
}
