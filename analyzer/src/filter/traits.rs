use goniolab_common::frame::Frame;
use serde::Serialize;

use super::saturation::SaturationVerdict;

/// Scoring interface for captured frames.
///
/// Implementations gate on saturation first and only score frames that
/// are not clipped, so a saturated frame never carries a score.
pub trait FrameFilter: Send + Sync {
    fn evaluate(&self, frame: &Frame) -> Measurement;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Result of evaluating one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Measurement {
    /// Overexposed; no intensity is reported.
    Saturated { verdict: SaturationVerdict },
    Scored {
        score: f64,
        verdict: SaturationVerdict,
    },
}

impl Measurement {
    /// Run `score` only when the verdict allows it.
    pub fn gate(verdict: SaturationVerdict, score: impl FnOnce() -> f64) -> Self {
        if verdict.saturated {
            Measurement::Saturated { verdict }
        } else {
            Measurement::Scored {
                score: score(),
                verdict,
            }
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Measurement::Scored { score, .. } => Some(*score),
            Measurement::Saturated { .. } => None,
        }
    }

    pub fn is_saturated(&self) -> bool {
        matches!(self, Measurement::Saturated { .. })
    }

    pub fn verdict(&self) -> &SaturationVerdict {
        match self {
            Measurement::Saturated { verdict } | Measurement::Scored { verdict, .. } => verdict,
        }
    }
}
