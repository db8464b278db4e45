//! Qualitative labels for the most recent session.

use crate::config::ClassifierThresholds;
use crate::error::{HrvError, Result};
use crate::metrics::mean;
use crate::session::HrvSessionResult;
use crate::store::SessionStore;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutonomicBalance {
    #[serde(rename = "Balanced")]
    Balanced,
    #[serde(rename = "Sympathetic Dominant")]
    SympatheticDominant,
    #[serde(rename = "Parasympathetic Dominant")]
    ParasympatheticDominant,
    #[serde(rename = "Undetermined")]
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressLevel {
    Normal,
    Elevated,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryStatus {
    Good,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

/// Today's RMSSD against the average of the preceding sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryTrend {
    #[serde(rename = "Well recovered")]
    WellRecovered,
    #[serde(rename = "Moderate recovery state")]
    Moderate,
    #[serde(rename = "Need more recovery")]
    NeedsMoreRecovery,
}

impl fmt::Display for AutonomicBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Balanced => "Balanced",
            Self::SympatheticDominant => "Sympathetic Dominant",
            Self::ParasympatheticDominant => "Parasympathetic Dominant",
            Self::Undetermined => "Undetermined",
        })
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "Normal",
            Self::Elevated => "Elevated",
            Self::Undetermined => "Undetermined",
        })
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Good => "Good",
            Self::NeedsImprovement => "Needs Improvement",
        })
    }
}

impl fmt::Display for RecoveryTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WellRecovered => "Well recovered",
            Self::Moderate => "Moderate recovery state",
            Self::NeedsMoreRecovery => "Need more recovery",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub baseline_rmssd: f64,
    pub sessions: usize,
    pub difference_ms: f64,
    pub trend: RecoveryTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvStatus {
    pub session_id: String,
    pub autonomic_balance: AutonomicBalance,
    pub stress_level: StressLevel,
    pub recovery_status: RecoveryStatus,
    pub baseline: Option<BaselineComparison>,
    pub recovery_score: Option<f64>,
}

pub fn autonomic_balance(lf_hf_ratio: Option<f64>, t: &ClassifierThresholds) -> AutonomicBalance {
    match lf_hf_ratio {
        Some(r) if r > t.balanced_high => AutonomicBalance::SympatheticDominant,
        Some(r) if r < t.balanced_low => AutonomicBalance::ParasympatheticDominant,
        Some(r) if r.is_finite() => AutonomicBalance::Balanced,
        _ => AutonomicBalance::Undetermined,
    }
}

pub fn stress_level(sd2_sd1_ratio: Option<f64>, t: &ClassifierThresholds) -> StressLevel {
    match sd2_sd1_ratio {
        Some(r) if r < t.stress_ratio => StressLevel::Normal,
        Some(r) if r.is_finite() => StressLevel::Elevated,
        _ => StressLevel::Undetermined,
    }
}

pub fn recovery_status(rmssd_ms: f64, t: &ClassifierThresholds) -> RecoveryStatus {
    if rmssd_ms > t.recovery_rmssd_ms {
        RecoveryStatus::Good
    } else {
        RecoveryStatus::NeedsImprovement
    }
}

/// Labels for a single session, without history.
pub fn classify(result: &HrvSessionResult, t: &ClassifierThresholds) -> HrvStatus {
    HrvStatus {
        session_id: result.session_id().to_owned(),
        autonomic_balance: autonomic_balance(result.lf_hf_ratio(), t),
        stress_level: stress_level(result.sd2_sd1_ratio(), t),
        recovery_status: recovery_status(result.time.rmssd, t),
        baseline: None,
        recovery_score: None,
    }
}

/// Classify the latest session of a log, adding the rolling-baseline
/// comparison and the log-relative recovery score.
pub fn classify_latest<S: SessionStore + ?Sized>(
    store: &S,
    t: &ClassifierThresholds,
) -> Result<HrvStatus> {
    let sessions = store.sessions();
    let (latest, earlier) = sessions.split_last().ok_or(HrvError::NoData)?;
    let mut status = classify(latest, t);
    status.baseline = baseline_comparison(latest, earlier, t);
    status.recovery_score = recovery_score(latest, sessions);
    Ok(status)
}

/// Compare against the mean RMSSD of up to `baseline_window` preceding sessions.
pub fn baseline_comparison(
    latest: &HrvSessionResult,
    earlier: &[HrvSessionResult],
    t: &ClassifierThresholds,
) -> Option<BaselineComparison> {
    let start = earlier.len().saturating_sub(t.baseline_window);
    let window: Vec<f64> = earlier[start..].iter().map(|r| r.time.rmssd).collect();
    let baseline_rmssd = mean(&window)?;
    let difference_ms = latest.time.rmssd - baseline_rmssd;
    let trend = if difference_ms > t.baseline_margin_ms {
        RecoveryTrend::WellRecovered
    } else if difference_ms < -t.baseline_margin_ms {
        RecoveryTrend::NeedsMoreRecovery
    } else {
        RecoveryTrend::Moderate
    };
    Some(BaselineComparison {
        baseline_rmssd,
        sessions: window.len(),
        difference_ms,
        trend,
    })
}

/// Weighted 0-100 score from SDNN, RMSSD and pNN50, each min-max scaled over
/// the log. `None` while any of them has no spread yet.
pub fn recovery_score(latest: &HrvSessionResult, log: &[HrvSessionResult]) -> Option<f64> {
    let scaled = |pick: fn(&HrvSessionResult) -> f64| -> Option<f64> {
        let values = log.iter().map(pick);
        let min = values.clone().fold(f64::INFINITY, f64::min);
        let max = values.fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if !(range > 0.0) {
            return None;
        }
        Some((pick(latest) - min) / range)
    };
    let sdnn = scaled(|r| r.time.sdnn)?;
    let rmssd = scaled(|r| r.time.rmssd)?;
    let pnn50 = scaled(|r| r.time.pnn50)?;
    let score = (0.5 * sdnn + 0.3 * rmssd + 0.2 * pnn50) * 100.0;
    Some((score * 100.0).round() / 100.0)
}
