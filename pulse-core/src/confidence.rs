//! Confidence scoring for a snapshot pair
//!
//! Four independent factors are read off the pair:
//! - Absolute Tor node change
//! - Relative (percentage) Tor node change
//! - Size of the network in the current snapshot
//! - Health of the current active ratio
//!
//! Each factor lands in a high, medium or low tier; the tier counts
//! decide the aggregate confidence level.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    NodeSnapshot, HEALTHY_ACTIVE_RATIO, LARGE_NETWORK, LARGE_PERCENTAGE_CHANGE, LARGE_TOR_CHANGE,
    MEDIUM_NETWORK, MEDIUM_PERCENTAGE_CHANGE, MEDIUM_TOR_CHANGE, MODERATE_ACTIVE_RATIO,
};

/// Aggregate confidence, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::High => "HIGH",
        })
    }
}

/// Tier a single factor contributes to the aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorTier {
    High,
    Medium,
    Low,
}

/// Three-way size classification shared by the magnitude factors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magnitude {
    Large,
    Medium,
    Small,
}

impl Magnitude {
    /// Strict thresholds: `value > large` is Large, `value > medium` is Medium
    fn grade<T: PartialOrd>(value: T, large: T, medium: T) -> Self {
        if value > large {
            Magnitude::Large
        } else if value > medium {
            Magnitude::Medium
        } else {
            Magnitude::Small
        }
    }
}

/// Active-ratio health classification (inclusive bands)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioHealth {
    Healthy,
    Moderate,
    Poor,
}

impl RatioHealth {
    fn grade(ratio: f64) -> Self {
        let within = |(low, high): (f64, f64)| low <= ratio && ratio <= high;
        if within(HEALTHY_ACTIVE_RATIO) {
            RatioHealth::Healthy
        } else if within(MODERATE_ACTIVE_RATIO) {
            RatioHealth::Moderate
        } else {
            RatioHealth::Poor
        }
    }
}

/// Individual factor tag as reported alongside a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceFactor {
    LargeTorChange,
    MediumTorChange,
    SmallTorChange,
    LargePercentageChange,
    MediumPercentageChange,
    SmallPercentageChange,
    LargeNetwork,
    MediumNetwork,
    SmallNetwork,
    HealthyActiveRatio,
    ModerateActiveRatio,
    PoorActiveRatio,
}

impl ConfidenceFactor {
    pub fn tier(self) -> FactorTier {
        use ConfidenceFactor::*;
        match self {
            LargeTorChange | LargePercentageChange | LargeNetwork | HealthyActiveRatio => FactorTier::High,
            MediumTorChange | MediumPercentageChange | MediumNetwork | ModerateActiveRatio => FactorTier::Medium,
            SmallTorChange | SmallPercentageChange | SmallNetwork | PoorActiveRatio => FactorTier::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        use ConfidenceFactor::*;
        match self {
            LargeTorChange => "LARGE_TOR_CHANGE",
            MediumTorChange => "MEDIUM_TOR_CHANGE",
            SmallTorChange => "SMALL_TOR_CHANGE",
            LargePercentageChange => "LARGE_PERCENTAGE_CHANGE",
            MediumPercentageChange => "MEDIUM_PERCENTAGE_CHANGE",
            SmallPercentageChange => "SMALL_PERCENTAGE_CHANGE",
            LargeNetwork => "LARGE_NETWORK",
            MediumNetwork => "MEDIUM_NETWORK",
            SmallNetwork => "SMALL_NETWORK",
            HealthyActiveRatio => "HEALTHY_ACTIVE_RATIO",
            ModerateActiveRatio => "MODERATE_ACTIVE_RATIO",
            PoorActiveRatio => "POOR_ACTIVE_RATIO",
        }
    }
}

impl fmt::Display for ConfidenceFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed Tor node movement between two snapshots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorDelta {
    pub tor_change: i64,
    /// Change relative to the previous Tor count, in percent (0 if that count was 0)
    pub percentage_change: f64,
}

impl TorDelta {
    pub fn between(previous: &NodeSnapshot, current: &NodeSnapshot) -> Self {
        let tor_change = current.tor_nodes() as i64 - previous.tor_nodes() as i64;
        let percentage_change = if previous.tor_nodes() > 0 {
            tor_change as f64 / previous.tor_nodes() as f64 * 100.0
        } else {
            0.0
        };

        Self {
            tor_change,
            percentage_change,
        }
    }
}

/// The four graded factors for a snapshot pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceFactors {
    pub tor_change: Magnitude,
    pub percentage_change: Magnitude,
    pub network_size: Magnitude,
    pub active_ratio: RatioHealth,
}

impl ConfidenceFactors {
    pub fn grade(delta: &TorDelta, current: &NodeSnapshot) -> Self {
        Self {
            tor_change: Magnitude::grade(delta.tor_change.abs(), LARGE_TOR_CHANGE, MEDIUM_TOR_CHANGE),
            percentage_change: Magnitude::grade(
                delta.percentage_change.abs(),
                LARGE_PERCENTAGE_CHANGE,
                MEDIUM_PERCENTAGE_CHANGE,
            ),
            network_size: Magnitude::grade(current.total_nodes(), LARGE_NETWORK, MEDIUM_NETWORK),
            active_ratio: RatioHealth::grade(current.active_ratio()),
        }
    }

    /// Factor tags in reporting order: Tor change, percentage, network, active ratio
    pub fn tags(&self) -> [ConfidenceFactor; 4] {
        use ConfidenceFactor::*;
        [
            match self.tor_change {
                Magnitude::Large => LargeTorChange,
                Magnitude::Medium => MediumTorChange,
                Magnitude::Small => SmallTorChange,
            },
            match self.percentage_change {
                Magnitude::Large => LargePercentageChange,
                Magnitude::Medium => MediumPercentageChange,
                Magnitude::Small => SmallPercentageChange,
            },
            match self.network_size {
                Magnitude::Large => LargeNetwork,
                Magnitude::Medium => MediumNetwork,
                Magnitude::Small => SmallNetwork,
            },
            match self.active_ratio {
                RatioHealth::Healthy => HealthyActiveRatio,
                RatioHealth::Moderate => ModerateActiveRatio,
                RatioHealth::Poor => PoorActiveRatio,
            },
        ]
    }

    /// High if three or more factors are high tier; medium if three or
    /// more are high or medium tier; low otherwise.
    pub fn level(&self) -> ConfidenceLevel {
        let tags = self.tags();
        let high = tags.iter().filter(|t| t.tier() == FactorTier::High).count();
        let medium = tags.iter().filter(|t| t.tier() == FactorTier::Medium).count();

        if high >= 3 {
            ConfidenceLevel::High
        } else if high + medium >= 3 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Everything the signal rules need from a snapshot pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub delta: TorDelta,
    pub factors: ConfidenceFactors,
    pub confidence: ConfidenceLevel,
}

/// Grade a (previous, current) pair
pub fn assess(previous: &NodeSnapshot, current: &NodeSnapshot) -> Assessment {
    let delta = TorDelta::between(previous, current);
    let factors = ConfidenceFactors::grade(&delta, current);

    Assessment {
        delta,
        factors,
        confidence: factors.level(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(total: u64, active: u64, tor: u64) -> NodeSnapshot {
        NodeSnapshot::new(Utc::now(), total, active, tor)
    }

    #[test]
    fn test_large_move_on_medium_network_is_high() {
        let previous = snapshot(9_000, 7_200, 1_000);
        let current = snapshot(9_100, 7_280, 1_060);

        let assessment = assess(&previous, &current);
        assert_eq!(assessment.delta.tor_change, 60);
        assert!((assessment.delta.percentage_change - 6.0).abs() < 1e-9);
        assert_eq!(
            assessment.factors.tags(),
            [
                ConfidenceFactor::LargeTorChange,
                ConfidenceFactor::LargePercentageChange,
                ConfidenceFactor::MediumNetwork,
                ConfidenceFactor::HealthyActiveRatio,
            ]
        );
        assert_eq!(assessment.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_zero_previous_tor_gives_zero_percentage() {
        let previous = snapshot(9_000, 7_200, 0);
        let current = snapshot(9_000, 7_200, 40);

        let delta = TorDelta::between(&previous, &current);
        assert_eq!(delta.tor_change, 40);
        assert_eq!(delta.percentage_change, 0.0);
    }

    #[test]
    fn test_magnitude_thresholds_are_strict() {
        assert_eq!(Magnitude::grade(50, LARGE_TOR_CHANGE, MEDIUM_TOR_CHANGE), Magnitude::Medium);
        assert_eq!(Magnitude::grade(51, LARGE_TOR_CHANGE, MEDIUM_TOR_CHANGE), Magnitude::Large);
        assert_eq!(Magnitude::grade(25, LARGE_TOR_CHANGE, MEDIUM_TOR_CHANGE), Magnitude::Small);
        assert_eq!(Magnitude::grade(5.0, LARGE_PERCENTAGE_CHANGE, MEDIUM_PERCENTAGE_CHANGE), Magnitude::Medium);
        assert_eq!(Magnitude::grade(2.5, LARGE_PERCENTAGE_CHANGE, MEDIUM_PERCENTAGE_CHANGE), Magnitude::Small);
        assert_eq!(Magnitude::grade(10_000, LARGE_NETWORK, MEDIUM_NETWORK), Magnitude::Medium);
        assert_eq!(Magnitude::grade(10_001, LARGE_NETWORK, MEDIUM_NETWORK), Magnitude::Large);
        assert_eq!(Magnitude::grade(8_000, LARGE_NETWORK, MEDIUM_NETWORK), Magnitude::Small);
    }

    #[test]
    fn test_ratio_bands_are_inclusive() {
        assert_eq!(RatioHealth::grade(0.7), RatioHealth::Healthy);
        assert_eq!(RatioHealth::grade(0.9), RatioHealth::Healthy);
        assert_eq!(RatioHealth::grade(0.6), RatioHealth::Moderate);
        assert_eq!(RatioHealth::grade(0.95), RatioHealth::Moderate);
        assert_eq!(RatioHealth::grade(0.65), RatioHealth::Moderate);
        assert_eq!(RatioHealth::grade(0.59), RatioHealth::Poor);
        assert_eq!(RatioHealth::grade(0.96), RatioHealth::Poor);
        assert_eq!(RatioHealth::grade(0.0), RatioHealth::Poor);
    }

    #[test]
    fn test_aggregate_levels() {
        let factors = ConfidenceFactors {
            tor_change: Magnitude::Medium,
            percentage_change: Magnitude::Medium,
            network_size: Magnitude::Large,
            active_ratio: RatioHealth::Poor,
        };
        assert_eq!(factors.level(), ConfidenceLevel::Medium);

        let factors = ConfidenceFactors {
            active_ratio: RatioHealth::Healthy,
            tor_change: Magnitude::Large,
            ..factors
        };
        assert_eq!(factors.level(), ConfidenceLevel::High);

        let factors = ConfidenceFactors {
            tor_change: Magnitude::Small,
            percentage_change: Magnitude::Small,
            network_size: Magnitude::Large,
            active_ratio: RatioHealth::Healthy,
        };
        assert_eq!(factors.level(), ConfidenceLevel::Low);
    }

    #[test]
    fn test_confidence_monotonic_in_tor_change() {
        let previous = snapshot(9_500, 7_600, 1_000);
        let mut last = ConfidenceLevel::Low;

        for tor in 1_000..=1_200 {
            let current = snapshot(9_500, 7_600, tor);
            let level = assess(&previous, &current).confidence;
            assert!(level >= last, "confidence dropped at tor={}", tor);
            last = level;
        }

        let mut last = ConfidenceLevel::Low;
        for tor in (800..=1_000).rev() {
            let current = snapshot(9_500, 7_600, tor);
            let level = assess(&previous, &current).confidence;
            assert!(level >= last, "confidence dropped at tor={}", tor);
            last = level;
        }
    }

    #[test]
    fn test_factor_tags_serialize_screaming() {
        let json = serde_json::to_string(&ConfidenceFactor::ModerateActiveRatio).unwrap();
        assert_eq!(json, "\"MODERATE_ACTIVE_RATIO\"");
        assert_eq!(serde_json::to_string(&ConfidenceLevel::High).unwrap(), "\"HIGH\"");
    }
}
