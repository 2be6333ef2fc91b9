//! Advisory signals derived from the snapshot window
//!
//! Rising Tor participation is read as bearish and falling participation
//! as bullish. Rules are checked top to bottom and the first match wins:
//!
//! | # | condition                                               | signal      |
//! |---|---------------------------------------------------------|-------------|
//! | 1 | change > 50, pct > 5, confidence HIGH                   | STRONG SELL |
//! | 2 | change < -50, pct < -5, confidence HIGH                 | STRONG BUY  |
//! | 3 | change > 25, pct > 2.5, confidence MEDIUM or HIGH       | SELL        |
//! | 4 | change < -25, pct < -2.5, confidence MEDIUM or HIGH     | BUY         |
//! | 5 | change > 10                                             | SLIGHT SELL |
//! | 6 | change < -10                                            | SLIGHT BUY  |
//! | 7 | otherwise                                               | HOLD        |

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::{
    assess, Assessment, ConfidenceFactor, ConfidenceLevel, SnapshotWindow, GROWTH, LARGE_PERCENTAGE_CHANGE,
    LARGE_TOR_CHANGE, MEDIUM_PERCENTAGE_CHANGE, MEDIUM_TOR_CHANGE, SLIGHT_TOR_CHANGE, STRONG_GROWTH,
};

/// Discrete advisory signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradingSignal {
    #[serde(rename = "INSUFFICIENT_DATA")]
    InsufficientData,
    #[serde(rename = "STRONG SELL")]
    StrongSell,
    #[serde(rename = "STRONG BUY")]
    StrongBuy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SLIGHT SELL")]
    SlightSell,
    #[serde(rename = "SLIGHT BUY")]
    SlightBuy,
    #[serde(rename = "HOLD")]
    Hold,
}

impl TradingSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            TradingSignal::InsufficientData => "INSUFFICIENT_DATA",
            TradingSignal::StrongSell => "STRONG SELL",
            TradingSignal::StrongBuy => "STRONG BUY",
            TradingSignal::Sell => "SELL",
            TradingSignal::Buy => "BUY",
            TradingSignal::SlightSell => "SLIGHT SELL",
            TradingSignal::SlightBuy => "SLIGHT BUY",
            TradingSignal::Hold => "HOLD",
        }
    }

    /// Bias label paired with each signal
    pub fn bias(self) -> Bias {
        match self {
            TradingSignal::InsufficientData => Bias::NeedMoreData,
            TradingSignal::StrongSell => Bias::HighlyBearish,
            TradingSignal::StrongBuy => Bias::HighlyBullish,
            TradingSignal::Sell => Bias::Bearish,
            TradingSignal::Buy => Bias::Bullish,
            TradingSignal::SlightSell => Bias::SlightlyBearish,
            TradingSignal::SlightBuy => Bias::SlightlyBullish,
            TradingSignal::Hold => Bias::Neutral,
        }
    }
}

impl fmt::Display for TradingSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative market bias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bias {
    #[serde(rename = "NEED MORE DATA")]
    NeedMoreData,
    #[serde(rename = "HIGHLY BEARISH")]
    HighlyBearish,
    #[serde(rename = "HIGHLY BULLISH")]
    HighlyBullish,
    #[serde(rename = "BEARISH")]
    Bearish,
    #[serde(rename = "BULLISH")]
    Bullish,
    #[serde(rename = "SLIGHTLY BEARISH")]
    SlightlyBearish,
    #[serde(rename = "SLIGHTLY BULLISH")]
    SlightlyBullish,
    #[serde(rename = "NEUTRAL")]
    Neutral,
}

impl Bias {
    pub fn as_str(self) -> &'static str {
        match self {
            Bias::NeedMoreData => "NEED MORE DATA",
            Bias::HighlyBearish => "HIGHLY BEARISH",
            Bias::HighlyBullish => "HIGHLY BULLISH",
            Bias::Bearish => "BEARISH",
            Bias::Bullish => "BULLISH",
            Bias::SlightlyBearish => "SLIGHTLY BEARISH",
            Bias::SlightlyBullish => "SLIGHTLY BULLISH",
            Bias::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tor-driven signal with its confidence and rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub signal: TradingSignal,
    pub bias: Bias,
    pub reasoning: String,
    pub tor_change: i64,
    pub percentage_change: f64,
    pub confidence: ConfidenceLevel,
    /// Empty when there is not enough data to grade
    pub confidence_factors: Vec<ConfidenceFactor>,
    pub current_tor: u64,
    pub previous_tor: u64,
    pub total_nodes: u64,
    pub active_ratio: f64,
}

impl SignalResult {
    /// Evaluate the signal rules over the window
    pub fn evaluate(window: &SnapshotWindow) -> Self {
        let Some((previous, current)) = window.pair() else {
            return Self::insufficient(window);
        };

        let assessment = assess(previous, current);
        let signal = decide(&assessment);
        debug!(
            "Tor change {:+} ({:+.1}%), confidence {} -> {}",
            assessment.delta.tor_change, assessment.delta.percentage_change, assessment.confidence, signal
        );

        Self {
            signal,
            bias: signal.bias(),
            reasoning: reasoning(signal, &assessment),
            tor_change: assessment.delta.tor_change,
            percentage_change: assessment.delta.percentage_change,
            confidence: assessment.confidence,
            confidence_factors: assessment.factors.tags().to_vec(),
            current_tor: current.tor_nodes(),
            previous_tor: previous.tor_nodes(),
            total_nodes: current.total_nodes(),
            active_ratio: current.active_ratio(),
        }
    }

    fn insufficient(window: &SnapshotWindow) -> Self {
        Self {
            signal: TradingSignal::InsufficientData,
            bias: Bias::NeedMoreData,
            reasoning: "Need at least 2 data points for comparison".to_string(),
            tor_change: 0,
            percentage_change: 0.0,
            confidence: ConfidenceLevel::Low,
            confidence_factors: Vec::new(),
            current_tor: window.current().map_or(0, |s| s.tor_nodes()),
            previous_tor: window.previous().map_or(0, |s| s.tor_nodes()),
            total_nodes: window.current().map_or(0, |s| s.total_nodes()),
            active_ratio: window.current().map_or(0.0, |s| s.active_ratio()),
        }
    }
}

/// First matching rule wins
fn decide(assessment: &Assessment) -> TradingSignal {
    let change = assessment.delta.tor_change;
    let pct = assessment.delta.percentage_change;
    let high = assessment.confidence == ConfidenceLevel::High;
    let at_least_medium = assessment.confidence >= ConfidenceLevel::Medium;

    if change > LARGE_TOR_CHANGE && pct > LARGE_PERCENTAGE_CHANGE && high {
        TradingSignal::StrongSell
    } else if change < -LARGE_TOR_CHANGE && pct < -LARGE_PERCENTAGE_CHANGE && high {
        TradingSignal::StrongBuy
    } else if change > MEDIUM_TOR_CHANGE && pct > MEDIUM_PERCENTAGE_CHANGE && at_least_medium {
        TradingSignal::Sell
    } else if change < -MEDIUM_TOR_CHANGE && pct < -MEDIUM_PERCENTAGE_CHANGE && at_least_medium {
        TradingSignal::Buy
    } else if change > SLIGHT_TOR_CHANGE {
        TradingSignal::SlightSell
    } else if change < -SLIGHT_TOR_CHANGE {
        TradingSignal::SlightBuy
    } else {
        TradingSignal::Hold
    }
}

fn reasoning(signal: TradingSignal, assessment: &Assessment) -> String {
    let moved = format!(
        "{} nodes, {:+.1}%",
        signed_thousands(assessment.delta.tor_change),
        assessment.delta.percentage_change
    );

    match signal {
        TradingSignal::StrongSell => format!("Large Tor increase ({}) with high confidence factors", moved),
        TradingSignal::StrongBuy => format!("Large Tor decrease ({}) with high confidence factors", moved),
        TradingSignal::Sell => format!(
            "Moderate Tor increase ({}) with {} confidence",
            moved,
            assessment.confidence.to_string().to_lowercase()
        ),
        TradingSignal::Buy => format!(
            "Moderate Tor decrease ({}) with {} confidence",
            moved,
            assessment.confidence.to_string().to_lowercase()
        ),
        TradingSignal::SlightSell => format!("Small Tor increase ({}) - low confidence signal", moved),
        TradingSignal::SlightBuy => format!("Small Tor decrease ({}) - low confidence signal", moved),
        TradingSignal::Hold => format!("Minimal Tor change ({}) - no clear signal", moved),
        TradingSignal::InsufficientData => "Need at least 2 data points for comparison".to_string(),
    }
}

/// Format with an explicit sign and comma grouping, e.g. `+1,060`
pub fn signed_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    grouped.push(if value < 0 { '-' } else { '+' });

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

/// Health label for total network growth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkTrend {
    #[serde(rename = "INSUFFICIENT_DATA")]
    InsufficientData,
    #[serde(rename = "NETWORK STRONG GROWTH")]
    StrongGrowth,
    #[serde(rename = "NETWORK GROWING")]
    Growing,
    #[serde(rename = "NETWORK STABLE")]
    Stable,
    #[serde(rename = "NETWORK SHRINKING")]
    Shrinking,
}

impl NetworkTrend {
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkTrend::InsufficientData => "INSUFFICIENT_DATA",
            NetworkTrend::StrongGrowth => "NETWORK STRONG GROWTH",
            NetworkTrend::Growing => "NETWORK GROWING",
            NetworkTrend::Stable => "NETWORK STABLE",
            NetworkTrend::Shrinking => "NETWORK SHRINKING",
        }
    }

    /// Zero change falls through to `Shrinking`; there is no stable-at-zero band.
    fn from_change(total_change: i64) -> Self {
        if total_change > STRONG_GROWTH {
            NetworkTrend::StrongGrowth
        } else if total_change > GROWTH {
            NetworkTrend::Growing
        } else if total_change > 0 {
            NetworkTrend::Stable
        } else {
            NetworkTrend::Shrinking
        }
    }
}

impl fmt::Display for NetworkTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Growth signal from total node counts alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSignal {
    pub total_change: i64,
    pub network_signal: NetworkTrend,
    pub current_total: u64,
    pub previous_total: u64,
}

impl NetworkSignal {
    pub fn evaluate(window: &SnapshotWindow) -> Self {
        let Some((previous, current)) = window.pair() else {
            return Self {
                total_change: 0,
                network_signal: NetworkTrend::InsufficientData,
                current_total: window.current().map_or(0, |s| s.total_nodes()),
                previous_total: window.previous().map_or(0, |s| s.total_nodes()),
            };
        };

        let total_change = current.total_nodes() as i64 - previous.total_nodes() as i64;
        Self {
            total_change,
            network_signal: NetworkTrend::from_change(total_change),
            current_total: current.total_nodes(),
            previous_total: previous.total_nodes(),
        }
    }
}
