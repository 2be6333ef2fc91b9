//! Plain-text rendering of an analysis

use std::fmt::Write;

use pulse_core::{signed_thousands, ConfidenceLevel, TradingSignal};
use pulse_runtime::{Analysis, RefreshReport};

fn thousands(value: u64) -> String {
    signed_thousands(value as i64).trim_start_matches('+').to_string()
}

fn confidence_badge(level: ConfidenceLevel) -> &'static str {
    match level {
        ConfidenceLevel::High => "🟢",
        ConfidenceLevel::Medium => "🟡",
        ConfidenceLevel::Low => "🔴",
    }
}

pub fn render_refresh(report: &RefreshReport) -> String {
    match (&report.error, report.updated) {
        (None, true) => "✅ Node data updated successfully".to_string(),
        (Some(e), true) => format!("⚠️  Node data updated but not saved: {}", e),
        (Some(e), false) => format!("❌ Failed to update node data: {}", e),
        (None, false) => "❌ Failed to update node data".to_string(),
    }
}

pub fn render_analysis(analysis: &Analysis) -> String {
    let signal = &analysis.signal;
    let network = &analysis.network;
    let mut out = String::new();

    let _ = writeln!(out, "🎯 SIGNAL: {} ({})", signal.signal, signal.bias);
    let _ = writeln!(
        out,
        "{} CONFIDENCE LEVEL: {}",
        confidence_badge(signal.confidence),
        signal.confidence
    );
    let _ = writeln!(out, "📝 {}", signal.reasoning);

    if signal.signal == TradingSignal::InsufficientData {
        let _ = writeln!(out, "\n🔄 Update node data to see comparison (current → previous)");
    } else {
        let factors: Vec<_> = signal.confidence_factors.iter().map(|f| f.as_str()).collect();
        let _ = writeln!(out, "   Factors: {}", factors.join(", "));
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "🧅 Tor nodes:    {} → {} ({} nodes, {:+.1}%)",
            thousands(signal.previous_tor),
            thousands(signal.current_tor),
            signed_thousands(signal.tor_change),
            signal.percentage_change
        );
        let _ = writeln!(
            out,
            "🌐 Total nodes:  {} → {} ({} nodes) {}",
            thousands(network.previous_total),
            thousands(network.current_total),
            signed_thousands(network.total_change),
            network.network_signal
        );
        let _ = writeln!(out, "📊 Active ratio: {:.3}", signal.active_ratio);
    }

    if let Some(current) = analysis.window.current() {
        let _ = writeln!(
            out,
            "🕒 Current data from: {}",
            current.timestamp().format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    if let Some(updated) = analysis.last_updated {
        let _ = writeln!(out, "💾 Last updated: {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    out
}
