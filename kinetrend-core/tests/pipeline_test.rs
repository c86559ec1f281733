//! End-to-end pipeline on the noisy periodic fixture.
//!
//! 300 points of `sin(t)` over ten quarter periods with noise scale 0.5:
//! - KCA position tracks the noiseless signal
//! - Trend labels drive the engine without breaking position discipline
//! - The spectral reconstruction agrees with the KCA position
//! - Exposure is lagged and bounded

use kinetrend_core::kca::{KineticConfig, KineticEstimator};
use kinetrend_core::signals::{SignalPositionEngine, TrendClassifier};
use kinetrend_core::spectral::{select, Termination};
use kinetrend_core::stats::correlation;
use kinetrend_core::synthetic::periodic;
use kinetrend_core::{PositionState, Series, Signal};

fn fixture() -> (Series, Vec<f64>) {
    let data = periodic(10, 300, 0.5, 0);
    let series = Series::new(data.t, data.observed).unwrap();
    (series, data.signal)
}

#[test]
fn kca_position_tracks_noiseless_signal() {
    let (series, signal) = fixture();
    let fit = KineticEstimator::new(KineticConfig::new(0.001))
        .fit(&series)
        .unwrap();
    let corr = correlation(&fit.positions(), &signal);
    assert!(corr > 0.9, "correlation {corr}");

    let raw = correlation(series.values(), &signal);
    assert!(corr > raw, "smoothing should beat the raw series ({corr} vs {raw})");
}

#[test]
fn trends_drive_a_disciplined_track() {
    let (series, _) = fixture();
    let fit = KineticEstimator::new(KineticConfig::new(0.001))
        .fit(&series)
        .unwrap();
    let trends = fit.trends(&TrendClassifier::default());
    assert_eq!(trends.len(), 300);

    let track = SignalPositionEngine::new(5).unwrap().run(&trends).unwrap();
    assert!(track.validate().is_ok());
    assert_eq!(track.decisions.len(), 295);
    assert!(track.trade_count() >= 2, "trades {}", track.trade_count());

    // Issued signals alternate open / close.
    let issued: Vec<_> = track.issued().collect();
    for pair in issued.windows(2) {
        assert_ne!(pair[0].position, pair[1].position);
    }
    assert_eq!(issued[0].position, PositionState::Held);

    // Every issued signal agrees with the label that confirmed it.
    for d in &issued {
        let label = d.confirmed.unwrap();
        assert_eq!(label.signal(), d.signal);
        assert!(trends[d.index - 5..d.index].iter().all(|t| *t == Some(label)));
    }
}

#[test]
fn exposure_is_lagged_and_bounded() {
    let (series, _) = fixture();
    let fit = KineticEstimator::new(KineticConfig::new(0.001))
        .fit(&series)
        .unwrap();
    let track = SignalPositionEngine::new(5)
        .unwrap()
        .run(&fit.trends(&TrendClassifier::default()))
        .unwrap();
    let exposure = track.exposure();
    let positions = track.positions();
    let signals = track.signals();

    assert_eq!(exposure.len(), 300);
    assert!(exposure[..=5].iter().all(|e| *e == 0.0));
    for t in 1..300 {
        assert!([-1.0, 0.0, 1.0].contains(&exposure[t]));
        let flat_before = positions[t - 1] == PositionState::Flat;
        assert_eq!(flat_before, exposure[t] == 0.0, "step {t}");
        if signals[t - 1] == Signal::Buy && positions[t - 1] == PositionState::Held {
            assert_eq!(exposure[t], 1.0);
        }
    }
}

#[test]
fn spectral_reconstruction_agrees_with_kca() {
    let (series, signal) = fixture();
    let spectral = select(series.values(), Some(0.05)).unwrap();
    assert_ne!(spectral.termination, Termination::Exhausted);
    assert!(correlation(&spectral.series, &signal) > 0.9);

    let fit = KineticEstimator::new(KineticConfig::new(0.001))
        .fit(&series)
        .unwrap();
    let agreement = correlation(&spectral.series, &fit.positions());
    assert!(agreement > 0.85, "agreement {agreement}");
}
