//! Confidence scoring for qualified patterns

use crate::config::ScoringMode;

/// Occurrences at which frequency alone reaches full confidence
const SATURATION_OCCURRENCES: f64 = 10.0;

const FREQUENCY_WEIGHT: f64 = 0.6;
const CONSISTENCY_WEIGHT: f64 = 0.4;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `min(occurrences / 10, 1)`, before rounding
fn frequency_score(occurrences: u32) -> f64 {
    (f64::from(occurrences) / SATURATION_OCCURRENCES).min(1.0)
}

/// Frequency-only confidence, rounded to two decimals
pub fn frequency_confidence(occurrences: u32) -> f64 {
    round2(frequency_score(occurrences))
}

/// `max(0, 1 - stddev / mean)` over the occurrence spans
///
/// Fewer than two spans carry no timing signal and score as fully consistent.
pub fn timing_consistency(spans_ms: &[i64]) -> f64 {
    if spans_ms.len() < 2 {
        return 1.0;
    }

    let n = spans_ms.len() as f64;
    let mean = spans_ms.iter().map(|&s| s as f64).sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }

    let variance = spans_ms
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
}

/// `0.6 * frequency + 0.4 * consistency`, rounded to two decimals
pub fn blended_confidence(occurrences: u32, consistency: f64) -> f64 {
    let consistency = consistency.clamp(0.0, 1.0);
    round2(FREQUENCY_WEIGHT * frequency_score(occurrences) + CONSISTENCY_WEIGHT * consistency)
}

pub fn score(mode: ScoringMode, occurrences: u32, spans_ms: &[i64]) -> f64 {
    match mode {
        ScoringMode::Frequency => frequency_confidence(occurrences),
        ScoringMode::Blended => blended_confidence(occurrences, timing_consistency(spans_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_endpoints() {
        assert_eq!(frequency_confidence(0), 0.0);
        assert_eq!(frequency_confidence(3), 0.3);
        assert_eq!(frequency_confidence(10), 1.0);
        assert_eq!(frequency_confidence(250), 1.0);
    }

    #[test]
    fn test_frequency_is_monotonic() {
        for n in 0..50 {
            assert!(frequency_confidence(n + 1) >= frequency_confidence(n));
        }
    }

    #[test]
    fn test_blended_is_monotonic_for_fixed_consistency() {
        for consistency in [0.0, 0.35, 1.0] {
            for n in 0..30 {
                assert!(blended_confidence(n + 1, consistency) >= blended_confidence(n, consistency));
            }
        }
        assert_eq!(blended_confidence(10, 1.0), 1.0);
        assert_eq!(blended_confidence(0, 0.0), 0.0);
    }

    #[test]
    fn test_timing_consistency() {
        assert_eq!(timing_consistency(&[5_000, 5_000, 5_000]), 1.0);
        assert_eq!(timing_consistency(&[4_000]), 1.0);

        // mean 5000, stddev 4000
        let c = timing_consistency(&[1_000, 9_000]);
        assert!((c - 0.2).abs() < 1e-9);

        // stddev larger than mean clamps to zero
        assert_eq!(timing_consistency(&[1_000, 1_000, 1_000, 50_000]), 0.0);
    }

    #[test]
    fn test_score_dispatch() {
        assert_eq!(score(ScoringMode::Frequency, 3, &[1_000, 9_000]), 0.3);
        // 0.6 * 0.3 + 0.4 * 1.0
        assert_eq!(score(ScoringMode::Blended, 3, &[5_000, 5_000, 5_000]), 0.58);
    }
}
