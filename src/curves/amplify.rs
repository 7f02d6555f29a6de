// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Flattening a profile until it reaches a target number of full-load hours.

use super::{Curve, FRAMES};

const MAX_ITERATIONS: usize = 30;
const TOLERANCE: f64 = 1e-4;

/// Returns a unit profile (summing to 1.0) shaped like `curve`, but clipped so
/// that it has `target_full_load_hours`.
///
/// The curve is normalized by its peak and clipped at a threshold found by a
/// halving search of at most 30 iterations, stopping once the full-load hours
/// are within 1e-4 (relative) of the target.
///
/// Clipping can only add full-load hours.  A target up to one hour below the
/// curve's current full-load hours is reached by raising the peak hour
/// instead, and the curve is returned unchanged for lower targets.
pub fn amplify_curve(curve: &Curve, target_full_load_hours: f64) -> Curve {
    let current = curve.full_load_hours();
    if current <= 0.0 || target_full_load_hours < current - 1.0 {
        return curve.clone();
    }
    if target_full_load_hours >= FRAMES as f64 {
        return Curve::flat(1.0 / FRAMES as f64);
    }

    let normalized = curve.scale(1.0 / curve.max());
    if target_full_load_hours <= current {
        return raise_peak(normalized, target_full_load_hours).normalized_to(1.0);
    }
    let clipped_flh = |threshold: f64| -> f64 {
        normalized.iter().map(|v| v.min(threshold)).sum::<f64>() / threshold
    };

    // Full-load hours decrease as the threshold rises, so a threshold giving
    // too many hours moves the lower bound up.
    let (mut low, mut high) = (0.0, 1.0);
    let mut threshold = 1.0;
    for _ in 0..MAX_ITERATIONS {
        threshold = (low + high) / 2.0;
        let flh = clipped_flh(threshold);
        if ((flh - target_full_load_hours) / target_full_load_hours).abs() <= TOLERANCE {
            break;
        }
        if flh > target_full_load_hours {
            low = threshold;
        } else {
            high = threshold;
        }
    }

    normalized
        .map(|v| v.min(threshold).max(0.0))
        .normalized_to(1.0)
}

/// Raises the peak hour of a curve until it has `target` full-load hours.
fn raise_peak(mut curve: Curve, target: f64) -> Curve {
    if target <= 1.0 {
        return curve;
    }
    let peak_frame = curve
        .iter()
        .enumerate()
        .fold(0, |best, (frame, v)| if *v > curve[best] { frame } else { best });
    let peak = curve[peak_frame];
    // (sum + raise) / (peak + raise) == target
    let raise = ((curve.sum() - target * peak) / (target - 1.0)).max(0.0);
    curve.set(peak_frame, peak + raise);
    curve
}
