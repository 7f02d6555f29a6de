// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Weighted mixes of several profiles.

use super::Curve;

/// Shares are considered to sum to one when within this tolerance.
const SHARE_TOLERANCE: f64 = 1e-5;

/// Builds a single profile from a weighted mix of profiles.
pub struct AggregateCurve;

impl AggregateCurve {
    /// Sums the given profiles, each multiplied by its share.
    ///
    /// An empty mix gives a zero curve and a mix with a single entry returns
    /// that profile unchanged, whatever its share.  Otherwise, shares which do
    /// not sum to 1.0 are rebalanced proportionally before summing, and
    /// profiles with a non-positive share are skipped.
    pub fn build<'a>(mix: impl IntoIterator<Item = (&'a Curve, f64)>) -> Curve {
        let mix: Vec<(&Curve, f64)> = mix.into_iter().collect();

        match mix.as_slice() {
            [] => Curve::zeros(),
            [(curve, _)] => (*curve).clone(),
            _ => {
                let total: f64 = mix.iter().map(|(_, share)| *share).sum();
                let factor = if (total - 1.0).abs() > SHARE_TOLERANCE && total > 0.0 {
                    tracing::debug!("Rebalancing curve mix with shares summing to {}.", total);
                    1.0 / total
                } else {
                    1.0
                };

                let mut result = Curve::zeros();
                for (curve, share) in mix {
                    if share <= 0.0 {
                        continue;
                    }
                    result.add_assign(&curve.scale(share * factor));
                }
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::FRAMES;

    fn assert_close(lhs: &Curve, rhs: &Curve) {
        for frame in 0..FRAMES {
            assert!(
                (lhs[frame] - rhs[frame]).abs() < 1e-5,
                "frame {}: {} != {}",
                frame,
                lhs[frame],
                rhs[frame]
            );
        }
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(
            AggregateCurve::build(Vec::<(&Curve, f64)>::new()),
            Curve::zeros()
        );

        let curve = Curve::from_fn(|f| (f % 7) as f64);
        assert_eq!(AggregateCurve::build([(&curve, 1.0)]), curve);
        assert_eq!(AggregateCurve::build([(&curve, 0.3)]), curve);
    }

    #[test]
    fn test_weighted_sum() {
        let one = Curve::flat(1.0);
        let two = Curve::from_fn(|f| if f < 100 { 2.0 } else { 0.0 });

        let mixed = AggregateCurve::build([(&one, 0.25), (&two, 0.75)]);
        assert_eq!(mixed.len(), FRAMES);
        assert_close(
            &mixed,
            &Curve::from_fn(|f| if f < 100 { 1.75 } else { 0.25 }),
        );
    }

    #[test]
    fn test_rebalance() {
        let one = Curve::from_fn(|f| (f % 24) as f64);
        let two = Curve::from_fn(|f| (f % 168) as f64 / 10.0);

        let halved = AggregateCurve::build([(&one, 0.2), (&two, 0.3)]);
        let whole = AggregateCurve::build([(&one, 0.4), (&two, 0.6)]);
        assert_close(&halved, &whole);
    }

    #[test]
    fn test_non_positive_shares_skipped() {
        let one = Curve::flat(1.0);
        let two = Curve::flat(100.0);

        let mixed = AggregateCurve::build([(&one, 1.0), (&two, 0.0)]);
        assert_close(&mixed, &one);

        let mixed = AggregateCurve::build([(&one, 1.5), (&two, -0.5)]);
        assert_close(&mixed, &Curve::flat(1.5));
    }
}
