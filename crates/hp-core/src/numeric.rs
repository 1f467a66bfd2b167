//! Grid and rounding helpers for operating-point sweeps.

use crate::{HpError, HpResult};

/// Round half away from zero to `decimals` places.
pub fn round_to(v: f64, decimals: u32) -> f64 {
    let scale = 10_f64.powi(decimals as i32);
    (v * scale).round() / scale
}

/// `count` evenly spaced points from `start` to `end`, both ends included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count < 2 {
        return vec![start; count];
    }
    let last = count - 1;
    let delta = (end - start) / last as f64;
    (0..count)
        .map(|i| if i == last { end } else { start + i as f64 * delta })
        .collect()
}

/// `start, start + step, ...` up to `end`, with `end` always the last point.
///
/// A span that is not a multiple of `step` gets a shorter final interval.
pub fn arange_inclusive(start: f64, end: f64, step: f64) -> HpResult<Vec<f64>> {
    if !step.is_finite() || step <= 0.0 {
        return Err(HpError::invalid(format!("grid step {step} is not a positive number")));
    }
    if end < start {
        return Err(HpError::invalid(format!("grid runs backwards: {start} to {end}")));
    }
    let whole_steps = ((end - start) / step + 1e-9).floor() as usize;
    let mut points: Vec<f64> = (0..=whole_steps).map(|i| start + i as f64 * step).collect();
    match points.last_mut() {
        Some(tail) if (end - *tail).abs() <= 1e-9 * step => *tail = end,
        _ => points.push(end),
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rounds_to_three_places() {
        assert_eq!(round_to(4.56789, 3), 4.568);
        assert_eq!(round_to(2.0 / 3.0, 3), 0.667);
    }

    #[test]
    fn linspace_hits_both_ends() {
        let pts = linspace(0.5, 1.0, 6);
        assert_eq!(pts.len(), 6);
        assert_eq!((pts[0], pts[5]), (0.5, 1.0));
        assert!(linspace(3.0, 4.0, 0).is_empty());
        assert_eq!(linspace(3.0, 4.0, 1), [3.0]);
    }

    #[test]
    fn arange_closes_a_ragged_span() {
        assert_eq!(arange_inclusive(60.0, 63.0, 1.0).unwrap(), [60.0, 61.0, 62.0, 63.0]);
        let ragged = arange_inclusive(0.5, 0.75, 0.1).unwrap();
        assert_eq!(ragged.len(), 4);
        assert_eq!(ragged[3], 0.75);
    }

    #[test]
    fn arange_rejects_bad_input() {
        assert!(arange_inclusive(2.0, 1.0, 0.5).is_err());
        assert!(arange_inclusive(0.0, 1.0, 0.0).is_err());
        assert!(arange_inclusive(0.0, 1.0, f64::NAN).is_err());
    }

    proptest! {
        #[test]
        fn arange_is_increasing_and_bounded(
            start in -50.0_f64..50.0,
            span in 0.0_f64..40.0,
            step in 0.05_f64..5.0,
        ) {
            let end = start + span;
            let pts = arange_inclusive(start, end, step).unwrap();
            prop_assert_eq!(pts[0], start);
            prop_assert_eq!(*pts.last().unwrap(), end);
            prop_assert!(pts.windows(2).all(|w| w[1] > w[0]));
        }
    }
}
