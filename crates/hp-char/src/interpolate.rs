//! Multilinear interpolation of an operating map.

use hp_core::{arange_inclusive, round_to};
use hp_results::{CellValues, OperatingMap};

use crate::error::{CharError, CharResult};

/// Temperature spacing of the dense grid [K].
pub const T_STEP: f64 = 1.0;
/// Load fraction spacing of the dense grid.
pub const PL_STEP: f64 = 0.01;

/// Grid points closer than this count as hits.
const HIT_TOL: f64 = 1e-9;
const AXIS_DECIMALS: u32 = 6;

/// Lower index, upper index and weight of the upper one.
type Bracket = (usize, usize, f64);

fn bracket(axis: &[f64], x: f64) -> Option<Bracket> {
    let first = *axis.first()?;
    let last = *axis.last()?;
    if !x.is_finite() || x < first - HIT_TOL || x > last + HIT_TOL {
        return None;
    }
    if let Some(i) = axis.iter().position(|&a| (a - x).abs() <= HIT_TOL) {
        return Some((i, i, 0.0));
    }
    let upper = axis.iter().position(|&a| a > x)?;
    let lower = upper.checked_sub(1)?;
    let w = (x - axis[lower]) / (axis[upper] - axis[lower]);
    Some((lower, upper, w))
}

fn lerp(a: f64, b: f64, w: f64) -> f64 {
    if w == 0.0 { a } else { a * (1.0 - w) + b * w }
}

/// Trilinear lookups inside the tabulated range of a map.
pub struct MapInterpolator<'a> {
    map: &'a OperatingMap,
}

impl<'a> MapInterpolator<'a> {
    pub fn new(map: &'a OperatingMap) -> CharResult<Self> {
        let (ni, nj, nk) = map.shape();
        if ni == 0 || nj == 0 || nk == 0 {
            return Err(CharError::EmptyMap {
                what: format!("shape ({ni}, {nj}, {nk})"),
            });
        }
        for (name, axis) in [
            ("T_hs_ff", map.t_hs_ff()),
            ("T_cons_ff", map.t_cons_ff()),
            ("pl", map.pl()),
        ] {
            if axis.windows(2).any(|w| w[1] <= w[0]) {
                return Err(CharError::Shape {
                    what: format!("{name} axis not strictly ascending"),
                });
            }
        }
        Ok(Self { map })
    }

    /// Values at a point; `None` outside the tabulated range.
    ///
    /// A NaN neighbor makes the result NaN, so cells next to failed solves
    /// stay undefined.
    pub fn at(&self, t_hs_ff: f64, t_cons_ff: f64, pl: f64) -> Option<CellValues> {
        let (i0, i1, wi) = bracket(self.map.t_hs_ff(), t_hs_ff)?;
        let (j0, j1, wj) = bracket(self.map.t_cons_ff(), t_cons_ff)?;
        let (k0, k1, wk) = bracket(self.map.pl(), pl)?;

        let corner = |i, j, k| self.map.cell(i, j, k);
        let along_k = |i, j| -> Option<CellValues> {
            let a = corner(i, j, k0)?;
            let b = corner(i, j, k1)?;
            Some(mix(a, b, wk))
        };
        let along_j = |i| -> Option<CellValues> { Some(mix(along_k(i, j0)?, along_k(i, j1)?, wj)) };
        Some(mix(along_j(i0)?, along_j(i1)?, wi))
    }
}

fn mix(a: CellValues, b: CellValues, w: f64) -> CellValues {
    CellValues {
        q: lerp(a.q, b.q, w),
        p: lerp(a.p, b.p, w),
        epsilon: lerp(a.epsilon, b.epsilon, w),
        residual: lerp(a.residual, b.residual, w),
    }
}

fn dense_axis(axis: &[f64], step: f64) -> CharResult<Vec<f64>> {
    let (Some(&first), Some(&last)) = (axis.first(), axis.last()) else {
        return Err(CharError::EmptyMap {
            what: "empty axis".into(),
        });
    };
    Ok(arange_inclusive(first, last, step)?
        .into_iter()
        .map(|v| round_to(v, AXIS_DECIMALS))
        .collect())
}

/// Refine `map` onto a grid with spacing `t_step` on both temperature axes
/// and `pl_step` on the load axis. COP follows as Q/P of the refined map.
pub fn interpolate_map(map: &OperatingMap, t_step: f64, pl_step: f64) -> CharResult<OperatingMap> {
    let interp = MapInterpolator::new(map)?;
    let t_hs = dense_axis(map.t_hs_ff(), t_step)?;
    let t_cons = dense_axis(map.t_cons_ff(), t_step)?;
    let pl = dense_axis(map.pl(), pl_step)?;

    let mut dense = OperatingMap::new(t_hs.clone(), t_cons.clone(), pl.clone());
    for (i, &x) in t_hs.iter().enumerate() {
        for (j, &y) in t_cons.iter().enumerate() {
            for (k, &z) in pl.iter().enumerate() {
                if let Some(values) = interp.at(x, y, z) {
                    dense.set(i, j, k, values)?;
                }
            }
        }
    }
    tracing::debug!(
        shape = ?dense.shape(),
        filled = dense.filled(),
        "operating map interpolated"
    );
    Ok(dense)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn linear_map() -> OperatingMap {
        let mut map = OperatingMap::new(vec![0.0, 10.0], vec![50.0, 60.0, 70.0], vec![0.5, 1.0]);
        for (i, &t_hs) in [0.0, 10.0].iter().enumerate() {
            for (j, &t_cons) in [50.0, 60.0, 70.0].iter().enumerate() {
                for (k, &pl) in [0.5, 1.0].iter().enumerate() {
                    let q = 1e6 * pl * (1.0 + 0.01 * t_hs);
                    let p = q / (4.0 - 0.02 * (t_cons - t_hs));
                    map.set(
                        i,
                        j,
                        k,
                        CellValues {
                            q,
                            p,
                            epsilon: 0.4,
                            residual: 1e-8,
                        },
                    )
                    .unwrap();
                }
            }
        }
        map
    }

    #[test]
    fn linear_in_each_axis_is_reproduced() {
        let map = linear_map();
        let interp = MapInterpolator::new(&map).unwrap();
        let v = interp.at(5.0, 60.0, 0.75).unwrap();
        assert_relative_eq!(v.q, 1e6 * 0.75 * 1.05, max_relative = 1e-12);
    }

    #[test]
    fn outside_range_is_undefined() {
        let map = linear_map();
        let interp = MapInterpolator::new(&map).unwrap();
        assert!(interp.at(-1.0, 60.0, 1.0).is_none());
        assert!(interp.at(5.0, 60.0, 0.4).is_none());
    }

    #[test]
    fn dense_grid_has_unit_steps() {
        let dense = interpolate_map(&linear_map(), T_STEP, PL_STEP).unwrap();
        assert_eq!(dense.shape(), (11, 21, 51));
        assert_eq!(dense.filled(), 11 * 21 * 51);
        let cop = dense.cop();
        assert_relative_eq!(cop[(0, 0, 0)], 3.0, max_relative = 1e-12);
    }

    #[test]
    fn failed_neighbor_leaves_gap() {
        let mut map = linear_map();
        map.set(1, 2, 1, CellValues::EMPTY).unwrap();
        let interp = MapInterpolator::new(&map).unwrap();
        assert!(interp.at(5.0, 65.0, 0.9).unwrap().q.is_nan());
        assert!(interp.at(0.0, 50.0, 0.5).unwrap().q.is_finite());
    }

    proptest! {
        #[test]
        fn grid_points_round_trip(i in 0usize..2, j in 0usize..3, k in 0usize..2) {
            let map = linear_map();
            let interp = MapInterpolator::new(&map).unwrap();
            let raw = map.cell(i, j, k).unwrap();
            let got = interp
                .at(map.t_hs_ff()[i], map.t_cons_ff()[j], map.pl()[k])
                .unwrap();
            prop_assert!((got.q - raw.q).abs() <= 1e-9);
            prop_assert!((got.p - raw.p).abs() <= 1e-9);
            prop_assert!((got.epsilon - raw.epsilon).abs() <= 1e-9);
        }
    }
}
