//! Three-dimensional operating map.

use ndarray::Array3;

use crate::types::{CellValues, PartloadRecord};
use crate::{ResultsError, ResultsResult};

/// Axis values closer than this are the same grid point.
const AXIS_TOL: f64 = 1e-9;

/// Heat output, electrical input, exergetic efficiency and residual over
/// (T_hs_ff, T_cons_ff, load fraction). Axes ascend; empty cells hold NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatingMap {
    t_hs_ff: Vec<f64>,
    t_cons_ff: Vec<f64>,
    pl: Vec<f64>,
    q: Array3<f64>,
    p: Array3<f64>,
    epsilon: Array3<f64>,
    residual: Array3<f64>,
}

impl OperatingMap {
    pub fn new(t_hs_ff: Vec<f64>, t_cons_ff: Vec<f64>, pl: Vec<f64>) -> Self {
        let shape = (t_hs_ff.len(), t_cons_ff.len(), pl.len());
        Self {
            t_hs_ff,
            t_cons_ff,
            pl,
            q: Array3::from_elem(shape, f64::NAN),
            p: Array3::from_elem(shape, f64::NAN),
            epsilon: Array3::from_elem(shape, f64::NAN),
            residual: Array3::from_elem(shape, f64::NAN),
        }
    }

    pub fn t_hs_ff(&self) -> &[f64] {
        &self.t_hs_ff
    }

    pub fn t_cons_ff(&self) -> &[f64] {
        &self.t_cons_ff
    }

    pub fn pl(&self) -> &[f64] {
        &self.pl
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.t_hs_ff.len(), self.t_cons_ff.len(), self.pl.len())
    }

    pub fn q(&self) -> &Array3<f64> {
        &self.q
    }

    pub fn p(&self) -> &Array3<f64> {
        &self.p
    }

    pub fn epsilon(&self) -> &Array3<f64> {
        &self.epsilon
    }

    pub fn residual(&self) -> &Array3<f64> {
        &self.residual
    }

    /// COP recomputed from heat output and electrical input.
    pub fn cop(&self) -> Array3<f64> {
        &self.q / &self.p
    }

    /// Grid indices of a point, if it lies on the grid.
    pub fn position(&self, t_hs_ff: f64, t_cons_ff: f64, pl: f64) -> Option<(usize, usize, usize)> {
        Some((
            axis_index(&self.t_hs_ff, t_hs_ff)?,
            axis_index(&self.t_cons_ff, t_cons_ff)?,
            axis_index(&self.pl, pl)?,
        ))
    }

    pub fn cell(&self, i: usize, j: usize, k: usize) -> Option<CellValues> {
        let idx = (i, j, k);
        Some(CellValues {
            q: *self.q.get(idx)?,
            p: *self.p.get(idx)?,
            epsilon: *self.epsilon.get(idx)?,
            residual: *self.residual.get(idx)?,
        })
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, values: CellValues) -> ResultsResult<()> {
        let (ni, nj, nk) = self.shape();
        if i >= ni || j >= nj || k >= nk {
            return Err(ResultsError::Shape {
                what: format!("cell ({i}, {j}, {k}) outside map of shape ({ni}, {nj}, {nk})"),
            });
        }
        let idx = (i, j, k);
        self.q[idx] = values.q;
        self.p[idx] = values.p;
        self.epsilon[idx] = values.epsilon;
        self.residual[idx] = values.residual;
        Ok(())
    }

    /// Number of cells holding a result.
    pub fn filled(&self) -> usize {
        self.residual.iter().filter(|r| !r.is_nan()).count()
    }

    /// Long-form rows in grid order (T_hs_ff outermost, load innermost).
    pub fn to_records(&self) -> Vec<PartloadRecord> {
        let mut records = Vec::with_capacity(self.q.len());
        for (i, &t_hs_ff) in self.t_hs_ff.iter().enumerate() {
            for (j, &t_cons_ff) in self.t_cons_ff.iter().enumerate() {
                for (k, &pl) in self.pl.iter().enumerate() {
                    let idx = (i, j, k);
                    records.push(PartloadRecord {
                        t_hs_ff,
                        t_cons_ff,
                        pl,
                        q: self.q[idx],
                        p: self.p[idx],
                        cop: self.q[idx] / self.p[idx],
                        epsilon: self.epsilon[idx],
                        residual: self.residual[idx],
                    });
                }
            }
        }
        records
    }

    /// Pivot long-form rows into a map; axes are the distinct column values.
    pub fn from_records(records: &[PartloadRecord]) -> ResultsResult<Self> {
        if records.is_empty() {
            return Err(ResultsError::Shape {
                what: "no partload records".into(),
            });
        }
        let t_hs_ff = distinct_sorted(records.iter().map(|r| r.t_hs_ff))?;
        let t_cons_ff = distinct_sorted(records.iter().map(|r| r.t_cons_ff))?;
        let pl = distinct_sorted(records.iter().map(|r| r.pl))?;

        let mut map = Self::new(t_hs_ff, t_cons_ff, pl);
        for r in records {
            let (i, j, k) = map
                .position(r.t_hs_ff, r.t_cons_ff, r.pl)
                .ok_or_else(|| ResultsError::Shape {
                    what: format!("record ({}, {}, {}) off grid", r.t_hs_ff, r.t_cons_ff, r.pl),
                })?;
            map.set(
                i,
                j,
                k,
                CellValues {
                    q: r.q,
                    p: r.p,
                    epsilon: r.epsilon,
                    residual: r.residual,
                },
            )?;
        }
        Ok(map)
    }
}

fn axis_index(axis: &[f64], value: f64) -> Option<usize> {
    axis.iter().position(|&a| (a - value).abs() <= AXIS_TOL)
}

fn distinct_sorted(values: impl Iterator<Item = f64>) -> ResultsResult<Vec<f64>> {
    let mut out: Vec<f64> = Vec::new();
    for v in values {
        if !v.is_finite() {
            return Err(ResultsError::Shape {
                what: format!("non-finite axis value {v}"),
            });
        }
        if axis_index(&out, v).is_none() {
            out.push(v);
        }
    }
    out.sort_by(f64::total_cmp);
    Ok(out)
}
