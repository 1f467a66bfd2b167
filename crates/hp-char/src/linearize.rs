//! Linear part-load models per temperature pair.
//!
//! For every (T_hs_ff, T_cons_ff) the load samples of a map are reduced to
//! `y = c1·x + c0` (offset form) or `y = c1·x` (origin form), where `x` is
//! the chosen variable and `y` the other one. With `x = P` the origin
//! coefficient is the COP.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use hp_results::OperatingMap;

use crate::error::{CharError, CharResult};

/// Singular values below this are treated as zero in least squares.
const SVD_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearForm {
    Origin,
    Offset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    MinMax,
    Ols,
}

/// Independent variable of the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variable {
    /// Electrical input; heat output is predicted.
    P,
    /// Heat output; electrical input is predicted.
    Q,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearizeOptions {
    pub form: LinearForm,
    pub method: FitMethod,
    pub variable: Variable,
    /// Reference (T_hs_ff, T_cons_ff) whose maximum of the chosen variable
    /// scales the extensive coefficients.
    pub normalize: Option<(f64, f64)>,
}

impl Default for LinearizeOptions {
    fn default() -> Self {
        Self {
            form: LinearForm::Offset,
            method: FitMethod::Ols,
            variable: Variable::P,
            normalize: None,
        }
    }
}

/// Fitted relation at one temperature pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(rename = "T_hs_ff")]
    pub t_hs_ff: f64,
    #[serde(rename = "T_cons_ff")]
    pub t_cons_ff: f64,
    /// Largest and smallest sampled value of the chosen variable.
    pub max: f64,
    pub min: f64,
    pub c1: f64,
    /// Zero in origin form.
    pub c0: f64,
}

impl LinearModel {
    pub fn predict(&self, x: f64) -> f64 {
        self.c1 * x + self.c0
    }
}

fn samples(map: &OperatingMap, i: usize, j: usize, variable: Variable) -> (Vec<f64>, Vec<f64>) {
    let (_, _, nk) = map.shape();
    let mut xs = Vec::with_capacity(nk);
    let mut ys = Vec::with_capacity(nk);
    for k in 0..nk {
        let Some(cell) = map.cell(i, j, k) else { continue };
        if !(cell.q.is_finite() && cell.p.is_finite()) {
            continue;
        }
        let (x, y) = match variable {
            Variable::P => (cell.p, cell.q),
            Variable::Q => (cell.q, cell.p),
        };
        xs.push(x);
        ys.push(y);
    }
    (xs, ys)
}

/// `(c1, c0)` of one temperature pair.
pub fn fit(xs: &[f64], ys: &[f64], form: LinearForm, method: FitMethod) -> CharResult<(f64, f64)> {
    if xs.len() != ys.len() || xs.is_empty() {
        return Err(CharError::Unfittable {
            what: format!("{} x and {} y samples", xs.len(), ys.len()),
        });
    }
    let arg = |cmp: fn(f64, f64) -> bool| {
        (1..xs.len()).fold(0, |best, i| if cmp(xs[i], xs[best]) { i } else { best })
    };
    let i_max = arg(|a, b| a > b);
    let i_min = arg(|a, b| a < b);

    match (form, method) {
        (LinearForm::Origin, FitMethod::MinMax) => {
            if xs[i_max] == 0.0 {
                return Err(CharError::Unfittable {
                    what: "origin line through a zero maximum".into(),
                });
            }
            Ok((ys[i_max] / xs[i_max], 0.0))
        }
        (LinearForm::Offset, FitMethod::MinMax) => {
            let dx = xs[i_max] - xs[i_min];
            if dx == 0.0 {
                return Err(CharError::Unfittable {
                    what: "min-max line through a single point".into(),
                });
            }
            let c1 = (ys[i_max] - ys[i_min]) / dx;
            Ok((c1, ys[i_min] - c1 * xs[i_min]))
        }
        (LinearForm::Origin, FitMethod::Ols) => {
            let x = DVector::from_column_slice(xs);
            let y = DVector::from_column_slice(ys);
            let xx = x.dot(&x);
            if xx == 0.0 {
                return Err(CharError::Unfittable {
                    what: "least squares through the origin on zero samples".into(),
                });
            }
            Ok((x.dot(&y) / xx, 0.0))
        }
        (LinearForm::Offset, FitMethod::Ols) => {
            if xs.len() < 2 {
                return Err(CharError::Unfittable {
                    what: "least squares with intercept on one sample".into(),
                });
            }
            let a = DMatrix::from_fn(xs.len(), 2, |r, c| if c == 0 { xs[r] } else { 1.0 });
            let b = DVector::from_column_slice(ys);
            let coef = a
                .svd(true, true)
                .solve(&b, SVD_EPS)
                .map_err(|e| CharError::Unfittable { what: e.to_string() })?;
            Ok((coef[0], coef[1]))
        }
    }
}

/// One linear model per temperature pair of `map` that has enough samples.
/// Pairs without a usable fit are skipped with a warning.
pub fn linearize(map: &OperatingMap, options: &LinearizeOptions) -> CharResult<Vec<LinearModel>> {
    let mut models = Vec::new();
    for (i, &t_hs_ff) in map.t_hs_ff().iter().enumerate() {
        for (j, &t_cons_ff) in map.t_cons_ff().iter().enumerate() {
            let (xs, ys) = samples(map, i, j, options.variable);
            match fit(&xs, &ys, options.form, options.method) {
                Ok((c1, c0)) => models.push(LinearModel {
                    t_hs_ff,
                    t_cons_ff,
                    max: xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    min: xs.iter().copied().fold(f64::INFINITY, f64::min),
                    c1,
                    c0,
                }),
                Err(err) => {
                    tracing::warn!(t_hs_ff, t_cons_ff, error = %err, "temperature pair skipped")
                }
            }
        }
    }
    if models.is_empty() {
        return Err(CharError::EmptyMap {
            what: "no temperature pair could be linearized".into(),
        });
    }

    if let Some((t_hs_ref, t_cons_ref)) = options.normalize {
        let reference = models
            .iter()
            .find(|m| {
                (m.t_hs_ff - t_hs_ref).abs() < 1e-9 && (m.t_cons_ff - t_cons_ref).abs() < 1e-9
            })
            .map(|m| m.max)
            .ok_or_else(|| CharError::Shape {
                what: format!("reference pair ({t_hs_ref}, {t_cons_ref}) not in map"),
            })?;
        if reference == 0.0 {
            return Err(CharError::Unfittable {
                what: "normalization by a zero maximum".into(),
            });
        }
        for m in &mut models {
            m.max /= reference;
            m.min /= reference;
            m.c0 /= reference;
        }
    }

    tracing::debug!(models = models.len(), ?options, "partload characteristic linearized");
    Ok(models)
}
