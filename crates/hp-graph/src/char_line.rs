//! Piecewise-linear characteristic lines.

use hp_core::{HpError, HpResult};

/// Characteristic `y(x)` given by sample points, linear in between.
///
/// Queries outside the sampled range take the nearest end value.
#[derive(Debug, Clone, PartialEq)]
pub struct CharLine {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl CharLine {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> HpResult<Self> {
        if x.len() != y.len() || x.len() < 2 {
            return Err(HpError::InvalidArg {
                what: format!(
                    "characteristic needs matching samples (x: {}, y: {})",
                    x.len(),
                    y.len()
                ),
            });
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(HpError::InvalidArg {
                what: "characteristic x values must increase strictly".into(),
            });
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(HpError::InvalidArg {
                what: "characteristic samples must be finite".into(),
            });
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn evaluate(&self, at: f64) -> f64 {
        let last = self.x.len() - 1;
        if at <= self.x[0] {
            return self.y[0];
        }
        if at >= self.x[last] {
            return self.y[last];
        }
        let upper = self.x.partition_point(|&xi| xi <= at);
        let (x0, x1) = (self.x[upper - 1], self.x[upper]);
        let (y0, y1) = (self.y[upper - 1], self.y[upper]);
        y0 + (y1 - y0) * (at - x0) / (x1 - x0)
    }
}
