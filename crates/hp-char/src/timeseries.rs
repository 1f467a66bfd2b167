//! Alignment of linear part-load models to a temperature time series.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{CharError, CharResult};
use crate::linearize::LinearModel;

/// Feed temperatures at one timestamp [°C].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSample {
    pub timestamp: NaiveDateTime,
    #[serde(rename = "T_hs_ff")]
    pub t_hs_ff: f64,
    #[serde(rename = "T_cons_ff")]
    pub t_cons_ff: f64,
}

/// The linear model in force at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedRow {
    pub timestamp: NaiveDateTime,
    /// Tabulated temperatures the row was taken from.
    #[serde(rename = "T_hs_ff")]
    pub t_hs_ff: f64,
    #[serde(rename = "T_cons_ff")]
    pub t_cons_ff: f64,
    pub max: f64,
    pub min: f64,
    pub c1: f64,
    pub c0: f64,
    /// A requested temperature lay outside the table.
    pub clamped: bool,
}

fn distinct(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.collect();
    out.sort_by(f64::total_cmp);
    out.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    out
}

/// Nearest tabulated value and whether `x` had to be clamped.
fn snap(axis: &[f64], x: f64) -> Option<(f64, bool)> {
    let first = *axis.first()?;
    let last = *axis.last()?;
    if x.is_nan() {
        return None;
    }
    if x < first {
        return Some((first, true));
    }
    if x > last {
        return Some((last, true));
    }
    let nearest = axis
        .iter()
        .copied()
        .min_by(|a, b| (a - x).abs().total_cmp(&(b - x).abs()))?;
    Some((nearest, false))
}

/// Look up the model row for every sample. Temperatures outside the
/// tabulated range are clamped to the nearest bound with a notice.
pub fn arrange_timeseries(
    models: &[LinearModel],
    series: &[TemperatureSample],
) -> CharResult<Vec<AlignedRow>> {
    let t_hs_axis = distinct(models.iter().map(|m| m.t_hs_ff));
    let t_cons_axis = distinct(models.iter().map(|m| m.t_cons_ff));
    if t_hs_axis.is_empty() {
        return Err(CharError::EmptyMap {
            what: "no linear models to align".into(),
        });
    }

    let mut rows = Vec::with_capacity(series.len());
    for sample in series {
        let (Some((t_hs, hs_clamped)), Some((t_cons, cons_clamped))) = (
            snap(&t_hs_axis, sample.t_hs_ff),
            snap(&t_cons_axis, sample.t_cons_ff),
        ) else {
            tracing::warn!(timestamp = %sample.timestamp, "sample without temperature skipped");
            continue;
        };
        if hs_clamped || cons_clamped {
            tracing::info!(
                timestamp = %sample.timestamp,
                t_hs_ff = sample.t_hs_ff,
                t_cons_ff = sample.t_cons_ff,
                used_t_hs_ff = t_hs,
                used_t_cons_ff = t_cons,
                "temperature outside tabulated range, clamped"
            );
        }
        let model = models
            .iter()
            .find(|m| (m.t_hs_ff - t_hs).abs() < 1e-9 && (m.t_cons_ff - t_cons).abs() < 1e-9)
            .ok_or_else(|| CharError::Shape {
                what: format!("no linear model at ({t_hs}, {t_cons})"),
            })?;
        rows.push(AlignedRow {
            timestamp: sample.timestamp,
            t_hs_ff: t_hs,
            t_cons_ff: t_cons,
            max: model.max,
            min: model.min,
            c1: model.c1,
            c0: model.c0,
            clamped: hs_clamped || cons_clamped,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn model(t_hs_ff: f64, t_cons_ff: f64, c1: f64) -> LinearModel {
        LinearModel {
            t_hs_ff,
            t_cons_ff,
            max: 1.0,
            min: 0.5,
            c1,
            c0: 0.0,
        }
    }

    fn at(hour: u32, t_hs_ff: f64, t_cons_ff: f64) -> TemperatureSample {
        TemperatureSample {
            timestamp: NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            t_hs_ff,
            t_cons_ff,
        }
    }

    fn table() -> Vec<LinearModel> {
        let mut models = Vec::new();
        for t_hs in [10.0, 11.0] {
            for t_cons in [70.0, 71.0, 72.0] {
                models.push(model(t_hs, t_cons, t_cons - t_hs));
            }
        }
        models
    }

    #[test]
    fn rows_follow_the_series() {
        let rows = arrange_timeseries(&table(), &[at(0, 10.0, 71.0), at(1, 10.8, 71.6)]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].c1, 61.0);
        assert_eq!((rows[1].t_hs_ff, rows[1].t_cons_ff), (11.0, 72.0));
        assert!(!rows[1].clamped);
    }

    #[test]
    fn out_of_range_sink_is_clamped() {
        hp_testkit::init_tracing();
        let rows = arrange_timeseries(&table(), &[at(0, 10.0, 90.0), at(1, 10.0, 60.0)]).unwrap();
        assert_eq!(rows[0].t_cons_ff, 72.0);
        assert_eq!(rows[1].t_cons_ff, 70.0);
        assert!(rows.iter().all(|r| r.clamped));
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(arrange_timeseries(&[], &[at(0, 10.0, 70.0)]).is_err());
    }
}
