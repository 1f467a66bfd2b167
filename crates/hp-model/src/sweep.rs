//! Part-load sweep over source feed temperature, sink feed temperature and
//! load fraction.
//!
//! Both temperature axes are walked from their midpoint outward and back,
//! so every cell starts from a converged neighbor. Loads descend within a
//! temperature pair. Only cells of the base grid are recorded, each keeping
//! its best residual.

use std::path::{Path, PathBuf};

use hp_core::{linspace, round_to};
use hp_engine::{
    ComponentAttr, ComponentUpdate, FlowsheetEngine, SolveMode, SolveOptions, StateSpec, StateVar,
};
use hp_project::OffdesignDef;
use hp_results::{AttemptLog, CellValues, OperatingMap};
use serde::Serialize;

use crate::error::{ModelError, ModelResult};
use crate::model::{HeatPump, RESIDUAL_LIMIT, source_return_temperature};
use crate::network::{
    BUS_HEAT_OUT, BUS_POWER, REFERENCE_FLOW, SINK_FEED, SOURCE_FEED, SOURCE_RETURN,
};
use crate::parameterize::apply;

/// Decimals axis values are rounded to.
const AXIS_DECIMALS: u32 = 3;

/// One point of a traversal axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisPoint {
    pub value: f64,
    /// Index into the base grid; `None` on the return tails.
    pub base: Option<usize>,
}

/// `steps` values from `start` to `end`, rounded to three decimals.
pub fn grid_axis(start: f64, end: f64, steps: usize) -> Vec<f64> {
    linspace(start, end, steps)
        .into_iter()
        .map(|v| round_to(v, AXIS_DECIMALS))
        .collect()
}

/// Midpoint down to the start, the whole base range, then the end back to
/// the midpoint.
pub fn stable_range(base: &[f64]) -> Vec<AxisPoint> {
    let n = base.len();
    let head = base[..n.div_ceil(2)]
        .iter()
        .rev()
        .map(|&value| AxisPoint { value, base: None });
    let body = base.iter().enumerate().map(|(i, &value)| AxisPoint {
        value,
        base: Some(i),
    });
    let tail = base[n / 2..]
        .iter()
        .rev()
        .map(|&value| AxisPoint { value, base: None });
    head.chain(body).chain(tail).collect()
}

/// Cell counts of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub attempted: usize,
    /// Solves that returned with a residual below the limit.
    pub converged: usize,
    /// Cells that raised while being set up or solved.
    pub failed: usize,
    /// Base-grid cells holding a result.
    pub recorded: usize,
}

struct SweepRun {
    options: SolveOptions,
    init_path: PathBuf,
    m_design: f64,
    dt_hs: f64,
    pl_axis: Vec<f64>,
    /// An init snapshot of this sweep is on disk.
    init_saved: bool,
    summary: SweepSummary,
}

struct Outcome {
    values: CellValues,
    converged: bool,
}

impl<E: FlowsheetEngine> HeatPump<E> {
    /// Switch every component onto its off-design characteristics.
    pub fn switch_to_offdesign(&mut self) -> ModelResult<()> {
        let steps = self.parameterizer()?.offdesign_switch();
        apply(self.engine_mut(), &steps)?;
        Ok(())
    }

    /// Sweep the off-design grid configured in `offdesign` and keep the map.
    ///
    /// A failing cell, or a temperature pair whose intermediate states cannot
    /// be set, is logged and left empty. Whatever the sweep reached is kept
    /// and written even when an error ends it early.
    pub fn offdesign_simulation(&mut self) -> ModelResult<SweepSummary> {
        if !self.solved_design() {
            return Err(ModelError::DesignUnconverged {
                phase: "design",
                residual: f64::NAN,
            });
        }
        let grid = self.params().offdesign()?.clone();
        let m_design = self
            .m_design()
            .ok_or_else(|| ModelError::configuration("design mass flow unknown"))?;
        let subdirname = self.subdirname().to_string();

        let (t_hs_axis, t_cons_axis, pl_axis) = sweep_axes(&grid);
        let mut map =
            OperatingMap::new(t_hs_axis.clone(), t_cons_axis.clone(), pl_axis.clone());

        let mut log = if grid.save_results {
            Some(self.store().open_attempt_log(&subdirname)?)
        } else {
            None
        };

        self.switch_to_offdesign()?;
        self.store().discard_init(&subdirname)?;
        let mut run = SweepRun {
            options: SolveOptions::default().design_path(self.design_path()),
            init_path: self.init_path(),
            m_design,
            dt_hs: self.params().b1.t - self.params().b2.t,
            pl_axis,
            init_saved: false,
            summary: SweepSummary::default(),
        };

        tracing::info!(
            t_hs_ff = ?t_hs_axis,
            t_cons_ff = ?t_cons_axis,
            pl = ?run.pl_axis,
            "off-design sweep started"
        );
        let swept = self.sweep_grid(&mut run, &t_hs_axis, &t_cons_axis, &mut map, log.as_mut());

        let mut summary = run.summary;
        summary.recorded = map.filled();
        match &swept {
            Ok(()) => tracing::info!(
                attempted = summary.attempted,
                converged = summary.converged,
                failed = summary.failed,
                recorded = summary.recorded,
                "off-design sweep finished"
            ),
            Err(err) => tracing::warn!(
                error = %err,
                attempted = summary.attempted,
                recorded = summary.recorded,
                "off-design sweep stopped, keeping the partial map"
            ),
        }
        let written = grid
            .save_results
            .then(|| self.store().save_partload(&subdirname, &map));
        self.partload = Some(map);
        self.partload_char = None;
        swept?;
        written.transpose()?;
        Ok(summary)
    }

    fn sweep_grid(
        &mut self,
        run: &mut SweepRun,
        t_hs_axis: &[f64],
        t_cons_axis: &[f64],
        map: &mut OperatingMap,
        mut log: Option<&mut AttemptLog>,
    ) -> ModelResult<()> {
        for hs in stable_range(t_hs_axis) {
            let t_hs_bf = source_return_temperature(hs.value, run.dt_hs);
            let source = apply_state(self, SOURCE_FEED, StateVar::T, hs.value)
                .and_then(|()| apply_state(self, SOURCE_RETURN, StateVar::T, t_hs_bf))
                .err()
                .map(|err| err.to_string());

            for (j, cons) in stable_range(t_cons_axis).into_iter().enumerate() {
                let pair = match &source {
                    Some(message) => Err(message.clone()),
                    None => self
                        .prepare_pair(hs.value, cons.value, run.dt_hs)
                        .map_err(|err| err.to_string()),
                };
                if let Err(message) = pair {
                    for &pl in run.pl_axis.iter().rev() {
                        run.summary.attempted += 1;
                        run.summary.failed += 1;
                        cell_failed(&mut log, hs.value, cons.value, pl, &message)?;
                    }
                    continue;
                }

                for (k, &pl) in run.pl_axis.iter().enumerate().rev() {
                    let at_max = k + 1 == run.pl_axis.len();
                    let restore = (j != 0 && at_max && run.init_saved)
                        .then_some(run.init_path.as_path());
                    run.summary.attempted += 1;
                    let solved = self
                        .prepare_cell(pl * run.m_design, restore)
                        .and_then(|()| self.solve_cell(&run.options));
                    let outcome = match solved {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            run.summary.failed += 1;
                            cell_failed(&mut log, hs.value, cons.value, pl, &err.to_string())?;
                            continue;
                        }
                    };

                    let residual = outcome.values.residual;
                    if outcome.converged {
                        run.summary.converged += 1;
                    }
                    tracing::debug!(
                        t_hs_ff = hs.value,
                        t_cons_ff = cons.value,
                        pl,
                        residual,
                        converged = outcome.converged,
                        restored = restore.is_some(),
                        "off-design cell"
                    );
                    if let Some(log) = log.as_deref_mut() {
                        log.record(outcome.converged, hs.value, cons.value, pl, residual)?;
                    }

                    if at_max && outcome.converged {
                        run.init_saved = match self.engine_mut().save(&run.init_path) {
                            Ok(()) => true,
                            Err(err) => {
                                tracing::warn!(error = %err, "init snapshot not written");
                                false
                            }
                        };
                    }

                    if let (Some(i), Some(jb)) = (hs.base, cons.base) {
                        record_best(map, (i, jb, k), outcome.values)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Sink feed and intermediate states of one temperature pair.
    fn prepare_pair(&mut self, t_hs_ff: f64, t_cons_ff: f64, dt_hs: f64) -> ModelResult<()> {
        apply_state(self, SINK_FEED, StateVar::T, t_cons_ff)?;
        self.intermediate_states_offdesign(t_hs_ff, t_cons_ff, dt_hs)
    }

    /// Load of one cell, optionally warm-started from the init snapshot.
    fn prepare_cell(&mut self, m: f64, restore: Option<&Path>) -> ModelResult<()> {
        self.engine_mut()
            .set_component("cons", &ComponentUpdate::new().free(ComponentAttr::Q))?;
        apply_state(self, REFERENCE_FLOW, StateVar::M, m)?;
        if let Some(path) = restore {
            self.engine_mut().restore(path)?;
        }
        Ok(())
    }

    fn solve_cell(&mut self, options: &SolveOptions) -> ModelResult<Outcome> {
        self.engine_mut().solve(SolveMode::Offdesign, options)?;
        let residual = self.engine().residual().unwrap_or(f64::NAN);
        let q = self.engine().bus_power(BUS_HEAT_OUT)?.abs();
        let p = self.engine().bus_power(BUS_POWER)?;
        let request = self.exergy_request()?;
        let epsilon = self.engine_mut().exergy(&request)?.epsilon;
        Ok(Outcome {
            values: CellValues {
                q,
                p,
                epsilon,
                residual,
            },
            converged: residual < RESIDUAL_LIMIT,
        })
    }
}

fn cell_failed(
    log: &mut Option<&mut AttemptLog>,
    t_hs_ff: f64,
    t_cons_ff: f64,
    pl: f64,
    message: &str,
) -> ModelResult<()> {
    let failure = ModelError::OffdesignCellFailed {
        t_hs_ff,
        t_cons_ff,
        pl,
        message: message.to_string(),
    };
    tracing::warn!(error = %failure, "off-design cell failed");
    if let Some(log) = log.as_deref_mut() {
        log.record(false, t_hs_ff, t_cons_ff, pl, f64::NAN)?;
    }
    Ok(())
}

fn apply_state<E: FlowsheetEngine>(
    hp: &mut HeatPump<E>,
    conn: &str,
    var: StateVar,
    value: f64,
) -> ModelResult<()> {
    hp.engine_mut()
        .set_state(conn, &StateSpec::new().fixed(var, value))?;
    Ok(())
}

/// Store `values` unless the cell already holds a lower residual.
fn record_best(
    map: &mut OperatingMap,
    (i, j, k): (usize, usize, usize),
    values: CellValues,
) -> ModelResult<bool> {
    if values.residual.is_nan() {
        return Ok(false);
    }
    let keep = match map.cell(i, j, k) {
        Some(current) => current.is_empty() || values.residual < current.residual,
        None => false,
    };
    if keep {
        map.set(i, j, k, values)?;
    }
    Ok(keep)
}

/// Base-grid axes of the configured sweep.
pub fn sweep_axes(grid: &OffdesignDef) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    (
        grid_axis(grid.t_hs_ff_start, grid.t_hs_ff_end, grid.t_hs_ff_steps),
        grid_axis(grid.t_cons_ff_start, grid.t_cons_ff_end, grid.t_cons_ff_steps),
        grid_axis(grid.partload_min, grid.partload_max, grid.partload_steps),
    )
}
