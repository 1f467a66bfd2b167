use std::path::PathBuf;
use std::sync::Arc;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use hp_char::{FitMethod, LinearForm, LinearizeOptions, TemperatureSample};
use hp_engine::{
    ComponentAttr, ComponentUpdate, FlowsheetEngine, SolveMode, SolveOptions, StateSpec, StateVar,
    Value,
};
use hp_fluids::EosService;
use hp_model::{HeatPump, Layout, ModelError, default_params, default_refrigerants};
use hp_project::Params;
use hp_results::{PartloadRecord, read_attempt_log, read_partload_csv};
use hp_testkit::{ClausiusFluid, EngineCall, OperatingPoint, ScriptedEngine, init_tracing};

fn work_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("hp_model_sweep_{name}_{}", std::process::id()))
}

fn designed_with(
    tag: &str,
    dir: &str,
    configure: impl FnOnce(&mut Params),
    script: impl FnOnce(ScriptedEngine) -> ScriptedEngine,
) -> HeatPump<ScriptedEngine> {
    init_tracing();
    let layout = Layout::parse(tag, None).unwrap();
    let mut params = default_params(tag, default_refrigerants(&layout)).unwrap();
    configure(&mut params);
    let eos: Arc<dyn EosService> = Arc::new(ClausiusFluid::new());
    let engine = script(ScriptedEngine::new(Arc::clone(&eos)));
    let mut hp = HeatPump::new(params, eos, engine, work_dir(dir)).unwrap();
    hp.run_model().unwrap();
    hp
}

fn designed(
    tag: &str,
    dir: &str,
    save_results: bool,
    script: impl FnOnce(ScriptedEngine) -> ScriptedEngine,
) -> HeatPump<ScriptedEngine> {
    designed_with(
        tag,
        dir,
        |params| {
            if let Some(grid) = params.offdesign.as_mut() {
                grid.save_results = save_results;
            }
        },
        script,
    )
}

fn stored(records: Vec<PartloadRecord>) -> Vec<PartloadRecord> {
    records.into_iter().filter(|r| !r.residual.is_nan()).collect()
}

#[test]
fn sweep_requires_a_design() {
    init_tracing();
    let layout = Layout::parse("simple", None).unwrap();
    let params = default_params("simple", default_refrigerants(&layout)).unwrap();
    let eos: Arc<dyn EosService> = Arc::new(ClausiusFluid::new());
    let engine = ScriptedEngine::new(Arc::clone(&eos));
    let mut hp = HeatPump::new(params, eos, engine, work_dir("no_design")).unwrap();
    assert!(matches!(
        hp.offdesign_simulation(),
        Err(ModelError::DesignUnconverged { .. })
    ));
}

#[test]
fn sweep_fills_the_base_grid() {
    let mut hp = designed("simple", "fills", false, |e| e);
    let summary = hp.offdesign_simulation().unwrap();

    // 7 stable points per temperature axis, 6 loads.
    assert_eq!(summary.attempted, 7 * 7 * 6);
    assert_eq!(summary.failed, 0);
    assert!(summary.converged as f64 >= 0.8 * summary.attempted as f64);

    let map = hp.partload().unwrap();
    assert_eq!(map.shape(), (3, 3, 6));
    assert_eq!(summary.recorded, 3 * 3 * 6);
    assert_eq!(map.filled(), summary.recorded);
}

#[test]
fn cop_falls_with_sink_temperature() {
    let mut hp = designed("simple", "cop_trend", false, |e| e);
    hp.offdesign_simulation().unwrap();
    let map = hp.partload().unwrap();
    let cop = map.cop();
    let (ni, nj, nk) = map.shape();
    for i in 0..ni {
        for k in 0..nk {
            for j in 1..nj {
                assert!(
                    cop[(i, j, k)] <= cop[(i, j - 1, k)],
                    "COP rises from T_cons_ff {} to {}",
                    map.t_cons_ff()[j - 1],
                    map.t_cons_ff()[j]
                );
            }
        }
    }
}

#[test]
fn heat_output_follows_load() {
    let mut hp = designed("simple", "load", false, |e| e);
    hp.offdesign_simulation().unwrap();
    let map = hp.partload().unwrap();
    let full = map.cell(1, 1, 5).unwrap();
    let half = map.cell(1, 1, 0).unwrap();
    assert_eq!(map.pl()[0], 0.5);
    assert_relative_eq!(half.q / full.q, 0.5, max_relative = 1e-9);
}

#[test]
fn sweep_is_deterministic() {
    let mut a = designed("simple", "determinism_a", false, |e| e);
    let mut b = designed("simple", "determinism_b", false, |e| e);
    let sa = a.offdesign_simulation().unwrap();
    let sb = b.offdesign_simulation().unwrap();
    assert_eq!(sa, sb);
    assert_eq!(a.partload().unwrap().to_records(), b.partload().unwrap().to_records());
}

#[test]
fn sweep_solves_off_design_from_the_snapshot() {
    let mut hp = designed("simple", "snapshot", false, |e| e);
    hp.offdesign_simulation().unwrap();
    let design_path = hp.design_path();
    let offdesign: Vec<_> = hp
        .engine()
        .calls()
        .iter()
        .filter_map(|call| match call {
            EngineCall::Solve {
                mode: SolveMode::Offdesign,
                options,
            } => Some(options),
            _ => None,
        })
        .collect();
    assert_eq!(offdesign.len(), 7 * 7 * 6);
    assert!(
        offdesign
            .iter()
            .all(|o| o.design_path.as_deref() == Some(design_path.as_path()))
    );

    // Warm starts are restored when a new sink temperature begins.
    let restores = hp
        .engine()
        .calls()
        .iter()
        .filter(|call| matches!(call, EngineCall::Restore(_)))
        .count();
    assert!(restores > 0);
    assert!(hp.init_path().join("state.json").is_file());

    let pl_min = 0.5;
    let m_design = hp.m_design().unwrap();
    assert_eq!(
        hp.engine().assigned("C3", StateVar::M),
        Some(&Value::Fixed(pl_min * m_design))
    );
}

#[test]
fn failed_cells_stay_empty() {
    let mut hp = designed("simple", "failures", true, |e| {
        e.fail_when(|point| point.mode == SolveMode::Offdesign && point.t_hot > 75.0)
    });
    let summary = hp.offdesign_simulation().unwrap();
    assert!(summary.failed > 0);

    let map = hp.partload().unwrap();
    let hot = map.t_cons_ff().iter().position(|&t| t > 75.0).unwrap();
    for i in 0..3 {
        for k in 0..6 {
            assert!(map.cell(i, hot, k).unwrap().is_empty());
            assert!(!map.cell(i, 0, k).unwrap().is_empty());
        }
    }

    let log = read_attempt_log(&hp.store().offdesign_log_path(hp.subdirname())).unwrap();
    assert_eq!(log.len(), summary.attempted);
    assert_eq!(log.iter().filter(|r| !r.converged).count(), summary.failed);
}

#[test]
fn scripted_residuals_are_kept_at_their_best() {
    // Two design solves, then the first off-design cells report a poor residual.
    let mut hp = designed("simple", "residuals", false, |e| {
        e.with_residuals([1e-8, 1e-8, 5e-2, 5e-2])
    });
    let summary = hp.offdesign_simulation().unwrap();
    assert_eq!(summary.converged, summary.attempted - 2);
    let map = hp.partload().unwrap();
    assert!(map.residual().iter().all(|&r| r < 1e-3));
}

#[test]
fn staged_and_cascade_cycles_sweep() {
    for tag in ["econ_closed", "flash", "cascade"] {
        let mut hp = designed(tag, &format!("staged_{tag}"), false, |e| e);
        let summary = hp
            .offdesign_simulation()
            .unwrap_or_else(|e| panic!("{tag}: {e}"));
        assert!(
            summary.converged as f64 >= 0.8 * summary.attempted as f64,
            "{tag}: {summary:?}"
        );
    }
}

#[test]
fn parallel_compressor_cycle_sweeps_a_finer_load_grid() {
    let mut hp = designed_with(
        "ihx_pc_econ_closed",
        "parallel_compressor",
        |params| {
            let grid = params.offdesign.as_mut().unwrap();
            grid.partload_steps = 5;
        },
        |e| e,
    );
    let summary = hp.offdesign_simulation().unwrap();
    assert_eq!(summary.attempted, 7 * 7 * 5);
    assert!(
        summary.converged as f64 >= 0.8 * summary.attempted as f64,
        "{summary:?}"
    );

    let map = hp.partload().unwrap();
    assert_eq!(map.shape(), (3, 3, 5));
    assert_eq!(map.pl(), [0.5, 0.625, 0.75, 0.875, 1.0]);
    let cop = map.cop();
    for i in 0..3 {
        for k in 0..5 {
            for j in 1..3 {
                if map.cell(i, j, k).unwrap().is_empty() || map.cell(i, j - 1, k).unwrap().is_empty() {
                    continue;
                }
                assert!(cop[(i, j, k)] <= cop[(i, j - 1, k)], "COP rises at ({i}, {j}, {k})");
            }
        }
    }
}

#[test]
fn unreachable_sink_temperatures_leave_a_partial_map() {
    // Condensing above 110 °C has no saturation state for R1234ze(E).
    let mut hp = designed_with(
        "ic",
        "partial_map",
        |params| {
            let grid = params.offdesign.as_mut().unwrap();
            grid.t_cons_ff_start = 60.0;
            grid.t_cons_ff_end = 110.0;
            grid.t_cons_ff_steps = 3;
            grid.save_results = true;
        },
        |e| e,
    );
    let summary = hp.offdesign_simulation().unwrap();
    assert_eq!(summary.attempted, 7 * 7 * 6);
    // Two of the seven sink temperatures visited per source temperature.
    assert!(summary.failed >= 7 * 2 * 6, "{summary:?}");

    let map = hp.partload().unwrap();
    assert_eq!(map.t_cons_ff(), [60.0, 85.0, 110.0]);
    for i in 0..3 {
        for k in 0..6 {
            assert!(map.cell(i, 2, k).unwrap().is_empty());
            assert!(!map.cell(i, 0, k).unwrap().is_empty());
        }
    }
    assert_eq!(summary.recorded, map.filled());
    assert!(summary.recorded >= 3 * 6);

    let path = hp.store().partload_path(hp.subdirname());
    let written = read_partload_csv(&path).unwrap();
    assert_eq!(written.len(), 3 * 3 * 6);
    assert_eq!(stored(written), stored(map.to_records()));

    let log = read_attempt_log(&hp.store().offdesign_log_path(hp.subdirname())).unwrap();
    assert_eq!(log.len(), summary.attempted);
    assert_eq!(log.iter().filter(|r| !r.converged).count(), summary.failed);
    assert!(
        log.iter()
            .filter(|r| r.t_cons_ff == 110.0)
            .all(|r| !r.converged && r.residual.is_nan())
    );
}

#[test]
fn warm_starts_follow_a_converged_full_load_cell() {
    let mut hp = designed("simple", "warm_start", false, |e| e);
    let summary = hp.offdesign_simulation().unwrap();
    assert_eq!(summary.failed, 0);
    let init = hp.init_path();
    let m_full = hp.m_design().unwrap();

    let calls = hp.engine().calls();
    let mut load = None;
    let mut solved_load = None;
    let mut saved = false;
    let (mut saves, mut restores) = (0, 0);
    for (n, call) in calls.iter().enumerate() {
        match call {
            EngineCall::SetState { conn, spec } if conn == "C3" => {
                if let Some(Value::Fixed(m)) = spec.get(StateVar::M) {
                    load = Some(*m);
                }
            }
            EngineCall::Solve {
                mode: SolveMode::Offdesign,
                ..
            } => solved_load = load,
            EngineCall::Save(path) if *path == init => {
                assert_eq!(solved_load, Some(m_full), "snapshot of a part-load cell");
                saved = true;
                saves += 1;
            }
            EngineCall::Restore(path) => {
                assert_eq!(*path, init);
                assert!(saved, "restored before any snapshot of this sweep");
                assert_eq!(load, Some(m_full), "restored into a part-load cell");
                assert!(matches!(
                    calls.get(n + 1),
                    Some(EngineCall::Solve {
                        mode: SolveMode::Offdesign,
                        ..
                    })
                ));
                restores += 1;
            }
            _ => {}
        }
    }
    // One snapshot per temperature pair, one restore per sink change.
    assert_eq!(saves, 7 * 7);
    assert_eq!(restores, 7 * 6);
}

#[test]
fn snapshot_of_an_earlier_sweep_is_not_restored() {
    // The first full-load cell never converges, so nothing is saved before
    // the second sink temperature begins.
    let first_cell = |point: &OperatingPoint| {
        point.mode == SolveMode::Offdesign
            && point.load > 0.999
            && (point.t_hot - 70.0).abs() < 1e-6
            && (point.t_cold - 25.0).abs() < 1e-6
    };
    let mut first = designed("simple", "stale_snapshot", false, |e| e.fail_when(first_cell));
    let a = first.offdesign_simulation().unwrap();
    assert!(first.init_path().join("state.json").is_file());

    let mut second = designed("simple", "stale_snapshot", false, |e| e.fail_when(first_cell));
    let b = second.offdesign_simulation().unwrap();
    assert!(a.failed > 0);
    assert_eq!(a, b);
    assert_eq!(first.engine().calls(), second.engine().calls());
    assert_eq!(
        stored(first.partload().unwrap().to_records()),
        stored(second.partload().unwrap().to_records())
    );

    let restores = |hp: &HeatPump<ScriptedEngine>| {
        let calls = hp.engine().calls();
        let first_save = calls
            .iter()
            .position(|c| matches!(c, EngineCall::Save(p) if *p == hp.init_path()))
            .unwrap();
        calls[..first_save]
            .iter()
            .filter(|c| matches!(c, EngineCall::Restore(_)))
            .count()
    };
    assert_eq!(restores(&second), 0);
}

#[test]
fn restore_brings_back_the_saved_masses() {
    let mut hp = designed("simple", "restore_masses", false, |e| e);
    let m_full = hp.m_design().unwrap();
    let q_full = hp.engine().bus_power("heat output").unwrap();
    let design = hp.design_path();

    hp.switch_to_offdesign().unwrap();
    let engine = hp.engine_mut();
    engine
        .set_component("cons", &ComponentUpdate::new().free(ComponentAttr::Q))
        .unwrap();
    engine
        .set_state("C3", &StateSpec::new().fixed(StateVar::M, 0.5 * m_full))
        .unwrap();
    engine
        .solve(SolveMode::Offdesign, &SolveOptions::default().design_path(design.clone()))
        .unwrap();
    assert_relative_eq!(engine.connection_state("C3").unwrap().m, 0.5 * m_full);

    engine.restore(&design).unwrap();
    assert_relative_eq!(engine.connection_state("C3").unwrap().m, m_full);
    assert_relative_eq!(engine.bus_power("heat output").unwrap(), q_full);
}

#[test]
fn partload_map_round_trips_through_csv() {
    let mut hp = designed("simple", "csv", true, |e| e);
    hp.offdesign_simulation().unwrap();
    let path = hp.store().partload_path(hp.subdirname());
    let records = read_partload_csv(&path).unwrap();
    assert_eq!(records, hp.partload().unwrap().to_records());

    let loaded = hp.store().load_partload(hp.subdirname()).unwrap();
    assert_eq!(loaded.shape(), hp.partload().unwrap().shape());
    assert_eq!(loaded.filled(), hp.partload().unwrap().filled());
}

#[test]
fn characteristics_from_the_sweep() {
    let mut hp = designed("simple", "characteristics", true, |e| e);
    hp.offdesign_simulation().unwrap();

    let dense = hp.calc_partload_char().unwrap();
    // 20 K at 1 K steps, loads 0.5 to 1.0 at 0.01.
    assert_eq!(dense.shape(), (21, 21, 51));
    assert_eq!(dense.filled(), 21 * 21 * 51);

    let options = LinearizeOptions {
        form: LinearForm::Offset,
        method: FitMethod::Ols,
        ..LinearizeOptions::default()
    };
    let models = hp.linearize_partload_char(&options).unwrap();
    assert_eq!(models.len(), 21 * 21);
    assert!(models.iter().all(|m| m.c1 > 1.0 && m.max > m.min));

    let at = |hour, t_hs_ff, t_cons_ff| TemperatureSample {
        timestamp: NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap(),
        t_hs_ff,
        t_cons_ff,
    };
    let rows = hp
        .arrange_char_timeseries(&models, &[at(0, 20.0, 65.0), at(1, 20.0, 95.0)])
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(!rows[0].clamped);
    assert!(rows[1].clamped);
    assert_eq!(rows[1].t_cons_ff, 80.0);
}

#[test]
fn characteristic_loads_a_saved_map() {
    let mut first = designed("simple", "saved_map", true, |e| e);
    first.offdesign_simulation().unwrap();
    let expected = first.calc_partload_char().unwrap().shape();

    // Fresh model on the same directory: no sweep in memory.
    let mut second = designed("simple", "saved_map", true, |e| e);
    assert!(second.partload().is_none());
    assert_eq!(second.calc_partload_char().unwrap().shape(), expected);
}

#[test]
fn linearization_without_a_sweep_is_rejected() {
    let hp = designed("simple", "no_sweep", false, |e| e);
    assert!(matches!(
        hp.linearize_partload_char(&LinearizeOptions::default()),
        Err(ModelError::Configuration { .. })
    ));
}
