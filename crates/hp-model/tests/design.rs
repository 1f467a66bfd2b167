use std::path::PathBuf;
use std::sync::Arc;

use approx::assert_relative_eq;
use hp_core::units::{bar, to_bar, to_celsius};
use hp_econ::CostSettings;
use hp_engine::{FlowsheetEngine, SolveMode, StateVar, Value};
use hp_fluids::EosService;
use hp_model::{
    HeatPump, Layout, ModelError, REGISTRY, cascade_mid_temperature, default_params,
    default_refrigerants,
};
use hp_model::network::ComponentDraft;
use hp_project::Params;
use hp_testkit::{ClausiusFluid, EngineCall, ScriptedEngine, init_tracing};

fn work_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("hp_model_design_{name}_{}", std::process::id()))
}

fn params_for(tag: &str) -> Params {
    let layout = Layout::parse(tag, None).unwrap();
    default_params(tag, default_refrigerants(&layout)).unwrap()
}

fn model_with(
    tag: &str,
    dir: &str,
    script: impl FnOnce(ScriptedEngine) -> ScriptedEngine,
) -> HeatPump<ScriptedEngine> {
    init_tracing();
    let eos: Arc<dyn EosService> = Arc::new(ClausiusFluid::new());
    let engine = script(ScriptedEngine::new(Arc::clone(&eos)));
    HeatPump::new(params_for(tag), eos, engine, work_dir(dir)).unwrap()
}

fn model(tag: &str, dir: &str) -> HeatPump<ScriptedEngine> {
    model_with(tag, dir, |engine| engine)
}

#[test]
fn every_registry_topology_converges() {
    for tag in REGISTRY {
        let mut hp = model(tag, &format!("registry_{tag}"));
        hp.run_model().unwrap_or_else(|e| panic!("{tag}: {e}"));
        assert!(hp.solved_design(), "{tag}");
        let cop = hp.cop().unwrap();
        assert!(cop > 1.0, "{tag}: COP {cop}");
        let epsilon = hp.epsilon().unwrap();
        assert!((0.0..=1.0).contains(&epsilon), "{tag}: epsilon {epsilon}");
        assert!(hp.design_path().join("state.json").is_file(), "{tag}");
    }
}

#[test]
fn cop_is_heat_output_over_power() {
    let mut hp = model("simple", "cop");
    hp.run_model().unwrap();
    let power = hp.engine().bus_power("power input").unwrap();
    let heat = hp.engine().bus_power("heat output").unwrap();
    assert!(heat < 0.0);
    assert_relative_eq!(hp.cop().unwrap(), heat.abs() / power, max_relative = 1e-12);
    assert_relative_eq!(hp.design_point().unwrap().heat_output, 1.0e6, max_relative = 1e-9);
}

#[test]
fn design_phases_solve_in_design_mode() {
    let mut hp = model("ihx", "phases");
    hp.run_model().unwrap();
    let solves: Vec<SolveMode> = hp
        .engine()
        .calls()
        .iter()
        .filter_map(|call| match call {
            EngineCall::Solve { mode, .. } => Some(*mode),
            _ => None,
        })
        .collect();
    assert_eq!(solves, [SolveMode::Design, SolveMode::Design]);
    assert!(matches!(hp.engine().calls().first(), Some(EngineCall::Reset)));
}

#[test]
fn rerunning_the_model_is_idempotent() {
    let mut hp = model("econ_closed", "idempotent");
    hp.run_model().unwrap();
    let first = *hp.design_point().unwrap();
    let first_cost = hp.calc_cost(&CostSettings::default()).unwrap();
    let first_rows = hp.connection_table().unwrap();

    hp.run_model().unwrap();
    assert_eq!(*hp.design_point().unwrap(), first);
    assert_eq!(hp.calc_cost(&CostSettings::default()).unwrap(), first_cost);
    assert_eq!(hp.connection_table().unwrap(), first_rows);
}

#[test]
fn closed_economizer_merge_conserves_mass() {
    let mut hp = model("econ_closed", "merge");
    hp.run_model().unwrap();
    let m = |label: &str| hp.engine().connection_state(label).unwrap().m;
    assert_relative_eq!(m("A6") + m("A9"), m("A7"), max_relative = 1e-9);
    assert!(m("A9") > 0.0);
}

#[test]
fn cascade_intermediate_temperature_is_the_midpoint() {
    let mut hp = model("cascade", "cascade_mid");
    hp.run_model().unwrap();
    let params = hp.params();
    let expected = cascade_mid_temperature(params.b2.t, params.c3.t);
    let cascade = hp.levels().unwrap().cascade.unwrap();
    assert_relative_eq!(cascade.t_mid, expected);
    assert!(cascade.p_ht_evap > 0.0 && cascade.p_lt_cond > 0.0);
}

#[test]
fn transcritical_high_side_keeps_configured_pressure() {
    let mut hp = model("simple_trans", "trans");
    hp.run_model().unwrap();
    let configured = hp.params().a0.as_ref().unwrap().p;
    assert_eq!(
        hp.engine().assigned("A0", StateVar::P),
        Some(&Value::Fixed(configured))
    );
    assert_relative_eq!(hp.engine().connection_state("A0").unwrap().p, configured);
}

#[test]
fn unconverged_init_is_reported_with_its_phase() {
    let mut hp = model_with("simple", "unconverged_init", |e| e.with_residuals([0.5]));
    let err = hp.run_model().unwrap_err();
    match err {
        ModelError::DesignUnconverged { phase, residual } => {
            assert_eq!(phase, "init");
            assert_eq!(residual, 0.5);
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(!hp.solved_design());
}

#[test]
fn unconverged_design_leaves_no_snapshot() {
    let mut hp = model_with("simple", "unconverged_design", |e| {
        e.with_residuals([1e-8, 2e-3])
    });
    let err = hp.run_model().unwrap_err();
    assert!(matches!(
        err,
        ModelError::DesignUnconverged { phase: "design", .. }
    ));
    assert!(hp.cop().is_none());
    assert!(!hp.design_path().join("state.json").exists());
}

#[test]
fn solver_failure_propagates() {
    let mut hp = model_with("simple", "solver_failure", |e| e.fail_solves([0]));
    assert!(matches!(hp.run_model(), Err(ModelError::Engine(_))));
}

#[test]
fn exergy_report_balances() {
    let mut hp = model("ihx", "exergy");
    hp.run_model().unwrap();
    let report = hp.exergy_report().unwrap();
    assert_relative_eq!(
        report.e_f(),
        report.e_p() + report.e_d() + report.e_l(),
        max_relative = 1e-9
    );
    let destroyed: f64 = report.component_table().iter().map(|r| r.e_d).sum();
    assert_relative_eq!(destroyed, report.e_d(), max_relative = 1e-9);
    let waterfall = report.waterfall();
    assert_eq!(waterfall.first().unwrap().label, "E_F");
    assert_eq!(waterfall.last().unwrap().label, "E_P");
    let destruction: Vec<f64> = waterfall[1..waterfall.len() - 1]
        .iter()
        .map(|bar| -bar.value)
        .collect();
    assert!(destruction.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn plotting_states_cover_the_refrigerant_loop() {
    let mut hp = model("simple", "plotting");
    hp.run_model().unwrap();
    let states = hp.get_plotting_states().unwrap();
    assert!(!states.is_empty());
    let keys: Vec<&str> = states.iter().map(|(k, _)| k.as_str()).collect();
    let mut unique = keys.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), keys.len());
}

#[test]
fn cost_covers_compressor_and_heat_exchangers() {
    let mut hp = model("simple", "cost");
    hp.run_model().unwrap();
    let cost = hp.calc_cost(&CostSettings::default()).unwrap();
    assert!(cost.components.contains_key("comp"));
    assert!(cost.components.contains_key("evap"));
    assert!(cost.components.contains_key("cond"));
    assert!(cost.components.values().all(|c| c.is_finite() && *c > 0.0));
    assert_relative_eq!(cost.total, 6.32 * cost.equipment, max_relative = 1e-12);
}

#[test]
fn cost_before_design_is_rejected() {
    let hp = model("simple", "cost_early");
    assert!(matches!(
        hp.calc_cost(&CostSettings::default()),
        Err(ModelError::Configuration { .. })
    ));
}

fn violation(err: ModelError) -> (String, f64, f64) {
    match err {
        ModelError::ConstraintViolation {
            connection,
            value,
            limit,
            ..
        } => (connection, value, limit),
        other => panic!("unexpected error {other}"),
    }
}

fn critical_celsius(fluid: &str) -> f64 {
    to_celsius(ClausiusFluid::new().critical_point(fluid).unwrap().t)
}

#[test]
fn subcooled_valve_outlet_is_rejected() {
    let layout = Layout::parse("simple", None).unwrap();
    let outlet = ComponentDraft::from_layout(layout).wire().loops[0].valves[0]
        .outlet
        .clone();
    let mut hp = model_with("simple", "valve_subcooled", |e| {
        e.with_override(&outlet, StateVar::T, -150.0)
    });
    let (connection, value, limit) = violation(hp.run_model().unwrap_err());
    assert_eq!(connection, outlet);
    assert_eq!(value, -150.0);

    let state = hp.engine().connection_state(&outlet).unwrap();
    let t_sat = to_celsius(
        ClausiusFluid::new()
            .t_sat(&state.fluid, bar(state.p))
            .unwrap(),
    );
    assert_relative_eq!(limit, t_sat, max_relative = 1e-12);
}

#[test]
fn cascade_midpoint_above_critical_is_rejected() {
    init_tracing();
    let mut params = params_for("cascade");
    params.c3.t = 215.0;
    let eos: Arc<dyn EosService> = Arc::new(ClausiusFluid::new());
    let engine = ScriptedEngine::new(Arc::clone(&eos));
    let mut hp = HeatPump::new(params, eos, engine, work_dir("cascade_critical")).unwrap();
    let (connection, value, limit) = violation(hp.run_model().unwrap_err());
    assert_eq!(connection, "D0");
    assert_relative_eq!(value, cascade_mid_temperature(hp.params().b2.t, 215.0));
    assert_relative_eq!(limit, critical_celsius("R1234ZE(E)"));
    assert!(!hp.solved_design());
}

#[test]
fn cascade_condensation_above_critical_is_rejected() {
    let layout = Layout::parse("cascade", None).unwrap();
    let hot_out = ComponentDraft::from_layout(layout)
        .wire()
        .low_loop()
        .unwrap()
        .hot_out
        .clone();
    let mut hp = model_with("cascade", "cascade_condensation", |e| {
        e.with_override(&hot_out, StateVar::T, 150.0)
    });
    let (connection, value, limit) = violation(hp.run_model().unwrap_err());
    assert_eq!(connection, hot_out);
    assert_eq!(value, 150.0);
    assert_relative_eq!(limit, critical_celsius("R1234ZE(E)"));
}

#[test]
fn supercritical_intermediate_pressure_is_rejected() {
    let layout = Layout::parse("ic_trans", None).unwrap();
    let mid = ComponentDraft::from_layout(layout)
        .wire()
        .high_loop()
        .unwrap()
        .mid
        .clone()
        .unwrap();
    let mut hp = model_with("ic_trans", "trans_mid", |e| {
        e.with_override(&mid, StateVar::P, 100.0)
    });
    let (connection, value, limit) = violation(hp.run_model().unwrap_err());
    assert_eq!(connection, mid);
    assert_eq!(value, 100.0);
    let p_crit = to_bar(ClausiusFluid::new().critical_point("R744").unwrap().p);
    assert_relative_eq!(limit, p_crit);
}

#[test]
fn sink_return_above_sink_feed_is_rejected() {
    let mut hp = model_with("simple", "sink_order", |e| {
        e.with_override("C0", StateVar::T, 95.0)
    });
    let (connection, value, limit) = violation(hp.run_model().unwrap_err());
    assert_eq!(connection, "C0");
    assert_eq!(value, 95.0);
    assert_relative_eq!(limit, hp.params().c3.t);
}

#[test]
fn sink_feed_below_source_feed_is_rejected() {
    let mut hp = model_with("simple", "sink_below_source", |e| {
        e.with_override("C0", StateVar::T, 10.0)
            .with_override("C3", StateVar::T, 20.0)
    });
    let (connection, value, limit) = violation(hp.run_model().unwrap_err());
    assert_eq!(connection, "C3");
    assert_eq!(value, 20.0);
    assert_relative_eq!(limit, hp.params().b1.t);
}
