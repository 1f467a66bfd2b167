//! Scripted flowsheet engine.
//!
//! Resolves connection states from the assignments it was given plus a few
//! structural rules (pressure carries through everything but compressors,
//! pumps and valves; valves are isenthalpic; condensers and separators
//! leave saturated streams; compressors follow their isentropic efficiency).
//! Performance is a fixed fraction of the Carnot COP between the sink feed
//! (`C3`) and the source feed (`B1`); off design, the heat output scales
//! with the sink mass flow relative to the design snapshot.
//!
//! A variable released with [`Value::Free`] keeps the value of the previous
//! solution, the way a real solver starts from its last iterate.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hp_core::units::{bar, celsius, constants::ZERO_CELSIUS_K, k, to_celsius};
use hp_engine::{
    ComponentAttr, ComponentExergy, ComponentUpdate, ConnectionState, CurveProperty,
    EngineError, EngineResult, ExergyRequest, ExergyResults, FlowsheetEngine, ProcessCurve,
    SolveMode, SolveOptions, StateSpec, StateVar, Value,
};
use hp_fluids::{EosService, FluidError};
use hp_graph::{Bus, BusRole, ComponentKind};
use serde::{Deserialize, Serialize};

const WATER_CP: f64 = 4186.0;
const NOMINAL_LATENT_HEAT: f64 = 2.0e5;
const DEFAULT_INJECTION_SHARE: f64 = 0.2;
const DEFAULT_ETA_S: f64 = 0.8;
const DEFAULT_RESIDUAL: f64 = 1.0e-7;
const SNAPSHOT_FILE: &str = "state.json";

const SINK_FEED: &str = "C3";
const SINK_RETURN: &str = "C0";
const SOURCE_FEED: &str = "B1";
const SOURCE_RETURN: &str = "B2";

/// One call that crossed the engine boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    Reset,
    AddComponent {
        label: String,
        kind: ComponentKind,
    },
    AddConnection {
        label: String,
        source: String,
        source_port: String,
        target: String,
        target_port: String,
    },
    AddBus {
        label: String,
        role: BusRole,
        members: Vec<String>,
    },
    SetComponent {
        label: String,
        update: ComponentUpdate,
    },
    SetState {
        conn: String,
        spec: StateSpec,
    },
    Solve {
        mode: SolveMode,
        options: SolveOptions,
    },
    Save(PathBuf),
    Restore(PathBuf),
    Exergy,
}

/// What a failure predicate sees before a solve completes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OperatingPoint {
    pub mode: SolveMode,
    /// Sink mass flow relative to design (1 in design mode).
    pub load: f64,
    /// Sink feed temperature [°C].
    pub t_hot: f64,
    /// Source feed temperature [°C].
    pub t_cold: f64,
}

#[derive(Clone, Debug)]
struct ConnDef {
    label: String,
    source: String,
    source_port: u8,
    target: String,
    target_port: u8,
}

#[derive(Clone, Debug)]
struct BusDef {
    label: String,
    role: BusRole,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Snapshot {
    masses: BTreeMap<String, f64>,
    heat_output: f64,
}

#[derive(Clone, Debug)]
struct Solution {
    states: BTreeMap<String, ConnectionState>,
    heat_output: f64,
    power: f64,
    heat_input: f64,
    residual: f64,
}

type FailPredicate = Box<dyn Fn(&OperatingPoint) -> bool>;

/// Test double for [`FlowsheetEngine`].
pub struct ScriptedEngine {
    eos: Arc<dyn EosService>,
    carnot_fraction: f64,
    calls: Vec<EngineCall>,
    components: Vec<(String, ComponentKind)>,
    connections: Vec<ConnDef>,
    buses: Vec<BusDef>,
    comp_values: HashMap<String, BTreeMap<ComponentAttr, Value>>,
    specs: HashMap<String, StateSpec>,
    solution: Option<Solution>,
    residual_script: VecDeque<f64>,
    failing_solves: BTreeSet<usize>,
    fail_when: Option<FailPredicate>,
    overrides: Vec<(String, StateVar, f64)>,
    solve_count: usize,
}

impl ScriptedEngine {
    pub fn new(eos: Arc<dyn EosService>) -> Self {
        Self {
            eos,
            carnot_fraction: 0.55,
            calls: Vec::new(),
            components: Vec::new(),
            connections: Vec::new(),
            buses: Vec::new(),
            comp_values: HashMap::new(),
            specs: HashMap::new(),
            solution: None,
            residual_script: VecDeque::new(),
            failing_solves: BTreeSet::new(),
            fail_when: None,
            overrides: Vec::new(),
            solve_count: 0,
        }
    }

    /// Fraction of the Carnot COP the cycle reaches at full load.
    pub fn with_carnot_fraction(mut self, fraction: f64) -> Self {
        self.carnot_fraction = fraction;
        self
    }

    /// Residuals reported by the next solves, in order.
    pub fn with_residuals(mut self, residuals: impl IntoIterator<Item = f64>) -> Self {
        self.residual_script.extend(residuals);
        self
    }

    /// Make the solves with these (0-based) indices raise.
    pub fn fail_solves(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.failing_solves.extend(indices);
        self
    }

    /// Make every solve whose operating point matches `predicate` raise.
    pub fn fail_when(mut self, predicate: impl Fn(&OperatingPoint) -> bool + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Report `value` for `var` at `conn` after every solve, whatever the
    /// structural rules resolve. Lets a test put a converged state where
    /// the model must reject it.
    pub fn with_override(mut self, conn: &str, var: StateVar, value: f64) -> Self {
        self.overrides.push((conn.to_string(), var, value));
        self
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn solve_count(&self) -> usize {
        self.solve_count
    }

    /// Every spec sent to `conn`, oldest first.
    pub fn state_specs(&self, conn: &str) -> Vec<&StateSpec> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::SetState { conn: c, spec } if c == conn => Some(spec),
                _ => None,
            })
            .collect()
    }

    /// Current merged assignment of `var` at `conn`.
    pub fn assigned(&self, conn: &str, var: StateVar) -> Option<&Value> {
        self.specs.get(conn).and_then(|s| s.get(var))
    }

    /// Current merged assignment of a component attribute.
    pub fn component_assigned(&self, label: &str, attr: ComponentAttr) -> Option<&Value> {
        self.comp_values.get(label).and_then(|v| v.get(&attr))
    }

    pub fn component_labels(&self) -> Vec<&str> {
        self.components.iter().map(|(l, _)| l.as_str()).collect()
    }

    pub fn connection_labels(&self) -> Vec<&str> {
        self.connections.iter().map(|c| c.label.as_str()).collect()
    }

    fn kind_of(&self, label: &str) -> Option<ComponentKind> {
        self.components
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, kind)| *kind)
    }

    fn conn_index(&self, label: &str) -> Option<usize> {
        self.connections.iter().position(|c| c.label == label)
    }

    fn inlet(&self, comp: &str, port: u8) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| c.target == comp && c.target_port == port)
    }

    fn outlet(&self, comp: &str, port: u8) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| c.source == comp && c.source_port == port)
    }

    fn previous(&self, conn: &str) -> Option<&ConnectionState> {
        self.solution.as_ref().and_then(|s| s.states.get(conn))
    }

    /// Assignment in effect for a solve in `mode`.
    fn effective(&self, conn: &str, var: StateVar, mode: SolveMode) -> Option<Value> {
        let spec = self.specs.get(conn)?;
        let value = spec.get(var)?.clone();
        let released = match mode {
            SolveMode::Design => spec.offdesign.as_ref().is_some_and(|v| v.contains(&var)),
            SolveMode::Offdesign => spec.design.as_ref().is_some_and(|v| v.contains(&var)),
        };
        Some(if released { Value::Free } else { value })
    }

    fn eta_s(&self, comp: &str) -> f64 {
        self.comp_values
            .get(comp)
            .and_then(|v| v.get(&ComponentAttr::EtaS))
            .and_then(Value::as_fixed)
            .unwrap_or(DEFAULT_ETA_S)
    }

    /// Groups of connection indices that share a property across one component.
    fn port_groups(&self, comp: &str, kind: ComponentKind, pressure: bool) -> Vec<Vec<usize>> {
        if pressure
            && matches!(
                kind,
                ComponentKind::Compressor | ComponentKind::Pump | ComponentKind::Valve
            )
        {
            return Vec::new();
        }
        if kind.has_separate_sides() {
            return (1..=2)
                .map(|n| {
                    self.inlet(comp, n)
                        .into_iter()
                        .chain(self.outlet(comp, n))
                        .collect()
                })
                .collect();
        }
        let ports: Vec<usize> = (1..=kind.inlets())
            .filter_map(|n| self.inlet(comp, n))
            .chain((1..=kind.outlets()).filter_map(|n| self.outlet(comp, n)))
            .collect();
        vec![ports]
    }

    fn spread<T: Clone>(&self, values: &mut [Option<T>], pressure: bool) {
        loop {
            let mut changed = false;
            for (label, kind) in &self.components {
                for group in self.port_groups(label, *kind, pressure) {
                    let Some(known) = group.iter().find_map(|&i| values[i].clone()) else {
                        continue;
                    };
                    for &i in &group {
                        if values[i].is_none() {
                            values[i] = Some(known.clone());
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn resolve_fluids(&self) -> EngineResult<Vec<String>> {
        let mut fluids: Vec<Option<String>> = self
            .connections
            .iter()
            .map(|c| self.specs.get(&c.label).and_then(|s| s.fluid.clone()))
            .collect();
        self.spread(&mut fluids, false);
        fluids
            .into_iter()
            .zip(&self.connections)
            .map(|(fluid, conn)| {
                fluid.ok_or_else(|| EngineError::Solver {
                    message: format!("no fluid reaches connection {}", conn.label),
                })
            })
            .collect()
    }

    /// Resolve a `Fixed`, `Ref` or `Free` assignment of a scalar variable.
    fn seed_scalar(
        &self,
        mode: SolveMode,
        var: StateVar,
        read_prev: impl Fn(&ConnectionState) -> f64,
    ) -> Vec<Option<f64>> {
        let mut values: Vec<Option<f64>> = self
            .connections
            .iter()
            .map(|c| match self.effective(&c.label, var, mode) {
                Some(Value::Fixed(v)) => Some(v),
                Some(Value::Free) => self.previous(&c.label).map(&read_prev),
                _ => None,
            })
            .collect();
        for _ in 0..self.connections.len() {
            let mut changed = false;
            for (i, c) in self.connections.iter().enumerate() {
                if values[i].is_some() {
                    continue;
                }
                if let Some(Value::Ref { conn, factor, delta }) =
                    self.effective(&c.label, var, mode)
                    && let Some(j) = self.conn_index(&conn)
                    && let Some(base) = values[j]
                {
                    values[i] = Some(factor * base + delta);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        values
    }

    fn resolve_pressures(&self, mode: SolveMode) -> Vec<f64> {
        let mut p = self.seed_scalar(mode, StateVar::P, |s| s.p);
        self.spread(&mut p, true);
        p.into_iter().map(|v| v.unwrap_or(1.0)).collect()
    }

    /// Relative mass flows, tagged with the stream seed they descend from.
    fn relative_masses(&self) -> Vec<Option<(usize, f64)>> {
        let mut rel: Vec<Option<(usize, f64)>> = vec![None; self.connections.len()];
        for (label, kind) in &self.components {
            if matches!(kind, ComponentKind::CycleCloser | ComponentKind::Source)
                && let Some(out) = self.outlet(label, 1)
            {
                rel[out] = Some((out, 1.0));
            }
        }
        for _ in 0..=self.connections.len() {
            let mut changed = false;
            for (label, kind) in &self.components {
                let get = |port: u8, rel: &[Option<(usize, f64)>]| {
                    self.inlet(label, port).and_then(|i| rel[i])
                };
                let mut assign = |port: u8, value: (usize, f64), rel: &mut Vec<Option<(usize, f64)>>| {
                    if let Some(o) = self.outlet(label, port)
                        && rel[o].is_none()
                    {
                        rel[o] = Some(value);
                        changed = true;
                    }
                };
                match kind {
                    ComponentKind::Source | ComponentKind::Sink | ComponentKind::CycleCloser => {}
                    ComponentKind::Splitter | ComponentKind::DropletSeparator => {
                        if let Some((seed, m)) = get(1, &rel) {
                            let main = self.main_branch_factor(label);
                            assign(1, (seed, m * main), &mut rel);
                            assign(2, (seed, m * (1.0 - main)), &mut rel);
                        }
                    }
                    ComponentKind::Drum => {
                        if let (Some((seed, m1)), Some((_, m2))) = (get(1, &rel), get(2, &rel)) {
                            assign(1, (seed, m2), &mut rel);
                            assign(2, (seed, m1), &mut rel);
                        }
                    }
                    ComponentKind::Merge => {
                        if let (Some((seed, m1)), Some((_, m2))) = (get(1, &rel), get(2, &rel)) {
                            assign(1, (seed, m1 + m2), &mut rel);
                        }
                    }
                    ComponentKind::HeatExchanger | ComponentKind::Condenser => {
                        for port in 1..=2 {
                            if let Some(v) = get(port, &rel) {
                                assign(port, v, &mut rel);
                            }
                        }
                    }
                    _ => {
                        if let Some(v) = get(1, &rel) {
                            assign(1, v, &mut rel);
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
        rel
    }

    /// Share of a splitter's inlet that stays on outlet 1.
    fn main_branch_factor(&self, comp: &str) -> f64 {
        let inlet = self.inlet(comp, 1).map(|i| self.connections[i].label.as_str());
        self.outlet(comp, 1)
            .and_then(|o| self.specs.get(&self.connections[o].label))
            .and_then(|spec| spec.get(StateVar::M))
            .and_then(|value| match value {
                Value::Ref { conn, factor, .. } if Some(conn.as_str()) == inlet => Some(*factor),
                _ => None,
            })
            .unwrap_or(1.0 - DEFAULT_INJECTION_SHARE)
    }

    fn resolve_enthalpies(
        &self,
        mode: SolveMode,
        fluids: &[String],
        p: &[f64],
        rel: &[Option<(usize, f64)>],
    ) -> EngineResult<Vec<f64>> {
        let n = self.connections.len();
        let mut h: Vec<Option<f64>> = vec![None; n];
        for _ in 0..=n {
            let mut changed = false;
            for i in 0..n {
                if h[i].is_none()
                    && let Some(value) = self.try_enthalpy(i, mode, fluids, p, rel, &h)?
                {
                    h[i] = Some(value);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        h.into_iter()
            .enumerate()
            .map(|(i, v)| match v {
                Some(v) => Ok(v),
                None => {
                    let fluid = &fluids[i];
                    self.eos
                        .h_px(fluid, bar(p[i]), 1.0)
                        .or_else(|_| self.eos.h_pt(fluid, bar(p[i]), k(400.0)))
                        .map_err(solver_error)
                }
            })
            .collect()
    }

    fn try_enthalpy(
        &self,
        i: usize,
        mode: SolveMode,
        fluids: &[String],
        p: &[f64],
        rel: &[Option<(usize, f64)>],
        h: &[Option<f64>],
    ) -> EngineResult<Option<f64>> {
        let conn = &self.connections[i];
        let fluid = fluids[i].as_str();
        let pi = bar(p[i]);
        let eos = &self.eos;

        match self.effective(&conn.label, StateVar::H, mode) {
            Some(Value::Fixed(v)) => return Ok(Some(v)),
            Some(Value::Ref { conn: other, factor, delta }) => {
                let base = self.conn_index(&other).and_then(|j| h[j]);
                return Ok(base.map(|b| factor * b + delta));
            }
            Some(Value::Free) => {
                if let Some(prev) = self.previous(&conn.label) {
                    return Ok(Some(prev.h));
                }
            }
            None => {}
        }
        match self.effective(&conn.label, StateVar::T, mode) {
            Some(Value::Fixed(t)) => {
                return eos.h_pt(fluid, pi, celsius(t)).map(Some).map_err(solver_error);
            }
            Some(Value::Ref { conn: other, factor, delta }) => {
                let Some(j) = self.conn_index(&other) else {
                    return Ok(None);
                };
                let Some(hj) = h[j] else {
                    return Ok(None);
                };
                let tj = to_celsius(eos.t_ph(&fluids[j], bar(p[j]), hj).map_err(solver_error)?);
                let t = factor * tj + delta;
                return eos.h_pt(fluid, pi, celsius(t)).map(Some).map_err(solver_error);
            }
            Some(Value::Free) => {
                if let Some(prev) = self.previous(&conn.label) {
                    return Ok(Some(prev.h));
                }
            }
            None => {}
        }
        if let Some(Value::Fixed(x)) = self.effective(&conn.label, StateVar::X, mode) {
            return eos.h_px(fluid, pi, x).map(Some).map_err(solver_error);
        }
        if let Some(Value::Fixed(td)) = self.effective(&conn.label, StateVar::TdBp, mode) {
            let t_sat = eos.t_sat(fluid, pi).map_err(solver_error)?;
            let t = k(t_sat.value + td);
            return eos.h_pt(fluid, pi, t).map(Some).map_err(solver_error);
        }
        self.structural_enthalpy(i, fluid, p, rel, h)
    }

    fn structural_enthalpy(
        &self,
        i: usize,
        fluid: &str,
        p: &[f64],
        rel: &[Option<(usize, f64)>],
        h: &[Option<f64>],
    ) -> EngineResult<Option<f64>> {
        let conn = &self.connections[i];
        let Some(kind) = self.kind_of(&conn.source) else {
            return Ok(None);
        };
        let comp = conn.source.as_str();
        let port = conn.source_port;
        let pi = bar(p[i]);
        let inlet_h = |n: u8| self.inlet(comp, n).and_then(|j| h[j].map(|v| (j, v)));
        let eos = &self.eos;

        let value = match kind {
            ComponentKind::Compressor | ComponentKind::Pump => {
                let Some((j, h_in)) = inlet_h(1) else {
                    return Ok(None);
                };
                let s_in = eos.s_ph(fluid, bar(p[j]), h_in).map_err(solver_error)?;
                let h_is = eos.h_ps(fluid, pi, s_in).map_err(solver_error)?;
                h_in + (h_is - h_in) / self.eta_s(comp)
            }
            ComponentKind::Valve | ComponentKind::CycleCloser | ComponentKind::Splitter => {
                match inlet_h(1) {
                    Some((_, v)) => v,
                    None => return Ok(None),
                }
            }
            ComponentKind::Condenser if port == 1 => {
                eos.h_px(fluid, pi, 0.0).map_err(solver_error)?
            }
            ComponentKind::DropletSeparator | ComponentKind::Drum => {
                let x = if port == 1 { 0.0 } else { 1.0 };
                eos.h_px(fluid, pi, x).map_err(solver_error)?
            }
            ComponentKind::Merge => {
                let (Some((j1, h1)), Some((j2, h2))) = (inlet_h(1), inlet_h(2)) else {
                    return Ok(None);
                };
                let m1 = rel[j1].map_or(1.0, |(_, m)| m);
                let m2 = rel[j2].map_or(1.0, |(_, m)| m);
                (m1 * h1 + m2 * h2) / (m1 + m2)
            }
            _ => match inlet_h(port) {
                Some((_, v)) => v,
                None => return Ok(None),
            },
        };
        Ok(Some(value))
    }

    fn build_state(&self, fluid: &str, m: f64, p: f64, h: f64) -> EngineResult<ConnectionState> {
        let eos = &self.eos;
        let pb = bar(p);
        let t = eos.t_ph(fluid, pb, h).map_err(solver_error)?;
        let s = eos.s_ph(fluid, pb, h).map_err(solver_error)?;
        let rho = eos.rho_ph(fluid, pb, h).map_err(solver_error)?;
        let x = match (eos.h_px(fluid, pb, 0.0), eos.h_px(fluid, pb, 1.0)) {
            (Ok(hl), Ok(hv)) if h >= hl && h <= hv => (h - hl) / (hv - hl),
            _ => f64::NAN,
        };
        Ok(ConnectionState {
            m,
            p,
            h,
            t: to_celsius(t),
            s,
            x,
            v: 1.0 / rho.value,
            fluid: fluid.to_string(),
        })
    }

    fn fixed_heat_duty(&self) -> Option<f64> {
        self.comp_values
            .values()
            .find_map(|v| v.get(&ComponentAttr::Q).and_then(Value::as_fixed))
    }

    fn fixed_mass(&self, conn: &str, mode: SolveMode) -> Option<f64> {
        self.effective(conn, StateVar::M, mode)
            .and_then(|v| v.as_fixed())
    }

    fn run_solve(&mut self, mode: SolveMode, options: &SolveOptions) -> EngineResult<Solution> {
        let fluids = self.resolve_fluids()?;
        let p = self.resolve_pressures(mode);
        let rel = self.relative_masses();
        let h = self.resolve_enthalpies(mode, &fluids, &p, &rel)?;

        let temperature = |label: &str| -> EngineResult<f64> {
            let i = self.conn_index(label).ok_or_else(|| EngineError::Solver {
                message: format!("scripted engine needs connection {label}"),
            })?;
            let t = self.eos.t_ph(&fluids[i], bar(p[i]), h[i]).map_err(solver_error)?;
            Ok(to_celsius(t))
        };
        let t_hot = temperature(SINK_FEED)?;
        let t_cold = temperature(SOURCE_FEED)?;

        let (q_design, load) = match mode {
            SolveMode::Design => {
                let q = self.fixed_heat_duty().ok_or_else(|| EngineError::Solver {
                    message: "no heat duty fixed for a design solve".into(),
                })?;
                (q.abs(), 1.0)
            }
            SolveMode::Offdesign => {
                let path = options.design_path.as_ref().ok_or_else(|| EngineError::Solver {
                    message: "off-design solve needs a design snapshot".into(),
                })?;
                let design = read_snapshot(path)?;
                let m_design = design.masses.get(SINK_FEED).copied().unwrap_or(1.0);
                let load = self
                    .fixed_mass(SINK_FEED, mode)
                    .map_or(1.0, |m| m / m_design);
                (design.heat_output, load)
            }
        };

        let point = OperatingPoint {
            mode,
            load,
            t_hot,
            t_cold,
        };
        if self.fail_when.as_ref().is_some_and(|f| f(&point)) {
            return Err(EngineError::Solver {
                message: format!("scripted failure at {point:?}"),
            });
        }

        let lift = t_hot - t_cold;
        if lift <= 0.5 {
            return Err(EngineError::Solver {
                message: format!("temperature lift {lift} K too small"),
            });
        }
        let cop = self.carnot_fraction * (t_hot + ZERO_CELSIUS_K) / lift;
        let heat_output = q_design * load;
        let power = heat_output / cop * (1.0 + 0.05 * (1.0 - load));
        let heat_input = heat_output - power;

        // Scale relative flows per stream.
        let mut scale: HashMap<usize, f64> = HashMap::new();
        for (i, conn) in self.connections.iter().enumerate() {
            let Some((seed, r)) = rel[i] else { continue };
            if let Some(m) = self.fixed_mass(&conn.label, mode) {
                scale.entry(seed).or_insert(m / r);
            }
        }
        let sink_dt = temperature(SINK_RETURN).map_or(10.0, |t_ret| (t_hot - t_ret).max(1.0));
        let source_dt = temperature(SOURCE_RETURN).map_or(10.0, |t_ret| (t_cold - t_ret).max(1.0));
        for (i, conn) in self.connections.iter().enumerate() {
            let Some((seed, r)) = rel[i] else { continue };
            let base = match conn.label.as_str() {
                SINK_FEED => heat_output / (WATER_CP * sink_dt) / r,
                SOURCE_FEED => heat_input / (WATER_CP * source_dt) / r,
                _ => continue,
            };
            scale.entry(seed).or_insert(base);
        }

        let mut states = BTreeMap::new();
        for (i, conn) in self.connections.iter().enumerate() {
            let m = match rel[i] {
                Some((seed, r)) => r * scale.get(&seed).copied().unwrap_or(heat_output / NOMINAL_LATENT_HEAT),
                None => f64::NAN,
            };
            states.insert(conn.label.clone(), self.build_state(&fluids[i], m, p[i], h[i])?);
        }

        let residual = self.residual_script.pop_front().unwrap_or(DEFAULT_RESIDUAL);
        Ok(Solution {
            states,
            heat_output,
            power,
            heat_input,
            residual,
        })
    }

    fn solution(&self) -> EngineResult<&Solution> {
        self.solution.as_ref().ok_or_else(|| EngineError::Solver {
            message: "network has not been solved".into(),
        })
    }

    fn side_states(&self, label: &str, side: u8) -> EngineResult<(&ConnectionState, &ConnectionState)> {
        let solution = self.solution()?;
        let lookup = |idx: Option<usize>| {
            idx.and_then(|i| solution.states.get(&self.connections[i].label))
                .ok_or_else(|| EngineError::UnknownLabel {
                    what: "component side",
                    label: format!("{label}:{side}"),
                })
        };
        Ok((lookup(self.inlet(label, side))?, lookup(self.outlet(label, side))?))
    }
}

fn solver_error(err: FluidError) -> EngineError {
    EngineError::Solver {
        message: err.to_string(),
    }
}

fn parse_port(name: &str, prefix: &str) -> EngineResult<u8> {
    name.strip_prefix(prefix)
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| *n >= 1)
        .ok_or_else(|| EngineError::Unsupported {
            what: format!("port name '{name}'"),
        })
}

fn read_snapshot(path: &Path) -> EngineResult<Snapshot> {
    let text = fs::read_to_string(path.join(SNAPSHOT_FILE))?;
    serde_json::from_str(&text).map_err(|e| EngineError::Snapshot {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn override_state(state: &mut ConnectionState, var: StateVar, value: f64) {
    match var {
        StateVar::M => state.m = value,
        StateVar::P => state.p = value,
        StateVar::H => state.h = value,
        StateVar::T => state.t = value,
        StateVar::X => state.x = value,
        StateVar::V => state.v = value,
        StateVar::TdBp => {}
    }
}

fn kind_weight(kind: ComponentKind) -> f64 {
    match kind {
        ComponentKind::Compressor => 3.0,
        ComponentKind::Valve => 2.0,
        ComponentKind::HeatExchanger | ComponentKind::Condenser => 2.0,
        ComponentKind::Pump | ComponentKind::SimpleHeatExchanger => 0.5,
        _ => 0.0,
    }
}

impl FlowsheetEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn reset(&mut self) {
        self.calls.push(EngineCall::Reset);
        self.components.clear();
        self.connections.clear();
        self.buses.clear();
        self.comp_values.clear();
        self.specs.clear();
        self.solution = None;
    }

    fn add_component(&mut self, label: &str, kind: ComponentKind) -> EngineResult<()> {
        self.calls.push(EngineCall::AddComponent {
            label: label.to_string(),
            kind,
        });
        if self.kind_of(label).is_some() {
            return Err(EngineError::Unsupported {
                what: format!("duplicate component label '{label}'"),
            });
        }
        self.components.push((label.to_string(), kind));
        Ok(())
    }

    fn add_connection(
        &mut self,
        label: &str,
        source: &str,
        source_port: &str,
        target: &str,
        target_port: &str,
    ) -> EngineResult<()> {
        self.calls.push(EngineCall::AddConnection {
            label: label.to_string(),
            source: source.to_string(),
            source_port: source_port.to_string(),
            target: target.to_string(),
            target_port: target_port.to_string(),
        });
        for comp in [source, target] {
            if self.kind_of(comp).is_none() {
                return Err(EngineError::UnknownLabel {
                    what: "component",
                    label: comp.to_string(),
                });
            }
        }
        self.connections.push(ConnDef {
            label: label.to_string(),
            source: source.to_string(),
            source_port: parse_port(source_port, "out")?,
            target: target.to_string(),
            target_port: parse_port(target_port, "in")?,
        });
        Ok(())
    }

    fn add_bus(&mut self, bus: &Bus, members: &[String]) -> EngineResult<()> {
        self.calls.push(EngineCall::AddBus {
            label: bus.label.clone(),
            role: bus.role,
            members: members.to_vec(),
        });
        self.buses.push(BusDef {
            label: bus.label.clone(),
            role: bus.role,
        });
        Ok(())
    }

    fn set_component(&mut self, label: &str, update: &ComponentUpdate) -> EngineResult<()> {
        self.calls.push(EngineCall::SetComponent {
            label: label.to_string(),
            update: update.clone(),
        });
        if self.kind_of(label).is_none() {
            return Err(EngineError::UnknownLabel {
                what: "component",
                label: label.to_string(),
            });
        }
        let values = self.comp_values.entry(label.to_string()).or_default();
        for (attr, value) in &update.values {
            values.insert(*attr, value.clone());
        }
        Ok(())
    }

    fn set_state(&mut self, conn: &str, spec: &StateSpec) -> EngineResult<()> {
        self.calls.push(EngineCall::SetState {
            conn: conn.to_string(),
            spec: spec.clone(),
        });
        if self.conn_index(conn).is_none() {
            return Err(EngineError::UnknownLabel {
                what: "connection",
                label: conn.to_string(),
            });
        }
        let merged = self.specs.entry(conn.to_string()).or_default();
        for (var, value) in &spec.values {
            merged.values.insert(*var, value.clone());
        }
        if spec.fluid.is_some() {
            merged.fluid = spec.fluid.clone();
        }
        if spec.design.is_some() {
            merged.design = spec.design.clone();
        }
        if spec.offdesign.is_some() {
            merged.offdesign = spec.offdesign.clone();
        }
        Ok(())
    }

    fn solve(&mut self, mode: SolveMode, options: &SolveOptions) -> EngineResult<()> {
        let index = self.solve_count;
        self.solve_count += 1;
        self.calls.push(EngineCall::Solve {
            mode,
            options: options.clone(),
        });
        if self.failing_solves.contains(&index) {
            return Err(EngineError::Solver {
                message: format!("scripted failure at solve {index}"),
            });
        }
        let mut solution = self.run_solve(mode, options)?;
        for (conn, var, value) in &self.overrides {
            if let Some(state) = solution.states.get_mut(conn) {
                override_state(state, *var, *value);
            }
        }
        tracing::debug!(
            solve = index,
            mode = mode.as_str(),
            residual = solution.residual,
            heat_output = solution.heat_output,
            power = solution.power,
            "scripted solve"
        );
        self.solution = Some(solution);
        Ok(())
    }

    fn residual(&self) -> Option<f64> {
        self.solution.as_ref().map(|s| s.residual)
    }

    fn save(&mut self, path: &Path) -> EngineResult<()> {
        self.calls.push(EngineCall::Save(path.to_path_buf()));
        let solution = self.solution.as_ref().ok_or_else(|| EngineError::Snapshot {
            path: path.to_path_buf(),
            message: "nothing solved to save".into(),
        })?;
        let snapshot = Snapshot {
            masses: solution
                .states
                .iter()
                .map(|(label, state)| (label.clone(), state.m))
                .collect(),
            heat_output: solution.heat_output,
        };
        let text = serde_json::to_string_pretty(&snapshot).map_err(|e| EngineError::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::create_dir_all(path)?;
        fs::write(path.join(SNAPSHOT_FILE), text)?;
        Ok(())
    }

    fn restore(&mut self, path: &Path) -> EngineResult<()> {
        self.calls.push(EngineCall::Restore(path.to_path_buf()));
        let snapshot = read_snapshot(path)?;
        // Released masses start from the snapshot, not the last cell.
        if let Some(solution) = self.solution.as_mut() {
            for (label, m) in snapshot.masses {
                if let Some(state) = solution.states.get_mut(&label) {
                    state.m = m;
                }
            }
            solution.heat_output = snapshot.heat_output;
        }
        Ok(())
    }

    fn connection_state(&self, conn: &str) -> EngineResult<ConnectionState> {
        self.solution()?
            .states
            .get(conn)
            .cloned()
            .ok_or_else(|| EngineError::UnknownLabel {
                what: "connection",
                label: conn.to_string(),
            })
    }

    fn bus_power(&self, bus: &str) -> EngineResult<f64> {
        let solution = self.solution()?;
        let def = self
            .buses
            .iter()
            .find(|b| b.label == bus)
            .ok_or_else(|| EngineError::UnknownLabel {
                what: "bus",
                label: bus.to_string(),
            })?;
        Ok(match def.role {
            BusRole::PowerInput => solution.power,
            BusRole::HeatInput => solution.heat_input,
            BusRole::HeatOutput => -solution.heat_output,
        })
    }

    fn component_value(&self, label: &str, attr: ComponentAttr) -> EngineResult<f64> {
        let kind = self.kind_of(label).ok_or_else(|| EngineError::UnknownLabel {
            what: "component",
            label: label.to_string(),
        })?;
        if let Some(v) = self
            .comp_values
            .get(label)
            .and_then(|v| v.get(&attr))
            .and_then(Value::as_fixed)
        {
            return Ok(v);
        }
        let unsupported = || EngineError::Unsupported {
            what: format!("{attr:?} of {kind} '{label}'"),
        };
        match (attr, kind) {
            (ComponentAttr::EtaS, ComponentKind::Compressor | ComponentKind::Pump) => {
                Ok(self.eta_s(label))
            }
            (ComponentAttr::P, ComponentKind::Compressor | ComponentKind::Pump) => {
                let (i, o) = self.side_states(label, 1)?;
                Ok(i.m * (o.h - i.h))
            }
            (ComponentAttr::Q, ComponentKind::SimpleHeatExchanger)
            | (ComponentAttr::Q, ComponentKind::HeatExchanger | ComponentKind::Condenser) => {
                let (i, o) = self.side_states(label, 1)?;
                Ok(i.m * (o.h - i.h))
            }
            (ComponentAttr::TtdU, ComponentKind::HeatExchanger | ComponentKind::Condenser) => {
                let (hot_in, _) = self.side_states(label, 1)?;
                let (_, cold_out) = self.side_states(label, 2)?;
                Ok(hot_in.t - cold_out.t)
            }
            (ComponentAttr::TtdL, ComponentKind::HeatExchanger | ComponentKind::Condenser) => {
                let (_, hot_out) = self.side_states(label, 1)?;
                let (cold_in, _) = self.side_states(label, 2)?;
                Ok(hot_out.t - cold_in.t)
            }
            (ComponentAttr::KA, ComponentKind::HeatExchanger | ComponentKind::Condenser) => {
                let (hot_in, hot_out) = self.side_states(label, 1)?;
                let (cold_in, cold_out) = self.side_states(label, 2)?;
                let q = (hot_in.m * (hot_in.h - hot_out.h)).abs();
                let dt = 0.5 * ((hot_in.t - cold_out.t).abs() + (hot_out.t - cold_in.t).abs());
                Ok(q / dt.max(1.0))
            }
            _ => Err(unsupported()),
        }
    }

    fn sample_curve(&self, label: &str, side: u8) -> EngineResult<ProcessCurve> {
        let kind = self.kind_of(label).ok_or_else(|| EngineError::UnknownLabel {
            what: "component",
            label: label.to_string(),
        })?;
        let (i, o) = self.side_states(label, side)?;
        let curve = match kind {
            ComponentKind::Compressor | ComponentKind::Pump => ProcessCurve {
                isoline: CurveProperty::S,
                isoline_value: i.s,
                isoline_value_end: o.s,
                start: CurveProperty::P,
                starting_point_value: i.p,
                ending_point_value: o.p,
            },
            ComponentKind::Valve => ProcessCurve {
                isoline: CurveProperty::H,
                isoline_value: i.h,
                isoline_value_end: o.h,
                start: CurveProperty::P,
                starting_point_value: i.p,
                ending_point_value: o.p,
            },
            ComponentKind::HeatExchanger
            | ComponentKind::Condenser
            | ComponentKind::SimpleHeatExchanger => ProcessCurve {
                isoline: CurveProperty::P,
                isoline_value: i.p,
                isoline_value_end: o.p,
                start: CurveProperty::H,
                starting_point_value: i.h,
                ending_point_value: o.h,
            },
            _ => {
                return Err(EngineError::Unsupported {
                    what: format!("process curve of {kind} '{label}'"),
                });
            }
        };
        Ok(curve)
    }

    fn exergy(&mut self, request: &ExergyRequest) -> EngineResult<ExergyResults> {
        self.calls.push(EngineCall::Exergy);
        let solution = self.solution()?;
        let state_t = |label: &str| {
            solution
                .states
                .get(label)
                .map(|s| s.t + ZERO_CELSIUS_K)
                .ok_or_else(|| EngineError::UnknownLabel {
                    what: "connection",
                    label: label.to_string(),
                })
        };
        let t0 = request.t_amb + ZERO_CELSIUS_K;
        let t_sink = 0.5 * (state_t(SINK_FEED)? + state_t(SINK_RETURN)?);
        let t_source = 0.5 * (state_t(SOURCE_FEED)? + state_t(SOURCE_RETURN)?);

        let e_p = solution.heat_output * (1.0 - t0 / t_sink);
        let e_source = (solution.heat_input * (1.0 - t0 / t_source)).max(0.0);
        let e_f = solution.power + e_source;
        let e_d = (e_f - e_p).max(0.0);

        let total_weight: f64 = self.components.iter().map(|(_, k)| kind_weight(*k)).sum();
        let components = self
            .components
            .iter()
            .filter(|(_, kind)| kind_weight(*kind) > 0.0)
            .map(|(label, kind)| {
                let e_d_c = e_d * kind_weight(*kind) / total_weight;
                ComponentExergy {
                    label: label.clone(),
                    group: kind.to_string(),
                    e_f: 2.0 * e_d_c,
                    e_p: e_d_c,
                    e_d: e_d_c,
                    epsilon: 0.5,
                }
            })
            .collect();

        Ok(ExergyResults {
            epsilon: e_p / e_f,
            e_f,
            e_p,
            e_d,
            e_l: 0.0,
            components,
        })
    }
}
