//! The heat pump cycle model and its design driver.

use std::path::PathBuf;
use std::sync::Arc;

use hp_core::units::{bar, to_bar, to_celsius};
use hp_econ::{CostBreakdown, CostSettings};
use hp_engine::{ConnectionState, ExergyRequest, FlowsheetEngine, SolveMode, SolveOptions};
use hp_fluids::EosService;
use hp_graph::Graph;
use hp_project::Params;
use hp_results::{ArtifactStore, OperatingMap};
use serde::Serialize;

use crate::error::{ModelError, ModelResult};
use crate::exergy::ExergyReport;
use crate::levels::{BoundaryTemps, PressureLevels, pressure_levels, working_fluids};
use crate::network::{
    BUS_HEAT_IN, BUS_HEAT_OUT, BUS_POWER, ComponentDraft, Network, REFERENCE_FLOW, SINK_FEED,
    SINK_RETURN, SOURCE_FEED,
};
use crate::parameterize::{Parameterizer, apply};
use crate::topology::Layout;

/// A design phase counts as converged below this residual.
pub const RESIDUAL_LIMIT: f64 = 1e-3;
/// Tolerance of the post-expansion saturation check [K].
const SATURATION_SLACK: f64 = 1e-3;
/// Lowest source return temperature off design [°C].
const SOURCE_RETURN_MIN: f64 = 2.0;

/// Bus powers of the converged design.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DesignPoint {
    pub cop: f64,
    /// Heat delivered to the consumer [W], positive.
    pub heat_output: f64,
    /// Electrical input [W].
    pub power: f64,
    pub residual: f64,
}

/// Converged state of one connection, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionRow {
    pub label: String,
    #[serde(flatten)]
    pub state: ConnectionState,
}

/// One heat pump: topology, parameters, engine and persisted artifacts.
///
/// The engine is owned exclusively; nothing else may drive it while the
/// model lives.
pub struct HeatPump<E: FlowsheetEngine> {
    params: Arc<Params>,
    eos: Arc<dyn EosService>,
    engine: E,
    store: ArtifactStore,
    layout: Layout,
    subdirname: String,
    fluids: Vec<String>,
    draft: Option<ComponentDraft>,
    network: Option<Network>,
    graph: Option<Graph>,
    levels: Option<PressureLevels>,
    solved_design: bool,
    m_design: Option<f64>,
    design: Option<DesignPoint>,
    exergy: Option<ExergyReport>,
    pub(crate) partload: Option<OperatingMap>,
    pub(crate) partload_char: Option<OperatingMap>,
}

impl<E: FlowsheetEngine> HeatPump<E> {
    /// Read the topology from `params` and create the artifact directories
    /// under `work_dir`.
    pub fn new(
        params: impl Into<Arc<Params>>,
        eos: Arc<dyn EosService>,
        engine: E,
        work_dir: impl Into<PathBuf>,
    ) -> ModelResult<Self> {
        let params = params.into();
        let layout = Layout::parse(&params.setup.kind, params.setup.econ)?;
        let fluids = working_fluids(&params, &layout)?;
        let subdirname = params.subdirname()?;
        let store = ArtifactStore::new(work_dir.into())?;
        tracing::info!(
            topology = %layout,
            fluids = ?fluids,
            engine = engine.name(),
            "heat pump created"
        );
        Ok(Self {
            params,
            eos,
            engine,
            store,
            layout,
            subdirname,
            fluids,
            draft: None,
            network: None,
            graph: None,
            levels: None,
            solved_design: false,
            m_design: None,
            design: None,
            exergy: None,
            partload: None,
            partload_char: None,
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn subdirname(&self) -> &str {
        &self.subdirname
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn eos(&self) -> &dyn EosService {
        self.eos.as_ref()
    }

    pub fn fluids(&self) -> &[String] {
        &self.fluids
    }

    pub fn network(&self) -> Option<&Network> {
        self.network.as_ref()
    }

    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    /// Design pressure levels, once initialized.
    pub fn levels(&self) -> Option<&PressureLevels> {
        self.levels.as_ref()
    }

    pub fn solved_design(&self) -> bool {
        self.solved_design
    }

    /// Sink mass flow of the converged design [kg/s].
    pub fn m_design(&self) -> Option<f64> {
        self.m_design
    }

    pub fn design_point(&self) -> Option<&DesignPoint> {
        self.design.as_ref()
    }

    pub fn cop(&self) -> Option<f64> {
        self.design.map(|d| d.cop)
    }

    pub fn epsilon(&self) -> Option<f64> {
        self.exergy.as_ref().map(ExergyReport::epsilon)
    }

    pub fn exergy_report(&self) -> Option<&ExergyReport> {
        self.exergy.as_ref()
    }

    /// Operating map of the last sweep.
    pub fn partload(&self) -> Option<&OperatingMap> {
        self.partload.as_ref()
    }

    pub fn design_path(&self) -> PathBuf {
        self.store.design_path(&self.subdirname)
    }

    pub fn init_path(&self) -> PathBuf {
        self.store.init_path(&self.subdirname)
    }

    pub(crate) fn require_network(&self) -> ModelResult<&Network> {
        self.network
            .as_ref()
            .ok_or_else(|| ModelError::configuration("network not generated"))
    }

    pub(crate) fn require_graph(&self) -> ModelResult<&Graph> {
        self.graph
            .as_ref()
            .ok_or_else(|| ModelError::configuration("network not generated"))
    }

    fn require_levels(&self) -> ModelResult<PressureLevels> {
        self.levels
            .ok_or_else(|| ModelError::configuration("pressure levels not computed"))
    }

    /// Run the full design protocol.
    pub fn run_model(&mut self) -> ModelResult<()> {
        self.generate_components()?;
        self.generate_connections()?;
        self.init_simulation()?;
        self.design_simulation()?;
        self.check_consistency()?;
        self.perform_exergy_analysis()?;
        Ok(())
    }

    /// Lay out the components with their stable labels.
    pub fn generate_components(&mut self) -> ModelResult<()> {
        let draft = ComponentDraft::from_layout(self.layout);
        tracing::debug!(
            topology = %self.layout,
            components = draft.components.len(),
            "components generated"
        );
        self.draft = Some(draft);
        self.network = None;
        self.graph = None;
        self.solved_design = false;
        self.design = None;
        self.exergy = None;
        Ok(())
    }

    /// Wire the components, validate the graph and register it with the
    /// engine.
    pub fn generate_connections(&mut self) -> ModelResult<()> {
        let draft = self
            .draft
            .take()
            .ok_or_else(|| ModelError::configuration("components not generated"))?;
        let network = draft.wire();
        let graph = network.build_graph()?;
        self.engine.reset();
        self.engine.add_graph(&graph)?;
        tracing::debug!(
            components = graph.components().len(),
            connections = graph.connections().len(),
            buses = graph.buses().len(),
            "network registered"
        );
        self.network = Some(network);
        self.graph = Some(graph);
        Ok(())
    }

    /// Pressure levels for the given boundary temperatures.
    pub fn get_pressure_levels(&self, temps: BoundaryTemps) -> ModelResult<PressureLevels> {
        pressure_levels(self.eos.as_ref(), &self.params, &self.layout, temps)
    }

    pub(crate) fn parameterizer(&self) -> ModelResult<Parameterizer<'_>> {
        Ok(Parameterizer {
            params: &self.params,
            network: self.require_network()?,
            fluids: &self.fluids,
            eos: self.eos.as_ref(),
        })
    }

    /// Impose starting values and solve once in design mode.
    pub fn init_simulation(&mut self) -> ModelResult<()> {
        let levels = self.get_pressure_levels(BoundaryTemps::design(&self.params))?;
        let steps = self.parameterizer()?.init(&levels)?;
        apply(&mut self.engine, &steps)?;
        self.levels = Some(levels);

        self.engine.solve(SolveMode::Design, &SolveOptions::default())?;
        let residual = self.checked_residual("init")?;
        tracing::info!(residual, "initialization converged");
        Ok(())
    }

    /// Replace the starting values by the design constraints, solve and
    /// persist the converged state.
    pub fn design_simulation(&mut self) -> ModelResult<()> {
        self.solved_design = false;
        let levels = self.require_levels()?;
        let steps = self.parameterizer()?.design(&levels)?;
        apply(&mut self.engine, &steps)?;

        self.engine.solve(SolveMode::Design, &SolveOptions::default())?;
        let residual = self.checked_residual("design")?;

        let path = self.design_path();
        self.engine.save(&path)?;
        self.solved_design = true;
        self.m_design = Some(self.engine.connection_state(REFERENCE_FLOW)?.m);

        let power = self.engine.bus_power(BUS_POWER)?;
        let heat_output = self.engine.bus_power(BUS_HEAT_OUT)?.abs();
        let point = DesignPoint {
            cop: heat_output / power,
            heat_output,
            power,
            residual,
        };
        tracing::info!(
            cop = point.cop,
            heat_output = point.heat_output,
            power = point.power,
            residual,
            snapshot = %path.display(),
            "design converged"
        );
        self.design = Some(point);
        Ok(())
    }

    fn checked_residual(&self, phase: &'static str) -> ModelResult<f64> {
        let residual = self.engine.residual().unwrap_or(f64::NAN);
        if residual < RESIDUAL_LIMIT {
            Ok(residual)
        } else {
            tracing::warn!(phase, residual, "design phase did not converge");
            Err(ModelError::DesignUnconverged { phase, residual })
        }
    }

    /// Verify the invariants of the converged design.
    pub fn check_consistency(&self) -> ModelResult<()> {
        let network = self.require_network()?;

        for plan in &network.loops {
            for valve in &plan.valves {
                let out = self.engine.connection_state(&valve.outlet)?;
                let crit = self.eos.critical_point(&out.fluid)?;
                if out.p >= to_bar(crit.p) || out.t >= to_celsius(crit.t) {
                    continue;
                }
                let t_sat = to_celsius(self.eos.t_sat(&out.fluid, bar(out.p))?);
                if out.t < t_sat - SATURATION_SLACK {
                    return Err(ModelError::ConstraintViolation {
                        connection: valve.outlet.clone(),
                        what: "temperature below saturation after expansion".into(),
                        value: out.t,
                        limit: t_sat,
                    });
                }
            }
        }

        if self.layout.is_cascade()
            && let Some(low) = network.low_loop()
        {
            let state = self.engine.connection_state(&low.hot_out)?;
            let t_crit = to_celsius(self.eos.critical_point(&state.fluid)?.t);
            if state.t >= t_crit {
                return Err(ModelError::ConstraintViolation {
                    connection: low.hot_out.clone(),
                    what: format!("cascade condensation at or above the critical temperature of {}", state.fluid),
                    value: state.t,
                    limit: t_crit,
                });
            }
        }

        if self.layout.is_transcritical()
            && let Some(mid) = network.high_loop().and_then(|l| l.mid.as_ref())
        {
            let state = self.engine.connection_state(mid)?;
            let p_crit = to_bar(self.eos.critical_point(&state.fluid)?.p);
            if state.p >= p_crit {
                return Err(ModelError::ConstraintViolation {
                    connection: mid.clone(),
                    what: format!("intermediate pressure at or above the critical pressure of {}", state.fluid),
                    value: state.p,
                    limit: p_crit,
                });
            }
        }

        let sink_return = self.engine.connection_state(SINK_RETURN)?;
        let sink_feed = self.engine.connection_state(SINK_FEED)?;
        let source_feed = self.engine.connection_state(SOURCE_FEED)?;
        if sink_return.t >= sink_feed.t {
            return Err(ModelError::ConstraintViolation {
                connection: SINK_RETURN.into(),
                what: "sink return not below sink feed".into(),
                value: sink_return.t,
                limit: sink_feed.t,
            });
        }
        if sink_feed.t <= source_feed.t {
            return Err(ModelError::ConstraintViolation {
                connection: SINK_FEED.into(),
                what: "sink feed not above source feed".into(),
                value: sink_feed.t,
                limit: source_feed.t,
            });
        }
        tracing::debug!("design state consistent");
        Ok(())
    }

    pub(crate) fn exergy_request(&self) -> ModelResult<ExergyRequest> {
        let ambient = &self.params.ambient;
        let p_amb = ambient
            .p
            .ok_or_else(|| ModelError::configuration("missing parameter 'ambient.p'"))?;
        Ok(ExergyRequest {
            fuel: vec![BUS_POWER.into(), BUS_HEAT_IN.into()],
            product: vec![BUS_HEAT_OUT.into()],
            loss: Vec::new(),
            p_amb,
            t_amb: ambient.t,
        })
    }

    /// Exergy balance of the converged design.
    pub fn perform_exergy_analysis(&mut self) -> ModelResult<&ExergyReport> {
        let request = self.exergy_request()?;
        let results = self.engine.exergy(&request)?;
        let power_input = self.engine.bus_power(BUS_POWER)?;
        tracing::info!(
            epsilon = results.epsilon,
            e_f = results.e_f,
            e_p = results.e_p,
            e_d = results.e_d,
            "exergy analysis"
        );
        Ok(self.exergy.insert(ExergyReport::new(results, power_input)))
    }

    /// Re-impose intermediate pressures for a new pair of feed temperatures.
    /// Does nothing for single-stage, single-loop topologies.
    pub fn intermediate_states_offdesign(
        &mut self,
        t_hs_ff: f64,
        t_cons_ff: f64,
        dt_hs: f64,
    ) -> ModelResult<()> {
        if !self.layout.is_cascade() && !self.layout.high_loop().is_staged() {
            return Ok(());
        }
        let temps = BoundaryTemps {
            t_hs_bf: source_return_temperature(t_hs_ff, dt_hs),
            t_cons_ff,
            t_cons_bf: self.params.c0.t,
        };
        let levels = self.get_pressure_levels(temps)?;
        let steps = self.parameterizer()?.intermediate(&levels)?;
        tracing::debug!(
            t_hs_ff,
            t_cons_ff,
            t_mid = ?levels.cascade.map(|c| c.t_mid),
            p_mid = ?levels.p_mid,
            "intermediate states updated"
        );
        apply(&mut self.engine, &steps)?;
        Ok(())
    }

    /// Converged state of every connection in graph order.
    pub fn connection_table(&self) -> ModelResult<Vec<ConnectionRow>> {
        self.require_graph()?
            .connections()
            .iter()
            .map(|conn| {
                Ok(ConnectionRow {
                    label: conn.label.clone(),
                    state: self.engine.connection_state(&conn.label)?,
                })
            })
            .collect()
    }

    /// Equipment and installed cost of the converged design.
    pub fn calc_cost(&self, settings: &CostSettings) -> ModelResult<CostBreakdown> {
        if !self.solved_design {
            return Err(ModelError::configuration("cost needs a converged design"));
        }
        let breakdown = hp_econ::evaluate(self.require_graph()?, &self.engine, settings)?;
        tracing::info!(
            equipment = breakdown.equipment,
            total = breakdown.total,
            "cost evaluated"
        );
        Ok(breakdown)
    }
}

/// Source return temperature for a source feed, kept above freezing.
pub fn source_return_temperature(t_hs_ff: f64, dt_hs: f64) -> f64 {
    (t_hs_ff - dt_hs).max(SOURCE_RETURN_MIN)
}
