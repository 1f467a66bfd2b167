//! The flowsheet engine trait.

use std::path::{Path, PathBuf};

use hp_graph::{Bus, ComponentKind, Graph};

use crate::error::{EngineError, EngineResult};
use crate::exergy::{ExergyRequest, ExergyResults};
use crate::spec::{ComponentAttr, ComponentUpdate, StateSpec};
use crate::state::{ConnectionState, ProcessCurve};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolveMode {
    /// Component sizes are free; design constraints hold.
    Design,
    /// Sizes come from the design snapshot; performance follows characteristics.
    Offdesign,
}

impl SolveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SolveMode::Design => "design",
            SolveMode::Offdesign => "offdesign",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolveOptions {
    /// Design snapshot used as reference in off-design mode.
    pub design_path: Option<PathBuf>,
    /// Snapshot whose state is the starting point of the iteration.
    pub init_path: Option<PathBuf>,
}

impl SolveOptions {
    pub fn design_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.design_path = Some(path.into());
        self
    }

    pub fn init_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.init_path = Some(path.into());
        self
    }
}

/// Stateful, non-reentrant steady-state flowsheet solver.
///
/// One engine instance belongs to one cycle model; the part-load sweep reuses
/// the engine's last converged state as the starting point of the next cell.
/// Components, connections and buses are addressed by label.
pub trait FlowsheetEngine {
    /// Engine name (for logging).
    fn name(&self) -> &str;

    /// Drop the current network.
    fn reset(&mut self);

    fn add_component(&mut self, label: &str, kind: ComponentKind) -> EngineResult<()>;

    /// Connect `source.source_port` to `target.target_port` (`"out1"`, `"in2"`).
    fn add_connection(
        &mut self,
        label: &str,
        source: &str,
        source_port: &str,
        target: &str,
        target_port: &str,
    ) -> EngineResult<()>;

    fn add_bus(&mut self, bus: &Bus, members: &[String]) -> EngineResult<()>;

    fn set_component(&mut self, label: &str, update: &ComponentUpdate) -> EngineResult<()>;

    fn set_state(&mut self, conn: &str, spec: &StateSpec) -> EngineResult<()>;

    /// Solve the network. An `Err` means the solver raised; a finished solve
    /// that did not converge is reported through [`FlowsheetEngine::residual`].
    fn solve(&mut self, mode: SolveMode, options: &SolveOptions) -> EngineResult<()>;

    /// Residual norm after the last solve; `None` before any solve.
    fn residual(&self) -> Option<f64>;

    /// Persist the converged network state to `path`.
    fn save(&mut self, path: &Path) -> EngineResult<()>;

    /// Load a network state written by [`FlowsheetEngine::save`] as the
    /// starting point of the next solve.
    fn restore(&mut self, path: &Path) -> EngineResult<()>;

    fn connection_state(&self, conn: &str) -> EngineResult<ConnectionState>;

    /// Bus power [W]; heat delivered to the consumer is negative.
    fn bus_power(&self, bus: &str) -> EngineResult<f64>;

    fn component_value(&self, label: &str, attr: ComponentAttr) -> EngineResult<f64>;

    /// Process curve through one side (1 or 2) of a component.
    fn sample_curve(&self, label: &str, side: u8) -> EngineResult<ProcessCurve>;

    fn exergy(&mut self, request: &ExergyRequest) -> EngineResult<ExergyResults>;

    /// Register every component, connection and bus of a validated graph.
    fn add_graph(&mut self, graph: &Graph) -> EngineResult<()> {
        for comp in graph.components() {
            self.add_component(&comp.label, comp.kind)?;
        }
        for conn in graph.connections() {
            let source = owner_label(graph, conn.source.component, &conn.label)?;
            let target = owner_label(graph, conn.target.component, &conn.label)?;
            self.add_connection(
                &conn.label,
                source,
                &conn.source.name(),
                target,
                &conn.target.name(),
            )?;
        }
        for bus in graph.buses() {
            let members = bus
                .members
                .iter()
                .map(|m| owner_label(graph, m.component, &bus.label).map(str::to_string))
                .collect::<EngineResult<Vec<_>>>()?;
            self.add_bus(bus, &members)?;
        }
        tracing::debug!(
            engine = self.name(),
            components = graph.components().len(),
            connections = graph.connections().len(),
            buses = graph.buses().len(),
            "network registered"
        );
        Ok(())
    }
}

fn owner_label<'g>(graph: &'g Graph, id: hp_core::CompId, owner: &str) -> EngineResult<&'g str> {
    graph
        .component(id)
        .map(|c| c.label.as_str())
        .ok_or_else(|| EngineError::UnknownLabel {
            what: "component",
            label: format!("{id} (referenced by {owner})"),
        })
}
