//! Component cost functions and the equipment cost roll-up.

use std::collections::BTreeMap;
use std::path::PathBuf;

use hp_engine::{ComponentAttr, EngineError, FlowsheetEngine};
use hp_graph::{Component, ComponentKind, ComponentRole, Graph};
use serde::{Deserialize, Serialize};

use crate::cepci::CepciTable;
use crate::error::CostResult;

/// Heat transfer coefficients turning kA into area [W/(m²·K)].
const K_EVAPORATOR: f64 = 1500.0;
const K_CONDENSER: f64 = 3500.0;
const K_TRANSCRITICAL: f64 = 60.0;
const K_MISC: f64 = 50.0;

/// Separator residence time [s].
const RESIDENCE_TIME: f64 = 10.0;

const PIPING_SHARE: f64 = 0.1;
const ELECTRICAL_SHARE: f64 = 0.1;
const REFRIGERANT_FACTOR: f64 = 1.2;
const REFRIGERANT_YIELD: f64 = 0.96;
const INSTALLATION_FACTOR: f64 = 6.32;

/// `cost_ref · (x / x_ref)^alpha` at reference-year prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostFunction {
    pub x_ref: f64,
    pub cost_ref: f64,
    pub alpha: f64,
}

impl CostFunction {
    /// Volumetric inlet flow [m³/h].
    pub const COMPRESSOR: CostFunction = CostFunction {
        x_ref: 279.8,
        cost_ref: 19_850.0,
        alpha: 0.73,
    };
    /// Heat transfer area [m²].
    pub const HEAT_EXCHANGER: CostFunction = CostFunction {
        x_ref: 42.0,
        cost_ref: 15_526.0,
        alpha: 0.8,
    };
    /// Vessel volume [m³].
    pub const SEPARATOR: CostFunction = CostFunction {
        x_ref: 0.089,
        cost_ref: 1444.0,
        alpha: 0.63,
    };

    pub fn evaluate(&self, x: f64) -> f64 {
        self.cost_ref * (x / self.x_ref).powf(self.alpha)
    }
}

/// One costed component with its design variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostItem {
    pub label: String,
    pub function: CostFunction,
    pub x: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSettings {
    pub reference_year: i32,
    pub current_year: i32,
    /// CEPCI table to use instead of the built-in one.
    pub cepci: Option<PathBuf>,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            reference_year: 2013,
            current_year: 2019,
            cepci: None,
        }
    }
}

impl CostSettings {
    pub fn cepci_ratio(&self) -> CostResult<f64> {
        let table = match &self.cepci {
            Some(path) => CepciTable::cached(path)?,
            None => CepciTable::builtin()?,
        };
        table.ratio(self.current_year, self.reference_year)
    }
}

/// Costs in current-year prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub components: BTreeMap<String, f64>,
    pub piping: f64,
    pub electrical: f64,
    pub refrigerant: f64,
    /// Components plus piping, electrical equipment and refrigerant.
    pub equipment: f64,
    /// Total installed cost.
    pub total: f64,
}

/// Roll component costs up into equipment and installed cost.
pub fn breakdown(items: &[CostItem], cepci_ratio: f64) -> CostBreakdown {
    let components: BTreeMap<String, f64> = items
        .iter()
        .map(|item| (item.label.clone(), item.function.evaluate(item.x) * cepci_ratio))
        .collect();
    let sum: f64 = components.values().sum();
    let piping = PIPING_SHARE * sum;
    let electrical = ELECTRICAL_SHARE * sum;
    let refrigerant = REFRIGERANT_FACTOR * sum * (1.0 / REFRIGERANT_YIELD - 1.0);
    let equipment = sum + piping + electrical + refrigerant;
    CostBreakdown {
        components,
        piping,
        electrical,
        refrigerant,
        equipment,
        total: INSTALLATION_FACTOR * equipment,
    }
}

fn port_state(
    graph: &Graph,
    engine: &dyn FlowsheetEngine,
    comp: &Component,
    inlet: bool,
    number: u8,
) -> CostResult<hp_engine::ConnectionState> {
    let conn = if inlet {
        graph.inlet(comp.id, number)
    } else {
        graph.outlet(comp.id, number)
    };
    let conn = conn.ok_or_else(|| EngineError::UnknownLabel {
        what: "port",
        label: format!("{}:{}{number}", comp.label, if inlet { "in" } else { "out" }),
    })?;
    Ok(engine.connection_state(&conn.label)?)
}

fn heat_transfer_coefficient(comp: &Component) -> f64 {
    match (comp.kind, comp.role) {
        (_, ComponentRole::GasCooler) => K_TRANSCRITICAL,
        (_, ComponentRole::Evaporator | ComponentRole::Economizer) => K_EVAPORATOR,
        (ComponentKind::Condenser, _) | (_, ComponentRole::Condenser) => K_CONDENSER,
        _ => K_MISC,
    }
}

/// Design variables of every costed component, read from a solved engine.
pub fn cost_items(graph: &Graph, engine: &dyn FlowsheetEngine) -> CostResult<Vec<CostItem>> {
    let mut items = Vec::new();
    for comp in graph.components() {
        let (function, x) = match comp.kind {
            ComponentKind::Compressor => {
                let inlet = port_state(graph, engine, comp, true, 1)?;
                (CostFunction::COMPRESSOR, inlet.volumetric_flow() * 3600.0)
            }
            ComponentKind::HeatExchanger | ComponentKind::Condenser => {
                let ka = engine.component_value(&comp.label, ComponentAttr::KA)?;
                (CostFunction::HEAT_EXCHANGER, ka / heat_transfer_coefficient(comp))
            }
            ComponentKind::DropletSeparator | ComponentKind::Drum => {
                let liquid = port_state(graph, engine, comp, false, 1)?;
                let vapor = port_state(graph, engine, comp, false, 2)?;
                let volume =
                    RESIDENCE_TIME * (liquid.volumetric_flow() + vapor.volumetric_flow());
                (CostFunction::SEPARATOR, volume)
            }
            _ => continue,
        };
        items.push(CostItem {
            label: comp.label.clone(),
            function,
            x,
        });
    }
    Ok(items)
}

/// Cost of the design currently solved in `engine`.
pub fn evaluate(
    graph: &Graph,
    engine: &dyn FlowsheetEngine,
    settings: &CostSettings,
) -> CostResult<CostBreakdown> {
    let items = cost_items(graph, engine)?;
    let ratio = settings.cepci_ratio()?;
    for item in &items {
        tracing::debug!(component = %item.label, x = item.x, "cost variable");
    }
    Ok(breakdown(&items, ratio))
}
