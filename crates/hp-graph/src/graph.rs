//! Core graph data structures.

use std::fmt;

use hp_core::{BusId, CompId, ConnId};

use crate::char_line::CharLine;
use crate::indexing::LabelIndex;

/// Closed set of component kinds the flowsheet engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComponentKind {
    Source,
    Sink,
    Pump,
    Compressor,
    /// Two-sided heat exchanger; side 1 hot, side 2 cold.
    HeatExchanger,
    /// One-sided heat exchanger (heat duty crosses the system boundary).
    SimpleHeatExchanger,
    /// Two-sided heat exchanger whose hot side leaves as saturated liquid.
    Condenser,
    /// Separates a two-phase inlet into saturated liquid (out1) and vapor (out2).
    DropletSeparator,
    /// Separator with a second inlet for an evaporator return.
    Drum,
    Splitter,
    Merge,
    Valve,
    CycleCloser,
}

impl ComponentKind {
    /// Number of inlet ports.
    pub fn inlets(self) -> u8 {
        match self {
            ComponentKind::Source => 0,
            ComponentKind::HeatExchanger
            | ComponentKind::Condenser
            | ComponentKind::Drum
            | ComponentKind::Merge => 2,
            _ => 1,
        }
    }

    /// Number of outlet ports.
    pub fn outlets(self) -> u8 {
        match self {
            ComponentKind::Sink => 0,
            ComponentKind::HeatExchanger
            | ComponentKind::Condenser
            | ComponentKind::DropletSeparator
            | ComponentKind::Drum
            | ComponentKind::Splitter => 2,
            _ => 1,
        }
    }

    /// Boundary components open a stream instead of passing it on.
    pub fn is_boundary(self) -> bool {
        matches!(self, ComponentKind::Source | ComponentKind::Sink)
    }

    /// Whether inlet `n` and outlet `n` form a separate stream (one HX side).
    pub fn has_separate_sides(self) -> bool {
        matches!(self, ComponentKind::HeatExchanger | ComponentKind::Condenser)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Source => "Source",
            ComponentKind::Sink => "Sink",
            ComponentKind::Pump => "Pump",
            ComponentKind::Compressor => "Compressor",
            ComponentKind::HeatExchanger => "HeatExchanger",
            ComponentKind::SimpleHeatExchanger => "SimpleHeatExchanger",
            ComponentKind::Condenser => "Condenser",
            ComponentKind::DropletSeparator => "DropletSeparator",
            ComponentKind::Drum => "Drum",
            ComponentKind::Splitter => "Splitter",
            ComponentKind::Merge => "Merge",
            ComponentKind::Valve => "Valve",
            ComponentKind::CycleCloser => "CycleCloser",
        };
        f.write_str(name)
    }
}

/// What a component does inside the cycle.
///
/// Kinds say how the engine models a component; roles say which design
/// numbers, characteristics and cost functions apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComponentRole {
    Plain,
    Evaporator,
    Condenser,
    GasCooler,
    InternalHx,
    Economizer,
    Intercooler,
    FlashTank,
    /// Intermediate heat exchanger coupling the two loops of a cascade.
    CascadeHx,
    Consumer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: CompId,
    pub label: String,
    pub kind: ComponentKind,
    pub role: ComponentRole,
}

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PortKind {
    Inlet,
    Outlet,
}

/// One port of one component; numbers are 1-based (`in1`, `out2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub component: CompId,
    pub kind: PortKind,
    pub number: u8,
}

impl PortRef {
    pub fn inlet(component: CompId, number: u8) -> Self {
        Self {
            component,
            kind: PortKind::Inlet,
            number,
        }
    }

    pub fn outlet(component: CompId, number: u8) -> Self {
        Self {
            component,
            kind: PortKind::Outlet,
            number,
        }
    }

    /// Port name as the engine spells it.
    pub fn name(&self) -> String {
        match self.kind {
            PortKind::Inlet => format!("in{}", self.number),
            PortKind::Outlet => format!("out{}", self.number),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.name())
    }
}

/// Directed stream from an outlet port to an inlet port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnId,
    pub label: String,
    pub source: PortRef,
    pub target: PortRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusRole {
    PowerInput,
    HeatInput,
    HeatOutput,
}

/// Which side of a bus member's conversion efficiency is its own power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusBase {
    /// Efficiency applies bus to component (motor driving a compressor).
    Bus,
    /// Efficiency applies component to bus.
    Component,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusMember {
    pub component: CompId,
    /// Efficiency as a function of load fraction; `None` means unity.
    pub char_line: Option<CharLine>,
    pub base: BusBase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub id: BusId,
    pub label: String,
    pub role: BusRole,
    pub members: Vec<BusMember>,
}

/// The graph: a validated, immutable cycle topology.
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) components: Vec<Component>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) buses: Vec<Bus>,
    pub(crate) labels: LabelIndex,
}

impl Graph {
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn labels(&self) -> &LabelIndex {
        &self.labels
    }

    /// Get a component by ID (returns None if ID out of bounds).
    pub fn component(&self, id: CompId) -> Option<&Component> {
        self.components.get(id.as_usize())
    }

    pub fn connection(&self, id: ConnId) -> Option<&Connection> {
        self.connections.get(id.as_usize())
    }

    pub fn component_by_label(&self, label: &str) -> Option<&Component> {
        self.labels
            .component(label)
            .and_then(|id| self.component(id))
    }

    pub fn connection_by_label(&self, label: &str) -> Option<&Connection> {
        self.labels
            .connection(label)
            .and_then(|id| self.connection(id))
    }

    pub fn bus_by_role(&self, role: BusRole) -> Option<&Bus> {
        self.buses.iter().find(|b| b.role == role)
    }

    pub fn components_of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(move |c| c.kind == kind)
    }

    pub fn components_with_role(&self, role: ComponentRole) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(move |c| c.role == role)
    }

    /// Connection entering `comp` at inlet `number`.
    pub fn inlet(&self, comp: CompId, number: u8) -> Option<&Connection> {
        let port = PortRef::inlet(comp, number);
        self.connections.iter().find(|c| c.target == port)
    }

    /// Connection leaving `comp` at outlet `number`.
    pub fn outlet(&self, comp: CompId, number: u8) -> Option<&Connection> {
        let port = PortRef::outlet(comp, number);
        self.connections.iter().find(|c| c.source == port)
    }

    /// Label of the component that owns `port`.
    pub fn port_owner(&self, port: PortRef) -> Option<&str> {
        self.component(port.component).map(|c| c.label.as_str())
    }
}
