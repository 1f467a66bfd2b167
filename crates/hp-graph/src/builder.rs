//! Incremental graph builder.

use hp_core::{BusId, CompId, ConnId};

use crate::char_line::CharLine;
use crate::error::GraphResult;
use crate::graph::{
    Bus, BusBase, BusMember, BusRole, Component, ComponentKind, ComponentRole, Connection, Graph,
    PortRef,
};
use crate::indexing::LabelIndex;
use crate::validate;

/// Builder for constructing a cycle topology incrementally.
///
/// Use `add_component`, `connect` and `add_bus` to build up the graph,
/// then call `build()` to validate and freeze it into an immutable `Graph`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    components: Vec<Component>,
    connections: Vec<Connection>,
    buses: Vec<Bus>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(
        &mut self,
        label: impl Into<String>,
        kind: ComponentKind,
        role: ComponentRole,
    ) -> CompId {
        let id = CompId::from_index(self.components.len() as u32);
        self.components.push(Component {
            id,
            label: label.into(),
            kind,
            role,
        });
        id
    }

    /// Connect outlet `source_port` of `source` to inlet `target_port` of `target`.
    pub fn connect(
        &mut self,
        label: impl Into<String>,
        source: CompId,
        source_port: u8,
        target: CompId,
        target_port: u8,
    ) -> ConnId {
        let id = ConnId::from_index(self.connections.len() as u32);
        self.connections.push(Connection {
            id,
            label: label.into(),
            source: PortRef::outlet(source, source_port),
            target: PortRef::inlet(target, target_port),
        });
        id
    }

    pub fn add_bus(&mut self, label: impl Into<String>, role: BusRole) -> BusId {
        let id = BusId::from_index(self.buses.len() as u32);
        self.buses.push(Bus {
            id,
            label: label.into(),
            role,
            members: Vec::new(),
        });
        id
    }

    /// Attach a component to a bus. Unknown bus ids are ignored.
    pub fn add_bus_member(
        &mut self,
        bus: BusId,
        component: CompId,
        char_line: Option<CharLine>,
        base: BusBase,
    ) {
        if let Some(bus) = self.buses.get_mut(bus.as_usize()) {
            bus.members.push(BusMember {
                component,
                char_line,
                base,
            });
        }
    }

    /// Look up a component added earlier by label.
    pub fn component_id(&self, label: &str) -> Option<CompId> {
        self.components
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.id)
    }

    /// Build and validate the graph, returning an immutable `Graph`.
    pub fn build(self) -> GraphResult<Graph> {
        let labels = LabelIndex::build(&self.components, &self.connections, &self.buses)?;
        validate::validate_ports(&self.components, &self.connections)?;
        validate::validate_buses(&self.components, &self.buses)?;
        validate::validate_cycle_closers(&self.components, &self.connections)?;

        Ok(Graph {
            components: self.components,
            connections: self.connections,
            buses: self.buses,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_basic() {
        let mut builder = GraphBuilder::new();
        let so = builder.add_component("so", ComponentKind::Source, ComponentRole::Plain);
        let si = builder.add_component("si", ComponentKind::Sink, ComponentRole::Plain);
        let c = builder.connect("B1", so, 1, si, 1);

        assert_eq!(so.index(), 0);
        assert_eq!(si.index(), 1);
        assert_eq!(c.index(), 0);
        assert_eq!(builder.component_id("si"), Some(si));
        assert_eq!(builder.component_id("x"), None);
    }

    #[test]
    fn builder_bus_members() {
        let mut builder = GraphBuilder::new();
        let so = builder.add_component("so", ComponentKind::Source, ComponentRole::Plain);
        let si = builder.add_component("si", ComponentKind::Sink, ComponentRole::Plain);
        builder.connect("B1", so, 1, si, 1);
        let bus = builder.add_bus("heat input", BusRole::HeatInput);
        builder.add_bus_member(bus, so, None, BusBase::Bus);
        builder.add_bus_member(bus, si, None, BusBase::Component);

        let graph = builder.build().unwrap();
        let bus = graph.bus_by_role(BusRole::HeatInput).unwrap();
        assert_eq!(bus.members.len(), 2);
        assert_eq!(bus.members[1].base, BusBase::Component);
    }
}
