//! Label lookup for engine integration.
//!
//! The flowsheet engine addresses components, connections and buses by
//! label; the model addresses them by id. `LabelIndex` maps between the two.

use std::collections::HashMap;

use hp_core::{BusId, CompId, ConnId};

use crate::error::{GraphError, GraphResult};
use crate::graph::{Bus, Component, Connection};

#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    components: HashMap<String, CompId>,
    connections: HashMap<String, ConnId>,
    buses: HashMap<String, BusId>,
}

impl LabelIndex {
    /// Build the index, rejecting duplicate labels per object class.
    pub fn build(
        components: &[Component],
        connections: &[Connection],
        buses: &[Bus],
    ) -> GraphResult<Self> {
        let mut index = Self::default();
        for c in components {
            insert_unique(&mut index.components, "component", &c.label, c.id)?;
        }
        for c in connections {
            insert_unique(&mut index.connections, "connection", &c.label, c.id)?;
        }
        for b in buses {
            insert_unique(&mut index.buses, "bus", &b.label, b.id)?;
        }
        Ok(index)
    }

    pub fn component(&self, label: &str) -> Option<CompId> {
        self.components.get(label).copied()
    }

    pub fn connection(&self, label: &str) -> Option<ConnId> {
        self.connections.get(label).copied()
    }

    pub fn bus(&self, label: &str) -> Option<BusId> {
        self.buses.get(label).copied()
    }

    /// Like [`LabelIndex::component`] but an absent label is an error.
    pub fn require_component(&self, label: &str) -> GraphResult<CompId> {
        self.component(label).ok_or_else(|| GraphError::LabelNotFound {
            what: "component",
            label: label.to_string(),
        })
    }

    pub fn require_connection(&self, label: &str) -> GraphResult<ConnId> {
        self.connection(label)
            .ok_or_else(|| GraphError::LabelNotFound {
                what: "connection",
                label: label.to_string(),
            })
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

fn insert_unique<I: Copy>(
    map: &mut HashMap<String, I>,
    what: &'static str,
    label: &str,
    id: I,
) -> GraphResult<()> {
    if map.insert(label.to_string(), id).is_some() {
        return Err(GraphError::DuplicateLabel {
            what,
            label: label.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ComponentKind, ComponentRole};
    use hp_core::CompId;

    fn comp(i: u32, label: &str) -> Component {
        Component {
            id: CompId::from_index(i),
            label: label.into(),
            kind: ComponentKind::Valve,
            role: ComponentRole::Plain,
        }
    }

    #[test]
    fn lookup_round_trip() {
        let comps = vec![comp(0, "valve"), comp(1, "valve2")];
        let index = LabelIndex::build(&comps, &[], &[]).unwrap();
        assert_eq!(index.component("valve2"), Some(CompId::from_index(1)));
        assert_eq!(index.component("nope"), None);
        assert!(index.require_connection("A0").is_err());
        assert_eq!(index.component_count(), 2);
    }

    #[test]
    fn duplicate_component_label() {
        let comps = vec![comp(0, "valve"), comp(1, "valve")];
        let err = LabelIndex::build(&comps, &[], &[]).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateLabel { what: "component", .. }));
    }
}
