//! Graph validation logic.

use std::collections::{BTreeSet, HashMap};

use crate::error::{GraphError, GraphResult};
use crate::graph::{Bus, Component, ComponentKind, Connection, PortKind, PortRef};

/// Every connection joins an existing outlet to an existing inlet, no port
/// is used twice and no port is left open.
pub(crate) fn validate_ports(
    components: &[Component],
    connections: &[Connection],
) -> GraphResult<()> {
    let mut used: HashMap<PortRef, &str> = HashMap::new();

    for conn in connections {
        for port in [conn.source, conn.target] {
            let comp = components
                .get(port.component.as_usize())
                .ok_or_else(|| GraphError::InvalidCompRef {
                    owner: format!("Connection {}", conn.label),
                    comp: port.component,
                })?;
            let available = match port.kind {
                PortKind::Inlet => comp.kind.inlets(),
                PortKind::Outlet => comp.kind.outlets(),
            };
            if port.number == 0 || port.number > available {
                return Err(GraphError::InvalidPort {
                    connection: conn.label.clone(),
                    port,
                });
            }
            if let Some(first) = used.insert(port, &conn.label) {
                return Err(GraphError::PortReuse {
                    port,
                    first: first.to_string(),
                    second: conn.label.clone(),
                });
            }
        }
    }

    for comp in components {
        let inlets = (1..=comp.kind.inlets()).map(|n| PortRef::inlet(comp.id, n));
        let outlets = (1..=comp.kind.outlets()).map(|n| PortRef::outlet(comp.id, n));
        if let Some(port) = inlets.chain(outlets).find(|p| !used.contains_key(p)) {
            return Err(GraphError::UnconnectedPort {
                component: comp.label.clone(),
                port,
            });
        }
    }

    Ok(())
}

pub(crate) fn validate_buses(components: &[Component], buses: &[Bus]) -> GraphResult<()> {
    for bus in buses {
        for member in &bus.members {
            if member.component.as_usize() >= components.len() {
                return Err(GraphError::InvalidCompRef {
                    owner: format!("Bus {}", bus.label),
                    comp: member.component,
                });
            }
        }
    }
    Ok(())
}

/// Each closed stream carries exactly one cycle closer; open streams
/// (running from a source to a sink) carry none.
///
/// Streams are found by joining connections that meet at a component,
/// keeping the two sides of a heat exchanger apart.
pub(crate) fn validate_cycle_closers(
    components: &[Component],
    connections: &[Connection],
) -> GraphResult<()> {
    let mut sets = DisjointSets::new(connections.len());

    let mut attached: HashMap<usize, Vec<(PortRef, usize)>> = HashMap::new();
    for (i, conn) in connections.iter().enumerate() {
        attached
            .entry(conn.source.component.as_usize())
            .or_default()
            .push((conn.source, i));
        attached
            .entry(conn.target.component.as_usize())
            .or_default()
            .push((conn.target, i));
    }

    for (comp_idx, ports) in &attached {
        let Some(comp) = components.get(*comp_idx) else {
            continue;
        };
        if comp.kind.has_separate_sides() {
            for (a, (pa, ia)) in ports.iter().enumerate() {
                for (pb, ib) in &ports[a + 1..] {
                    if pa.number == pb.number {
                        sets.union(*ia, *ib);
                    }
                }
            }
        } else if let Some((_, first)) = ports.first() {
            for (_, other) in &ports[1..] {
                sets.union(*first, *other);
            }
        }
    }

    let mut streams: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..connections.len() {
        streams.entry(sets.find(i)).or_default().push(i);
    }

    let mut roots: Vec<_> = streams.keys().copied().collect();
    roots.sort_unstable();
    for root in roots {
        let members = &streams[&root];
        let touched: BTreeSet<usize> = members
            .iter()
            .flat_map(|&i| {
                let c = &connections[i];
                [
                    c.source.component.as_usize(),
                    c.target.component.as_usize(),
                ]
            })
            .collect();
        let touched: Vec<&Component> = touched.iter().filter_map(|&i| components.get(i)).collect();

        let open = touched.iter().any(|c| c.kind.is_boundary());
        let closers: Vec<String> = touched
            .iter()
            .filter(|c| c.kind == ComponentKind::CycleCloser)
            .map(|c| c.label.clone())
            .collect();

        if (open && !closers.is_empty()) || closers.len() > 1 {
            return Err(GraphError::SurplusCycleCloser { closers });
        }
        if !open && closers.is_empty() {
            return Err(GraphError::MissingCycleCloser {
                connections: members
                    .iter()
                    .map(|&i| connections[i].label.clone())
                    .collect(),
            });
        }
    }

    Ok(())
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_sets_join() {
        let mut sets = DisjointSets::new(4);
        sets.union(0, 2);
        sets.union(3, 2);
        assert_eq!(sets.find(3), sets.find(0));
        assert_ne!(sets.find(1), sets.find(0));
    }
}
