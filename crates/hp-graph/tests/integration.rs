//! Integration tests for hp-graph.

use hp_graph::{
    BusBase, BusRole, CharLine, ComponentKind as K, ComponentRole as R, GraphBuilder, GraphError,
    PortKind,
};

/// Single-stage loop with open source stream and closed consumer loop.
fn simple_cycle(with_closer: bool) -> GraphBuilder {
    let mut b = GraphBuilder::new();
    let cond = b.add_component("cond", K::Condenser, R::Condenser);
    let evap = b.add_component("evap", K::HeatExchanger, R::Evaporator);
    let comp = b.add_component("comp", K::Compressor, R::Plain);
    let valve = b.add_component("valve", K::Valve, R::Plain);
    let hs_ff = b.add_component("hs_ff", K::Source, R::Plain);
    let hs_bf = b.add_component("hs_bf", K::Sink, R::Plain);
    let cons = b.add_component("cons", K::SimpleHeatExchanger, R::Consumer);
    let cons_cc = b.add_component("cons_cc", K::CycleCloser, R::Plain);

    if with_closer {
        let cc = b.add_component("cc", K::CycleCloser, R::Plain);
        b.connect("A0", cond, 1, cc, 1);
        b.connect("A1", cc, 1, valve, 1);
    } else {
        b.connect("A0", cond, 1, valve, 1);
    }
    b.connect("A2", valve, 1, evap, 2);
    b.connect("A3", evap, 2, comp, 1);
    b.connect("A4", comp, 1, cond, 1);

    b.connect("B1", hs_ff, 1, evap, 1);
    b.connect("B2", evap, 1, hs_bf, 1);

    b.connect("C0", cons, 1, cons_cc, 1);
    b.connect("C1", cons_cc, 1, cond, 2);
    b.connect("C3", cond, 2, cons, 1);

    let power = b.add_bus("power input", BusRole::PowerInput);
    let motor = CharLine::new(vec![0.0, 1.0], vec![1.0 / 0.95, 1.0 / 0.98]).unwrap();
    b.add_bus_member(power, comp, Some(motor), BusBase::Bus);
    let heat = b.add_bus("heat output", BusRole::HeatOutput);
    b.add_bus_member(heat, cons, None, BusBase::Component);
    b
}

#[test]
fn build_simple_cycle() {
    let graph = simple_cycle(true).build().unwrap();

    assert_eq!(graph.components().len(), 9);
    assert_eq!(graph.connections().len(), 10);
    assert_eq!(graph.buses().len(), 2);

    let evap = graph.component_by_label("evap").unwrap();
    let a3 = graph.outlet(evap.id, 2).unwrap();
    assert_eq!(a3.label, "A3");
    assert_eq!(a3.source.kind, PortKind::Outlet);
    assert_eq!(graph.port_owner(a3.target), Some("comp"));

    let b1 = graph.connection_by_label("B1").unwrap();
    assert_eq!(graph.inlet(evap.id, 1).unwrap().id, b1.id);

    assert_eq!(graph.components_of_kind(K::CycleCloser).count(), 2);
    assert_eq!(graph.components_with_role(R::Consumer).count(), 1);
    assert!(graph.bus_by_role(BusRole::HeatInput).is_none());
}

#[test]
fn closed_loop_without_closer_is_rejected() {
    let err = simple_cycle(false).build().unwrap_err();
    match err {
        GraphError::MissingCycleCloser { connections } => {
            assert!(connections.contains(&"A0".to_string()));
            assert!(!connections.contains(&"B1".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn second_closer_is_rejected() {
    let mut b = GraphBuilder::new();
    let c1 = b.add_component("cc1", K::CycleCloser, R::Plain);
    let c2 = b.add_component("cc2", K::CycleCloser, R::Plain);
    b.connect("L0", c1, 1, c2, 1);
    b.connect("L1", c2, 1, c1, 1);
    let err = b.build().unwrap_err();
    assert!(matches!(err, GraphError::SurplusCycleCloser { closers } if closers.len() == 2));
}

#[test]
fn closer_on_open_stream_is_rejected() {
    let mut b = GraphBuilder::new();
    let so = b.add_component("so", K::Source, R::Plain);
    let cc = b.add_component("cc", K::CycleCloser, R::Plain);
    let si = b.add_component("si", K::Sink, R::Plain);
    b.connect("B1", so, 1, cc, 1);
    b.connect("B2", cc, 1, si, 1);
    assert!(matches!(
        b.build(),
        Err(GraphError::SurplusCycleCloser { .. })
    ));
}

#[test]
fn port_reuse_is_rejected() {
    let mut b = GraphBuilder::new();
    let so = b.add_component("so", K::Source, R::Plain);
    let si = b.add_component("si", K::Sink, R::Plain);
    b.connect("B1", so, 1, si, 1);
    b.connect("B2", so, 1, si, 1);
    let err = b.build().unwrap_err();
    assert!(matches!(err, GraphError::PortReuse { ref first, ref second, .. }
        if first == "B1" && second == "B2"));
}

#[test]
fn unconnected_port_is_rejected() {
    let mut b = GraphBuilder::new();
    let so = b.add_component("so", K::Source, R::Plain);
    let split = b.add_component("split", K::Splitter, R::Plain);
    let si = b.add_component("si", K::Sink, R::Plain);
    b.connect("B1", so, 1, split, 1);
    b.connect("B2", split, 1, si, 1);
    let err = b.build().unwrap_err();
    match err {
        GraphError::UnconnectedPort { component, port } => {
            assert_eq!(component, "split");
            assert_eq!(port.name(), "out2");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_port_number_is_rejected() {
    let mut b = GraphBuilder::new();
    let so = b.add_component("so", K::Source, R::Plain);
    let si = b.add_component("si", K::Sink, R::Plain);
    b.connect("B1", so, 2, si, 1);
    assert!(matches!(b.build(), Err(GraphError::InvalidPort { .. })));
}

#[test]
fn duplicate_connection_label_is_rejected() {
    let mut b = GraphBuilder::new();
    let so = b.add_component("so", K::Source, R::Plain);
    let si = b.add_component("si", K::Sink, R::Plain);
    let so2 = b.add_component("so2", K::Source, R::Plain);
    let si2 = b.add_component("si2", K::Sink, R::Plain);
    b.connect("B1", so, 1, si, 1);
    b.connect("B1", so2, 1, si2, 1);
    let err = b.build().unwrap_err();
    assert_eq!(err.to_string(), "connection label `B1` is used twice");
}

#[test]
fn empty_graph() {
    let graph = GraphBuilder::new().build().unwrap();
    assert!(graph.components().is_empty());
    assert!(graph.connections().is_empty());
}
