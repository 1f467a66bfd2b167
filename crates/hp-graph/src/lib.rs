//! hp-graph: component and connection topology of a heat pump cycle.
//!
//! A [`Graph`] is the engine-independent description of one cycle: labelled
//! components with fixed port layouts, labelled connections between outlet
//! and inlet ports, and buses that sum power or heat flows. It is assembled
//! with a [`GraphBuilder`] and checked on `build()`. Engines consume it by
//! label through [`LabelIndex`].
//!
//! ```
//! use hp_graph::{ComponentKind, ComponentRole, GraphBuilder};
//!
//! let mut builder = GraphBuilder::new();
//! let source = builder.add_component("hs_ff", ComponentKind::Source, ComponentRole::Plain);
//! let sink = builder.add_component("hs_bf", ComponentKind::Sink, ComponentRole::Plain);
//! builder.connect("B1", source, 1, sink, 1);
//! let graph = builder.build().unwrap();
//!
//! assert_eq!(graph.connections()[0].label, "B1");
//! ```

pub mod builder;
pub mod char_line;
pub mod error;
pub mod graph;
pub mod indexing;
pub(crate) mod validate;

pub use builder::GraphBuilder;
pub use char_line::CharLine;
pub use error::{GraphError, GraphResult};
pub use graph::{
    Bus, BusBase, BusMember, BusRole, Component, ComponentKind, ComponentRole, Connection, Graph,
    PortKind, PortRef,
};
pub use indexing::LabelIndex;
