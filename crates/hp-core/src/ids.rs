//! Typed handles into a cycle graph.
//!
//! Components, connections and buses are numbered in insertion order. Each
//! kind gets its own handle type so a connection handle cannot be used to
//! look up a component.

use core::fmt;
use core::num::NonZeroU32;

macro_rules! graph_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Handle for the `index`-th entry (0-based).
            pub fn from_index(index: u32) -> Self {
                Self(NonZeroU32::MIN.saturating_add(index))
            }

            pub fn index(self) -> u32 {
                self.0.get() - 1
            }

            pub fn as_usize(self) -> usize {
                self.index() as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.index())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.index())
            }
        }
    };
}

graph_handle!(
    /// Component slot (compressor, heat exchanger, source, ...).
    CompId,
    "comp"
);
graph_handle!(
    /// Connection slot, one per labelled stream such as `A0` or `C3`.
    ConnId,
    "conn"
);
graph_handle!(
    /// Power or heat bus slot.
    BusId,
    "bus"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_keep_their_index() {
        for i in [0_u32, 3, 17, 9_999] {
            assert_eq!(CompId::from_index(i).index(), i);
            assert_eq!(ConnId::from_index(i).as_usize(), i as usize);
        }
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", ConnId::from_index(4)), "conn#4");
        assert_eq!(format!("{:?}", BusId::from_index(0)), "bus#0");
        assert_eq!(CompId::from_index(2).to_string(), "2");
    }

    #[test]
    fn optional_handle_has_no_overhead() {
        assert_eq!(
            core::mem::size_of::<CompId>(),
            core::mem::size_of::<Option<CompId>>()
        );
    }
}
