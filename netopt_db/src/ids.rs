//! Type-safe identifiers for design objects.
//!
//! Every object owned by the database is addressed through a small copyable
//! id newtype rather than a reference, so transforms can hold ids across
//! mutations without borrowing the database:
//! - [`CellId`]: a library cell (catalog entry).
//! - [`InstId`]: an instance placed in the design.
//! - [`NetId`]: an equipotential net.
//! - [`PinId`]: an instance terminal or top-level port.

use contracts::*;
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            inner: u32,
        }

        impl $name {
            /// Creates a new id from a raw index.
            #[ensures(ret.inner == id)]
            pub(crate) const fn new(id: u32) -> Self {
                Self { inner: id }
            }

            /// Returns the index as a usize for table access.
            #[ensures(ret == self.inner as usize)]
            pub const fn index(self) -> usize {
                self.inner as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.inner)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(id: usize) -> Self {
                Self { inner: id as u32 }
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(id: $name) -> Self {
                id.inner as Self
            }
        }
    };
}

id_type!(
    /// Identifier of a [`crate::library::LibraryCell`] in the cell catalog.
    CellId,
    "c"
);
id_type!(
    /// Identifier of an [`crate::netlist::Instance`] in the design.
    InstId,
    "i"
);
id_type!(
    /// Identifier of a [`crate::netlist::Net`] in the design.
    NetId,
    "n"
);
id_type!(
    /// Identifier of a [`crate::netlist::Pin`] (instance terminal or
    /// top-level port) in the design.
    PinId,
    "p"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id = PinId::new(42);
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn test_id_conversions() {
        let id: NetId = 7usize.into();
        let back: usize = id.into();
        assert_eq!(back, 7);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", CellId::new(3)), "c3");
        assert_eq!(format!("{}", InstId::new(4)), "i4");
        assert_eq!(format!("{}", NetId::new(5)), "n5");
        assert_eq!(format!("{}", PinId::new(6)), "p6");
    }

    #[test]
    fn test_id_ordering() {
        assert!(PinId::new(1) < PinId::new(2));
    }
}
