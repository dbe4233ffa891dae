//! SSA names.

use std::fmt;

use crate::ir::ScalarType;

/// Identifier of an SSA name, unique within its [`crate::ir::Function`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SsaNameId(pub(crate) usize);

impl SsaNameId {
    /// Wraps a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for SsaNameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

impl fmt::Display for SsaNameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

/// How a name receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameOrigin {
    /// Incoming parameter; its value is unknown on entry.
    Param {
        /// Position in the parameter list.
        index: usize,
        /// The caller guarantees a non-null pointer.
        nonnull: bool,
    },
    /// Default definition of a local that is read before any store.
    Uninit,
    /// Defined by a PHI or a statement in the body.
    Defined,
}

impl NameOrigin {
    /// Whether the name has no defining statement.
    #[must_use]
    pub const fn is_default_def(&self) -> bool {
        !matches!(self, NameOrigin::Defined)
    }
}

/// An SSA name: its identity, type and origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaName {
    pub(crate) id: SsaNameId,
    pub(crate) ty: ScalarType,
    pub(crate) origin: NameOrigin,
}

impl SsaName {
    /// The identifier.
    #[must_use]
    pub const fn id(&self) -> SsaNameId {
        self.id
    }

    /// The declared type.
    #[must_use]
    pub const fn ty(&self) -> ScalarType {
        self.ty
    }

    /// The origin of the value.
    #[must_use]
    pub const fn origin(&self) -> NameOrigin {
        self.origin
    }
}
