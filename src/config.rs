//! Configuration for value range propagation.
//!
//! These switches mirror the language and target options that change what
//! the analysis may assume: whether signed overflow is undefined, whether a
//! dereference proves a pointer non-null, and whether division can trap.

use crate::ir::ScalarType;

/// Configuration for [`crate::analysis::ValueRangePropagation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrpConfig {
    /// Signed overflow is undefined behaviour (default: true).
    ///
    /// When disabled every signed type is treated as wrapping, so no
    /// overflow-infinity bound is ever produced.
    pub strict_overflow: bool,

    /// A dereferenced pointer is non-null afterwards (default: true).
    pub delete_null_pointer_checks: bool,

    /// Division may trap, so its result says nothing unless the divisor's
    /// range excludes zero (default: false).
    pub non_call_exceptions: bool,

    /// Consult the scalar-evolution oracle at loop headers (default: true).
    pub use_scev: bool,

    /// Run the assertion synthesizer before propagation (default: true).
    pub insert_assertions: bool,

    /// Statement and PHI visits before the engine gives up and drops every
    /// name to varying (default: 1,000,000).
    pub max_visits: usize,
}

impl Default for VrpConfig {
    fn default() -> Self {
        Self {
            strict_overflow: true,
            delete_null_pointer_checks: true,
            non_call_exceptions: false,
            use_scev: true,
            insert_assertions: true,
            max_visits: 1_000_000,
        }
    }
}

impl VrpConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`VrpConfig::strict_overflow`].
    #[must_use]
    pub fn with_strict_overflow(mut self, enabled: bool) -> Self {
        self.strict_overflow = enabled;
        self
    }

    /// Sets [`VrpConfig::delete_null_pointer_checks`].
    #[must_use]
    pub fn with_delete_null_pointer_checks(mut self, enabled: bool) -> Self {
        self.delete_null_pointer_checks = enabled;
        self
    }

    /// Sets [`VrpConfig::non_call_exceptions`].
    #[must_use]
    pub fn with_non_call_exceptions(mut self, enabled: bool) -> Self {
        self.non_call_exceptions = enabled;
        self
    }

    /// Sets [`VrpConfig::use_scev`].
    #[must_use]
    pub fn with_scev(mut self, enabled: bool) -> Self {
        self.use_scev = enabled;
        self
    }

    /// Sets [`VrpConfig::insert_assertions`].
    #[must_use]
    pub fn with_assertions(mut self, enabled: bool) -> Self {
        self.insert_assertions = enabled;
        self
    }

    /// Sets [`VrpConfig::max_visits`].
    #[must_use]
    pub fn with_max_visits(mut self, max_visits: usize) -> Self {
        self.max_visits = max_visits;
        self
    }

    /// The type the analysis reasons in for a value declared as `ty`.
    #[must_use]
    pub fn effective_type(&self, ty: ScalarType) -> ScalarType {
        if self.strict_overflow {
            ty
        } else {
            ty.wrapping()
        }
    }
}
