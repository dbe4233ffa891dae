//! Value range propagation over a whole function.
//!
//! [`ValueRangePropagation`] drives the pass:
//!
//! 1. Assertions are synthesized and inserted, so branch conditions become
//!    definitions the engine can see.
//! 2. The worklist engine runs to a fixpoint over the SSA graph, keeping
//!    only edges it can prove executable.
//! 3. Ranges and reachability are collected into a [`RangeResult`].
//! 4. The assertions are removed again. Blocks created to split critical
//!    edges stay behind as empty forwarding blocks.
//!
//! # Example
//!
//! ```rust
//! use rangescope::analysis::ValueRangePropagation;
//! use rangescope::config::VrpConfig;
//! use rangescope::ir::{CmpOp, ScalarType, SsaFunctionBuilder, SsaNameId};
//!
//! let mut func = SsaFunctionBuilder::new("clamp")
//!     .build_with(|f| {
//!         let x = f.param(ScalarType::u32());
//!         f.block(0, |b| b.branch(CmpOp::Lt, x, 10, 1, 2));
//!         f.block(1, |b| {
//!             let y = b.mul(x, 2);
//!             b.ret_val(y);
//!         });
//!         f.block(2, |b| b.ret_val(x));
//!     })
//!     .unwrap();
//!
//! let result = ValueRangePropagation::new(VrpConfig::default()).run(&mut func).unwrap();
//! let doubled = result.range(SsaNameId::new(1)).unwrap();
//! assert_eq!(doubled.to_string(), "[0, 18]");
//! ```

mod engine;
mod result;
mod scev;
mod table;

pub use result::RangeResult;
pub use scev::{Direction, Evolution, InductionScev, NoScev, ScevOracle};
pub use table::RangeTable;

use log::debug;

use crate::{
    analysis::assert::{insert_assertions, remove_assertions},
    config::VrpConfig,
    ir::Function,
    Result,
};

/// The value range propagation pass.
pub struct ValueRangePropagation {
    config: VrpConfig,
    scev: Box<dyn ScevOracle>,
}

impl Default for ValueRangePropagation {
    fn default() -> Self {
        Self::new(VrpConfig::default())
    }
}

impl ValueRangePropagation {
    /// Creates the pass with the induction-variable oracle.
    #[must_use]
    pub fn new(config: VrpConfig) -> Self {
        let scev = InductionScev::new().with_strict_overflow(config.strict_overflow);
        Self {
            config,
            scev: Box::new(scev),
        }
    }

    /// Replaces the scalar-evolution oracle.
    #[must_use]
    pub fn with_scev(mut self, oracle: impl ScevOracle + 'static) -> Self {
        self.scev = Box::new(oracle);
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &VrpConfig {
        &self.config
    }

    /// Computes value ranges for every SSA name of `func`.
    ///
    /// `func` is modified while the pass runs and restored before it
    /// returns, apart from blocks added to split critical edges.
    ///
    /// # Errors
    ///
    /// Returns an error if `func` fails validation.
    pub fn run(&self, func: &mut Function) -> Result<RangeResult> {
        func.validate()?;

        let assertions = if self.config.insert_assertions {
            insert_assertions(func, &self.config)
        } else {
            Vec::new()
        };

        let propagated = engine::Engine::new(func, &self.config, self.scev.as_ref()).run();
        let result = RangeResult::harvest(func, propagated, assertions);
        let removed = remove_assertions(func);

        debug!(
            "{}: {} visits, {} of {} blocks executable, {} assertions removed{}",
            func.name(),
            result.visits(),
            result.executable_block_count(),
            func.block_count(),
            removed,
            if result.converged() { "" } else { ", visit cap hit" }
        );
        Ok(result)
    }
}
