//! Results for many functions at once.
//!
//! [`RangeContext`] runs [`ValueRangePropagation`] over a batch of functions
//! in parallel and keeps every [`RangeResult`] keyed by function name. Each
//! function is still analyzed on a single thread; only whole functions are
//! spread across the rayon pool.
//!
//! # Example
//!
//! ```rust
//! use rangescope::context::RangeContext;
//! use rangescope::config::VrpConfig;
//! use rangescope::ir::{ScalarType, SsaFunctionBuilder, SsaNameId};
//!
//! let mut funcs = vec![
//!     SsaFunctionBuilder::new("seven")
//!         .build_with(|f| {
//!             f.block(0, |b| {
//!                 let x = b.constant(ScalarType::i32(), 3);
//!                 let y = b.add(x, 4);
//!                 b.ret_val(y);
//!             });
//!         })
//!         .unwrap(),
//! ];
//!
//! let context = RangeContext::new(VrpConfig::default());
//! context.analyze_all(&mut funcs).unwrap();
//! let y = context.range_of("seven", SsaNameId::new(1)).unwrap();
//! assert_eq!(y.single_integer(), Some(7));
//! ```

use dashmap::DashMap;
use log::debug;
use rayon::prelude::*;

use crate::{
    analysis::{range::ValueRange, RangeResult, ValueRangePropagation},
    config::VrpConfig,
    ir::{Function, SsaNameId},
    Result,
};

/// Range results of a set of functions, safe to share between threads.
pub struct RangeContext {
    pass: ValueRangePropagation,
    results: DashMap<String, RangeResult>,
}

impl Default for RangeContext {
    fn default() -> Self {
        Self::new(VrpConfig::default())
    }
}

impl RangeContext {
    /// Creates an empty context running the default pass under `config`.
    #[must_use]
    pub fn new(config: VrpConfig) -> Self {
        Self::with_pass(ValueRangePropagation::new(config))
    }

    /// Creates an empty context running `pass`.
    #[must_use]
    pub fn with_pass(pass: ValueRangePropagation) -> Self {
        Self {
            pass,
            results: DashMap::new(),
        }
    }

    /// The pass used for every function.
    #[must_use]
    pub fn pass(&self) -> &ValueRangePropagation {
        &self.pass
    }

    /// Analyzes one function and stores its result, replacing any earlier
    /// result under the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if `func` fails validation.
    pub fn analyze(&self, func: &mut Function) -> Result<()> {
        let result = self.pass.run(func)?;
        self.results.insert(func.name().to_string(), result);
        Ok(())
    }

    /// Analyzes every function of `funcs` in parallel.
    ///
    /// Returns the number of functions analyzed. Functions sharing a name
    /// overwrite each other's result.
    ///
    /// # Errors
    ///
    /// Returns the error of an invalid function. Results of functions that
    /// finished before it stay stored.
    pub fn analyze_all(&self, funcs: &mut [Function]) -> Result<usize> {
        funcs
            .par_iter_mut()
            .try_for_each(|func| self.analyze(func))?;
        debug!("analyzed {} functions", funcs.len());
        Ok(funcs.len())
    }

    /// The result for the function called `name`.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<RangeResult> {
        self.results.get(name).map(|r| r.value().clone())
    }

    /// Runs `f` on the result for the function called `name` without
    /// cloning it.
    pub fn with_result<R, F>(&self, name: &str, f: F) -> Option<R>
    where
        F: FnOnce(&RangeResult) -> R,
    {
        self.results.get(name).map(|r| f(r.value()))
    }

    /// The range of `ssa_name` in the function called `function`.
    #[must_use]
    pub fn range_of(&self, function: &str, ssa_name: SsaNameId) -> Option<ValueRange> {
        self.with_result(function, |r| r.range(ssa_name).cloned())
            .flatten()
    }

    /// Number of functions with a stored result.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.results.len()
    }

    /// Names of all analyzed functions, in no particular order.
    #[must_use]
    pub fn function_names(&self) -> Vec<String> {
        self.results.iter().map(|r| r.key().clone()).collect()
    }

    /// Drops every stored result.
    pub fn clear(&self) {
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CmpOp, ScalarType, SsaFunctionBuilder};

    fn bounded(name: &str, limit: i128) -> Function {
        SsaFunctionBuilder::new(name)
            .build_with(|f| {
                let x = f.param(ScalarType::u8());
                f.block(0, |b| b.branch(CmpOp::Lt, x, limit, 1, 2));
                f.block(1, |b| {
                    let y = b.add(x, 1);
                    b.ret_val(y);
                });
                f.block(2, |b| b.ret_val(0));
            })
            .unwrap()
    }

    #[test]
    fn test_analyze_all_stores_every_function() {
        let mut funcs: Vec<Function> = (1..=16)
            .map(|i| bounded(&format!("f{i}"), i))
            .collect();
        let context = RangeContext::default();
        assert_eq!(context.analyze_all(&mut funcs).unwrap(), 16);
        assert_eq!(context.function_count(), 16);

        for i in 1..=16 {
            let y = context.range_of(&format!("f{i}"), SsaNameId::new(1)).unwrap();
            assert_eq!(y, ValueRange::range(1, i));
        }
        assert!(context.range_of("missing", SsaNameId::new(0)).is_none());
    }

    #[test]
    fn test_result_and_clear() {
        let mut func = bounded("g", 4);
        let context = RangeContext::new(VrpConfig::default());
        context.analyze(&mut func).unwrap();

        let result = context.result("g").unwrap();
        assert_eq!(result.function(), "g");
        assert_eq!(
            context.with_result("g", RangeResult::converged),
            Some(true)
        );
        assert_eq!(context.function_names(), vec!["g".to_string()]);

        context.clear();
        assert_eq!(context.function_count(), 0);
        assert!(context.result("g").is_none());
    }
}
