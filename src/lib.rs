// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # rangescope
//!
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://www.apache.org/licenses/LICENSE-2.0)
//!
//! Value range propagation for programs in SSA form. For every SSA name of
//! a function, `rangescope` computes a conservative set of values it may
//! hold at runtime, and for every control-flow edge whether it can be taken
//! at all.
//!
//! ## Features
//!
//! - **Four-state range lattice** - undefined, `[min, max]`, `~[min, max]`
//!   and varying, with symbolic `name + offset` bounds and overflow infinities
//! - **Transfer rules for every operator** - arithmetic, bitwise, shifts,
//!   conversions, comparisons, all exact on 64-bit values
//! - **Assertion synthesis** - branch and switch conditions, and pointer
//!   dereferences, become explicit refinements of the names they test
//! - **Sparse fixpoint engine** - only executable edges are followed, loop
//!   PHIs are widened and then narrowed with scalar evolution
//! - **Parallel batches** - [`context::RangeContext`] analyzes many
//!   functions at once
//!
//! ## Quick Start
//!
//! ```rust
//! use rangescope::prelude::*;
//!
//! // unsigned idx; if (idx < 10) { a = idx * 4; }
//! let mut func = SsaFunctionBuilder::new("index")
//!     .build_with(|f| {
//!         let idx = f.param(ScalarType::u32());
//!         f.block(0, |b| b.branch(CmpOp::Lt, idx, 10, 1, 2));
//!         f.block(1, |b| {
//!             let offset = b.mul(idx, 4);
//!             b.ret_val(offset);
//!         });
//!         f.block(2, |b| b.ret_val(0));
//!     })?;
//!
//! let result = ValueRangePropagation::new(VrpConfig::default()).run(&mut func)?;
//! let idx = SsaNameId::new(0);
//! let inside = result.range_in_block(idx, BlockId::new(1)).unwrap();
//! assert_eq!((inside.min(), inside.max()), (Bound::Const(0), Bound::Const(9)));
//! assert_eq!(result.range(SsaNameId::new(1)).unwrap().to_string(), "[0, 36]");
//! # Ok::<(), rangescope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The SSA representation: functions, blocks, names, types
//! - [`analysis::range`] - The lattice, the comparator, extractors and algebra
//! - [`analysis::assert`] - Assertion synthesis, insertion and removal
//! - [`analysis::propagate`] - The propagation engine and the pass driver
//! - [`context`] - Results for many functions
//! - [`config`] - Analysis switches
//! - [`utils`] - Bit sets and graph algorithms
//!
//! ## Error Handling
//!
//! The analysis itself never fails; it only loses precision. Errors come
//! from building or validating the program it is given:
//!
//! ```rust
//! use rangescope::{ir::SsaFunctionBuilder, Error};
//!
//! let built = SsaFunctionBuilder::new("f").build_with(|f| {
//!     f.block(0, |b| b.jump(7));
//! });
//! assert!(matches!(built, Err(Error::UnknownBlock(_) | Error::Malformed { .. })));
//! ```
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade: `trace` for every visit and
//! range change, `debug` for assertion handling and per-function summaries,
//! `warn` when propagation hits its visit cap. No logger is installed.
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! cargo +nightly fuzz run binary_extract --release
//! ```

pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use rangescope::prelude::*;
///
/// let vr = ValueRange::range(0, 9);
/// assert!(vr.is_range());
/// ```
pub mod prelude;

/// Analysis switches.
pub mod config;

/// Parallel analysis of many functions.
pub mod context;

/// The SSA program representation.
pub mod ir;

/// Value range analysis: lattice, assertions and propagation.
pub mod analysis;

/// Bit sets and graph algorithms.
pub mod utils;

pub use error::{Error, Result};
