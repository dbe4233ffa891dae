use thiserror::Error;

use crate::ir::{BlockId, ScalarType, SsaNameId};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

pub(crate) use malformed_error;

/// The generic Error type, which covers every error this library can return.
///
/// The range analysis itself is total: it never fails, it only loses
/// precision. Errors therefore only arise while constructing or validating
/// the program representation handed to the analysis.
///
/// # Error Categories
///
/// ## Construction Errors
/// - [`Error::Malformed`] - Structurally invalid function (dangling targets, double definitions)
/// - [`Error::UnknownBlock`] - A block identifier that does not exist
/// - [`Error::UnknownName`] - An SSA name that was never allocated
///
/// ## Type Errors
/// - [`Error::TypeMismatch`] - Operand types disagree where they must match
/// - [`Error::UnsupportedPrecision`] - Integer precision outside `1..=64`
///
/// # Examples
///
/// ```rust,ignore
/// use rangescope::{Error, ir::SsaFunctionBuilder};
///
/// match SsaFunctionBuilder::new("f").build_with(|f| { f.block(0, |b| b.jump(7)); }) {
///     Ok(func) => println!("built {}", func.name()),
///     Err(Error::UnknownBlock(block)) => eprintln!("bad jump to {block}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The function is structurally invalid and cannot be analyzed.
    ///
    /// Raised by validation for conditions such as a name defined twice or a
    /// PHI that references a block which is not a predecessor. Includes the
    /// source location where the problem was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A terminator, PHI operand or query referenced a block that does not exist.
    #[error("Unknown block {0}")]
    UnknownBlock(BlockId),

    /// An operand referenced an SSA name that was never allocated.
    #[error("Unknown SSA name {0}")]
    UnknownName(SsaNameId),

    /// An operand's type does not match the type required by its use.
    ///
    /// For example the two sides of a comparison, or a PHI argument whose
    /// type differs from the PHI result.
    #[error("Type mismatch for {name}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The name whose type is wrong
        name: SsaNameId,
        /// The type the use site requires
        expected: ScalarType,
        /// The type the name actually has
        found: ScalarType,
    },

    /// An integer type was requested with a precision the analysis cannot represent.
    ///
    /// Bounds are held as `i128`, so precisions from 1 to 64 bits are supported.
    #[error("Unsupported integer precision {0}")]
    UnsupportedPrecision(u32),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
