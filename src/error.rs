use thiserror::Error;

use crate::ir::{InstId, LoopId, MethodId};

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

/// The analysis fault type shared by every pass in this crate.
///
/// All of these describe upstream contract violations: a pass that hits one
/// cannot produce a partial result. Analyses surface them as `Err` so they
/// can be tested, and [`crate::compiler::PassScheduler::run_or_abort`]
/// turns them into a process abort at the scheduling boundary.
///
/// # Error Categories
///
/// ## Malformed input
/// - [`Error::Malformed`] - A loop, method or instruction breaks an IR invariant
/// - [`Error::UnresolvedCallee`] - A call instruction has no resolvable target
/// - [`Error::CyclicNesting`] - A nesting traversal found a cycle
///
/// ## Lookup failures
/// - [`Error::MissingEntryPoint`] - No entry method could be chosen
/// - [`Error::MissingAnalysis`] - Facts were requested before their provider ran
/// - [`Error::UnknownMethod`] / [`Error::UnknownLoop`] - Identifier out of range
///
/// ## Runtime
/// - [`Error::LockError`] - A per-method lock was poisoned
///
/// # Examples
///
/// ```rust
/// use optscope::{ir::Program, Error};
///
/// let program = Program::new();
/// match program.lock(optscope::ir::MethodId::new(3)) {
///     Err(Error::UnknownMethod(id)) => assert_eq!(id.index(), 3),
///     _ => unreachable!(),
/// };
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input violates an IR invariant.
    ///
    /// The error includes the source location where the violation was
    /// detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A call instruction could not be resolved to any callee.
    #[error("Unresolved callee at {method:?}:{instruction:?}")]
    UnresolvedCallee {
        /// Method containing the call
        method: MethodId,
        /// The call instruction
        instruction: InstId,
    },

    /// A loop nesting walk visited the same loop twice.
    #[error("Cyclic loop nesting detected at {0:?}")]
    CyclicNesting(LoopId),

    /// Neither a named entry method nor a runtime default entry exists.
    #[error("No entry point available")]
    MissingEntryPoint,

    /// A consumer requested facts that were never computed.
    #[error("Analysis not available: {0}")]
    MissingAnalysis(&'static str),

    /// The method identifier does not name a method of the program.
    #[error("Unknown method {0:?}")]
    UnknownMethod(MethodId),

    /// The loop identifier does not name a loop of the loop set.
    #[error("Unknown loop {0:?}")]
    UnknownLoop(LoopId),

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
