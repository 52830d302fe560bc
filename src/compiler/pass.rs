//! The [`Pass`] trait implemented by every analysis and transformation.

use crate::{
    compiler::{context::CompilerContext, job::JobKind},
    ir::MethodId,
    Result,
};

/// An analysis or transformation the [`crate::compiler::PassScheduler`] can run.
///
/// All passes must be thread-safe (`Send + Sync`): per-method passes run on
/// several methods at once. A pass reaches the IR and the cached results of
/// other passes through the shared [`CompilerContext`].
///
/// # Jobs
///
/// A pass provides exactly one job ([`Pass::job_id`]). Before it runs, the
/// scheduler makes every job in [`Pass::dependences`] valid, running their
/// providers where needed. After it runs on a method, the jobs in
/// [`Pass::invalidations`] are cleared for that method.
pub trait Pass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// The job this pass provides.
    fn job_id(&self) -> JobKind;

    /// Jobs that must be valid before the pass runs.
    fn dependences(&self) -> JobKind {
        JobKind::empty()
    }

    /// Jobs whose results this pass makes stale.
    fn invalidations(&self) -> JobKind {
        JobKind::empty()
    }

    /// Version of the pass.
    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Authors of the algorithm.
    fn author(&self) -> &'static str;

    /// One line description of what the pass computes.
    fn informations(&self) -> &'static str;

    /// Build flags the pass was compiled with.
    fn compilation_flags(&self) -> &'static str {
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        }
    }

    /// Runs the pass on a single method.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The compiler context, shared by all passes.
    /// * `method` - The method to process.
    ///
    /// # Errors
    ///
    /// Returns an error if the method violates an assumption of the pass.
    fn run_on_method(&self, ctx: &CompilerContext, method: MethodId) -> Result<()>;

    /// Does this pass operate on the whole program at once?
    ///
    /// Global passes have [`Pass::run_global`] called instead of
    /// [`Pass::run_on_method`] for every method.
    fn is_global(&self) -> bool {
        false
    }

    /// Runs the pass on the whole program.
    ///
    /// # Errors
    ///
    /// Returns an error if any method violates an assumption of the pass.
    fn run_global(&self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }
}
