//! Shipped passes, one provider per [`crate::compiler::JobKind`].

mod analyses;
mod ddg;
mod induction;
mod loops;
mod pre;

pub use analyses::{EscapesPass, LivenessPass, PreDominatorsPass, ReachingDefinitionsPass};
pub use ddg::DataDependencesPass;
pub use induction::InductionVariablesPass;
pub use loops::{LoopIdentificationPass, LoopInvariantsPass};
pub use pre::PartialRedundancyPass;
