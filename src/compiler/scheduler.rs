//! Pass scheduler for orchestrating analyses and transformations.
//!
//! The `PassScheduler` keeps one provider pass per job. Running a pass first
//! makes its dependences valid, running their providers on the methods that
//! lack them, then runs the pass and clears the jobs it invalidates.

use rayon::prelude::*;

use crate::{
    compiler::{
        context::CompilerContext,
        job::JobKind,
        pass::Pass,
        passes::{
            DataDependencesPass, EscapesPass, InductionVariablesPass, LivenessPass,
            LoopIdentificationPass, LoopInvariantsPass, PartialRedundancyPass,
            PreDominatorsPass, ReachingDefinitionsPass,
        },
    },
    ir::MethodId,
    Error, Result,
};

/// Orders passes by their declared dependences and runs them.
///
/// # Example
///
/// ```rust
/// use optscope::compiler::{CompilerContext, JobKind, PassScheduler};
/// use optscope::config::OptimizerConfig;
/// use optscope::ir::{MethodBuilder, Program};
///
/// let mut b = MethodBuilder::new("main");
/// let x = b.var();
/// b.mov(x, 1);
/// b.ret(Some(x.into()));
/// let mut program = Program::new();
/// let main = program.add_method(b.build());
///
/// let ctx = CompilerContext::new(program, OptimizerConfig::default());
/// PassScheduler::new().run_jobs(&ctx, JobKind::INDUCTION_VARIABLES)?;
/// assert!(ctx.is_valid(main, JobKind::LOOP_IDENTIFICATION | JobKind::INDUCTION_VARIABLES));
/// assert!(!ctx.is_valid(main, JobKind::LIVENESS));
/// # Ok::<(), optscope::Error>(())
/// ```
pub struct PassScheduler {
    /// Providers, at most one per job.
    providers: Vec<Box<dyn Pass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PassScheduler {
    /// Creates a scheduler with the shipped provider of every job.
    #[must_use]
    pub fn new() -> Self {
        let mut scheduler = Self::empty();
        scheduler.register(Box::new(LivenessPass));
        scheduler.register(Box::new(ReachingDefinitionsPass));
        scheduler.register(Box::new(PreDominatorsPass));
        scheduler.register(Box::new(EscapesPass));
        scheduler.register(Box::new(LoopIdentificationPass));
        scheduler.register(Box::new(LoopInvariantsPass));
        scheduler.register(Box::new(InductionVariablesPass));
        scheduler.register(Box::new(PartialRedundancyPass));
        scheduler.register(Box::new(DataDependencesPass));
        scheduler
    }

    /// Creates a scheduler without providers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Makes `pass` the provider of its job, replacing any previous one.
    pub fn register(&mut self, pass: Box<dyn Pass>) {
        let job = pass.job_id();
        self.providers.retain(|p| p.job_id() != job);
        self.providers.push(pass);
    }

    /// The provider of `job`.
    #[must_use]
    pub fn provider(&self, job: JobKind) -> Option<&dyn Pass> {
        self.providers
            .iter()
            .find(|p| p.job_id() == job)
            .map(|p| p.as_ref())
    }

    /// Runs the providers of `jobs`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAnalysis`] if a job has no provider, and
    /// whatever a pass fails with.
    pub fn run_jobs(&self, ctx: &CompilerContext, jobs: JobKind) -> Result<()> {
        let passes = jobs
            .jobs()
            .map(|job| self.provider(job).ok_or(Error::MissingAnalysis(job.label())))
            .collect::<Result<Vec<_>>>()?;
        self.run(ctx, &passes)
    }

    /// Runs `passes` on every method, in dependence order.
    ///
    /// Requested passes always run. Providers of their dependences only run
    /// on the methods where the job is not valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for cyclic dependences,
    /// [`Error::MissingAnalysis`] if a dependence has no provider, and
    /// whatever a pass fails with. A failing pass stops the run.
    pub fn run(&self, ctx: &CompilerContext, passes: &[&dyn Pass]) -> Result<()> {
        for pass in self.order(passes)? {
            self.ensure(ctx, pass.dependences(), pass.job_id())?;
            Self::execute(ctx, pass, &ctx.methods())?;
        }
        Ok(())
    }

    /// Runs `passes` like [`PassScheduler::run`] and aborts the process on
    /// the first fault.
    pub fn run_or_abort(&self, ctx: &CompilerContext, passes: &[&dyn Pass]) {
        if let Err(error) = self.run(ctx, passes) {
            tracing::error!(%error, "analysis fault, aborting");
            std::process::abort();
        }
    }

    /// Sorts `passes` so that every pass comes after the requested passes
    /// providing its direct or transitive dependences. Independent passes
    /// keep their relative order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the dependences are cyclic.
    pub fn order<'p>(&self, passes: &[&'p dyn Pass]) -> Result<Vec<&'p dyn Pass>> {
        let needs: Vec<JobKind> = passes
            .iter()
            .map(|pass| self.closure(pass.dependences(), pass.job_id()))
            .collect::<Result<_>>()?;

        let mut remaining: Vec<usize> = (0..passes.len()).collect();
        let mut ordered = Vec::with_capacity(passes.len());
        while !remaining.is_empty() {
            let pending = remaining
                .iter()
                .fold(JobKind::empty(), |acc, &i| acc | passes[i].job_id());
            let Some(pos) = remaining.iter().position(|&i| {
                !needs[i].intersects(pending.difference(passes[i].job_id()))
            }) else {
                return Err(malformed_error!(
                    "cyclic dependences among passes: {}",
                    remaining
                        .iter()
                        .map(|&i| passes[i].name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            };
            ordered.push(passes[remaining.remove(pos)]);
        }
        Ok(ordered)
    }

    /// `jobs` together with everything their providers depend on.
    fn closure(&self, jobs: JobKind, origin: JobKind) -> Result<JobKind> {
        let mut closure = JobKind::empty();
        let mut pending = jobs;
        while let Some(job) = pending.jobs().next() {
            pending.remove(job);
            if job == origin {
                return Err(malformed_error!("{} depends on itself", origin.label()));
            }
            if closure.contains(job) {
                continue;
            }
            closure.insert(job);
            if let Some(provider) = self.provider(job) {
                pending.insert(provider.dependences().difference(closure));
            }
        }
        Ok(closure)
    }

    /// Makes `jobs` valid on every method. `visiting` holds the jobs whose
    /// dependences are being resolved.
    fn ensure(&self, ctx: &CompilerContext, jobs: JobKind, visiting: JobKind) -> Result<()> {
        for job in jobs.jobs() {
            if visiting.contains(job) {
                return Err(malformed_error!("cyclic dependence on {}", job.label()));
            }
            let stale: Vec<MethodId> = ctx
                .methods()
                .into_iter()
                .filter(|m| !ctx.is_valid(*m, job))
                .collect();
            if stale.is_empty() {
                continue;
            }
            let provider = self
                .provider(job)
                .ok_or(Error::MissingAnalysis(job.label()))?;
            self.ensure(ctx, provider.dependences(), visiting | job)?;
            Self::execute(ctx, provider, &stale)?;
        }
        Ok(())
    }

    /// Runs `pass` on `methods`, or once globally, and updates validity.
    fn execute(ctx: &CompilerContext, pass: &dyn Pass, methods: &[MethodId]) -> Result<()> {
        tracing::debug!(
            pass = pass.name(),
            job = pass.job_id().label(),
            methods = methods.len(),
            global = pass.is_global(),
            "running pass"
        );

        if pass.is_global() {
            pass.run_global(ctx)?;
            for &method in &ctx.methods() {
                ctx.invalidate(method, pass.invalidations());
                ctx.mark_valid(method, pass.job_id());
            }
            return Ok(());
        }

        let run = |&method: &MethodId| -> Result<()> {
            pass.run_on_method(ctx, method)?;
            ctx.invalidate(method, pass.invalidations());
            ctx.mark_valid(method, pass.job_id());
            Ok(())
        };
        if ctx.config().parallel {
            methods.par_iter().try_for_each(run)
        } else {
            methods.iter().try_for_each(run)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        config::OptimizerConfig,
        ir::{MethodBuilder, Program},
    };

    struct TestPass {
        name: &'static str,
        job: JobKind,
        dependences: JobKind,
        invalidations: JobKind,
        log: &'static Mutex<Vec<(&'static str, MethodId)>>,
    }

    impl Pass for TestPass {
        fn name(&self) -> &'static str {
            self.name
        }

        fn job_id(&self) -> JobKind {
            self.job
        }

        fn dependences(&self) -> JobKind {
            self.dependences
        }

        fn invalidations(&self) -> JobKind {
            self.invalidations
        }

        fn author(&self) -> &'static str {
            "test"
        }

        fn informations(&self) -> &'static str {
            "records every method it runs on"
        }

        fn run_on_method(&self, _ctx: &CompilerContext, method: MethodId) -> Result<()> {
            self.log.lock().unwrap().push((self.name, method));
            Ok(())
        }
    }

    fn leak_log() -> &'static Mutex<Vec<(&'static str, MethodId)>> {
        Box::leak(Box::new(Mutex::new(Vec::new())))
    }

    fn test_pass(
        name: &'static str,
        job: JobKind,
        dependences: JobKind,
        invalidations: JobKind,
        log: &'static Mutex<Vec<(&'static str, MethodId)>>,
    ) -> TestPass {
        TestPass {
            name,
            job,
            dependences,
            invalidations,
            log,
        }
    }

    fn two_methods() -> CompilerContext {
        let mut program = Program::new();
        for name in ["main", "helper"] {
            let mut b = MethodBuilder::new(name);
            b.ret(None);
            program.add_method(b.build());
        }
        CompilerContext::new(program, OptimizerConfig::sequential())
    }

    #[test]
    fn test_providers_run_before_dependents() {
        let log = leak_log();
        let mut scheduler = PassScheduler::empty();
        scheduler.register(Box::new(test_pass(
            "provider",
            JobKind::LIVENESS,
            JobKind::empty(),
            JobKind::empty(),
            log,
        )));
        let user = test_pass(
            "user",
            JobKind::DATA_DEPENDENCES,
            JobKind::LIVENESS,
            JobKind::empty(),
            log,
        );

        let ctx = two_methods();
        scheduler.run(&ctx, &[&user]).unwrap();
        let names: Vec<_> = log.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["provider", "provider", "user", "user"]);

        // The provider's job is still valid: only the requested pass reruns.
        log.lock().unwrap().clear();
        scheduler.run(&ctx, &[&user]).unwrap();
        let names: Vec<_> = log.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["user", "user"]);
    }

    #[test]
    fn test_invalidation_reruns_provider() {
        let log = leak_log();
        let mut scheduler = PassScheduler::empty();
        scheduler.register(Box::new(test_pass(
            "provider",
            JobKind::LIVENESS,
            JobKind::empty(),
            JobKind::empty(),
            log,
        )));
        let rewrite = test_pass(
            "rewrite",
            JobKind::PARTIAL_REDUNDANCY,
            JobKind::empty(),
            JobKind::ALL,
            log,
        );
        let user = test_pass(
            "user",
            JobKind::DATA_DEPENDENCES,
            JobKind::LIVENESS,
            JobKind::empty(),
            log,
        );

        let ctx = two_methods();
        scheduler.run(&ctx, &[&user, &rewrite]).unwrap();
        let names: Vec<_> = log.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            ["provider", "provider", "user", "user", "rewrite", "rewrite"]
        );
        assert!(!ctx.is_valid(MethodId::new(0), JobKind::LIVENESS));
        assert!(ctx.is_valid(MethodId::new(0), JobKind::PARTIAL_REDUNDANCY));
    }

    #[test]
    fn test_order_follows_dependences() {
        let log = leak_log();
        let scheduler = PassScheduler::empty();
        let late = test_pass(
            "late",
            JobKind::INDUCTION_VARIABLES,
            JobKind::LOOP_INVARIANTS,
            JobKind::empty(),
            log,
        );
        let early = test_pass(
            "early",
            JobKind::LOOP_INVARIANTS,
            JobKind::empty(),
            JobKind::empty(),
            log,
        );
        let ordered = scheduler.order(&[&late, &early]).unwrap();
        let names: Vec<_> = ordered.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["early", "late"]);
    }

    #[test]
    fn test_cyclic_dependences_rejected() {
        let log = leak_log();
        let mut scheduler = PassScheduler::empty();
        scheduler.register(Box::new(test_pass(
            "a",
            JobKind::LIVENESS,
            JobKind::ESCAPES,
            JobKind::empty(),
            log,
        )));
        scheduler.register(Box::new(test_pass(
            "b",
            JobKind::ESCAPES,
            JobKind::LIVENESS,
            JobKind::empty(),
            log,
        )));
        let ctx = two_methods();
        let result = scheduler.run_jobs(&ctx, JobKind::LIVENESS);
        assert!(matches!(result, Err(Error::Malformed { .. })));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_provider() {
        let log = leak_log();
        let scheduler = PassScheduler::empty();
        let user = test_pass(
            "user",
            JobKind::DATA_DEPENDENCES,
            JobKind::ESCAPES,
            JobKind::empty(),
            log,
        );
        let ctx = two_methods();
        let result = scheduler.run(&ctx, &[&user]);
        assert!(matches!(result, Err(Error::MissingAnalysis("escapes"))));
    }

    #[test]
    fn test_shipped_providers() {
        let scheduler = PassScheduler::new();
        for job in JobKind::EACH {
            let provider = scheduler.provider(job).unwrap();
            assert_eq!(provider.job_id(), job);
            assert!(!provider.author().is_empty());
            assert!(!provider.dependences().contains(job));
        }
    }
}
