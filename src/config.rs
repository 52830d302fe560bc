//! Optimizer configuration.
//!
//! [`OptimizerConfig`] collects the knobs shared by the analyses and the pass
//! scheduler. Every field has a default that runs each analysis to its fixed
//! point on all available cores.

/// Configuration for the analyses and the pass scheduler.
///
/// # Example
///
/// ```rust
/// use optscope::config::OptimizerConfig;
///
/// let config = OptimizerConfig {
///     parallel: false,
///     ..OptimizerConfig::default()
/// };
/// assert!(config.max_sweeps.is_none());
/// assert_eq!(config.entry_names, ["main", "Main"]);
/// ```
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Upper bound on solver sweeps per dataflow problem (default: none).
    ///
    /// `None` runs every problem to its fixed point. A bound yields the
    /// approximation reached after that many sweeps.
    pub max_sweeps: Option<usize>,

    /// Run per-method passes on the rayon pool (default: true).
    pub parallel: bool,

    /// Method names tried, in order, when choosing the program entry
    /// (default: `main`, `Main`).
    pub entry_names: Vec<String>,

    /// Split merge points before partial redundancy elimination (default: true).
    ///
    /// With splitting disabled, a method that still has an unsplit merge
    /// point is rejected as malformed.
    pub split_critical_edges: bool,

    /// Nest callee loops under the loops that call them (default: true).
    pub interprocedural_nesting: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_sweeps: None,
            parallel: true,
            entry_names: vec!["main".to_string(), "Main".to_string()],
            split_critical_edges: true,
            interprocedural_nesting: true,
        }
    }
}

impl OptimizerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that runs everything on the calling thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Caps the solver at `sweeps` sweeps per problem.
    #[must_use]
    pub fn with_max_sweeps(mut self, sweeps: usize) -> Self {
        self.max_sweeps = Some(sweeps);
        self
    }

    /// Replaces the entry method names.
    #[must_use]
    pub fn with_entry_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_names = names.into_iter().map(Into::into).collect();
        self
    }
}
