//! Resolution session: matcher construction and the run entry point
//!
//! A [`Session`] owns every matcher and placeholder created through it.
//! Matchers are configured through [`MatcherEditor`]s, frozen with `build`,
//! and resolved together by [`Session::run`], which consumes the session.
//!
//! ```ignore
//! let mut session = Session::new();
//! let base = session.first_class(|m| {
//!     m.name("app.BaseActivity");
//! });
//! let main = session.first_class(|m| {
//!     m.super_class(base).key("main");
//! });
//! session.methods(|m| {
//!     m.declaring_class(main).name(NameFilter::prefix("on")).key("callbacks");
//! });
//! let result = session.run(&pool, &pool)?;
//! ```

use std::error::Error as StdError;
use std::sync::Arc;

use crate::catalog::NameCatalog;
use crate::config::SessionConfig;
use crate::error::{MatchError, TaskError};
use crate::matcher::{
    Class, Constructor, DependencyGraph, Entity, Field, Kind, MatcherEditor, Method, NameFilter,
    SlotId,
};
use crate::placeholder::{Callback, Match, MatcherId, Placeholder, Sequence};
use crate::policy::{ContinuePolicy, Decision, ExceptionPolicy};
use crate::reflect::{NameSource, Reflector};
use crate::result::{MatchResult, MatcherReport, Outcome};
use crate::scheduler::{Scheduler, WorkerPool};

/// Owner of a set of matchers resolved together
pub struct Session {
    graph: DependencyGraph,
    config: SessionConfig,
    policy: Arc<dyn ExceptionPolicy>,
    pool: Option<WorkerPool>,
    last_result: Option<MatchResult>,
}

impl Session {
    /// Session with default configuration
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Session with explicit configuration
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            graph: DependencyGraph::new(),
            config,
            policy: Arc::new(ContinuePolicy),
            pool: None,
            last_result: None,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of matchers created so far
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Check if no matcher was created
    pub fn is_empty(&self) -> bool {
        self.graph.len() == 0
    }

    // ========================================================================
    // Options
    // ========================================================================

    /// Replace the exception policy
    pub fn set_exception_policy(&mut self, policy: Arc<dyn ExceptionPolicy>) -> &mut Self {
        self.policy = policy;
        self
    }

    /// Use a closure as the exception policy
    pub fn set_exception_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&(dyn StdError + 'static)) -> Decision + Send + Sync + 'static,
    {
        self.policy = Arc::new(handler);
        self
    }

    /// Use `pool` instead of the one derived from the configuration
    pub fn set_worker_pool(&mut self, pool: WorkerPool) -> &mut Self {
        self.pool = Some(pool);
        self
    }

    /// Seed keyed matchers from a previous run
    ///
    /// A keyed matcher whose key resolved to a non-empty value in `result` is
    /// published from it directly and never evaluated.
    pub fn set_last_result(&mut self, result: MatchResult) -> &mut Self {
        self.last_result = Some(result);
        self
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Create an empty matcher of kind `K`
    pub fn matcher<K: Kind>(&mut self) -> MatcherId<K> {
        MatcherId::new(self.graph.insert(K::KIND))
    }

    /// Editor for an unbuilt matcher
    pub fn edit<K: Kind>(&mut self, id: MatcherId<K>) -> Result<MatcherEditor<'_, K>, MatchError> {
        self.graph.editable(id.slot())?;
        Ok(MatcherEditor::new(&mut self.graph, id.slot()))
    }

    /// Freeze a matcher and return its multi-valued placeholder
    pub fn build<K: Kind>(&mut self, id: MatcherId<K>) -> Result<Sequence<K>, MatchError> {
        self.graph.finalize(id.slot())?;
        Ok(Sequence::new(id.slot()))
    }

    /// Freeze a match-first matcher and return its single-valued placeholder
    pub fn build_first<K: Kind>(&mut self, id: MatcherId<K>) -> Result<Match<K>, MatchError> {
        self.graph.editable(id.slot())?.constraints.match_first = true;
        self.graph.finalize(id.slot())?;
        Ok(Match::new(id.slot()))
    }

    fn configure<K: Kind>(
        &mut self,
        first: bool,
        configure: impl FnOnce(&mut MatcherEditor<'_, K>),
    ) -> SlotId {
        let slot = self.graph.insert(K::KIND);
        let mut editor = MatcherEditor::new(&mut self.graph, slot);
        configure(&mut editor);
        let matcher = self.graph.matcher_mut(slot);
        if first {
            matcher.constraints.match_first = true;
        }
        matcher.finalized = true;
        slot
    }

    /// Create, configure and build a match-all matcher
    pub fn all<K: Kind>(&mut self, configure: impl FnOnce(&mut MatcherEditor<'_, K>)) -> Sequence<K> {
        Sequence::new(self.configure(false, configure))
    }

    /// Create, configure and build a match-first matcher
    pub fn first<K: Kind>(&mut self, configure: impl FnOnce(&mut MatcherEditor<'_, K>)) -> Match<K> {
        Match::new(self.configure(true, configure))
    }

    /// All classes matching the constraints
    pub fn classes(&mut self, configure: impl FnOnce(&mut MatcherEditor<'_, Class>)) -> Sequence<Class> {
        self.all(configure)
    }

    /// First class matching the constraints
    pub fn first_class(&mut self, configure: impl FnOnce(&mut MatcherEditor<'_, Class>)) -> Match<Class> {
        self.first(configure)
    }

    /// Class with exactly this name
    pub fn exact_class(&mut self, name: impl Into<String>) -> Match<Class> {
        let name = NameFilter::exact(name);
        self.first(|m: &mut MatcherEditor<'_, Class>| {
            m.name(name);
        })
    }

    /// All fields matching the constraints
    pub fn fields(&mut self, configure: impl FnOnce(&mut MatcherEditor<'_, Field>)) -> Sequence<Field> {
        self.all(configure)
    }

    /// First field matching the constraints
    pub fn first_field(&mut self, configure: impl FnOnce(&mut MatcherEditor<'_, Field>)) -> Match<Field> {
        self.first(configure)
    }

    /// All methods matching the constraints
    pub fn methods(&mut self, configure: impl FnOnce(&mut MatcherEditor<'_, Method>)) -> Sequence<Method> {
        self.all(configure)
    }

    /// First method matching the constraints
    pub fn first_method(&mut self, configure: impl FnOnce(&mut MatcherEditor<'_, Method>)) -> Match<Method> {
        self.first(configure)
    }

    /// All constructors matching the constraints
    pub fn constructors(
        &mut self,
        configure: impl FnOnce(&mut MatcherEditor<'_, Constructor>),
    ) -> Sequence<Constructor> {
        self.all(configure)
    }

    /// First constructor matching the constraints
    pub fn first_constructor(
        &mut self,
        configure: impl FnOnce(&mut MatcherEditor<'_, Constructor>),
    ) -> Match<Constructor> {
        self.first(configure)
    }

    // ========================================================================
    // Consumers
    // ========================================================================

    /// Record a placeholder's values under `key` in the result
    pub fn set_key<P: Placeholder>(&mut self, placeholder: &P, key: impl Into<String>) -> &mut Self {
        self.graph.set_key(placeholder.slot(), key.into());
        self
    }

    /// Call `f` with the values once the placeholder resolves non-empty
    pub fn on_match<P, F>(&mut self, placeholder: &P, f: F) -> &mut Self
    where
        P: Placeholder,
        F: Fn(&[Entity]) + Send + Sync + 'static,
    {
        self.graph
            .add_callback(placeholder.slot(), Callback::Match(Box::new(f)));
        self
    }

    /// Call `f` once if the placeholder resolves empty
    pub fn on_miss<P, F>(&mut self, placeholder: &P, f: F) -> &mut Self
    where
        P: Placeholder,
        F: Fn() + Send + Sync + 'static,
    {
        self.graph
            .add_callback(placeholder.slot(), Callback::Miss(Box::new(f)));
        self
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve every matcher
    ///
    /// Builds the name catalog from `names`, seeds keyed matchers from the last
    /// result, then sweeps to a fixed point. Fails only on catalog retrieval
    /// errors and protocol violations; candidate and task failures go to the
    /// exception policy.
    pub fn run(
        mut self,
        names: &dyn NameSource,
        reflector: &dyn Reflector,
    ) -> Result<MatchResult, MatchError> {
        let catalog = NameCatalog::build(names.name_lists()?);

        let seed_panics = match self.last_result.take() {
            Some(last) => self.seed(&last, reflector)?,
            None => Vec::new(),
        };

        let pool = self.pool.unwrap_or_else(|| self.config.worker_pool());
        let scheduler = Scheduler::new(
            &self.graph,
            &catalog,
            reflector,
            self.policy.as_ref(),
            pool,
            &self.config,
        );
        for (slot, panics) in seed_panics {
            scheduler.observer_panics(slot, panics);
        }
        let resolution = scheduler.run()?;

        Ok(MatchResult::collect(
            &self.graph,
            reflector,
            resolution.sweeps,
            resolution.failures,
            self.config.prune_unconsumed,
        ))
    }

    /// Publish keyed matchers from a previous result
    ///
    /// Saved values are re-resolved by name; a matcher whose values no longer
    /// resolve is left for normal evaluation. Returns observer panics per
    /// seeded slot.
    fn seed(
        &mut self,
        last: &MatchResult,
        reflector: &dyn Reflector,
    ) -> Result<Vec<(SlotId, Vec<TaskError>)>, MatchError> {
        let seeded: Vec<_> = self
            .graph
            .ids()
            .filter_map(|slot| {
                let matcher = self.graph.matcher(slot);
                let report = last.keyed(matcher.key.as_deref()?)?;
                let usable = report.kind == matcher.kind
                    && report.outcome == Outcome::Resolved
                    && !report.values.is_empty();
                if !usable {
                    return None;
                }
                relocate(slot, report, reflector).map(|values| (slot, values))
            })
            .collect();

        // All seeded matchers leave the graph before any of them publishes
        for (slot, _) in &seeded {
            self.graph.detach(*slot);
        }
        let mut panics = Vec::new();
        for (slot, values) in seeded {
            tracing::debug!(slot = %slot, values = values.len(), "matcher.seeded");
            let publication = self.graph.publish(slot, values, 0)?;
            if !publication.panics.is_empty() {
                panics.push((slot, publication.panics));
            }
        }
        Ok(panics)
    }
}

/// Saved values re-resolved through `reflector`, or `None` if any is gone
fn relocate(
    slot: SlotId,
    report: &MatcherReport,
    reflector: &dyn Reflector,
) -> Option<Vec<Entity>> {
    if report.names.len() != report.values.len() {
        tracing::debug!(slot = %slot, "matcher.seed_unnamed");
        return None;
    }
    let mut values = Vec::with_capacity(report.values.len());
    for (value, name) in report.values.iter().zip(&report.names) {
        match name.locate(reflector, value) {
            Ok(Some(value)) => values.push(value),
            Ok(None) => {
                tracing::debug!(
                    slot = %slot,
                    class = %name.class,
                    member = ?name.member,
                    "matcher.seed_stale"
                );
                return None;
            }
            Err(err) => {
                tracing::debug!(slot = %slot, error = %err, "matcher.seed_stale");
                return None;
            }
        }
    }
    Some(values)
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
