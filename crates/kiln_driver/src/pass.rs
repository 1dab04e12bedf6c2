//! Passes, pass factories and the per-stage pass lists.
//!
//! A pass rewrites the program tree. It reports what it touched through the
//! [`PassContext`]'s change tracker and reports problems through the sink; it
//! sees the chunk graph read-only and cannot move units between chunks.

use kiln_chunks::{ChunkGraph, InputCatalog};
use kiln_diagnostics::{Diagnostic, DiagnosticSink};
use std::fmt;

use crate::change::{ChangeTracker, ScopeRef};
use crate::program::Program;
use crate::session::SessionState;

/// A transformation or check over the program tree.
pub trait Pass<A> {
    /// Runs the pass once over every script.
    fn process(&mut self, cx: &mut PassContext<'_>, program: &mut Program<A>);
}

/// What a running pass may see and record.
pub struct PassContext<'a> {
    pass_name: &'a str,
    /// Where diagnostics go.
    pub sink: &'a DiagnosticSink,
    /// Change and delete logs for the whole session.
    pub changes: &'a mut ChangeTracker<ScopeRef>,
    /// Generated names, feature set and injected libraries.
    pub session: &'a mut SessionState,
    /// Registered units.
    pub catalog: &'a InputCatalog,
    /// The chunk graph.
    pub graph: &'a ChunkGraph,
}

impl<'a> PassContext<'a> {
    pub(crate) fn new(
        pass_name: &'a str,
        sink: &'a DiagnosticSink,
        changes: &'a mut ChangeTracker<ScopeRef>,
        session: &'a mut SessionState,
        catalog: &'a InputCatalog,
        graph: &'a ChunkGraph,
    ) -> Self {
        Self {
            pass_name,
            sink,
            changes,
            session,
            catalog,
            graph,
        }
    }

    /// Name of the running pass.
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    /// Records that `scope` changed.
    pub fn report_change(&mut self, scope: ScopeRef) {
        self.changes.record_changed(scope);
    }

    /// Records that `scope` was deleted.
    pub fn report_deleted(&mut self, scope: ScopeRef) {
        self.changes.record_deleted(scope);
    }

    /// Scopes changed since this pass last asked, keyed by the pass name.
    pub fn changed_scopes(&mut self) -> Vec<ScopeRef> {
        self.changes.since_mark(self.pass_name)
    }

    /// Scopes deleted since this pass last asked.
    pub fn deleted_scopes(&mut self) -> Vec<ScopeRef> {
        self.changes.deleted_since_mark(self.pass_name)
    }

    /// Emits a diagnostic.
    pub fn report(&self, diag: Diagnostic) {
        self.sink.emit(diag);
    }
}

type CreatePass<A> = Box<dyn Fn() -> Box<dyn Pass<A>> + Send + Sync>;

/// Creates a fresh pass instance each time the pass runs.
pub struct PassFactory<A> {
    name: String,
    fixed_point: bool,
    create: CreatePass<A>,
}

impl<A> PassFactory<A> {
    /// Creates a factory for a pass that runs once per appearance.
    pub fn new<P, C>(name: impl Into<String>, create: C) -> Self
    where
        P: Pass<A> + 'static,
        C: Fn() -> P + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            fixed_point: false,
            create: Box::new(move || Box::new(create()) as Box<dyn Pass<A>>),
        }
    }

    /// Lets the pass join a fixed-point loop with its fixed-point neighbours.
    pub fn fixed_point(mut self) -> Self {
        self.fixed_point = true;
        self
    }

    /// The pass name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the pass runs in a fixed-point loop.
    pub fn is_fixed_point(&self) -> bool {
        self.fixed_point
    }

    /// Creates a pass instance.
    pub fn create(&self) -> Box<dyn Pass<A>> {
        (self.create)()
    }
}

impl<A> fmt::Debug for PassFactory<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassFactory")
            .field("name", &self.name)
            .field("fixed_point", &self.fixed_point)
            .finish()
    }
}

/// The passes each stage runs, in order.
pub struct PassConfig<A> {
    /// Host passes run at the start of the checks stage.
    pub custom_before_checks: Vec<PassFactory<A>>,
    /// Check passes.
    pub checks: Vec<PassFactory<A>>,
    /// Host passes run at the end of the checks stage, before optimization.
    pub custom_before_optimizations: Vec<PassFactory<A>>,
    /// Transpilation and optimization passes.
    pub optimizations: Vec<PassFactory<A>>,
    /// Finalization passes.
    pub finalizations: Vec<PassFactory<A>>,
    /// The coverage instrumentation pass.
    pub instrumentation: Option<PassFactory<A>>,
    /// Checks tree consistency in dev mode.
    pub validity_check: Option<PassFactory<A>>,
}

impl<A> Default for PassConfig<A> {
    fn default() -> Self {
        Self {
            custom_before_checks: Vec::new(),
            checks: Vec::new(),
            custom_before_optimizations: Vec::new(),
            optimizations: Vec::new(),
            finalizations: Vec::new(),
            instrumentation: None,
            validity_check: None,
        }
    }
}

/// A unit of scheduling: one pass, or a run of consecutive fixed-point passes
/// that loop together.
pub(crate) enum PassGroup<'a, A> {
    Once(&'a PassFactory<A>),
    FixedPoint(&'a [PassFactory<A>]),
}

impl<A> PassGroup<'_, A> {
    pub(crate) fn name(&self) -> String {
        match self {
            PassGroup::Once(f) => f.name().to_string(),
            PassGroup::FixedPoint(fs) => fs
                .iter()
                .map(PassFactory::name)
                .collect::<Vec<_>>()
                .join("+"),
        }
    }
}

/// Splits a pass list into groups, merging consecutive fixed-point passes.
pub(crate) fn group_passes<A>(passes: &[PassFactory<A>]) -> Vec<PassGroup<'_, A>> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < passes.len() {
        if !passes[i].is_fixed_point() {
            groups.push(PassGroup::Once(&passes[i]));
            i += 1;
            continue;
        }
        let start = i;
        while i < passes.len() && passes[i].is_fixed_point() {
            i += 1;
        }
        groups.push(PassGroup::FixedPoint(&passes[start..i]));
    }
    groups
}
