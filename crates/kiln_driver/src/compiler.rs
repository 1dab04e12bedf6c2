//! The compiler: registers inputs, orders them, and drives the pass stages.
//!
//! [`Compiler`] is the facade callers hold. The state it drives lives in a
//! [`Core`], which each stage call moves onto the compiler thread and back.
//! If a call times out or panics the core is lost, and every later call on
//! that compiler fails with an [`InternalError`].
//!
//! Stages run in a fixed order and each one refuses to start once the sink
//! holds a halting error; [`Compiler::compile`] checks for errors between
//! stages so a failed build stops gracefully instead of hitting that guard.

use kiln_chunks::{
    manage_dependencies, ChunkGraph, ChunkSpec, DependencyOptions, InputCatalog, UnitId, UnitSpec,
};
use kiln_common::{ensure_state, InternalError, Interner, KilnResult};
use kiln_config::{CompilerOptions, DevMode};
use kiln_diagnostics::{Diagnostic, DiagnosticSink};
use kiln_source::{InputId, SourceLoader};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::change::{ChangeTracker, ScopeRef};
use crate::errors;
use crate::executor::Executor;
use crate::frontend::Frontend;
use crate::pass::{group_passes, PassConfig, PassContext, PassFactory, PassGroup};
use crate::pipeline::PipelineState;
use crate::prepare::Prepare;
use crate::program::{Program, Script, ScriptPos};
use crate::session::SessionState;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Which cap and warning a fixed-point loop uses.
#[derive(Debug, Clone, Copy)]
enum LoopKind {
    Optimize,
    Motion,
}

/// The outcome of [`Compiler::compile`].
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// The last state reached.
    pub state: PipelineState,
    /// `true` if no halting error was reported.
    pub success: bool,
    /// Number of errors reported.
    pub error_count: usize,
    /// Number of warnings reported.
    pub warning_count: usize,
    /// Everything reported, in order.
    pub diagnostics: Vec<Diagnostic>,
}

/// The state one compilation works on.
pub(crate) struct Core<F: Frontend> {
    pub(crate) options: CompilerOptions,
    pub(crate) frontend: F,
    pub(crate) loader: Arc<dyn SourceLoader>,
    pub(crate) sink: Arc<DiagnosticSink>,
    pub(crate) interner: Interner,
    pub(crate) passes: Arc<PassConfig<F::Ast>>,
    pub(crate) catalog: InputCatalog,
    pub(crate) graph: Option<ChunkGraph>,
    pub(crate) program: Program<F::Ast>,
    pub(crate) script_index: Option<HashMap<InputId, ScriptPos>>,
    pub(crate) changes: ChangeTracker<ScopeRef>,
    pub(crate) session: SessionState,
    pub(crate) state: PipelineState,
    pub(crate) initialized: bool,
    pub(crate) span: tracing::Span,
}

impl<F: Frontend> Core<F> {
    fn init(&mut self, externs: Vec<UnitSpec>, chunks: Vec<ChunkSpec>) -> KilnResult<()> {
        ensure_state!(!self.initialized, "init may only be called once");
        self.initialized = true;

        for spec in externs {
            let _ = self.catalog.register(spec, true, &self.sink);
        }
        match ChunkGraph::build(chunks, &mut self.catalog, &self.sink) {
            Ok(graph) => self.graph = Some(graph),
            Err(e) => {
                tracing::debug!(error = %e, "chunk graph rejected");
                self.sink.emit(e.to_diagnostic());
            }
        }
        Ok(())
    }

    fn begin_stage(&self, next: PipelineState) -> KilnResult<()> {
        ensure_state!(self.graph.is_some(), "no inputs: init must succeed before {next}");
        ensure_state!(
            !self.sink.has_errors(),
            "cannot start {next}: halting errors were reported"
        );
        ensure_state!(
            self.state.can_advance_to(next),
            "cannot move from {} to {next}",
            self.state
        );
        Ok(())
    }

    fn advance(&mut self, next: PipelineState) {
        tracing::debug!(from = %self.state, to = %next, "stage complete");
        self.state = next;
    }

    fn instrument_only(&self) -> bool {
        self.options.build.instrument_for_coverage_only
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn parse(&mut self) -> KilnResult<()> {
        self.begin_stage(PipelineState::Parsed)?;

        let units: Vec<UnitId> = self.catalog.units().map(|(id, _)| id).collect();
        let trees = Prepare {
            catalog: &self.catalog,
            frontend: &self.frontend,
            loader: &*self.loader,
            interner: &self.interner,
            sink: &self.sink,
        }
        .run(&units, self.options.executor.threads)?;
        let mut trees: HashMap<UnitId, F::Ast> = units
            .into_iter()
            .zip(trees)
            .filter_map(|(unit, tree)| tree.map(|t| (unit, t)))
            .collect();

        self.order_inputs();
        self.program = self.build_program(&mut trees);
        self.script_index = None;

        if self.options.build.dev_mode != DevMode::Off {
            self.run_validity_check()?;
        }
        self.advance(PipelineState::Parsed);
        Ok(())
    }

    /// Marks annotated externs, applies dependency management, then hoists
    /// externs and drops no-compile units.
    fn order_inputs(&mut self) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        let marked = self
            .catalog
            .mark_externs(graph, |u| u.dependency_info().is_externs);

        let options = DependencyOptions::from_options(&self.options);
        if let Err(e) = manage_dependencies(&mut self.catalog, graph, &options, &self.interner) {
            tracing::debug!(error = %e, "dependency management stopped");
            self.sink.emit(e.to_diagnostic());
        }

        let hoisted = self.catalog.hoist_annotated(graph, |u| u.is_extern);
        self.catalog.fill_empty_chunks(graph);
        let filtered = self
            .catalog
            .filter_annotated(graph, |u| u.dependency_info().no_compile);
        tracing::debug!(
            marked,
            hoisted = hoisted.len(),
            filtered = filtered.len(),
            "inputs ordered"
        );
    }

    /// Assembles scripts in extern order and compilation order. Units created
    /// after the prepare phase (placeholders) are parsed here; units whose
    /// content could not be loaded are left out.
    fn build_program(&self, trees: &mut HashMap<UnitId, F::Ast>) -> Program<F::Ast> {
        let mut script = |unit: UnitId| -> Option<Script<F::Ast>> {
            let u = self.catalog.unit(unit);
            let ast = match trees.remove(&unit) {
                Some(ast) => ast,
                None => {
                    let text = self.catalog.file(unit).text()?;
                    self.frontend.parse(&u.input_id, text, &self.sink)
                }
            };
            Some(Script {
                input_id: u.input_id.clone(),
                unit,
                ast,
            })
        };

        let externs = self
            .catalog
            .externs()
            .iter()
            .filter_map(|&u| script(u))
            .collect();
        let sources = match &self.graph {
            Some(graph) => graph
                .units_in_order()
                .into_iter()
                .filter_map(&mut script)
                .collect(),
            None => Vec::new(),
        };
        Program { externs, sources }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn checks(&mut self) -> KilnResult<()> {
        self.begin_stage(PipelineState::Checked)?;
        ensure_state!(
            !self.instrument_only(),
            "checks do not run when instrumenting for coverage only"
        );
        let passes = Arc::clone(&self.passes);
        self.run_passes(&passes.custom_before_checks, LoopKind::Optimize)?;
        self.run_passes(&passes.checks, LoopKind::Optimize)?;
        if !self.sink.has_errors() {
            self.run_passes(&passes.custom_before_optimizations, LoopKind::Optimize)?;
        }
        self.advance(PipelineState::Checked);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn transpile_optimize(&mut self) -> KilnResult<()> {
        self.begin_stage(PipelineState::TranspiledOptimized)?;
        ensure_state!(
            !self.instrument_only(),
            "optimizations do not run when instrumenting for coverage only"
        );
        self.check_weak_placement()?;
        if self.options.build.optimize {
            let passes = Arc::clone(&self.passes);
            self.run_passes(&passes.optimizations, LoopKind::Optimize)?;
        }
        self.advance(PipelineState::TranspiledOptimized);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn finalize(&mut self) -> KilnResult<()> {
        self.begin_stage(PipelineState::Finalized)?;
        ensure_state!(
            !self.instrument_only(),
            "finalizations do not run when instrumenting for coverage only"
        );
        if self.options.build.optimize {
            let passes = Arc::clone(&self.passes);
            self.run_passes(&passes.finalizations, LoopKind::Motion)?;
        }
        self.advance(PipelineState::Finalized);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn instrument_coverage(&mut self) -> KilnResult<()> {
        self.begin_stage(PipelineState::Instrumented)?;
        ensure_state!(
            self.instrument_only(),
            "instrumentation requires instrument_for_coverage_only"
        );
        let passes = Arc::clone(&self.passes);
        if let Some(factory) = &passes.instrumentation {
            self.run_pass(factory, true)?;
        }
        self.advance(PipelineState::Instrumented);
        Ok(())
    }

    fn post_compilation(&mut self) -> KilnResult<()> {
        if self.options.build.dev_mode == DevMode::StartAndEnd {
            self.run_validity_check()?;
        }
        Ok(())
    }

    /// Every weak unit still in a chunk must be in the weak chunk.
    fn check_weak_placement(&self) -> KilnResult<()> {
        let Some(graph) = &self.graph else {
            return Ok(());
        };
        let weak = graph.weak_chunk();
        for (_, u) in self.catalog.units() {
            if u.is_weak && u.chunk.is_some() {
                ensure_state!(
                    u.chunk == weak,
                    "weak input `{}` is outside the weak chunk",
                    u.input_id
                );
            }
        }
        Ok(())
    }

    /// Runs passes in order, looping fixed-point groups. Stops at the first
    /// halting error.
    fn run_passes(&mut self, passes: &[PassFactory<F::Ast>], kind: LoopKind) -> KilnResult<()> {
        for group in group_passes(passes) {
            if self.sink.has_errors() {
                break;
            }
            match group {
                PassGroup::Once(factory) => {
                    self.run_pass(factory, true)?;
                }
                PassGroup::FixedPoint(factories) => {
                    let name = group.name();
                    self.run_loop(&name, factories, kind)?;
                }
            }
        }
        Ok(())
    }

    /// Repeats `factories` while any of them records a change, up to the
    /// stage's cap.
    fn run_loop(
        &mut self,
        name: &str,
        factories: &[PassFactory<F::Ast>],
        kind: LoopKind,
    ) -> KilnResult<()> {
        let cap = match kind {
            LoopKind::Optimize => self.options.limits.max_optimize_iterations,
            LoopKind::Motion => self.options.limits.max_motion_iterations,
        };
        let mut iterations = 0;
        loop {
            if iterations == cap {
                tracing::warn!(group = name, cap, "fixed-point loop did not converge");
                self.sink.emit(match kind {
                    LoopKind::Optimize => errors::warning_optimize_loop(name, cap),
                    LoopKind::Motion => errors::warning_motion_iterations(name, cap),
                });
                return Ok(());
            }
            iterations += 1;
            let mut changed = false;
            for factory in factories {
                if self.sink.has_errors() {
                    return Ok(());
                }
                changed |= self.run_pass(factory, true)?;
            }
            if !changed {
                tracing::trace!(group = name, iterations, "fixed point reached");
                return Ok(());
            }
        }
    }

    /// Runs one pass and returns whether it recorded any change.
    fn run_pass(&mut self, factory: &PassFactory<F::Ast>, validate: bool) -> KilnResult<bool> {
        let graph = self
            .graph
            .as_ref()
            .ok_or_else(|| InternalError::new("passes need a chunk graph"))?;
        let before = self.changes.stamp();
        let mut pass = factory.create();
        let mut cx = PassContext::new(
            factory.name(),
            &self.sink,
            &mut self.changes,
            &mut self.session,
            &self.catalog,
            graph,
        );
        pass.process(&mut cx, &mut self.program);
        self.script_index = None;

        let after = self.changes.stamp();
        tracing::trace!(pass = factory.name(), before, after, "pass finished");
        if validate && self.options.build.dev_mode == DevMode::EveryPass {
            self.run_validity_check()?;
        }
        Ok(after > before)
    }

    fn run_validity_check(&mut self) -> KilnResult<()> {
        let passes = Arc::clone(&self.passes);
        if let Some(factory) = &passes.validity_check {
            self.run_pass(factory, false)?;
        }
        Ok(())
    }

    fn script(&mut self, id: &InputId) -> Option<&Script<F::Ast>> {
        let program = &self.program;
        let pos = self
            .script_index
            .get_or_insert_with(|| program.positions().collect())
            .get(id)
            .copied()?;
        self.program.get(pos)
    }
}

/// An optimizing compiler over a pluggable front end.
pub struct Compiler<F: Frontend> {
    core: Option<Core<F>>,
    executor: Executor,
    sink: Arc<DiagnosticSink>,
    compiled: bool,
}

impl<F: Frontend> Compiler<F> {
    /// Creates a compiler with no passes.
    pub fn new(options: CompilerOptions, frontend: F, loader: Arc<dyn SourceLoader>) -> Self {
        let session = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::new(DiagnosticSink::new());
        let executor = Executor::from_config(&options.executor);
        let core = Core {
            options,
            frontend,
            loader,
            sink: Arc::clone(&sink),
            interner: Interner::new(),
            passes: Arc::new(PassConfig::default()),
            catalog: InputCatalog::new(),
            graph: None,
            program: Program::new(),
            script_index: None,
            changes: ChangeTracker::new(),
            session: SessionState::default(),
            state: PipelineState::Uninitialized,
            initialized: false,
            span: tracing::info_span!("compiler", session),
        };
        Self {
            core: Some(core),
            executor,
            sink,
            compiled: false,
        }
    }

    /// Sets the passes each stage runs.
    pub fn with_passes(mut self, passes: PassConfig<F::Ast>) -> Self {
        if let Some(core) = self.core.as_mut() {
            core.passes = Arc::new(passes);
        }
        self
    }

    /// Runs `work` over the core on the compiler thread.
    pub(crate) fn call<R, W>(&mut self, work: W) -> KilnResult<R>
    where
        R: Send + 'static,
        W: FnOnce(&mut Core<F>) -> KilnResult<R> + Send + 'static,
    {
        let core = self.core.take().ok_or_else(|| {
            InternalError::new("compiler is unusable after an earlier timeout or crash")
        })?;
        let outcome = self.executor.run(core, move |core| {
            let span = core.span.clone();
            let _entered = span.enter();
            work(core)
        });
        match outcome {
            Ok((core, result)) => {
                self.core = Some(core);
                result
            }
            Err(e) => Err(InternalError::new(e.to_string())),
        }
    }

    fn core_mut(&mut self) -> KilnResult<&mut Core<F>> {
        self.core.as_mut().ok_or_else(|| {
            InternalError::new("compiler is unusable after an earlier timeout or crash")
        })
    }

    /// Registers externs, then builds the chunk graph and registers chunk
    /// inputs. Graph problems are reported to the sink.
    pub fn init(&mut self, externs: Vec<UnitSpec>, chunks: Vec<ChunkSpec>) -> KilnResult<()> {
        let core = self.core_mut()?;
        let span = core.span.clone();
        let _entered = span.enter();
        core.init(externs, chunks)
    }

    /// Loads, scans and parses every input, then orders and prunes them.
    pub fn stage_parse(&mut self) -> KilnResult<()> {
        self.call(|core| core.parse())
    }

    /// Runs the check passes.
    pub fn stage_checks(&mut self) -> KilnResult<()> {
        self.call(|core| core.checks())
    }

    /// Runs transpilation and optimization passes.
    pub fn stage_transpile_optimize(&mut self) -> KilnResult<()> {
        self.call(|core| core.transpile_optimize())
    }

    /// Runs finalization passes.
    pub fn stage_finalize(&mut self) -> KilnResult<()> {
        self.call(|core| core.finalize())
    }

    /// Runs coverage instrumentation in place of the optimizing stages.
    pub fn stage_instrument_only(&mut self) -> KilnResult<()> {
        self.call(|core| core.instrument_coverage())
    }

    /// End-of-compilation bookkeeping. Runs even when errors were reported.
    pub fn post_compilation(&mut self) -> KilnResult<()> {
        self.call(|core| core.post_compilation())
    }

    /// Runs every stage in order, stopping after the first stage that reports
    /// a halting error. May be called once per compiler.
    pub fn compile(
        &mut self,
        externs: Vec<UnitSpec>,
        chunks: Vec<ChunkSpec>,
    ) -> KilnResult<CompileResult> {
        ensure_state!(!self.compiled, "compile may only be called once per compiler");
        self.compiled = true;

        self.init(externs, chunks)?;
        if !self.sink.has_errors() {
            self.stage_parse()?;
        }
        if !self.sink.has_errors() {
            if self.core_mut()?.instrument_only() {
                self.stage_instrument_only()?;
            } else {
                self.stage_checks()?;
                if !self.sink.has_errors() {
                    self.stage_transpile_optimize()?;
                }
                if !self.sink.has_errors() {
                    self.stage_finalize()?;
                }
            }
            self.post_compilation()?;
        }

        let state = self.core_mut()?.state;
        Ok(CompileResult {
            state,
            success: !self.sink.has_errors(),
            error_count: self.sink.error_count(),
            warning_count: self.sink.warning_count(),
            diagnostics: self.sink.diagnostics(),
        })
    }

    /// The diagnostic sink. Survives a lost compiler thread.
    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    /// Returns `true` if any halting error was reported.
    pub fn has_errors(&self) -> bool {
        self.sink.has_errors()
    }

    /// Returns `false` once a call has timed out or panicked.
    pub fn is_usable(&self) -> bool {
        self.core.is_some()
    }

    /// The current pipeline state, or `None` if the compiler is unusable.
    pub fn state(&self) -> Option<PipelineState> {
        self.core.as_ref().map(|c| c.state)
    }

    /// Registered units.
    pub fn catalog(&self) -> Option<&InputCatalog> {
        self.core.as_ref().map(|c| &c.catalog)
    }

    /// The chunk graph, once `init` has built one.
    pub fn graph(&self) -> Option<&ChunkGraph> {
        self.core.as_ref().and_then(|c| c.graph.as_ref())
    }

    /// The program tree.
    pub fn program(&self) -> Option<&Program<F::Ast>> {
        self.core.as_ref().map(|c| &c.program)
    }

    /// Looks up a script by input id.
    pub fn script(&mut self, id: &InputId) -> Option<&Script<F::Ast>> {
        self.core.as_mut().and_then(|c| c.script(id))
    }

    /// Names, features and libraries recorded by passes.
    pub fn session(&self) -> Option<&SessionState> {
        self.core.as_ref().map(|c| &c.session)
    }

    /// The change tracker's current stamp.
    pub fn change_stamp(&self) -> Option<u64> {
        self.core.as_ref().map(|c| c.changes.stamp())
    }

    /// The namespace interner used for dependency summaries.
    pub fn interner(&self) -> Option<&Interner> {
        self.core.as_ref().map(|c| &c.interner)
    }
}
