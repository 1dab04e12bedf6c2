//! A line-oriented toy front end and a handful of passes for driving the
//! compiler end to end.
//!
//! Every non-empty line of a unit is one statement. A few lines double as
//! directives for the dependency scan:
//!
//! ```text
//! provide app.main      require lib.util      dynamic lazy.part
//! typeRequire lib.types @externs              @nocompile
//! ```
//!
//! A line reading `!error` makes parsing report a syntax error.

#![allow(dead_code)]

use kiln_chunks::{DependencyInfo, UnitSpec};
use kiln_common::Interner;
use kiln_config::CompilerOptions;
use kiln_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use kiln_driver::{
    CodecError, Compiler, Frontend, Pass, PassContext, PassFactory, Program, ScopeRef, TreeCodec,
    UnitIndex,
};
use kiln_source::{InputId, MemoryLoader, Span};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Ast = Vec<String>;

pub const SYNTAX_ERROR: DiagnosticCode = DiagnosticCode::new(Category::Error, 900);
pub const PASS_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Pass, 1);

pub struct Lines;

impl Frontend for Lines {
    type Ast = Ast;

    fn scan(&self, _input: &InputId, text: &str, interner: &Interner) -> DependencyInfo {
        let mut info = DependencyInfo::default();
        for line in text.lines() {
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some("provide"), Some(ns)) => info.provides.push(interner.get_or_intern(ns)),
                (Some("require"), Some(ns)) => info.requires.push(interner.get_or_intern(ns)),
                (Some("dynamic"), Some(ns)) => {
                    info.dynamic_requires.push(interner.get_or_intern(ns))
                }
                (Some("typeRequire"), Some(ns)) => {
                    info.type_requires.push(interner.get_or_intern(ns))
                }
                (Some("@externs"), None) => info.is_externs = true,
                (Some("@nocompile"), None) => info.no_compile = true,
                _ => {}
            }
        }
        info
    }

    fn parse(&self, input: &InputId, text: &str, sink: &DiagnosticSink) -> Ast {
        let lines: Ast = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if lines.iter().any(|l| l == "!error") {
            sink.emit(Diagnostic::error(
                SYNTAX_ERROR,
                format!("syntax error in `{input}`"),
                Span::DUMMY,
            ));
        }
        lines
    }
}

/// Encodes the program as JSON and re-resolves units by input id.
pub struct JsonCodec;

impl TreeCodec<Ast> for JsonCodec {
    fn serialize(&self, program: &Program<Ast>) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(program).map_err(|e| CodecError(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8], index: &UnitIndex) -> Result<Program<Ast>, CodecError> {
        let mut program: Program<Ast> =
            serde_json::from_slice(bytes).map_err(|e| CodecError(e.to_string()))?;
        for script in program.externs.iter_mut().chain(program.sources.iter_mut()) {
            script.unit = *index
                .get(&script.input_id)
                .ok_or_else(|| CodecError(format!("unknown input `{}`", script.input_id)))?;
        }
        Ok(program)
    }
}

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Appends its name to a shared log.
pub struct Record {
    name: String,
    log: Log,
}

impl Pass<Ast> for Record {
    fn process(&mut self, _cx: &mut PassContext<'_>, _program: &mut Program<Ast>) {
        self.log.lock().unwrap().push(self.name.clone());
    }
}

pub fn record(name: &str, log: &Log) -> PassFactory<Ast> {
    let owned = name.to_string();
    let log = Arc::clone(log);
    PassFactory::new(name, move || Record {
        name: owned.clone(),
        log: Arc::clone(&log),
    })
}

/// Changes the first source script on every run, so it never converges.
pub struct Churn;

impl Pass<Ast> for Churn {
    fn process(&mut self, cx: &mut PassContext<'_>, program: &mut Program<Ast>) {
        if let Some(script) = program.sources.first_mut() {
            script.ast.push("churn".to_string());
            cx.report_change(ScopeRef::Script(script.input_id.clone()));
        }
    }
}

/// Removes one `dead` line per run until none are left.
pub struct DropDead;

impl Pass<Ast> for DropDead {
    fn process(&mut self, cx: &mut PassContext<'_>, program: &mut Program<Ast>) {
        for script in &mut program.sources {
            if let Some(i) = script.ast.iter().position(|l| l == "dead") {
                script.ast.remove(i);
                cx.report_change(ScopeRef::Script(script.input_id.clone()));
                return;
            }
        }
    }
}

/// Reports a halting error.
pub struct Fail;

impl Pass<Ast> for Fail {
    fn process(&mut self, cx: &mut PassContext<'_>, _program: &mut Program<Ast>) {
        cx.report(Diagnostic::error(
            PASS_FAILED,
            format!("{} failed", cx.pass_name()),
            Span::DUMMY,
        ));
    }
}

/// Blocks the compiler thread.
pub struct Sleep(pub Duration);

impl Pass<Ast> for Sleep {
    fn process(&mut self, _cx: &mut PassContext<'_>, _program: &mut Program<Ast>) {
        std::thread::sleep(self.0);
    }
}

/// Generates a helper name, records a feature and injects a runtime library.
pub struct Helpers;

impl Pass<Ast> for Helpers {
    fn process(&mut self, cx: &mut PassContext<'_>, program: &mut Program<Ast>) {
        let name = cx.session.generated_name("helper");
        cx.session.feature_set.insert("let".to_string());
        cx.session.inject_library("runtime");
        for script in &mut program.sources {
            script.ast.push(format!("use {name}"));
            cx.report_change(ScopeRef::Script(script.input_id.clone()));
        }
    }
}

pub fn options() -> CompilerOptions {
    let mut options = CompilerOptions::default();
    options.executor.threads = 2;
    options
}

pub fn compiler(options: CompilerOptions) -> Compiler<Lines> {
    Compiler::new(options, Lines, Arc::new(MemoryLoader::new()))
}

pub fn src(name: &str, text: &str) -> UnitSpec {
    UnitSpec::inline(name, text)
}

pub fn source_ids(c: &Compiler<Lines>) -> Vec<String> {
    c.program()
        .map(|p| p.sources.iter().map(|s| s.input_id.to_string()).collect())
        .unwrap_or_default()
}

pub fn extern_ids(c: &Compiler<Lines>) -> Vec<String> {
    c.program()
        .map(|p| p.externs.iter().map(|s| s.input_id.to_string()).collect())
        .unwrap_or_default()
}

pub fn chunk_names(c: &Compiler<Lines>) -> Vec<String> {
    c.graph()
        .map(|g| g.chunks().map(|(_, ch)| ch.name.clone()).collect())
        .unwrap_or_default()
}

pub fn chunk_inputs(c: &Compiler<Lines>, chunk: &str) -> Vec<String> {
    let graph = c.graph().unwrap();
    let catalog = c.catalog().unwrap();
    let id = graph.chunk_by_name(chunk).unwrap();
    graph
        .chunk(id)
        .units
        .iter()
        .map(|&u| catalog.unit(u).input_id.to_string())
        .collect()
}

pub fn codes(c: &Compiler<Lines>) -> Vec<String> {
    c.sink()
        .diagnostics()
        .iter()
        .map(|d| d.code.to_string())
        .collect()
}
