//! Stage ordering, gating, fixed-point loops and the compiler thread.

mod common;

use common::*;
use kiln_chunks::ChunkSpec;
use kiln_config::DevMode;
use kiln_driver::{Pass, PassConfig, PassContext, PassFactory, PipelineState, Program, ScopeRef};
use kiln_source::InputId;
use std::sync::Arc;
use std::time::Duration;

fn one_chunk(units: &[(&str, &str)]) -> Vec<ChunkSpec> {
    vec![ChunkSpec::strong(
        units.iter().map(|(name, text)| src(name, text)).collect(),
    )]
}

/// Logs how many scopes changed since it last looked.
struct Seen(Log);

impl Pass<Ast> for Seen {
    fn process(&mut self, cx: &mut PassContext<'_>, _program: &mut Program<Ast>) {
        let changed = cx.changed_scopes();
        self.0.lock().unwrap().push(format!("seen:{}", changed.len()));
    }
}

/// Changes two functions of `a.js`, then deletes one of them.
struct Inline;

impl Pass<Ast> for Inline {
    fn process(&mut self, cx: &mut PassContext<'_>, _program: &mut Program<Ast>) {
        let script = InputId::new("a.js");
        for name in ["f", "g"] {
            cx.report_change(ScopeRef::Function {
                script: script.clone(),
                name: name.to_string(),
            });
        }
        cx.report_deleted(ScopeRef::Function {
            script: script.clone(),
            name: "f".to_string(),
        });
        // Reviving a deleted scope is ignored.
        cx.report_change(ScopeRef::Function {
            script,
            name: "f".to_string(),
        });
    }
}

/// Logs the function names it was told changed and deleted.
struct Watch(Log);

impl Pass<Ast> for Watch {
    fn process(&mut self, cx: &mut PassContext<'_>, _program: &mut Program<Ast>) {
        let names = |scopes: Vec<ScopeRef>| -> Vec<String> {
            scopes
                .into_iter()
                .map(|s| match s {
                    ScopeRef::Function { name, .. } => name,
                    ScopeRef::Script(id) => id.to_string(),
                })
                .collect()
        };
        let changed = names(cx.changed_scopes()).join(",");
        let deleted = names(cx.deleted_scopes()).join(",");
        self.0
            .lock()
            .unwrap()
            .push(format!("changed:[{changed}] deleted:[{deleted}]"));
    }
}

/// Logs the name of the thread it runs on.
struct ThreadName(Log);

impl Pass<Ast> for ThreadName {
    fn process(&mut self, _cx: &mut PassContext<'_>, _program: &mut Program<Ast>) {
        let name = std::thread::current().name().unwrap_or("").to_string();
        self.0.lock().unwrap().push(name);
    }
}

#[test]
fn stages_run_their_passes_in_order() {
    let log = new_log();
    let passes = PassConfig {
        custom_before_checks: vec![record("custom_checks", &log)],
        checks: vec![record("check", &log)],
        custom_before_optimizations: vec![record("custom_opt", &log)],
        optimizations: vec![record("opt", &log)],
        finalizations: vec![record("final", &log)],
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    let result = c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();

    assert!(result.success);
    assert_eq!(result.state, PipelineState::Finalized);
    assert_eq!(
        entries(&log),
        vec!["custom_checks", "check", "custom_opt", "opt", "final"]
    );
}

#[test]
fn check_error_stops_the_pipeline() {
    let log = new_log();
    let passes = PassConfig {
        checks: vec![
            record("a", &log),
            PassFactory::new("fail", || Fail),
            record("b", &log),
        ],
        custom_before_optimizations: vec![record("custom_opt", &log)],
        optimizations: vec![record("opt", &log)],
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    let result = c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();

    assert!(!result.success);
    assert_eq!(result.state, PipelineState::Checked);
    assert_eq!(result.error_count, 1);
    assert_eq!(codes(&c), vec!["P001"]);
    assert_eq!(entries(&log), vec!["a"]);
}

#[test]
fn syntax_error_halts_after_parse() {
    let log = new_log();
    let passes = PassConfig {
        checks: vec![record("check", &log)],
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    let result = c
        .compile(vec![], one_chunk(&[("a.js", "a"), ("b.js", "!error")]))
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.state, PipelineState::Parsed);
    assert!(entries(&log).is_empty());
}

#[test]
fn disabled_optimization_still_advances() {
    let log = new_log();
    let passes = PassConfig {
        checks: vec![record("check", &log)],
        optimizations: vec![record("opt", &log)],
        finalizations: vec![record("final", &log)],
        ..PassConfig::default()
    };
    let mut options = options();
    options.build.optimize = false;
    let mut c = compiler(options).with_passes(passes);
    let result = c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();

    assert_eq!(result.state, PipelineState::Finalized);
    assert_eq!(entries(&log), vec!["check"]);
}

#[test]
fn fixed_point_pass_runs_until_nothing_changes() {
    let passes = PassConfig {
        optimizations: vec![PassFactory::new("drop_dead", || DropDead).fixed_point()],
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    let result = c
        .compile(vec![], one_chunk(&[("a.js", "dead\nkeep\ndead")]))
        .unwrap();

    assert!(result.success);
    assert_eq!(result.warning_count, 0);
    assert_eq!(c.program().unwrap().sources[0].ast, vec!["keep"]);
    assert_eq!(c.change_stamp(), Some(2));
}

#[test]
fn consecutive_fixed_point_passes_loop_together() {
    let log = new_log();
    let passes = PassConfig {
        optimizations: vec![
            record("count", &log).fixed_point(),
            PassFactory::new("drop_dead", || DropDead).fixed_point(),
            record("after", &log),
        ],
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    c.compile(vec![], one_chunk(&[("a.js", "dead\ndead")]))
        .unwrap();

    // Two rounds remove a line each, a third finds nothing.
    assert_eq!(entries(&log), vec!["count", "count", "count", "after"]);
}

#[test]
fn non_fixed_point_pass_runs_once_even_when_it_changes() {
    let passes = PassConfig {
        optimizations: vec![PassFactory::new("churn", || Churn)],
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    assert_eq!(c.program().unwrap().sources[0].ast, vec!["a", "churn"]);
}

#[test]
fn optimize_loop_cap_warns_and_keeps_going() {
    let log = new_log();
    let passes = PassConfig {
        optimizations: vec![PassFactory::new("churn", || Churn).fixed_point()],
        finalizations: vec![record("final", &log)],
        ..PassConfig::default()
    };
    let mut options = options();
    options.limits.max_optimize_iterations = 3;
    let mut c = compiler(options).with_passes(passes);
    let result = c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();

    assert!(result.success);
    assert_eq!(result.state, PipelineState::Finalized);
    assert_eq!(codes(&c), vec!["W102"]);
    let ast = &c.program().unwrap().sources[0].ast;
    assert_eq!(ast.iter().filter(|l| *l == "churn").count(), 3);
    assert_eq!(entries(&log), vec!["final"]);
}

#[test]
fn motion_loop_cap_uses_its_own_warning() {
    let passes = PassConfig {
        finalizations: vec![PassFactory::new("churn", || Churn).fixed_point()],
        ..PassConfig::default()
    };
    let mut options = options();
    options.limits.max_motion_iterations = 2;
    let mut c = compiler(options).with_passes(passes);
    let result = c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();

    assert!(result.success);
    assert_eq!(codes(&c), vec!["W103"]);
}

#[test]
fn changes_are_delivered_once_per_consumer() {
    let log = new_log();
    let seen = |log: &Log| -> PassFactory<Ast> {
        let log = Arc::clone(log);
        PassFactory::new("seen", move || Seen(Arc::clone(&log)))
    };
    let passes = PassConfig {
        checks: vec![seen(&log)],
        optimizations: vec![PassFactory::new("helpers", || Helpers), seen(&log)],
        finalizations: vec![seen(&log)],
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    c.compile(vec![], one_chunk(&[("a.js", "a"), ("b.js", "b")]))
        .unwrap();

    assert_eq!(entries(&log), vec!["seen:0", "seen:2", "seen:0"]);
    let session = c.session().unwrap();
    assert_eq!(session.injected_libraries(), ["runtime".to_string()]);
    assert_eq!(session.generated_names["helper"], "helper$kiln$0");
    assert!(session.feature_set.contains("let"));
}

#[test]
fn deleted_scopes_are_never_reported_as_changed() {
    let log = new_log();
    let watch = |log: &Log| -> PassFactory<Ast> {
        let log = Arc::clone(log);
        PassFactory::new("watch", move || Watch(Arc::clone(&log)))
    };
    let passes = PassConfig {
        checks: vec![PassFactory::new("inline", || Inline), watch(&log)],
        optimizations: vec![watch(&log)],
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    let result = c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();

    assert!(result.success, "{:?}", result.diagnostics);
    assert_eq!(
        entries(&log),
        vec!["changed:[g] deleted:[f]", "changed:[] deleted:[]"]
    );
}

#[test]
fn stages_out_of_order_are_contract_violations() {
    let mut c = compiler(options());
    c.init(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    assert!(c.stage_checks().is_err());

    c.stage_parse().unwrap();
    assert!(c.stage_parse().is_err());
    assert!(c.stage_finalize().is_err());

    c.stage_checks().unwrap();
    c.stage_transpile_optimize().unwrap();
    c.stage_finalize().unwrap();
    assert_eq!(c.state(), Some(PipelineState::Finalized));
    assert!(c.stage_checks().is_err());
}

#[test]
fn init_twice_is_a_contract_violation() {
    let mut c = compiler(options());
    c.init(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    assert!(c.init(vec![], one_chunk(&[("b.js", "b")])).is_err());
}

#[test]
fn stage_after_halting_error_is_refused() {
    let mut c = compiler(options());
    c.init(vec![], one_chunk(&[("a.js", "!error")])).unwrap();
    c.stage_parse().unwrap();
    assert!(c.has_errors());
    let err = c.stage_checks().unwrap_err();
    assert!(err.to_string().contains("halting errors"), "{err}");
}

#[test]
fn stage_without_graph_is_refused() {
    let mut c = compiler(options());
    c.init(vec![], vec![]).unwrap();
    assert!(c.stage_parse().is_err());
}

#[test]
fn compile_twice_is_a_contract_violation() {
    let mut c = compiler(options());
    c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    assert!(c.compile(vec![], one_chunk(&[("a.js", "a")])).is_err());
}

#[test]
fn instrument_mode_replaces_optimization() {
    let log = new_log();
    let passes = PassConfig {
        checks: vec![record("check", &log)],
        optimizations: vec![record("opt", &log)],
        instrumentation: Some(record("instrument", &log)),
        ..PassConfig::default()
    };
    let mut options = options();
    options.build.instrument_for_coverage_only = true;
    let mut c = compiler(options).with_passes(passes);
    let result = c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();

    assert!(result.success);
    assert_eq!(result.state, PipelineState::Instrumented);
    assert_eq!(entries(&log), vec!["instrument"]);
}

#[test]
fn instrument_mode_refuses_checks() {
    let mut options = options();
    options.build.instrument_for_coverage_only = true;
    let mut c = compiler(options);
    c.init(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    c.stage_parse().unwrap();
    assert!(c.stage_checks().is_err());
    c.stage_instrument_only().unwrap();
    assert_eq!(c.state(), Some(PipelineState::Instrumented));
}

#[test]
fn instrumentation_requires_instrument_mode() {
    let mut c = compiler(options());
    c.init(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    c.stage_parse().unwrap();
    assert!(c.stage_instrument_only().is_err());
}

#[test]
fn every_pass_dev_mode_validates_after_each_pass() {
    let log = new_log();
    let passes = PassConfig {
        checks: vec![record("a", &log), record("b", &log)],
        validity_check: Some(record("validity", &log)),
        ..PassConfig::default()
    };
    let mut options = options();
    options.build.dev_mode = DevMode::EveryPass;
    let mut c = compiler(options).with_passes(passes);
    c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    assert_eq!(
        entries(&log),
        vec!["validity", "a", "validity", "b", "validity"]
    );
}

#[test]
fn start_and_end_dev_mode_validates_twice() {
    let log = new_log();
    let passes = PassConfig {
        checks: vec![record("a", &log), record("b", &log)],
        validity_check: Some(record("validity", &log)),
        ..PassConfig::default()
    };
    let mut options = options();
    options.build.dev_mode = DevMode::StartAndEnd;
    let mut c = compiler(options).with_passes(passes);
    c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    assert_eq!(entries(&log), vec!["validity", "a", "b", "validity"]);
}

#[test]
fn validity_check_is_off_by_default() {
    let log = new_log();
    let passes = PassConfig {
        checks: vec![record("a", &log)],
        validity_check: Some(record("validity", &log)),
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    assert_eq!(entries(&log), vec!["a"]);
}

#[test]
fn passes_run_on_the_compiler_thread() {
    let log = new_log();
    let thread_log = Arc::clone(&log);
    let passes = PassConfig {
        checks: vec![PassFactory::new("thread", move || {
            ThreadName(Arc::clone(&thread_log))
        })],
        ..PassConfig::default()
    };
    let mut c = compiler(options()).with_passes(passes);
    c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    assert_eq!(entries(&log), vec!["kiln-compiler"]);
}

#[test]
fn inline_execution_runs_on_the_caller() {
    let log = new_log();
    let thread_log = Arc::clone(&log);
    let passes = PassConfig {
        checks: vec![PassFactory::new("thread", move || {
            ThreadName(Arc::clone(&thread_log))
        })],
        ..PassConfig::default()
    };
    let mut options = options();
    options.executor.use_compiler_thread = false;
    let mut c = compiler(options).with_passes(passes);
    let caller = std::thread::current().name().unwrap_or("").to_string();
    c.compile(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    assert_eq!(entries(&log), vec![caller]);
}

#[test]
fn timeout_leaves_the_compiler_unusable() {
    let passes = PassConfig {
        checks: vec![PassFactory::new("sleep", || Sleep(Duration::from_secs(3)))],
        ..PassConfig::default()
    };
    let mut options = options();
    options.executor.timeout_secs = Some(1);
    let mut c = compiler(options).with_passes(passes);
    c.init(vec![], one_chunk(&[("a.js", "a")])).unwrap();
    c.stage_parse().unwrap();

    assert!(c.stage_checks().is_err());
    assert!(!c.is_usable());
    assert_eq!(c.state(), None);
    assert!(c.stage_transpile_optimize().is_err());
    assert!(c.post_compilation().is_err());
}

#[test]
fn scripts_are_found_by_input_id() {
    let mut c = compiler(options());
    c.compile(
        vec![src("env.js", "var env")],
        one_chunk(&[("a.js", "alpha"), ("b.js", "beta")]),
    )
    .unwrap();

    let b = c.script(&InputId::new("b.js")).unwrap();
    assert_eq!(b.ast, vec!["beta"]);
    let env = c.script(&InputId::new("env.js")).unwrap();
    assert_eq!(env.ast, vec!["var env"]);
    assert!(c.script(&InputId::new("missing.js")).is_none());
}
