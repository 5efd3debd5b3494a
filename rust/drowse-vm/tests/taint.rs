//! Taint mode: console input is tainted, taint flows through operators,
//! `&untaint` cleans it and `&exec` refuses it.

use drowse_core::build::{BlockBuilder, Cond, Expr};
use drowse_core::{EngineError, Program, Scalar};
use drowse_runtime::{BufferConsole, CollectingWatcher};
use drowse_vm::{Engine, EngineConfig};
use std::sync::Arc;

fn run_with(taint: bool, main: BlockBuilder) -> Result<Scalar, EngineError> {
    let engine = Engine::new()
        .with_config(EngineConfig {
            taint,
            ..EngineConfig::default()
        })
        .with_console(Arc::new(BufferConsole::with_input(["rm -rf /tmp/nothing"])))
        .with_watcher(Arc::new(CollectingWatcher::new()));
    engine
        .load(Program::new("taint", main.build()))
        .expect("program should load")
        .run()
}

/// 1 when `value` is tainted, 0 otherwise.
fn tainted(value: Expr) -> BlockBuilder {
    BlockBuilder::new()
        .assign(Expr::var("$v"), value)
        .if_else(
            Cond::unary("-istainted", Expr::var("$v")),
            BlockBuilder::new().ret(Expr::int(1)).build(),
            Some(BlockBuilder::new().ret(Expr::int(0)).build()),
        )
}

#[test]
fn taint_console_input_is_tainted() {
    let result = run_with(true, tainted(Expr::call("&readln", vec![])));
    assert_eq!(result.unwrap().as_int(), 1);
}

#[test]
fn taint_flows_through_concatenation() {
    let result = run_with(
        true,
        tainted(Expr::op(".", Expr::call("&readln", vec![]), Expr::str("x"))),
    );
    assert_eq!(result.unwrap().as_int(), 1);
}

#[test]
fn taint_literals_stay_clean() {
    let result = run_with(true, tainted(Expr::op(".", Expr::str("a"), Expr::str("b"))));
    assert_eq!(result.unwrap().as_int(), 0);
}

#[test]
fn taint_untaint_cleans_the_value() {
    let result = run_with(
        true,
        tainted(Expr::call("&untaint", vec![Expr::call("&readln", vec![])])),
    );
    assert_eq!(result.unwrap().as_int(), 0);
}

#[test]
fn taint_sensitive_call_refuses_tainted_argument() {
    let result = run_with(
        true,
        BlockBuilder::new().try_catch(
            BlockBuilder::new()
                .expr(Expr::call("&exec", vec![Expr::call("&readln", vec![])]))
                .build(),
            "$e",
            BlockBuilder::new().ret(Expr::str("caught")).build(),
        ),
    );
    match result {
        Err(EngineError::TaintViolation(message)) => {
            assert!(message.starts_with("&exec: argument 1 is tainted"), "{}", message)
        }
        other => panic!("expected a taint violation, got {:?}", other),
    }
}

#[test]
fn taint_mode_off_marks_nothing() {
    let result = run_with(false, tainted(Expr::call("&readln", vec![])));
    assert_eq!(result.unwrap().as_int(), 0);
}

#[test]
fn taint_permeable_call_leaves_returned_variable_clean() {
    let result = run_with(
        true,
        BlockBuilder::new()
            .sub("&pick", BlockBuilder::new().ret(Expr::var("$1")).build())
            .assign(Expr::var("$clean"), Expr::str("ok"))
            .assign(Expr::var("$t"), Expr::call("&readln", vec![]))
            .assign(
                Expr::var("$picked"),
                Expr::call("&pick", vec![Expr::var("$clean"), Expr::var("$t")]),
            )
            .if_else(
                Cond::unary("-istainted", Expr::var("$clean")),
                BlockBuilder::new().ret(Expr::str("clean variable was tainted")).build(),
                None,
            )
            .if_else(
                Cond::unary("-istainted", Expr::var("$picked")),
                BlockBuilder::new().ret(Expr::str("ok")).build(),
                Some(BlockBuilder::new().ret(Expr::str("result lost its taint")).build()),
            ),
    );
    assert_eq!(result.unwrap().as_string(), "ok");
}

#[test]
fn taint_violation_in_host_callback_keeps_its_kind() {
    let comparator = Expr::closure(
        BlockBuilder::new()
            .expr(Expr::call("&exec", vec![Expr::call("&readln", vec![])]))
            .ret(Expr::int(0))
            .build(),
    );
    let result = run_with(
        true,
        BlockBuilder::new()
            .assign(
                Expr::var("@list"),
                Expr::call("&array", vec![Expr::int(2), Expr::int(1)]),
            )
            .ret(Expr::static_call("Collections", "sort", vec![Expr::var("@list"), comparator])),
    );
    match result {
        Err(EngineError::TaintViolation(message)) => {
            assert!(message.starts_with("&exec: argument 1 is tainted"), "{}", message)
        }
        other => panic!("expected a taint violation, got {:?}", other),
    }
}
