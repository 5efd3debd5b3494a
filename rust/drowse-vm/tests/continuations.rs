//! Closures, generator `yield` and one-shot `callcc`.

use drowse_core::build::{BlockBuilder, Cond, Expr};
use drowse_core::{Program, Scalar};
use drowse_runtime::{BufferConsole, CollectingWatcher, Variables};
use drowse_vm::{Engine, Script};
use std::sync::Arc;

fn load(main: BlockBuilder) -> (Script, Arc<CollectingWatcher>) {
    let watcher = Arc::new(CollectingWatcher::new());
    let engine = Engine::new()
        .with_console(Arc::new(BufferConsole::new()))
        .with_watcher(watcher.clone());
    let script = engine
        .load(Program::new("continuations", main.build()))
        .expect("program should load");
    (script, watcher)
}

fn run(main: BlockBuilder) -> Scalar {
    load(main).0.run().expect("script should run")
}

#[test]
fn closure_this_scope_survives_calls() {
    let counter = BlockBuilder::new()
        .call("&this", vec![Expr::str("$n")])
        .expr(Expr::assign_op(Expr::var("$n"), "+", Expr::int(1)))
        .ret(Expr::var("$n"))
        .build();
    let result = run(BlockBuilder::new()
        .assign(Expr::var("$counter"), Expr::closure(counter))
        .expr(Expr::invoke(Expr::var("$counter"), vec![]))
        .expr(Expr::invoke(Expr::var("$counter"), vec![]))
        .ret(Expr::invoke(Expr::var("$counter"), vec![])));
    assert_eq!(result.as_int(), 3);
}

#[test]
fn closure_locals_do_not_leak() {
    let (script, _) = load(BlockBuilder::new()
        .assign(
            Expr::var("$f"),
            Expr::closure(
                BlockBuilder::new()
                    .local(&["$tmp"])
                    .assign(Expr::var("$tmp"), Expr::int(9))
                    .ret(Expr::var("$tmp"))
                    .build(),
            ),
        )
        .ret(Expr::invoke(Expr::var("$f"), vec![])));
    assert_eq!(script.run().unwrap().as_int(), 9);
    assert!(!script.globals().exists("$tmp"));
}

#[test]
fn message_is_bound_to_dollar_zero() {
    let result = run(BlockBuilder::new()
        .assign(
            Expr::var("$obj"),
            Expr::closure(BlockBuilder::new().ret(Expr::var("$0")).build()),
        )
        .ret(Expr::send(Expr::var("$obj"), "speak", vec![])));
    assert_eq!(result.as_string(), "speak");
}

#[test]
fn yield_resumes_after_the_yield() {
    let generator = BlockBuilder::new()
        .yield_value(Expr::str("first"))
        .yield_value(Expr::str("second"))
        .ret(Expr::str("done"))
        .build();
    let result = run(BlockBuilder::new()
        .assign(Expr::var("$gen"), Expr::closure(generator))
        .assign(Expr::var("$a"), Expr::invoke(Expr::var("$gen"), vec![]))
        .assign(Expr::var("$b"), Expr::invoke(Expr::var("$gen"), vec![]))
        .assign(Expr::var("$c"), Expr::invoke(Expr::var("$gen"), vec![]))
        .assign(Expr::var("$d"), Expr::invoke(Expr::var("$gen"), vec![]))
        .ret(Expr::call(
            "&join",
            vec![
                Expr::str(" "),
                Expr::call(
                    "&array",
                    vec![Expr::var("$a"), Expr::var("$b"), Expr::var("$c"), Expr::var("$d")],
                ),
            ],
        )));
    // After "done" the closure starts over.
    assert_eq!(result.as_string(), "first second done first");
}

#[test]
fn yield_inside_loop_drives_foreach() {
    let generator = BlockBuilder::new()
        .local(&["$i"])
        .assign(Expr::var("$i"), Expr::int(0))
        .while_loop(
            Cond::pred("<", Expr::var("$i"), Expr::int(3)),
            BlockBuilder::new()
                .yield_value(Expr::op("*", Expr::var("$i"), Expr::int(10)))
                .expr(Expr::assign_op(Expr::var("$i"), "+", Expr::int(1)))
                .build(),
        )
        .build();
    let result = run(BlockBuilder::new()
        .assign(Expr::var("@out"), Expr::call("&array", vec![]))
        .foreach(
            None,
            "$v",
            Expr::closure(generator),
            BlockBuilder::new()
                .call("&push", vec![Expr::var("@out"), Expr::var("$v")])
                .build(),
        )
        .ret(Expr::call("&join", vec![Expr::str(","), Expr::var("@out")])));
    assert_eq!(result.as_string(), "0,10,20");
}

#[test]
fn yield_inside_handler_keeps_catch_variable() {
    let generator = BlockBuilder::new()
        .try_catch(
            BlockBuilder::new().throw(Expr::int(5)).build(),
            "$e",
            BlockBuilder::new()
                .yield_value(Expr::op("+", Expr::var("$e"), Expr::int(0)))
                .ret(Expr::op("+", Expr::var("$e"), Expr::int(0)))
                .build(),
        )
        .build();
    let (script, watcher) = load(BlockBuilder::new()
        .assign(Expr::var("$gen"), Expr::closure(generator))
        .assign(Expr::var("$a"), Expr::invoke(Expr::var("$gen"), vec![]))
        .assign(Expr::var("$b"), Expr::invoke(Expr::var("$gen"), vec![]))
        .ret(Expr::op(".", Expr::op(".", Expr::var("$a"), Expr::str(",")), Expr::var("$b"))));
    assert_eq!(script.run().unwrap().as_string(), "5,5");
    assert!(!script.globals().exists("$e"));
    assert!(watcher.warnings().is_empty());
}

#[test]
fn callcc_hands_suspended_closure_to_target() {
    let target = BlockBuilder::new()
        .assign(Expr::var("$saved"), Expr::var("$1"))
        .ret(Expr::str("captured"))
        .build();
    let body = BlockBuilder::new()
        .callcc(Expr::var("$target"))
        .ret(Expr::str("resumed"))
        .build();
    let result = run(BlockBuilder::new()
        .assign(Expr::var("$target"), Expr::closure(target))
        .assign(Expr::var("$k"), Expr::closure(body))
        .assign(Expr::var("$first"), Expr::invoke(Expr::var("$k"), vec![]))
        .assign(Expr::var("$second"), Expr::invoke(Expr::var("$saved"), vec![]))
        .ret(Expr::op(
            ".",
            Expr::op(".", Expr::var("$first"), Expr::str("/")),
            Expr::var("$second"),
        )));
    assert_eq!(result.as_string(), "captured/resumed");
}

#[test]
fn yield_in_inline_code_is_a_fault() {
    let (script, watcher) = load(BlockBuilder::new()
        .inline("&bad", BlockBuilder::new().yield_value(Expr::int(1)).build())
        .call("&bad", vec![]));
    assert!(script.run().unwrap().is_null());
    assert!(watcher
        .warnings()
        .iter()
        .any(|w| w.message.contains("not allowed in inline code")));
}

#[test]
fn invoke_passes_arguments_and_message() {
    let result = run(BlockBuilder::new()
        .assign(
            Expr::var("$f"),
            Expr::closure(
                BlockBuilder::new()
                    .ret(Expr::op(".", Expr::var("$0"), Expr::var("$2")))
                    .build(),
            ),
        )
        .ret(Expr::call(
            "&invoke",
            vec![
                Expr::var("$f"),
                Expr::call("&array", vec![Expr::str("a"), Expr::str("b")]),
                Expr::str("msg:"),
            ],
        )));
    assert_eq!(result.as_string(), "msg:b");
}
