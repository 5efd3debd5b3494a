//! End-to-end tests: assemble programs with the builder and run them.

use drowse_core::build::{BlockBuilder, Cond, Expr};
use drowse_core::{Program, Scalar};
use drowse_runtime::{BufferConsole, CollectingWatcher, Variables};
use drowse_vm::{DebugFlags, Engine, EngineConfig, Script};
use std::sync::Arc;

struct Harness {
    script: Script,
    console: Arc<BufferConsole>,
    watcher: Arc<CollectingWatcher>,
}

fn load_with(config: EngineConfig, main: BlockBuilder) -> Harness {
    let console = Arc::new(BufferConsole::new());
    let watcher = Arc::new(CollectingWatcher::new());
    let engine = Engine::new()
        .with_config(config)
        .with_console(console.clone())
        .with_watcher(watcher.clone());
    let script = engine
        .load(Program::new("e2e", main.build()))
        .expect("program should load");
    Harness {
        script,
        console,
        watcher,
    }
}

fn load(main: BlockBuilder) -> Harness {
    load_with(EngineConfig::default(), main)
}

fn run(main: BlockBuilder) -> Scalar {
    load(main).script.run().expect("script should run")
}

fn traced() -> EngineConfig {
    EngineConfig {
        debug: DebugFlags::from_level(1 | 2 | 8),
        ..EngineConfig::default()
    }
}

// ─── Arithmetic and strings ───

#[test]
fn e2e_integer_arithmetic() {
    let result = run(BlockBuilder::new().ret(Expr::op(
        "+",
        Expr::int(2),
        Expr::op("*", Expr::int(3), Expr::int(4)),
    )));
    assert_eq!(result.as_int(), 14);
}

#[test]
fn e2e_mixed_arithmetic_is_float() {
    let result = run(BlockBuilder::new().ret(Expr::op("/", Expr::int(7), Expr::float(2.0))));
    assert_eq!(result.as_float(), 3.5);
}

#[test]
fn e2e_concat_and_repeat() {
    let result = run(BlockBuilder::new()
        .assign(Expr::var("$s"), Expr::op("x", Expr::str("ab"), Expr::int(2)))
        .ret(Expr::op(".", Expr::var("$s"), Expr::str("!"))));
    assert_eq!(result.as_string(), "abab!");
}

#[test]
fn e2e_println_writes_to_console() {
    let h = load(BlockBuilder::new().call("&println", vec![Expr::str("hello")]));
    h.script.run().unwrap();
    assert_eq!(h.console.output(), "hello\n");
}

#[test]
fn e2e_compound_assignment() {
    let result = run(BlockBuilder::new()
        .assign(Expr::var("$n"), Expr::int(5))
        .expr(Expr::assign_op(Expr::var("$n"), "*", Expr::int(3)))
        .ret(Expr::var("$n")));
    assert_eq!(result.as_int(), 15);
}

// ─── Control flow ───

#[test]
fn e2e_for_loop_sums() {
    let result = run(BlockBuilder::new()
        .assign(Expr::var("$total"), Expr::int(0))
        .for_loop(
            vec![Expr::assign(Expr::var("$i"), Expr::int(1))],
            Cond::pred("<=", Expr::var("$i"), Expr::int(10)),
            vec![Expr::assign_op(Expr::var("$i"), "+", Expr::int(1))],
            BlockBuilder::new()
                .expr(Expr::assign_op(Expr::var("$total"), "+", Expr::var("$i")))
                .build(),
        )
        .ret(Expr::var("$total")));
    assert_eq!(result.as_int(), 55);
}

#[test]
fn e2e_break_and_continue() {
    // Sum odd numbers below 10, stopping at 7.
    let body = BlockBuilder::new()
        .expr(Expr::assign_op(Expr::var("$i"), "+", Expr::int(1)))
        .if_then(
            Cond::pred("==", Expr::op("%", Expr::var("$i"), Expr::int(2)), Expr::int(0)),
            BlockBuilder::new().cont().build(),
        )
        .if_then(
            Cond::pred(">", Expr::var("$i"), Expr::int(7)),
            BlockBuilder::new().brk().build(),
        )
        .expr(Expr::assign_op(Expr::var("$sum"), "+", Expr::var("$i")))
        .build();
    let result = run(BlockBuilder::new()
        .assign(Expr::var("$i"), Expr::int(0))
        .assign(Expr::var("$sum"), Expr::int(0))
        .while_loop(Cond::pred("<", Expr::var("$i"), Expr::int(10)), body)
        .ret(Expr::var("$sum")));
    assert_eq!(result.as_int(), 1 + 3 + 5 + 7);
}

#[test]
fn e2e_foreach_over_hash_in_insertion_order() {
    let result = run(BlockBuilder::new()
        .assign(Expr::index(Expr::var("%h"), Expr::str("b")), Expr::int(2))
        .assign(Expr::index(Expr::var("%h"), Expr::str("a")), Expr::int(1))
        .assign(Expr::var("@out"), Expr::call("&array", vec![]))
        .foreach(
            Some("$k"),
            "$v",
            Expr::var("%h"),
            BlockBuilder::new()
                .call("&push", vec![Expr::var("@out"), Expr::op(".", Expr::var("$k"), Expr::var("$v"))])
                .build(),
        )
        .ret(Expr::call("&join", vec![Expr::str(","), Expr::var("@out")])));
    assert_eq!(result.as_string(), "b2,a1");
}

#[test]
fn e2e_frames_balance_on_every_exit() {
    let h = load(BlockBuilder::new()
        .assign(Expr::var("$i"), Expr::int(0))
        .while_loop(
            Cond::Always,
            BlockBuilder::new()
                .expr(Expr::assign_op(Expr::var("$i"), "+", Expr::int(1)))
                .if_then(
                    Cond::pred(">=", Expr::var("$i"), Expr::int(3)),
                    BlockBuilder::new().brk().build(),
                )
                .build(),
        )
        .try_catch(
            BlockBuilder::new()
                .throw(Expr::op("+", Expr::var("$i"), Expr::int(1)))
                .build(),
            "$e",
            BlockBuilder::new().build(),
        )
        .ret(Expr::op("*", Expr::var("$i"), Expr::int(2))));
    assert_eq!(h.script.run().unwrap().as_int(), 6);
    let stats = h.script.last_frame_stats();
    assert!(stats.created > 0);
    assert!(stats.balanced(), "{:?}", stats);
}

#[test]
fn e2e_frames_balance_on_return_from_nested_loop_operand() {
    let find = BlockBuilder::new()
        .assign(Expr::var("$i"), Expr::int(0))
        .while_loop(
            Cond::Always,
            BlockBuilder::new()
                .expr(Expr::assign_op(Expr::var("$i"), "+", Expr::int(1)))
                .while_loop(
                    Cond::Always,
                    BlockBuilder::new()
                        .if_then(
                            Cond::pred(">=", Expr::var("$i"), Expr::int(2)),
                            BlockBuilder::new()
                                .ret(Expr::op("*", Expr::var("$i"), Expr::int(10)))
                                .build(),
                        )
                        .brk()
                        .build(),
                )
                .build(),
        )
        .ret(Expr::int(-1))
        .build();
    let h = load(BlockBuilder::new()
        .sub("&find", find)
        .ret(Expr::op("+", Expr::int(1), Expr::call("&find", vec![]))));
    assert_eq!(h.script.run().unwrap().as_int(), 21);
    let stats = h.script.last_frame_stats();
    assert!(stats.created > 0);
    assert!(stats.balanced(), "{:?}", stats);
}

#[test]
fn e2e_frames_balance_on_continue() {
    let h = load(BlockBuilder::new()
        .assign(Expr::var("$sum"), Expr::int(0))
        .for_loop(
            vec![Expr::assign(Expr::var("$i"), Expr::int(0))],
            Cond::pred("<", Expr::var("$i"), Expr::int(5)),
            vec![Expr::assign_op(Expr::var("$i"), "+", Expr::int(1))],
            BlockBuilder::new()
                .if_then(
                    Cond::pred("==", Expr::op("%", Expr::var("$i"), Expr::int(2)), Expr::int(1)),
                    BlockBuilder::new().cont().build(),
                )
                .expr(Expr::assign_op(Expr::var("$sum"), "+", Expr::var("$i")))
                .build(),
        )
        .ret(Expr::var("$sum")));
    assert_eq!(h.script.run().unwrap().as_int(), 6);
    let stats = h.script.last_frame_stats();
    assert!(stats.created > 0);
    assert!(stats.balanced(), "{:?}", stats);
}

#[test]
fn e2e_frames_balance_on_fault_in_nested_operand() {
    let h = load(BlockBuilder::new().try_catch(
        BlockBuilder::new()
            .assign(
                Expr::var("$x"),
                Expr::op(
                    "+",
                    Expr::int(1),
                    Expr::op("*", Expr::int(2), Expr::op("/", Expr::int(1), Expr::int(0))),
                ),
            )
            .build(),
        "$e",
        BlockBuilder::new()
            .ret(Expr::op(".", Expr::var("$e"), Expr::str("!")))
            .build(),
    ));
    assert_eq!(h.script.run().unwrap().as_string(), "division by zero!");
    let stats = h.script.last_frame_stats();
    assert!(stats.created > 0);
    assert!(stats.balanced(), "{:?}", stats);
}

// ─── Exceptions ───

#[test]
fn e2e_catch_binds_and_unbinds_variable() {
    let h = load(BlockBuilder::new().try_catch(
        BlockBuilder::new().throw(Expr::int(5)).build(),
        "$e",
        BlockBuilder::new()
            .ret(Expr::op("+", Expr::var("$e"), Expr::int(1)))
            .build(),
    ));
    assert_eq!(h.script.run().unwrap().as_int(), 6);
    assert!(!h.script.globals().exists("$e"));
}

#[test]
fn e2e_native_fault_becomes_catchable_throw() {
    let h = load(BlockBuilder::new().try_catch(
        BlockBuilder::new()
            .expr(Expr::op("/", Expr::int(1), Expr::int(0)))
            .build(),
        "$e",
        BlockBuilder::new().ret(Expr::var("$e")).build(),
    ));
    let result = h.script.run().unwrap();
    assert_eq!(result.as_string(), "division by zero");
    assert!(h
        .watcher
        .warnings()
        .iter()
        .any(|w| w.message == "division by zero" && w.line == 1));
}

#[test]
fn e2e_uncaught_throw_warns_and_yields_null() {
    let h = load(BlockBuilder::new().throw(Expr::str("nope")));
    assert!(h.script.run().unwrap().is_null());
    let warnings = h.watcher.warnings();
    assert!(warnings.iter().any(|w| w.message == "Uncaught exception: nope"));
}

#[test]
fn e2e_stack_trace_of_caught_throw() {
    let failing = BlockBuilder::new().throw(Expr::str("deep")).build();
    let h = load(BlockBuilder::new()
        .sub("&inner", failing)
        .try_catch(
            BlockBuilder::new().call("&inner", vec![]).build(),
            "$e",
            BlockBuilder::new()
                .ret(Expr::call("&size", vec![Expr::call("&getStackTrace", vec![])]))
                .build(),
        ));
    assert_eq!(h.script.run().unwrap().as_int(), 1);
    let trace = h.script.last_trace();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace[0].description, "&inner");
}

// ─── Calls ───

#[test]
fn e2e_sub_defined_after_use_is_hoisted() {
    let result = run(BlockBuilder::new()
        .ret(Expr::call("&add", vec![Expr::int(3), Expr::int(4)]))
        .sub(
            "&add",
            BlockBuilder::new()
                .ret(Expr::op("+", Expr::var("$1"), Expr::var("$2")))
                .build(),
        ));
    assert_eq!(result.as_int(), 7);
}

#[test]
fn e2e_call_trace_reports_result() {
    let h = load_with(
        traced(),
        BlockBuilder::new()
            .sub(
                "&add",
                BlockBuilder::new()
                    .ret(Expr::op("+", Expr::var("$1"), Expr::var("$2")))
                    .build(),
            )
            .ret(Expr::call("&add", vec![Expr::int(3), Expr::int(4)])),
    );
    assert_eq!(h.script.run().unwrap().as_int(), 7);
    assert!(h.watcher.traces().contains(&"&add(3, 4) = 7".to_string()));
}

#[test]
fn e2e_call_trace_reports_failure_without_result() {
    let h = load_with(
        traced(),
        BlockBuilder::new()
            .sub(
                "&div",
                BlockBuilder::new()
                    .ret(Expr::op("/", Expr::var("$1"), Expr::var("$2")))
                    .build(),
            )
            .call("&div", vec![Expr::int(3), Expr::int(0)]),
    );
    assert!(h.script.run().unwrap().is_null());
    let traces = h.watcher.traces();
    assert!(traces.contains(&"&div(3, 0) - FAILED!".to_string()));
    assert!(!traces.iter().any(|t| t.starts_with("&div(3, 0) =")));
}

#[test]
fn e2e_profile_counts_calls() {
    let config = EngineConfig {
        debug: DebugFlags::from_level(1 | 2 | 8 | 16),
        ..EngineConfig::default()
    };
    let h = load_with(
        config,
        BlockBuilder::new()
            .sub("&noop", BlockBuilder::new().ret_empty().build())
            .call("&noop", vec![])
            .call("&noop", vec![]),
    );
    h.script.run().unwrap();
    let profile = h.script.profile();
    let noop = profile.iter().find(|e| e.name == "&noop").expect("profiled");
    assert_eq!(noop.calls, 2);
    assert!(h.watcher.traces().is_empty());
}

#[test]
fn e2e_stack_overflow_is_reported() {
    let config = EngineConfig {
        max_call_depth: 16,
        ..EngineConfig::default()
    };
    let h = load_with(
        config,
        BlockBuilder::new()
            .sub("&forever", BlockBuilder::new().ret(Expr::call("&forever", vec![])).build())
            .ret(Expr::call("&forever", vec![])),
    );
    assert!(h.script.run().unwrap().is_null());
    assert!(h
        .watcher
        .warnings()
        .iter()
        .any(|w| w.message.contains("stack overflow")));
}

#[test]
fn e2e_default_depth_limit_catches_runaway_recursion() {
    let runaway = BlockBuilder::new()
        .ret(Expr::call("&r", vec![Expr::op("+", Expr::var("$1"), Expr::int(1))]))
        .build();
    let h = load(BlockBuilder::new()
        .sub("&r", runaway)
        .try_catch(
            BlockBuilder::new()
                .ret(Expr::call("&r", vec![Expr::int(0)]))
                .build(),
            "$e",
            BlockBuilder::new().ret(Expr::var("$e")).build(),
        ));
    let message = h.script.run().unwrap().as_string();
    assert!(
        message.contains(&format!("call depth exceeded {}", drowse_vm::DEFAULT_MAX_CALL_DEPTH)),
        "{}",
        message
    );
    assert_eq!(drowse_vm::dispatch::active_calls(), 0);
}

#[test]
fn e2e_depth_limit_counts_host_callbacks() {
    let config = EngineConfig {
        max_call_depth: 32,
        ..EngineConfig::default()
    };
    // Every level re-enters the script through a comparator proxy, which
    // runs in a fresh context.
    let bounce = BlockBuilder::new()
        .assign(
            Expr::var("@pair"),
            Expr::call("&array", vec![Expr::int(2), Expr::int(1)]),
        )
        .ret(Expr::static_call(
            "Collections",
            "sort",
            vec![
                Expr::var("@pair"),
                Expr::closure(BlockBuilder::new().ret(Expr::call("&bounce", vec![])).build()),
            ],
        ))
        .build();
    let h = load_with(
        config,
        BlockBuilder::new()
            .sub("&bounce", bounce)
            .try_catch(
                BlockBuilder::new().ret(Expr::call("&bounce", vec![])).build(),
                "$e",
                BlockBuilder::new().ret(Expr::var("$e")).build(),
            ),
    );
    let message = h.script.run().unwrap().as_string();
    assert!(message.contains("call depth exceeded 32"), "{}", message);
    assert_eq!(drowse_vm::dispatch::active_calls(), 0);
}

#[test]
fn e2e_inline_block_shares_caller_scope() {
    let result = run(BlockBuilder::new()
        .inline(
            "&bump",
            BlockBuilder::new()
                .expr(Expr::assign_op(Expr::var("$count"), "+", Expr::int(1)))
                .build(),
        )
        .assign(Expr::var("$count"), Expr::int(1))
        .call("&bump", vec![])
        .call("&bump", vec![])
        .ret(Expr::var("$count")));
    assert_eq!(result.as_int(), 3);
}

#[test]
fn e2e_call_from_host() {
    let h = load(BlockBuilder::new().sub(
        "&greet",
        BlockBuilder::new()
            .ret(Expr::op(".", Expr::str("hi "), Expr::var("$1")))
            .build(),
    ));
    let result = h.script.call("&greet", vec![Scalar::string("ann")]).unwrap();
    assert_eq!(result.as_string(), "hi ann");
}

// ─── Collections ───

#[test]
fn e2e_lru_map_evicts_eldest() {
    let always = Expr::closure(BlockBuilder::new().ret(Expr::int(1)).build());
    let result = run(BlockBuilder::new()
        .assign(Expr::var("%m"), Expr::call("&ohasha", vec![]))
        .call("&setCapacity", vec![Expr::var("%m"), Expr::int(2)])
        .call("&setRemovalPolicy", vec![Expr::var("%m"), always])
        .assign(Expr::index(Expr::var("%m"), Expr::str("a")), Expr::int(1))
        .assign(Expr::index(Expr::var("%m"), Expr::str("b")), Expr::int(2))
        .expr(Expr::index(Expr::var("%m"), Expr::str("a")))
        .assign(Expr::index(Expr::var("%m"), Expr::str("c")), Expr::int(3))
        .ret(Expr::call("&join", vec![Expr::str(","), Expr::call("&keys", vec![Expr::var("%m")])])));
    assert_eq!(result.as_string(), "a,c");
}

#[test]
fn e2e_sort_with_closure_comparator() {
    let descending = Expr::closure(
        BlockBuilder::new()
            .ret(Expr::op("<=>", Expr::var("$2"), Expr::var("$1")))
            .build(),
    );
    let result = run(BlockBuilder::new()
        .assign(
            Expr::var("@list"),
            Expr::call("&array", vec![Expr::int(3), Expr::int(1), Expr::int(2)]),
        )
        .ret(Expr::call(
            "&join",
            vec![Expr::str(" "), Expr::call("&sort", vec![descending, Expr::var("@list")])],
        )));
    assert_eq!(result.as_string(), "3 2 1");
}

#[test]
fn e2e_map_and_filter() {
    let double = Expr::closure(
        BlockBuilder::new()
            .ret(Expr::op("*", Expr::var("$1"), Expr::int(2)))
            .build(),
    );
    let big = Expr::closure(
        BlockBuilder::new()
            .ret(Expr::op("<=>", Expr::var("$1"), Expr::int(2)))
            .build(),
    );
    let result = run(BlockBuilder::new()
        .assign(
            Expr::var("@list"),
            Expr::call("&array", vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
        )
        .assign(Expr::var("@doubled"), Expr::call("&map", vec![double, Expr::var("@list")]))
        .ret(Expr::call(
            "&join",
            vec![Expr::str(","), Expr::call("&filter", vec![big, Expr::var("@doubled")])],
        )));
    assert_eq!(result.as_string(), "4,6");
}

// ─── Predicates ───

#[test]
fn e2e_string_predicates() {
    let check = |cond: Cond| {
        run(BlockBuilder::new().if_else(
            cond,
            BlockBuilder::new().ret(Expr::int(1)).build(),
            Some(BlockBuilder::new().ret(Expr::int(0)).build()),
        ))
        .as_int()
    };
    assert_eq!(check(Cond::pred("iswm", Expr::str("dr*e"), Expr::str("drowse"))), 1);
    assert_eq!(check(Cond::pred("ismatch", Expr::str("drowse"), Expr::str("d.o"))), 0);
    assert_eq!(check(Cond::pred("isin", Expr::str("ows"), Expr::str("drowse"))), 1);
    assert_eq!(check(Cond::pred("lt", Expr::str("abc"), Expr::str("abd"))), 1);
    assert_eq!(check(Cond::not(Cond::pred("eq", Expr::str("a"), Expr::str("a")))), 0);
    assert_eq!(check(Cond::unary("-isnumber", Expr::str("12"))), 0);
}
