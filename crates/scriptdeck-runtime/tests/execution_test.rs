// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script execution integration tests
//!
//! Runs scripts through the execution service and checks captured output.

use async_trait::async_trait;
use boa_engine::JsObject;
use scriptdeck_runtime::{
    ExecutionResult, ExecutionService, ModuleFetcher, Result, RunState, RuntimeConfig,
    RuntimeError, ScriptRuntime,
};
use std::sync::Arc;

struct Offline;

#[async_trait]
impl ModuleFetcher for Offline {
    async fn fetch(&self, url: &str) -> Result<String> {
        Err(RuntimeError::fetch(url, "offline"))
    }
}

fn service_with(config: RuntimeConfig) -> ExecutionService {
    let runtime = ScriptRuntime::with_fetcher(config, Arc::new(Offline)).unwrap();
    ExecutionService::with_runtime(runtime)
}

fn service() -> ExecutionService {
    service_with(RuntimeConfig::default())
}

#[tokio::test]
async fn test_captures_console_output() {
    let mut service = service();
    assert_eq!(service.state(), RunState::Idle);

    let result = service
        .execute_script(
            "console.log('hello', 1 + 1); console.info('info'); console.debug('debug');",
            "hello.js",
        )
        .await;

    assert_eq!(
        result,
        ExecutionResult::success(vec!["hello 2".into(), "info".into(), "debug".into()])
    );
    assert_eq!(service.state(), RunState::Settled);
}

#[tokio::test]
async fn test_error_and_warn_lines_are_marked() {
    let mut service = service();
    let result = service
        .execute_script(
            "console.error('bad', 'thing'); console.warn('careful'); console.assert(false, 'nope');",
            "marks.js",
        )
        .await;

    assert!(result.success);
    assert_eq!(
        result.output,
        vec![
            "[ERROR] bad thing".to_string(),
            "[WARN] careful".to_string(),
            "[ERROR] Assertion failed: nope".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failure_keeps_output_so_far() {
    let mut service = service();
    let result = service
        .execute_script(
            "console.log('before'); throw new Error('boom'); console.log('after');",
            "fail.js",
        )
        .await;

    assert_eq!(result, ExecutionResult::failure(vec!["before".into()], "boom"));
}

#[tokio::test]
async fn test_thrown_primitive_is_unknown_error() {
    let mut service = service();
    let result = service.execute_script("throw 42;", "prim.js").await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Unknown error"));
}

#[tokio::test]
async fn test_missing_module_message() {
    let mut service = service();
    let result = service.execute_script("require('nowhere');", "missing.js").await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Cannot find module 'nowhere'"));
}

#[tokio::test]
async fn test_runs_do_not_share_output() {
    let mut service = service();
    let first = service.execute_script("console.log('one');", "one.js").await;
    let second = service.execute_script("console.log('two');", "two.js").await;

    assert_eq!(first.output, vec!["one".to_string()]);
    assert_eq!(second.output, vec!["two".to_string()]);
}

#[tokio::test]
async fn test_console_is_restored_after_runs() {
    let mut service = service();
    let before = service.runtime().console();

    service.execute_script("console.log('ok');", "ok.js").await;
    service.execute_script("throw new Error('x');", "fail.js").await;

    let after = service.runtime().console();
    let before = before.as_object().unwrap();
    let after = after.as_object().unwrap();
    assert!(JsObject::equals(before, after));

    let seen = service
        .runtime_mut()
        .execute("module.exports = console;", "peek.js")
        .await
        .unwrap();
    assert!(JsObject::equals(seen.as_object().unwrap(), after));
}

#[tokio::test]
async fn test_output_from_awaited_timers() {
    let mut service = service();
    let result = service
        .execute_script(
            r#"
            setTimeout(() => console.log('second'), 20);
            setTimeout(() => console.log('first'), 5);
            await new Promise((resolve) => setTimeout(resolve, 40));
            console.log('done');
            "#,
            "timers.js",
        )
        .await;

    assert_eq!(
        result.output,
        vec!["first".to_string(), "second".to_string(), "done".to_string()]
    );
}

#[tokio::test]
async fn test_timer_errors_are_reported_not_fatal() {
    let mut service = service();
    let result = service
        .execute_script(
            r#"
            setTimeout(() => { throw new TypeError('late'); }, 0);
            await new Promise((resolve) => setTimeout(resolve, 10));
            console.log('still running');
            "#,
            "late.js",
        )
        .await;

    assert!(result.success);
    assert_eq!(
        result.output,
        vec![
            "[ERROR] Uncaught TypeError: late".to_string(),
            "still running".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_auxiliary_helpers() {
    let mut service = service();
    let result = service
        .execute_script(
            r#"
            const diff = Auxiliary.objDifference({ a: 1, b: 2 }, { b: 3, c: 4 });
            console.log(JSON.stringify(diff));
            const deep = Auxiliary.deepObjDifference(
                { a: { x: 1, y: 2 }, b: 1 },
                { a: { x: 1, y: 3 }, b: 1 },
            );
            console.log(JSON.stringify(deep));
            "#,
            "aux.js",
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    let diff: serde_json::Value = serde_json::from_str(&result.output[0]).unwrap();
    assert_eq!(
        diff,
        serde_json::json!({
            "added": { "c": 4 },
            "deleted": { "a": 1 },
            "updated": { "b": { "from": 2, "to": 3 } }
        })
    );
    let deep: serde_json::Value = serde_json::from_str(&result.output[1]).unwrap();
    assert_eq!(deep, serde_json::json!({ "a": { "y": 2 } }));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_a_failed_result() {
    let mut config = RuntimeConfig::default();
    config.execution_timeout_ms = Some(50);
    let mut service = service_with(config);

    let result = service
        .execute_script(
            "console.log('waiting'); await new Promise((r) => setTimeout(r, 10_000));",
            "slow.js",
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.output, vec!["waiting".to_string()]);
    assert_eq!(
        result.error.as_deref(),
        Some("slow.js: execution timed out after 50ms")
    );
    assert!(service.runtime().is_idle());
}

#[tokio::test]
async fn test_huge_timer_delays_do_not_abort_the_run() {
    let mut service = service();
    for delay in ["1e30", "1e22", "Infinity", "-1", "NaN"] {
        let script = format!(
            "setTimeout(() => {{}}, {delay}); setInterval(() => {{}}, {delay}); \
             const pending = sleep({delay}); console.log('ok');"
        );
        let script = format!("const {{ sleep }} = require('timers');\n{script}");
        let result = service.execute_script(&script, "delay.js").await;
        assert_eq!(result, ExecutionResult::success(vec!["ok".into()]), "delay {delay}");
    }
}

#[tokio::test]
async fn test_logger_module_writes_to_the_run_output() {
    let mut service = service();
    let result = service
        .execute_script(
            r#"
            const { createLogger, sleep, warn } = require('logger');
            const worker = createLogger('worker');
            for (let round = 1; round <= 2; round++) {
                worker.log('round', round);
                await sleep(1);
            }
            warn('finished');
            "#,
            "monitor.js",
        )
        .await;

    assert_eq!(
        result,
        ExecutionResult::success(vec![
            "[worker] round 1".into(),
            "[worker] round 2".into(),
            "[WARN] finished".into(),
        ])
    );
}
