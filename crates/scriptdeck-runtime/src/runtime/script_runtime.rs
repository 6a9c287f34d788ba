// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The script runtime: module registry operations and script execution

use super::event_loop::{TimerTask, UrlLoad};
use super::host::{Host, HostState};
use super::unit::{AsyncUnit, CommonJsUnit, ScriptUnit};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::fetch::{HttpFetcher, ModuleFetcher};
use crate::globals::console::{CaptureSession, ConsoleLevel};
use crate::globals::logger::{LOGGER_MODULE, create_logger_module};
use crate::globals::timers::{TIMERS_MODULE, create_timers_module};
use crate::globals::{ExecutionContext, SharedBindings};
use crate::module_system::{Rewrite, create_require, rewrite_imports};
use boa_engine::{
    Context, JsValue,
    builtins::promise::PromiseState,
    object::builtins::{JsFunction, JsPromise},
};
use futures::future::{FutureExt, LocalBoxFuture};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Cancels the run in progress at its next suspension point.
///
/// Cheap to clone and usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelHandle {
    /// Request cancellation of the current run
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Limits of the top-level run in progress
#[derive(Debug, Clone)]
struct RunLimits {
    identity: String,
    deadline: Option<(Instant, Duration)>,
}

async fn elapsed(deadline: Option<(Instant, Duration)>) {
    match deadline {
        Some((at, _)) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Embedded script runtime.
///
/// Owns the interpreter, the module registry and the event loop. The
/// interpreter is single threaded, so the runtime and its futures are
/// `!Send`; drive them on a current-thread runtime or a `LocalSet`.
pub struct ScriptRuntime {
    /// The JavaScript interpreter
    context: Context,
    /// State shared with native bindings
    host: Rc<HostState>,
    /// Console, timers and Auxiliary
    shared: SharedBindings,
    /// Source of remote modules
    fetcher: Arc<dyn ModuleFetcher>,
    config: RuntimeConfig,
    limits: Option<RunLimits>,
    cancel: CancelHandle,
}

impl ScriptRuntime {
    /// Create a runtime fetching remote modules over HTTP
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a runtime with a custom module fetcher
    pub fn with_fetcher(config: RuntimeConfig, fetcher: Arc<dyn ModuleFetcher>) -> Result<Self> {
        let mut context = Context::default();
        {
            let limits = context.runtime_limits_mut();
            if let Some(limit) = config.loop_iteration_limit {
                limits.set_loop_iteration_limit(limit);
            }
            if let Some(limit) = config.recursion_limit {
                limits.set_recursion_limit(limit);
            }
        }

        let host = Rc::new(HostState::new(config.forward_console));
        let shared = SharedBindings::new(&Host::new(&host), &mut context);
        shared
            .install(&mut context)
            .map_err(|e| RuntimeError::Engine(e.to_string()))?;

        let timers = create_timers_module(&shared.timers, &mut context);
        let logger = create_logger_module(&Host::new(&host), &shared.timers, &mut context);
        {
            let mut registry = host.registry.borrow_mut();
            registry.insert_external(TIMERS_MODULE, timers.into());
            registry.insert_external(LOGGER_MODULE, logger.into());
        }

        debug!("Script runtime initialized");
        Ok(Self {
            context,
            host,
            shared,
            fetcher,
            config,
            limits: None,
            cancel: CancelHandle::default(),
        })
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Handle cancelling the run in progress
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Whether no execution is in progress
    pub fn is_idle(&self) -> bool {
        self.host.is_idle()
    }

    /// The underlying interpreter
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// The console object installed as the global `console`
    pub fn console(&self) -> JsValue {
        self.shared.console.clone().into()
    }

    /// Compile and run `source` as a CommonJS body, storing its
    /// `module.exports` under `name`. Replaces any previous module of that
    /// name. Relative requires inside the body resolve against `name`.
    pub fn register_module(&mut self, name: &str, source: &str) -> Result<()> {
        let _run = self.host.enter_run();
        let compile_error = |err: RuntimeError| RuntimeError::ModuleCompile {
            module: name.to_string(),
            reason: err.reason(),
        };

        let rewrite = rewrite_imports(source);
        report_rewrite(name, &rewrite);
        let bindings = self.bindings(name).map_err(compile_error)?;
        let function = CommonJsUnit
            .compile(&rewrite.source, name, &mut self.context)
            .map_err(compile_error)?;

        let args = bindings.arguments(&self.shared);
        function
            .call(&JsValue::undefined(), &args, &mut self.context)
            .map_err(|e| compile_error(RuntimeError::from_js(name, &e, &mut self.context)))?;
        let _ = self.context.run_jobs();

        let exports = bindings
            .module_exports(&mut self.context)
            .map_err(|e| compile_error(RuntimeError::from_js(name, &e, &mut self.context)))?;
        self.host.registry.borrow_mut().insert_module(name, exports);
        debug!("Registered module '{}'", name);
        Ok(())
    }

    /// Exports of a registered module
    pub fn get_module(&self, name: &str) -> Option<JsValue> {
        self.host.registry.borrow().module(name)
    }

    /// Names of registered modules
    pub fn module_names(&self) -> Vec<String> {
        self.host.registry.borrow().module_names()
    }

    /// Names of external modules
    pub fn external_names(&self) -> Vec<String> {
        self.host.registry.borrow().external_names()
    }

    /// Register a host value under `name`, replacing any previous entry.
    ///
    /// External modules take priority over registered modules and survive
    /// [`clear_cache`](Self::clear_cache).
    pub fn register_external_module(&mut self, name: &str, value: JsValue) {
        self.host.registry.borrow_mut().insert_external(name, value);
        debug!("Registered external module '{}'", name);
    }

    /// Register a JSON document as an external module
    pub fn register_external_json(&mut self, name: &str, json: &serde_json::Value) -> Result<()> {
        let value = JsValue::from_json(json, &mut self.context)
            .map_err(|e| RuntimeError::from_js(name, &e, &mut self.context))?;
        self.register_external_module(name, value);
        Ok(())
    }

    /// Build the `require` function of a unit running as `identity`
    pub fn create_require(&mut self, identity: &str) -> Result<JsFunction> {
        create_require(&Host::new(&self.host), identity, &mut self.context)
            .map_err(|e| RuntimeError::from_js(identity, &e, &mut self.context))
    }

    /// Forget registered modules and loaded URL modules
    pub fn clear_cache(&mut self) {
        self.host.registry.borrow_mut().clear();
    }

    /// Convert a script value to JSON
    pub fn to_json(&mut self, value: &JsValue) -> Result<serde_json::Value> {
        value
            .to_json(&mut self.context)
            .map_err(|e| RuntimeError::from_js("<host>", &e, &mut self.context))
    }

    /// Load a remote module, executing it at most once.
    ///
    /// Cached URLs are returned without network access. Failures are not
    /// cached, so a later call fetches again.
    pub async fn load_external_url(&mut self, url: &str) -> Result<JsValue> {
        let cached = self.host.registry.borrow().url(url);
        if let Some(exports) = cached {
            debug!("URL cache hit for {}", url);
            return Ok(exports);
        }

        let Some(_loading) = self.host.begin_load(url) else {
            return Err(RuntimeError::CircularDependency(url.to_string()));
        };

        debug!("Loading external module {}", url);
        let source = self.fetch(url).await?;
        let exports = self
            .execute_unit(source, url.to_string())
            .await
            .map_err(|err| match err {
                RuntimeError::Timeout { .. }
                | RuntimeError::Cancelled(_)
                | RuntimeError::CircularDependency(_)
                | RuntimeError::Fetch { .. }
                | RuntimeError::UrlModule { .. } => err,
                other => RuntimeError::UrlModule {
                    url: url.to_string(),
                    reason: other.reason(),
                },
            })?;

        self.host
            .registry
            .borrow_mut()
            .insert_url(url, exports.clone());
        Ok(exports)
    }

    /// Run `source` as an asynchronous unit identified by `identity` and
    /// return its final `module.exports`.
    ///
    /// Drives promise jobs, timers and `require.async` loads until the unit
    /// settles. Timers still pending afterwards are discarded.
    pub async fn execute(&mut self, source: &str, identity: &str) -> Result<JsValue> {
        self.execute_unit(source.to_string(), identity.to_string())
            .await
    }

    /// Like [`execute`](Self::execute), appending console output to `session`
    pub async fn execute_captured(
        &mut self,
        source: &str,
        identity: &str,
        session: &CaptureSession,
    ) -> Result<JsValue> {
        let _session = self.host.attach_session(session.clone());
        self.execute(source, identity).await
    }

    fn execute_unit(&mut self, source: String, identity: String) -> LocalBoxFuture<'_, Result<JsValue>> {
        async move {
            let run = self.host.enter_run();
            if run.is_top_level() {
                self.cancel.reset();
                self.limits = Some(RunLimits {
                    identity: identity.clone(),
                    deadline: self
                        .config
                        .execution_timeout()
                        .map(|timeout| (Instant::now() + timeout, timeout)),
                });
            }
            debug!("Executing {}", identity);

            let rewrite = rewrite_imports(&source);
            report_rewrite(&identity, &rewrite);
            let bindings = self.bindings(&identity)?;
            let function = AsyncUnit.compile(&rewrite.source, &identity, &mut self.context)?;

            let args = bindings.arguments(&self.shared);
            let value = function
                .call(&JsValue::undefined(), &args, &mut self.context)
                .map_err(|e| RuntimeError::from_js(&identity, &e, &mut self.context))?;
            let promise = value
                .as_object()
                .and_then(|object| JsPromise::from_object(object.clone()).ok())
                .ok_or_else(|| {
                    RuntimeError::Engine(format!("{identity}: unit did not return a promise"))
                })?;

            self.settle(&promise, &identity).await?;
            let exports = bindings
                .module_exports(&mut self.context)
                .map_err(|e| RuntimeError::from_js(&identity, &e, &mut self.context))?;
            Ok(exports)
        }
        .boxed_local()
    }

    fn bindings(&mut self, identity: &str) -> Result<ExecutionContext> {
        let require = self.create_require(identity)?;
        ExecutionContext::new(identity, require, &mut self.context)
            .map_err(|e| RuntimeError::from_js(identity, &e, &mut self.context))
    }

    /// Run the event loop until `promise` settles
    async fn settle(&mut self, promise: &JsPromise, identity: &str) -> Result<JsValue> {
        loop {
            let _ = self.context.run_jobs();
            match promise.state() {
                PromiseState::Fulfilled(value) => return Ok(value),
                PromiseState::Rejected(reason) => {
                    return Err(RuntimeError::from_thrown(identity, &reason, &mut self.context));
                }
                PromiseState::Pending => {}
            }
            self.check_interrupted()?;

            let load = self.host.event_loop.borrow_mut().pop_url_load();
            if let Some(load) = load {
                self.complete_url_load(load).await;
                continue;
            }

            let next = self.host.event_loop.borrow_mut().next_deadline();
            match next {
                Some(deadline) => {
                    self.wait_until(deadline).await?;
                    self.fire_due_timers();
                }
                None => return Err(RuntimeError::Stalled(identity.to_string())),
            }
        }
    }

    /// Limits of the run in progress. Stale limits of an abandoned run are
    /// ignored once the runtime is idle again.
    fn active_limits(&self) -> Option<&RunLimits> {
        if self.host.is_idle() {
            None
        } else {
            self.limits.as_ref()
        }
    }

    fn check_interrupted(&self) -> Result<()> {
        let Some(limits) = self.active_limits() else {
            return Ok(());
        };
        if self.cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled(limits.identity.clone()));
        }
        if let Some((at, after)) = limits.deadline {
            if Instant::now() >= at {
                return Err(RuntimeError::Timeout {
                    identity: limits.identity.clone(),
                    after,
                });
            }
        }
        Ok(())
    }

    async fn wait_until(&self, timer: Instant) -> Result<()> {
        let deadline = self.active_limits().and_then(|limits| limits.deadline);
        let wake = match deadline {
            Some((at, _)) if at < timer => at,
            _ => timer,
        };
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep_until(wake) => {}
            _ = cancel.cancelled() => {}
        }
        self.check_interrupted()
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let fetcher = Arc::clone(&self.fetcher);
        let limits = self.active_limits();
        let deadline = limits.and_then(|limits| limits.deadline);
        // A cancel left over from an earlier run does not apply to a load
        // made while idle
        let cancel = limits.map(|_| self.cancel.clone());
        let cancelled = async move {
            match cancel {
                Some(cancel) => cancel.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            result = fetcher.fetch(url) => result,
            _ = cancelled => self.check_interrupted().and(Err(RuntimeError::Cancelled(url.to_string()))),
            _ = elapsed(deadline) => self.check_interrupted().and(Err(RuntimeError::fetch(url, "deadline elapsed"))),
        }
    }

    fn fire_due_timers(&mut self) {
        let now = Instant::now();
        loop {
            let timer = self.host.event_loop.borrow_mut().pop_due(now);
            let Some(timer) = timer else {
                break;
            };
            match timer.task {
                TimerTask::Callback { function, args } => {
                    if let Err(err) = function.call(&JsValue::undefined(), &args, &mut self.context) {
                        let err = RuntimeError::from_js("timer", &err, &mut self.context);
                        warn!("Uncaught error in timer callback: {}", err.reason());
                        self.host
                            .record(ConsoleLevel::Error, &format!("Uncaught {}", err.reason()));
                    }
                }
                TimerTask::Resolve(resolve) => {
                    let _ = resolve.call(&JsValue::undefined(), &[], &mut self.context);
                }
            }
            let _ = self.context.run_jobs();
        }
    }

    async fn complete_url_load(&mut self, load: UrlLoad) {
        let result = self.load_external_url(&load.url).await;
        let (settled, argument) = match result {
            Ok(exports) => (true, exports),
            Err(err) => {
                debug!("require.async('{}') failed: {}", load.url, err);
                (false, err.to_js_error(&mut self.context).to_opaque(&mut self.context))
            }
        };
        for waiter in load.waiters {
            let function = if settled { waiter.resolve } else { waiter.reject };
            let _ = function.call(&JsValue::undefined(), &[argument.clone()], &mut self.context);
        }
    }
}

fn report_rewrite(identity: &str, rewrite: &Rewrite) {
    if rewrite.rewritten > 0 {
        debug!("{}: rewrote {} import(s) onto require", identity, rewrite.rewritten);
    }
    for skipped in &rewrite.unsupported {
        warn!(
            "{}:{}: unsupported import left unchanged: {}",
            identity,
            skipped.line,
            skipped.text.trim()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoFetch;

    #[async_trait]
    impl ModuleFetcher for NoFetch {
        async fn fetch(&self, url: &str) -> Result<String> {
            Err(RuntimeError::fetch(url, "offline"))
        }
    }

    fn runtime(config: RuntimeConfig) -> ScriptRuntime {
        ScriptRuntime::with_fetcher(config, Arc::new(NoFetch)).unwrap()
    }

    fn text(value: &JsValue) -> String {
        value.as_string().unwrap().to_std_string_escaped()
    }

    #[tokio::test]
    async fn test_execute_returns_module_exports() {
        let mut rt = runtime(RuntimeConfig::default());
        let exports = rt
            .execute("module.exports = { answer: await Promise.resolve(42) };", "a.js")
            .await
            .unwrap();
        assert_eq!(rt.to_json(&exports).unwrap(), serde_json::json!({ "answer": 42 }));
    }

    #[tokio::test]
    async fn test_identity_metadata() {
        let mut rt = runtime(RuntimeConfig::default());
        let exports = rt
            .execute("exports.file = __filename; exports.dir = __dirname;", "/work/a.js")
            .await
            .unwrap();
        assert_eq!(
            rt.to_json(&exports).unwrap(),
            serde_json::json!({ "file": "/work/a.js", "dir": "/work" })
        );
    }

    #[tokio::test]
    async fn test_register_module_failure_names_module() {
        let mut rt = runtime(RuntimeConfig::default());
        let err = rt
            .register_module("broken", "throw new Error('nope')")
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to register module 'broken': Error: nope");
        assert!(rt.get_module("broken").is_none());
    }

    #[tokio::test]
    async fn test_timers_module_is_external() {
        let mut rt = runtime(RuntimeConfig::default());
        assert!(rt.external_names().contains(&"timers".to_string()));
        let exports = rt
            .execute(
                "const { sleep } = require('timers'); await sleep(1); module.exports = 'woke';",
                "a.js",
            )
            .await
            .unwrap();
        assert_eq!(text(&exports), "woke");
    }

    #[tokio::test]
    async fn test_stalled_script() {
        let mut rt = runtime(RuntimeConfig::default());
        let err = rt.execute("await new Promise(() => {});", "a.js").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Stalled(identity) if identity == "a.js"));
        assert!(rt.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let mut config = RuntimeConfig::default();
        config.execution_timeout_ms = Some(100);
        let mut rt = runtime(config);

        let err = rt
            .execute("setInterval(() => {}, 10); await new Promise(() => {});", "spin.js")
            .await
            .unwrap_err();
        match err {
            RuntimeError::Timeout { identity, after } => {
                assert_eq!(identity, "spin.js");
                assert_eq!(after, Duration::from_millis(100));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_loop_iteration_limit() {
        let mut config = RuntimeConfig::default();
        config.loop_iteration_limit = Some(1_000);
        let mut rt = runtime(config);

        let err = rt.register_module("spin", "while (true) {}").unwrap_err();
        assert!(matches!(err, RuntimeError::ModuleCompile { module, .. } if module == "spin"));
    }

    #[tokio::test]
    async fn test_cancel_before_suspension() {
        let mut rt = runtime(RuntimeConfig::default());
        let handle = rt.cancel_handle();

        let source = "setTimeout(() => {}, 50); await new Promise(r => setTimeout(r, 10));";
        let run = rt.execute(source, "c.js");
        handle.cancel();
        // The flag is reset when the run starts, so this run completes
        assert!(run.await.is_ok());

        let run = async {
            tokio::task::yield_now().await;
            handle.cancel();
        };
        let (result, ()) = tokio::join!(rt.execute(source, "c.js"), run);
        assert!(matches!(result, Err(RuntimeError::Cancelled(identity)) if identity == "c.js"));
    }
}
