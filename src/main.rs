// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! scriptdeck CLI - run workspace scripts with captured output
//!
//! ## Features
//!
//! - Run a script file or inline code and print its console output
//! - Preload named modules the script can `require`
//! - Interactive REPL with history

mod repl;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use scriptdeck_runtime::{ERROR_MARKER, ExecutionResult, ExecutionService, RuntimeConfig, VERSION};
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "scriptdeck",
    about = "Run workspace scripts with captured console output",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Script file to execute
    script: Option<PathBuf>,

    /// Execute code given on the command line
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Register a module before running, as NAME=PATH (repeatable)
    #[arg(short = 'm', long = "module", value_name = "NAME=PATH")]
    modules: Vec<String>,

    /// Runtime configuration file (TOML)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Abort the run after this many milliseconds
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Print the execution result as JSON
    #[arg(long)]
    json: bool,

    /// Start interactive REPL
    #[arg(short = 'i', long = "interactive", alias = "repl")]
    interactive: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("scriptdeck=debug,scriptdeck_runtime=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("scriptdeck=warn,scriptdeck_runtime=warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::from_env(),
    };
    if cli.timeout_ms.is_some() {
        config.execution_timeout_ms = cli.timeout_ms;
    }
    // Output is captured and printed by the CLI itself
    config.forward_console = false;

    let mut service = ExecutionService::new(config)?;
    for module in &cli.modules {
        register_module_arg(&mut service, module)?;
    }

    let (code, label) = if let Some(code) = cli.eval {
        (code, "[eval]".to_string())
    } else if let Some(path) = cli.script {
        let code = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        (code, path.display().to_string())
    } else if cli.interactive || std::io::stdin().is_terminal() {
        print_banner();
        repl::Repl::new(service)?.run().await?;
        return Ok(ExitCode::SUCCESS);
    } else {
        let mut code = String::new();
        std::io::stdin().read_to_string(&mut code)?;
        (code, "[stdin]".to_string())
    };

    let result = service.execute_script(&code, &label).await;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Register a `NAME=PATH` module given on the command line
pub(crate) fn register_module_arg(service: &mut ExecutionService, arg: &str) -> anyhow::Result<()> {
    let (name, path) = arg
        .split_once('=')
        .with_context(|| format!("module must be given as NAME=PATH, got '{arg}'"))?;
    register_module_file(service, name, Path::new(path))
}

/// Read `path` and register it as module `name`
pub(crate) fn register_module_file(
    service: &mut ExecutionService,
    name: &str,
    path: &Path,
) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    service.runtime_mut().register_module(name, &source)?;
    tracing::debug!("Registered {} from {}", name, path.display());
    Ok(())
}

/// Print captured output, then the failure if there was one
pub(crate) fn print_result(result: &ExecutionResult) {
    for line in &result.output {
        if line.starts_with(ERROR_MARKER) {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
    if let Some(error) = &result.error {
        eprintln!("{}: {}", "Error".red().bold(), error);
    }
}

fn print_banner() {
    println!("{} {}", "scriptdeck".cyan().bold(), VERSION.yellow());
    println!("Type {} for help, {} to exit", ".help".green(), ".exit".green());
    println!();
}
