// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL for scriptdeck
//!
//! Each entry runs as its own script through the execution service, so
//! `const` bindings do not carry over between entries. Modules registered
//! with `.register` do.

use crate::{print_result, register_module_file};
use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use scriptdeck_runtime::{ExecutionService, VERSION};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// REPL configuration constants
const HISTORY_FILE: &str = ".scriptdeck_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Register,
    Modules,
    Reset,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        let rest = input.strip_prefix('.')?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|arg| !arg.is_empty());

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            "register" | "reg" => Some((ReplCommand::Register, arg)),
            "modules" | "mods" => Some((ReplCommand::Modules, arg)),
            "reset" => Some((ReplCommand::Reset, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Run a script file"),
            (".register <name> <file>", "Register a file as module <name>"),
            (".modules", "List registered and external modules"),
            (".reset", "Forget registered and remote modules"),
        ]
    }
}


/// Words offered for completion and hints
const COMPLETIONS: &[&str] = &[
    // Script bindings
    "Auxiliary.objDifference",
    "Auxiliary.deepObjDifference",
    "console.log",
    "console.info",
    "console.warn",
    "console.error",
    "console.debug",
    "console.assert",
    "module.exports",
    "exports",
    "require",
    "require.async",
    "require.resolve",
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
    "__filename",
    "__dirname",
    // Keywords
    "async",
    "await",
    "const",
    "function",
    "import",
    "let",
    "return",
    "throw",
    // REPL commands
    ".help",
    ".exit",
    ".clear",
    ".version",
    ".load",
    ".register",
    ".modules",
    ".reset",
];

/// rustyline helper providing completion, hints and multi-line input
#[derive(Default)]
struct DeckHelper;

impl DeckHelper {
    /// Start of the word ending at `pos`
    fn word_start(line: &str, pos: usize) -> usize {
        line[..pos]
            .char_indices()
            .rev()
            .find(|&(_, c)| !c.is_alphanumeric() && c != '_' && c != '.')
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0)
    }
}

impl Completer for DeckHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[Self::word_start(line, pos)..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = COMPLETIONS
            .iter()
            .filter(|candidate| candidate.starts_with(word))
            .map(|candidate| Pair {
                display: candidate.to_string(),
                replacement: candidate[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for DeckHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = &line[Self::word_start(line, pos)..];
        if word.len() < 2 {
            return None;
        }

        COMPLETIONS
            .iter()
            .find(|candidate| candidate.starts_with(word) && candidate.len() > word.len())
            .map(|candidate| (&candidate[word.len()..]).dimmed().to_string())
    }
}

impl Highlighter for DeckHelper {}

impl Validator for DeckHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        if is_complete(ctx.input()) {
            Ok(ValidationResult::Valid(None))
        } else {
            Ok(ValidationResult::Incomplete)
        }
    }
}

impl Helper for DeckHelper {}

/// Whether `input` can be submitted: brackets and strings are closed and
/// the last line does not end in a continuation
fn is_complete(input: &str) -> bool {
    if input.trim_start().starts_with('.') {
        return true;
    }

    let mut stack = Vec::new();
    let mut in_string = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match in_string {
            Some(_) if c == '\\' => {
                chars.next();
            }
            Some(quote) if c == quote => in_string = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' | '`' => in_string = Some(c),
                '/' if chars.peek() == Some(&'/') => {
                    // Line comment
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            break;
                        }
                    }
                }
                '(' => stack.push(')'),
                '[' => stack.push(']'),
                '{' => stack.push('}'),
                ')' | ']' | '}' => {
                    // Let the parser report mismatches
                    if stack.pop() != Some(c) {
                        return true;
                    }
                }
                _ => {}
            },
        }
    }

    let trimmed = input.trim_end();
    stack.is_empty()
        && in_string.is_none()
        && !trimmed.ends_with('\\')
        && !trimmed.ends_with(',')
        && !trimmed.ends_with('=')
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// The interactive scriptdeck REPL
pub struct Repl {
    service: ExecutionService,
    editor: Editor<DeckHelper, DefaultHistory>,
    history_path: PathBuf,
    entries: usize,
}

impl Repl {
    /// Create a REPL running entries on `service`
    pub fn new(service: ExecutionService) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(DeckHelper));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriptdeck")
            .join(HISTORY_FILE);
        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.load_history(&history_path);

        Ok(Self {
            service,
            editor,
            history_path,
            entries: 0,
        })
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> rustyline::Result<()> {
        loop {
            let prompt = format!("{} ", "deck>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(input) {
                        match self.execute_command(cmd, arg).await {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    self.entries += 1;
                    let label = format!("[repl:{}]", self.entries);
                    self.run_script(input, &label).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        if let Err(err) = self.editor.save_history(&self.history_path) {
            tracing::debug!("Could not save history: {}", err);
        }
        Ok(())
    }

    async fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => {
                println!("{} {}", "scriptdeck".bright_cyan().bold(), VERSION.yellow())
            }
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(Path::new(path)).await,
                None => usage(".load <file>"),
            },
            ReplCommand::Register => match arg.and_then(|arg| arg.split_once(char::is_whitespace)) {
                Some((name, path)) => {
                    match register_module_file(&mut self.service, name, Path::new(path.trim())) {
                        Ok(()) => println!("{} {}", "registered".green(), name.cyan()),
                        Err(err) => eprintln!("{}: {:#}", "Error".red().bold(), err),
                    }
                }
                None => usage(".register <name> <file>"),
            },
            ReplCommand::Modules => self.print_modules(),
            ReplCommand::Reset => {
                self.service.runtime_mut().clear_cache();
                println!("{}", "module cache cleared".dimmed());
            }
        }
        CommandResult::Continue
    }

    async fn load_file(&mut self, path: &Path) {
        match tokio::fs::read_to_string(path).await {
            Ok(source) => {
                let label = path.display().to_string();
                self.run_script(&source, &label).await;
            }
            Err(err) => eprintln!("{}: {}: {}", "Error".red().bold(), path.display(), err),
        }
    }

    async fn run_script(&mut self, source: &str, label: &str) {
        let result = self.service.execute_script(source, label).await;
        print_result(&result);
    }

    fn print_modules(&self) {
        let runtime = self.service.runtime();
        println!("{}", "Registered:".white().bold());
        for name in runtime.module_names() {
            println!("  {}", name.cyan());
        }
        println!("{}", "External:".white().bold());
        for name in runtime.external_names() {
            println!("  {}", name.cyan());
        }
    }
}

fn usage(text: &str) {
    eprintln!("{}: {}", "Usage".red().bold(), text.cyan());
}

fn print_help() {
    println!();
    println!("{}", "REPL Commands:".white().bold());
    println!();
    for (cmd, desc) in ReplCommand::all_commands() {
        println!("  {:26} {}", cmd.cyan(), desc.dimmed());
    }
    println!();
    println!("{}", "Keyboard Shortcuts:".white().bold());
    println!();
    println!("  {:26} {}", "Ctrl+C".yellow(), "Cancel current input".dimmed());
    println!("  {:26} {}", "Ctrl+D".yellow(), "Exit REPL".dimmed());
    println!("  {:26} {}", "Tab".yellow(), "Autocomplete".dimmed());
    println!();
}
