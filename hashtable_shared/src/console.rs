//! Console system.
//!
//! Provides:
//! - Command registration and execution
//! - Command history
//! - Input parsing
//!
//! # Usage
//! ```ignore
//! let mut console = Console::new();
//! console.register_command("size", |args, ctx| { /* ... */ Ok(()) });
//! console.exec("size 1")?;
//! ```

use std::collections::HashMap;

use anyhow::Context;

/// Command handler function type.
pub type CommandHandler = Box<dyn Fn(&[&str], &mut ConsoleContext) -> anyhow::Result<()> + Send + Sync>;

/// Context passed to command handlers.
#[derive(Debug, Default)]
pub struct ConsoleContext {
    /// Output buffer for command responses.
    pub output: Vec<String>,
}

impl ConsoleContext {
    pub fn print(&mut self, msg: impl Into<String>) {
        self.output.push(msg.into());
    }
}

/// The console.
pub struct Console {
    commands: HashMap<String, CommandHandler>,
    history: Vec<String>,
    max_history: usize,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        let mut console = Self {
            commands: HashMap::new(),
            history: Vec::new(),
            max_history: 100,
        };

        console.register_builtin_commands();
        console
    }

    fn register_builtin_commands(&mut self) {
        // echo <text>
        self.register_command("echo", |args, ctx| {
            ctx.print(args.join(" "));
            Ok(())
        });

        // help
        self.register_command("help", |_args, ctx| {
            ctx.print("Table commands: create, import, find, size, status, quit");
            ctx.print("Console commands: echo, help, history");
            Ok(())
        });
    }

    /// Registers a command, replacing any handler with the same name.
    pub fn register_command<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&[&str], &mut ConsoleContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.commands.insert(name.to_string(), Box::new(handler));
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Executes a console command line.
    pub fn exec(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            return Ok(Vec::new());
        }

        self.record(line);

        let tokens = parse_command_line(line);
        let Some((cmd_name, rest)) = tokens.split_first() else {
            return Ok(Vec::new());
        };
        let args: Vec<&str> = rest.iter().map(|s| s.as_str()).collect();

        let mut ctx = ConsoleContext::default();
        if cmd_name == "history" {
            for (i, entry) in self.history.iter().enumerate() {
                ctx.print(format!("{:>3}  {}", i + 1, entry));
            }
        } else if let Some(handler) = self.commands.get(cmd_name.as_str()) {
            handler(&args, &mut ctx).with_context(|| format!("command '{}'", cmd_name))?;
        } else {
            ctx.print(format!("Unknown command: {}", cmd_name));
        }

        Ok(ctx.output)
    }

    /// Appends a line to the history, dropping the oldest past the limit.
    pub fn record(&mut self, line: &str) {
        self.history.push(line.to_string());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }
    }

    /// Gets command history.
    pub fn history(&self) -> &[String] {
        &self.history
    }
}

/// Parses a command line into tokens, respecting quotes.
pub fn parse_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => {
                current.push(c);
            }
        }
    }

    if !current.is_empty() || quoted {
        tokens.push(current);
    }

    tokens
}
