//! Console session.
//!
//! A `TableSession` owns a resource registry and drives it from text
//! commands:
//! - `create <id> <key_dtype> <value_dtype>`
//! - `import <id> <k1> <v1> [<k2> <v2> ...]`
//! - `find <id> <default> <k1> [<k2> ...]`
//! - `size <id>`
//! - `status`
//! - `quit`
//!
//! Anything else is handed to the [`Console`].

use std::io::Write;

use anyhow::Context;
use hashtable_shared::{
    config::HashtableConfig,
    console::{parse_command_line, Console},
    context::LoggingContext,
    dtype::DataType,
    hashtable::LookupInterface,
    kernels::{hashtable, hashtable_find, hashtable_import, hashtable_size, HashtableParams},
    resources::{Resource, ResourceEntry, ResourceMap},
    tensor::Tensor,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Interactive hashtable session.
pub struct TableSession {
    pub console: Console,
    resources: ResourceMap,
    ctx: LoggingContext,
    commands_run: u64,
    quit: bool,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl TableSession {
    /// Creates a session and applies the configured tables.
    pub fn new(cfg: HashtableConfig) -> anyhow::Result<Self> {
        let mut ctx = LoggingContext::new();
        let mut resources = ResourceMap::new();
        cfg.apply(&mut ctx, &mut resources).context("apply table config")?;

        Ok(Self {
            console: Console::new(),
            resources,
            ctx,
            commands_run: 0,
            quit: false,
            console_rx: None,
        })
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    pub fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceMap {
        &mut self.resources
    }

    /// Whether `quit` has been issued.
    pub fn is_finished(&self) -> bool {
        self.quit
    }

    /// Executes lines from the console input until it closes or `quit` runs.
    ///
    /// Command output and errors are written to `out`.
    pub async fn run<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        let mut rx = self.console_rx.take().context("no console input attached")?;

        while !self.quit {
            let Some(line) = rx.recv().await else {
                break;
            };
            match self.exec_console(&line) {
                Ok(lines) => {
                    for l in lines {
                        writeln!(out, "{}", l).context("write output")?;
                    }
                }
                Err(e) => writeln!(out, "Error: {:#}", e).context("write output")?,
            }
        }

        info!(commands = self.commands_run, "Session finished");
        Ok(())
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let tokens = parse_command_line(line);
        let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let Some((&cmd, args)) = tokens.split_first() else {
            return Ok(Vec::new());
        };

        self.commands_run += 1;
        self.ctx.take_reports();
        debug!(command = %cmd, args = args.len(), "Console command");

        match cmd {
            "create" => {
                if args.len() != 3 {
                    return Ok(vec!["Usage: create <id> <key_dtype> <value_dtype>".to_string()]);
                }
                self.console.record(line.trim());
                self.create(parse_id(args[0])?, parse_dtype(args[1])?, parse_dtype(args[2])?)
            }
            "import" => {
                if args.is_empty() || args.len() % 2 == 0 {
                    return Ok(vec!["Usage: import <id> <k1> <v1> [<k2> <v2> ...]".to_string()]);
                }
                self.console.record(line.trim());
                let (keys, values): (Vec<&str>, Vec<&str>) =
                    args[1..].chunks(2).map(|pair| (pair[0], pair[1])).unzip();
                self.import(parse_id(args[0])?, &keys, &values)
            }
            "find" => {
                if args.len() < 3 {
                    return Ok(vec!["Usage: find <id> <default> <k1> [<k2> ...]".to_string()]);
                }
                self.console.record(line.trim());
                self.find(parse_id(args[0])?, args[1], &args[2..])
            }
            "size" => {
                if args.len() != 1 {
                    return Ok(vec!["Usage: size <id>".to_string()]);
                }
                self.console.record(line.trim());
                self.size(parse_id(args[0])?)
            }
            "status" => Ok(self.status()),
            "quit" | "exit" => {
                info!("Session shutting down");
                self.quit = true;
                Ok(vec!["Bye".to_string()])
            }
            _ => {
                // Delegate to console system.
                self.console.exec(line)
            }
        }
    }

    fn create(&mut self, id: i32, key_dtype: DataType, value_dtype: DataType) -> anyhow::Result<Vec<String>> {
        let params = HashtableParams {
            table_id: id,
            key_dtype,
            value_dtype,
        };
        let mut handle = Tensor::scalar(0i32);
        hashtable(&mut self.ctx, &mut self.resources, &params, &mut handle)
            .with_context(|| format!("create table {}", id))?;

        let (key, value) = self.table_types(id)?;
        Ok(vec![format!("Table {} ready ({} -> {})", id, key, value)])
    }

    fn import(&mut self, id: i32, keys: &[&str], values: &[&str]) -> anyhow::Result<Vec<String>> {
        let (key_dtype, value_dtype) = self.table_types(id)?;
        let already = self.resources.get(id).is_some_and(|entry| entry.is_initialized());

        let keys = Tensor::parse_vector(key_dtype, keys).context("parse keys")?;
        let values = Tensor::parse_vector(value_dtype, values).context("parse values")?;
        hashtable_import(&mut self.ctx, &mut self.resources, &Tensor::scalar(id), &keys, &values)
            .with_context(|| format!("import into table {}", id))?;

        if already {
            return Ok(vec![format!("Table {} already initialized, import ignored", id)]);
        }
        let size = self.table_size(id)?;
        Ok(vec![format!("Imported {} pairs into table {} ({} entries)", keys.flat_size(), id, size)])
    }

    fn find(&mut self, id: i32, default: &str, keys: &[&str]) -> anyhow::Result<Vec<String>> {
        let (key_dtype, value_dtype) = self.table_types(id)?;
        let keys = Tensor::parse_vector(key_dtype, keys).context("parse keys")?;
        let default = Tensor::parse_vector(value_dtype, &[default]).context("parse default")?;

        let mut output = Tensor::scalar(0i32);
        hashtable_find(&mut self.ctx, &mut self.resources, &Tensor::scalar(id), &keys, &default, &mut output)
            .with_context(|| format!("find in table {}", id))?;
        Ok(vec![output.display_values()?.join(" ")])
    }

    fn size(&mut self, id: i32) -> anyhow::Result<Vec<String>> {
        Ok(vec![self.table_size(id)?.to_string()])
    }

    fn status(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(format!("Resources: {}", self.resources.len()));
        out.push(format!("Memory: {} bytes", self.resources.memory_usage()));
        for id in self.resources.ids() {
            let Some(entry) = self.resources.get(id) else {
                continue;
            };
            match entry {
                ResourceEntry::Hashtable(table) => out.push(format!(
                    "  {}: hashtable {} -> {} size={} initialized={}",
                    id,
                    table.key_type(),
                    table.value_type(),
                    table.size(),
                    table.is_initialized()
                )),
                ResourceEntry::Variable(_) => out.push(format!(
                    "  {}: {} initialized={}",
                    id,
                    entry.kind(),
                    entry.is_initialized()
                )),
            }
        }
        out
    }

    fn table_types(&self, id: i32) -> anyhow::Result<(DataType, DataType)> {
        self.resources
            .get(id)
            .and_then(ResourceEntry::as_lookup)
            .map(|table| (table.key_type(), table.value_type()))
            .with_context(|| format!("no hashtable with id {}", id))
    }

    fn table_size(&mut self, id: i32) -> anyhow::Result<i64> {
        let mut output = Tensor::scalar(0i64);
        hashtable_size(&mut self.ctx, &mut self.resources, &Tensor::scalar(id), &mut output)
            .with_context(|| format!("size of table {}", id))?;
        output.to_vec::<i64>()?.first().copied().context("empty size output")
    }
}

fn parse_id(token: &str) -> anyhow::Result<i32> {
    token
        .parse()
        .with_context(|| format!("invalid resource id '{}'", token))
}

fn parse_dtype(token: &str) -> anyhow::Result<DataType> {
    Ok(token.parse::<DataType>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> TableSession {
        TableSession::new(HashtableConfig::default()).unwrap()
    }

    #[test]
    fn create_import_find() {
        let mut s = session();
        assert_eq!(s.exec_console("create 1 int32 string").unwrap(), vec!["Table 1 ready (int32 -> string)"]);
        assert_eq!(
            s.exec_console("import 1 1 a 2 \"b c\"").unwrap(),
            vec!["Imported 2 pairs into table 1 (2 entries)"]
        );
        assert_eq!(s.exec_console("find 1 none 2 3 1").unwrap(), vec![r#""b c" "none" "a""#]);
        assert_eq!(s.exec_console("size 1").unwrap(), vec!["2"]);
    }

    #[test]
    fn second_import_is_ignored() {
        let mut s = session();
        s.exec_console("create 1 int32 int32").unwrap();
        s.exec_console("import 1 1 10").unwrap();
        assert_eq!(
            s.exec_console("import 1 3 30").unwrap(),
            vec!["Table 1 already initialized, import ignored"]
        );
        assert_eq!(s.exec_console("find 1 -1 1 3").unwrap(), vec!["10 -1"]);
    }

    #[test]
    fn find_before_import_errors() {
        let mut s = session();
        s.exec_console("create 2 string float32").unwrap();
        let err = s.exec_console("find 2 0.5 a").unwrap_err();
        assert!(format!("{:#}", err).contains("hashtable need to be initialized before using"));
    }

    #[test]
    fn bad_input_errors() {
        let mut s = session();
        assert!(s.exec_console("create x int32 int32").is_err());
        assert!(s.exec_console("create 1 complex int32").is_err());
        assert!(s.exec_console("create 1 float32 int32").is_err());
        assert!(s.exec_console("find 5 0 1").is_err());
        assert_eq!(s.exec_console("import 1 2").unwrap(), vec!["Usage: import <id> <k1> <v1> [<k2> <v2> ...]"]);
    }

    #[test]
    fn status_lists_tables() {
        let mut s = session();
        s.exec_console("create 3 string int32").unwrap();
        let out = s.exec_console("status").unwrap();
        assert_eq!(out[0], "Resources: 1");
        assert_eq!(out[2], "  3: hashtable string -> int32 size=0 initialized=false");
    }

    #[test]
    fn other_commands_go_to_console() {
        let mut s = session();
        assert_eq!(s.exec_console("echo hi there").unwrap(), vec!["hi there"]);
        s.exec_console("quit").unwrap();
        assert!(s.is_finished());
    }
}
