//! Host option parsing
//!
//! `jshost [HOST OPTIONS] [SCRIPT] [ARGS...]`. Everything from the first
//! positional argument on belongs to the script and is passed through
//! untouched, even if it looks like a flag.

use crate::config::Overrides;
use crate::engine::ProcessedArgs;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "jshost",
    version,
    about = "Run a JavaScript entry script in a single V8 isolate"
)]
pub struct HostArgs {
    /// Config file (defaults to $JSHOST_CONFIG, then the per-user config)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Evaluate SOURCE instead of loading an entry module
    #[arg(short = 'e', long, value_name = "SOURCE")]
    pub eval: Option<String>,

    /// Old-generation heap ceiling in megabytes
    #[arg(long, value_name = "MB")]
    pub max_heap_size: Option<usize>,

    /// Initial heap size in megabytes
    #[arg(long, value_name = "MB")]
    pub initial_heap_size: Option<usize>,

    /// Flags passed through to V8, e.g. "--expose-gc --stack-size=2000"
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub v8_flags: Option<String>,

    /// Worker threads of the V8 platform
    #[arg(long, value_name = "N")]
    pub platform_threads: Option<usize>,

    /// Entry script followed by its arguments
    #[arg(value_name = "SCRIPT", trailing_var_arg = true)]
    pub script: Vec<String>,
}

/// Outcome of parsing the raw argument vector
#[derive(Debug)]
pub enum Parsed {
    Run {
        host: HostArgs,
        processed: ProcessedArgs,
    },
    /// `--help` / `--version` output, already rendered
    Info(String),
    Invalid(String),
}

pub fn parse(raw: &[String]) -> Parsed {
    let host = match HostArgs::try_parse_from(raw) {
        Ok(host) => host,
        Err(err) => {
            use clap::error::ErrorKind;
            let rendered = err.render().to_string();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Parsed::Info(rendered),
                _ => Parsed::Invalid(rendered.trim_end().to_string()),
            };
        }
    };

    let program = raw.first().cloned().unwrap_or_else(|| "jshost".to_string());
    let host_end = raw.len().saturating_sub(host.script.len()).max(1);
    let mut exec_args = raw.get(1..host_end).map(<[String]>::to_vec).unwrap_or_default();
    // `--` only separates host options from the script
    if exec_args.last().map(String::as_str) == Some("--") {
        exec_args.pop();
    }

    let mut args = Vec::with_capacity(host.script.len() + 1);
    args.push(program);
    args.extend(host.script.iter().cloned());

    Parsed::Run {
        host,
        processed: ProcessedArgs { args, exec_args },
    }
}

impl HostArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            bootstrap: self.eval.clone(),
            max_heap_size_mb: self.max_heap_size,
            initial_heap_size_mb: self.initial_heap_size,
            platform_threads: self.platform_threads,
            v8_flags: self.v8_flags.clone(),
        }
    }
}
