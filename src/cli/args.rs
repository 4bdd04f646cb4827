use crate::debugger::BreakpointSet;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "emulator-client",
    version,
    about = "Configure, run and debug programs on a remote emulator service",
    propagate_version = true
)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "EMULATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emulator server base URL
    #[arg(long, global = true, env = "EMULATOR_BASE_URL")]
    pub base_url: Option<String>,

    /// User identifier sent with every request
    #[arg(long, global = true, env = "EMULATOR_USER")]
    pub user: Option<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            return Verbosity::Quiet;
        }
        match self.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    /// Default filter directive when `RUST_LOG` is not set.
    pub fn to_log_level(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::Debug => "debug",
        }
    }

    pub fn is_quiet(self) -> bool {
        self == Verbosity::Quiet
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a program or helper function
    Run(RunArgs),
    /// Start an interactive debug session
    Debug(DebugArgs),
    /// List a user's past runs
    History(HistoryArgs),
    /// Re-execute a past run with its recorded inputs
    Rerun(RerunArgs),
    /// Upload a program definition file
    Upload(UploadArgs),
    /// Show the expanded instructions of a program
    Show(ShowArgs),
    /// List users
    Users,
    /// List uploaded programs
    Programs,
    /// List uploaded helper functions
    Functions,
    /// Show or charge credits
    Credits(CreditsArgs),
    /// Show the dependency chain of a program or function
    Deps(DepsArgs),
    /// Periodically reload users, programs and functions
    Watch(WatchArgs),
}

/// A `--var` value: `x3=7` binds a named input, a bare `7` takes the next
/// free input name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarArg {
    pub name: Option<String>,
    pub value: i64,
}

pub fn parse_var(s: &str) -> Result<VarArg, String> {
    let (name, value) = match s.split_once('=') {
        Some((name, value)) => (Some(name.trim().to_string()), value),
        None => (None, s),
    };
    let value = value
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("Invalid variable value in '{}'", s))?;
    if matches!(&name, Some(n) if n.is_empty()) {
        return Err(format!("Missing variable name in '{}'", s));
    }
    Ok(VarArg { name, value })
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Program (or function, with --function) name
    pub name: String,

    /// Treat NAME as a helper function
    #[arg(long)]
    pub function: bool,

    /// Expansion level
    #[arg(short, long, default_value_t = 0)]
    pub level: u32,

    /// Architecture tier (I-IV or 1-4)
    #[arg(short, long, default_value = "I")]
    pub arch: String,

    /// Input variable, `xN=VALUE` or `VALUE` for the next free input
    #[arg(long = "var", value_parser = parse_var)]
    pub vars: Vec<VarArg>,
}

#[derive(Args, Debug, Clone)]
pub struct DebugArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Command index to break at (repeatable)
    #[arg(short, long = "breakpoint")]
    pub breakpoints: Vec<u32>,

    /// Comma separated command indices to break at, e.g. `3,7,12`
    #[arg(long = "breakpoints", value_parser = BreakpointSet::parse_list)]
    pub breakpoint_list: Option<BreakpointSet>,
}

impl DebugArgs {
    /// Union of `-b` and `--breakpoints`.
    pub fn breakpoint_set(&self) -> BreakpointSet {
        self.breakpoints
            .iter()
            .copied()
            .chain(self.breakpoint_list.iter().flat_map(BreakpointSet::list))
            .collect()
    }
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// User whose runs to list (defaults to the configured user)
    #[arg(long = "of")]
    pub of: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RerunArgs {
    /// Index of the run in the user's history
    pub index: u32,

    /// User whose history to read (defaults to the configured user)
    #[arg(long = "of")]
    pub of: Option<String>,

    /// Program to run when the recorded run does not name one
    #[arg(long)]
    pub program: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Program definition (XML) to upload
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Program (or function, with --function) name
    pub name: String,

    /// Treat NAME as a helper function
    #[arg(long)]
    pub function: bool,

    /// Expansion level
    #[arg(short, long, default_value_t = 0)]
    pub level: u32,

    /// Show the instructions command N was expanded from
    #[arg(long, value_name = "N")]
    pub lineage: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct CreditsArgs {
    /// Charge this many credits to the account
    #[arg(long)]
    pub add: Option<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct DepsArgs {
    pub name: String,

    /// Treat NAME as a helper function
    #[arg(long)]
    pub function: bool,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Stop after this many refreshes
    #[arg(long)]
    pub ticks: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_var_forms() {
        assert_eq!(
            parse_var("x3=7").unwrap(),
            VarArg {
                name: Some("x3".into()),
                value: 7
            }
        );
        assert_eq!(
            parse_var("-4").unwrap(),
            VarArg {
                name: None,
                value: -4
            }
        );
        assert!(parse_var("x1=").is_err());
        assert!(parse_var("=5").is_err());
    }

    #[test]
    fn verbosity_flags() {
        let cli = Cli::parse_from(["emulator-client", "-vv", "users"]);
        assert_eq!(cli.verbosity(), Verbosity::Debug);
        let cli = Cli::parse_from(["emulator-client", "--quiet", "users"]);
        assert_eq!(cli.verbosity().to_log_level(), "error");
    }

    #[test]
    fn debug_collects_breakpoints() {
        let cli = Cli::parse_from([
            "emulator-client",
            "debug",
            "loop",
            "-b",
            "3",
            "--breakpoint",
            "9",
            "--var",
            "x1=2",
        ]);
        match cli.command {
            Commands::Debug(args) => {
                assert_eq!(args.breakpoints, vec![3, 9]);
                assert_eq!(args.run.name, "loop");
                assert_eq!(args.run.vars.len(), 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn breakpoint_list_merges_with_single_flags() {
        let cli = Cli::parse_from([
            "emulator-client",
            "debug",
            "loop",
            "-b",
            "9",
            "--breakpoints",
            "3, 7,9",
        ]);
        match cli.command {
            Commands::Debug(args) => assert_eq!(args.breakpoint_set().list(), vec![3, 7, 9]),
            other => panic!("unexpected command: {other:?}"),
        }
        let parsed =
            Cli::try_parse_from(["emulator-client", "debug", "loop", "--breakpoints", "1,x"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn rerun_accepts_program_fallback() {
        let cli = Cli::parse_from(["emulator-client", "rerun", "4", "--program", "loop"]);
        match cli.command {
            Commands::Rerun(args) => {
                assert_eq!(args.index, 4);
                assert_eq!(args.program.as_deref(), Some("loop"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
