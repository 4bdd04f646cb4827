//! Human-readable rendering for command results.
//!
//! Every renderer returns a `String` so the layout can be checked without a
//! terminal; `--json` bypasses this module and serializes the values as-is.

use crate::dashboard::{DashboardSnapshot, DependencySet};
use crate::debugger::{BreakpointSet, DebugState};
use crate::protocol::{
    ExecutionOutcome, HistoricalRun, ProgramCommands, ProgramInfo, ProgramSummary, RunType,
    UserInfo,
};
use crate::runtime::{Architecture, ExecutionReport};
use colored::Colorize;
use itertools::Itertools;
use serde::Serialize;
use std::fmt::Write;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn bindings_line(outcome: &ExecutionOutcome) -> String {
    if outcome.bindings.is_empty() {
        return "(none)".dimmed().to_string();
    }
    outcome
        .bindings
        .iter()
        .map(|b| format!("{} = {}", b.name.cyan(), b.value))
        .join(", ")
}

pub fn render_report(report: &ExecutionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} (level {}, architecture {})",
        "Executed".green().bold(),
        report.target,
        report.expansion_level,
        report.architecture
    );
    let _ = writeln!(out, "  Result:    {}", report.outcome.result.to_string().bold());
    let _ = writeln!(
        out,
        "  Cycles:    {} (charged {})",
        report.outcome.cycles, report.charged
    );
    let _ = writeln!(out, "  Input:     [{}]", report.input.iter().join(", "));
    let _ = writeln!(out, "  Variables: {}", bindings_line(&report.outcome));
    if let Some(advisory) = report.advisory {
        let _ = writeln!(out, "{} {}", "Warning:".yellow().bold(), advisory);
    }
    out
}

/// `instruction` is the listing line at the outcome's debug index, when known.
pub fn render_debug_outcome(
    state: DebugState,
    outcome: &ExecutionOutcome,
    instruction: Option<&str>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] command {}  cycles {}  session cycles {}",
        state.to_string().cyan(),
        outcome.debug_index,
        outcome.cycles,
        outcome.session_cycles
    );
    let _ = writeln!(out, "  Variables: {}", bindings_line(outcome));
    if let Some(instruction) = instruction.filter(|_| state != DebugState::Finished) {
        let _ = writeln!(out, "  Next:      {}", instruction.yellow());
    }
    if state == DebugState::Finished {
        let _ = writeln!(
            out,
            "  {} result {}",
            "Program finished:".green().bold(),
            outcome.result
        );
    }
    out
}

pub fn render_balance(balance: i64, stale: bool) -> String {
    if stale {
        format!("Credits: {} {}", balance, "(estimate)".dimmed())
    } else {
        format!("Credits: {}", balance.to_string().bold())
    }
}

pub fn render_runs(runs: &[HistoricalRun]) -> String {
    if runs.is_empty() {
        return "No runs recorded.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        format!(
            "{:>5}  {:<24} {:<8} {:>5}  {:<4} {:>10} {:>12}  {}",
            "#", "NAME", "TYPE", "LEVEL", "ARCH", "CYCLES", "RESULT", "INPUT"
        )
        .bold()
    );
    for run in runs {
        let kind = match run.run_type {
            RunType::Program => "program",
            RunType::HelperFunction => "function",
        };
        let _ = writeln!(
            out,
            "{:>5}  {:<24} {:<8} {:>5}  {:<4} {:>10} {:>12}  [{}]",
            run.index,
            run.program_name,
            kind,
            run.expansion_level,
            run.architecture,
            run.cycles_count,
            run.result,
            run.input.iter().join(", ")
        );
    }
    out
}

pub fn render_users(users: &[UserInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        format!(
            "{:<20} {:>8} {:>9} {:>10} {:>12} {:>6}",
            "USER", "PROGRAMS", "FUNCTIONS", "CREDITS", "CREDITS USED", "RUNS"
        )
        .bold()
    );
    for user in users {
        let _ = writeln!(
            out,
            "{:<20} {:>8} {:>9} {:>10} {:>12} {:>6}",
            user.name,
            user.program_uploaded_count,
            user.function_uploaded_count,
            user.credits,
            user.credits_used,
            user.run_count
        );
    }
    out
}

pub fn render_catalogue(entries: &[ProgramInfo], highlighted: &DependencySet) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        format!(
            "{:<24} {:<16} {:>8} {:>9} {:>5} {:>12}",
            "NAME", "OWNER", "COMMANDS", "MAX LEVEL", "RUNS", "AVG COST"
        )
        .bold()
    );
    for entry in entries {
        let line = format!(
            "{:<24} {:<16} {:>8} {:>9} {:>5} {:>12.2}",
            entry.name,
            entry.owner,
            entry.commands_count,
            entry.max_level,
            entry.ran_count,
            entry.average_cost
        );
        if highlighted.contains(&entry.name) {
            let _ = writeln!(out, "{}", line.yellow());
        } else {
            let _ = writeln!(out, "{}", line);
        }
    }
    out
}

pub fn render_dependencies(
    name: &str,
    chain: &DependencySet,
    using_programs: &DependencySet,
) -> String {
    let mut out = String::new();
    if chain.is_empty() {
        let _ = writeln!(out, "{} has no dependencies", name.bold());
    } else {
        let _ = writeln!(out, "{} depends on:", name.bold());
        for dep in chain {
            let _ = writeln!(out, "  {}", dep.yellow());
        }
    }
    if !using_programs.is_empty() {
        let _ = writeln!(
            out,
            "Used by: {}",
            using_programs.iter().map(|p| p.yellow()).join(", ")
        );
    }
    out
}

/// Numbered instruction listing. `>` marks `current`, `*` a breakpoint.
pub fn render_listing(
    commands: &ProgramCommands,
    summary: &ProgramSummary,
    current: Option<i64>,
    breakpoints: &BreakpointSet,
) -> String {
    let mut out = String::new();
    if commands.is_empty() {
        let _ = writeln!(out, "No instructions.");
    }
    for (index, command) in commands.commands.iter().enumerate() {
        let is_current = current.and_then(|c| usize::try_from(c).ok()) == Some(index);
        let has_breakpoint = u32::try_from(index).is_ok_and(|i| breakpoints.contains(i));
        let marker = match (is_current, has_breakpoint) {
            (true, _) => ">",
            (false, true) => "*",
            (false, false) => " ",
        };
        let line = format!("{} {:>4}  {}", marker, index, command);
        if is_current {
            let _ = writeln!(out, "{}", line.yellow().bold());
        } else {
            let _ = writeln!(out, "{}", line);
        }
    }
    let _ = writeln!(
        out,
        "{} {}",
        "Per tier:".bold(),
        Architecture::ALL
            .iter()
            .map(|a| format!("{} {}", a, summary.count(*a)))
            .join(", ")
    );
    out
}

pub fn render_lineage(index: u32, lines: &[String]) -> String {
    if lines.is_empty() {
        return format!("Command {} is not expanded from another command\n", index);
    }
    let mut out = String::new();
    let _ = writeln!(out, "Command {} expands from:", index);
    for (depth, line) in lines.iter().enumerate() {
        let _ = writeln!(out, "{}{}", "  ".repeat(depth + 1), line);
    }
    out
}

pub fn render_snapshot_summary(snapshot: &DashboardSnapshot) -> String {
    format!(
        "[{}] {} users, {} programs, {} functions",
        snapshot.fetched_at.format("%H:%M:%S"),
        snapshot.users.len(),
        snapshot.programs.len(),
        snapshot.functions.len()
    )
}
