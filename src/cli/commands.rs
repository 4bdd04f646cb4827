use crate::cli::args::{
    CreditsArgs, DebugArgs, DepsArgs, HistoryArgs, RerunArgs, RunArgs, ShowArgs, UploadArgs,
    VarArg, Verbosity, WatchArgs,
};
use crate::cli::output;
use crate::config::ClientConfig;
use crate::dashboard::{CreditLedger, DependencyHighlighter, Refresher};
use crate::debugger::{DebugSession, DebugState};
use crate::protocol::{ExecutionOutcome, ProgramCommands};
use crate::runtime::{
    Advisory, EntityKind, ExecutionOrchestrator, ProgramTarget, RunConfiguration, VariableSet,
};
use crate::service::{EmulatorService, HttpService};
use crate::ClientError;
use anyhow::{anyhow, Context as _, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything a command handler needs: resolved configuration, the service
/// and output preferences.
pub struct Context {
    pub config: ClientConfig,
    pub service: Arc<dyn EmulatorService>,
    pub verbosity: Verbosity,
    pub json: bool,
}

impl Context {
    /// Resolve configuration (file, then environment / flags) and connect
    /// over HTTP.
    pub fn connect(config: ClientConfig, verbosity: Verbosity, json: bool) -> Result<Self> {
        let service = HttpService::new(&config.server, config.user.clone())
            .context("Failed to build HTTP client")?;
        info!(base_url = service.base_url(), "Using emulator service");
        Ok(Self::with_service(config, Arc::new(service), verbosity, json))
    }

    pub fn with_service(
        config: ClientConfig,
        service: Arc<dyn EmulatorService>,
        verbosity: Verbosity,
        json: bool,
    ) -> Self {
        Self {
            config,
            service,
            verbosity,
            json,
        }
    }

    fn user(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.config.user.clone())
            .ok_or_else(|| anyhow!("No user configured; pass --user or set EMULATOR_USER"))
    }

    fn spinner(&self, message: String) -> Option<ProgressBar> {
        if self.json || self.verbosity.is_quiet() {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    }
}

fn target_of(name: &str, function: bool) -> ProgramTarget {
    if function {
        ProgramTarget::function(name)
    } else {
        ProgramTarget::program(name)
    }
}

/// Apply `--var` arguments on top of the seeded required inputs.
pub fn apply_vars(variables: &mut VariableSet, vars: &[VarArg]) -> crate::Result<()> {
    for var in vars {
        let name = match &var.name {
            Some(name) if variables.contains(name) => name.clone(),
            Some(name) => variables.add(Some(name))?,
            None => variables.add(None)?,
        };
        variables.set_value(&name, var.value)?;
    }
    Ok(())
}

async fn prepare(
    orchestrator: &ExecutionOrchestrator,
    args: &RunArgs,
) -> Result<(ProgramTarget, RunConfiguration)> {
    let target = target_of(&args.name, args.function);
    let architecture = orchestrator.cost_model().parse_selector(&args.arch);
    let mut config = orchestrator
        .prepare(&target, args.level, architecture)
        .await
        .with_context(|| format!("Failed to prepare {}", target))?;
    apply_vars(config.variables_mut(), &args.vars)?;
    Ok((target, config))
}

/// Print the advisory an out-of-credits refusal stands for, then pass the
/// error on.
fn warn_refusal(err: ClientError) -> ClientError {
    if let Some(advisory) = Advisory::from_rejection(&err) {
        eprintln!("{} {}", "Warning:".yellow().bold(), advisory);
    }
    err
}

/// Execute a program or function once.
pub async fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let mut orchestrator = ExecutionOrchestrator::new(ctx.service.clone());
    let (target, config) = prepare(&orchestrator, &args).await?;

    let mut ledger = CreditLedger::new();
    orchestrator.reconcile(&mut ledger).await;

    let spinner = ctx.spinner(format!("Executing {}...", target));
    let report = orchestrator
        .execute_and_reconcile(&target, &config, &mut ledger)
        .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = report
        .map_err(warn_refusal)
        .with_context(|| format!("Execution of {} failed", target))?;

    if ctx.json {
        return output::print_json(&json!({
            "report": report,
            "balance": ledger.balance(),
            "balance_is_estimate": ledger.is_stale(),
        }));
    }
    print!("{}", output::render_report(&report));
    println!("{}", output::render_balance(ledger.balance(), ledger.is_stale()));
    Ok(())
}

/// One line of debugger REPL input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Step,
    Back,
    Continue,
    Break(u32),
    /// Remove one breakpoint, or all of them.
    Delete(Option<u32>),
    Breakpoints,
    Vars,
    List,
    Lineage(u32),
    Stop,
    Help,
}

pub fn parse_repl_command(line: &str) -> std::result::Result<ReplCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".into());
    };
    let index = |arg: Option<&str>| -> std::result::Result<u32, String> {
        arg.ok_or_else(|| format!("'{}' needs a command index", head))?
            .parse::<u32>()
            .map_err(|_| format!("'{}' needs a non-negative command index", head))
    };
    let command = match head {
        "s" | "step" => ReplCommand::Step,
        "sb" | "back" => ReplCommand::Back,
        "c" | "continue" => ReplCommand::Continue,
        "b" | "break" => ReplCommand::Break(index(parts.next())?),
        "d" | "delete" => match parts.next() {
            Some(arg) => ReplCommand::Delete(Some(index(Some(arg))?)),
            None => ReplCommand::Delete(None),
        },
        "bl" | "breakpoints" => ReplCommand::Breakpoints,
        "v" | "vars" => ReplCommand::Vars,
        "l" | "list" => ReplCommand::List,
        "ln" | "lineage" => ReplCommand::Lineage(index(parts.next())?),
        "q" | "quit" | "stop" => ReplCommand::Stop,
        "h" | "help" | "?" => ReplCommand::Help,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    if parts.next().is_some() {
        return Err(format!("too many arguments for '{}'", head));
    }
    Ok(command)
}

const REPL_HELP: &str = "\
step (s)             execute one command
back (sb)            undo the last command and refund its cycles
continue (c)         run to the next breakpoint or the end
break (b) N          set a breakpoint at command N
delete (d) [N]       remove the breakpoint at command N, or all of them
breakpoints (bl)     list breakpoints
vars (v)             show variables at the current position
list (l)             show the instruction listing
lineage (ln) N       show the commands command N was expanded from
stop (q)             end the session";

/// Instruction listing of the program being debugged.
struct Listing {
    service: Arc<dyn EmulatorService>,
    expansion_level: u32,
    commands: ProgramCommands,
}

impl Listing {
    /// Best effort: a failed load leaves the listing empty.
    async fn load(service: Arc<dyn EmulatorService>, expansion_level: u32) -> Self {
        let commands = match service.program_commands(expansion_level).await {
            Ok(commands) => commands,
            Err(e) => {
                warn!("Failed to load instruction listing: {}", e);
                ProgramCommands::default()
            }
        };
        Self {
            service,
            expansion_level,
            commands,
        }
    }

    fn show(&self, state: DebugState, outcome: &ExecutionOutcome) {
        let instruction = self.commands.at(outcome.debug_index);
        print!(
            "{}",
            output::render_debug_outcome(state, outcome, instruction)
        );
    }
}

async fn dispatch(
    session: &mut DebugSession,
    ledger: &mut CreditLedger,
    listing: &Listing,
    command: ReplCommand,
) -> crate::Result<()> {
    match command {
        ReplCommand::Step => {
            let outcome = session.step(ledger).await?;
            listing.show(session.state(), &outcome);
        }
        ReplCommand::Back => {
            let outcome = session.step_back(ledger).await?;
            listing.show(session.state(), &outcome);
        }
        ReplCommand::Continue => {
            let outcome = session.resume(ledger).await?;
            listing.show(session.state(), &outcome);
        }
        ReplCommand::Break(index) => {
            session.add_breakpoint(index).await?;
            println!("Breakpoint set at command {}", index);
        }
        ReplCommand::Delete(Some(index)) => {
            session.remove_breakpoint(index).await?;
            println!("Breakpoint at command {} removed", index);
        }
        ReplCommand::Delete(None) => {
            session.clear_breakpoints().await?;
            println!("All breakpoints removed");
        }
        ReplCommand::Breakpoints => {
            if session.breakpoints().is_empty() {
                println!("No breakpoints");
            } else {
                println!("Breakpoints: {}", session.breakpoints().list().iter().join(", "));
            }
        }
        ReplCommand::Vars => match session.last_outcome() {
            Some(outcome) => listing.show(session.state(), outcome),
            None => println!("No active session"),
        },
        ReplCommand::List => {
            let summary = listing
                .service
                .program_summary(listing.expansion_level)
                .await?;
            let current = session.last_outcome().map(|o| o.debug_index);
            print!(
                "{}",
                output::render_listing(&listing.commands, &summary, current, session.breakpoints())
            );
        }
        ReplCommand::Lineage(index) => {
            let lines = listing
                .service
                .command_history(listing.expansion_level, index)
                .await?;
            print!("{}", output::render_lineage(index, &lines));
        }
        ReplCommand::Help => println!("{}", REPL_HELP),
        ReplCommand::Stop => {}
    }
    if let Some(advisory) = session.advisory() {
        println!("{} {}", "Warning:".yellow().bold(), advisory);
    }
    Ok(())
}

/// Interactive debug session.
pub async fn debug(ctx: &Context, args: DebugArgs) -> Result<()> {
    let orchestrator = ExecutionOrchestrator::new(ctx.service.clone());
    let (target, config) = prepare(&orchestrator, &args.run).await?;

    let mut ledger = CreditLedger::new();
    orchestrator.reconcile(&mut ledger).await;

    let mut session = DebugSession::new(ctx.service.clone());
    for index in args.breakpoint_set().list() {
        session.add_breakpoint(index).await?;
    }
    let outcome = session
        .start(&target, &config, &mut ledger)
        .await
        .with_context(|| format!("Failed to start debugging {}", target))?;
    let listing = Listing::load(ctx.service.clone(), config.expansion_level()).await;
    println!("Debugging {} (type 'help' for commands)", target.to_string().bold());
    listing.show(session.state(), &outcome);

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = tokio::task::block_in_place(|| editor.readline("(debug) "));
        let line = match line {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line.as_str());

        match parse_repl_command(&line) {
            Ok(ReplCommand::Stop) => break,
            Ok(command) => {
                if let Err(e) = dispatch(&mut session, &mut ledger, &listing, command).await {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
            }
            Err(message) => eprintln!("{} {}", "Error:".red().bold(), message),
        }
    }

    if session.state() != DebugState::Idle {
        match session.stop().await {
            Ok(cost) => println!("Session stopped, total cost {}", cost),
            Err(e) => {
                warn!("Failed to stop session cleanly: {}", e);
                session.abandon();
            }
        }
    }
    orchestrator.reconcile(&mut ledger).await;
    println!("{}", output::render_balance(ledger.balance(), ledger.is_stale()));
    Ok(())
}

/// List a user's past runs.
pub async fn history(ctx: &Context, args: HistoryArgs) -> Result<()> {
    let user = ctx.user(args.of.as_deref())?;
    let runs = ctx
        .service
        .user_statistics(&user)
        .await
        .with_context(|| format!("Failed to load history of {}", user))?;
    if ctx.json {
        return output::print_json(&runs);
    }
    print!("{}", output::render_runs(&runs));
    Ok(())
}

/// Re-execute a past run with its recorded architecture, level and inputs.
pub async fn rerun(ctx: &Context, args: RerunArgs) -> Result<()> {
    let user = ctx.user(args.of.as_deref())?;
    let runs = ctx.service.user_statistics(&user).await?;
    let run = runs
        .iter()
        .find(|r| r.index == args.index)
        .ok_or_else(|| anyhow!("{} has no run with index {}", user, args.index))?;

    let mut orchestrator = ExecutionOrchestrator::new(ctx.service.clone());
    let mut ledger = CreditLedger::new();
    orchestrator.reconcile(&mut ledger).await;

    let spinner = ctx.spinner(format!("Re-running run #{}...", run.index));
    let report = orchestrator
        .rerun(run, args.program.as_deref(), &mut ledger)
        .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = report.map_err(warn_refusal)?;

    if ctx.json {
        return output::print_json(&json!({
            "report": report,
            "balance": ledger.balance(),
            "balance_is_estimate": ledger.is_stale(),
        }));
    }
    print!("{}", output::render_report(&report));
    println!("{}", output::render_balance(ledger.balance(), ledger.is_stale()));
    Ok(())
}

/// Upload a program definition file.
pub async fn upload(ctx: &Context, args: UploadArgs) -> Result<()> {
    let contents = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program.xml".to_string());

    let spinner = ctx.spinner(format!("Uploading {}...", file_name));
    let reply = ctx.service.upload_program(&file_name, contents).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let reply = reply.with_context(|| format!("Upload of {} failed", file_name))?;
    info!(file = %file_name, "Program uploaded");

    if ctx.json {
        return output::print_json(&json!({ "file": file_name, "message": reply }));
    }
    println!("{}", reply);
    Ok(())
}

/// Print the expanded instruction listing of a program, or the lineage of
/// one of its commands.
pub async fn show(ctx: &Context, args: ShowArgs) -> Result<()> {
    let target = target_of(&args.name, args.function);
    ctx.service
        .bind_active_program(&target.name)
        .await
        .map_err(|e| e.into_binding_failure(&target.name))?;
    let max_level = ctx.service.max_expansion_level().await?;
    if args.level > max_level {
        return Err(ClientError::ExpansionLevelOutOfRange {
            level: args.level,
            max: max_level,
        }
        .into());
    }

    if let Some(index) = args.lineage {
        let lines = ctx.service.command_history(args.level, index).await?;
        if ctx.json {
            return output::print_json(&json!({ "index": index, "lineage": lines }));
        }
        print!("{}", output::render_lineage(index, &lines));
        return Ok(());
    }

    let commands = ctx.service.program_commands(args.level).await?;
    let summary = ctx.service.program_summary(args.level).await?;
    if ctx.json {
        return output::print_json(&json!({
            "name": target.name,
            "expansion_level": args.level,
            "commands": commands,
            "summary": summary,
        }));
    }
    println!("{} at level {}", target.to_string().bold(), args.level);
    print!(
        "{}",
        output::render_listing(&commands, &summary, None, &Default::default())
    );
    Ok(())
}

pub async fn users(ctx: &Context) -> Result<()> {
    let users = ctx.service.list_users().await?;
    if ctx.json {
        return output::print_json(&users);
    }
    print!("{}", output::render_users(&users));
    Ok(())
}

pub async fn programs(ctx: &Context) -> Result<()> {
    let programs = ctx.service.list_programs().await?;
    if ctx.json {
        return output::print_json(&programs);
    }
    print!("{}", output::render_catalogue(&programs, &Default::default()));
    Ok(())
}

pub async fn functions(ctx: &Context) -> Result<()> {
    let functions = ctx.service.list_functions().await?;
    if ctx.json {
        return output::print_json(&functions);
    }
    print!("{}", output::render_catalogue(&functions, &Default::default()));
    Ok(())
}

/// Show the balance, optionally charging credits first.
pub async fn credits(ctx: &Context, args: CreditsArgs) -> Result<()> {
    let mut ledger = CreditLedger::new();
    if let Some(amount) = args.add {
        if amount <= 0 {
            return Err(anyhow!("--add must be a positive amount"));
        }
        ctx.service
            .add_credits(amount)
            .await
            .context("Failed to add credits")?;
        ledger.apply_optimistic(amount);
    }
    ledger
        .refresh(ctx.service.as_ref())
        .await
        .context("Failed to load credit balance")?;

    if ctx.json {
        return output::print_json(&json!({ "balance": ledger.balance() }));
    }
    println!("{}", output::render_balance(ledger.balance(), ledger.is_stale()));
    Ok(())
}

pub async fn deps(ctx: &Context, args: DepsArgs) -> Result<()> {
    let kind = if args.function {
        EntityKind::Function
    } else {
        EntityKind::Program
    };
    let mut highlighter = DependencyHighlighter::new(ctx.service.clone());
    let chain = highlighter
        .highlight(&args.name, kind)
        .await
        .with_context(|| format!("Failed to load dependencies of {}", args.name))?
        .clone();

    if ctx.json {
        return output::print_json(&json!({
            "name": args.name,
            "dependencies": chain,
            "used_by": highlighter.using_programs(),
        }));
    }
    print!(
        "{}",
        output::render_dependencies(&args.name, &chain, highlighter.using_programs())
    );
    Ok(())
}

/// Keep reloading the listings until interrupted or `--ticks` refreshes
/// have been shown.
pub async fn watch(ctx: &Context, args: WatchArgs) -> Result<()> {
    let refresher = Arc::new(Refresher::new(ctx.service.clone()));
    let mut updates = refresher.subscribe();
    let handle = refresher.clone().spawn(ctx.config.refresh.interval());

    let mut shown = 0u32;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    if ctx.json {
                        output::print_json(snapshot.as_ref())?;
                    } else {
                        println!("{}", output::render_snapshot_summary(&snapshot));
                    }
                    shown += 1;
                }
                if args.ticks.is_some_and(|limit| shown >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    handle.stop().await;
    Ok(())
}
