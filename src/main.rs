use anyhow::Result;
use clap::Parser;
use emulator_client::cli::commands::{self, Context};
use emulator_client::cli::{Cli, Commands, LogFormat};
use emulator_client::config::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    // Logs go to stderr so `--json` output stays parseable.
    let fmt_layer = match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| verbosity.to_log_level().into()),
        )
        .with(fmt_layer)
        .init();

    let config = ClientConfig::load(cli.config.as_deref())?
        .with_overrides(cli.base_url.clone(), cli.user.clone());
    let ctx = Context::connect(config, verbosity, cli.json)?;

    match cli.command {
        Commands::Run(args) => commands::run(&ctx, args).await?,
        Commands::Debug(args) => commands::debug(&ctx, args).await?,
        Commands::History(args) => commands::history(&ctx, args).await?,
        Commands::Rerun(args) => commands::rerun(&ctx, args).await?,
        Commands::Upload(args) => commands::upload(&ctx, args).await?,
        Commands::Show(args) => commands::show(&ctx, args).await?,
        Commands::Users => commands::users(&ctx).await?,
        Commands::Programs => commands::programs(&ctx).await?,
        Commands::Functions => commands::functions(&ctx).await?,
        Commands::Credits(args) => commands::credits(&ctx, args).await?,
        Commands::Deps(args) => commands::deps(&ctx, args).await?,
        Commands::Watch(args) => commands::watch(&ctx, args).await?,
    }

    Ok(())
}
