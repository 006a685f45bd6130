//! Regression Explorer - Main Entry Point

use clap::Parser;
use regression_explorer::cli::{
    cmd_compare, cmd_models, cmd_search, cmd_select, show_help, Cli, Commands,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regression_explorer=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Models) => {
            cmd_models()?;
        }
        Some(Commands::Select { data, target, hidden, methods, output }) => {
            cmd_select(&data, &target, &hidden, &methods, &output)?;
        }
        Some(Commands::Search { data, target, model, hidden, nested, preprocess, config, output }) => {
            cmd_search(
                &data,
                &target,
                &model,
                &hidden,
                nested,
                preprocess,
                config.as_deref(),
                output.as_deref(),
            )?;
        }
        Some(Commands::Compare { data, target, models, hidden, nested, preprocess, config, output }) => {
            cmd_compare(
                &data,
                &target,
                &models,
                &hidden,
                nested,
                preprocess,
                config.as_deref(),
                &output,
            )?;
        }
        None => show_help(),
    }

    Ok(())
}
