//! Regression Explorer CLI Module
//!
//! Command-line interface for feature selection, model search and
//! strategy comparison.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::search::{comparison_to_dataframe, ModelSearchEngine, SearchConfig, SearchResult};
use crate::selection::{FeatureSelectionEngine, ReductionMethod};
use crate::strategy::RegressionStrategy;
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "regression-explorer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Exploratory regression modeling: feature reduction and model search")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the regression strategies
    Models,

    /// Reduce the feature columns of a table
    Select {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Columns carried through untouched (repeatable)
        #[arg(long)]
        hidden: Vec<String>,

        /// Reduction method: variance, correlation or boruta (repeatable)
        #[arg(short, long = "method")]
        methods: Vec<String>,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Tune and evaluate one strategy
    Search {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Strategy name (see `models`)
        #[arg(short, long)]
        model: String,

        /// Columns left out of modeling (repeatable)
        #[arg(long)]
        hidden: Vec<String>,

        /// Estimate performance by nested cross-validation
        #[arg(long)]
        nested: bool,

        /// Reduce features on the training split before searching
        #[arg(long)]
        preprocess: bool,

        /// JSON search configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output JSON file for the search result
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare several strategies on one table
    Compare {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Strategy names (repeatable; default: all)
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Columns left out of modeling (repeatable)
        #[arg(long)]
        hidden: Vec<String>,

        /// Estimate performance by nested cross-validation
        #[arg(long)]
        nested: bool,

        /// Reduce features on the training split before searching
        #[arg(long)]
        preprocess: bool,

        /// JSON search configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output CSV file for the comparison table
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn search_config(path: Option<&Path>, nested: bool, preprocess: bool) -> anyhow::Result<SearchConfig> {
    let mut config = match path {
        Some(path) => SearchConfig::from_json_file(path)?,
        None => SearchConfig::default(),
    };
    config.nested |= nested;
    config.preprocessing |= preprocess;
    config.validate()?;
    Ok(config)
}

fn load_table(path: &Path) -> anyhow::Result<polars::prelude::DataFrame> {
    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_models() -> anyhow::Result<()> {
    section("Strategies");

    println!("  {:<8} {:<26} {:>7} {:>10}", muted("Name"), muted("Id"), muted("Scaled"), muted("Grid"));
    println!("  {}", dim(&"─".repeat(54)));

    for strategy in RegressionStrategy::all() {
        let scaled = if strategy.requires_scaling() { ok("yes") } else { dim("no") };
        println!(
            "  {:<8} {:<26} {:>7} {:>10}",
            strategy.name().white().bold(),
            strategy.long_name(),
            scaled,
            strategy.param_grid().n_candidates()
        );
        println!("  {:<8} {}", "", muted(strategy.description()));
    }

    println!();
    Ok(())
}

pub fn cmd_select(
    data_path: &Path,
    target: &str,
    hidden: &[String],
    methods: &[String],
    output_path: &Path,
) -> anyhow::Result<()> {
    section("Select");

    let methods = methods
        .iter()
        .map(|m| ReductionMethod::from_label(m))
        .collect::<crate::Result<Vec<_>>>()?;
    let df = load_table(data_path)?;

    let engine = FeatureSelectionEngine::new(&methods);
    step_run("Reducing features");
    let start = Instant::now();
    let mut outcome = engine.select(&df, target, hidden)?;
    step_done(&format!("{:?}", start.elapsed()));

    if outcome.dropped_rows > 0 {
        step_ok(&format!("dropped {} incomplete rows", outcome.dropped_rows));
    }
    for step in &outcome.steps {
        step_ok(&format!("{}: removed {}", step.method.label(), step.removed.len()));
        for name in &step.removed {
            println!("      {}", dim(name));
        }
    }

    step_run(&format!("Saving → {}", output_path.display()));
    DataSaver::save_csv(&mut outcome.frame, output_path)?;
    step_done(&format!("{} rows × {} cols", outcome.frame.height(), outcome.frame.width()));

    println!();
    println!("  {:<16} {}", muted("Features kept"), outcome.features.len().to_string().white().bold());
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_search(
    data_path: &Path,
    target: &str,
    model: &str,
    hidden: &[String],
    nested: bool,
    preprocess: bool,
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Search");

    let strategy = RegressionStrategy::from_name(model)?;
    let config = search_config(config_path, nested, preprocess)?;
    let df = load_table(data_path)?;

    step_run("Preparing splits");
    let engine = ModelSearchEngine::with_excluded(&df, target, hidden, strategy, config)?;
    step_done(&format!("{} train / {} test", engine.n_train(), engine.n_test()));
    for step in engine.reduction_steps() {
        step_ok(&format!("{}: removed {}", step.method.label(), step.removed.len()));
    }

    let mode = if engine.config().nested { "Nested cross-validation" } else { "Grid search" };
    step_run(&format!("{} for {}", mode, strategy.name().cyan()));
    let start = Instant::now();
    let result = engine.run()?;
    step_done(&format!("{:?}", start.elapsed()));

    print_result(&result);

    if let Some(path) = output {
        std::fs::write(path, result.to_json()?)?;
        step_ok(&format!("result written to {}", path.display()));
        println!();
    }
    Ok(())
}

fn print_result(result: &SearchResult) {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", result.strategy.white().bold()));
    let mode = if result.is_nested() { "nested cross-validation" } else { "hold-out evaluation" };
    line_box_center(&format!("{}", dim(mode)));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&format!("{:<10}{:>14}{:>14}", "", muted("train"), muted("test")));
    line_box(&format!("{:<10}{:>14.4}{:>14.4}", muted("R²"), result.train_r2, result.test_r2));
    line_box(&format!("{:<10}{:>14.4}{:>14.4}", muted("MAE"), result.train_mae, result.test_mae));
    line_box(&format!("{:<10}{:>14.4}{:>14.4}", muted("RMSE"), result.train_rmse, result.test_rmse));
    line_box_empty();

    if let Some(params) = result.best_params.as_ref().filter(|p| !p.is_empty()) {
        line_box_sep();
        line_box_empty();
        for (name, value) in params {
            line_box(&kv(&format!("{:<20}", name), &value.to_string()));
        }
        line_box_empty();
    }
    line_box_bottom();
    println!();
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_compare(
    data_path: &Path,
    target: &str,
    models: &[String],
    hidden: &[String],
    nested: bool,
    preprocess: bool,
    config_path: Option<&Path>,
    output_path: &Path,
) -> anyhow::Result<()> {
    section("Compare");

    let strategies = if models.is_empty() {
        RegressionStrategy::all().to_vec()
    } else {
        models
            .iter()
            .map(|m| RegressionStrategy::from_name(m))
            .collect::<crate::Result<Vec<_>>>()?
    };
    let config = search_config(config_path, nested, preprocess)?;
    let df = load_table(data_path)?;

    let engine = ModelSearchEngine::for_comparison(&df, target, hidden, config)?;

    println!();
    println!("  {:<8} {:>10} {:>10} {:>10}", muted("Model"), muted("train R²"), muted("test R²"), muted("Time"));
    println!("  {}", dim(&"─".repeat(42)));

    let rows = engine.compare(&strategies)?;
    for row in &rows {
        println!("  {:<8} {:>10.4} {:>10.4} {:>9.2}s", row.model, row.train_r2, row.test_r2, row.seconds);
    }
    println!("  {}", dim(&"─".repeat(42)));

    if let Some(best) = rows
        .iter()
        .filter(|r| !r.test_r2.is_nan())
        .max_by(|a, b| a.test_r2.total_cmp(&b.test_r2))
    {
        println!();
        println!("  {} {} {} {:.4}", ok("best"), best.model.white().bold(), muted("test R²:"), best.test_r2);
    }

    let mut table = comparison_to_dataframe(&rows)?;
    DataSaver::save_csv(&mut table, output_path)?;
    println!();
    step_ok(&format!("comparison written to {}", output_path.display()));
    println!();
    Ok(())
}

pub fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("regression-explorer models", "List strategies and grids"),
        ("regression-explorer select -d f.csv -t y -m variance -o out.csv", "Reduce features"),
        ("regression-explorer search -d f.csv -t y -m Ridge", "Tune one strategy"),
        ("regression-explorer compare -d f.csv -t y -o cmp.csv", "Compare strategies"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<64} {}", cmd.white(), muted(desc));
    }
    println!();
}
