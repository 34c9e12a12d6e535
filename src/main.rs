use analytics::{
    AnalysisRequest, AnalysisResult, AnalyticsEngine, AssetGroupRegistry, BUILT_IN_GROUPS,
    Direction, InsufficientData, MoveTarget, Outcome, PriceTarget, WindowSelector,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use configuration::{CorrelationKind, ReferenceDefinition};
use core_types::PriceSeries;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The main entry point for the MarketLens analysis tool.
fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => handle_analyze(args),
        Commands::Groups(args) => handle_groups(args),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Structural and risk analytics for cleaned OHLCV price histories.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse one price history over a trailing window of rows.
    Analyze(AnalyzeArgs),
    /// List the configured reference groups.
    Groups(GroupsArgs),
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// Path to a JSON price file (`{"symbol": ..., "bars": [...]}`).
    #[arg(long)]
    series: PathBuf,

    /// Window to analyse: Latest, 3P, 6P, 12P, 24P, 60P or Full.
    #[arg(long, default_value = "12P")]
    window: WindowSelector,

    /// Longer window the volatility ratio compares against.
    #[arg(long)]
    reference_window: Option<WindowSelector>,

    /// Reference group to correlate against. May be repeated.
    #[arg(long = "group")]
    groups: Vec<String>,

    /// Overrides the configured correlation method.
    #[arg(long, value_enum)]
    correlation: Option<CorrelationKind>,

    /// Price target for the probability-of-hit estimate.
    #[arg(long)]
    target: Option<f64>,

    /// Rows ahead the price target may be reached in.
    #[arg(long, default_value_t = 20)]
    horizon: usize,

    /// Size of a move, in percent, to count in the window's past returns.
    #[arg(long)]
    move_pct: Option<f64>,

    /// Count downward moves instead of upward ones.
    #[arg(long, requires = "move_pct")]
    down: bool,

    /// Fixes the Monte Carlo random source.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Print the full result as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct GroupsArgs {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = configuration::load_config_from(&args.config)?;

    let mut params = config.analysis.clone();
    if let Some(reference) = args.reference_window {
        params.dynamics.reference_window = reference;
    }
    if let Some(kind) = args.correlation {
        params.correlation.kind = kind;
    }
    if args.seed.is_some() {
        params.simulation.seed = args.seed;
    }
    let engine = AnalyticsEngine::new(params)?;

    let series = load_series(&args.series)?;
    // Only the requested groups are read from disk.
    let definitions: Vec<_> = config
        .groups
        .iter()
        .filter(|g| args.groups.contains(&g.label))
        .cloned()
        .collect();
    let registry = AssetGroupRegistry::from_definitions(&definitions, load_reference)?;

    let mut request = AnalysisRequest::new(&series, args.window);
    request.groups = args.groups;
    request.target = args.target.map(|price| PriceTarget {
        price,
        horizon: args.horizon,
    });
    request.move_target = args.move_pct.map(|percent| MoveTarget {
        percent,
        direction: if args.down { Direction::Down } else { Direction::Up },
    });

    let result = engine.analyze(&request, &registry)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn handle_groups(args: GroupsArgs) -> Result<()> {
    let config = configuration::load_config_from(&args.config)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Group", "Members", "Source"]);

    for label in BUILT_IN_GROUPS {
        let members = config
            .groups
            .iter()
            .find(|g| g.label == label)
            .map_or(0, |g| g.members.len());
        table.add_row(vec![label.to_string(), members.to_string(), "built-in".to_string()]);
    }
    for group in config
        .groups
        .iter()
        .filter(|g| !BUILT_IN_GROUPS.contains(&g.label.as_str()))
    {
        table.add_row(vec![
            group.label.clone(),
            group.members.len().to_string(),
            "custom".to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn load_series(path: &Path) -> Result<PriceSeries> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let series: PriceSeries = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse price series from {}", path.display()))?;
    tracing::info!(symbol = series.symbol(), rows = series.len(), "Price series loaded.");
    Ok(series)
}

fn load_reference(reference: &ReferenceDefinition) -> Result<PriceSeries> {
    load_series(&reference.path)
}

// ==============================================================================
// Presentation
// ==============================================================================

fn show<T>(outcome: &Outcome<T>, format: impl Fn(&T) -> String) -> String {
    match outcome {
        Ok(value) => format(value),
        Err(_) => InsufficientData::LABEL.to_string(),
    }
}

fn number(value: &f64) -> String {
    format!("{value:.4}")
}

fn percent(value: &f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn print_result(result: &AnalysisResult) {
    let window = &result.window;
    println!(
        "{} | window {} | {} rows{}",
        result.symbol,
        window.selector,
        window.rows,
        if window.truncated { " (truncated)" } else { "" }
    );

    let d = &result.descriptive;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Metric", "Value"]);
    let rows = [
        ("Observations", d.count.to_string()),
        ("Mean return", show(&d.mean, percent)),
        ("Median return", show(&d.median, percent)),
        ("Mode", show(&d.mode, percent)),
        ("Std deviation", show(&d.std_dev, percent)),
        ("Variance", show(&d.variance, number)),
        ("Skewness", show(&d.skewness, number)),
        ("Excess kurtosis", show(&d.kurtosis, number)),
        ("Min / Max", show(&d.min, percent) + " / " + &show(&d.max, percent)),
        ("Sharpe", show(&result.risk.sharpe, number)),
        ("Sortino", show(&result.risk.sortino, number)),
        ("ROI", show(&result.performance.return_on_investment, percent)),
        ("Annualised return", show(&result.performance.annualised_return, percent)),
        ("Max drawdown", show(&result.performance.max_drawdown, percent)),
        (
            "Vol-adjusted return",
            show(&result.performance.volatility_adjusted_return, number),
        ),
        ("Range ratio (short)", show(&result.dynamics.volatility_ratio.short, percent)),
        ("Range ratio (long)", show(&result.dynamics.volatility_ratio.long, percent)),
        (
            "Volatility regime",
            show(&result.dynamics.volatility_ratio.regime, |r| format!("{r:?}")),
        ),
        (
            "ATR",
            show(&result.dynamics.atr, |a| {
                format!(
                    "{:.4} ({:.2}% of price, {:?}){}",
                    a.value,
                    a.percent_of_price,
                    a.rating,
                    if a.partial { " partial" } else { "" }
                )
            }),
        ),
        (
            "Return volatility",
            show(&result.dynamics.return_volatility, |v| {
                format!("{:.2}% ({:?})", v.percent, v.rating)
            }),
        ),
        (
            "Volume vs ATR",
            show(&result.dynamics.volume_atr_correlation, |c| {
                format!("{:.3} ({})", c.coefficient, c.strength.describe())
            }),
        ),
        (
            "Monte Carlo mean [p10, p90]",
            show(&result.simulation, |s| {
                format!("{:.2} [{:.2}, {:.2}]", s.mean, s.p10, s.p90)
            }),
        ),
    ];
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }
    if let Some(target) = &result.target {
        let value = show(target, |t| {
            format!(
                "{:.1}% ({:?} to {:.2} within {} rows)",
                t.probability * 100.0,
                t.direction,
                t.target,
                t.horizon
            )
        });
        table.add_row(vec!["Target probability".to_string(), value]);
    }
    if let Some(hits) = &result.historical_target {
        let value = show(hits, |h| {
            let one_in = h.one_in.map_or_else(|| "never".to_string(), |n| format!("1 in {n}"));
            format!(
                "{:.1}% ({} of {} {:?} moves of {}%, {one_in})",
                h.probability * 100.0,
                h.occurrences,
                h.observations,
                h.direction,
                h.threshold_pct
            )
        });
        table.add_row(vec!["Historical move frequency".to_string(), value]);
    }
    println!("{table}");

    for group in &result.correlations {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![
            format!("{} ({})", group.group, group.kind),
            "Return r".to_string(),
            "p-value".to_string(),
            "Strength".to_string(),
            "Volatility r".to_string(),
        ]);
        for (member, returns) in &group.returns {
            let volatility = group
                .volatility
                .get(member)
                .map_or_else(|| InsufficientData::LABEL.to_string(), |v| {
                    show(v, |c| format!("{:.3}", c.coefficient))
                });
            table.add_row(vec![
                member.clone(),
                show(returns, |c| format!("{:.3}", c.coefficient)),
                show(returns, |c| format!("{:.4}", c.p_value)),
                show(returns, |c| c.strength.describe().to_string()),
                volatility,
            ]);
        }
        println!("{table}");
    }
}
