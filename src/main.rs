//! Hockey xGD CLI
//!
//! Builds shot features from a season file and selects a regressor for the
//! rolling expected-goal differential.

use clap::{Parser, Subcommand};
use hockey::{Config, Result};

#[derive(Parser)]
#[command(name = "hockey")]
#[command(about = "Shot features and model selection for rolling expected-goal differential", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Build the feature frame and show category distributions
    Features {
        /// Shot file to read instead of the configured one
        #[arg(long)]
        input: Option<String>,
        /// Write the enriched table as CSV
        #[arg(long)]
        output: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Cross-validate the candidate regressors and report the best
    Select {
        /// Shot file to read instead of the configured one
        #[arg(long)]
        input: Option<String>,
        /// Override number of cross-validation folds
        #[arg(long)]
        folds: Option<usize>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Features {
            input,
            output,
            format,
        } => commands::features(&config, input, output, format),
        Commands::Select {
            input,
            folds,
            format,
        } => commands::select(&config, input, folds, format),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use hockey::data::EventTable;
    use hockey::features::{build_feature_frame, FeatureFrame, FeatureSummary};
    use hockey::training::{select_model, CandidateOutcome, FeatureSet, SelectionReport};
    use hockey::HockeyError;
    use std::collections::BTreeMap;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data/raw")?;
        println!("Created data/raw/ directory");

        println!("\nNext steps:");
        println!("  1. Place the season shot file at {}", config.data.shots_path);
        println!("  2. Run 'hockey features' to check the derived columns");
        println!("  3. Run 'hockey select' to compare the candidate regressors");

        Ok(())
    }

    fn load_frame(config: &Config, input: Option<String>) -> Result<FeatureFrame> {
        let path = input.unwrap_or_else(|| config.data.shots_path.clone());
        if !std::path::Path::new(&path).exists() {
            return Err(HockeyError::Config(format!(
                "shot file {} not found; download season {} first",
                path, config.data.season
            )));
        }

        let raw = EventTable::from_csv_path(&path)?;
        if raw.is_empty() {
            return Err(HockeyError::InsufficientData(format!("{} has no rows", path)));
        }
        build_feature_frame(&raw, &config.features)
    }

    fn print_distribution(title: &str, counts: &BTreeMap<String, usize>, total: usize) {
        println!("\n{}", title);
        println!("{}", "-".repeat(32));
        for (label, count) in counts {
            let share = if total == 0 {
                0.0
            } else {
                100.0 * *count as f64 / total as f64
            };
            println!("{:<12} {:>8} {:>8.1}%", label, count, share);
        }
    }

    fn print_summary(summary: &FeatureSummary, format: &OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Table => {
                println!("\nFeature Summary");
                println!("===============");
                println!("Events:           {}", summary.rows);
                println!("Games:            {}", summary.games);
                println!("Home shots:       {}", summary.home_events);
                println!("Mean xGD shift:   {:+.4}", summary.mean_xgd_shift);
                print_distribution("offensive_zone", &summary.offensive_zone, summary.rows);
                print_distribution("entry_type", &summary.entry_type, summary.rows);
                print_distribution("manpower_situation", &summary.manpower_situation, summary.rows);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(summary)?);
            }
            OutputFormat::Csv => {
                println!("column,category,count");
                for (column, counts) in [
                    ("offensive_zone", &summary.offensive_zone),
                    ("entry_type", &summary.entry_type),
                    ("manpower_situation", &summary.manpower_situation),
                ] {
                    for (label, count) in counts {
                        println!("{},{},{}", column, label, count);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn features(
        config: &Config,
        input: Option<String>,
        output: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let frame = load_frame(config, input)?;

        if let Some(path) = output {
            let file = std::fs::File::create(&path)?;
            frame.to_table()?.write_csv(file)?;
            println!("Wrote {} enriched rows to {}", frame.n_rows(), path);
        }

        print_summary(&frame.summary(), &format)
    }

    fn print_report(report: &SelectionReport, format: &OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Table => {
                println!("\nCandidate Scores (cross-validated R²)");
                println!("=====================================");
                println!("{:<12} {:<24} {:>9} {:>9}", "Name", "Kind", "Mean", "Std");
                for result in &report.results {
                    match &result.outcome {
                        CandidateOutcome::Scored(score) => println!(
                            "{:<12} {:<24} {:>9.4} {:>9.4}",
                            result.name, result.kind, score.mean, score.std
                        ),
                        CandidateOutcome::Failed(reason) => println!(
                            "{:<12} {:<24} {:>9} ({})",
                            result.name, result.kind, "FAILED", reason
                        ),
                    }
                }
                println!("\nSelected:     {}", report.selected);
                println!(
                    "Hold-out R²:  {:.4} ({} train / {} test rows)",
                    report.holdout_r2, report.train_rows, report.test_rows
                );
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(report)?);
            }
            OutputFormat::Csv => {
                println!("name,kind,status,mean,std");
                for result in &report.results {
                    match &result.outcome {
                        CandidateOutcome::Scored(score) => println!(
                            "{},{},scored,{:.6},{:.6}",
                            result.name, result.kind, score.mean, score.std
                        ),
                        CandidateOutcome::Failed(_) => {
                            println!("{},{},failed,,", result.name, result.kind)
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn select(
        config: &Config,
        input: Option<String>,
        folds: Option<usize>,
        format: OutputFormat,
    ) -> Result<()> {
        let mut selection = config.selection.clone();
        if let Some(k) = folds {
            selection.cv_folds = k;
        }

        let frame = load_frame(config, input)?;
        let (features, target) = FeatureSet::from_frame(&frame)?;
        let outcome = select_model(&features, target.view(), &selection)?;

        print_report(&outcome.report, &format)
    }
}
