use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

mod blend;
mod breakdown;
mod config;
mod db;
mod error;
mod instruments;
mod models;
mod ninebox;
mod remote;
mod report;
mod scoring;
mod stats;
mod topics;

use config::Settings;
use models::EvaluatorRole;
use remote::RemoteComputationClient;
use topics::{OrganizationalContext, TopicPrioritizer, TrainingPlanRequest};

#[derive(Parser)]
#[command(name = "evaluation-engine")]
#[command(
    about = "Performance evaluation scoring and reporting for municipal staff",
    long_about = None
)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    /// JSON file with instrument definitions
    #[arg(long, env = "EVALUATION_INSTRUMENTS", global = true)]
    instruments: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import evaluation responses from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the configured instruments and check their weights
    Instruments,
    /// Compute and store final scores for a period
    Score {
        #[arg(long)]
        period: String,
        #[arg(long)]
        email: Option<String>,
        /// Skip the remote calculation service
        #[arg(long)]
        local: bool,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show whether a period accepts self and supervisor evaluations today
    Period {
        #[arg(long)]
        period: String,
        /// Skip the remote calculation service
        #[arg(long)]
        local: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        period: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write the prioritized training topics as plan-generator input
    Topics {
        #[arg(long)]
        period: String,
        #[arg(long, default_value = "training-topics.json")]
        out: PathBuf,
    },
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(settings.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_tracing(cli.verbose);

    let settings = Settings {
        database_url: cli.database_url,
        instruments_path: cli.instruments,
    };
    let registry = settings.load_registry()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&settings).await?;
            db::seed(&pool, &registry).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&settings).await?;
            let inserted = db::import_csv(&pool, &registry, &csv).await?;
            println!("Imported {inserted} responses from {}.", csv.display());
        }
        Commands::Instruments => {
            for instrument in registry.instruments() {
                let strategy = registry.strategy_for(&instrument.id);
                let items: usize = instrument
                    .performance_dimensions
                    .iter()
                    .map(|dimension| dimension.items.len())
                    .sum();
                println!(
                    "- {} ({}): {} dimensions, {} items, {} potential dimensions, \
                     blend {:.2}/{:.2}",
                    instrument.id,
                    instrument.level,
                    instrument.performance_dimensions.len(),
                    items,
                    instrument.potential_dimensions.len(),
                    strategy.blend.supervisor,
                    strategy.blend.self_weight
                );
            }
        }
        Commands::Score {
            period,
            email,
            local,
            limit,
        } => {
            let pool = connect(&settings).await?;
            let period = db::fetch_period(&pool, &period).await?;
            let pairs = db::fetch_evaluation_pairs(&pool, period.id, email.as_deref()).await?;
            let client = if local {
                RemoteComputationClient::local_only()
            } else {
                RemoteComputationClient::new(Arc::new(db::PgScoringBackend::new(pool.clone())))
            };

            let mut results = Vec::new();
            for pair in pairs {
                let (Some(self_draft), Some(supervisor_draft)) =
                    (&pair.self_draft, &pair.supervisor_draft)
                else {
                    info!(employee = %pair.employee.full_name, "waiting for both evaluations");
                    continue;
                };
                let instrument = registry.resolve(&pair.instrument_id)?;
                for draft in [self_draft, supervisor_draft] {
                    if !client
                        .validate_complete(&draft.responses, &instrument.performance_dimensions)
                        .await
                    {
                        let missing: Vec<&str> = scoring::incomplete_dimensions(
                            &draft.responses,
                            &instrument.performance_dimensions,
                        )
                        .iter()
                        .map(|dimension| dimension.id.as_str())
                        .collect();
                        let progress = scoring::overall_progress(
                            &draft.responses,
                            &instrument.performance_dimensions,
                        );
                        warn!(
                            employee = %pair.employee.full_name,
                            role = draft.role.as_str(),
                            answered = progress.percentage,
                            ?missing,
                            "scoring an incomplete evaluation"
                        );
                    }
                }

                let strategy = registry.strategy_for(&instrument.id);
                let score = client
                    .final_score(self_draft, supervisor_draft, instrument, &strategy)
                    .await?;
                db::save_final_score(&pool, pair.employee.id, period.id, &score).await?;
                results.push((pair.employee.full_name.clone(), score));
            }

            if results.is_empty() {
                println!("No complete evaluation pairs for period {}.", period.name);
                return Ok(());
            }

            results.sort_by(|a, b| b.1.performance_final.total_cmp(&a.1.performance_final));
            println!("Top employees by final score:");
            for (name, score) in results.iter().take(limit) {
                let position = score
                    .nine_box_position
                    .map(|position| position.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let potential = score
                    .potential
                    .map(|value| format!("{value:.2}"))
                    .unwrap_or_else(|| "not evaluated".to_string());
                println!(
                    "- {} final {:.2} (self {:.2}, supervisor {:.2}) potential {} nine-box {}",
                    name,
                    score.performance_final,
                    score.performance_self,
                    score.performance_supervisor,
                    potential,
                    position
                );
            }
        }
        Commands::Period { period, local } => {
            let pool = connect(&settings).await?;
            let period = db::fetch_period(&pool, &period).await?;
            let client = if local {
                RemoteComputationClient::local_only()
            } else {
                RemoteComputationClient::new(Arc::new(db::PgScoringBackend::new(pool.clone())))
            };
            let today = Utc::now().date_naive();
            for role in [EvaluatorRole::SelfEvaluation, EvaluatorRole::Supervisor] {
                let open = client.is_period_open(&period, role, today).await;
                println!(
                    "{} {}: {}",
                    period.name,
                    role.as_str(),
                    if open { "open" } else { "closed" }
                );
            }
        }
        Commands::Report { period, out } => {
            let pool = connect(&settings).await?;
            let period = db::fetch_period(&pool, &period).await?;
            let employees = db::fetch_scored_employees(&pool, period.id).await?;
            let mentions = db::fetch_topic_mentions(&pool, period.id).await?;
            let population = db::count_employees(&pool).await?;
            let topics = TopicPrioritizer::new(population).prioritize(&mentions);
            let today = Utc::now().date_naive();
            let report = report::build_report(&period, &employees, &topics, today);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Topics { period, out } => {
            let pool = connect(&settings).await?;
            let period = db::fetch_period(&pool, &period).await?;
            let pairs = db::fetch_evaluation_pairs(&pool, period.id, None).await?;
            let employees = db::fetch_scored_employees(&pool, period.id).await?;
            let mentions = db::fetch_topic_mentions(&pool, period.id).await?;
            let population = db::count_employees(&pool).await?;

            let mut evaluations = Vec::new();
            for pair in &pairs {
                if let Some(draft) = &pair.supervisor_draft {
                    let instrument = registry.resolve(&pair.instrument_id)?;
                    let dimensions = instrument.performance_dimensions.as_slice();
                    evaluations.push((&draft.responses, dimensions));
                }
            }
            let means = breakdown::dimension_means(evaluations);

            let finals: Vec<f64> = employees
                .iter()
                .map(|employee| employee.score.performance_final)
                .collect();
            let context = OrganizationalContext {
                employee_count: population,
                evaluated_count: employees.len(),
                average_performance: stats::mean(&finals).ok().map(scoring::round2),
                gap_by_dimension: breakdown::gap_by_dimension(&means),
            };
            let topics = TopicPrioritizer::new(population)
                .with_dimension_means(means)
                .prioritize(&mentions);
            if topics.is_empty() {
                println!("No training topics found for period {}.", period.name);
            }

            let request = TrainingPlanRequest::new(topics, context);
            std::fs::write(&out, serde_json::to_string_pretty(&request)?)?;
            println!(
                "Wrote {} topics in {} themes to {}.",
                request.topics.len(),
                request.themes.len(),
                out.display()
            );
        }
    }

    Ok(())
}
