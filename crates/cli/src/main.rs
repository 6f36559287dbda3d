use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use data_loader::{RatingStore, RecommendationEntry, SharedStore, UserId};
use server::{BatchReport, BatchRunner, Recommender, RecommenderConfig};
use sources::SeedExtractor;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// CineRecs - personalised movie recommendations from public ratings
#[derive(Parser)]
#[command(name = "cine-recs")]
#[command(
    about = "Recommends movies by rescaling public ratings to each user's taste",
    long_about = None
)]
struct Cli {
    /// Path to the data directory (.dat files)
    #[arg(short, long, default_value = "data/store")]
    data_dir: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Command-line values that take precedence over the configuration file
#[derive(Args)]
struct ConfigOverrides {
    /// Target candidate pool size
    #[arg(long, global = true)]
    pool_size: Option<usize>,

    /// Year the candidate search starts from
    #[arg(long, global = true)]
    start_year: Option<u16>,

    /// Oldest year the candidate search looks at
    #[arg(long, global = true)]
    min_year: Option<u16>,

    /// Minimum expected score for a recommendation
    #[arg(long, global = true)]
    recommend_criterion: Option<f32>,

    /// Backfill attempts per candidate without public ratings
    #[arg(long, global = true)]
    backfill_attempts: Option<usize>,

    /// Users processed at once by the batch command
    #[arg(long, global = true)]
    concurrency: Option<usize>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut RecommenderConfig) {
        if let Some(pool_size) = self.pool_size {
            config.pool_size = pool_size;
        }
        if let Some(start_year) = self.start_year {
            config.start_year = Some(start_year);
        }
        if let Some(min_year) = self.min_year {
            config.min_year = min_year;
        }
        if let Some(criterion) = self.recommend_criterion {
            config.recommend_criterion = criterion;
        }
        if let Some(attempts) = self.backfill_attempts {
            config.backfill_attempts = attempts;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute recommendations for a user
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: UserId,

        /// Save the result to the store as well
        #[arg(long)]
        save: bool,
    },

    /// Show user profile, rating history and seeds
    User {
        /// User ID to display
        #[arg(long)]
        user_id: UserId,
    },

    /// Refresh the recommendations of every user
    Batch {
        /// Write every user's saved recommendations to this JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = RecommenderConfig::load(cli.config.as_deref())?;
    cli.overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    debug!("Using {:?}", config);

    println!("Loading data from {}...", cli.data_dir.display());
    let start = Instant::now();
    let (store, recommender) = Recommender::from_data_dir(&cli.data_dir, &config)?;
    println!("{} Loaded data in {:?}", "✓".green(), start.elapsed());

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend { user_id, save } => {
            handle_recommend(&store, &recommender, user_id, save)?
        }
        Commands::User { user_id } => handle_user(&store, &config, user_id)?,
        Commands::Batch { output } => {
            handle_batch(&store, recommender, &config, output.as_deref()).await?
        }
    }

    Ok(())
}

/// Handle the 'recommend' command
fn handle_recommend(
    store: &Arc<SharedStore>,
    recommender: &Recommender,
    user_id: UserId,
    save: bool,
) -> Result<()> {
    if store.read()?.get_user(user_id).is_none() {
        return Err(anyhow!("User {} not found", user_id));
    }

    let start = Instant::now();
    let recommendations = if save {
        recommender.update_single_user_recommendations(user_id)?;
        store.read()?.get_recommendations(user_id).to_vec()
    } else {
        recommender.get_single_user_recommendations(user_id)?
    };

    print_recommendations(store, &recommendations)?;
    println!(
        "{} {} recommendations in {:?}{}",
        "✓".green(),
        recommendations.len(),
        start.elapsed(),
        if save { " (saved)" } else { "" }
    );
    Ok(())
}

/// Handle the 'user' command
fn handle_user(
    store: &Arc<SharedStore>,
    config: &RecommenderConfig,
    user_id: UserId,
) -> Result<()> {
    let history = store.get_user_history(user_id)?;
    let index = store.read()?;
    let user = index
        .get_user(user_id)
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;

    println!("{}", format!("User {} ({})", user_id, user.username).bold().blue());

    let num_ratings = history.len();
    let avg_rating = if num_ratings > 0 {
        history.iter().map(|r| r.rating).sum::<f32>() / num_ratings as f32
    } else {
        0.0
    };
    println!("{}Number of ratings: {}", "• ".cyan(), num_ratings);
    println!("{}Average rating: {:.2}", "• ".cyan(), avg_rating);

    let seeds = SeedExtractor::new()
        .with_criterion(config.seed_criterion)
        .extract(&history);
    println!(
        "{}Seeds (rated {:.1} or more): {}",
        "• ".cyan(),
        config.seed_criterion,
        seeds.len()
    );
    if seeds.is_empty() {
        println!("  {}", "cold start: this user is served the popular list".yellow());
    }

    let mut top_rated = history.clone();
    top_rated.sort_by(|a, b| {
        b.rating
            .partial_cmp(&a.rating)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    println!("Top rated movies:");
    for record in top_rated.iter().take(5) {
        if let Some(movie) = index.get_movie(record.movie_id) {
            let marker = if seeds.contains(&record.movie_id) { "*" } else { " " };
            println!("  {} {} (rating: {:.1})", marker.green(), movie.title, record.rating);
        }
    }

    let saved = index.get_recommendations(user_id);
    if !saved.is_empty() {
        println!("Saved recommendations: {}", saved.len());
    }
    Ok(())
}

/// Handle the 'batch' command
async fn handle_batch(
    store: &Arc<SharedStore>,
    recommender: Recommender,
    config: &RecommenderConfig,
    output: Option<&Path>,
) -> Result<()> {
    let runner = BatchRunner::new(Arc::new(recommender))
        .with_concurrency(config.concurrency)
        .with_user_timeout(Duration::from_secs(config.user_timeout_secs));
    let report = runner.run().await?;
    print_report(&report);

    if let Some(path) = output {
        let recommendations = store.all_recommendations()?;
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &recommendations)
            .context("Failed to write recommendations")?;
        println!(
            "{} Exported recommendations of {} users to {}",
            "✓".green(),
            recommendations.len(),
            path.display()
        );
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("{}", "Batch results:".bold().blue());
    println!("Users processed: {}", report.total());
    println!("Succeeded: {}", report.succeeded.len().to_string().green());
    println!("Failed: {}", report.failed.len().to_string().red());
    println!("Recommendations saved: {}", report.saved_entries);
    println!("Total time: {:?}", report.elapsed);
    for failure in &report.failed {
        println!("  {} user {}: {}", "✗".red(), failure.user_id, failure.reason);
    }
}

/// Print recommendations with their titles
fn print_recommendations(
    store: &SharedStore,
    recommendations: &[RecommendationEntry],
) -> Result<()> {
    println!("{}", "Movie Recommendations:".bold().blue());
    let index = store.read()?;
    for (i, entry) in recommendations.iter().enumerate() {
        let title = index
            .get_movie(entry.movie_id)
            .map(|movie| movie.title.clone())
            .unwrap_or_else(|| format!("movie {}", entry.movie_id));
        println!(
            "{}. {} - Expected score: {:.2}",
            (i + 1).to_string().green(),
            title,
            entry.expected_score
        );
    }
    Ok(())
}
