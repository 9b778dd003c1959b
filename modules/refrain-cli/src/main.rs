use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use comment_api_client::CommentApiClient;
use refrain_common::{AppConfig, SamplingLevel, TargetRecord};
use refrain_evidence::{EvidenceLayers, KnowledgeCache, LayerConfig, LexiconAnalyzer};
use refrain_sampler::{RetryPolicy, SamplerConfig, TieredSampler};
use refrain_store::{CommentStore, PgCommentStore};

#[derive(Parser)]
#[command(name = "refrain", about = "Sample a song's comment section and read evidence from it")]
struct Cli {
    /// Log as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the upstream how many comments a target has.
    Probe { target_id: String },
    /// Fetch a tiered sample into the store.
    Sample {
        target_id: String,
        #[arg(long, default_value = "standard")]
        level: SamplingLevel,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        publish_year: Option<i32>,
    },
    /// Walk the full listing, refreshing stored comments and marking removed ones.
    Refresh { target_id: String },
    /// Layer 0: volume, coverage and time span.
    Overview { target_id: String },
    /// Layer 1: six-dimension metrics and cross-dimension signals.
    Signals { target_id: String },
    /// Layer 2: representative samples for verification.
    Samples { target_id: String },
    /// Layer 2.5: count and list comments containing a keyword.
    Keyword {
        target_id: String,
        keyword: String,
        #[arg(long, default_value_t = 0)]
        min_engagement: i64,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Layer 3: raw comments, optionally filtered.
    Raw {
        target_id: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        min_engagement: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the JSON result.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("refrain=info"));
    if cli.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = AppConfig::from_env()?;

    let store = PgCommentStore::connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    store.migrate().await.context("Failed to run migrations")?;
    let store: Arc<dyn CommentStore> = Arc::new(store);

    match cli.command {
        Command::Probe { target_id } => {
            let sampler = sampler(&config, store)?;
            let total = sampler.probe(&target_id).await?;
            emit(&serde_json::json!({ "target_id": target_id, "api_total": total }))
        }
        Command::Sample {
            target_id,
            level,
            title,
            artist,
            publish_year,
        } => {
            if title.is_some() || artist.is_some() || publish_year.is_some() {
                let mut record = store
                    .target(&target_id)
                    .await?
                    .unwrap_or_else(|| TargetRecord::new(target_id.as_str()));
                record.title = title.or(record.title);
                record.artist = artist.or(record.artist);
                record.publish_year = publish_year.or(record.publish_year);
                store.upsert_target(&record).await?;
                info!(target_id = target_id.as_str(), "Target metadata updated");
            }
            let sampler = sampler(&config, store)?;
            let report = sampler.run(&target_id, level).await?;
            emit(&report)
        }
        Command::Refresh { target_id } => {
            let sampler = sampler(&config, store)?;
            let report = sampler.refresh(&target_id).await?;
            emit(&report)
        }
        Command::Overview { target_id } => emit(&layers(&config, store).overview(&target_id).await?),
        Command::Signals { target_id } => emit(&layers(&config, store).signals(&target_id).await?),
        Command::Samples { target_id } => emit(&layers(&config, store).verification_samples(&target_id).await?),
        Command::Keyword {
            target_id,
            keyword,
            min_engagement,
            limit,
        } => emit(
            &layers(&config, store)
                .keyword_lookup(&target_id, &keyword, min_engagement, limit)
                .await?,
        ),
        Command::Raw {
            target_id,
            year,
            min_engagement,
            limit,
        } => emit(&layers(&config, store).raw(&target_id, year, min_engagement, limit).await?),
    }
}

fn sampler(config: &AppConfig, store: Arc<dyn CommentStore>) -> Result<TieredSampler> {
    let client = CommentApiClient::new(
        config.comment_api_base_url.as_str(),
        Duration::from_secs(config.request_timeout_secs),
    )
    .context("Failed to build comment API client")?
    .with_cookie(config.comment_api_cookie.clone());

    Ok(TieredSampler::new(Arc::new(client), store, sampler_config(config)))
}

fn sampler_config(config: &AppConfig) -> SamplerConfig {
    let retry = RetryPolicy {
        max_attempts: config.max_retries.max(1),
        base_delay: Duration::from_millis(config.retry_base_delay_ms),
        timeout: Duration::from_secs(config.request_timeout_secs),
    };
    let builder = SamplerConfig::builder()
        .request_delay(Duration::from_millis(config.request_delay_ms))
        .cursor_delay(Duration::from_millis(config.cursor_delay_ms))
        .max_pages_per_year(config.max_pages_per_year.max(1))
        .retry(retry);
    match config.sampler_seed {
        Some(seed) => builder.seed(seed).build(),
        None => builder.build(),
    }
}

fn layers(config: &AppConfig, store: Arc<dyn CommentStore>) -> EvidenceLayers {
    EvidenceLayers::new(
        store,
        Arc::new(LexiconAnalyzer),
        Arc::new(KnowledgeCache::new(config.knowledge_dir.clone())),
        LayerConfig::default(),
    )
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/refrain".into(),
            comment_api_base_url: "http://localhost:9000".into(),
            comment_api_cookie: None,
            request_timeout_secs: 7,
            request_delay_ms: 120,
            cursor_delay_ms: 900,
            max_pages_per_year: 4,
            max_retries: 0,
            retry_base_delay_ms: 250,
            sampler_seed: Some(11),
            knowledge_dir: None,
        }
    }

    #[test]
    fn pacing_comes_from_the_environment_config() {
        let c = sampler_config(&app_config());
        assert_eq!(c.request_delay, Duration::from_millis(120));
        assert_eq!(c.cursor_delay, Duration::from_millis(900));
        assert_eq!(c.max_pages_per_year, 4);
        assert_eq!(c.seed, Some(11));
        assert_eq!(c.retry.max_attempts, 1);
        assert_eq!(c.retry.base_delay, Duration::from_millis(250));
        assert_eq!(c.retry.timeout, Duration::from_secs(7));
    }

    #[test]
    fn unseeded_config_has_exact_delays() {
        let c = sampler_config(&AppConfig {
            sampler_seed: None,
            ..app_config()
        });
        assert_eq!(c.seed, None);
    }
}
