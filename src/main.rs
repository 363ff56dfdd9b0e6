use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use topiclens::config::Config;
use topiclens::labeler::gemini::GeminiClient;
use topiclens::labeler::TopicLabeler;
use topiclens::output::{export, terminal};
use topiclens::pipeline::run::Pipeline;
use topiclens::posts::loader::{load_posts, LoadedPosts};
use topiclens::topics::download::{download_model, embedding_model_dir};
use topiclens::topics::embeddings::SentenceEmbedder;
use topiclens::topics::normalizer::normalize;

/// topiclens: discover and name the topics in a batch of social media posts.
///
/// Keeps posts in one language, embeds them, clusters them into K topics,
/// and asks a generative language model for a short name per topic.
#[derive(Parser)]
#[command(name = "topiclens", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster and label a JSON or CSV dump of posts
    Run {
        /// Input file (.csv, anything else is read as a JSON array)
        input: PathBuf,

        /// Directory for the CSV and JSON outputs
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Number of topics (overrides TOPICLENS_NUM_TOPICS)
        #[arg(long)]
        topics: Option<usize>,
    },

    /// Download the sentence embedding model (~90 MB)
    DownloadModel,

    /// Print the tokens and entities extracted from each post
    Tokens {
        /// Input file (.csv or JSON)
        input: PathBuf,
    },

    /// Show the resolved configuration (secrets redacted)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("topiclens=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            out_dir,
            topics,
        } => {
            let mut config = Config::load()?;
            if let Some(k) = topics {
                config.pipeline.num_topics = k;
            }
            config.validate()?;
            config.require_gemini()?;
            config.require_embedding_model()?;

            let loaded = read_posts(&input)?;

            println!("Loading embedding model...");
            let embedder = SentenceEmbedder::load(&embedding_model_dir(&config.model_dir))?;

            let generator = GeminiClient::new(
                &config.gemini_api_url,
                config.gemini_api_key.clone(),
                config.gemini_model.clone(),
            )?;
            let labeler = TopicLabeler::new(Arc::new(generator), config.labeler.clone());
            let pipeline = Pipeline::new(config.pipeline.clone(), Arc::new(embedder), labeler)?;

            println!(
                "Clustering {} posts into {} topics...",
                loaded.posts.len(),
                config.pipeline.num_topics
            );
            let output = pipeline.run(loaded.posts).await?;

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            let posts_path = out_dir.join(export::POSTS_FILE);
            let reps_path = out_dir.join(export::REPRESENTATIVES_FILE);
            let summary_path = out_dir.join(export::SUMMARY_FILE);

            export::write_augmented_csv(&posts_path, &output.assembly.posts)?;
            export::write_representatives_json(&reps_path, &output.assembly.representatives)?;
            export::write_summary_json(&summary_path, &output.summary)?;

            terminal::display_summary(&output.summary, &output.stats);
            terminal::display_representatives(&output.summary, &output.assembly.representatives);
            terminal::display_sample_posts(&output.assembly.posts, 10);

            println!("{}", "Outputs written:".bold());
            println!("  {}", posts_path.display());
            println!("  {}", reps_path.display());
            println!("  {}", summary_path.display());
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading ONNX model...");
            println!("  Destination: {}", model_dir.display());

            download_model(model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("You can now run `topiclens run <posts.json>`.");
        }

        Commands::Tokens { input } => {
            let loaded = read_posts(&input)?;

            for post in &loaded.posts {
                let normalized = normalize(&post.text);
                println!(
                    "{} {}",
                    format!("[{}]", post.id).bold(),
                    topiclens::output::truncate_chars(&post.title, 80)
                );
                println!("  tokens:   {}", normalized.tokens.join(" ").dimmed());
                println!("  entities: {}", normalized.entities.join(", ").cyan());
            }
        }

        Commands::Config => {
            let config = Config::load()?;
            let p = &config.pipeline;
            let l = &config.labeler;

            println!("{}", "=== topiclens configuration ===".bold());
            println!("  Target language:     {}", p.target_language);
            println!("  Topics (K):          {}", p.num_topics);
            println!("  Seed:                {}", p.seed);
            println!("  Max iterations:      {}", p.max_iterations);
            println!("  Representatives:     {}", p.selection.max_posts);
            println!("  Snippet chars:       {}", p.selection.snippet_chars);
            println!("  Permalink base:      {}", p.selection.permalink_base);
            println!("  Embed batch size:    {}", p.embed_batch_size);
            println!("  Extract tokens:      {}", p.extract_tokens);
            println!("  Label sample size:   {}", l.sample_size);
            println!("  Label attempts:      {}", l.retry.max_attempts);
            println!("  Backoff base:        {:?}", l.retry.base_delay);
            println!("  Worst-case backoff:  {:?}", l.retry.total_backoff());
            println!("  Inter-call delay:    {:?}", l.inter_call_delay);
            println!("  On label failure:    {:?}", l.failure_policy);
            println!("  Corpus description:  {}", l.corpus_description);
            println!("  Gemini model:        {}", config.gemini_model);
            println!("  Gemini API URL:      {}", config.gemini_api_url);
            println!(
                "  Gemini API key:      {}",
                if config.gemini_api_key.is_empty() {
                    "not set".red()
                } else {
                    "set".green()
                }
            );
            println!("  Model dir:           {}", config.model_dir.display());

            if let Err(e) = config.validate() {
                println!("\n  {} {e}", "!".red().bold());
            }
        }
    }

    Ok(())
}

fn read_posts(input: &Path) -> Result<LoadedPosts> {
    let loaded = load_posts(input)?;
    if loaded.skipped > 0 {
        println!(
            "  {} {} malformed records skipped",
            "!".yellow(),
            loaded.skipped
        );
    }
    Ok(loaded)
}
