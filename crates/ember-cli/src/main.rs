//! Ember CLI
//!
//! Engine harness for the cache-augmented generation core: a built-in
//! self-test and a single-query runner. Configuration comes from the
//! environment; only configuration errors exit non-zero.

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ember_core::{EmberConfig, EmberEngine, EmberError, QueryEnvelope, UserContext};

/// Ember - Cache-Augmented Generation engine harness
#[derive(Parser)]
#[command(name = "ember")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Warm-cache context assembly over a knowledge store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in self-test (multiple queries against defaults)
    Test,
    /// Process a single query under the cli-session id
    Query {
        /// Query text
        #[arg(required = true)]
        text: Vec<String>,

        /// Print the full result envelope as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout is for the harness output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match EmberConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e}", "configuration error:".red().bold());
            std::process::exit(2);
        }
    };
    let engine = match EmberEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(e @ EmberError::Config(_)) => {
            eprintln!("{} {e}", "configuration error:".red().bold());
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            return;
        }
    };

    let outcome = match cli.command {
        Commands::Test => run_test(&engine).await,
        Commands::Query { text, json } => run_query(&engine, &text.join(" "), json).await,
    };

    if let Err(e) = outcome {
        match e {
            EmberError::Config(_) => {
                eprintln!("{} {e}", "configuration error:".red().bold());
                std::process::exit(2);
            }
            other => error!("{other}"),
        }
    }
}

/// Self-test: several queries on one session, then the cache summary
async fn run_test(engine: &EmberEngine) -> ember_core::Result<()> {
    println!("{}", "=== Ember Engine Self-Test ===".cyan().bold());

    let session = "ember-test-session-001";
    let queries = [
        "How do I implement the cache warming architecture?",
        "What is the knowledge store schema?",
        "Show me pattern recognition details",
    ];
    let user_context = UserContext {
        keywords: vec![
            "CAG".to_string(),
            "implementation".to_string(),
            "architecture".to_string(),
        ],
        project: engine.project().to_string(),
    };

    for (i, query) in queries.iter().enumerate() {
        println!();
        println!("{} {}", format!("--- Query {}:", i + 1).as_str().yellow().bold(), query);
        let envelope = engine
            .process_query(query, session, Some(user_context.clone()))
            .await?;
        print_envelope_summary(&envelope);
    }

    println!();
    println!("{}", "=== Cache Summary ===".cyan().bold());
    let summary = engine.get_cached_knowledge_summary(None)?;
    println!("{}: {}", "Cached items".white().bold(), summary.total_cached_items);
    println!("{}: {}", "Layers in use".white().bold(), summary.cache_layers);
    println!("{}: {:.2}", "Average priority".white().bold(), summary.average_priority);
    println!(
        "{}: {} chars",
        "Memory estimate".white().bold(),
        summary.memory_usage_estimate
    );
    for sample in &summary.sample_items {
        println!(
            "  [{}] {} (priority {:.2})",
            sample.knowledge_type, sample.title, sample.priority
        );
    }

    println!();
    println!("{}", "=== Performance ===".cyan().bold());
    let metrics = summary.performance_metrics;
    println!("{}: {}", "Total queries".white().bold(), metrics.total_queries);
    println!("{}: {}", "Cache hits".white().bold(), metrics.cache_hits);
    println!("{}: {}", "Cache misses".white().bold(), metrics.cache_misses);
    println!(
        "{}: {:.3}s",
        "Average response time".white().bold(),
        metrics.average_response_time
    );
    println!("{}: {:.1}%", "Hit rate".white().bold(), metrics.hit_rate());
    if let Some(tool_calls) = metrics.tool_calls {
        println!("{}: {}", "Tool calls".white().bold(), tool_calls);
    }

    Ok(())
}

/// Process one query and print its envelope summary
async fn run_query(engine: &EmberEngine, query: &str, json: bool) -> ember_core::Result<()> {
    if json {
        let envelope = engine.process_query(query, "cli-session", None).await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&envelope).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Processing query: {query}");
    let envelope = engine.process_query(query, "cli-session", None).await?;

    println!();
    println!("{}", "Response Summary:".cyan().bold());
    print_envelope_summary(&envelope);
    Ok(())
}

fn print_envelope_summary(envelope: &QueryEnvelope) {
    println!(
        "{}: {}",
        "Context tokens".white().bold(),
        envelope.context_size_tokens
    );
    println!(
        "{}: {}",
        "Cached items".white().bold(),
        envelope.cached_knowledge_items
    );
    println!(
        "{}: {:.3}s",
        "Processing time".white().bold(),
        envelope.performance.total_processing_time
    );
    let status = if envelope.performance.cache_hit {
        "HIT".green().bold()
    } else {
        "MISS".yellow().bold()
    };
    println!("{}: {status}", "Cache status".white().bold());

    let emitted: Vec<&str> = envelope
        .context_layers
        .iter()
        .filter(|(_, present)| **present)
        .map(|(layer, _)| layer.as_str())
        .collect();
    println!("{}: {}", "Layers emitted".white().bold(), emitted.len());
}
