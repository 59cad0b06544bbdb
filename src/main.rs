use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rxlens_lib::config;
use rxlens_lib::intelligence::{KnowledgeBase, DISEASES_FILE};
use rxlens_lib::models::Document;
use rxlens_lib::pipeline::processor::PrescriptionAnalyzer;
use rxlens_lib::pipeline_config::AnalyzerConfig;

#[derive(Parser, Debug)]
#[command(name = "rxlens", version, about = "Turn a prescription scan into structured medications and likely conditions.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one prescription image or PDF and print the result as JSON.
    Analyze {
        file: PathBuf,
        /// Declared MIME type; guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print a summary of the loaded knowledge base.
    Knowledge,
}

/// Pick up `<data dir>/rxlens/knowledge` when no directory was configured
/// and the override files are present.
fn with_knowledge_override(mut config: AnalyzerConfig) -> AnalyzerConfig {
    if config.knowledge_dir.is_none() {
        config.knowledge_dir = config::knowledge_override_dir().filter(|dir| dir.join(DISEASES_FILE).is_file());
    }
    config
}

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> ExitCode {
    rxlens_lib::init_tracing();
    let cli = Cli::parse();
    let config = with_knowledge_override(AnalyzerConfig::from_env());

    let outcome = match cli.command {
        Command::Analyze { file, mime, pretty } => analyze(config, file, mime, pretty).await,
        Command::Knowledge => knowledge(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "{} failed", config::APP_NAME);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn analyze(config: AnalyzerConfig, file: PathBuf, mime: Option<String>, pretty: bool) -> CliResult {
    let mime = mime.unwrap_or_else(|| {
        mime_guess::from_path(&file)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });
    let bytes = tokio::fs::read(&file)
        .await
        .map_err(|e| format!("cannot read {}: {e}", file.display()))?;

    let analyzer = Arc::new(PrescriptionAnalyzer::from_config(config)?);
    let result = analyzer.analyze_async(Document::new(bytes, mime)).await?;
    analyzer.worker().terminate();

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");
    Ok(())
}

fn knowledge(config: &AnalyzerConfig) -> CliResult {
    let kb = KnowledgeBase::load_or_bundled(config.knowledge_dir.as_deref())?;
    let summary = kb.summary();

    println!("{} v{}", config::APP_NAME, config::APP_VERSION);
    println!(
        "{} diseases, {} keyword terms, {} medications ({} mappings)",
        summary.diseases, summary.keyword_terms, summary.medications, summary.mappings
    );
    for disease in kb.diseases() {
        let terms = kb
            .keywords_for(&disease.id)
            .map(|k| k.all_terms().count())
            .unwrap_or(0);
        println!("  {:<24} {:<16} {terms} terms", disease.id, disease.category);
    }
    Ok(())
}
