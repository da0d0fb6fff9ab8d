use std::io::Read;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use symptom_triage::Pipeline;
use symptom_triage::llm::LlmClient;
use symptom_triage::lookup::PgLookup;
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_TIMEOUT: Duration = Duration::from_secs(90);

/// Triage patient symptom phrases into recommended specialists and available doctors.
///
/// Configuration comes from the environment: LLM_PROVIDER, OPENAI_API_KEY / GEMINI_API_KEY,
/// OPENAI_MODEL / GEMINI_MODEL, OPENAI_BASE_URL, LLM_TEMPERATURE, DATABASE_URL and
/// DATABASE_POOL_MAX.
#[derive(Parser)]
#[command(name = "triage", version)]
struct Cli {
    /// Symptom phrases. When omitted, a JSON request `{"phrases": [...]}` is read from stdin.
    phrases: Vec<String>,

    /// Print the result as a single line of JSON
    #[arg(long)]
    compact: bool,
}

#[derive(Deserialize)]
struct TriageRequest {
    #[serde(default)]
    phrases: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("symptom_triage=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let phrases = if cli.phrases.is_empty() {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        serde_json::from_str::<TriageRequest>(&body)?.phrases
    } else {
        cli.phrases
    };

    let http = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .build()?;
    let llm = LlmClient::from_env(http)?;
    let lookup = PgLookup::from_env()?;
    let pipeline = Pipeline::new(llm, lookup.clone(), lookup);

    let result = pipeline
        .triage(phrases)
        .await
        .inspect_err(|e| tracing::error!("triage rejected: {e}"))?;

    info!(doctors = result.doctors.len(), "triage complete");
    let output = if cli.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{output}");
    Ok(())
}
