//! Interactive harness for the NLU pipeline.
//!
//! Reads utterances from stdin, runs them through the full pipeline and
//! prints the result envelope as JSON. Uses the in-memory reference
//! fixture; set OPENAI_API_KEY to enable the AI stages.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use airops_nlu::llm::{LanguageModel, OpenAiClient};
use airops_nlu::testutils::heathrow_fixture;
use airops_nlu::{Context, NluConfig, NluPipeline, PipelineResponse};

#[derive(Parser, Debug)]
#[command(name = "nlu_harness", about = "Airport ops NLU pipeline REPL")]
struct Args {
    /// Default airport IATA code.
    #[arg(long, default_value = "LHR")]
    airport: String,

    /// Treat reference-service failures as validation failures.
    #[arg(long)]
    strict_references: bool,

    /// Disable the parse cache.
    #[arg(long)]
    no_cache: bool,

    /// Print the full result envelope instead of a summary line.
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = NluConfig {
        default_airport: args.airport.clone(),
        strict_references: args.strict_references,
        cache_enabled: !args.no_cache,
        ..NluConfig::default()
    };

    let llm: Option<Arc<dyn LanguageModel>> = match OpenAiClient::from_env() {
        Ok(client) => {
            eprintln!("AI stages enabled ({})", client.model_name());
            Some(Arc::new(client))
        }
        Err(_) => {
            eprintln!("OPENAI_API_KEY not set, running rules-only");
            None
        }
    };

    let pipeline = NluPipeline::new(llm, Some(Arc::new(heathrow_fixture())), config);
    let mut context = Context::for_conversation(uuid::Uuid::new_v4().to_string());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("nlu> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if line == "metrics" {
            println!("{}", serde_json::to_string_pretty(&pipeline.metrics())?);
            continue;
        }

        let outcome = pipeline.process(line, &context).await;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            summarise(&outcome);
        }

        // Single-lookback context: the last successful parse feeds the
        // next utterance.
        if let Some(response) = outcome.data {
            let parsed = match response {
                PipelineResponse::Query { parsed, .. } => parsed,
                PipelineResponse::Operation { parsed, .. } => parsed,
            };
            context.recent_queries = vec![parsed];
        }
    }

    Ok(())
}

fn summarise(outcome: &airops_nlu::Outcome<PipelineResponse>) {
    match &outcome.data {
        Some(PipelineResponse::Query { domain, .. }) => {
            println!(
                "intent={} confidence={:.2} entities={}",
                domain.intent,
                domain.confidence,
                serde_json::to_string(&domain.entities).unwrap_or_default()
            );
        }
        Some(PipelineResponse::Operation { operation, .. }) => {
            println!(
                "operation={} {} complete={} params={}",
                operation.operation_type.as_str(),
                operation.entity_type,
                operation.parameter_status.is_complete,
                serde_json::to_string(&operation.parameters).unwrap_or_default()
            );
            if let Some(ref prompt) = operation.confirmation_message {
                println!("  -> {}", prompt);
            }
        }
        None => {
            if let Some(ref error) = outcome.metadata.error {
                println!("error[{}]: {}", error.code, error.message);
            }
        }
    }
}
