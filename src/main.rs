use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payflow::application::service::PaymentService;
use payflow::config::PipelineConfig;
use payflow::domain::ports::PaymentGatewayRef;
use payflow::infrastructure::in_memory::InMemoryPaymentRepository;
use payflow::infrastructure::simulated::SimulatedGateway;
use payflow::interfaces::csv::request_reader::RequestReader;
use payflow::interfaces::csv::result_writer::ResultWriter;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input payment requests CSV file
    input: PathBuf,

    #[command(flatten)]
    pipeline: PipelineConfig,

    /// Disable the simulated gateways' random failures
    #[arg(long)]
    reliable: bool,

    /// Emit JSON lines instead of CSV
    #[arg(long)]
    json: bool,

    /// How long to wait for submitted payments to settle (ms)
    #[arg(long, default_value_t = 30_000)]
    settle_timeout_ms: u64,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (stripe, paypal) = if cli.reliable {
        (
            SimulatedGateway::stripe().reliable(),
            SimulatedGateway::paypal().reliable(),
        )
    } else {
        (SimulatedGateway::stripe(), SimulatedGateway::paypal())
    };
    // Stripe is registered first and serves unrecognised methods.
    let gateways: Vec<PaymentGatewayRef> = vec![Arc::new(stripe), Arc::new(paypal)];

    let repository = Arc::new(InMemoryPaymentRepository::new());
    let service = PaymentService::new(&cli.pipeline, repository, gateways).into_diagnostic()?;

    // Submit every request
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = RequestReader::new(file);
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for request in reader.requests() {
        match request {
            Ok(request) => match service.submit(request).await {
                Ok(result) => {
                    if seen.insert(result.payment_id) {
                        ids.push(result.payment_id);
                    }
                }
                Err(e) => eprintln!("Error submitting payment: {}", e),
            },
            Err(e) => eprintln!("Error reading request: {}", e),
        }
    }

    // Give the pipeline time to settle, then stop it
    let deadline = Instant::now() + Duration::from_millis(cli.settle_timeout_ms);
    for id in &ids {
        let remaining = deadline.saturating_duration_since(Instant::now());
        service
            .wait_for_terminal(*id, remaining)
            .await
            .into_diagnostic()?;
    }
    service.shutdown().await;

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        results.push(service.status(id).await.into_diagnostic()?);
    }

    // Output final state
    let stdout = io::stdout();
    if cli.json {
        let mut out = stdout.lock();
        for result in results {
            let line = serde_json::to_string(&result).into_diagnostic()?;
            writeln!(out, "{line}").into_diagnostic()?;
        }
    } else {
        let mut writer = ResultWriter::new(stdout.lock());
        writer.write_results(results).into_diagnostic()?;
    }

    Ok(())
}
