//! ClinicOps workflow harness entry point

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use clinicops_e2e::report;
use clinicops_e2e::{execute, HarnessConfig, Runner, Workflow};

#[derive(Parser, Debug)]
#[command(name = "clinicops-e2e")]
#[command(version, about = "Sequential workflow verification harness for the ClinicOps API")]
struct Args {
    /// Path to the harness config file (optional; defaults apply when missing)
    #[arg(short, long, env = "CLINIC_E2E_CONFIG", default_value = "clinicops-e2e.toml")]
    config: PathBuf,

    /// Base URL of the clinic API
    #[arg(long, env = "CLINIC_API_BASE_URL")]
    base_url: Option<String>,

    /// Workflow to run
    #[arg(short, long, value_enum, default_value = "treatment-plan")]
    workflow: Workflow,

    /// Also write the results as JSON to this path (write errors are logged, not fatal)
    #[arg(long)]
    json_report: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            report::print_abort(&format!("Error: {}", e));
            1
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> clinicops_e2e::E2eResult<i32> {
    let mut config = HarnessConfig::load(&args.config)?;
    config.apply_env();
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }

    let runner = Runner::new(config.policy.clone());
    let outcome = execute(args.workflow, &config, runner).await?;

    Ok(outcome.finish(args.json_report.as_deref()))
}
