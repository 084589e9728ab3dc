// Hot swap command line
//
// Replaces classes in a running JVM started with
// -agentlib:jdwp=transport=dt_socket,server=y,address=<port>

use clap::Parser;
use hotswap::{HotSwapConfig, HotSwapError, SwapReport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hotswap", version, about = "Hot swap class files into a running JVM via JDWP")]
struct Cli {
    /// Host the target JVM's debug agent listens on
    #[arg(long, env = "HOTSWAP_HOST")]
    host: String,

    /// Port the target JVM's debug agent listens on
    #[arg(long, env = "HOTSWAP_PORT")]
    port: String,

    /// Directory the class files are relative to
    #[arg(long, env = "HOTSWAP_PATH")]
    path: PathBuf,

    /// Give up attaching after this many milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Class files relative to --path, e.g. com/example/Foo.class
    #[arg(required = true)]
    files: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("failed to initialise logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    let mut config = HotSwapConfig::new(cli.host, cli.port, cli.path);
    if let Some(timeout) = cli.timeout {
        config = config.with_timeout_ms(timeout);
    }

    match hotswap::run(&config, &cli.files).await {
        Ok(report) => match print_report(&report, cli.json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("failed to print report: {:#}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => ExitCode::from(report_failure(&e)),
    }
}

// Logged once on stderr; returns the process exit code
fn report_failure(e: &HotSwapError) -> u8 {
    error!("{}", e);
    e.exit_code()
}

// Tracing to stderr only - stdout carries the report
fn init_tracing(verbose: u8) -> anyhow::Result<()> {
    let default = match verbose {
        0 => "hotswap=info,jdwp_client=warn",
        1 => "hotswap=debug,jdwp_client=debug",
        _ => "hotswap=trace,jdwp_client=trace",
    };
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::try_new(default)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_report(report: &SwapReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for class in &report.swapped {
        println!(
            "swapped {} ({} bytes, {} loaded {})",
            class.type_name,
            class.bytes,
            class.handles,
            if class.handles == 1 { "copy" } else { "copies" }
        );
    }
    if let Some(warning) = &report.detach_warning {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}
