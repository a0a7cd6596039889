use std::io::Write;

use clap::Parser;

use simse_namespace::config::{CliArgs, Command};
use simse_namespace::demo;
use simse_namespace::Namespace;

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let options = args.namespace_options();
    let mut stdout = std::io::stdout().lock();

    match args.command() {
        Command::Tour => {
            let ns = Namespace::with_options(options);
            demo::run_tour(&ns, &mut stdout)?;
        }
        Command::Stress {
            threads,
            files,
            json,
        } => {
            let report = demo::run_stress(options, threads, files)?;
            if json {
                serde_json::to_writer_pretty(&mut stdout, &report)?;
                writeln!(stdout)?;
            } else {
                demo::write_report(&report, &mut stdout)?;
            }
            if !report.passed() {
                stdout.flush()?;
                tracing::error!("stress verification failed");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
