//! Entry point for the rseries tool.
//! Parses the CLI, sets up logging and runs the aggregation against a NetCDF store.

use clap::Parser;
use rseries::cli::Args;
use rseries::netcdf_io::NetCdfStore;
use rseries::parallel::get_parallel_info;
use rseries::statistics::Method;
use rseries::{run_series, SeriesError};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(verbose: bool) {
    let default = if verbose { "rseries=debug" } else { "rseries=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_methods() {
    println!("Available methods:");
    for method in Method::all() {
        let kind = method.result_kind().cell_type().as_str();
        println!("   {:<12} {:<6} {}", method.name(), kind, method.description());
    }
}

fn run(args: &Args) -> Result<(), SeriesError> {
    let command = std::env::args().collect::<Vec<_>>().join(" ");
    let config = args.to_config(&command)?;

    let info = get_parallel_info();
    debug!(
        "{} worker threads available on {} cores",
        args.threads.unwrap_or(info.current_threads),
        info.available_cores
    );

    let store = NetCdfStore::with_variable(&args.store, &args.variable);
    let summary = run_series(&store, config)?;

    info!(
        "processed {} rows of {} inputs into {} output grids",
        summary.region.rows, summary.inputs, summary.outputs
    );
    println!(
        "✅ Wrote {} output grids ({} rows x {} columns) to {}",
        summary.outputs,
        summary.region.rows,
        summary.region.cols,
        store.root().display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_methods {
        print_methods();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(kind = ?e.kind(), "run aborted");
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
