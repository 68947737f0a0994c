//! Federate entry point: CLI wiring and config-driven loop construction.

use std::path::Path;
use std::process;
use std::time::Instant;

use pv_federate::bus::ScriptedBus;
use pv_federate::config::FederateConfig;
use pv_federate::driver::FederateDriver;
use pv_federate::io::export::export_zip;
use pv_federate::model::{InverterModel, LclFilter, ReferenceInverter};

use tracing::info;

/// Parsed CLI arguments.
struct CliArgs {
    config_path: String,
    out_path: String,
}

fn print_help() {
    eprintln!("pv-federate — single-federate PV inverter co-simulation driver");
    eprintln!();
    eprintln!("Usage: pv-federate [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>   Federate JSON configuration (default: federate.json)");
    eprintln!("  --out <path>      Output archive path (default: basecase.zip)");
    eprintln!("  --help            Show this help message");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: "federate.json".to_string(),
        out_path: "basecase.zip".to_string(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --config requires a path argument");
                    process::exit(1);
                }
                cli.config_path = args[i].clone();
            }
            "--out" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --out requires a path argument");
                    process::exit(1);
                }
                cli.out_path = args[i].clone();
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = parse_args();
    let started = Instant::now();

    let config = match FederateConfig::from_json_file(Path::new(&cli.config_path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let mut model = ReferenceInverter::new();
    model.configure(&config.application.model_params);
    model.set_lcl_filter(LclFilter::from_config(&config.application));
    if let Err(e) = model.start() {
        eprintln!("{e}");
        process::exit(1);
    }

    let bus = ScriptedBus::from_config(&config);
    let mut driver = FederateDriver::new(bus, model, config.application.tmax);
    let outcome = driver.run();

    // Best-effort salvage: export whatever was recorded, even after a
    // failed run.
    if let Err(e) = export_zip(driver.rows(), Path::new(&cli.out_path)) {
        eprintln!("{e}");
        process::exit(1);
    }
    info!(rows = driver.rows().len(), out = %cli.out_path, "rows exported");

    match outcome {
        Ok(()) => {
            info!(
                final_time = driver.time(),
                elapsed_s = started.elapsed().as_secs_f64(),
                "run complete"
            );
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
