use anyhow::Result;
use clap::{Arg, Command};
use std::path::Path;

use triplog::core::trip::Trip;
use triplog::{init_logging, CancelToken, Recorder, TripOptions};

fn main() -> Result<()> {
    init_logging();

    let matches = Command::new("triplog")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Records sensor data for one trip at a time")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("record")
                .about("Record a new trip")
                .arg(
                    Arg::new("trips-dir")
                        .help("Directory under which trip directories are created")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("temporary")
                        .long("temporary")
                        .help("Remove the trip directory when recording ends")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Run all components but write no sensor output files")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("systeminfo")
                        .long("systeminfo")
                        .help("Enable the system telemetry sensor (default)")
                        .action(clap::ArgAction::SetTrue)
                        .overrides_with("no-systeminfo"),
                )
                .arg(
                    Arg::new("no-systeminfo")
                        .long("no-systeminfo")
                        .help("Disable the system telemetry sensor")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-healthmon")
                        .long("no-healthmon")
                        .help("Disable the disk-usage health monitor")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("display")
                        .long("display")
                        .help("Log periodic status summaries")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("disk-threshold")
                        .long("disk-threshold")
                        .value_name("PERCENT")
                        .help("Stop recording when disk usage exceeds this percentage")
                        .value_parser(clap::value_parser!(f64)),
                ),
        )
        .subcommand(
            Command::new("trips")
                .about("List recorded trips")
                .arg(
                    Arg::new("trips-dir")
                        .help("Directory containing trip directories")
                        .required(true)
                        .index(1),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("record", sub_matches)) => handle_record_command(sub_matches),
        Some(("trips", sub_matches)) => handle_trips_command(sub_matches),
        _ => unreachable!("subcommand is required"),
    }
}

fn options_from_args(matches: &clap::ArgMatches) -> TripOptions {
    let mut options = TripOptions::default();
    let dry_run = matches.get_flag("dry-run");

    options.sensors.systeminfo.active = !matches.get_flag("no-systeminfo");
    options.sensors.systeminfo.dry_run = dry_run;

    options.monitors.healthmon.active = !matches.get_flag("no-healthmon");
    options.monitors.healthmon.dry_run = dry_run;
    if let Some(threshold) = matches.get_one::<f64>("disk-threshold") {
        options.monitors.healthmon.disk_usage_threshold = *threshold;
    }

    options.monitors.display.active = matches.get_flag("display");

    options
}

fn handle_record_command(matches: &clap::ArgMatches) -> Result<()> {
    let trips_dir = matches.get_one::<String>("trips-dir").map(Path::new);
    let trips_dir = trips_dir.ok_or_else(|| anyhow::anyhow!("missing trips directory"))?;

    let options = options_from_args(matches);
    let trip = Trip::create(trips_dir, options)?.temporary(matches.get_flag("temporary"));
    log::info!("Recording trip at {}", trip.directory().display());

    let shutdown = CancelToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupt received, shutting down");
        handler_token.cancel();
    })?;

    let mut recorder = Recorder::new(trip);
    recorder.start(&shutdown)?;

    // Either ctrl-c or a monitor-initiated shutdown cancels the token.
    shutdown.wait();

    recorder.stop();
    Ok(())
}

fn handle_trips_command(matches: &clap::ArgMatches) -> Result<()> {
    let trips_dir = matches.get_one::<String>("trips-dir").map(Path::new);
    let trips_dir = trips_dir.ok_or_else(|| anyhow::anyhow!("missing trips directory"))?;

    let trips = Trip::list(trips_dir)?;
    if trips.is_empty() {
        println!("No trips found in {}", trips_dir.display());
        return Ok(());
    }

    for trip in trips {
        println!("{}", trip.display());
    }
    Ok(())
}
