use std::fs;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use acp_times::{
    compute_schedule, control_times, parse_start_time, to_iso, Band, BrevetDistance, BrevetPlan,
    ControlTimes, Schedule, RATE_TABLE,
};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_START: &str = "2017-01-01T00:00:00+00:00";

#[derive(Parser, Debug)]
#[command(author, version, about = "ACP brevet control time calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open and close times of a single control
    Times(TimesArgs),
    /// Full control schedule for one or more brevet plan files
    Schedule(ScheduleArgs),
    /// Print the ACP rate table and controle limits
    Table(TableArgs),
}

#[derive(Parser, Debug)]
struct TimesArgs {
    /// Control distance from the start (km)
    #[arg(long, default_value_t = 0.0)]
    km: f64,

    /// Nominal brevet distance (200, 300, 400, 600 or 1000 km)
    #[arg(long)]
    brevet: u32,

    /// Brevet start time (ISO-8601)
    #[arg(long, default_value = DEFAULT_START)]
    start: String,

    /// Report both times in UTC
    #[arg(long, action = ArgAction::SetTrue)]
    utc: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct ScheduleArgs {
    /// Brevet plan JSON files
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    plans: Vec<PathBuf>,

    /// Output path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Write JSON instead of CSV
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Report all times in UTC
    #[arg(long, action = ArgAction::SetTrue)]
    utc: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct TableArgs {
    /// Write JSON instead of a text table
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Serialize, Debug)]
struct TimesResponse {
    result: ControlTimes,
}

#[derive(Serialize, Debug)]
struct BrevetLimit {
    brevet_km: u32,
    limit_km: u32,
}

#[derive(Serialize, Debug)]
struct RateTable {
    bands: &'static [Band],
    limits: Vec<BrevetLimit>,
}

impl RateTable {
    fn current() -> Self {
        Self {
            bands: &RATE_TABLE,
            limits: BrevetDistance::ALL
                .iter()
                .map(|brevet| BrevetLimit {
                    brevet_km: brevet.km(),
                    limit_km: brevet.controle_limit_km(),
                })
                .collect(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Times(args) => args.verbose,
        Command::Schedule(args) => args.verbose,
        Command::Table(_) => false,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Times(args) => handle_times(args),
        Command::Schedule(args) => handle_schedule(args),
        Command::Table(args) => handle_table(args, io::stdout().lock()),
    }
}

fn handle_times(args: TimesArgs) -> Result<()> {
    debug!(
        "control {} km on a {} km brevet starting {}",
        args.km, args.brevet, args.start
    );
    let start = parse_start_time(&args.start)?;
    let times = control_times(args.km, args.brevet, start).map_err(|err| {
        warn!("rejected control {} km: {}", args.km, err);
        err
    })?;
    let result = if args.utc { times.to_utc() } else { times };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer(&mut handle, &TimesResponse { result })?;
    writeln!(handle)?;
    Ok(())
}

fn handle_schedule(args: ScheduleArgs) -> Result<()> {
    let schedules = args
        .plans
        .par_iter()
        .map(|path| load_schedule(path))
        .collect::<Result<Vec<_>>>()?;
    let schedules: Vec<Schedule> = if args.utc {
        schedules.iter().map(Schedule::to_utc).collect()
    } else {
        schedules
    };

    let rows: usize = schedules.iter().map(|s| s.rows.len()).sum();
    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        write_schedules(&schedules, args.json, stdout.lock())?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        write_schedules(&schedules, args.json, file)?;
        info!(
            "Wrote schedule: {} ({} plans, {} controls)",
            args.output.display(),
            schedules.len(),
            rows
        );
    }
    Ok(())
}

fn load_schedule(path: &Path) -> Result<Schedule> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let plan = BrevetPlan::from_json(&text)
        .with_context(|| format!("{} is not a valid brevet plan", path.display()))?;
    debug!(
        "{}: {} km brevet, {} controls",
        path.display(),
        plan.brevet_km,
        plan.controls_km.len()
    );
    compute_schedule(&plan).with_context(|| format!("failed to schedule {}", path.display()))
}

fn write_schedules<W: Write>(schedules: &[Schedule], json: bool, mut out: W) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut out, schedules)?;
        writeln!(out)?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_writer(out);
    write_schedule_rows(schedules, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn write_schedule_rows<W: Write>(schedules: &[Schedule], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["plan", "brevet_km", "controle_km", "timed_km", "open", "close"])?;
    for schedule in schedules {
        let name = schedule.name.as_deref().unwrap_or("");
        for row in &schedule.rows {
            writer.write_record([
                name.to_string(),
                schedule.brevet_km.to_string(),
                row.controle_km.to_string(),
                row.timed_km.to_string(),
                to_iso(&row.open),
                to_iso(&row.close),
            ])?;
        }
    }
    Ok(())
}

fn handle_table<W: Write>(args: TableArgs, mut out: W) -> Result<()> {
    let table = RateTable::current();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &table)?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(out, "{:>8} {:>8} {:>10} {:>10}", "from_km", "to_km", "min_kmh", "max_kmh")?;
    for band in table.bands {
        writeln!(
            out,
            "{:>8} {:>8} {:>10} {:>10}",
            band.start_km, band.end_km, band.min_speed_kmh, band.max_speed_kmh
        )?;
    }
    writeln!(out)?;
    writeln!(out, "{:>8} {:>12}", "brevet", "limit_km")?;
    for limit in &table.limits {
        writeln!(out, "{:>8} {:>12}", limit.brevet_km, limit.limit_km)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schedule() -> Schedule {
        let plan = BrevetPlan {
            name: Some("Spring 200".into()),
            brevet_km: 200,
            start: DEFAULT_START.into(),
            controls_km: vec![0.0, 60.5, 210.0],
        };
        compute_schedule(&plan).unwrap()
    }

    #[test]
    fn test_csv_keeps_full_distance_precision() {
        let plan = BrevetPlan {
            name: None,
            brevet_km: 200,
            start: DEFAULT_START.into(),
            controls_km: vec![60.12345, 199.9999, 0.0001],
        };
        let mut buf = Vec::new();
        write_schedules(&[compute_schedule(&plan).unwrap()], false, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].starts_with(",200,60.12345,60.12345,"));
        assert!(lines[2].starts_with(",200,199.9999,199.9999,"));
        assert!(lines[3].starts_with(",200,0.0001,0.0001,"));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        let command = Cli::command();
        command.clone().debug_assert();
        assert_eq!(command.get_version(), Some(env!("CARGO_PKG_VERSION")));
        let cli = Cli::try_parse_from(["acp_times", "table", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Table(TableArgs { json: true })));
    }

    #[test]
    fn test_table_json() {
        let mut buf = Vec::new();
        handle_table(TableArgs { json: true }, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["bands"].as_array().unwrap().len(), 4);
        assert_eq!(value["bands"][3]["min_speed_kmh"], 11.428);
        assert_eq!(value["bands"][3]["end_km"], 1000.0);
        assert_eq!(value["limits"][4]["brevet_km"], 1000);
        assert_eq!(value["limits"][4]["limit_km"], 1200);
    }

    #[test]
    fn test_table_text() {
        let mut buf = Vec::new();
        handle_table(TableArgs { json: false }, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("11.428"));
        assert!(text.lines().any(|line| line.split_whitespace().eq(["200", "240"])));
    }

    #[test]
    fn test_csv_output() {
        let mut buf = Vec::new();
        write_schedules(&[sample_schedule()], false, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "plan,brevet_km,controle_km,timed_km,open,close");
        assert_eq!(
            lines[1],
            "Spring 200,200,0,0,2017-01-01T00:00:00+00:00,2017-01-01T01:00:00+00:00"
        );
        assert_eq!(
            lines[3],
            "Spring 200,200,210,200,2017-01-01T05:52:56.470588+00:00,2017-01-01T13:30:00+00:00"
        );
    }

    #[test]
    fn test_json_output() {
        let mut buf = Vec::new();
        write_schedules(&[sample_schedule()], true, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["name"], "Spring 200");
        assert_eq!(value[0]["rows"][2]["close"], "2017-01-01T13:30:00+00:00");
    }

    #[test]
    fn test_times_response_shape() {
        let start = parse_start_time(DEFAULT_START).unwrap();
        let result = control_times(0.0, 300, start).unwrap();
        let value = serde_json::to_value(TimesResponse { result }).unwrap();
        assert_eq!(value["result"]["open"], "2017-01-01T00:00:00+00:00");
        assert_eq!(value["result"]["close"], "2017-01-01T01:00:00+00:00");
    }

    #[test]
    fn test_load_schedule_reports_path() {
        let err = load_schedule(Path::new("does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
