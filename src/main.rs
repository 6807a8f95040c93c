use clap::{Args, Parser, Subcommand, ValueEnum};
use pacer::{
    announce::Announcer,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    geo::format_pace,
    logging,
    route_io::{read_route_file, summary_to_json, write_summary_file},
    runtime::TrackingEvent,
    session::{Session, SessionState},
    source::{
        synthetic_route, CsvPositioningService, DeviceProvider, ReplayProvider, SampleSource,
        SyntheticRoute, TrackingOptions,
    },
    speech::{CommandSpeech, ConsoleSpeech, SpeechSink},
    store::ActivityDb,
    summary::{ActivitySummary, SportType},
    util::format_clock,
};
use std::{error::Error, io, path::PathBuf};
use tracing::{info, warn};

/// record gps activities with live pace and spoken progress
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Records running, walking, cycling and hiking activities from a positioning \
                  feed or a recorded route, with pause-aware timing, spoken distance milestones \
                  and a local activity history."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// log filter used when RUST_LOG is unset (overrides the config file)
    #[clap(long, global = true)]
    log_level: Option<String>,

    /// activity database to use instead of the default location
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// replay a recorded route (.csv or .json) through a live session
    Replay {
        file: PathBuf,
        #[clap(flatten)]
        run: RunArgs,
    },
    /// replay a seeded synthetic route
    Simulate {
        /// number of fixes to generate
        #[clap(long, default_value_t = 600)]
        points: usize,
        #[clap(long, default_value_t = 42)]
        seed: u64,
        #[clap(flatten)]
        run: RunArgs,
    },
    /// record from csv fixes on stdin until end of input
    Record {
        #[clap(flatten)]
        run: RunArgs,
    },
    /// list saved activities
    History,
    /// print one saved activity
    Show {
        id: i64,
        #[clap(long)]
        json: bool,
    },
    /// write a saved activity to FILE (.json summary or .csv route)
    Export { id: i64, file: PathBuf },
    /// remove a saved activity
    Delete { id: i64 },
    /// print the effective configuration
    Config {
        /// overwrite the config file with defaults
        #[clap(long)]
        reset: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// sport to record (defaults to the configured sport)
    #[clap(long, value_enum)]
    sport: Option<SportType>,

    /// minimum milliseconds between fixes; the emit period when replaying
    #[clap(long)]
    interval_ms: Option<u64>,

    /// where spoken announcements go
    #[clap(long, value_enum, default_value_t = SpeechMode::Console)]
    speech: SpeechMode,

    /// do not store the finished activity
    #[clap(long)]
    no_save: bool,

    /// print the summary as json; console announcements are muted
    #[clap(long)]
    json: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
enum SpeechMode {
    Console,
    Command,
    Off,
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("pacer_activities.db"))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = cli.config_store();
    let config = store.load();
    logging::init(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match &cli.command {
        Command::Replay { file, run } => {
            let route = read_route_file(file)?;
            info!(file = %file.display(), samples = route.len(), "replaying route");
            let interval_ms = run.interval_ms.unwrap_or(config.replay_interval_ms);
            let source = SampleSource::new(ReplayProvider::new(route));
            record(&cli, &config, run, source, replay_options(interval_ms))
        }
        Command::Simulate { points, seed, run } => {
            let interval_ms = run.interval_ms.unwrap_or(config.replay_interval_ms);
            let route = synthetic_route(&SyntheticRoute {
                points: *points,
                seed: *seed,
                ..SyntheticRoute::default()
            });
            let source = SampleSource::new(ReplayProvider::new(route));
            record(&cli, &config, run, source, replay_options(interval_ms))
        }
        Command::Record { run } => {
            let mut tracking = config.tracking;
            if let Some(interval_ms) = run.interval_ms {
                tracking.interval_ms = interval_ms;
            }
            let service = CsvPositioningService::new(io::stdin());
            let source = SampleSource::new(DeviceProvider::new(service));
            record(&cli, &config, run, source, tracking)
        }
        Command::History => history(&cli),
        Command::Show { id, json } => {
            let summary = ActivityDb::open(cli.db_path())?.load_summary(*id)?;
            if *json {
                println!("{}", summary_to_json(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(())
        }
        Command::Export { id, file } => {
            let summary = ActivityDb::open(cli.db_path())?.load_summary(*id)?;
            write_summary_file(file, &summary)?;
            println!("exported activity #{id} to {}", file.display());
            Ok(())
        }
        Command::Delete { id } => {
            ActivityDb::open(cli.db_path())?.delete_activity(*id)?;
            println!("deleted activity #{id}");
            Ok(())
        }
        Command::Config { reset } => {
            let config = if *reset {
                let config = Config::default();
                store.save(&config)?;
                config
            } else {
                config
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
            eprintln!("config file: {}", store.path().display());
            Ok(())
        }
    }
}

/// Replays keep every sample; only the emit period comes from the caller
fn replay_options(interval_ms: u64) -> TrackingOptions {
    TrackingOptions {
        interval_ms,
        min_distance_m: 0.0,
    }
}

fn speech_sink(mode: SpeechMode, json: bool, config: &Config) -> Option<Box<dyn SpeechSink>> {
    match mode {
        SpeechMode::Off => None,
        SpeechMode::Console if json => None,
        SpeechMode::Console => Some(Box::new(ConsoleSpeech)),
        SpeechMode::Command => {
            match config
                .speech_command
                .as_deref()
                .and_then(CommandSpeech::from_command_line)
            {
                Some(speech) => Some(Box::new(speech)),
                None => {
                    warn!("no speech_command configured; announcements are muted");
                    None
                }
            }
        }
    }
}

fn record(
    cli: &Cli,
    config: &Config,
    run: &RunArgs,
    source: SampleSource,
    tracking: TrackingOptions,
) -> Result<(), Box<dyn Error>> {
    let announcer = Announcer::new(
        config.announcement.clone(),
        speech_sink(run.speech, run.json, config),
    );
    let session_config = pacer::session::SessionConfig {
        tracking,
        ..config.session_config()
    };
    let mut session = Session::new(source, announcer, session_config);

    session.start(run.sport.unwrap_or(config.sport))?;
    let mut last_shown = None;
    while session.state() == SessionState::Tracking {
        if session.step() == TrackingEvent::Tick && session.is_source_exhausted() {
            break;
        }
        let snapshot = session.display();
        if !run.json && last_shown != Some(snapshot.elapsed_seconds) {
            last_shown = Some(snapshot.elapsed_seconds);
            eprintln!(
                "{:>8}  {:>7.2} km  {}/km  {} fixes",
                format_clock(snapshot.elapsed_seconds),
                snapshot.distance_meters / 1000.0,
                snapshot.pace_display,
                snapshot.sample_count,
            );
        }
    }

    let summary = session.stop()?.clone();
    session.announcer().stop_speaking();

    if run.json {
        println!("{}", summary_to_json(&summary)?);
    } else {
        print_summary(&summary);
    }

    if !run.no_save {
        let id = ActivityDb::open(cli.db_path())?.save_summary(&summary)?;
        eprintln!("saved activity #{id}");
    }
    Ok(())
}

fn history(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let records = ActivityDb::open(cli.db_path())?.list_activities()?;
    if records.is_empty() {
        println!("no activities recorded yet");
        return Ok(());
    }

    println!(
        "{:>5}  {:<8}  {:<16}  {:>8}  {:>8}  {:>6}",
        "id", "sport", "started", "time", "km", "pace"
    );
    for r in records {
        println!(
            "{:>5}  {:<8}  {:<16}  {:>8}  {:>8.2}  {:>6}",
            r.id,
            r.sport_type.to_string(),
            r.start_time.format("%Y-%m-%d %H:%M").to_string(),
            format_clock(r.duration_seconds),
            r.distance_meters / 1000.0,
            format_pace(r.avg_pace.unwrap_or(0.0)),
        );
    }
    Ok(())
}

fn print_summary(summary: &ActivitySummary) {
    println!("{} on {}", summary.sport_type, summary.start_time.format("%Y-%m-%d %H:%M UTC"));
    println!("  time      {}", format_clock(summary.duration_seconds));
    println!("  distance  {:.2} km", summary.distance_km());
    println!(
        "  avg pace  {}/km",
        format_pace(summary.avg_pace.unwrap_or(0.0))
    );
    println!("  fixes     {}", summary.sample_count);
    if let Some(gain) = summary.elevation_gain_m {
        println!("  climb     {gain:.0} m");
    }
    if let Some(accuracy) = summary.gps_quality.mean_accuracy_m {
        println!("  accuracy  {accuracy:.1} m");
    }
    if !summary.segment_starts.is_empty() {
        println!("  pauses    {}", summary.segment_starts.len());
    }
    for split in &summary.splits {
        println!(
            "  km {:>3}   {:>6.0} m  {}  {}/km",
            split.index,
            split.distance_meters,
            format_clock(split.duration_seconds.round() as u64),
            format_pace(split.pace_seconds_per_km),
        );
    }
}
