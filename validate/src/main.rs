//! Replay a transcript through the visual-state engine
//!
//! Each transcript line is one assistant turn. Lines are streamed in fixed
//! size chunks on a simulated clock, and every signal the engine produces is
//! printed, so definition files can be checked without a chat frontend.

use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeDelta};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tableau_core::config::{default_builtin_dir, load_file};
use tableau_core::{EngineSettings, EngineSignal, GenerationId, Session, load_definitions};
use tableau_types::DefinitionConfig;

#[derive(Parser)]
#[command(version, about = "Replay a transcript against trigger definitions")]
struct Args {
    /// Definition file or directory of TOML files (defaults to the builtin
    /// and custom definition directories)
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Transcript file, one assistant turn per line
    #[arg(short, long)]
    transcript: PathBuf,

    /// Characters per streamed delta
    #[arg(long, default_value_t = 8)]
    chunk: usize,

    /// Simulated time between deltas
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Simulated time between turns
    #[arg(long, default_value_t = 2_000)]
    turn_gap_ms: u64,

    /// Engine settings file (defaults to the user settings file)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print signals as JSON lines
    #[arg(long)]
    json: bool,
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    // If TABLEAU_LOG_PATH is set, append to that file
    if let Ok(path) = std::env::var("TABLEAU_LOG_PATH")
        && let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(file)
            .init();
        return;
    }

    // Fallback to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), String> {
    init_logging();
    let args = Args::parse();

    let settings = load_settings(args.settings.as_deref())?;
    let config = load_config(args.definitions.as_deref(), &settings)?;
    let transcript = read_transcript(&args.transcript)?;

    let mut session = Session::new(&config, &settings);
    let start = chrono::Local::now().naive_local();
    let mut printer = Printer {
        start,
        json: args.json,
        fired: 0,
        returned: 0,
        warnings: 0,
    };

    printer.print_all(&session.config_warnings(), start)?;

    let interval = millis(args.interval_ms);
    let turn_gap = millis(args.turn_gap_ms);
    let mut now = start;

    for (turn, line) in transcript.iter().enumerate() {
        let generation = GenerationId(turn as u64 + 1);
        tracing::debug!(%generation, chars = line.chars().count(), "replaying turn");

        session.begin_turn(generation);
        for delta in chunks(line, args.chunk) {
            now += interval;
            let signals = session
                .push_delta(generation, &delta, now)
                .map_err(|e| e.to_string())?;
            printer.print_all(&signals, now)?;
        }
        session.end_turn(generation).map_err(|e| e.to_string())?;

        let gap_end = now + turn_gap;
        drain_returns(&mut session, &mut printer, Some(gap_end))?;
        now = gap_end;
    }

    drain_returns(&mut session, &mut printer, None)?;

    if !args.json {
        println!(
            "{} turns, {} triggers fired, {} returns, {} warnings",
            transcript.len(),
            printer.fired,
            printer.returned,
            printer.warnings
        );
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<EngineSettings, String> {
    match path {
        Some(path) => EngineSettings::load_path(path).map_err(|e| e.to_string()),
        None => {
            if let Ok(path) = EngineSettings::path() {
                tracing::debug!(path = %path.display(), "using user settings");
            }
            EngineSettings::load().map_err(|e| e.to_string())
        }
    }
}

/// Definitions from a file, a directory, or the configured directories
fn load_config(path: Option<&Path>, settings: &EngineSettings) -> Result<DefinitionConfig, String> {
    let set = match path {
        Some(file) if file.is_file() => return load_file(file).map_err(|e| e.to_string()),
        Some(dir) => load_definitions(None, Some(dir)),
        None => {
            let builtin = default_builtin_dir();
            let custom = settings.custom_definitions_dir();
            tracing::debug!(?builtin, ?custom, "loading definition directories");
            load_definitions(builtin.as_deref(), custom.as_deref())
        }
    }
    .map_err(|e| e.to_string())?;

    if set.is_empty() {
        tracing::warn!("no definitions loaded");
    }
    Ok(set.into_config())
}

fn read_transcript(path: &Path) -> Result<Vec<String>, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    Ok(contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Fire pending returns in deadline order, up to `until` (None = all)
fn drain_returns(
    session: &mut Session,
    printer: &mut Printer,
    until: Option<NaiveDateTime>,
) -> Result<(), String> {
    while let Some(ticket) = session.next_return() {
        if until.is_some_and(|limit| ticket.deadline > limit) {
            break;
        }
        let signals = session.fire_return(ticket, ticket.deadline);
        printer.print_all(&signals, ticket.deadline)?;
    }
    Ok(())
}

/// Split a line into deltas of `size` characters (0 = whole line)
fn chunks(line: &str, size: usize) -> Vec<String> {
    if size == 0 {
        return vec![line.to_string()];
    }
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn millis(ms: u64) -> TimeDelta {
    TimeDelta::try_milliseconds(i64::try_from(ms).unwrap_or(i64::MAX)).unwrap_or(TimeDelta::MAX)
}

struct Printer {
    start: NaiveDateTime,
    json: bool,
    fired: usize,
    returned: usize,
    warnings: usize,
}

impl Printer {
    fn print_all(&mut self, signals: &[EngineSignal], now: NaiveDateTime) -> Result<(), String> {
        for signal in signals {
            match signal {
                EngineSignal::TriggerFired { .. } => self.fired += 1,
                EngineSignal::ReturnedToDefault { .. } => self.returned += 1,
                EngineSignal::ConfigWarning { .. } => self.warnings += 1,
                EngineSignal::AssetChanged { .. } => {}
            }

            if self.json {
                let line = serde_json::to_string(signal).map_err(|e| e.to_string())?;
                println!("{line}");
            } else {
                let offset = (now - self.start).num_milliseconds();
                println!("[+{offset:>7}ms] {:<10} {}", signal.target(), describe(signal));
            }
        }
        Ok(())
    }
}

fn describe(signal: &EngineSignal) -> String {
    match signal {
        EngineSignal::TriggerFired {
            definition_id,
            item_id,
            matched_keywords,
            matched_keys,
            asset,
            ..
        } => {
            let source = match item_id {
                Some(item) => format!("{definition_id}/{item}"),
                None => definition_id.clone(),
            };
            let mut text = format!("fired    {source} -> {asset} [{}]", matched_keywords.join(", "));
            if !matched_keys.is_empty() {
                text.push_str(&format!(" keys [{}]", matched_keys.join(", ")));
            }
            text
        }
        EngineSignal::AssetChanged {
            asset,
            source_definition_id,
            ..
        } => format!(
            "asset    {} ({})",
            asset.as_ref().map_or("<none>".to_string(), ToString::to_string),
            source_definition_id.as_deref().unwrap_or("default")
        ),
        EngineSignal::ReturnedToDefault {
            from_definition_id, ..
        } => format!("return   from {from_definition_id}"),
        EngineSignal::ConfigWarning {
            definition_id,
            message,
            ..
        } => format!(
            "warning  {}: {message}",
            definition_id.as_deref().unwrap_or("-")
        ),
    }
}
