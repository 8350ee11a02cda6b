//! # footfall CLI
//!
//! Headless host for the tracker.
//!
//! ## Usage
//! ```bash
//! # Record an event with properties (values are parsed as JSON when possible)
//! footfall track signup --prop plan=pro --prop seats=3
//!
//! # Record a page view for a location
//! footfall view --location https://shop.example.com/pricing
//!
//! # Deliver events left behind by earlier runs
//! footfall replay
//!
//! # Show identity and queue state
//! footfall status
//!
//! # Forget visit, visitor and queued events
//! footfall reset
//!
//! # Toggle verbose lifecycle logging
//! footfall debug on
//!
//! # Print the effective configuration (optionally writing it to disk)
//! footfall config --save
//! ```
//!
//! Common options: `--config <PATH>`, `--db <PATH>`, `--url <PREFIX>`,
//! `--location <URL>`, `--wait <SECS>`.

use serde_json::Value;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use footfall_agent::{
    init_tracing, HostEnvironment, HttpTransport, Properties, StaticHost, TrackerBuilder,
    TrackerConfig, TrackerHandle,
};
use footfall_db::{Database, DbConfig};

/// Location reported when `--location` is not given.
const DEFAULT_LOCATION: &str = "app://footfall/cli";

#[derive(Debug, Default)]
struct Options {
    command: String,
    arguments: Vec<String>,
    properties: Properties,
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    url_prefix: Option<String>,
    location: Option<String>,
    wait: Option<u64>,
    save: bool,
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--prop" | "-p" => {
                if let Some((key, raw)) = value.as_deref().and_then(|kv| kv.split_once('=')) {
                    options.properties.insert(key.to_string(), parse_value(raw));
                }
                i += 1;
            }
            "--config" | "-c" => {
                options.config_path = value.map(PathBuf::from);
                i += 1;
            }
            "--db" | "-d" => {
                options.db_path = value.map(PathBuf::from);
                i += 1;
            }
            "--url" | "-u" => {
                options.url_prefix = value;
                i += 1;
            }
            "--location" | "-l" => {
                options.location = value;
                i += 1;
            }
            "--wait" | "-w" => {
                options.wait = value.and_then(|v| v.parse().ok());
                i += 1;
            }
            "--save" => options.save = true,
            "--help" | "-h" => options.command = "help".into(),
            other if options.command.is_empty() => options.command = other.to_string(),
            other => options.arguments.push(other.to_string()),
        }
        i += 1;
    }

    if options.command.is_empty() {
        options.command = "help".into();
    }
    options
}

/// JSON if it parses, otherwise the raw string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Rejects usage errors before anything is opened. Returns whether the
/// command delivers events.
fn check_command(options: &Options) -> Result<bool, String> {
    match options.command.as_str() {
        "track" if options.arguments.is_empty() => Err("track needs an event name".into()),
        "track" | "view" | "replay" => Ok(true),
        "status" | "reset" | "debug" | "config" => Ok(false),
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn print_help() {
    println!("footfall - headless telemetry tracker");
    println!();
    println!("Usage: footfall <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  track <NAME>...    Record one event per name");
    println!("  view               Record a page view for --location");
    println!("  replay             Deliver events left by earlier runs");
    println!("  status             Show identity and queue state");
    println!("  reset              Forget visit, visitor and queued events");
    println!("  debug <on|off>     Toggle verbose lifecycle logging");
    println!("  config             Print the effective configuration");
    println!();
    println!("Options:");
    println!("  -p, --prop <K=V>       Event property (repeatable)");
    println!("  -c, --config <PATH>    Config file (default: platform config dir)");
    println!("  -d, --db <PATH>        SQLite file (default: platform data dir)");
    println!("  -u, --url <PREFIX>     Collector URL prefix");
    println!("  -l, --location <URL>   Current location reported to the collector");
    println!("  -w, --wait <SECS>      Longest wait for delivery (default: timeout + 2s)");
    println!("      --save             With `config`: write the file");
    println!("  -h, --help             Show this help message");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args);

    if options.command == "help" {
        print_help();
        return Ok(());
    }
    let delivering = match check_command(&options) {
        Ok(delivering) => delivering,
        Err(e) => {
            print_help();
            return Err(e.into());
        }
    };

    let mut config = TrackerConfig::load(options.config_path.clone())?;
    if let Some(prefix) = &options.url_prefix {
        config.endpoint.url_prefix = prefix.clone();
    }
    if let Some(path) = &options.db_path {
        config.storage.database_path = Some(path.clone());
    }
    config.validate()?;

    if options.command == "config" {
        print!("{}", toml::to_string_pretty(&config)?);
        if options.save {
            config.save(options.config_path.clone())?;
        }
        return Ok(());
    }

    // Only the delivering commands establish a visit and replay the queue.
    if !delivering {
        config.tracking.start_on_ready = false;
    }

    let location = options
        .location
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

    let host = StaticHost::new(location);
    let mut transport = HttpTransport::from_config(&config)?.without_beacon();
    if let Some(origin) = host.origin() {
        transport = transport.with_origin(&origin)?;
    } else if delivering && config.endpoint.url_prefix.is_empty() {
        return Err("No collector to reach: pass --url or an http(s) --location".into());
    }

    let db = open_database(&config).await?;
    let purged = db.entries().purge_expired().await?;
    if purged > 0 {
        info!(purged, "Removed expired entries");
    }

    let wait = options
        .wait
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.request_timeout() + config.debounce() + Duration::from_secs(1));

    let tracker = TrackerBuilder::new(config)
        .with_storage(Arc::new(db.clone()))
        .with_transport(Arc::new(transport))
        .with_host(Arc::new(host))
        .spawn()?;

    match options.command.as_str() {
        "track" => {
            for name in &options.arguments {
                tracker.track(name.clone(), options.properties.clone());
            }
            drain(&tracker, wait).await?;
        }
        "view" => {
            let extra = (!options.properties.is_empty()).then(|| options.properties.clone());
            tracker.track_view(extra);
            drain(&tracker, wait).await?;
        }
        "replay" => drain(&tracker, wait).await?,
        "status" => {
            let status = tracker.status().await?;
            println!("Visit:          {}", tracker.visit_id().await.unwrap_or_else(|| "-".into()));
            println!("Visitor:        {}", tracker.visitor_id().await.unwrap_or_else(|| "-".into()));
            println!("Session:        {}", status.session_state);
            println!("Pending events: {}", status.pending_count);
            println!("Debug:          {}", status.debug);
            println!("Stored entries: {}", db.entries().count().await?);
        }
        "reset" => {
            tracker.reset().await;
            println!("Identity reset");
        }
        "debug" => {
            let enabled = !matches!(
                options.arguments.first().map(String::as_str),
                Some("off" | "false" | "0")
            );
            tracker.debug(enabled).await;
            println!("Debug mode {}", if enabled { "on" } else { "off" });
        }
        _ => {}
    }

    tracker.shutdown();
    db.close().await;
    Ok(())
}

async fn open_database(config: &TrackerConfig) -> Result<Database, Box<dyn std::error::Error>> {
    let path = config
        .database_path()
        .ok_or("No database path available; pass --db")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(Database::new(DbConfig::new(path)).await?)
}

/// Waits until the tracker has no unacknowledged events, or `wait` passes.
async fn drain(tracker: &TrackerHandle, wait: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let deadline = tokio::time::Instant::now() + wait;

    // Events enter the outbox only after the session is ready.
    tokio::time::sleep(Duration::from_millis(100)).await;

    loop {
        let status = tracker.status().await?;
        if status.ready && status.pending_count == 0 {
            println!("All events delivered");
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(pending = status.pending_count, ready = status.ready, "Delivery incomplete");
            println!(
                "{} event(s) kept for the next run",
                status.pending_count
            );
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
