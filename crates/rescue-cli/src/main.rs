use std::env;
use std::path::PathBuf;

use contracts::AgentAction;
use rescue_api::{RescueSession, Scenario, SqliteBeliefStore};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_usage() {
    println!("rescue-cli <command>");
    println!("commands:");
    println!("  simulate <scenario.json> [ticks] [sqlite_path]");
    println!("    plays a scripted scenario and persists the learned belief to sqlite");
    println!("  belief [sqlite_path]");
    println!("    lists the stored belief of every known teammate");
    println!("  history <teammate> [limit] [sqlite_path]");
    println!("  reset <teammate> [sqlite_path]");
    println!("    forgets a teammate's belief and history");
    println!("env:");
    println!("  RESCUE_SQLITE_PATH  default sqlite path (rescue_beliefs.sqlite)");
    println!("  RUST_LOG            log filter (info)");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<Option<u64>, String> {
    value
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|_| format!("invalid {label}: {raw}"))
        })
        .transpose()
}

fn required<'a>(value: Option<&'a String>, label: &str) -> Result<&'a str, String> {
    value
        .map(String::as_str)
        .ok_or_else(|| format!("missing {label}"))
}

fn default_sqlite_path() -> String {
    std::env::var("RESCUE_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "rescue_beliefs.sqlite".to_string())
}

fn parse_sqlite_path(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path)
}

fn run_simulation(args: &[String]) -> Result<(), String> {
    let scenario_path = required(args.get(2), "scenario path")?;
    let ticks = parse_u64(args.get(3), "ticks")?;
    let sqlite_path = parse_sqlite_path(args.get(4));

    let scenario = Scenario::load(scenario_path)
        .map_err(|err| format!("failed to load {scenario_path}: {err}"))?;
    let mut session = RescueSession::from_scenario(&scenario)
        .map_err(|err| format!("invalid agent config: {err}"))?;
    session
        .attach_sqlite_store(PathBuf::from(&sqlite_path))
        .map_err(|err| format!("failed to attach sqlite store: {err}"))?;

    let outputs = session.run_scenario(&scenario, ticks);
    let mut carried = 0;
    for output in &outputs {
        debug!(%output, "tick");
        for content in output.status_messages() {
            println!("[{:>4}] {}: {}", output.tick, session.config().agent_name, content);
        }
        if matches!(output.action, Some(AgentAction::Drop { .. })) {
            carried += 1;
        }
    }

    if let Some(error) = session.last_persistence_error() {
        return Err(format!("persistence error after simulation: {error}"));
    }

    let status = session.status();
    println!(
        "simulated ticks={} phase={} drops={} competence={:.3} willingness={:.3} sqlite={}",
        status.ticks_run,
        status.phase,
        carried,
        status.belief.competence,
        status.belief.willingness,
        sqlite_path
    );
    Ok(())
}

fn show_beliefs(args: &[String]) -> Result<(), String> {
    let sqlite_path = parse_sqlite_path(args.get(2));
    let store = SqliteBeliefStore::open_read_only(&sqlite_path)
        .map_err(|err| format!("failed to open {sqlite_path}: {err}"))?;
    let beliefs = store
        .list_beliefs()
        .map_err(|err| format!("failed to read beliefs: {err}"))?;
    let rendered = serde_json::to_string_pretty(&beliefs)
        .map_err(|err| format!("failed to render beliefs: {err}"))?;
    println!("{rendered}");
    Ok(())
}

fn show_history(args: &[String]) -> Result<(), String> {
    let teammate = required(args.get(2), "teammate")?;
    let limit = parse_u64(args.get(3), "limit")?.map(|limit| limit as usize);
    let sqlite_path = parse_sqlite_path(args.get(4));
    let store = SqliteBeliefStore::open_read_only(&sqlite_path)
        .map_err(|err| format!("failed to open {sqlite_path}: {err}"))?;
    let history = store
        .load_history(teammate, limit)
        .map_err(|err| format!("failed to read history: {err}"))?;

    for record in &history {
        println!(
            "tick={} competence={:.3} willingness={:.3}",
            record.tick, record.competence, record.willingness
        );
    }
    println!("{} records for {teammate}", history.len());
    Ok(())
}

fn reset_teammate(args: &[String]) -> Result<(), String> {
    let teammate = required(args.get(2), "teammate")?;
    let sqlite_path = parse_sqlite_path(args.get(3));
    let mut store = SqliteBeliefStore::open(&sqlite_path)
        .map_err(|err| format!("failed to open {sqlite_path}: {err}"))?;
    let existed = store
        .delete_teammate(teammate)
        .map_err(|err| format!("failed to reset {teammate}: {err}"))?;
    if existed {
        println!("reset {teammate}");
    } else {
        println!("no stored belief for {teammate}");
    }
    Ok(())
}

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    let result = match command {
        Some("simulate") => run_simulation(&args),
        Some("belief") => show_beliefs(&args),
        Some("history") => show_history(&args),
        Some("reset") => reset_teammate(&args),
        _ => {
            print_usage();
            return;
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        print_usage();
        std::process::exit(2);
    }
}
