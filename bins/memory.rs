use std::process::ExitCode;

use dotenvy::dotenv;
use service::Memory;
use tracing::{error, info};
use uuid::Uuid;

const USAGE: &str = "usage: memory <put KEY JSON | get KEY | list | delete KEY | clear | mode>";

fn init_logging() {
    // load .env first so RUST_LOG, REDIS_HOST and friends take effect
    dotenv().ok();
    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        common::utils::logging::init_logging_json();
    } else {
        common::utils::logging::init_logging_default();
    }
    info!(service = "memory", event = "logger_init", "tracing subscriber initialized");
}

#[derive(Debug, PartialEq)]
enum Command {
    Put { key: String, value: serde_json::Value },
    Get { key: String },
    List,
    Delete { key: String },
    Clear,
    Mode,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let argv: Vec<&str> = args.iter().map(String::as_str).collect();
    match argv.as_slice() {
        ["put", key, raw] => {
            let value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON value: {e}"))?;
            Ok(Command::Put { key: key.to_string(), value })
        }
        ["get", key] => Ok(Command::Get { key: key.to_string() }),
        ["list"] => Ok(Command::List),
        ["delete", key] => Ok(Command::Delete { key: key.to_string() }),
        ["clear"] => Ok(Command::Clear),
        ["mode"] => Ok(Command::Mode),
        _ => Err(USAGE.to_string()),
    }
}

/// Runs one command; returns whether it succeeded.
async fn execute(memory: &Memory, command: Command) -> bool {
    match command {
        Command::Put { key, value } => {
            let ok = memory.put(&key, &value).await;
            println!("{}", serde_json::json!({ "status": if ok { "stored" } else { "failed" }, "id": key }));
            ok
        }
        Command::Get { key } => match memory.get(&key).await {
            Some(data) => {
                println!("{}", serde_json::json!({ "id": key, "data": data }));
                true
            }
            None => {
                println!("{}", serde_json::json!({ "detail": format!("Memory ID '{key}' not found") }));
                false
            }
        },
        Command::List => {
            let ids = memory.list_ids().await;
            println!("{}", serde_json::json!({ "count": ids.len(), "ids": ids }));
            true
        }
        Command::Delete { key } => {
            let removed = memory.delete(&key).await;
            println!("{}", serde_json::json!({ "id": key, "deleted": removed }));
            removed
        }
        Command::Clear => {
            let ok = memory.clear_all().await;
            println!("{}", serde_json::json!({ "cleared": ok }));
            ok
        }
        Command::Mode => {
            println!("{}", serde_json::json!({ "mode": memory.mode(), "location": memory.describe() }));
            true
        }
    }
}

fn main() -> ExitCode {
    init_logging();

    let service_id = Uuid::new_v4();
    let pid = std::process::id();

    std::panic::set_hook(Box::new(move |info| {
        error!(service = "memory", event = "panic", %service_id, pid, message = %info, "unhandled panic occurred");
    }));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(2);
        }
    };

    let cfg = match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(service = "memory", event = "config_invalid", error = %e, "failed to load configuration");
            return ExitCode::from(2);
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "memory", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(async move {
        let memory = match Memory::open(&cfg.memory).await {
            Ok(m) => m,
            Err(e) => {
                error!(service = "memory", event = "open_failed", error = %e, "no usable storage backend");
                return ExitCode::FAILURE;
            }
        };
        info!(service = "memory", event = "ready", %service_id, mode = %memory.mode(), location = %memory.describe(), "memory store ready");

        if execute(&memory, command).await {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    })
}
