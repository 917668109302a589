use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use flow_offline::cache::SqliteStorage;
use flow_offline::config::Config;
use flow_offline::messages::StatusMessage;
use flow_offline::net::{Destination, HttpClient, Request};
use flow_offline::worker::{Event, FetchOutcome, Outcome, Worker, PROCESS_OFFLINE_QUEUE_TAG};

#[derive(Parser, Debug)]
#[command(name = "flow-offline")]
#[command(about = "Offline cache and background sync controller for Flow")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/flow-offline/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Cache database (overrides the config file)
  #[arg(long, global = true)]
  database: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long, global = true)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Install (precache the manifest) and activate (evict old partitions)
  Start,
  /// Run a request through the router and its caching strategy
  Fetch {
    url: String,
    #[arg(long, default_value = "GET")]
    method: String,
    #[arg(long, default_value = "empty")]
    destination: Destination,
    #[arg(long)]
    accept: Option<String>,
    /// Print the response body
    #[arg(long)]
    body: bool,
  },
  /// Send a `{type, payload}` control message
  Message { json: String },
  /// Entry count per partition
  Status,
  /// Fire a background sync event
  Sync {
    #[arg(default_value = PROCESS_OFFLINE_QUEUE_TAG)]
    tag: String,
    #[arg(long, default_value_t = 0)]
    queue_length: usize,
  },
  /// Deliver a push message
  Push { payload: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing(args.log_file.as_deref())?;

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(database) = args.database {
    config.database = Some(database);
  }

  let storage = Arc::new(SqliteStorage::open(&config.database_path()?)?);
  let network = Arc::new(HttpClient::new()?);
  let worker = Worker::new(config, storage, network)?;

  // The CLI acts as one open page so it sees what the worker posts.
  let (client, mut inbox) = worker.clients().connect(worker.scope().as_str());

  let event = match args.command {
    Command::Start => {
      let installed = worker.dispatch(Event::Install).await?;
      print_outcome(&installed)?;
      Event::Activate
    }
    Command::Fetch {
      url,
      method,
      destination,
      accept,
      body,
    } => {
      let url = worker.scope().join(&url)?;
      let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| eyre!("Invalid method {}: {}", method, e))?;
      let mut request = Request::get(url)
        .with_method(method)
        .with_destination(destination);
      if let Some(accept) = accept {
        request = request.with_accept(accept);
      }

      let outcome = worker.dispatch(Event::Fetch(request)).await?;
      print_fetch(&outcome, body);
      // A stale hit leaves a refresh running; the runtime must outlive it.
      worker.cache().settle().await;
      return Ok(());
    }
    Command::Message { json } => Event::Message {
      data: serde_json::from_str(&json).map_err(|e| eyre!("Message is not valid JSON: {}", e))?,
      source: Some(client),
    },
    Command::Status => Event::Message {
      data: json!({ "type": "GET_CACHE_STATUS" }),
      source: Some(client),
    },
    Command::Sync { tag, queue_length } => Event::Sync { tag, queue_length },
    Command::Push { payload } => Event::Push {
      payload: payload.map(String::into_bytes),
    },
  };

  let outcome = worker.dispatch(event).await?;
  print_outcome(&outcome)?;
  drain(&mut inbox)?;
  worker.cache().settle().await;

  Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flow_offline=info"));

  match log_file {
    Some(path) => {
      let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| eyre!("Failed to open log file {}: {}", path.display(), e))?;
      let (writer, guard) = tracing_appender::non_blocking(file);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}

fn print_fetch(outcome: &Outcome, show_body: bool) {
  match outcome {
    Outcome::Fetch(FetchOutcome::Passthrough(reason)) => {
      println!("passthrough ({:?})", reason);
    }
    Outcome::Fetch(FetchOutcome::Responded(result)) => {
      println!(
        "{} {} [{}] {} bytes",
        result.response.status,
        result.response.status_text,
        result.source,
        result.response.body.len()
      );
      if show_body {
        println!("{}", result.response.text());
      }
    }
    _ => {}
  }
}

fn print_outcome(outcome: &Outcome) -> Result<()> {
  let value = match outcome {
    Outcome::Installed(count) => json!({ "installed": count }),
    Outcome::Activated(deleted) => json!({ "activated": true, "deleted": deleted }),
    Outcome::Reply(Some(reply)) => serde_json::to_value(reply)?,
    Outcome::Reply(None) => json!({ "ok": true }),
    Outcome::Synced(Some(_)) => json!({ "synced": true }),
    Outcome::Synced(None) => json!({ "synced": false }),
    Outcome::Notified(notification) => serde_json::to_value(notification)?,
    Outcome::Clicked(click) => json!({ "click": format!("{:?}", click) }),
    Outcome::Fetch(_) => Value::Null,
  };
  println!("{}", value);
  Ok(())
}

/// Print what the worker posted to the CLI client.
fn drain(inbox: &mut mpsc::UnboundedReceiver<StatusMessage>) -> Result<()> {
  while let Ok(message) = inbox.try_recv() {
    println!("{}", serde_json::to_string(&message)?);
  }
  Ok(())
}
