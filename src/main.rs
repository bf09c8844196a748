mod config;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use restmodel::{Client, HttpTransport, Parents, RequestOptions, Resource, SqliteStorage};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "restmodel")]
#[command(about = "Query REST resources through a local record cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/restmodel/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load every record of a resource
  All {
    type_key: String,
    /// Parent key for a path placeholder, as NAME=VALUE
    #[arg(long = "parent", value_parser = parse_parent)]
    parents: Vec<(String, String)>,
    /// When served from cache, wait for the refresh and print again
    #[arg(long)]
    wait: bool,
  },
  /// Load one record by primary key
  Find {
    type_key: String,
    id: String,
    #[arg(long = "parent", value_parser = parse_parent)]
    parents: Vec<(String, String)>,
    #[arg(long)]
    wait: bool,
  },
  /// Delete one record by primary key
  Delete {
    type_key: String,
    id: String,
    #[arg(long = "parent", value_parser = parse_parent)]
    parents: Vec<(String, String)>,
  },
  /// List configured resources and their parent placeholders
  Paths,
}

fn parse_parent(s: &str) -> Result<(String, String), String> {
  s.split_once('=')
    .filter(|(name, _)| !name.is_empty())
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .ok_or_else(|| format!("expected NAME=VALUE, got \"{}\"", s))
}

/// Numeric arguments become JSON numbers so they match numeric keys in the cache.
fn key_value(raw: &str) -> Value {
  match serde_json::from_str::<Value>(raw) {
    Ok(value @ Value::Number(_)) => value,
    _ => Value::String(raw.to_string()),
  }
}

fn to_parents(raw: &[(String, String)]) -> Parents {
  restmodel::parents(raw.iter().map(|(name, value)| (name.clone(), key_value(value))))
}

fn init_logging() -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("restmodel");
  std::fs::create_dir_all(&dir)?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, "restmodel.log"));
  let filter = EnvFilter::try_from_env("RESTMODEL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

fn build_client(config: &Config) -> Result<Client> {
  let mut transport = HttpTransport::new(&config.base_url)?;
  for (name, value) in &config.headers {
    transport = transport.with_header(name, value);
  }
  if let Some(token) = Config::get_api_token() {
    transport = transport.with_header("Authorization", format!("Bearer {}", token));
  }

  let storage = match &config.cache_path {
    Some(path) => SqliteStorage::open(path),
    None => SqliteStorage::open_default(),
  };

  match storage {
    Ok(storage) => Ok(Client::with_storage(transport, storage)),
    Err(e) => {
      warn!(error = %e, "could not open cache database, continuing without cache");
      Ok(Client::without_cache(transport))
    }
  }
}

fn resource(client: &Client, config: &Config, type_key: &str) -> Result<Resource> {
  let entry = config.find_resource(type_key)?;
  Ok(client.resource(entry.resource_config(config.namespace.as_deref()), entry.schema())?)
}

fn print_json(value: &Value) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  let config = Config::load(args.config.as_deref())?;
  let client = build_client(&config)?;

  match args.command {
    Command::All {
      type_key,
      parents,
      wait,
    } => {
      let resource = resource(&client, &config, &type_key)?;
      let result = resource
        .all(&to_parents(&parents), RequestOptions::default())?
        .await?;
      print_json(&result.data.to_json())?;

      if wait && result.is_cached() {
        let collection = result.settled().await;
        print_json(&collection.to_json())?;
      }
    }
    Command::Find {
      type_key,
      id,
      parents,
      wait,
    } => {
      let resource = resource(&client, &config, &type_key)?;
      let result = resource
        .find(&to_parents(&parents), key_value(&id), RequestOptions::default())?
        .await?;
      print_json(&result.data.to_json())?;

      if wait && result.is_cached() {
        let record = result.settled().await;
        print_json(&record.to_json())?;
      }
    }
    Command::Delete {
      type_key,
      id,
      parents,
    } => {
      let resource = resource(&client, &config, &type_key)?;
      let mut attributes = Map::new();
      attributes.insert(resource.primary_keys()[0].clone(), key_value(&id));

      let record = resource.create_with_parents(Value::Object(attributes), to_parents(&parents))?;
      record.delete(RequestOptions::default())?.await?;
      info!(type_key = %type_key, id = %id, "deleted record");
      println!("Deleted {} {}", type_key, id);
    }
    Command::Paths => {
      for entry in &config.resources {
        let resource = client.resource(entry.resource_config(config.namespace.as_deref()), entry.schema())?;
        let placeholders = resource.parent_key_names().join(", ");
        println!(
          "{:<16} {:<32} {}",
          resource.type_key(),
          resource.config().base_path,
          placeholders
        );
      }
    }
  }

  Ok(())
}
