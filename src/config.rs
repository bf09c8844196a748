use color_eyre::{eyre::eyre, Result};
use restmodel::{Persistence, ResourceConfig, Schema};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// API root every resource path is resolved against
  pub base_url: String,
  /// Prefix applied to every resource path
  pub namespace: Option<String>,
  /// SQLite cache file (defaults to the data directory)
  pub cache_path: Option<PathBuf>,
  /// Headers sent with every request
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  #[serde(default)]
  pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceEntry {
  pub type_key: String,
  pub base_path: String,
  /// Declared attributes; a trailing `[]` marks an array field
  #[serde(default)]
  pub attrs: Vec<String>,
  #[serde(default = "default_primary_keys")]
  pub primary_keys: Vec<String>,
  #[serde(default)]
  pub cache: bool,
  #[serde(default)]
  pub save_via_put: bool,
  #[serde(default)]
  pub force_array: bool,
  /// Field whose presence marks a record as persisted (e.g. `created_at`)
  pub persisted_marker: Option<String>,
}

fn default_primary_keys() -> Vec<String> {
  vec!["id".to_string()]
}

impl ResourceEntry {
  pub fn resource_config(&self, namespace: Option<&str>) -> ResourceConfig {
    let mut config = ResourceConfig::new(&self.type_key, &self.base_path)
      .with_cache(self.cache)
      .with_primary_keys(self.primary_keys.iter().cloned())
      .with_save_via_put(self.save_via_put)
      .with_force_array(self.force_array);

    if let Some(namespace) = namespace {
      config = config.with_namespace(namespace);
    }
    if let Some(marker) = &self.persisted_marker {
      config = config.with_persistence(Persistence::MarkerField(marker.clone()));
    }
    config
  }

  pub fn schema(&self) -> Schema {
    Schema::from_attrs(&self.attrs)
  }
}

/// Candidate config files, highest priority first.
fn search_paths() -> Vec<PathBuf> {
  let mut paths = vec![PathBuf::from("restmodel.yaml")];
  paths.extend(dirs::config_dir().map(|dir| dir.join("restmodel").join("config.yaml")));
  paths
}

impl Config {
  /// Read the file at `explicit_path`, or the first of `./restmodel.yaml` and
  /// `$XDG_CONFIG_HOME/restmodel/config.yaml` that exists.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = match explicit_path {
      Some(path) => path.to_path_buf(),
      None => search_paths().into_iter().find(|path| path.is_file()).ok_or_else(|| {
        eyre!("No configuration file found. Create one at ~/.config/restmodel/config.yaml")
      })?,
    };

    let contents = std::fs::read_to_string(&path)
      .map_err(|e| eyre!("Could not read config {}: {}", path.display(), e))?;
    let config: Self =
      serde_yaml::from_str(&contents).map_err(|e| eyre!("Invalid config {}: {}", path.display(), e))?;

    if config.base_url.trim().is_empty() {
      return Err(eyre!("Invalid config {}: base_url is empty", path.display()));
    }
    Ok(config)
  }

  pub fn find_resource(&self, type_key: &str) -> Result<&ResourceEntry> {
    self
      .resources
      .iter()
      .find(|r| r.type_key == type_key)
      .ok_or_else(|| eyre!("No resource \"{}\" in configuration", type_key))
  }

  /// API token from `RESTMODEL_TOKEN`, if set.
  pub fn get_api_token() -> Option<String> {
    std::env::var("RESTMODEL_TOKEN").ok().filter(|t| !t.is_empty())
  }
}
