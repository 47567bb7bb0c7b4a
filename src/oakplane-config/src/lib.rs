use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneCfg {
    #[serde(default = "def_name")]
    pub name: String,
}
fn def_name() -> String { "oakplane".into() }

impl Default for ControlPlaneCfg {
    fn default() -> Self {
        Self { name: def_name() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreEngine {
    #[default]
    Lmdb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCfg {
    #[serde(default)]
    pub engine: StoreEngine,
    #[serde(default = "def_store_path")]
    pub path: String,
}
fn def_store_path() -> String { "./data/oakplane".into() }

impl Default for StoreCfg {
    fn default() -> Self {
        Self { engine: StoreEngine::default(), path: def_store_path() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryEngine {
    Http,
    #[default]
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryCfg {
    #[serde(default)]
    pub engine: RegistryEngine,
    #[serde(default)]
    pub url: String,
    #[serde(default = "def_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "def_timeout_ms")]
    pub timeout_ms: u64,
}
fn def_key_prefix() -> String { "/oakplane".into() }
fn def_timeout_ms() -> u64 { 5_000 }

impl Default for RegistryCfg {
    fn default() -> Self {
        Self {
            engine: RegistryEngine::default(),
            url: String::new(),
            key_prefix: def_key_prefix(),
            timeout_ms: def_timeout_ms(),
        }
    }
}

impl RegistryCfg {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchCfg {
    /// HTTPS endpoint serving gateway heartbeats; empty disables the feed.
    #[serde(default)]
    pub url: String,
    #[serde(default = "def_poll")]
    pub poll_interval_sec: u64,
    /// Upper bound for one poll request.
    #[serde(default = "def_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "def_capacity")]
    pub capacity: usize,
}
fn def_poll() -> u64 { 5 }
fn def_capacity() -> usize { 1024 }

impl Default for WatchCfg {
    fn default() -> Self {
        Self {
            url: String::new(),
            poll_interval_sec: def_poll(),
            timeout_ms: def_timeout_ms(),
            capacity: def_capacity(),
        }
    }
}

impl WatchCfg {
    pub fn feed_url(&self) -> Result<Option<Url>> {
        if self.url.trim().is_empty() {
            return Ok(None);
        }
        let url = Url::parse(self.url.trim()).with_context(|| format!("watch url {}", self.url))?;
        Ok(Some(url))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_sec.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingCfg {
    #[serde(default)]
    pub otlp_endpoint: String,
    #[serde(default = "def_service_name")]
    pub service_name: String,
    #[serde(default = "def_level")]
    pub level: String,
    /// plain | json | pretty
    #[serde(default = "def_format")]
    pub format: String,
    /// Print spans to stdout when no OTLP endpoint is set.
    #[serde(default)]
    pub stdout_spans: bool,
}
fn def_service_name() -> String { "oakplane".into() }
fn def_level() -> String { "info".into() }
fn def_format() -> String { "plain".into() }

impl Default for TracingCfg {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            service_name: def_service_name(),
            level: def_level(),
            format: def_format(),
            stdout_spans: false,
        }
    }
}

impl TracingCfg {
    pub fn otlp_endpoint(&self) -> Option<&str> {
        Some(self.otlp_endpoint.trim()).filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub controlplane: ControlPlaneCfg,
    #[serde(default)]
    pub store: StoreCfg,
    #[serde(default)]
    pub registry: RegistryCfg,
    #[serde(default)]
    pub watch: WatchCfg,
    #[serde(default)]
    pub tracing: TracingCfg,
}

impl FileConfig {
    /// Cross-field checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.store.engine == StoreEngine::Lmdb && self.store.path.trim().is_empty() {
            bail!("store.path is required for the lmdb engine");
        }
        if self.registry.engine == RegistryEngine::Http {
            Url::parse(self.registry.url.trim())
                .with_context(|| format!("registry url {:?}", self.registry.url))?;
        }
        self.watch.feed_url()?;
        if !matches!(self.tracing.format.as_str(), "plain" | "json" | "pretty") {
            bail!("unknown tracing format: {}", self.tracing.format);
        }
        Ok(())
    }
}

pub fn load_config(path: &str) -> Result<FileConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    let cfg: FileConfig = if path.ends_with(".yaml") || path.ends_with(".yml") {
        serde_yml::from_str(&content).with_context(|| format!("parse yaml {}", path))?
    } else if path.ends_with(".json") {
        serde_json::from_str(&content).with_context(|| format!("parse json {}", path))?
    } else if path.ends_with(".toml") {
        toml::from_str(&content).with_context(|| format!("parse toml {}", path))?
    } else {
        return Err(anyhow!("Unknown config extension: {}", path));
    };
    cfg.validate()?;
    Ok(cfg)
}
