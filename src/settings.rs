// src/settings.rs
//! Runtime configuration: enabled sources, per-source caps, host endpoint,
//! storage backend, locale.
//!
//! Parsing is lenient: unknown source ids are ignored and values
//! of the wrong type fall back to defaults instead of failing the load.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::i18n::Locale;
use crate::sources::{Source, SOURCES};
use crate::transport::HostEndpoint;

pub const DEFAULT_MAX_PER_SOURCE: u32 = 30;
pub const MIN_MAX_PER_SOURCE: u32 = 1;
pub const MAX_MAX_PER_SOURCE: u32 = 2000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 280;
pub const DEFAULT_BIND: &str = "127.0.0.1:6808";
pub const DEFAULT_FS_ROOT: &str = "data/emojis";

const ENV_PATH: &str = "ICON_MARKET_CONFIG";
const ENV_TOKEN: &str = "ICON_MARKET_TOKEN";
const ENV_HOST: &str = "ICON_MARKET_HOST";
const ENV_STORAGE_ROOT: &str = "ICON_MARKET_STORAGE_ROOT";
const ENV_STORAGE_KIND: &str = "ICON_MARKET_STORAGE_KIND";
const ENV_LOCALE: &str = "ICON_MARKET_LOCALE";
const ENV_BIND: &str = "ICON_MARKET_BIND";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Local directory tree.
    #[default]
    Fs,
    /// The host application's file API.
    Host,
}

impl StorageKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fs" | "file" | "local" => Some(Self::Fs),
            "host" | "api" => Some(Self::Host),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageSettings {
    pub kind: StorageKind,
    /// Filesystem root for `fs`; preferred root for `host` (empty = built-in candidates).
    pub root: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: StorageKind::Fs,
            root: DEFAULT_FS_ROOT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub enabled_sources: BTreeMap<String, bool>,
    pub max_per_source: BTreeMap<String, u32>,
    pub host: HostEndpoint,
    pub storage: StorageSettings,
    pub locale: Locale,
    pub debounce_ms: u64,
    pub bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled_sources: SOURCES.iter().map(|s| (s.id.to_string(), true)).collect(),
            max_per_source: SOURCES
                .iter()
                .map(|s| (s.id.to_string(), DEFAULT_MAX_PER_SOURCE))
                .collect(),
            host: HostEndpoint::default(),
            storage: StorageSettings::default(),
            locale: Locale::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Clamp a cap into `1..=2000`; non-numeric input yields the default.
pub fn normalize_max(v: Option<&Value>) -> u32 {
    let num = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match num.filter(|f| f.is_finite()) {
        Some(f) => f
            .trunc()
            .clamp(MIN_MAX_PER_SOURCE as f64, MAX_MAX_PER_SOURCE as f64) as u32,
        None => DEFAULT_MAX_PER_SOURCE,
    }
}

fn pick<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| obj.get(*n))
}

fn pick_str(obj: &Value, names: &[&str]) -> Option<String> {
    pick(obj, names)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
}

impl Settings {
    /// Build settings from an arbitrary JSON-like document.
    pub fn from_value(raw: &Value) -> Self {
        let mut out = Settings::default();
        let empty = Value::Object(Default::default());
        let data = if raw.is_object() { raw } else { &empty };

        let enabled_raw = pick(data, &["enabledSources", "enabled_sources"])
            .filter(|v| v.is_object())
            .unwrap_or(&empty);
        let max_raw = pick(data, &["maxPerSourceBySource", "max_per_source"])
            .filter(|v| v.is_object())
            .unwrap_or(&empty);
        let legacy_max = pick(data, &["maxPerSource", "max_per_source_default"]);

        for s in SOURCES.iter() {
            if let Some(v) = enabled_raw.get(s.id) {
                out.enabled_sources.insert(s.id.to_string(), truthy(v));
            }
            let cap = max_raw.get(s.id).or(legacy_max);
            out.max_per_source.insert(s.id.to_string(), normalize_max(cap));
        }

        if let Some(host) = data.get("host").filter(|v| v.is_object()) {
            out.host = HostEndpoint::new(
                pick_str(host, &["baseUrl", "base_url"]).unwrap_or_default(),
                pick_str(host, &["token"]).unwrap_or_default(),
            );
        }
        if let Some(storage) = data.get("storage").filter(|v| v.is_object()) {
            if let Some(kind) = pick_str(storage, &["kind"]).and_then(|k| StorageKind::parse(&k)) {
                out.storage.kind = kind;
            }
            if let Some(root) = pick_str(storage, &["root"]) {
                out.storage.root = root;
            }
        }
        if let Some(locale) = pick_str(data, &["locale"]) {
            out.locale = Locale::parse(&locale);
        }
        if let Some(ms) = pick(data, &["debounceMs", "debounce_ms"]).and_then(Value::as_u64) {
            out.debounce_ms = ms;
        }
        if let Some(bind) = pick_str(data, &["bind"]).filter(|b| !b.is_empty()) {
            out.bind = bind;
        }
        out
    }

    /// Parse TOML or JSON text; `hint_ext` picks the first format tried.
    pub fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        let as_toml = || toml::from_str::<Value>(s).map_err(|e| anyhow!(e));
        let as_json = || serde_json::from_str::<Value>(s).map_err(|e| anyhow!(e));
        let value = if hint_ext == "json" {
            as_json().or_else(|_| as_toml())
        } else {
            as_toml().or_else(|_| as_json())
        }
        .context("unsupported settings format")?;
        Ok(Self::from_value(&value))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext)
    }

    /// Load settings using env var + fallbacks, then apply env overrides:
    /// 1) $ICON_MARKET_CONFIG
    /// 2) config/icon_market.toml
    /// 3) config/icon_market.json
    /// 4) defaults
    pub fn load_default() -> Result<Self> {
        let mut settings = if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/icon_market.toml");
            let json_p = PathBuf::from("config/icon_market.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) {
        let var = |k: &str| std::env::var(k).ok().map(|v| v.trim().to_string());
        if let Some(t) = var(ENV_TOKEN) {
            self.host.token = t;
        }
        if let Some(h) = var(ENV_HOST) {
            self.host.base_url = h;
        }
        if let Some(r) = var(ENV_STORAGE_ROOT).filter(|r| !r.is_empty()) {
            self.storage.root = r;
        }
        if let Some(k) = var(ENV_STORAGE_KIND).and_then(|k| StorageKind::parse(&k)) {
            self.storage.kind = k;
        }
        if let Some(l) = var(ENV_LOCALE) {
            self.locale = Locale::parse(&l);
        }
        if let Some(b) = var(ENV_BIND).filter(|b| !b.is_empty()) {
            self.bind = b;
        }
    }

    /// Unknown ids count as enabled.
    pub fn is_enabled(&self, source_id: &str) -> bool {
        self.enabled_sources.get(source_id).copied().unwrap_or(true)
    }

    pub fn max_per_source(&self, source_id: &str) -> u32 {
        self.max_per_source
            .get(source_id)
            .copied()
            .unwrap_or(DEFAULT_MAX_PER_SOURCE)
            .clamp(MIN_MAX_PER_SOURCE, MAX_MAX_PER_SOURCE)
    }

    pub fn enabled_sources(&self) -> Vec<&'static Source> {
        SOURCES.iter().filter(|s| self.is_enabled(s.id)).collect()
    }
}
