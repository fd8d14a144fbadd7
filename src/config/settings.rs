//! Application settings structs, defaults, environment overrides and TOML
//! persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! and carry `#[serde(default)]`, so a partial `settings.toml` only needs the
//! keys the user actually changed.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::select::{Region, RegionError};

/// Environment variable overriding [`TransportConfig::port_start`].
pub const ENV_PORT_START: &str = "SCREEN_TO_TEXT_PORT_START";
/// Environment variable overriding [`TransportConfig::port_end`].
pub const ENV_PORT_END: &str = "SCREEN_TO_TEXT_PORT_END";
/// Environment variable overriding [`ApiConfig::api_key`].
pub const ENV_API_KEY: &str = "SCREEN_TO_TEXT_API_KEY";

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

/// Loopback transport settings.
///
/// Ports are stored wide (`i64`, TOML's native integer) so out-of-range
/// values survive parsing and get clamped by
/// [`PortRange::clamped`](crate::transport::PortRange::clamped).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// First port of the inclusive range; the resident binds exactly this one.
    pub port_start: i64,
    /// Last port of the inclusive range probed by delegating clients.
    pub port_end: i64,
    /// Per-port liveness probe budget in milliseconds.
    pub probe_timeout_ms: u64,
    /// How long the resident waits for a client's request line.
    pub read_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port_start: 49_500,
            port_end: 49_550,
            probe_timeout_ms: 300,
            read_timeout_ms: 2_000,
        }
    }
}

impl TransportConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// RecognitionConfig
// ---------------------------------------------------------------------------

/// Deadline, pool size and feedback timing for recognition sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Hard deadline for one recognition call, in seconds.
    pub timeout_secs: u64,
    /// Worker pool size; `0` means one worker per available CPU.
    pub workers: usize,
    /// How long a standalone session keeps the result visible, in ms.
    pub hold_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            workers: 0,
            hold_ms: 1_500,
        }
    }
}

impl RecognitionConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    /// Resolve `workers == 0` to the CPU count (at least one).
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// OpenAI-compatible vision endpoint used by the recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; `/v1/chat/completions` is appended.
    pub base_url: String,
    /// Bearer token.  `None` or empty for local servers.
    pub api_key: Option<String>,
    /// Vision-capable model identifier.
    pub model: String,
    /// Instruction sent alongside the image.
    pub prompt: String,
    pub temperature: f32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            prompt: "Transcribe all text visible in this image. \
                     Reply with the text only, preserving line breaks."
                .into(),
            temperature: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Key combination that starts a capture (e.g. `"Ctrl+Shift+O"`).
    pub key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            key: "Ctrl+Shift+O".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// A fixed capture rectangle, as written in `settings.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl TryFrom<RegionConfig> for Region {
    type Error = RegionError;

    fn try_from(cfg: RegionConfig) -> Result<Self, Self::Error> {
        Region::new(cfg.x, cfg.y, cfg.width, cfg.height)
    }
}

/// External tools for region picking and pixel grabbing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Interactive picker printing `X,Y WxH` on stdout.
    pub select_command: Vec<String>,
    /// Screenshot tool writing PNG to stdout; `{geometry}` is substituted.
    pub grab_command: Vec<String>,
    /// When set, skip the picker and always capture this rectangle.
    pub region: Option<RegionConfig>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            select_command: vec!["slurp".into()],
            grab_command: vec!["grim".into(), "-g".into(), "{geometry}".into(), "-".into()],
            region: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transport: TransportConfig,
    pub recognition: RecognitionConfig,
    pub api: ApiConfig,
    pub hotkey: HotkeyConfig,
    pub capture: CaptureConfig,
}

impl AppConfig {
    /// Load `settings.toml` from the platform config directory and apply
    /// environment overrides.
    ///
    /// A missing file is the first-run case and yields the defaults.  An
    /// unreadable or malformed file is logged and also replaced by the
    /// defaults; the overrides apply either way.
    pub fn load() -> Self {
        Self::load_with(&AppPaths::new().settings_file, |key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with an explicit path and override lookup.
    pub fn load_with<F>(path: &std::path::Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_from(path).unwrap_or_else(|e| {
            log::warn!("config: cannot use {} ({e:#}); using defaults", path.display());
            Self::default()
        });
        config.apply_overrides(lookup);
        config
    }

    /// Load from an explicit path without touching the environment.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from an arbitrary lookup.  Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = |key: &str| -> Option<i64> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    log::warn!("config: ignoring {key}={raw:?} (not an integer)");
                    None
                }
            }
        };

        if let Some(start) = port(ENV_PORT_START) {
            self.transport.port_start = start;
        }
        if let Some(end) = port(ENV_PORT_END) {
            self.transport.port_end = end;
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.trim().is_empty()) {
            self.api.api_key = Some(key);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
