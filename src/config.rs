use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::keymap::{KeyMap, Tuning, DEFAULT_LAYOUT};
use crate::core::scheduler::SchedulerConfig;
use crate::core::voice::{VoiceBank, VoiceConfig, ALL_INSTRUMENTS};

pub const SAMPLE_RATE: u32 = 44100;
pub const TICK_RATE: f64 = 60.0;
pub const MAX_LAG: f64 = 0.25;
pub const MASTER_VOLUME: f32 = 0.3;
pub const BASE_FREQUENCY: f64 = 220.0;

/// Where finished sample blocks go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Blocks are queued and played back in order by the device.
    Queue,
    /// Samples go through a ring buffer the device pulls from.
    Ring,
    /// Samples are written to a WAV file instead of a device.
    Wav,
}

/// Engine settings. Every field has a built-in default, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub tick_rate: f64,
    pub max_lag: f64,
    pub pool_capacity: usize,
    pub master_volume: f32,
    pub base_frequency: f64,
    /// Keyboard symbols in pitch order; the n-th symbol plays key id n.
    pub keys: String,
    pub backend: Backend,
    pub queue_blocks: usize,
    pub ring_capacity: usize,
    pub ring_warmup: usize,
    pub wav_path: PathBuf,
    pub instruments: Vec<VoiceConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            tick_rate: TICK_RATE,
            max_lag: MAX_LAG,
            pool_capacity: DEFAULT_LAYOUT.chars().count(),
            master_volume: MASTER_VOLUME,
            base_frequency: BASE_FREQUENCY,
            keys: DEFAULT_LAYOUT.to_string(),
            backend: Backend::Queue,
            queue_blocks: 32,
            ring_capacity: 8192,
            ring_warmup: 2048,
            wav_path: PathBuf::from("keysynth.wav"),
            instruments: ALL_INSTRUMENTS.map(VoiceConfig::preset).to_vec(),
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Reject settings that would fail or divide by zero at render time.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            bail!("sample_rate must be positive");
        }
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            bail!("tick_rate must be positive (got {})", self.tick_rate);
        }
        if !(self.max_lag.is_finite() && self.max_lag > 0.0) {
            bail!("max_lag must be positive (got {})", self.max_lag);
        }
        if self.pool_capacity == 0 {
            bail!("pool_capacity must be at least 1");
        }
        if !(self.master_volume.is_finite() && self.master_volume >= 0.0) {
            bail!("master_volume must be non-negative (got {})", self.master_volume);
        }
        if !(self.base_frequency.is_finite() && self.base_frequency > 0.0) {
            bail!("base_frequency must be positive (got {})", self.base_frequency);
        }
        if self.backend == Backend::Queue && self.queue_blocks == 0 {
            bail!("queue_blocks must be at least 1");
        }
        if self.backend == Backend::Ring && self.ring_capacity == 0 {
            bail!("ring_capacity must be at least 1");
        }
        self.key_map()?;
        self.voice_bank()?;
        Ok(())
    }

    pub fn key_map(&self) -> Result<KeyMap> {
        KeyMap::from_layout(&self.keys)
    }

    pub fn voice_bank(&self) -> Result<VoiceBank> {
        VoiceBank::from_configs(&self.instruments)
    }

    pub fn tuning(&self) -> Tuning {
        Tuning::new(self.base_frequency)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            sample_rate: self.sample_rate,
            tick_rate: self.tick_rate,
            max_lag: self.max_lag,
        }
    }
}
