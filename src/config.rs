//! Configuration for the analyzer
//!
//! Configuration is read once and snapshotted into every request at
//! submission time, so a running request never observes later changes.
//!
//! # Configuration File Format
//!
//! TOML format, by default in the platform config directory:
//!
//! ```toml
//! [highlighting]
//! gradient_from = [255, 255, 0]
//! gradient_to = [0, 255, 255]
//! number_of_colors = 3
//! mono_color_enabled = false
//! mono_color = [150, 150, 0]
//!
//! [analysis]
//! worker_count = 8
//! max_workers = 8
//! chunk_size = 4000
//! continuous_poll_interval_ms = 50
//! sequence_diagram_enabled = true
//! plot_enabled = true
//!
//! [source]
//! cache_capacity = 10000
//! field_separator = " "
//! ```

use crate::analysis::RequestSettings;
use crate::error::{AnalyzerError, Result};
use crate::palette::{Palette, Rgb};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete analyzer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Highlighting palette settings
    #[serde(default)]
    pub highlighting: HighlightingSettings,

    /// Worker pool and feature toggles
    #[serde(default)]
    pub analysis: AnalysisSettings,

    /// Record source settings
    #[serde(default)]
    pub source: SourceSettings,
}

/// Highlighting palette settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightingSettings {
    /// First gradient color
    #[serde(default = "default_gradient_from")]
    pub gradient_from: Rgb,

    /// Last gradient color
    #[serde(default = "default_gradient_to")]
    pub gradient_to: Rgb,

    /// Desired number of gradient colors
    #[serde(default = "default_number_of_colors")]
    pub number_of_colors: usize,

    /// Use a single color instead of the gradient
    #[serde(default)]
    pub mono_color_enabled: bool,

    /// Color used when the mono-color override is active
    #[serde(default = "default_mono_color")]
    pub mono_color: Rgb,
}

impl Default for HighlightingSettings {
    fn default() -> Self {
        Self {
            gradient_from: default_gradient_from(),
            gradient_to: default_gradient_to(),
            number_of_colors: default_number_of_colors(),
            mono_color_enabled: false,
            mono_color: default_mono_color(),
        }
    }
}

/// Worker pool and feature toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Workers used by a request unless the caller overrides it
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Upper bound for the per-request worker count
    #[serde(default = "default_worker_count")]
    pub max_workers: usize,

    /// Records processed between two progress notifications of a worker
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Source polling period of continuous requests
    #[serde(default = "default_poll_interval_ms")]
    pub continuous_poll_interval_ms: u64,

    /// Extract sequence-diagram items
    #[serde(default = "default_true")]
    pub sequence_diagram_enabled: bool,

    /// Extract plot items
    #[serde(default = "default_true")]
    pub plot_enabled: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_workers: default_worker_count(),
            chunk_size: default_chunk_size(),
            continuous_poll_interval_ms: default_poll_interval_ms(),
            sequence_diagram_enabled: true,
            plot_enabled: true,
        }
    }
}

/// Record source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Decoded records kept in memory by the file source
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// String placed between columns when a record is assembled
    #[serde(default = "default_field_separator")]
    pub field_separator: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            field_separator: default_field_separator(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_gradient_from() -> Rgb {
    Rgb::new(255, 255, 0)
}

fn default_gradient_to() -> Rgb {
    Rgb::new(0, 255, 255)
}

fn default_number_of_colors() -> usize {
    3
}

fn default_mono_color() -> Rgb {
    Rgb::new(150, 150, 0)
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_chunk_size() -> usize {
    4000
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_field_separator() -> String {
    " ".to_string()
}

impl AnalyzerConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file not found, using defaults: {:?}", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalyzerError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file: {}", e),
            ))
        })?;

        let config: AnalyzerConfig = toml::from_str(&content)?;
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AnalyzerError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create config directory: {}", e),
                ))
            })?;
        }

        std::fs::write(path, content).map_err(|e| {
            AnalyzerError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config file: {}", e),
            ))
        })?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Reject values the analyzer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.analysis.chunk_size == 0 {
            return Err(AnalyzerError::Config(
                "analysis.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.analysis.max_workers == 0 {
            return Err(AnalyzerError::Config(
                "analysis.max_workers must be greater than zero".to_string(),
            ));
        }
        if self.source.cache_capacity == 0 {
            return Err(AnalyzerError::Config(
                "source.cache_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the highlighting section into the palette handed to requests
    pub fn palette(&self) -> Palette {
        let h = &self.highlighting;
        if h.mono_color_enabled {
            Palette::mono(h.mono_color)
        } else {
            Palette::from_gradient(h.gradient_from, h.gradient_to, h.number_of_colors)
        }
    }

    /// Snapshot of everything a request needs from the configuration
    pub fn to_request_settings(&self) -> RequestSettings {
        RequestSettings {
            palette: self.palette(),
            chunk_size: self.analysis.chunk_size.max(1),
            poll_interval: Duration::from_millis(self.analysis.continuous_poll_interval_ms),
            sequence_enabled: self.analysis.sequence_diagram_enabled,
            plot_enabled: self.analysis.plot_enabled,
        }
    }

    /// Worker count clamped to the configured maximum
    pub fn effective_workers(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.analysis.worker_count)
            .clamp(1, self.analysis.max_workers.max(1))
    }

    /// Default config path in the platform config directory
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("com", "logscope", "logscope")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".logscope/config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AnalyzerConfig::default();

        assert_eq!(config.highlighting.number_of_colors, 3);
        assert!(!config.highlighting.mono_color_enabled);
        assert_eq!(config.analysis.chunk_size, 4000);
        assert_eq!(config.analysis.continuous_poll_interval_ms, 50);
        assert!(config.analysis.worker_count >= 1);
        assert!(config.analysis.sequence_diagram_enabled);
        assert_eq!(config.source.field_separator, " ");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = AnalyzerConfig::default();
        config.highlighting.mono_color_enabled = true;
        config.analysis.chunk_size = 17;
        config.save(&config_path).unwrap();

        assert!(config_path.exists());

        let loaded = AnalyzerConfig::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[analysis]\nchunk_size = 10\n").unwrap();

        let loaded = AnalyzerConfig::load(&config_path).unwrap();
        assert_eq!(loaded.analysis.chunk_size, 10);
        assert_eq!(loaded.highlighting, HighlightingSettings::default());
    }

    #[test]
    fn test_invalid_chunk_size_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[analysis]\nchunk_size = 0\n").unwrap();

        let err = AnalyzerConfig::load(&config_path).unwrap_err();
        assert!(matches!(err, AnalyzerError::Config(_)));
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config = AnalyzerConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }

    #[test]
    fn test_palette_resolution() {
        let mut config = AnalyzerConfig::default();
        assert_eq!(config.palette().len(), 3);

        config.highlighting.mono_color_enabled = true;
        assert_eq!(config.palette(), Palette::mono(Rgb::new(150, 150, 0)));
    }

    #[test]
    fn test_effective_workers_clamped() {
        let mut config = AnalyzerConfig::default();
        config.analysis.max_workers = 4;
        assert_eq!(config.effective_workers(Some(16)), 4);
        assert_eq!(config.effective_workers(Some(0)), 1);
        assert_eq!(config.effective_workers(Some(2)), 2);
    }
}
