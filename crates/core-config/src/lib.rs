//! Configuration loading and parsing.
//!
//! Parses `oxidiff.toml` (or an override path provided by the binary). Every
//! table is optional; absent fields take the documented defaults and unknown
//! fields are ignored so the file can evolve without warnings.
//!
//! ```toml
//! [colors]
//! added = "#b4ffb4"
//! changed = "#a0c8ff"
//! deleted = "#ffa0b4"
//!
//! [scroll]
//! smart = true
//! delete_smoothing_window = 150
//! snap_edges = true
//!
//! [highlight]
//! intra_line = true
//! ```
//!
//! The raw smoothing window is retained; `Config::apply_line_height` derives
//! the effective value for the current font metrics (at least one line, at
//! most `MAX_SMOOTHING_WINDOW` pixels) and can be re-run whenever metrics
//! change.

use anyhow::Result;
use serde::Deserialize;
use std::{fmt, fs, path::PathBuf};
use tracing::{debug, info};

/// Pixel window used to spread a deletion's jump across the scroll map.
/// Empirically tuned for typical editor line heights.
pub const DEFAULT_DELETE_SMOOTHING_WINDOW: u32 = 150;
/// Upper bound for a configured smoothing window.
pub const MAX_SMOOTHING_WINDOW: u32 = 4096;

/// 24-bit color parsed from `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Rgb::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid color `{raw}`, expected #rrggbb"))
        })
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ColorConfig {
    #[serde(default = "ColorConfig::default_added")]
    pub added: Rgb,
    #[serde(default = "ColorConfig::default_changed")]
    pub changed: Rgb,
    #[serde(default = "ColorConfig::default_deleted")]
    pub deleted: Rgb,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            added: Self::default_added(),
            changed: Self::default_changed(),
            deleted: Self::default_deleted(),
        }
    }
}

impl ColorConfig {
    const fn default_added() -> Rgb {
        Rgb::new(0xb4, 0xff, 0xb4)
    }
    const fn default_changed() -> Rgb {
        Rgb::new(0xa0, 0xc8, 0xff)
    }
    const fn default_deleted() -> Rgb {
        Rgb::new(0xff, 0xa0, 0xb4)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ScrollConfig {
    #[serde(default = "ScrollConfig::default_smart")]
    pub smart: bool,
    #[serde(default = "ScrollConfig::default_window")]
    pub delete_smoothing_window: u32,
    #[serde(default = "ScrollConfig::default_snap_edges")]
    pub snap_edges: bool,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            smart: Self::default_smart(),
            delete_smoothing_window: Self::default_window(),
            snap_edges: Self::default_snap_edges(),
        }
    }
}

impl ScrollConfig {
    const fn default_smart() -> bool {
        true
    }
    const fn default_window() -> u32 {
        DEFAULT_DELETE_SMOOTHING_WINDOW
    }
    const fn default_snap_edges() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HighlightConfig {
    #[serde(default = "HighlightConfig::default_intra_line")]
    pub intra_line: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            intra_line: Self::default_intra_line(),
        }
    }
}

impl HighlightConfig {
    const fn default_intra_line() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub colors: ColorConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
    pub effective_smoothing_window: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(None, ConfigFile::default())
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    // Prefer a local `oxidiff.toml` before the platform config dir.
    let local = PathBuf::from("oxidiff.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("oxidiff").join("oxidiff.toml");
    }
    PathBuf::from("oxidiff.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config::from_file(Some(content), file)),
            Err(e) => {
                debug!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    fn from_file(raw: Option<String>, file: ConfigFile) -> Self {
        let effective_smoothing_window = file
            .scroll
            .delete_smoothing_window
            .clamp(1, MAX_SMOOTHING_WINDOW);
        Self {
            raw,
            file,
            effective_smoothing_window,
        }
    }

    /// Derive the effective smoothing window for the given line height.
    /// Returns the effective (possibly clamped) value.
    pub fn apply_line_height(&mut self, line_height: u32) -> u32 {
        let raw = self.file.scroll.delete_smoothing_window;
        let min = line_height.clamp(1, MAX_SMOOTHING_WINDOW);
        let clamped = raw.clamp(min, MAX_SMOOTHING_WINDOW);
        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                line_height,
                "delete_smoothing_window_clamped"
            );
        }
        self.effective_smoothing_window = clamped;
        clamped
    }

    /// Recompute after a font metrics change. Returns `Some(new_window)` when
    /// the effective value changed, else `None`.
    pub fn recompute_after_metrics_change(&mut self, line_height: u32) -> Option<u32> {
        let prev = self.effective_smoothing_window;
        let current = self.apply_line_height(line_height);
        if current != prev { Some(current) } else { None }
    }

    pub fn smart_scroll(&self) -> bool {
        self.file.scroll.smart
    }

    pub fn snap_edges(&self) -> bool {
        self.file.scroll.snap_edges
    }

    pub fn intra_line_highlights(&self) -> bool {
        self.file.highlight.intra_line
    }

    pub fn colors(&self) -> &ColorConfig {
        &self.file.colors
    }
}
