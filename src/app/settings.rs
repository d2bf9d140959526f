//! Settings file loading for engine tunables.
//!
//! The file uses flat `key = value` lines with `#` comments. Every key is
//! optional; missing keys keep the engine defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use multiloader_core::EngineOptions;

/// Tunables read from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Read chunk size in KiB.
    pub chunk_size_kib: Option<u64>,
    /// Queue capacity of each progress subscriber.
    pub subscriber_capacity: Option<u64>,
    /// Idle seconds before a progress feed heartbeat.
    pub heartbeat_secs: Option<u64>,
    /// Transfer connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Whole-transfer deadline in seconds; 0 disables it.
    pub transfer_timeout_secs: Option<u64>,
    /// Per-request probe timeout in seconds.
    pub probe_timeout_secs: Option<u64>,
    /// Transfers allowed to stream at once; 0 means unlimited.
    pub max_concurrent: Option<u64>,
}

impl Settings {
    /// Validates values against the ranges the engine accepts.
    pub fn validate(&self) -> Result<()> {
        validate_range("chunk_size_kib", self.chunk_size_kib, 1, 4096)?;
        validate_range("subscriber_capacity", self.subscriber_capacity, 1, 10_000)?;
        validate_range("heartbeat_secs", self.heartbeat_secs, 1, 3600)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("transfer_timeout_secs", self.transfer_timeout_secs, 0, 86_400)?;
        validate_range("probe_timeout_secs", self.probe_timeout_secs, 1, 3600)?;
        validate_range("max_concurrent", self.max_concurrent, 0, 100)?;
        Ok(())
    }

    /// Overlays these settings on the engine defaults.
    #[must_use]
    pub fn engine_options(&self) -> EngineOptions {
        let mut options = EngineOptions::default();
        if let Some(kib) = self.chunk_size_kib {
            options.chunk_size = to_usize(kib).saturating_mul(1024);
        }
        if let Some(capacity) = self.subscriber_capacity {
            options.subscriber_capacity = to_usize(capacity);
        }
        if let Some(secs) = self.heartbeat_secs {
            options.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.connect_timeout_secs {
            options.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.transfer_timeout_secs {
            options.transfer_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = self.probe_timeout_secs {
            options.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = self.max_concurrent {
            options.max_concurrent_transfers = (limit > 0).then(|| to_usize(limit));
        }
        options
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Resolves the default settings path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/multiloader/config.toml`
/// 2. `$HOME/.config/multiloader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("multiloader")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("multiloader")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads settings from `explicit` or, failing that, the default path.
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return load_settings_file(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_settings_file(&path),
        _ => Ok(Settings::default()),
    }
}

fn load_settings_file(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_settings_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_settings_str(raw: &str) -> Result<Settings> {
    let mut settings = Settings::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let slot = match key {
            "chunk_size_kib" => &mut settings.chunk_size_kib,
            "subscriber_capacity" => &mut settings.subscriber_capacity,
            "heartbeat_secs" => &mut settings.heartbeat_secs,
            "connect_timeout_secs" => &mut settings.connect_timeout_secs,
            "transfer_timeout_secs" => &mut settings.transfer_timeout_secs,
            "probe_timeout_secs" => &mut settings.probe_timeout_secs,
            "max_concurrent" => &mut settings.max_concurrent,
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        };
        let parsed = parse_integer_u64(raw_value)
            .with_context(|| format!("Invalid `{key}` value on line {}", line_index + 1))?;
        *slot = Some(parsed);
    }
    settings.validate()?;
    Ok(settings)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_settings_partial_fields() {
        let settings = parse_settings_str(
            "# tuning\nchunk_size_kib = 64\nmax_concurrent = 4 # cap\n\n",
        )
        .unwrap();
        assert_eq!(settings.chunk_size_kib, Some(64));
        assert_eq!(settings.max_concurrent, Some(4));
        assert_eq!(settings.heartbeat_secs, None);
    }

    #[test]
    fn test_parse_settings_rejects_unknown_key() {
        let err = parse_settings_str("rate_limit = 5").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_parse_settings_rejects_missing_equals() {
        let err = parse_settings_str("chunk_size_kib 64").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_settings_rejects_out_of_range() {
        let err = parse_settings_str("chunk_size_kib = 0").unwrap_err();
        assert!(err.to_string().contains("1..=4096"), "{err}");

        let err = parse_settings_str("max_concurrent = 101").unwrap_err();
        assert!(err.to_string().contains("max_concurrent"), "{err}");
    }

    #[test]
    fn test_parse_settings_rejects_negative() {
        let err = parse_settings_str("heartbeat_secs = -1").unwrap_err();
        assert!(format!("{err:#}").contains("non-negative"), "{err:#}");
    }

    #[test]
    fn test_engine_options_map_zero_to_unbounded() {
        let settings = Settings {
            transfer_timeout_secs: Some(0),
            max_concurrent: Some(0),
            chunk_size_kib: Some(8),
            ..Settings::default()
        };
        let options = settings.engine_options();
        assert_eq!(options.transfer_timeout, None);
        assert_eq!(options.max_concurrent_transfers, None);
        assert_eq!(options.chunk_size, 8 * 1024);
    }

    #[test]
    fn test_engine_options_apply_limits() {
        let settings = Settings {
            transfer_timeout_secs: Some(600),
            max_concurrent: Some(3),
            heartbeat_secs: Some(5),
            ..Settings::default()
        };
        let options = settings.engine_options();
        assert_eq!(options.transfer_timeout, Some(Duration::from_secs(600)));
        assert_eq!(options.max_concurrent_transfers, Some(3));
        assert_eq!(options.heartbeat_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_load_settings_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "probe_timeout_secs = 20\n").unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.probe_timeout_secs, Some(20));
    }

    #[test]
    fn test_load_settings_explicit_missing_file_errors() {
        let temp = TempDir::new().unwrap();
        let err = load_settings(Some(&temp.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
