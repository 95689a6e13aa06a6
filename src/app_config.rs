//! Configuration file loading.
//!
//! The file lives at `$XDG_CONFIG_HOME/handoff/config.toml` (falling back to
//! `$HOME/.config/handoff/config.toml`) and holds flat `key = value` lines.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use handoff_core::{AvailabilityPolicy, CheckOrder, EndpointStyle, SuspendStrategy};
use url::Url;

const APP_DIR: &str = "handoff";

/// Accepted range for submission timeouts, in milliseconds.
const TIMEOUT_MS_RANGE: std::ops::RangeInclusive<u64> = 100..=60_000;

/// Values read from the config file. Unset keys keep compiled-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub agent_url: Option<String>,
    pub availability_policy: Option<AvailabilityPolicy>,
    pub check_order: Option<CheckOrder>,
    pub suspend_strategy: Option<SuspendStrategy>,
    pub submit_endpoint: Option<EndpointStyle>,
    pub submit_timeout_ms: Option<u64>,
    pub direct_submit_timeout_ms: Option<u64>,
    pub database_path: Option<PathBuf>,
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(agent_url) = &self.agent_url {
            validate_agent_url(agent_url)?;
        }
        validate_timeout_ms("submit_timeout_ms", self.submit_timeout_ms)?;
        validate_timeout_ms("direct_submit_timeout_ms", self.direct_submit_timeout_ms)?;
        Ok(())
    }
}

/// Checks that `value` is an absolute http(s) URL.
pub fn validate_agent_url(value: &str) -> Result<()> {
    let url = Url::parse(value).with_context(|| format!("Invalid agent URL '{value}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Invalid agent URL '{value}': expected an http or https URL");
    }
    Ok(())
}

fn validate_timeout_ms(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !TIMEOUT_MS_RANGE.contains(&value) {
        bail!(
            "Invalid config value for `{field}`: {value}. Expected range: {}..={}",
            TIMEOUT_MS_RANGE.start(),
            TIMEOUT_MS_RANGE.end()
        );
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log level used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/handoff/config.toml`
/// 2. `$HOME/.config/handoff/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

/// Resolves the default settings database path.
///
/// Priority:
/// 1. `$XDG_DATA_HOME/handoff/settings.db`
/// 2. `$HOME/.local/share/handoff/settings.db`
#[must_use]
pub fn resolve_default_database_path() -> Option<PathBuf> {
    if let Some(xdg_data_home) = env_var_non_empty_os("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg_data_home).join(APP_DIR).join("settings.db"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR)
            .join("settings.db"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

/// Loads and validates the config file at `path`.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "agent_url" => {
                cfg.agent_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "availability_policy" => {
                cfg.availability_policy = Some(parse_enum(value).with_context(invalid)?);
            }
            "check_order" => {
                cfg.check_order = Some(parse_enum(value).with_context(invalid)?);
            }
            "suspend_strategy" => {
                cfg.suspend_strategy = Some(parse_enum(value).with_context(invalid)?);
            }
            "submit_endpoint" => {
                cfg.submit_endpoint = Some(parse_enum(value).with_context(invalid)?);
            }
            "submit_timeout_ms" => {
                cfg.submit_timeout_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "direct_submit_timeout_ms" => {
                cfg.direct_submit_timeout_ms =
                    Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "database_path" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.database_path = Some(PathBuf::from(parsed));
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
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

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_enum<T>(raw_value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let label = parse_string_literal(raw_value)?;
    label.parse::<T>().map_err(anyhow::Error::msg)
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

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_all_fields() {
        let raw = r#"
# local agent on a non-default port
agent_url = "http://127.0.0.1:9666"
availability_policy = "probe"
check_order = "intercept-first"
suspend_strategy = "pause"
submit_endpoint = "flash"
submit_timeout_ms = 2500
direct_submit_timeout_ms = 15000   # slow machine
database_path = "/tmp/handoff/settings.db"
verbosity = "verbose"
"#;
        let cfg = parse_config_str(raw).unwrap();

        assert_eq!(cfg.agent_url.as_deref(), Some("http://127.0.0.1:9666"));
        assert_eq!(cfg.availability_policy, Some(AvailabilityPolicy::PeriodicProbe));
        assert_eq!(cfg.check_order, Some(CheckOrder::InterceptFirst));
        assert_eq!(cfg.suspend_strategy, Some(SuspendStrategy::Pause));
        assert_eq!(cfg.submit_endpoint, Some(EndpointStyle::Flash));
        assert_eq!(cfg.submit_timeout_ms, Some(2500));
        assert_eq!(cfg.direct_submit_timeout_ms, Some(15_000));
        assert_eq!(
            cfg.database_path,
            Some(PathBuf::from("/tmp/handoff/settings.db"))
        );
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str("check_order = \"check-first\"\n").unwrap();
        assert_eq!(cfg.check_order, Some(CheckOrder::CheckFirst));
        assert_eq!(cfg.agent_url, None);
        assert_eq!(cfg.suspend_strategy, None);
    }

    #[test]
    fn test_parse_config_empty_is_default() {
        assert_eq!(parse_config_str("\n# nothing\n").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("concurrency = 4").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("agent_url").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_enum_label() {
        let err = parse_config_str("availability_policy = \"sometimes\"").unwrap_err();
        assert!(format!("{err:#}").contains("unknown availability policy"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        assert!(parse_config_str("agent_url = http://localhost:3128").is_err());
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_timeout() {
        let err = parse_config_str("submit_timeout_ms = 5").unwrap_err();
        assert!(err.to_string().contains("submit_timeout_ms"));
        assert!(parse_config_str("direct_submit_timeout_ms = 600000").is_err());
    }

    #[test]
    fn test_parse_config_rejects_non_http_agent_url() {
        assert!(parse_config_str("agent_url = \"ftp://localhost:3128\"").is_err());
    }

    #[test]
    fn test_strip_inline_comment_keeps_hash_in_string() {
        assert_eq!(
            strip_inline_comment(r#"database_path = "/tmp/#1/settings.db" # note"#),
            r#"database_path = "/tmp/#1/settings.db" "#
        );
    }

    #[test]
    fn test_verbosity_log_levels() {
        assert_eq!(VerbositySetting::Default.log_level(), "info");
        assert_eq!(VerbositySetting::Quiet.log_level(), "error");
        assert_eq!(VerbositySetting::Debug.log_level(), "trace");
    }

    #[test]
    fn test_load_file_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "bogus").unwrap();

        let err = load_file_config(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
