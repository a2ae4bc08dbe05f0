//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILPOST_CONFIG` (environment variable)
//! 2. `~/.config/mailpost/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailpost\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags and their environment variables (`GPG_ALLOWED`,
//! `MAILPOST_REQUIRE_SIGNATURE`, ...) are applied on top by the binary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MailpostError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Signature enforcement.
    pub signature: SignatureConfig,
    /// oEmbed lookups.
    pub embed: EmbedConfig,
    /// Site layout of generated files.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Also log to `<cache_dir>/mailpost.log`.
    pub log_file: bool,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Signature enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Only publish messages carrying a good signature from an allowed key.
    pub require: bool,
    /// Fingerprints allowed to publish (exact, case-sensitive match).
    pub allowed: Vec<String>,
    /// gpg binary to run.
    pub gpg_program: PathBuf,
    /// Alternative GnuPG home holding the signers' public keys.
    pub gpg_homedir: Option<PathBuf>,
}

/// oEmbed lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Look up the first link of the body.
    pub enabled: bool,
    /// Catch-all oEmbed endpoint for URLs no built-in provider handles.
    pub fallback_endpoint: Option<String>,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Use the embed title when the message has no subject.
    pub title_from_embed: bool,
}

/// Site layout of generated files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Posts directory relative to the site root.
    pub posts_dir: String,
    /// Image directory relative to the site root (also the public URL prefix).
    pub assets_dir: String,
    /// Value of the `layout` front matter key.
    pub layout: String,
    /// Permissions applied to written posts (Unix only).
    pub file_mode: u32,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_file: true,
            cache_dir: None,
        }
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            require: true,
            allowed: Vec::new(),
            gpg_program: PathBuf::from("gpg"),
            gpg_homedir: None,
        }
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_endpoint: None,
            timeout_secs: 10,
            title_from_embed: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            posts_dir: "_posts".to_string(),
            assets_dir: "posts".to_string(),
            layout: "post".to_string(),
            file_mode: 0o640,
        }
    }
}

impl Config {
    /// Reject settings that cannot work before any message is read.
    pub fn validate(&self) -> Result<()> {
        if self.signature.require && self.signature.allowed.is_empty() {
            return Err(MailpostError::Config(
                "signature enforcement is on but no allowed fingerprints are configured \
                 (set GPG_ALLOWED or [signature] allowed)"
                    .into(),
            ));
        }
        for (name, dir) in [
            ("posts_dir", &self.output.posts_dir),
            ("assets_dir", &self.output.assets_dir),
        ] {
            let trimmed = dir.trim_matches('/');
            if trimmed.is_empty() || trimmed.split('/').any(|c| c == "..") {
                return Err(MailpostError::Config(format!(
                    "output.{name} must be a relative directory inside the site, got '{dir}'"
                )));
            }
        }
        if self.output.file_mode > 0o7777 {
            return Err(MailpostError::Config(format!(
                "output.file_mode {:o} is not a permission mode",
                self.output.file_mode
            )));
        }
        Ok(())
    }
}

/// Split a comma-separated fingerprint list, dropping blanks.
pub fn parse_fingerprints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("MAILPOST_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("mailpost").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailpost")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert!(cfg.signature.require);
        assert!(cfg.signature.allowed.is_empty());
        assert_eq!(cfg.output.posts_dir, "_posts");
        assert_eq!(cfg.output.assets_dir, "posts");
        assert_eq!(cfg.output.layout, "post");
        assert_eq!(cfg.output.file_mode, 0o640);
        assert_eq!(cfg.embed.timeout_secs, 10);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.signature.allowed = vec!["ABCD".into()];
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.signature.allowed, cfg.signature.allowed);
        assert_eq!(parsed.output.file_mode, cfg.output.file_mode);
        assert_eq!(parsed.general.log_level, cfg.general.log_level);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[signature]
allowed = ["0A1B2C3D"]

[output]
file_mode = 0o644
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.signature.allowed, vec!["0A1B2C3D"]);
        assert_eq!(cfg.output.file_mode, 0o644);
        // Other fields use defaults
        assert!(cfg.signature.require);
        assert_eq!(cfg.output.posts_dir, "_posts");
        assert!(cfg.embed.enabled);
    }

    #[test]
    fn test_validate_requires_allow_list() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.validate(), Err(MailpostError::Config(_))));

        cfg.signature.allowed = vec!["ABCD".into()];
        assert!(cfg.validate().is_ok());

        let mut open = Config::default();
        open.signature.require = false;
        assert!(open.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_escaping_dirs() {
        let mut cfg = Config::default();
        cfg.signature.require = false;
        cfg.output.assets_dir = "../outside".into();
        assert!(cfg.validate().is_err());
        cfg.output.assets_dir = "/".into();
        assert!(cfg.validate().is_err());
        cfg.output.assets_dir = "assets/img".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_fingerprints() {
        assert_eq!(
            parse_fingerprints(" AAAA, BBBB ,,CCCC "),
            vec!["AAAA", "BBBB", "CCCC"]
        );
        assert!(parse_fingerprints("").is_empty());
    }
}
