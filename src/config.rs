use crate::error::RefreshError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const FEED_URL_KEY: &str = "FEED_URL";
/// Key written by older installs; still honoured when `FEED_URL` is absent.
pub const LEGACY_FEED_URL_KEY: &str = "RSS_FEED_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub notes: NotesConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub state_dir: PathBuf,
    pub slideshow_dir: PathBuf,
    pub notes_backup_dir: PathBuf,
    pub env_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("state"),
            slideshow_dir: PathBuf::from("display/slideshow"),
            notes_backup_dir: PathBuf::from("/mnt/joplin"),
            env_file: PathBuf::from(".env"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub url: Option<String>,
    pub request_timeout_ms: u64,
    pub max_items: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_ms: 15_000,
            max_items: 24,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotesConfig {
    /// Path below the dated backup folder holding the weekday notes.
    pub subdir: PathBuf,
    pub budget_ms: u64,
    pub metadata_lines: usize,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            subdir: PathBuf::from("notes").join("Day of the Week"),
            budget_ms: 2_000,
            metadata_lines: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub probe_host: String,
    pub probe_timeout_ms: u64,
    pub reboot_threshold: u32,
    pub reboot_command: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_host: "google.com:443".to_string(),
            probe_timeout_ms: 5_000,
            reboot_threshold: 10,
            reboot_command: vec!["sudo".to_string(), "/sbin/reboot".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub program: String,
    pub script: PathBuf,
    pub render_timeout_ms: u64,
    pub boot_message: String,
    pub boot_delay_s: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            script: PathBuf::from("display/epd_render.py"),
            render_timeout_ms: 120_000,
            boot_message: "Inky booting…".to_string(),
            boot_delay_s: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Used until an interval has been persisted.
    pub default_interval_minutes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: 5,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load the config file if present, otherwise fall back to defaults,
    /// then overlay the env file and apply env overrides.
    pub fn resolve(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::warn!(path = %path.display(), "config file missing, using defaults");
            Self::default()
        };
        Self::load_env_file(&config.paths.env_file, false);
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load an env file into the process environment.
    /// Unless `overwrite` is set, real env vars take precedence.
    pub fn load_env_file(path: &Path, overwrite: bool) {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for (key, value) in parse_env_lines(content) {
            if overwrite || std::env::var(&key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }

    /// `FEED_URL` (or the legacy key) from the process environment replaces
    /// the file's feed URL.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let from_env = [FEED_URL_KEY, LEGACY_FEED_URL_KEY]
            .iter()
            .filter_map(|key| lookup(key))
            .map(|v| sanitize_value(&v))
            .find(|v| !v.is_empty());
        if let Some(url) = from_env {
            self.feed.url = Some(url);
        }
    }

    /// The feed URL in effect. Env overrides are folded in at load time, so a
    /// config built in code never sees the process environment.
    pub fn feed_url(&self) -> Option<String> {
        self.feed
            .url
            .as_deref()
            .map(sanitize_value)
            .filter(|u| !u.is_empty())
    }

    /// Validate and persist a new feed URL to the env file.
    pub fn save_feed_url(&self, url: &str) -> std::result::Result<(), RefreshError> {
        let url = sanitize_value(url);
        if !url.starts_with("http") {
            return Err(RefreshError::InvalidInput(format!("invalid feed URL: {}", url)));
        }
        save_env_var(&self.paths.env_file, FEED_URL_KEY, &url)?;
        Ok(())
    }
}

fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(|line| line.trim().trim_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Strip carriage returns, BOM, and other invisible chars from a value.
fn sanitize_value(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

/// Set KEY=VALUE in the env file (replacing any previous line) and in the current process.
fn save_env_var(path: &Path, key: &str, value: &str) -> std::io::Result<()> {
    std::env::set_var(key, value);
    let contents = std::fs::read_to_string(path).unwrap_or_default();
    let prefix = format!("{}=", key);
    let mut lines: Vec<String> = contents
        .lines()
        .filter(|line| !line.trim_start().starts_with(&prefix))
        .map(str::to_string)
        .collect();
    lines.push(format!("{}={}", key, value));
    let mut out = lines.join("\n");
    out.push('\n');
    std::fs::write(path, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses() {
        let config = Config::load(Path::new("config.toml")).unwrap();
        assert_eq!(config.network.reboot_threshold, 10);
        assert_eq!(config.notes.budget_ms, 2_000);
        assert_eq!(config.notes.metadata_lines, 5);
        assert_eq!(config.feed.max_items, 24);
        assert_eq!(config.scheduler.default_interval_minutes, 5);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[feed]\nurl = \"https://example.com/rss\"\n").unwrap();
        assert_eq!(config.feed.url.as_deref(), Some("https://example.com/rss"));
        assert_eq!(config.feed.request_timeout_ms, 15_000);
        assert_eq!(config.display.boot_delay_s, 5);
        assert_eq!(config.network.reboot_command, vec!["sudo", "/sbin/reboot"]);
    }

    #[test]
    fn test_parse_env_lines() {
        let parsed = parse_env_lines("# comment\n\nA=1\nB = \"two\"\r\nbroken\nC='x=y'\n");
        assert_eq!(
            parsed,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two".to_string()),
                ("C".to_string(), "x=y".to_string()),
            ]
        );
    }

    #[test]
    fn test_save_env_var_replaces_existing_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "OTHER=1\nINKY_TEST_SAVE_KEY=old\n").unwrap();

        save_env_var(&path, "INKY_TEST_SAVE_KEY", "new").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "OTHER=1\nINKY_TEST_SAVE_KEY=new\n");
        assert_eq!(std::env::var("INKY_TEST_SAVE_KEY").unwrap(), "new");
    }

    #[test]
    fn test_save_feed_url_rejects_non_http() {
        let config = Config::default();
        let err = config.save_feed_url("ftp://example.com/feed").unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_env_override_replaces_file_url() {
        let mut config: Config = toml::from_str("[feed]\nurl = \"https://file.example/rss\"\n").unwrap();
        assert_eq!(config.feed_url().as_deref(), Some("https://file.example/rss"));

        config.apply_env_with(|key| (key == LEGACY_FEED_URL_KEY).then(|| " https://legacy.example/rss\r".to_string()));
        assert_eq!(config.feed_url().as_deref(), Some("https://legacy.example/rss"));

        config.apply_env_with(|key| match key {
            FEED_URL_KEY => Some("https://env.example/rss".to_string()),
            _ => Some("https://legacy.example/rss".to_string()),
        });
        assert_eq!(config.feed_url().as_deref(), Some("https://env.example/rss"));
    }

    #[test]
    fn test_empty_env_value_keeps_file_url() {
        let mut config = Config::default();
        config.feed.url = Some("https://file.example/rss".to_string());
        config.apply_env_with(|_| Some("   ".to_string()));
        assert_eq!(config.feed_url().as_deref(), Some("https://file.example/rss"));

        config.feed.url = Some(String::new());
        assert_eq!(config.feed_url(), None);
    }
}
