use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{domain::UserId, errors::Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_WELCOME_TEMPLATE: &str = "Welcome, {mention}!";

const DEFAULT_WAIT_MINUTES: u32 = 10;
const DEFAULT_TEMPLATE_FILE: &str = "welcome_template.html";
const DEFAULT_DELETE_WELCOME_AFTER_MINUTES: i64 = 10;
const DEFAULT_DELETE_INFO_AFTER_SECONDS: i64 = 5;
const DEFAULT_LOG_LEVEL: &str = "INFO";
const DEFAULT_DATABASE_PATH: &str = "user_joins.db";

/// Immutable configuration snapshot.
///
/// Readers grab an `Arc<Config>` from [`ConfigHandle::snapshot`] and keep using it for
/// the whole operation; a reload never mutates a snapshot in place.
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    /// `None` disables admin commands in private chats.
    pub owner_id: Option<UserId>,
    pub wait_minutes: u32,
    /// Global default welcome template (HTML with `{placeholder}`s).
    pub welcome_template: String,
    pub welcome_template_file: PathBuf,
    pub rules_url: Option<String>,
    /// `<= 0` keeps welcomes forever.
    pub delete_welcome_after_minutes: i64,
    /// `<= 0` keeps informational replies forever.
    pub delete_info_after_seconds: i64,
    pub log_level: String,
    /// Read once at startup; changing it needs a restart.
    pub database_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            owner_id: None,
            wait_minutes: DEFAULT_WAIT_MINUTES,
            welcome_template: DEFAULT_WELCOME_TEMPLATE.to_string(),
            welcome_template_file: PathBuf::from(DEFAULT_TEMPLATE_FILE),
            rules_url: None,
            delete_welcome_after_minutes: DEFAULT_DELETE_WELCOME_AFTER_MINUTES,
            delete_info_after_seconds: DEFAULT_DELETE_INFO_AFTER_SECONDS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

impl Config {
    /// Load a fresh snapshot, using built-in defaults for anything the file omits.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_over(path, &Config::default())
    }

    /// Load a snapshot from `path`, falling back to `prev` for optional keys that are
    /// missing or malformed.
    ///
    /// Fails without side effects when the file is unreadable or has no token.
    pub fn load_over(path: &Path, prev: &Config) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let parsed: RawConfig = toml::from_str(&raw)?;
        let Some(bot) = parsed.bot else {
            return Err(Error::Config(format!(
                "[bot] table not found in {}",
                path.display()
            )));
        };

        let bot_token = bot
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::ConfigMissing {
                path: path.to_path_buf(),
                reason: "bot.token is missing or empty".to_string(),
            })?;

        let owner_id = match bot.owner_id.as_ref().and_then(int_value) {
            Some(id) => Some(UserId(id)),
            None => {
                warn!(
                    "bot.owner_id is missing or malformed in {}; admin commands in private chats are disabled",
                    path.display()
                );
                None
            }
        };

        let wait_minutes = match bot.wait_minutes.as_ref() {
            None => prev.wait_minutes,
            Some(v) => match int_value(v).and_then(|n| u32::try_from(n).ok()) {
                Some(n) => n,
                None => {
                    warn!(
                        "bot.wait_minutes must be a non-negative integer; keeping {}",
                        prev.wait_minutes
                    );
                    prev.wait_minutes
                }
            },
        };

        let delete_welcome_after_minutes = int_or(
            bot.delete_welcome_after_minutes.as_ref(),
            "delete_welcome_after_minutes",
            prev.delete_welcome_after_minutes,
        );
        let delete_info_after_seconds = int_or(
            bot.delete_info_after_seconds.as_ref(),
            "delete_info_after_seconds",
            prev.delete_info_after_seconds,
        );

        let welcome_template_file = bot
            .welcome_message_file
            .map(PathBuf::from)
            .unwrap_or_else(|| prev.welcome_template_file.clone());
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let welcome_template =
            load_template(&welcome_template_file, base_dir).unwrap_or_else(|| {
                prev.welcome_template.clone()
            });

        let rules_url = bot
            .rules_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let log_level = bot
            .log_level
            .map(|l| l.trim().to_uppercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| prev.log_level.clone());

        let database_path = bot
            .database_path
            .map(PathBuf::from)
            .unwrap_or_else(|| prev.database_path.clone());

        Ok(Self {
            bot_token,
            owner_id,
            wait_minutes,
            welcome_template,
            welcome_template_file,
            rules_url,
            delete_welcome_after_minutes,
            delete_info_after_seconds,
            log_level,
            database_path,
        })
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(u64::from(self.wait_minutes) * 60)
    }

    pub fn welcome_delete_after_seconds(&self) -> i64 {
        self.delete_welcome_after_minutes.saturating_mul(60)
    }
}

/// Shared, atomically swappable configuration.
///
/// `snapshot()` is the only read path; `reload()` and `persist_wait_minutes()` build a
/// complete new `Config` and replace the pointer, so no reader ever sees a mix of old
/// and new values.
pub struct ConfigHandle {
    path: PathBuf,
    current: RwLock<Arc<Config>>,
    // Serializes writers (reload vs. wait persistence) so neither loses the other's update.
    update: Mutex<()>,
}

impl ConfigHandle {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cfg = Config::load(&path)?;
        Ok(Self::with_config(path, cfg))
    }

    pub fn with_config(path: impl Into<PathBuf>, cfg: Config) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(cfg)),
            update: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<Config> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-read the config file. On failure the current snapshot stays in place.
    pub fn reload(&self) -> Result<Arc<Config>> {
        let _guard = self.update.lock().unwrap_or_else(|p| p.into_inner());
        let prev = self.snapshot();
        let next = Arc::new(Config::load_over(&self.path, &prev)?);
        self.swap(next.clone());
        info!(
            "Configuration reloaded from {} (wait {} min)",
            self.path.display(),
            next.wait_minutes
        );
        Ok(next)
    }

    /// Write `bot.wait_minutes` back to the config file, then publish it in memory.
    ///
    /// Other keys in the file are preserved (comments are not).
    pub fn persist_wait_minutes(&self, minutes: u32) -> Result<Arc<Config>> {
        let _guard = self.update.lock().unwrap_or_else(|p| p.into_inner());

        let mut doc: toml::Table = match fs::read_to_string(&self.path) {
            Ok(raw) => toml::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(e.into()),
        };
        let bot = doc
            .entry("bot")
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let Some(bot) = bot.as_table_mut() else {
            return Err(Error::Config(format!(
                "`bot` in {} is not a table",
                self.path.display()
            )));
        };
        bot.insert(
            "wait_minutes".to_string(),
            toml::Value::Integer(i64::from(minutes)),
        );
        fs::write(&self.path, toml::to_string(&doc)?)?;

        let mut next = (*self.snapshot()).clone();
        next.wait_minutes = minutes;
        let next = Arc::new(next);
        self.swap(next.clone());
        info!(
            "Wait time {minutes} min saved to {}",
            self.path.display()
        );
        Ok(next)
    }

    fn swap(&self, next: Arc<Config>) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next;
    }
}

/// Config file location: `WB_CONFIG`, else `config.toml` in the working directory.
pub fn config_path_from_env() -> PathBuf {
    env::var_os("WB_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    bot: Option<RawBot>,
}

// Numeric keys stay as raw values so a malformed entry degrades to a warning instead of
// failing the whole file.
#[derive(Debug, Default, Deserialize)]
struct RawBot {
    token: Option<String>,
    owner_id: Option<toml::Value>,
    wait_minutes: Option<toml::Value>,
    welcome_message_file: Option<String>,
    rules_url: Option<String>,
    delete_welcome_after_minutes: Option<toml::Value>,
    delete_info_after_seconds: Option<toml::Value>,
    log_level: Option<String>,
    database_path: Option<String>,
}

fn int_value(v: &toml::Value) -> Option<i64> {
    match v {
        toml::Value::Integer(n) => Some(*n),
        toml::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn int_or(v: Option<&toml::Value>, key: &str, fallback: i64) -> i64 {
    let Some(v) = v else {
        return fallback;
    };
    int_value(v).unwrap_or_else(|| {
        warn!("bot.{key} is not an integer; keeping {fallback}");
        fallback
    })
}

fn load_template(file: &Path, base_dir: &Path) -> Option<String> {
    let resolved = if file.is_file() {
        file.to_path_buf()
    } else {
        base_dir.join(file)
    };

    match fs::read_to_string(&resolved) {
        Ok(text) if !text.trim().is_empty() => {
            info!("Welcome template loaded from {}", resolved.display());
            Some(text)
        }
        Ok(_) => {
            warn!(
                "Welcome template file {} is empty; keeping the previous template",
                resolved.display()
            );
            None
        }
        Err(e) => {
            warn!(
                "Cannot read welcome template {}: {e}; keeping the previous template",
                resolved.display()
            );
            None
        }
    }
}
