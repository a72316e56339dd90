use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use crate::{errors::Error, Result};

/// Handle to the installed log filter, used to apply `log_level` on config reload.
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    service_name: String,
    // `RUST_LOG` wins over the config file for the whole process lifetime.
    env_override: bool,
}

/// Initialize logging/tracing for the bot.
///
/// `level` uses the config file's vocabulary (`DEBUG`, `INFO`, `WARNING`, ...).
pub fn init(service_name: &str, level: &str) -> Result<LogHandle> {
    let env_override = std::env::var_os("RUST_LOG").is_some();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(service_name, level));
    let (filter_layer, filter) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(false).with_ansi(true))
        .try_init()
        .map_err(|e| Error::Config(format!("cannot install logger: {e}")))?;

    Ok(LogHandle {
        filter,
        service_name: service_name.to_string(),
        env_override,
    })
}

impl LogHandle {
    pub fn set_level(&self, level: &str) -> Result<()> {
        if self.env_override {
            tracing::debug!("RUST_LOG is set; ignoring log_level={level}");
            return Ok(());
        }
        self.filter
            .reload(default_filter(&self.service_name, level))
            .map_err(|e| Error::Config(format!("cannot change log level: {e}")))?;
        tracing::info!("Log level set to {level}");
        Ok(())
    }
}

fn default_filter(service_name: &str, level: &str) -> EnvFilter {
    // Ours at the configured level, dependencies at warn.
    let lvl = level_directive(level);
    EnvFilter::new(format!(
        "warn,{service_name}={lvl},wb_core={lvl},wb_telegram={lvl}"
    ))
}

pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_config_level_names() {
        assert_eq!(level_directive("warning"), "warn");
        assert_eq!(level_directive("CRITICAL"), "error");
        assert_eq!(level_directive(" debug "), "debug");
        assert_eq!(level_directive("verbose"), "info");
    }
}
