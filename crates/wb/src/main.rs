use std::sync::Arc;

use tracing::error;

use wb_core::{
    config::{config_path_from_env, ConfigHandle},
    store::Database,
};

#[tokio::main]
async fn main() -> Result<(), wb_core::Error> {
    // Installed before the config is read so its warnings are visible; the configured
    // level is applied right after.
    let log = Arc::new(wb_core::logging::init("wb", "INFO")?);

    let path = config_path_from_env();
    let cfg = match ConfigHandle::load(&path) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Cannot start without a valid config ({}): {e}", path.display());
            return Err(e);
        }
    };
    log.set_level(&cfg.snapshot().log_level)?;

    let db = Arc::new(Database::open(&cfg.snapshot().database_path)?);

    wb_telegram::router::run_polling(cfg, db, Some(log))
        .await
        .map_err(|e| wb_core::Error::Transport(format!("telegram bot failed: {e}")))?;

    Ok(())
}
