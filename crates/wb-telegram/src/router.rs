use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use wb_core::{
    commands::CommandService,
    config::ConfigHandle,
    logging::LogHandle,
    messaging::{
        port::ChatPort,
        throttled::{ThrottleConfig, ThrottledPort},
    },
    onboarding::Onboarding,
    store::Database,
    tasks::TaskKind,
};

use crate::handlers;
use crate::TelegramPort;

#[derive(Clone)]
pub struct AppState {
    pub onboarding: Onboarding,
    pub commands: Arc<CommandService>,
}

/// Long-poll Telegram until Ctrl-C.
///
/// The bot token is taken from the snapshot at startup; a reloaded token needs a restart.
pub async fn run_polling(
    cfg: Arc<ConfigHandle>,
    db: Arc<Database>,
    log: Option<Arc<LogHandle>>,
) -> anyhow::Result<()> {
    let snapshot = cfg.snapshot();
    let bot = Bot::new(snapshot.bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("Welcome bot started as @{}", me.username());
            me.user.username.clone()
        }
        Err(e) => {
            warn!("getMe failed: {e}; commands with an @botname suffix will be ignored");
            None
        }
    };
    info!(
        "Waiting {} min before welcoming; config {}",
        snapshot.wait_minutes,
        cfg.path().display()
    );

    // Spread bursts of joins and expiring welcomes; RetryAfter is still retried once
    // at the Telegram layer.
    let raw_port: Arc<dyn ChatPort> = Arc::new(TelegramPort::new(bot.clone()));
    let port: Arc<dyn ChatPort> =
        Arc::new(ThrottledPort::new(raw_port, ThrottleConfig::default()));

    let onboarding = Onboarding::new(cfg, db, port);
    let mut commands = CommandService::new(onboarding.clone());
    if let Some(log) = log {
        commands = commands.with_log_handle(log);
    }
    if let Some(username) = bot_username {
        commands = commands.with_bot_username(username);
    }

    let state = Arc::new(AppState {
        onboarding: onboarding.clone(),
        commands: Arc::new(commands),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    let pool = &onboarding.pool;
    info!(
        "Stopped; dropping {} pending verifications and {} pending deletions",
        pool.pending(TaskKind::Verification),
        pool.pending(TaskKind::Deletion)
    );
    Ok(())
}
