//! Bot commands: public `/start` plus the admin set.
//!
//! Every admin command passes through [`authorize`] first. Informational replies are
//! plain text, threaded to the command and removed after `delete_info_after_seconds`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    errors::Error,
    logging::LogHandle,
    messaging::types::{CommandRequest, SendOptions},
    onboarding::Onboarding,
    render::PLACEHOLDERS,
    security::{authorize, AuthDecision},
    Result,
};

const DENIED: &str =
    "This command is only available to group admins (or the bot owner in private chat).";
const CHECK_FAILED: &str = "Could not verify your permissions. Try again later.";
const SET_DELAY_USAGE: &str = "Usage: /setdelay <minutes>\nExample: /setdelay 15";
const SET_WELCOME_USAGE: &str = "Usage:\n\
1. Reply to a message containing the HTML template with /setwelcome.\n\
2. Or send /setwelcome <HTML template on one line>";
const TEST_HEADER: &str = "-- Test welcome message --";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    SetDelay,
    ReloadConfig,
    TestWelcome,
    SetWelcome,
    ShowWelcome,
    ResetWelcome,
}

impl AdminCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        let cmd = match name {
            "setdelay" => Self::SetDelay,
            "reloadconfig" => Self::ReloadConfig,
            "testwelcome" => Self::TestWelcome,
            "setwelcome" => Self::SetWelcome,
            "showwelcome" => Self::ShowWelcome,
            "resetwelcome" => Self::ResetWelcome,
            _ => return None,
        };
        Some(cmd)
    }
}

pub struct CommandService {
    ob: Onboarding,
    log: Option<Arc<LogHandle>>,
    bot_username: Option<String>,
}

impl CommandService {
    pub fn new(ob: Onboarding) -> Self {
        Self {
            ob,
            log: None,
            bot_username: None,
        }
    }

    /// Our own username, so `/cmd@OtherBot` is left to the other bot.
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Let `/reloadconfig` apply a changed `log_level`.
    pub fn with_log_handle(mut self, log: Arc<LogHandle>) -> Self {
        self.log = Some(log);
        self
    }

    /// Dispatch one command. Errors are failed replies; the caller only logs them.
    pub async fn handle(&self, req: &CommandRequest) -> Result<()> {
        if !req.is_addressed_to(self.bot_username.as_deref()) {
            debug!(
                "Ignoring /{}@{} in chat {}",
                req.name,
                req.target.as_deref().unwrap_or_default(),
                req.chat_id.0
            );
            return Ok(());
        }
        if req.name == "start" {
            return self.start(req).await;
        }
        let Some(cmd) = AdminCommand::from_name(&req.name) else {
            debug!("Ignoring unknown command /{} in chat {}", req.name, req.chat_id.0);
            return Ok(());
        };

        info!(
            "/{} from {} in chat {}",
            req.name, req.requester.id.0, req.chat_id.0
        );
        if !self.guard(req).await? {
            return Ok(());
        }

        match cmd {
            AdminCommand::SetDelay => self.set_delay(req).await,
            AdminCommand::ReloadConfig => self.reload_config(req).await,
            AdminCommand::TestWelcome => self.test_welcome(req).await,
            AdminCommand::SetWelcome => self.set_welcome(req).await,
            AdminCommand::ShowWelcome => self.show_welcome(req).await,
            AdminCommand::ResetWelcome => self.reset_welcome(req).await,
        }
    }

    async fn guard(&self, req: &CommandRequest) -> Result<bool> {
        let cfg = self.ob.cfg.snapshot();
        match authorize(self.ob.port.as_ref(), &cfg, req).await {
            AuthDecision::Proceed => Ok(true),
            AuthDecision::Denied => {
                warn!(
                    "{} tried /{} in chat {} without admin rights",
                    req.requester.id.0, req.name, req.chat_id.0
                );
                self.reply_info(req, DENIED).await?;
                Ok(false)
            }
            AuthDecision::CheckFailed(_) => {
                self.reply_info(req, CHECK_FAILED).await?;
                Ok(false)
            }
        }
    }

    async fn reply_info(&self, req: &CommandRequest, text: &str) -> Result<()> {
        let msg = self
            .ob
            .port
            .send_message(
                req.chat_id,
                text,
                SendOptions::plain().reply_to(req.message_id),
            )
            .await?;
        let delay = self.ob.cfg.snapshot().delete_info_after_seconds;
        self.ob.reaper.schedule_delete(msg, delay);
        Ok(())
    }

    async fn start(&self, req: &CommandRequest) -> Result<()> {
        let wait = self.ob.cfg.snapshot().wait_minutes;
        let text = format!(
            "Bot is running! I welcome new members after {wait} minutes if they are still in the group and can post."
        );
        self.reply_info(req, &text).await
    }

    async fn set_delay(&self, req: &CommandRequest) -> Result<()> {
        let parsed = req
            .args
            .split_whitespace()
            .next()
            .and_then(|a| a.parse::<i64>().ok());
        let reply = match parsed {
            None => SET_DELAY_USAGE.to_string(),
            Some(n) if n < 0 => "The wait time cannot be negative.".to_string(),
            Some(n) => match u32::try_from(n) {
                Err(_) => SET_DELAY_USAGE.to_string(),
                Ok(minutes) => match self.ob.cfg.persist_wait_minutes(minutes) {
                    Ok(_) => {
                        info!(
                            "{} changed the wait time to {minutes} min in chat {}",
                            req.requester.id.0, req.chat_id.0
                        );
                        format!("Wait time changed to {minutes} minutes. Settings saved.")
                    }
                    Err(e) => {
                        warn!("Saving wait_minutes={minutes} failed: {e}");
                        "Could not save the new wait time. Check the logs.".to_string()
                    }
                },
            },
        };
        self.reply_info(req, &reply).await
    }

    async fn reload_config(&self, req: &CommandRequest) -> Result<()> {
        let reply = match self.ob.cfg.reload() {
            Ok(cfg) => {
                if let Some(log) = &self.log {
                    if let Err(e) = log.set_level(&cfg.log_level) {
                        warn!("{e}");
                    }
                }
                reload_summary(&cfg)
            }
            Err(e) => {
                warn!("Config reload requested by {} failed: {e}", req.requester.id.0);
                format!(
                    "Reloading the configuration failed: {e}\nThe previous settings stay in effect. Check the logs."
                )
            }
        };
        self.reply_info(req, &reply).await
    }

    async fn test_welcome(&self, req: &CommandRequest) -> Result<()> {
        let chat_id = req.chat_id;
        let text = match self.ob.composer.compose(chat_id, &req.requester).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!("Test welcome requested in chat {} but no template is loaded", chat_id.0);
                return self
                    .reply_info(req, "The welcome template is empty or not loaded; cannot send a test.")
                    .await;
            }
            Err(Error::MissingPlaceholder { key }) => {
                warn!("Test welcome in chat {}: unknown placeholder {{{key}}}", chat_id.0);
                let available = PLACEHOLDERS
                    .iter()
                    .map(|p| format!("{{{p}}}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let reply = format!(
                    "Welcome template error: unknown placeholder {{{key}}}.\nAvailable placeholders: {available}"
                );
                return self.reply_info(req, &reply).await;
            }
            Err(e) => {
                return self
                    .reply_info(req, &format!("Sending the test welcome failed: {e}"))
                    .await;
            }
        };

        let cfg = self.ob.cfg.snapshot();
        let header = match self
            .ob
            .port
            .send_message(chat_id, TEST_HEADER, SendOptions::plain())
            .await
        {
            Ok(header) => header,
            Err(e) => return self.report_test_failure(req, e).await,
        };
        self.ob
            .reaper
            .schedule_delete(header, cfg.delete_info_after_seconds.saturating_mul(2));

        match self
            .ob
            .port
            .send_message(chat_id, &text, SendOptions::html())
            .await
        {
            Ok(welcome) => {
                info!("{} tested the welcome in chat {}", req.requester.id.0, chat_id.0);
                self.ob
                    .reaper
                    .schedule_delete(welcome, cfg.welcome_delete_after_seconds());
                Ok(())
            }
            Err(e) => self.report_test_failure(req, e).await,
        }
    }

    async fn report_test_failure(&self, req: &CommandRequest, e: Error) -> Result<()> {
        warn!("Test welcome in chat {} failed: {e}", req.chat_id.0);
        self.reply_info(req, &format!("Sending the test welcome failed: {e}"))
            .await
    }

    async fn set_welcome(&self, req: &CommandRequest) -> Result<()> {
        let template = req
            .reply_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| Some(req.args.as_str()).filter(|a| !a.trim().is_empty()));

        let Some(template) = template else {
            return self.reply_info(req, SET_WELCOME_USAGE).await;
        };
        self.ob
            .settings
            .set_welcome_template(req.chat_id, Some(template));
        self.reply_info(req, "Welcome template saved for this chat.")
            .await
    }

    async fn show_welcome(&self, req: &CommandRequest) -> Result<()> {
        let Some(template) = self.ob.settings.get(req.chat_id).welcome_template else {
            return self
                .reply_info(req, "This chat uses the default welcome template.")
                .await;
        };

        let shown = self
            .ob
            .port
            .send_message(
                req.chat_id,
                &template,
                SendOptions::html().reply_to(req.message_id),
            )
            .await;
        if let Err(e) = shown {
            warn!("Showing the template of chat {} failed: {e}", req.chat_id.0);
            return self
                .reply_info(req, &format!("Could not show the template: {e}"))
                .await;
        }
        Ok(())
    }

    async fn reset_welcome(&self, req: &CommandRequest) -> Result<()> {
        self.ob.settings.set_welcome_template(req.chat_id, None);
        self.reply_info(
            req,
            "Welcome template for this chat reset. The global template is used.",
        )
        .await
    }
}

fn reload_summary(cfg: &Config) -> String {
    let rules = cfg.rules_url.as_deref().unwrap_or("not set");
    let delete_welcome = if cfg.delete_welcome_after_minutes > 0 {
        format!("{} min", cfg.delete_welcome_after_minutes)
    } else {
        "never".to_string()
    };
    let delete_info = if cfg.delete_info_after_seconds > 0 {
        format!("{} s", cfg.delete_info_after_seconds)
    } else {
        "never".to_string()
    };
    let owner = cfg
        .owner_id
        .map(|o| o.0.to_string())
        .unwrap_or_else(|| "not set".to_string());

    format!(
        "Configuration and welcome template reloaded.\n\
Wait time: {} minutes.\n\
Template file: {}\n\
Rules URL: {rules}\n\
Delete welcomes: {delete_welcome}\n\
Delete info messages: {delete_info}\n\
Owner ID: {owner}\n\
Log level: {}",
        cfg.wait_minutes,
        cfg.welcome_template_file.display(),
        cfg.log_level
    )
}
