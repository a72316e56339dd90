use std::sync::Arc;

use crate::{
    config::ConfigHandle,
    domain::{ChatId, UserProfile},
    ledger::MembershipLedger,
    render::{render, WelcomeContext},
    settings::SettingsStore,
    Result,
};

/// Builds the welcome text for a member from the effective template.
#[derive(Clone)]
pub struct WelcomeComposer {
    cfg: Arc<ConfigHandle>,
    settings: SettingsStore,
    ledger: MembershipLedger,
}

impl WelcomeComposer {
    pub fn new(cfg: Arc<ConfigHandle>, settings: SettingsStore, ledger: MembershipLedger) -> Self {
        Self {
            cfg,
            settings,
            ledger,
        }
    }

    /// Chat override if set, else the global template. `None` when both are blank.
    pub fn effective_template(&self, chat_id: ChatId) -> Option<String> {
        self.settings
            .get(chat_id)
            .welcome_template
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                let global = self.cfg.snapshot().welcome_template.clone();
                (!global.trim().is_empty()).then_some(global)
            })
    }

    /// Render the welcome for `user`, trimmed. `Ok(None)` when there is no template.
    ///
    /// The settings and ledger reads run on the blocking pool.
    pub async fn compose(&self, chat_id: ChatId, user: &UserProfile) -> Result<Option<String>> {
        let this = self.clone();
        let user = user.clone();
        tokio::task::spawn_blocking(move || this.compose_blocking(chat_id, &user)).await?
    }

    fn compose_blocking(&self, chat_id: ChatId, user: &UserProfile) -> Result<Option<String>> {
        let Some(template) = self.effective_template(chat_id) else {
            return Ok(None);
        };
        let cfg = self.cfg.snapshot();
        let ctx = WelcomeContext::for_user(
            user,
            cfg.rules_url.as_deref(),
            self.ledger.monthly_join_count(chat_id),
        );
        let text = render(&template, &ctx)?;
        Ok(Some(text.trim().to_string()))
    }
}
