//! Wiring of the join path: ledger, composer, reaper and scheduler share one pool.

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    config::ConfigHandle,
    ledger::MembershipLedger,
    messaging::{port::ChatPort, types::JoinEvent},
    reaper::Reaper,
    scheduler::{VerificationScheduler, VerificationTask},
    settings::SettingsStore,
    store::Database,
    tasks::TaskPool,
    welcome::WelcomeComposer,
};

#[derive(Clone)]
pub struct Onboarding {
    pub cfg: Arc<ConfigHandle>,
    pub port: Arc<dyn ChatPort>,
    pub settings: SettingsStore,
    pub ledger: MembershipLedger,
    pub composer: WelcomeComposer,
    pub reaper: Reaper,
    pub scheduler: VerificationScheduler,
    pub pool: TaskPool,
}

impl Onboarding {
    pub fn new(cfg: Arc<ConfigHandle>, db: Arc<Database>, port: Arc<dyn ChatPort>) -> Self {
        let pool = TaskPool::new();
        let settings = SettingsStore::new(db.clone());
        let ledger = MembershipLedger::new(db);
        let composer = WelcomeComposer::new(cfg.clone(), settings.clone(), ledger.clone());
        let reaper = Reaper::new(port.clone(), pool.clone());
        let scheduler = VerificationScheduler::new(
            cfg.clone(),
            port.clone(),
            composer.clone(),
            reaper.clone(),
            pool.clone(),
        );
        Self {
            cfg,
            port,
            settings,
            ledger,
            composer,
            reaper,
            scheduler,
            pool,
        }
    }

    /// Record every added account; schedule verification for humans only.
    ///
    /// Ledger writes run on the blocking pool. A failed write is logged and the
    /// members are still scheduled.
    pub async fn handle_join(&self, event: &JoinEvent) -> Vec<VerificationTask> {
        let ledger = self.ledger.clone();
        let chat_id = event.chat_id;
        let members = event.members.clone();
        let recorded = tokio::task::spawn_blocking(move || {
            for member in &members {
                ledger.record(chat_id, member);
            }
        })
        .await;
        if let Err(e) = recorded {
            error!("Recording joins in chat {} failed: {e}", chat_id.0);
        }

        let mut scheduled = Vec::new();
        for member in &event.members {
            if member.is_bot {
                info!(
                    "Bot {} added to chat {}; no welcome",
                    member.id.0, event.chat_id.0
                );
                continue;
            }
            scheduled.push(self.scheduler.schedule(event.chat_id, member));
        }
        scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        domain::{ChatId, MemberStatus},
        tasks::TaskKind,
        testing::{user, FakePort},
    };

    #[tokio::test(start_paused = true)]
    async fn humans_are_scheduled_and_bots_only_recorded() {
        let cfg = Arc::new(ConfigHandle::with_config(
            "config.toml",
            Config {
                bot_token: "t".to_string(),
                wait_minutes: 1,
                delete_welcome_after_minutes: 0,
                welcome_template: "Hi {user_firstname}, member #{monthly_join_count}".to_string(),
                ..Config::default()
            },
        ));
        let db = Arc::new(Database::open_in_memory().unwrap());
        let port = Arc::new(FakePort::default());
        let ob = Onboarding::new(cfg, db, port.clone());

        let chat = ChatId(-100);
        let ann = user(1, "Ann");
        let bob = user(2, "Bob");
        let mut helper = user(3, "HelperBot");
        helper.is_bot = true;
        for u in [&ann, &bob, &helper] {
            port.set_status(chat, u, MemberStatus::Member);
        }

        let tasks = ob.handle_join(&JoinEvent {
            chat_id: chat,
            members: vec![ann, bob, helper],
        })
        .await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(ob.pool.pending(TaskKind::Verification), 2);
        assert_eq!(ob.ledger.monthly_join_count(chat), 2);

        ob.pool.drain().await;
        let mut texts = port.sent_texts();
        texts.sort();
        assert_eq!(
            texts,
            vec![
                "Hi Ann, member #2".to_string(),
                "Hi Bob, member #2".to_string()
            ]
        );
    }
}
