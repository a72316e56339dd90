//! Delayed membership verification.
//!
//! Each join spawns one task: wait, re-check the member live, then welcome or skip.
//! The wait is fixed when the task is created, so a later reload or `/setdelay` only
//! affects joins that come after it. Tasks cannot be cancelled; a member who leaves
//! and rejoins inside the window gets two independent tasks (and possibly two
//! welcomes).

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    config::ConfigHandle,
    domain::{ChatId, MessageRef, UserId, UserProfile},
    messaging::{port::ChatPort, types::SendOptions},
    reaper::Reaper,
    tasks::{TaskKey, TaskKind, TaskPool},
    welcome::WelcomeComposer,
    Result,
};

#[derive(Clone, Debug)]
pub struct VerificationTask {
    pub chat_id: ChatId,
    pub user_id: UserId,
    /// Only used for logs; the welcome itself uses the live profile.
    pub full_name_at_join: String,
    pub scheduled_at: DateTime<Utc>,
    pub wait: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Left,
    CannotPost,
    NoTemplate,
}

/// Terminal state of a verification; an `Err` from [`VerificationScheduler::verify`]
/// is the failed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    Welcomed(MessageRef),
    Skipped(SkipReason),
}

#[derive(Clone)]
pub struct VerificationScheduler {
    cfg: Arc<ConfigHandle>,
    port: Arc<dyn ChatPort>,
    composer: WelcomeComposer,
    reaper: Reaper,
    pool: TaskPool,
}

impl VerificationScheduler {
    pub fn new(
        cfg: Arc<ConfigHandle>,
        port: Arc<dyn ChatPort>,
        composer: WelcomeComposer,
        reaper: Reaper,
        pool: TaskPool,
    ) -> Self {
        Self {
            cfg,
            port,
            composer,
            reaper,
            pool,
        }
    }

    /// Schedule a verification of `user` in `chat_id` after the current wait.
    pub fn schedule(&self, chat_id: ChatId, user: &UserProfile) -> VerificationTask {
        let task = VerificationTask {
            chat_id,
            user_id: user.id,
            full_name_at_join: user.full_name(),
            scheduled_at: Utc::now(),
            wait: self.cfg.snapshot().wait(),
        };
        info!(
            "Verification of {} ({:?}) in chat {} scheduled in {}s",
            task.user_id.0,
            task.full_name_at_join,
            chat_id.0,
            task.wait.as_secs()
        );

        let key = TaskKey {
            chat_id,
            subject: user.id.0,
            kind: TaskKind::Verification,
        };
        let this = self.clone();
        let t = task.clone();
        self.pool.spawn(key, async move {
            sleep(t.wait).await;
            match this.verify(&t).await {
                Ok(VerificationOutcome::Welcomed(msg)) => info!(
                    "Welcome {} sent to {} in chat {}",
                    msg.message_id.0, t.user_id.0, t.chat_id.0
                ),
                Ok(VerificationOutcome::Skipped(reason)) => info!(
                    "Welcome for {} ({:?}) in chat {} skipped: {reason:?}",
                    t.user_id.0, t.full_name_at_join, t.chat_id.0
                ),
                Err(e) => error!(
                    "Verification of {} ({:?}) in chat {} failed: {e}",
                    t.user_id.0, t.full_name_at_join, t.chat_id.0
                ),
            }
        });
        task
    }

    /// Run the post-wait checks for `task` and send the welcome if they pass.
    pub async fn verify(&self, task: &VerificationTask) -> Result<VerificationOutcome> {
        let member = self.port.get_member(task.chat_id, task.user_id).await?;

        if member.status.is_gone() {
            return Ok(VerificationOutcome::Skipped(SkipReason::Left));
        }
        if !member.can_post() {
            return Ok(VerificationOutcome::Skipped(SkipReason::CannotPost));
        }

        let Some(text) = self.composer.compose(task.chat_id, &member.user).await? else {
            warn!(
                "No welcome template for chat {}; nothing sent",
                task.chat_id.0
            );
            return Ok(VerificationOutcome::Skipped(SkipReason::NoTemplate));
        };

        let msg = self
            .port
            .send_message(task.chat_id, &text, SendOptions::html())
            .await?;

        let delete_after = self.cfg.snapshot().welcome_delete_after_seconds();
        self.reaper.schedule_delete(msg, delete_after);

        Ok(VerificationOutcome::Welcomed(msg))
    }
}
