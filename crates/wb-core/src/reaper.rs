//! Best-effort delayed deletion of sent messages.

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    domain::MessageRef,
    messaging::port::ChatPort,
    tasks::{TaskKey, TaskKind, TaskPool},
};

#[derive(Clone)]
pub struct Reaper {
    port: Arc<dyn ChatPort>,
    pool: TaskPool,
}

impl Reaper {
    pub fn new(port: Arc<dyn ChatPort>, pool: TaskPool) -> Self {
        Self { port, pool }
    }

    /// Delete `msg` after `delay_seconds`. A non-positive delay keeps the message.
    ///
    /// Returns whether a deletion was scheduled. Failures are logged and dropped;
    /// nothing is retried and pending deletions do not survive a restart.
    pub fn schedule_delete(&self, msg: MessageRef, delay_seconds: i64) -> bool {
        if delay_seconds <= 0 {
            return false;
        }

        let key = TaskKey {
            chat_id: msg.chat_id,
            subject: i64::from(msg.message_id.0),
            kind: TaskKind::Deletion,
        };
        let port = self.port.clone();
        let delay = Duration::from_secs(delay_seconds.unsigned_abs());
        self.pool.spawn(key, async move {
            tokio::time::sleep(delay).await;
            match port.delete_message(msg).await {
                Ok(()) => info!(
                    "Message {} deleted from chat {} after {}s",
                    msg.message_id.0, msg.chat_id.0, delay_seconds
                ),
                Err(e) => warn!(
                    "Could not delete message {} from chat {}: {e}",
                    msg.message_id.0, msg.chat_id.0
                ),
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ChatId, MessageId},
        testing::FakePort,
    };
    use tokio::time::Instant;

    fn msg(id: i32) -> MessageRef {
        MessageRef {
            chat_id: ChatId(-5),
            message_id: MessageId(id),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deletes_after_delay() {
        let port = Arc::new(FakePort::default());
        let pool = TaskPool::new();
        let reaper = Reaper::new(port.clone(), pool.clone());

        let start = Instant::now();
        assert!(reaper.schedule_delete(msg(3), 5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(port.deleted().is_empty());

        pool.drain().await;
        let deleted = port.deleted();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].0, msg(3));
        assert_eq!(deleted[0].1 - start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn non_positive_delay_keeps_message() {
        let port = Arc::new(FakePort::default());
        let pool = TaskPool::new();
        let reaper = Reaper::new(port.clone(), pool.clone());

        assert!(!reaper.schedule_delete(msg(1), 0));
        assert!(!reaper.schedule_delete(msg(2), -10));
        assert!(pool.active().is_empty());
        pool.drain().await;
        assert!(port.deleted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_failure_is_swallowed() {
        let port = Arc::new(FakePort::default());
        FakePort::fail(&port.fail_delete);
        let pool = TaskPool::new();
        let reaper = Reaper::new(port.clone(), pool.clone());

        reaper.schedule_delete(msg(1), 1);
        pool.drain().await;
        assert!(port.deleted().is_empty());
        assert!(pool.active().is_empty());
    }
}
