use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, ChatMember, MessageRef, UserId},
    messaging::{port::ChatPort, types::SendOptions},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// ChatPort decorator that rate-limits outbound calls.
///
/// A burst of joins (or a mass deletion when many welcomes expire together) is spread
/// out instead of tripping Telegram 429s. Member lookups only take the global slot.
pub struct ThrottledPort {
    inner: Arc<dyn ChatPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledPort {
    pub fn new(inner: Arc<dyn ChatPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        if let Some(lim) = map.get(&chat_id) {
            return lim.clone();
        }

        // Drop limiters whose slot has passed and that no caller holds.
        let now = Instant::now();
        map.retain(|_, lim| {
            Arc::strong_count(lim) > 1 || lim.try_lock().map_or(true, |l| l.next > now)
        });

        let lim = Arc::new(Mutex::new(IntervalLimiter::new(
            self.cfg.per_chat_min_interval,
        )));
        map.insert(chat_id, lim.clone());
        lim
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl ChatPort for ThrottledPort {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: SendOptions,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_message(chat_id, text, opts).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.delete_message(msg).await
    }

    async fn get_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMember> {
        self.throttle_global().await;
        self.inner.get_member(chat_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePort;

    #[tokio::test(start_paused = true)]
    async fn spaces_sends_to_the_same_chat() {
        let fake = Arc::new(FakePort::default());
        let port = ThrottledPort::new(
            fake.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(0),
                per_chat_min_interval: Duration::from_secs(1),
            },
        );

        let start = Instant::now();
        for _ in 0..3 {
            port.send_message(ChatId(1), "x", SendOptions::plain())
                .await
                .unwrap();
        }
        assert!(Instant::now() - start >= Duration::from_secs(2));
        assert_eq!(fake.sent().len(), 3);

        // A different chat is not held back by the first one.
        let before = Instant::now();
        port.send_message(ChatId(2), "y", SendOptions::plain())
            .await
            .unwrap();
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_chat_limiters_are_released() {
        let port = ThrottledPort::new(
            Arc::new(FakePort::default()),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(0),
                per_chat_min_interval: Duration::from_secs(1),
            },
        );

        for chat in [1, 2] {
            port.send_message(ChatId(chat), "x", SendOptions::plain())
                .await
                .unwrap();
        }
        // Both slots are still in the future.
        port.send_message(ChatId(3), "x", SendOptions::plain())
            .await
            .unwrap();
        assert_eq!(port.per_chat.lock().await.len(), 3);

        sleep(Duration::from_secs(2)).await;
        port.send_message(ChatId(4), "x", SendOptions::plain())
            .await
            .unwrap();
        let map = port.per_chat.lock().await;
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&4));
    }
}
