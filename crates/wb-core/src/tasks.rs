//! Supervised pool for the bot's delayed background tasks.
//!
//! Tasks are keyed for observability only; there is no way to cancel
//! one once it is spawned.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::domain::ChatId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Verification,
    Deletion,
}

/// `(chat, subject, kind)`; the subject is a user id for verifications and a
/// message id for deletions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub chat_id: ChatId,
    pub subject: i64,
    pub kind: TaskKind,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TaskKind::Verification => "verify",
            TaskKind::Deletion => "delete",
        };
        write!(f, "{kind}:{}:{}", self.chat_id.0, self.subject)
    }
}

#[derive(Clone, Default)]
pub struct TaskPool {
    inner: Arc<PoolInner>,
}

#[derive(Default)]
struct PoolInner {
    tracker: TaskTracker,
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, TaskKey>>,
}

// Unregisters the task even if its future panics.
struct ActiveGuard {
    inner: Arc<PoolInner>,
    id: u64,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut active = self
            .inner
            .active
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        active.remove(&self.id);
    }
}

impl TaskPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` onto the current Tokio runtime under `key`.
    pub fn spawn<F>(&self, key: TaskKey, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id, key);
        debug!("Task {key} spawned");

        let guard = ActiveGuard {
            inner: self.inner.clone(),
            id,
        };
        self.inner.tracker.spawn(async move {
            let _guard = guard;
            fut.await;
        });
    }

    /// Keys of tasks that have not finished yet (duplicates allowed).
    pub fn active(&self) -> Vec<TaskKey> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .copied()
            .collect()
    }

    pub fn pending(&self, kind: TaskKind) -> usize {
        self.active().iter().filter(|k| k.kind == kind).count()
    }

    /// Wait until every task spawned so far has finished.
    ///
    /// Tasks spawned while waiting are waited for as well; the pool stays usable.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(subject: i64, kind: TaskKind) -> TaskKey {
        TaskKey {
            chat_id: ChatId(1),
            subject,
            kind,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tracks_tasks_until_they_finish() {
        let pool = TaskPool::new();
        pool.spawn(key(1, TaskKind::Verification), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        pool.spawn(key(1, TaskKind::Verification), async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        pool.spawn(key(9, TaskKind::Deletion), async {});

        assert_eq!(pool.pending(TaskKind::Verification), 2);

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(pool.pending(TaskKind::Verification), 1);
        assert_eq!(pool.pending(TaskKind::Deletion), 0);

        pool.drain().await;
        assert!(pool.active().is_empty());
    }

    #[tokio::test]
    async fn panicking_task_is_unregistered() {
        let pool = TaskPool::new();
        pool.spawn(key(3, TaskKind::Deletion), async {
            panic!("boom");
        });
        pool.drain().await;
        assert!(pool.active().is_empty());
    }

    #[test]
    fn key_display_is_compact() {
        assert_eq!(key(42, TaskKind::Deletion).to_string(), "delete:1:42");
    }
}
