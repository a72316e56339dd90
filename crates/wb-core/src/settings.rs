//! Per-chat overrides (currently only the welcome template).

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use tracing::{error, info};

use crate::{domain::ChatId, store::Database, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatSettings {
    /// `None` means "use the global default template".
    pub welcome_template: Option<String>,
}

#[derive(Clone)]
pub struct SettingsStore {
    db: Arc<Database>,
}

impl SettingsStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Never fails: store errors are logged and yield the defaults.
    pub fn get(&self, chat_id: ChatId) -> ChatSettings {
        match self.try_get(chat_id) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to read settings for chat {}: {e}", chat_id.0);
                ChatSettings::default()
            }
        }
    }

    /// Upsert the override; `None` clears it but keeps the row.
    ///
    /// Store errors are logged and the call becomes a no-op.
    pub fn set_welcome_template(&self, chat_id: ChatId, template: Option<&str>) {
        match self.try_set_welcome_template(chat_id, template) {
            Ok(()) => info!(
                "Welcome template for chat {} {}",
                chat_id.0,
                if template.is_some() { "updated" } else { "reset" }
            ),
            Err(e) => error!(
                "Failed to save welcome template for chat {}: {e}",
                chat_id.0
            ),
        }
    }

    fn try_get(&self, chat_id: ChatId) -> Result<ChatSettings> {
        self.db.with_conn(|c| {
            let welcome_template = c
                .query_row(
                    "SELECT welcome_template FROM chat_settings WHERE chat_id = ?1",
                    params![chat_id.0],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();
            Ok(ChatSettings { welcome_template })
        })
    }

    fn try_set_welcome_template(&self, chat_id: ChatId, template: Option<&str>) -> Result<()> {
        self.db.with_conn(|c| {
            match template {
                None => {
                    c.execute(
                        "UPDATE chat_settings SET welcome_template = NULL WHERE chat_id = ?1",
                        params![chat_id.0],
                    )?;
                }
                Some(text) => {
                    c.execute(
                        "INSERT INTO chat_settings (chat_id, welcome_template) VALUES (?1, ?2)
                         ON CONFLICT(chat_id) DO UPDATE SET welcome_template = excluded.welcome_template",
                        params![chat_id.0, text],
                    )?;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (Arc<Database>, SettingsStore) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (db.clone(), SettingsStore::new(db))
    }

    #[test]
    fn missing_row_yields_no_override() {
        let (_, s) = store();
        assert_eq!(s.get(ChatId(-100)).welcome_template, None);
    }

    #[test]
    fn set_then_reset_round_trips() {
        let (db, s) = store();
        let chat = ChatId(-100);

        s.set_welcome_template(chat, Some("<b>Hi</b> {mention}"));
        assert_eq!(
            s.get(chat).welcome_template.as_deref(),
            Some("<b>Hi</b> {mention}")
        );

        s.set_welcome_template(chat, Some("second"));
        assert_eq!(s.get(chat).welcome_template.as_deref(), Some("second"));

        s.set_welcome_template(chat, None);
        assert_eq!(s.get(chat).welcome_template, None);

        // Reset keeps the row around.
        let rows: i64 = db
            .with_conn(|c| {
                Ok(c.query_row(
                    "SELECT COUNT(*) FROM chat_settings WHERE chat_id = ?1",
                    params![chat.0],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn reset_without_row_is_a_noop() {
        let (_, s) = store();
        s.set_welcome_template(ChatId(5), None);
        s.set_welcome_template(ChatId(5), None);
        assert_eq!(s.get(ChatId(5)), ChatSettings::default());
    }

    #[test]
    fn overrides_are_per_chat() {
        let (_, s) = store();
        s.set_welcome_template(ChatId(1), Some("one"));
        assert_eq!(s.get(ChatId(2)).welcome_template, None);
    }
}
