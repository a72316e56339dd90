//! Telegram adapter (teloxide).
//!
//! This crate implements the `wb-core` ChatPort over the Telegram Bot API and turns
//! incoming updates into core join events and command requests.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ChatMemberKind, ParseMode, User},
};

use tokio::time::sleep;

pub mod entities;
pub mod handlers;
pub mod router;

use wb_core::{
    domain::{ChatId, ChatMember, MemberStatus, MessageId, MessageRef, UserId, UserProfile},
    errors::Error,
    messaging::{
        port::ChatPort,
        types::{Markup, SendOptions},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramPort {
    bot: Bot,
}

impl TelegramPort {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn tg_user(user_id: UserId) -> teloxide::types::UserId {
        teloxide::types::UserId(user_id.0 as u64)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::debug!("Telegram asked to retry after {d:?}");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl ChatPort for TelegramPort {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: SendOptions,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let mut req = self.bot.send_message(Self::tg_chat(chat_id), text.to_string());
                if opts.markup == Markup::Html {
                    req = req.parse_mode(ParseMode::Html);
                }
                if opts.disable_link_preview {
                    req = req.disable_web_page_preview(true);
                }
                if let Some(reply_to) = opts.reply_to {
                    req = req.reply_to_message_id(Self::tg_msg_id(reply_to));
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }

    async fn get_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMember> {
        let member = self
            .with_retry(|| {
                self.bot
                    .get_chat_member(Self::tg_chat(chat_id), Self::tg_user(user_id))
            })
            .await?;

        let (status, can_send_messages) = member_status(&member.kind);
        Ok(ChatMember {
            user: profile_from(&member.user),
            status,
            can_send_messages,
        })
    }
}

/// Platform role plus whether the member may post.
pub fn member_status(kind: &ChatMemberKind) -> (MemberStatus, bool) {
    match kind {
        ChatMemberKind::Owner(_) => (MemberStatus::Creator, true),
        ChatMemberKind::Administrator(_) => (MemberStatus::Administrator, true),
        ChatMemberKind::Member => (MemberStatus::Member, true),
        ChatMemberKind::Restricted(r) => (MemberStatus::Restricted, r.can_send_messages),
        ChatMemberKind::Left => (MemberStatus::Left, false),
        ChatMemberKind::Banned(_) => (MemberStatus::Kicked, false),
    }
}

pub fn profile_from(user: &User) -> UserProfile {
    UserProfile {
        id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        is_bot: user.is_bot,
    }
}
