//! Shared test doubles.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{
    domain::{ChatId, ChatMember, MemberStatus, MessageId, MessageRef, UserId, UserProfile},
    errors::Error,
    messaging::{
        port::ChatPort,
        types::{Markup, SendOptions},
    },
    Result,
};

#[derive(Clone, Debug)]
pub struct SentMessage {
    pub msg: MessageRef,
    pub text: String,
    pub opts: SendOptions,
    pub at: Instant,
}

#[derive(Default)]
pub struct FakePort {
    next_id: Mutex<i32>,
    sent: Mutex<Vec<SentMessage>>,
    deleted: Mutex<Vec<(MessageRef, Instant)>>,
    members: Mutex<HashMap<(i64, i64), ChatMember>>,
    pub fail_member_lookup: AtomicBool,
    pub fail_send: AtomicBool,
    /// Refuse only HTML sends, like Telegram rejecting malformed markup.
    pub fail_html_send: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FakePort {
    pub fn set_member(&self, chat_id: ChatId, member: ChatMember) {
        self.members
            .lock()
            .unwrap()
            .insert((chat_id.0, member.user.id.0), member);
    }

    pub fn set_status(&self, chat_id: ChatId, user: &UserProfile, status: MemberStatus) {
        self.set_member(
            chat_id,
            ChatMember {
                user: user.clone(),
                status,
                can_send_messages: status != MemberStatus::Restricted,
            },
        );
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.text).collect()
    }

    pub fn deleted(&self) -> Vec<(MessageRef, Instant)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatPort for FakePort {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: SendOptions,
    ) -> Result<MessageRef> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Error::Transport("send refused".to_string()));
        }
        if opts.markup == Markup::Html && self.fail_html_send.load(Ordering::SeqCst) {
            return Err(Error::Transport("can't parse entities".to_string()));
        }
        let id = {
            let mut guard = self.next_id.lock().unwrap();
            *guard += 1;
            *guard
        };
        let msg = MessageRef {
            chat_id,
            message_id: MessageId(id),
        };
        self.sent.lock().unwrap().push(SentMessage {
            msg,
            text: text.to_string(),
            opts,
            at: Instant::now(),
        });
        Ok(msg)
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::Transport("message can't be deleted".to_string()));
        }
        self.deleted.lock().unwrap().push((msg, Instant::now()));
        Ok(())
    }

    async fn get_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMember> {
        if self.fail_member_lookup.load(Ordering::SeqCst) {
            return Err(Error::Transport("getChatMember failed".to_string()));
        }
        self.members
            .lock()
            .unwrap()
            .get(&(chat_id.0, user_id.0))
            .cloned()
            .ok_or_else(|| Error::Transport("user not found".to_string()))
    }
}

pub fn user(id: i64, first_name: &str) -> UserProfile {
    UserProfile {
        id: UserId(id),
        username: None,
        first_name: first_name.to_string(),
        last_name: None,
        is_bot: false,
    }
}
