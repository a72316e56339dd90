use async_trait::async_trait;

use crate::{
    domain::{ChatId, ChatMember, MessageRef, UserId},
    messaging::types::SendOptions,
    Result,
};

/// Outbound chat-platform operations the core needs.
///
/// Implementations map platform failures into `Error::Transport`; the core never
/// retries them.
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: SendOptions,
    ) -> Result<MessageRef>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn get_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMember>;
}
