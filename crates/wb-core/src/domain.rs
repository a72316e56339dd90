/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Account data as reported by the platform (join event or live member lookup).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_bot: bool,
}

impl UserProfile {
    /// `first last`, or just `first` when there is no last name.
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

/// Membership status of a user in a chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Creator | Self::Administrator)
    }

    pub fn is_gone(self) -> bool {
        matches!(self, Self::Left | Self::Kicked)
    }
}

/// Live member lookup result.
#[derive(Clone, Debug)]
pub struct ChatMember {
    pub user: UserProfile,
    pub status: MemberStatus,
    /// Only meaningful for `Restricted`; every other present status can post.
    pub can_send_messages: bool,
}

impl ChatMember {
    pub fn can_post(&self) -> bool {
        match self.status {
            MemberStatus::Left | MemberStatus::Kicked => false,
            MemberStatus::Restricted => self.can_send_messages,
            _ => true,
        }
    }
}
