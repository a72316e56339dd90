use crate::domain::{ChatId, MessageId, UserProfile};

/// How the platform should interpret outgoing text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Markup {
    Plain,
    Html,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendOptions {
    pub markup: Markup,
    pub disable_link_preview: bool,
    pub reply_to: Option<MessageId>,
}

impl SendOptions {
    pub fn plain() -> Self {
        Self {
            markup: Markup::Plain,
            disable_link_preview: false,
            reply_to: None,
        }
    }

    /// HTML without link previews (welcomes, template previews).
    pub fn html() -> Self {
        Self {
            markup: Markup::Html,
            disable_link_preview: true,
            reply_to: None,
        }
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// One or more accounts were added to a chat.
#[derive(Clone, Debug)]
pub struct JoinEvent {
    pub chat_id: ChatId,
    pub members: Vec<UserProfile>,
}

/// A slash command addressed to the bot.
#[derive(Clone, Debug)]
pub struct CommandRequest {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub requester: UserProfile,
    pub is_private_chat: bool,
    /// Lowercased, without `/` or `@botname`.
    pub name: String,
    /// The `@botname` suffix, if the command carried one.
    pub target: Option<String>,
    pub args: String,
    /// Text of the message this command replies to, if any.
    pub reply_text: Option<String>,
}

impl CommandRequest {
    /// Commands without a suffix go to every bot in the chat. A suffix must name us;
    /// if our own username is unknown, suffixed commands are not ours.
    pub fn is_addressed_to(&self, bot_username: Option<&str>) -> bool {
        match (self.target.as_deref(), bot_username) {
            (None, _) => true,
            (Some(target), Some(me)) => target.eq_ignore_ascii_case(me.trim_start_matches('@')),
            (Some(_), None) => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub target: Option<String>,
    pub args: String,
}

/// Split `/cmd@bot arg1 ...` into name `cmd`, target `bot` and args `arg1 ...`.
pub fn parse_command(text: &str) -> ParsedCommand {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let args = parts.next().unwrap_or("").trim().to_string();

    let mut head = first.trim_start_matches('/').splitn(2, '@');
    let name = head.next().unwrap_or("").to_lowercase();
    let target = head
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    ParsedCommand { name, target, args }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::user;

    #[test]
    fn parses_command_with_bot_suffix_and_args() {
        let parsed = parse_command("/SetDelay@welcome_bot  15 ");
        assert_eq!(parsed.name, "setdelay");
        assert_eq!(parsed.target.as_deref(), Some("welcome_bot"));
        assert_eq!(parsed.args, "15");

        let parsed = parse_command("/setwelcome <b>Hi</b>\n{mention}");
        assert_eq!(parsed.name, "setwelcome");
        assert_eq!(parsed.target, None);
        assert_eq!(parsed.args, "<b>Hi</b>\n{mention}");

        assert_eq!(
            parse_command("/start"),
            ParsedCommand {
                name: "start".to_string(),
                target: None,
                args: String::new(),
            }
        );
    }

    fn request(target: Option<&str>) -> CommandRequest {
        CommandRequest {
            chat_id: ChatId(-1),
            message_id: MessageId(1),
            requester: user(5, "Ann"),
            is_private_chat: false,
            name: "start".to_string(),
            target: target.map(str::to_string),
            args: String::new(),
            reply_text: None,
        }
    }

    #[test]
    fn suffix_must_name_this_bot() {
        assert!(request(None).is_addressed_to(Some("welcome_bot")));
        assert!(request(None).is_addressed_to(None));
        assert!(request(Some("Welcome_Bot")).is_addressed_to(Some("welcome_bot")));
        assert!(!request(Some("OtherBot")).is_addressed_to(Some("welcome_bot")));
        assert!(!request(Some("welcome_bot")).is_addressed_to(None));
    }
}
