use teloxide::{prelude::*, types::Message};
use tracing::{debug, error};

use wb_core::{
    domain::{ChatId, MessageId},
    messaging::types::{parse_command, CommandRequest},
};

use crate::{entities::message_html, profile_from, router::AppState};

pub(super) async fn handle_command(
    msg: &Message,
    text: &str,
    state: &AppState,
) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        debug!("Command without sender in chat {}", msg.chat.id.0);
        return Ok(());
    };

    let parsed = parse_command(text);
    let req = CommandRequest {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        requester: profile_from(user),
        is_private_chat: msg.chat.is_private(),
        name: parsed.name,
        target: parsed.target,
        args: parsed.args,
        reply_text: msg.reply_to_message().and_then(|m| {
            m.text()
                .map(|t| message_html(t, m.entities().unwrap_or_default()))
        }),
    };

    if let Err(e) = state.commands.handle(&req).await {
        error!(
            "/{} from {} in chat {} failed: {e}",
            req.name, req.requester.id.0, req.chat_id.0
        );
    }
    Ok(())
}
