use wb_core::{domain::ChatId, messaging::types::JoinEvent};

use teloxide::types::Message;

use crate::{profile_from, router::AppState};

pub(super) async fn handle_new_members(msg: &Message, state: &AppState) {
    let Some(users) = msg.new_chat_members() else {
        return;
    };
    let event = JoinEvent {
        chat_id: ChatId(msg.chat.id.0),
        members: users.iter().map(profile_from).collect(),
    };
    state.onboarding.handle_join(&event).await;
}
