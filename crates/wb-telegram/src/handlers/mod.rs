//! Telegram update handlers.
//!
//! Each handler is a thin mapping from a teloxide `Message` to a core request; all
//! decisions happen in `wb-core`.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;
mod members;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if msg.new_chat_members().is_some() {
        members::handle_new_members(&msg, &state).await;
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(&msg, text, &state).await;
        }
    }

    Ok(())
}
