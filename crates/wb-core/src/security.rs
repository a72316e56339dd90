use tracing::warn;

use crate::{
    config::Config,
    errors::Error,
    messaging::{port::ChatPort, types::CommandRequest},
};

// ============== Admin guard ==============

/// Result of the admin check run in front of every admin command.
#[derive(Debug)]
pub enum AuthDecision {
    Proceed,
    Denied,
    /// The platform lookup itself failed; treated as a denial but reported apart.
    CheckFailed(Error),
}

impl AuthDecision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Private chat: only the configured owner. Group: creators and administrators.
pub async fn authorize(port: &dyn ChatPort, cfg: &Config, req: &CommandRequest) -> AuthDecision {
    if req.is_private_chat {
        return match cfg.owner_id {
            Some(owner) if owner == req.requester.id => AuthDecision::Proceed,
            _ => AuthDecision::Denied,
        };
    }

    match port.get_member(req.chat_id, req.requester.id).await {
        Ok(member) if member.status.is_admin() => AuthDecision::Proceed,
        Ok(_) => AuthDecision::Denied,
        Err(e) => {
            warn!(
                "Admin check for {} in chat {} failed: {e}",
                req.requester.id.0, req.chat_id.0
            );
            AuthDecision::CheckFailed(e)
        }
    }
}
