//! Telegram HTML helpers.
//!
//! Everything user-controlled goes through [`escape_html`] before it is placed into
//! markup. The builders here are the only places that emit raw tags.

use crate::domain::UserProfile;

const RULES_LINK_TEXT: &str = "Please read the chat rules.";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// `@handle` when the user has a username, otherwise a clickable `tg://user` link.
pub fn mention_html(user: &UserProfile) -> String {
    if let Some(username) = user.username.as_deref().filter(|u| !u.is_empty()) {
        return format!("@{}", escape_html(username));
    }

    let display = if !user.first_name.trim().is_empty() {
        user.first_name.clone()
    } else if !user.full_name().trim().is_empty() {
        user.full_name()
    } else {
        format!("Member ID:{}", user.id.0)
    };
    format!(
        r#"<a href="tg://user?id={}">{}</a>"#,
        user.id.0,
        escape_html(&display)
    )
}

/// Rules link block, wrapped in newlines; empty when no URL is configured.
pub fn rules_link_html(rules_url: Option<&str>) -> String {
    match rules_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => format!(
            "\n<a href=\"{}\">{}</a>\n",
            escape_html(url),
            escape_html(RULES_LINK_TEXT)
        ),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    fn user(username: Option<&str>, first: &str) -> UserProfile {
        UserProfile {
            id: UserId(77),
            username: username.map(str::to_string),
            first_name: first.to_string(),
            last_name: None,
            is_bot: false,
        }
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn mention_prefers_username() {
        assert_eq!(mention_html(&user(Some("ada"), "Ada")), "@ada");
    }

    #[test]
    fn mention_link_escapes_display_name() {
        assert_eq!(
            mention_html(&user(None, "<script>")),
            r#"<a href="tg://user?id=77">&lt;script&gt;</a>"#
        );
        assert_eq!(
            mention_html(&user(None, "")),
            r#"<a href="tg://user?id=77">Member ID:77</a>"#
        );
    }

    #[test]
    fn rules_link_is_empty_without_url() {
        assert_eq!(rules_link_html(None), "");
        assert_eq!(rules_link_html(Some("  ")), "");
        assert_eq!(
            rules_link_html(Some("https://x.org/?a=1&b=2")),
            "\n<a href=\"https://x.org/?a=1&amp;b=2\">Please read the chat rules.</a>\n"
        );
    }
}
