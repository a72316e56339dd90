//! Welcome template rendering.
//!
//! Templates are HTML with `{name}` placeholders drawn from a fixed allow-list; `{{`
//! and `}}` produce literal braces. There is no expression syntax: a placeholder is a
//! bare key or it is an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::{
    domain::UserProfile,
    errors::Error,
    formatting::{escape_html, mention_html, rules_link_html},
    Result,
};

pub const PLACEHOLDERS: &[&str] = &[
    "mention",
    "user_id",
    "user_firstname",
    "user_lastname",
    "user_fullname",
    "rules_link_html",
    "monthly_join_count",
];

/// Values available to a welcome template.
///
/// Construct with [`WelcomeContext::for_user`], which escapes every user-supplied
/// string; `mention` and `rules_link_html` are the only fields holding markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WelcomeContext {
    pub mention: String,
    pub user_id: i64,
    pub user_firstname: String,
    pub user_lastname: String,
    pub user_fullname: String,
    pub rules_link_html: String,
    pub monthly_join_count: u64,
}

impl WelcomeContext {
    pub fn for_user(user: &UserProfile, rules_url: Option<&str>, monthly_join_count: u64) -> Self {
        Self {
            mention: mention_html(user),
            user_id: user.id.0,
            user_firstname: escape_html(&user.first_name),
            user_lastname: escape_html(user.last_name.as_deref().unwrap_or("")),
            user_fullname: escape_html(&user.full_name()),
            rules_link_html: rules_link_html(rules_url),
            monthly_join_count,
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let v = match key {
            "mention" => self.mention.clone(),
            "user_id" => self.user_id.to_string(),
            "user_firstname" => self.user_firstname.clone(),
            "user_lastname" => self.user_lastname.clone(),
            "user_fullname" => self.user_fullname.clone(),
            "rules_link_html" => self.rules_link_html.clone(),
            "monthly_join_count" => self.monthly_join_count.to_string(),
            _ => return None,
        };
        Some(v)
    }
}

/// Substitute placeholders in `template`.
///
/// Fails with [`Error::MissingPlaceholder`] on the first key outside the allow-list.
/// Values are inserted as-is; escaping already happened when the context was built.
pub fn render(template: &str, ctx: &WelcomeContext) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 64);
    let mut last = 0usize;

    for caps in placeholder_re().captures_iter(template) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..m.start()]);
        last = m.end();

        match caps.get(1) {
            Some(key) => {
                let key = key.as_str();
                let value = ctx.lookup(key).ok_or_else(|| Error::MissingPlaceholder {
                    key: key.to_string(),
                })?;
                out.push_str(&value);
            }
            // `{{` or `}}`
            None => out.push_str(&m.as_str()[..1]),
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").expect("valid regex"))
}
