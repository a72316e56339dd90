//! Telegram formatting entities back to Bot API HTML.

use teloxide::types::{MessageEntity, MessageEntityKind};

use wb_core::formatting::escape_html;

/// Text of a message as HTML, keeping bold, links and the other styled spans.
///
/// Entity offsets count UTF-16 code units. Without entities the text is returned
/// unchanged, so a template typed as raw HTML keeps its tags.
pub fn message_html(text: &str, entities: &[MessageEntity]) -> String {
    let mut spans: Vec<(usize, usize, String, &'static str)> = entities
        .iter()
        .filter(|e| e.length > 0)
        .filter_map(|e| {
            let (open, close) = tags(&e.kind)?;
            Some((e.offset, e.offset + e.length, open, close))
        })
        .collect();
    if spans.is_empty() {
        return text.to_string();
    }
    // Outer spans first when two start together.
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut out = String::with_capacity(text.len() + spans.len() * 8);
    let mut open: Vec<(usize, &'static str)> = Vec::new();
    let mut pending = spans.into_iter().peekable();
    let mut pos = 0usize;
    let mut buf = [0u8; 4];

    for ch in text.chars() {
        close_until(&mut out, &mut open, pos);
        while let Some((_, end, tag, close)) = pending.next_if(|s| s.0 <= pos) {
            out.push_str(&tag);
            open.push((end, close));
        }
        out.push_str(&escape_html(ch.encode_utf8(&mut buf)));
        pos += ch.len_utf16();
    }
    while let Some((_, close)) = open.pop() {
        out.push_str(close);
    }
    out
}

fn close_until(out: &mut String, open: &mut Vec<(usize, &'static str)>, pos: usize) {
    while open.last().is_some_and(|(end, _)| *end <= pos) {
        if let Some((_, close)) = open.pop() {
            out.push_str(close);
        }
    }
}

fn tags(kind: &MessageEntityKind) -> Option<(String, &'static str)> {
    let pair = match kind {
        MessageEntityKind::Bold => ("<b>".to_string(), "</b>"),
        MessageEntityKind::Italic => ("<i>".to_string(), "</i>"),
        MessageEntityKind::Underline => ("<u>".to_string(), "</u>"),
        MessageEntityKind::Strikethrough => ("<s>".to_string(), "</s>"),
        MessageEntityKind::Spoiler => ("<tg-spoiler>".to_string(), "</tg-spoiler>"),
        MessageEntityKind::Code => ("<code>".to_string(), "</code>"),
        MessageEntityKind::Pre { .. } => ("<pre>".to_string(), "</pre>"),
        MessageEntityKind::TextLink { url } => {
            (format!("<a href=\"{}\">", escape_html(url.as_str())), "</a>")
        }
        MessageEntityKind::TextMention { user } => {
            (format!("<a href=\"tg://user?id={}\">", user.id.0), "</a>")
        }
        // Mentions, hashtags, plain URLs and the like are recognised from the text itself.
        _ => return None,
    };
    Some(pair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_kept_verbatim() {
        assert_eq!(message_html("<b>Hi</b> {mention}", &[]), "<b>Hi</b> {mention}");
    }

    #[test]
    fn styled_spans_become_tags_and_text_is_escaped() {
        let text = "Hello {mention}, read the rules & enjoy";
        let rules = MessageEntity::new(
            MessageEntityKind::TextLink {
                url: "https://example.com/rules?a=1&b=2".parse().unwrap(),
            },
            22,
            9,
        );
        let html = message_html(text, &[MessageEntity::bold(0, 5), rules]);
        assert_eq!(
            html,
            "<b>Hello</b> {mention}, read <a href=\"https://example.com/rules?a=1&amp;b=2\">the rules</a> &amp; enjoy"
        );
    }

    #[test]
    fn offsets_count_utf16_units_and_nest() {
        // The emoji is two UTF-16 units.
        let text = "😀 Welcome aboard";
        let html = message_html(
            text,
            &[MessageEntity::bold(3, 14), MessageEntity::italic(3, 7)],
        );
        assert_eq!(html, "😀 <b><i>Welcome</i> aboard</b>");
    }
}
