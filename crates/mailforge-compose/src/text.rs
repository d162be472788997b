//! Text body composition.
//!
//! Merges what the user typed with quoted text and the signature, for
//! either plain text or HTML. Composition is pure: the same spec always
//! produces the same body.

use crate::spec::{MessageFormat, MessageSpec, QuotedHtml};
use mailforge_mime::{ContentType, Leaf, TextEncoding};

/// Line break between paragraphs of plain text.
const CRLF: &str = "\r\n";

/// Separator placed above the reply when it follows the quote.
const HTML_SEPARATOR_AFTER_QUOTE: &str = "<br clear=\"all\">";

/// Separator placed below the reply when it precedes the quote.
const HTML_SEPARATOR_BEFORE_QUOTE: &str = "<br><br>";

/// A composed text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextContent {
    /// Body text with CRLF line endings.
    pub text: String,
    /// Whether `text` is plain text or HTML.
    pub format: MessageFormat,
    /// Wire rendering mode.
    pub encoding: TextEncoding,
    /// Length of the user's own content inside `text`.
    pub composed_length: usize,
    /// Offset of the user's own content inside `text`.
    pub composed_offset: usize,
    /// Where further footer content would go (HTML replies only).
    pub footer_offset: Option<usize>,
}

impl TextContent {
    /// Turns the body into a MIME leaf.
    #[must_use]
    pub fn to_leaf(&self) -> Leaf {
        let content_type = match self.format {
            MessageFormat::Text => ContentType::text_plain(),
            MessageFormat::Html => ContentType::text_html(),
        };
        Leaf::text(self.text.clone(), content_type, self.encoding)
    }
}

/// Composes the body for `format`.
#[must_use]
pub fn compose(spec: &MessageSpec, format: MessageFormat, encoding: TextEncoding) -> TextContent {
    match format {
        MessageFormat::Text => compose_plain(spec, encoding),
        MessageFormat::Html => compose_html(spec, encoding),
    }
}

fn compose_plain(spec: &MessageSpec, encoding: TextEncoding) -> TextContent {
    let signature = spec.effective_signature().map(normalize_line_endings);
    let signature_first = spec.quoting.signature_before_quoted_text;
    let quoted = normalize_line_endings(&spec.quoted_text);

    let mut text = normalize_line_endings(&spec.text);
    let mut composed_offset = 0;
    let composed_length;

    if spec.includes_quoted_text() && !quoted.is_empty() {
        if signature_first {
            append_signature(&mut text, signature.as_deref());
        }
        composed_length = text.len();

        if spec.quoting.replies_after_quote() {
            composed_offset = quoted.len() + CRLF.len();
            text = format!("{quoted}{CRLF}{text}");
        } else {
            text = format!("{text}{CRLF}{CRLF}{quoted}");
        }

        if !signature_first {
            append_signature(&mut text, signature.as_deref());
        }
    } else {
        composed_length = text.len();
        append_signature(&mut text, signature.as_deref());
    }

    TextContent {
        text,
        format: MessageFormat::Text,
        encoding,
        composed_length,
        composed_offset,
        footer_offset: None,
    }
}

fn compose_html(spec: &MessageSpec, encoding: TextEncoding) -> TextContent {
    let signature = spec.effective_signature();
    let signature_first = spec.quoting.signature_before_quoted_text;

    let quoted = spec
        .quoted_html
        .as_ref()
        .filter(|_| spec.includes_quoted_text());
    let Some(quoted) = quoted else {
        let mut text = text_to_html_fragment(&spec.text);
        let composed_length = text.len();
        if let Some(signature) = signature {
            text.push_str(&signature_to_html(signature));
        }
        return TextContent {
            text,
            format: MessageFormat::Html,
            encoding,
            composed_length,
            composed_offset: 0,
            footer_offset: None,
        };
    };

    let mut user = text_to_html_fragment(&spec.text);
    if signature_first && let Some(signature) = signature {
        user.push_str(&signature_to_html(signature));
    }

    let after_quote = spec.quoting.replies_after_quote();
    if !spec.is_draft {
        if after_quote {
            user.insert_str(0, HTML_SEPARATOR_AFTER_QUOTE);
        } else {
            user.push_str(HTML_SEPARATOR_BEFORE_QUOTE);
        }
    }

    let footer = signature
        .filter(|_| !signature_first)
        .map(signature_to_html)
        .unwrap_or_default();

    let (text, composed_offset, footer_offset) = insert_into_quote(quoted, &user, &footer, after_quote);
    TextContent {
        text,
        format: MessageFormat::Html,
        encoding,
        composed_length: user.len(),
        composed_offset,
        footer_offset: Some(footer_offset),
    }
}

/// Places the reply above or below the quote and the footer at the quote's end.
///
/// Returns the merged HTML, the offset of the reply and the footer offset.
fn insert_into_quote(
    quoted: &QuotedHtml,
    user: &str,
    footer: &str,
    after_quote: bool,
) -> (String, usize, usize) {
    let header_point = quoted.header_insertion_point();
    let footer_point = quoted.footer_insertion_point();
    let mut html = quoted.content().to_string();

    let offset = if after_quote {
        html.insert_str(footer_point, &format!("{user}{footer}"));
        footer_point
    } else {
        html.insert_str(footer_point, footer);
        html.insert_str(header_point, user);
        header_point
    };

    (html, offset, footer_point + user.len() + footer.len())
}

fn append_signature(text: &mut String, signature: Option<&str>) {
    if let Some(signature) = signature {
        text.push_str(CRLF);
        text.push_str(signature);
    }
}

/// Converts any mix of CRLF, CR and LF line endings to CRLF.
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', CRLF)
}

/// Converts plain text to an HTML fragment.
///
/// Markup characters are escaped and line breaks become `<br>`.
#[must_use]
pub fn text_to_html_fragment(text: &str) -> String {
    let mut html = String::with_capacity(text.len() + text.len() / 8);
    let normalized = normalize_line_endings(text);
    for (i, line) in normalized.split(CRLF).enumerate() {
        if i > 0 {
            html.push_str("<br>");
            html.push_str(CRLF);
        }
        for c in line.chars() {
            match c {
                '&' => html.push_str("&amp;"),
                '<' => html.push_str("&lt;"),
                '>' => html.push_str("&gt;"),
                '"' => html.push_str("&quot;"),
                _ => html.push(c),
            }
        }
    }
    html
}

fn signature_to_html(signature: &str) -> String {
    format!(
        "<div class=\"mailforge-signature\">{}</div>",
        text_to_html_fragment(signature)
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::spec::{DraftState, MessageSpecBuilder, QuoteStyle, QuotedTextMode, QuotingPolicy};
    use proptest::prelude::*;

    fn builder() -> MessageSpecBuilder {
        MessageSpec::builder(Identity::new("Alice", "alice@example.com"))
    }

    fn showing(reply_after_quote: bool) -> QuotingPolicy {
        QuotingPolicy {
            mode: QuotedTextMode::Show,
            style: QuoteStyle::Prefix,
            reply_after_quote,
            signature_before_quoted_text: false,
        }
    }

    #[test]
    fn test_plain_without_quote() {
        let spec = builder().text("Hello\nthere").build();
        let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
        assert_eq!(body.text, "Hello\r\nthere");
        assert_eq!(body.composed_length, body.text.len());
        assert_eq!(body.composed_offset, 0);
    }

    #[test]
    fn test_plain_reply_before_quote() {
        let spec = builder()
            .text("Reply")
            .quoted_text("> original")
            .quoting(showing(false))
            .build();
        let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
        assert_eq!(body.text, "Reply\r\n\r\n> original");
        assert_eq!(body.composed_offset, 0);
        assert_eq!(body.composed_length, 5);
    }

    #[test]
    fn test_plain_reply_after_quote() {
        let spec = builder()
            .text("Reply")
            .quoted_text("> original")
            .quoting(showing(true))
            .build();
        let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
        assert_eq!(body.text, "> original\r\nReply");
        assert_eq!(&body.text[body.composed_offset..], "Reply");
    }

    #[test]
    fn test_header_style_ignores_reply_after_quote() {
        let mut policy = showing(true);
        policy.style = QuoteStyle::Header;
        let spec = builder()
            .text("Reply")
            .quoted_text("-----Original-----")
            .quoting(policy)
            .build();
        let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
        assert!(body.text.starts_with("Reply"));
    }

    #[test]
    fn test_plain_signature_placement() {
        let identity = Identity::new("Alice", "alice@example.com").with_signature("-- \nAlice");

        let spec = MessageSpec::builder(identity.clone())
            .text("Reply")
            .quoted_text("> q")
            .quoting(showing(false))
            .build();
        let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
        assert_eq!(body.text, "Reply\r\n\r\n> q\r\n-- \r\nAlice");

        let mut policy = showing(false);
        policy.signature_before_quoted_text = true;
        let spec = MessageSpec::builder(identity)
            .text("Reply")
            .quoted_text("> q")
            .quoting(policy)
            .build();
        let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
        assert_eq!(body.text, "Reply\r\n-- \r\nAlice\r\n\r\n> q");
    }

    #[test]
    fn test_hidden_quote_left_out_unless_draft() {
        let hidden = QuotingPolicy {
            mode: QuotedTextMode::Hide,
            ..showing(false)
        };
        let spec = builder()
            .text("Reply")
            .quoted_text("> q")
            .quoting(hidden)
            .build();
        assert_eq!(
            compose(&spec, MessageFormat::Text, TextEncoding::Standard).text,
            "Reply"
        );

        let draft = builder()
            .text("Reply")
            .quoted_text("> q")
            .quoting(hidden)
            .draft(DraftState::default())
            .build();
        assert!(
            compose(&draft, MessageFormat::Text, TextEncoding::Standard)
                .text
                .contains("> q")
        );
    }

    #[test]
    fn test_html_without_quote() {
        let identity = Identity::new("Alice", "alice@example.com").with_signature("Alice");
        let spec = MessageSpec::builder(identity)
            .format(MessageFormat::Html)
            .text("1 < 2\nok")
            .build();
        let body = compose(&spec, MessageFormat::Html, TextEncoding::Standard);
        assert_eq!(
            body.text,
            "1 &lt; 2<br>\r\nok<div class=\"mailforge-signature\">Alice</div>"
        );
        assert_eq!(body.composed_length, "1 &lt; 2<br>\r\nok".len());
        assert_eq!(body.footer_offset, None);
    }

    #[test]
    fn test_html_reply_before_quote() {
        let identity = Identity::new("Alice", "alice@example.com").with_signature("Alice");
        let spec = MessageSpec::builder(identity)
            .format(MessageFormat::Html)
            .text("Reply")
            .quoted_html(QuotedHtml::new("<blockquote>q</blockquote>"))
            .quoting(showing(false))
            .build();
        let body = compose(&spec, MessageFormat::Html, TextEncoding::Standard);
        assert_eq!(
            body.text,
            "Reply<br><br><blockquote>q</blockquote><div class=\"mailforge-signature\">Alice</div>"
        );
        assert_eq!(body.composed_offset, 0);
        assert_eq!(body.composed_length, "Reply<br><br>".len());
        assert_eq!(body.footer_offset, Some(body.text.len()));
    }

    #[test]
    fn test_html_reply_after_quote() {
        let spec = builder()
            .format(MessageFormat::Html)
            .text("Reply")
            .quoted_html(
                QuotedHtml::new("<html><blockquote>q</blockquote></html>")
                    .with_insertion_points(6, 32),
            )
            .quoting(showing(true))
            .build();
        let body = compose(&spec, MessageFormat::Html, TextEncoding::Standard);
        assert_eq!(
            body.text,
            "<html><blockquote>q</blockquote><br clear=\"all\">Reply</html>"
        );
        assert_eq!(body.composed_offset, 32);
        assert_eq!(
            &body.text[body.composed_offset..body.composed_offset + body.composed_length],
            "<br clear=\"all\">Reply"
        );
    }

    #[test]
    fn test_html_draft_has_no_separator() {
        let spec = builder()
            .format(MessageFormat::Html)
            .text("Reply")
            .quoted_html(QuotedHtml::new("<blockquote>q</blockquote>"))
            .quoting(showing(false))
            .draft(DraftState::default())
            .build();
        let body = compose(&spec, MessageFormat::Html, TextEncoding::Standard);
        assert_eq!(body.text, "Reply<blockquote>q</blockquote>");
    }

    #[test]
    fn test_to_leaf() {
        let spec = builder().text("Hi").build();
        let leaf = compose(&spec, MessageFormat::Text, TextEncoding::SignSafe).to_leaf();
        assert_eq!(leaf.content_type().mime_type(), "text/plain");
        assert_eq!(leaf.text_content(), Some("Hi"));
        assert_eq!(leaf.encoding().to_string(), "quoted-printable");
    }

    #[test]
    fn test_text_to_html_fragment_escapes() {
        assert_eq!(
            text_to_html_fragment("a & \"b\"\r\n<c>"),
            "a &amp; &quot;b&quot;<br>\r\n&lt;c&gt;"
        );
    }

    proptest! {
        #[test]
        fn prop_plain_compose_is_deterministic(text in ".{0,200}", quoted in ".{0,200}") {
            let spec = builder().text(text).quoted_text(quoted).quoting(showing(false)).build();
            let first = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
            let second = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_plain_has_crlf_only(text in "[a-z\r\n]{0,100}") {
            let spec = builder().text(text).build();
            let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
            let bare_lf = body.text.replace("\r\n", "").contains('\n');
            let bare_cr = body.text.replace("\r\n", "").contains('\r');
            prop_assert!(!bare_lf && !bare_cr);
        }
    }
}
