//! Attachment embedding.

use crate::error::Result;
use crate::spec::AttachmentDescriptor;
use mailforge_mime::encoding::{encode_rfc2047, encode_rfc2231_parameter};
use mailforge_mime::{ContentDisposition, ContentType, Leaf, MimePart, TransferEncoding};
use tracing::debug;

/// Turns the complete attachments into MIME leaves, in order.
///
/// Attachments that have not finished loading are skipped.
///
/// # Errors
///
/// Returns an error if an attachment's content type cannot be parsed or its
/// display name cannot be encoded.
pub fn embed(attachments: &[AttachmentDescriptor]) -> Result<Vec<MimePart>> {
    let mut parts = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        if !attachment.is_complete() {
            debug!(
                name = %attachment.name,
                state = ?attachment.state,
                "Skipping attachment that is not loaded"
            );
            continue;
        }
        parts.push(embed_one(attachment)?.into());
    }
    Ok(parts)
}

/// Builds the leaf for one attachment.
///
/// # Errors
///
/// Returns an error if the content type cannot be parsed or the name cannot
/// be encoded.
pub fn embed_one(attachment: &AttachmentDescriptor) -> Result<Leaf> {
    let content_type = ContentType::parse(&attachment.content_type)?
        .with_parameter("name", encode_rfc2047(&attachment.name, "utf-8")?);

    let mut disposition = ContentDisposition::attachment();
    for (key, value) in encode_rfc2231_parameter("filename", &attachment.name) {
        disposition = disposition.with_parameter(key, value);
    }
    let disposition = disposition.with_parameter("size", attachment.size.to_string());

    let leaf = if content_type.is_message() {
        Leaf::message(attachment.content.clone(), content_type)
    } else {
        let encoding = TransferEncoding::for_content_type(&content_type);
        Leaf::binary(attachment.content.clone(), content_type, encoding)
    };
    Ok(leaf.with_disposition(&disposition))
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
    use crate::error::Error;
    use crate::spec::LoadingState;
    use mailforge_mime::BodySource;

    #[test]
    fn test_embed_binary() {
        let attachment =
            AttachmentDescriptor::from_bytes("report.pdf", "application/pdf", b"%PDF-1.4".to_vec());
        let leaf = embed_one(&attachment).unwrap();

        assert_eq!(leaf.content_type().mime_type(), "application/pdf");
        assert_eq!(leaf.content_type().parameter("name"), Some("report.pdf"));
        assert_eq!(leaf.encoding(), TransferEncoding::Base64);
        assert_eq!(
            leaf.headers().get("Content-Disposition"),
            Some("attachment; filename=report.pdf; size=8")
        );
    }

    #[test]
    fn test_text_attachment_is_base64() {
        let attachment = AttachmentDescriptor::from_bytes("notes.txt", "text/plain", b"hi".to_vec());
        assert_eq!(embed_one(&attachment).unwrap().encoding(), TransferEncoding::Base64);
    }

    #[test]
    fn test_embed_message_never_base64() {
        let ascii = AttachmentDescriptor::from_bytes(
            "fwd.eml",
            "message/rfc822",
            b"Subject: hi\r\n\r\nbody".to_vec(),
        );
        assert_eq!(embed_one(&ascii).unwrap().encoding(), TransferEncoding::SevenBit);

        let eight_bit = AttachmentDescriptor::from_bytes(
            "fwd.eml",
            "message/rfc822",
            "Subject: hi\r\n\r\nnaïve".as_bytes().to_vec(),
        );
        assert_eq!(embed_one(&eight_bit).unwrap().encoding(), TransferEncoding::EightBit);
    }

    #[test]
    fn test_non_ascii_name() {
        let attachment =
            AttachmentDescriptor::from_bytes("résumé.pdf", "application/pdf", vec![1, 2, 3]);
        let leaf = embed_one(&attachment).unwrap();

        let name = leaf.content_type().parameter("name").unwrap();
        assert!(name.starts_with("=?utf-8?B?"));
        let disposition = leaf.headers().get("Content-Disposition").unwrap();
        assert!(disposition.contains("filename*=utf-8''r%C3%A9sum%C3%A9.pdf"));
        assert!(disposition.ends_with("size=3"));
    }

    #[test]
    fn test_long_name_uses_continuations() {
        let name = format!("{}.txt", "ü".repeat(40));
        let attachment = AttachmentDescriptor::from_bytes(name, "text/plain", vec![b'x']);
        let leaf = embed_one(&attachment).unwrap();
        let disposition = leaf.headers().get("Content-Disposition").unwrap();
        assert!(disposition.contains("filename*0*=utf-8''"));
        assert!(disposition.contains("filename*1*="));
    }

    #[test]
    fn test_embed_skips_incomplete() {
        let attachments = vec![
            AttachmentDescriptor::from_bytes("a.bin", "application/octet-stream", vec![1]),
            AttachmentDescriptor::from_bytes("b.bin", "application/octet-stream", vec![2])
                .with_state(LoadingState::Metadata),
            AttachmentDescriptor::from_bytes("c.bin", "application/octet-stream", vec![3])
                .with_state(LoadingState::Cancelled),
            AttachmentDescriptor::from_bytes("d.bin", "application/octet-stream", vec![4]),
        ];
        let parts = embed(&attachments).unwrap();
        let names: Vec<_> = parts
            .iter()
            .map(|p| p.content_type().parameter("name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.bin", "d.bin"]);
    }

    #[test]
    fn test_file_content_is_lazy() {
        let attachment = AttachmentDescriptor::from_file(
            "missing.bin",
            "application/octet-stream",
            "/nonexistent/mailforge/missing.bin",
            10,
        );
        let leaf = embed_one(&attachment).unwrap();
        assert!(matches!(leaf.body(), mailforge_mime::Body::Binary(BodySource::File(_))));
        let part: MimePart = leaf.into();
        assert!(part.to_bytes().is_err());
    }

    #[test]
    fn test_bad_content_type() {
        let attachment = AttachmentDescriptor::from_bytes("x", "nonsense", vec![]);
        assert!(matches!(embed_one(&attachment), Err(Error::Mime(_))));
    }
}
