//! Gmail API response normalization
//!
//! Maps raw Gmail messages to [`MessageMetadata`] and decodes attachment
//! payloads.

use anyhow::{Context, Result};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use super::api::{GmailMessage, MessagePart, MessagePayload};
use crate::models::{AttachmentRef, EmailAddress, MessageId, MessageMetadata};

/// Attachment content types worth harvesting
pub const ALLOWED_ATTACHMENT_TYPES: &[&str] = &["application/pdf", "image/png", "image/jpeg"];

/// Standard alphabet, padding optional (Gmail strips it inconsistently)
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Extract structured metadata from a Gmail message
///
/// Messages without a payload yield empty headers and no attachments.
pub fn extract_metadata(message: &GmailMessage) -> MessageMetadata {
    let payload = message.payload.as_ref();

    let subject = payload
        .and_then(|p| extract_header(p, "Subject"))
        .unwrap_or_default();

    let addresses = |name: &str| -> Vec<String> {
        payload
            .and_then(|p| extract_header(p, name))
            .map(|value| {
                EmailAddress::parse_list(&value)
                    .into_iter()
                    .map(|addr| addr.email)
                    .filter(|email| !email.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut attachments = Vec::new();
    if let Some(parts) = payload.and_then(|p| p.parts.as_ref()) {
        collect_attachments(parts, &mut attachments);
    }

    MessageMetadata {
        attachments,
        cc: addresses("Cc"),
        from: addresses("From"),
        id: MessageId::new(&message.id),
        subject,
        to: addresses("To"),
    }
}

/// Extract a header value by name
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Recursively collect allow-listed attachment parts
fn collect_attachments(parts: &[MessagePart], out: &mut Vec<AttachmentRef>) {
    for part in parts {
        if let Some(mime_type) = part.mime_type.as_deref()
            && ALLOWED_ATTACHMENT_TYPES
                .iter()
                .any(|allowed| mime_type.eq_ignore_ascii_case(allowed))
            && let Some(attachment_id) = part.body.as_ref().and_then(|b| b.attachment_id.as_ref())
        {
            let filename = part
                .filename
                .as_deref()
                .filter(|f| !f.is_empty())
                .unwrap_or(attachment_id);

            out.push(AttachmentRef {
                filename: filename.to_string(),
                id: attachment_id.clone(),
                mime_type: mime_type.to_ascii_lowercase(),
            });
        }

        if let Some(nested) = &part.parts {
            collect_attachments(nested, out);
        }
    }
}

/// Decode attachment data returned by the Gmail API
///
/// Gmail encodes attachment bodies with the URL-safe base64 alphabet. The
/// alphabet is translated to the standard one before decoding.
pub fn decode_attachment_data(data: &str) -> Result<Vec<u8>> {
    let standard: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    STANDARD_LENIENT
        .decode(standard.as_bytes())
        .context("Failed to decode attachment data")
}
