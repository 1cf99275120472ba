//! WebSocket Wire Frames
//!
//! Inbound frame format and its validation into a message draft. The
//! outbound frame is the serialized `Message` entity itself.

use serde::Deserialize;

use crate::domain::{MessageDraft, MessageKind};
use crate::shared::error::AppError;

/// Inbound client frame.
///
/// ```json
/// {"type": "private", "content": "hi", "user_id": 7}
/// ```
///
/// `user_id` names the receiver for private messages; `group_id` the
/// target group for group messages.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub group_id: Option<i64>,
    pub user_id: Option<i64>,
}

impl InboundFrame {
    /// Validate into a draft bound to the connection's identity.
    /// Addressing fields that don't belong to the kind are discarded.
    pub fn into_draft(self, sender_id: i64, sender_name: &str) -> Result<MessageDraft, AppError> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("Message content is empty".into()));
        }

        let (receiver_id, group_id) = match self.kind {
            MessageKind::Public => (None, None),
            MessageKind::Private => {
                let receiver = self
                    .user_id
                    .ok_or_else(|| AppError::BadRequest("Private message requires user_id".into()))?;
                (Some(receiver), None)
            }
            MessageKind::Group => {
                let group = self
                    .group_id
                    .ok_or_else(|| AppError::BadRequest("Group message requires group_id".into()))?;
                (None, Some(group))
            }
        };

        Ok(MessageDraft {
            kind: self.kind,
            content: content.to_string(),
            user_id: sender_id,
            username: sender_name.to_string(),
            receiver_id,
            group_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> serde_json::Result<InboundFrame> {
        serde_json::from_str(json)
    }

    #[test]
    fn public_frame_becomes_a_draft() {
        let frame = parse(r#"{"type":"public","content":"hi"}"#).unwrap();
        let draft = frame.into_draft(1, "alice").unwrap();

        assert_eq!(draft.kind, MessageKind::Public);
        assert_eq!(draft.content, "hi");
        assert_eq!(draft.user_id, 1);
        assert_eq!(draft.username, "alice");
        assert_eq!(draft.receiver_id, None);
        assert_eq!(draft.group_id, None);
    }

    #[test]
    fn private_frame_maps_user_id_to_receiver() {
        let frame = parse(r#"{"type":"private","content":"psst","user_id":7}"#).unwrap();
        let draft = frame.into_draft(1, "alice").unwrap();

        assert_eq!(draft.kind, MessageKind::Private);
        assert_eq!(draft.receiver_id, Some(7));
    }

    #[test]
    fn private_frame_without_receiver_is_rejected() {
        let frame = parse(r#"{"type":"private","content":"psst"}"#).unwrap();
        assert!(frame.into_draft(1, "alice").is_err());
    }

    #[test]
    fn group_frame_without_group_is_rejected() {
        let frame = parse(r#"{"type":"group","content":"hey"}"#).unwrap();
        assert!(frame.into_draft(1, "alice").is_err());
    }

    #[test]
    fn blank_content_is_rejected() {
        let frame = parse(r#"{"type":"public","content":"   "}"#).unwrap();
        assert!(frame.into_draft(1, "alice").is_err());
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        assert!(parse(r#"{"type":"broadcast","content":"hi"}"#).is_err());
    }

    #[test]
    fn stray_addressing_fields_are_discarded() {
        let frame = parse(r#"{"type":"public","content":"hi","group_id":5,"user_id":7}"#).unwrap();
        let draft = frame.into_draft(1, "alice").unwrap();
        assert_eq!(draft.receiver_id, None);
        assert_eq!(draft.group_id, None);
    }
}
