//! Typed views over the records Slack returns.
//!
//! The views only carry the keys the harvester interprets. [`Records`] keeps
//! the JSON exactly as Slack sent it next to the decoded views, and that JSON
//! is what `--json` writes back out.

use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{AppError, Result};

/// Decoded records together with the JSON they were decoded from.
///
/// Derefs to the typed records and serializes as the original JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Records<T> {
    raw: Vec<Value>,
    items: Vec<T>,
}

impl<T: DeserializeOwned> Records<T> {
    pub fn decode(raw: Vec<Value>) -> Result<Self> {
        let items = raw
            .iter()
            .map(|value| T::deserialize(value).map_err(|e| AppError::JsonParse(e.to_string())))
            .collect::<Result<Vec<T>>>()?;
        Ok(Self { raw, items })
    }
}

impl<T> Deref for Records<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> AsRef<[T]> for Records<T> {
    fn as_ref(&self) -> &[T] {
        &self.items
    }
}

impl<T> Serialize for Records<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// `null` reads as an empty list.
fn nullable_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: Option<String>,
    pub is_private: Option<bool>,
    pub creator: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserProfile {
    pub real_name: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub profile: Option<UserProfile>,
    pub tz: Option<String>,
    pub is_admin: Option<bool>,
    pub is_owner: Option<bool>,
    pub is_primary_owner: Option<bool>,
    pub is_restricted: Option<bool>,
    pub is_ultra_restricted: Option<bool>,
    pub is_bot: Option<bool>,
    pub is_app_user: Option<bool>,
}

impl User {
    /// Role flags that are set, in display order.
    pub fn roles(&self) -> Vec<&'static str> {
        [
            (self.is_admin, "admin"),
            (self.is_owner, "owner"),
            (self.is_primary_owner, "primary_owner"),
            (self.is_restricted, "restricted"),
            (self.is_ultra_restricted, "ultra_restricted"),
            (self.is_bot, "bot"),
            (self.is_app_user, "app_user"),
        ]
        .into_iter()
        .filter(|(flag, _)| flag.unwrap_or(false))
        .map(|(_, role)| role)
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AttachmentField {
    pub title: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Attachment {
    pub title: Option<String>,
    pub text: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub fields: Vec<AttachmentField>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SlackFile {
    pub id: String,
    pub name: Option<String>,
    pub url_private: Option<String>,
    pub url_private_download: Option<String>,
}

impl SlackFile {
    /// Name and download link, when both are present.
    pub fn resolvable(&self) -> Option<(&str, &str)> {
        match (&self.name, &self.url_private_download) {
            (Some(name), Some(url)) => Some((name.as_str(), url.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub ts: String,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub username: Option<String>,
    pub subtype: Option<String>,
    pub text: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub attachments: Vec<Attachment>,
    pub reactions: Option<Vec<Reaction>>,
    pub files: Option<Vec<SlackFile>>,
    pub parent_user_id: Option<String>,
    pub reply_count: Option<u64>,
}

impl Message {
    pub fn is_message(&self) -> bool {
        self.kind.as_deref().is_none_or(|k| k == "message")
    }

    pub fn has_replies(&self) -> bool {
        self.reply_count.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_serialize_as_received() {
        let raw = json!([
            {
                "type": "message",
                "ts": "1.0",
                "text": "x",
                "attachments": [],
                "files": null,
                "reactions": null,
                "user": null,
                "client_msg_id": "abc",
                "blocks": [{"type": "rich_text"}]
            },
            {
                "ts": "2.0",
                "attachments": [{"title": "t", "fields": [], "text": null}]
            }
        ]);
        let values: Vec<Value> = serde_json::from_value(raw.clone()).unwrap();

        let records: Records<Message> = Records::decode(values).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text.as_deref(), Some("x"));
        assert!(records[0].attachments.is_empty());
        assert!(records[0].files.is_none());
        assert!(records[0].user.is_none());
        assert_eq!(records[1].attachments[0].title.as_deref(), Some("t"));
        assert_eq!(serde_json::to_value(&records).unwrap(), raw);
    }

    #[test]
    fn test_records_decode_failure_is_structural() {
        let err = Records::<Channel>::decode(vec![json!({"name": "no-id"})]).unwrap_err();

        assert!(err.is_structural());
    }

    #[test]
    fn test_null_lists_read_as_empty() {
        let message: Message = serde_json::from_value(json!({
            "ts": "1",
            "attachments": null,
            "reactions": [{"name": "tada", "users": null}]
        }))
        .unwrap();

        assert!(message.attachments.is_empty());
        assert_eq!(message.reactions.as_deref().map(|r| r[0].users.len()), Some(0));
    }

    #[test]
    fn test_message_missing_optional_fields() {
        let message: Message = serde_json::from_value(json!({"ts": "1.5"})).unwrap();

        assert!(message.kind.is_none());
        assert!(message.is_message());
        assert!(message.attachments.is_empty());
        assert!(message.reactions.is_none());
        assert!(!message.has_replies());
    }

    #[test]
    fn test_non_message_type() {
        let message: Message =
            serde_json::from_value(json!({"type": "file_comment", "ts": "1"})).unwrap();
        assert!(!message.is_message());
    }

    #[test]
    fn test_user_roles() {
        let user: User = serde_json::from_value(json!({
            "id": "U1",
            "is_admin": true,
            "is_owner": false,
            "is_bot": true
        }))
        .unwrap();

        assert_eq!(user.roles(), vec!["admin", "bot"]);
    }

    #[test]
    fn test_file_resolvable() {
        let ok: SlackFile = serde_json::from_value(json!({
            "id": "F1",
            "name": "a.png",
            "url_private_download": "https://files/a.png"
        }))
        .unwrap();
        let missing_url: SlackFile =
            serde_json::from_value(json!({"id": "F2", "name": "b.png"})).unwrap();

        assert_eq!(ok.resolvable(), Some(("a.png", "https://files/a.png")));
        assert_eq!(missing_url.resolvable(), None);
    }
}
