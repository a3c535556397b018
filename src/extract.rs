use std::collections::HashMap;

use crate::records::{Channel, Message, Reaction, SlackFile, User};

pub const NULL_USER: &str = "[null user]";
pub const NULL_CHANNEL: &str = "[null channel]";
pub const NO_FULL_NAME: &str = "[no full name]";
pub const NO_CONTENT: &str = "[no message content]";
pub const BOT_SUBTYPE: &str = "bot_message";

/// Who posted a message. Exactly one applies to any record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author<'a> {
    User { id: &'a str },
    Bot { name: String },
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedMessage<'a> {
    pub author: Author<'a>,
    pub text: String,
    pub reactions: &'a [Reaction],
    pub files: &'a [SlackFile],
}

fn populated(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn user_label(user: &User, want_display_name: bool) -> String {
    if want_display_name {
        let profile = user.profile.as_ref();
        profile
            .and_then(|p| populated(&p.real_name))
            .or_else(|| profile.and_then(|p| populated(&p.display_name)))
            .unwrap_or(NO_FULL_NAME)
            .to_string()
    } else {
        user.name.clone().unwrap_or_else(|| user.id.clone())
    }
}

/// Linear lookup of a user's handle, or of their full name when
/// `want_display_name` is set.
pub fn name_from_id(id: &str, users: &[User], want_display_name: bool) -> String {
    users
        .iter()
        .find(|u| u.id == id)
        .map(|u| user_label(u, want_display_name))
        .unwrap_or_else(|| NULL_USER.to_string())
}

pub fn name_from_channel_id(id: &str, channels: &[Channel]) -> String {
    channels
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.name.clone().unwrap_or_default())
        .unwrap_or_else(|| NULL_CHANNEL.to_string())
}

/// Identifier lookups over the whole workspace.
///
/// The first record seen for an id wins, same as [`name_from_id`].
pub struct Identities<'a> {
    channels: &'a [Channel],
    user_index: HashMap<&'a str, &'a User>,
}

impl<'a> Identities<'a> {
    pub fn new(users: &'a [User], channels: &'a [Channel]) -> Self {
        let mut user_index = HashMap::with_capacity(users.len());
        for user in users {
            user_index.entry(user.id.as_str()).or_insert(user);
        }
        Self {
            channels,
            user_index,
        }
    }

    pub fn is_known_user(&self, id: &str) -> bool {
        self.user_index.contains_key(id)
    }

    pub fn user_name(&self, id: &str) -> String {
        self.user_index
            .get(id)
            .map(|u| user_label(u, false))
            .unwrap_or_else(|| NULL_USER.to_string())
    }

    pub fn user_real_name(&self, id: &str) -> String {
        self.user_index
            .get(id)
            .map(|u| user_label(u, true))
            .unwrap_or_else(|| NULL_USER.to_string())
    }

    pub fn channel_name(&self, id: &str) -> String {
        name_from_channel_id(id, self.channels)
    }
}

pub fn classify_author(message: &Message) -> Author<'_> {
    if let Some(id) = message.user.as_deref() {
        return Author::User { id };
    }

    let is_bot = message.bot_id.is_some()
        || message.username.is_some()
        || message.subtype.as_deref() == Some(BOT_SUBTYPE);
    if !is_bot {
        return Author::Unknown;
    }

    let name = match (&message.username, &message.bot_id) {
        (Some(username), _) => username.clone(),
        (None, Some(bot_id)) => format!("Bot {}", bot_id),
        (None, None) => "Bot".to_string(),
    };
    Author::Bot { name }
}

/// The message body, falling back to its attachments and then to
/// [`NO_CONTENT`].
pub fn resolve_text(message: &Message) -> String {
    if let Some(text) = populated(&message.text) {
        return text.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    for attachment in &message.attachments {
        if let Some(title) = populated(&attachment.title) {
            lines.push(title.to_string());
        }
        if let Some(text) = populated(&attachment.text) {
            lines.push(text.to_string());
        }
        for field in &attachment.fields {
            lines.push(format!(
                "{}: {}",
                field.title.as_deref().unwrap_or(""),
                field.value.as_deref().unwrap_or("")
            ));
        }
    }

    let text = lines.join("\n");
    let text = text.trim();
    if text.is_empty() {
        NO_CONTENT.to_string()
    } else {
        text.to_string()
    }
}

pub fn classify(message: &Message) -> ClassifiedMessage<'_> {
    ClassifiedMessage {
        author: classify_author(message),
        text: resolve_text(message),
        reactions: message.reactions.as_deref().unwrap_or(&[]),
        files: message.files.as_deref().unwrap_or(&[]),
    }
}
