//! Plain-text transcripts of channels, threads, channel lists and user lists.

use chrono::DateTime;

use crate::extract::{Author, Identities, classify};
use crate::records::{Channel, Message, Reaction, SlackFile, User};

pub const SEPARATOR: &str = "************************";
pub const UNAVAILABLE_FILE: &str = "[deleted, oversize, or unavailable file]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderContext {
    Channel,
    Thread,
}

/// `ts` rounded to the nearest second (halves to even), as UTC
/// `YYYY-MM-DD HH:MM:SS`. Unparseable timestamps are returned unchanged.
pub fn format_timestamp(ts: &str) -> String {
    ts.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite())
        .and_then(|secs| DateTime::from_timestamp(secs.round_ties_even() as i64, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Appends ` (name)` after every `<@ID>` naming a known user.
///
/// Single left-to-right pass, so inserted names are never rescanned.
pub fn annotate_mentions(text: &str, identities: &Identities<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("<@") {
        let (before, tail) = rest.split_at(start);
        out.push_str(before);

        let Some(end) = tail.find('>') else {
            out.push_str(tail);
            return out;
        };
        // `<@U1 and <@U2>`: the inner `<@` opens the real token
        if let Some(nested) = tail.get(2..end).and_then(|inner| inner.find("<@")) {
            let (skipped, next) = tail.split_at(nested + 2);
            out.push_str(skipped);
            rest = next;
            continue;
        }

        let (token, after) = tail.split_at(end + 1);
        out.push_str(token);

        let id = token.trim_start_matches("<@").trim_end_matches('>');
        if identities.is_known_user(id) {
            out.push_str(" (");
            out.push_str(&identities.user_name(id));
            out.push(')');
        }
        rest = after;
    }

    out.push_str(rest);
    out
}

fn author_line(author: &Author<'_>, identities: &Identities<'_>) -> String {
    match author {
        Author::User { id } => format!(
            "User: {} ({})",
            identities.user_name(id),
            identities.user_real_name(id)
        ),
        Author::Bot { name } => format!("Bot: {}", name),
        Author::Unknown => "User: Unknown (Unknown)".to_string(),
    }
}

fn reactions_line(reactions: &[Reaction], identities: &Identities<'_>) -> String {
    let summary = reactions
        .iter()
        .map(|r| {
            let names: Vec<String> = r.users.iter().map(|u| identities.user_name(u)).collect();
            format!("{} ({})", r.name, names.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("Reactions: {}", summary)
}

/// One line per file: resolvable ones first, then placeholders.
fn file_lines(files: &[SlackFile]) -> Vec<String> {
    let (resolved, unavailable): (Vec<_>, Vec<_>) =
        files.iter().partition(|f| f.resolvable().is_some());

    let resolved = resolved.into_iter().filter_map(|f| {
        f.resolvable()
            .map(|(name, url)| format!(" - [{}] {}, {}", f.id, name, url))
    });
    let unavailable = unavailable
        .into_iter()
        .map(|f| format!(" - [{}] {}", f.id, UNAVAILABLE_FILE));

    resolved.chain(unavailable).collect()
}

fn indent(block: &str, depth: usize) -> String {
    if depth == 0 {
        return block.to_string();
    }
    let prefix = "\t".repeat(depth);
    block
        .split('\n')
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indentation level of a message: replies inside a thread sit one level in.
pub fn message_depth(message: &Message, context: RenderContext) -> usize {
    match context {
        RenderContext::Thread if message.parent_user_id.is_some() => 1,
        _ => 0,
    }
}

/// Renders one message block, every line prefixed with `depth` tabs.
pub fn render_message(message: &Message, identities: &Identities<'_>, depth: usize) -> String {
    let classified = classify(message);

    let mut entry = format!(
        "Message at {}\n{}\n{}",
        format_timestamp(&message.ts),
        author_line(&classified.author, identities),
        annotate_mentions(&classified.text, identities)
    );

    if !classified.reactions.is_empty() {
        entry.push('\n');
        entry.push_str(&reactions_line(classified.reactions, identities));
    }

    if !classified.files.is_empty() {
        entry.push_str("\nFiles:\n");
        entry.push_str(&file_lines(classified.files).join("\n"));
    }

    entry.push_str(&format!("\n\n{}\n\n", SEPARATOR));
    indent(&entry, depth)
}

/// Renders messages in arrival order. Records whose type is not `message`
/// are skipped.
pub fn render_history(
    messages: &[Message],
    identities: &Identities<'_>,
    context: RenderContext,
) -> String {
    let mut body = String::new();
    for message in messages.iter().filter(|m| m.is_message()) {
        let entry = render_message(message, identities, message_depth(message, context));
        body.push_str(entry.trim_end_matches('\t'));
    }
    body
}

pub fn render_replies<M: AsRef<[Message]>>(threads: &[M], identities: &Identities<'_>) -> String {
    let mut body = String::new();
    for thread in threads {
        body.push_str(&render_history(thread.as_ref(), identities, RenderContext::Thread));
        body.push('\n');
    }
    body
}

pub fn channel_header(channel_id: &str, identities: &Identities<'_>, message_count: usize) -> String {
    format!(
        "Channel ID: {}\nChannel Name: {}\n{} Messages\n{}\n\n",
        channel_id,
        identities.channel_name(channel_id),
        message_count,
        SEPARATOR
    )
}

pub fn replies_header(channel_id: &str, identities: &Identities<'_>, thread_count: usize) -> String {
    format!(
        "Threads in Channel: {}\n{} Messages\n{}\n\n",
        identities.channel_name(channel_id),
        thread_count,
        SEPARATOR
    )
}

/// `[C123] general: private channel created by ann`, one per line.
pub fn render_channel_list(channels: &[Channel], identities: &Identities<'_>) -> String {
    let mut result = String::new();
    for channel in channels {
        let mut line = format!("[{}]", channel.id);
        if let Some(name) = channel.name.as_deref().filter(|n| !n.trim().is_empty()) {
            line.push_str(&format!(" {}:", name));
        }
        line.push(' ');
        if channel.is_private.unwrap_or(false) {
            line.push_str("private ");
        }
        line.push_str("channel");
        if let Some(creator) = &channel.creator {
            line.push_str(&format!(" created by {}", identities.user_name(creator)));
        }
        result.push_str(&line);
        result.push('\n');
    }
    result
}

/// `[U123] ann (Ann Lee), Europe/Berlin, admin|owner`, one per line.
pub fn render_user_list(users: &[User]) -> String {
    let mut result = String::new();
    for user in users {
        let mut line = format!("[{}]", user.id);
        if let Some(name) = &user.name {
            line.push_str(&format!(" {}", name));
        }
        if let Some(real_name) = user.profile.as_ref().and_then(|p| p.real_name.as_deref()) {
            line.push_str(&format!(" ({})", real_name));
        }
        if let Some(tz) = &user.tz {
            line.push_str(&format!(", {}", tz));
        }
        let roles = user.roles();
        if !roles.is_empty() {
            line.push_str(&format!(", {}", roles.join("|")));
        }
        result.push_str(&line);
        result.push('\n');
    }
    result
}
