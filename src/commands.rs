use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::error::{AppError, Result};
use crate::executor::{Sleeper, Transport};
use crate::extract::Identities;
use crate::records::{Channel, Message, Records, User};
use crate::settings::Settings;
use crate::slack::{SlackClient, reply_timestamps};
use crate::transcript::{
    RenderContext, channel_header, render_channel_list, render_history, render_replies,
    render_user_list, replies_header,
};
use crate::{load_token, parse_bound};

/// Where and how exported data is written.
#[derive(Debug, Clone)]
pub struct Output {
    dir: Option<PathBuf>,
    json: bool,
}

impl Output {
    /// Each run writes into a fresh `slack_export_{timestamp}` directory.
    pub fn new(parent: Option<&str>, json: bool) -> Self {
        let stamp = Local::now().format("%Y-%m-%d_%H%M%S");
        Self {
            dir: parent.map(|p| Path::new(p).join(format!("slack_export_{}", stamp))),
            json,
        }
    }

    pub fn in_dir(dir: PathBuf, json: bool) -> Self {
        Self {
            dir: Some(dir),
            json,
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Writes `raw` as pretty JSON or the `rendered` transcript, to
    /// `{name}.json`/`{name}.txt` or stdout.
    pub fn save<T: Serialize>(
        &self,
        name: &str,
        raw: &T,
        rendered: impl FnOnce() -> String,
    ) -> Result<()> {
        let (content, extension) = if self.json {
            let json = serde_json::to_string_pretty(raw)
                .map_err(|e| AppError::JsonSerialize(e.to_string()))?;
            (json, "json")
        } else {
            (rendered(), "txt")
        };

        let Some(dir) = &self.dir else {
            println!("{}", content);
            return Ok(());
        };

        fs::create_dir_all(dir).map_err(|e| AppError::WriteFile {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = dir.join(format!("{}.{}", name, extension));
        info!("Writing output to {}", path.display());
        fs::write(&path, content).map_err(|e| AppError::WriteFile {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Optional `oldest`/`latest` limits for history requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bounds {
    pub oldest: Option<String>,
    pub latest: Option<String>,
}

impl Bounds {
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        Ok(Self {
            oldest: from.map(parse_bound).transpose()?,
            latest: to.map(parse_bound).transpose()?,
        })
    }
}

/// Entry point behind the binary: fetches the workspace directory, then runs
/// the requested export.
pub fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load()?;
    if let Some(max) = cli.max_attempts {
        settings.rate_limit.max_attempts = Some(max);
    }
    let download_attempts = settings.downloads.max_attempts;

    let output = Output::new(cli.output.as_deref(), cli.json);
    if cli.command == Commands::Files && output.dir().is_none() {
        return Err(AppError::Usage(
            "downloading files requires an output directory (--output)".to_string(),
        ));
    }

    let token = load_token()?;
    if cli.gentle {
        info!("Gentle mode enabled: using extra delays to avoid rate limiting");
    }
    let client = SlackClient::from_settings(&settings, token, cli.gentle)?;

    info!("Starting Slack export");
    let team = cli.team.as_deref();

    match cli.command {
        Commands::Files => download_files(&client, &output, download_attempts),
        Commands::ListChannels => {
            let channels = client.channel_list(team)?;
            let users = client.user_list(team)?;
            list_channels(&output, &channels, &users)
        }
        Commands::ListUsers => {
            let users = client.user_list(team)?;
            list_users(&output, &users)
        }
        Commands::History {
            channel,
            from,
            to,
            replies,
        } => {
            let bounds = Bounds::parse(from.as_deref(), to.as_deref())?;
            let channels = client.channel_list(team)?;
            let users = client.user_list(team)?;
            let ids = match channel {
                Some(id) => vec![id],
                None => channels.iter().map(|c| c.id.clone()).collect(),
            };
            export_history(&client, &output, &ids, &bounds, replies, &channels, &users)
        }
        Commands::Replies { from, to } => {
            let bounds = Bounds::parse(from.as_deref(), to.as_deref())?;
            let channels = client.channel_list(team)?;
            let users = client.user_list(team)?;
            export_replies(&client, &output, &bounds, &channels, &users)
        }
    }?;

    info!("Export completed successfully!");
    Ok(())
}

pub fn list_channels(output: &Output, channels: &Records<Channel>, users: &[User]) -> Result<()> {
    let identities = Identities::new(users, channels);
    output.save("channel_list", channels, || {
        render_channel_list(channels, &identities)
    })
}

pub fn list_users(output: &Output, users: &Records<User>) -> Result<()> {
    output.save("user_list", users, || render_user_list(users))
}

pub fn export_history<T: Transport, S: Sleeper>(
    client: &SlackClient<T, S>,
    output: &Output,
    channel_ids: &[String],
    bounds: &Bounds,
    with_replies: bool,
    channels: &[Channel],
    users: &[User],
) -> Result<()> {
    let identities = Identities::new(users, channels);
    let total = channel_ids.len();

    for (idx, channel_id) in channel_ids.iter().enumerate() {
        info!(
            "Channel {}/{}: {} ({})",
            idx + 1,
            total,
            identities.channel_name(channel_id),
            channel_id
        );
        let history = client.channel_history(
            channel_id,
            bounds.oldest.as_deref(),
            bounds.latest.as_deref(),
        )?;

        output.save(&format!("channel_{}", channel_id), &history, || {
            let mut text = channel_header(channel_id, &identities, history.len());
            text.push_str(&render_history(&history, &identities, RenderContext::Channel));
            text
        })?;

        if with_replies {
            save_replies(client, output, channel_id, &history, &identities)?;
        }
    }

    Ok(())
}

pub fn export_replies<T: Transport, S: Sleeper>(
    client: &SlackClient<T, S>,
    output: &Output,
    bounds: &Bounds,
    channels: &[Channel],
    users: &[User],
) -> Result<()> {
    let identities = Identities::new(users, channels);

    for channel in channels {
        info!(
            "Getting threads for channel: {} ({})",
            identities.channel_name(&channel.id),
            channel.id
        );
        let history = client.channel_history(
            &channel.id,
            bounds.oldest.as_deref(),
            bounds.latest.as_deref(),
        )?;
        save_replies(client, output, &channel.id, &history, &identities)?;
    }

    Ok(())
}

fn save_replies<T: Transport, S: Sleeper>(
    client: &SlackClient<T, S>,
    output: &Output,
    channel_id: &str,
    history: &[Message],
    identities: &Identities<'_>,
) -> Result<()> {
    let timestamps = reply_timestamps(history);
    if timestamps.is_empty() {
        info!("No threads found in channel {}", channel_id);
        return Ok(());
    }

    info!("Found {} threads in channel {}", timestamps.len(), channel_id);
    let threads = client.channel_replies(channel_id, &timestamps)?;

    output.save(&format!("channel-replies_{}", channel_id), &threads, || {
        let mut text = replies_header(channel_id, identities, threads.len());
        text.push_str(&render_replies(&threads, identities));
        text
    })
}

pub fn download_files<T: Transport, S: Sleeper>(
    client: &SlackClient<T, S>,
    output: &Output,
    max_attempts: u32,
) -> Result<()> {
    let Some(dir) = output.dir() else {
        return Err(AppError::Usage(
            "downloading files requires an output directory (--output)".to_string(),
        ));
    };

    let files = client.file_list()?;
    info!("Downloading {} files to {}", files.len(), dir.display());
    let result = client.download_files(&files, dir, max_attempts)?;

    info!(
        "Download completed! {} files downloaded, {} skipped, {} failed.",
        result.downloaded, result.skipped, result.failed
    );
    Ok(())
}
