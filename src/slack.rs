use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::executor::{HttpTransport, PageRequest, RequestExecutor, Sleeper, ThreadSleeper, Transport};
use crate::pagination::{PageStyle, Paginator};
use crate::records::{Channel, Message, Records, SlackFile, User};
use crate::settings::Settings;
use crate::{AppError, Result};

const CHANNEL_TYPES: &str = "public_channel,private_channel";

/// Result of downloading the file inventory
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DownloadResult {
    pub downloaded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Sequential, paced access to the Slack Web API methods the harvester needs.
pub struct SlackClient<T, S> {
    paginator: Paginator<T, S>,
    page_limit: u32,
    thread_delay: Duration,
}

impl SlackClient<HttpTransport, ThreadSleeper> {
    pub fn from_settings(settings: &Settings, token: String, gentle: bool) -> Result<Self> {
        let transport = HttpTransport::new(&settings.api.base_url, token)?;
        let executor =
            RequestExecutor::new(transport, ThreadSleeper, settings.executor_config(gentle));
        Ok(Self::new(
            Paginator::new(executor, settings.page_delay()),
            settings.api.page_limit,
            settings.thread_delay(),
        ))
    }
}

impl<T: Transport, S: Sleeper> SlackClient<T, S> {
    pub fn new(paginator: Paginator<T, S>, page_limit: u32, thread_delay: Duration) -> Self {
        Self {
            paginator,
            page_limit,
            thread_delay,
        }
    }

    pub fn executor(&self) -> &RequestExecutor<T, S> {
        self.paginator.executor()
    }

    pub fn channel_list(&self, team_id: Option<&str>) -> Result<Records<Channel>> {
        let request = PageRequest::new("conversations.list")
            .opt_param("team_id", team_id)
            .with_param("types", CHANNEL_TYPES)
            .with_limit(self.page_limit)
            .with_param("exclude_archived", true);

        self.fetch_records(&request, "channels", PageStyle::Cursor)
    }

    pub fn user_list(&self, team_id: Option<&str>) -> Result<Records<User>> {
        let request = PageRequest::new("users.list")
            .with_limit(self.page_limit)
            .opt_param("team_id", team_id);

        self.fetch_records(&request, "members", PageStyle::Cursor)
    }

    /// Messages of one channel, optionally bounded by `oldest`/`latest` timestamps.
    pub fn channel_history(
        &self,
        channel_id: &str,
        oldest: Option<&str>,
        latest: Option<&str>,
    ) -> Result<Records<Message>> {
        let request = PageRequest::new("conversations.history")
            .with_param("channel", channel_id)
            .with_limit(self.page_limit)
            .opt_param("oldest", oldest)
            .opt_param("latest", latest);

        info!(channel = channel_id, "getting channel history");
        self.fetch_records(&request, "messages", PageStyle::Cursor)
    }

    /// One thread per parent timestamp, fetched one after the other.
    pub fn channel_replies(&self, channel_id: &str, timestamps: &[String]) -> Result<Vec<Records<Message>>> {
        let total = timestamps.len();
        let mut replies = Vec::with_capacity(total);

        for (idx, ts) in timestamps.iter().enumerate() {
            info!(channel = channel_id, ts = %ts, "getting thread {}/{}", idx + 1, total);
            let request = PageRequest::new("conversations.replies")
                .with_param("channel", channel_id)
                .with_param("ts", ts)
                .with_limit(self.page_limit);

            replies.push(self.fetch_records(&request, "messages", PageStyle::Cursor)?);

            if idx + 1 < total {
                self.executor().pause(self.thread_delay);
            }
        }

        Ok(replies)
    }

    pub fn file_list(&self) -> Result<Records<SlackFile>> {
        self.fetch_records(&PageRequest::new("files.list"), "files", PageStyle::Pages)
    }

    fn fetch_records<R: DeserializeOwned>(
        &self,
        request: &PageRequest,
        key: &str,
        style: PageStyle,
    ) -> Result<Records<R>> {
        Records::decode(self.paginator.fetch_all(request, Some(key), style)?)
    }

    /// Saves every file as `{id}-{name}` under `output_dir`.
    ///
    /// Each file gets up to `max_attempts` tries; a file that still fails is
    /// counted and the rest carry on.
    pub fn download_files(
        &self,
        files: &[SlackFile],
        output_dir: &Path,
        max_attempts: u32,
    ) -> Result<DownloadResult> {
        let mut result = DownloadResult::default();
        if files.is_empty() {
            return Ok(result);
        }

        fs::create_dir_all(output_dir).map_err(|e| AppError::WriteFile {
            path: output_dir.display().to_string(),
            source: e,
        })?;

        let transport = self.executor().transport();
        for (idx, file) in files.iter().enumerate() {
            let name = sanitize_filename(file.name.as_deref().unwrap_or("unknown"));
            let destination = output_dir.join(format!("{}-{}", file.id, name));

            let Some(url) = file
                .url_private
                .as_deref()
                .or(file.url_private_download.as_deref())
            else {
                warn!(file = %file.id, "no download URL, skipping");
                result.skipped += 1;
                continue;
            };

            if destination.exists() {
                info!(path = %destination.display(), "skipping existing file");
                result.skipped += 1;
                continue;
            }

            info!(
                "downloading file {}/{} to {}",
                idx + 1,
                files.len(),
                destination.display()
            );
            let saved = (1..=max_attempts).any(|attempt| {
                let outcome = transport.download(url).and_then(|bytes| {
                    fs::write(&destination, bytes).map_err(|e| AppError::WriteFile {
                        path: destination.display().to_string(),
                        source: e,
                    })
                });
                match outcome {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(file = %file.id, attempt, error = %e, "download failed");
                        false
                    }
                }
            });

            if saved {
                result.downloaded += 1;
            } else {
                warn!(file = %file.id, url, "giving up after {} attempts", max_attempts);
                result.failed += 1;
            }
        }

        Ok(result)
    }
}

/// Timestamps of messages that started a thread.
pub fn reply_timestamps(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.has_replies())
        .map(|m| m.ts.clone())
        .collect()
}

/// Replaces characters that are not allowed in file names on common platforms.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.');

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
