//! Channel message export to plain text files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};

use crate::{
    domain::{ChannelId, Message},
    Result,
};

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Writes `<dir>/<channel_id>.txt`, replacing any previous export of the channel.
#[derive(Clone, Debug)]
pub struct ChannelExporter {
    dir: PathBuf,
}

impl ChannelExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, channel_id: &ChannelId) -> PathBuf {
        self.dir.join(format!("{channel_id}.txt"))
    }

    pub fn export(&self, channel_id: &ChannelId, messages: &[Message]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(channel_id);
        write_lines(&path, messages)?;
        Ok(path)
    }
}

fn write_lines(path: &Path, messages: &[Message]) -> Result<()> {
    let mut out = String::new();
    for m in messages {
        out.push_str(&format_line(m));
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// `[<local time>] <username>: <content>` on a single line.
pub fn format_line(m: &Message) -> String {
    format!(
        "[{}] {}: {}",
        localize_timestamp(&m.timestamp),
        single_line(&m.author.username),
        single_line(&m.content)
    )
}

/// Render an RFC 3339 timestamp in local time; unparseable input is kept as-is.
pub fn localize_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
        Err(_) => raw.to_string(),
    }
}

fn single_line(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
