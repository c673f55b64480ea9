//! Line-oriented session description handling.
//!
//! A description is split into the session-level block (everything before
//! the first `m=` line) and one block per media section. Transforms mutate
//! blocks and re-serialize with the original line terminator, so untouched
//! lines come back byte-for-byte.

pub mod bandwidth;
pub mod codec;

pub use bandwidth::{BandwidthAttribute, BandwidthPolicy, SdpBandwidthShaper};
pub use codec::{OpusParams, VideoBitrateParams, set_opus_attributes, set_video_bitrates};

/// One `m=` section and the lines that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSection {
    pub lines: Vec<String>,
}

impl MediaSection {
    /// Media kind from the `m=` line (`audio`, `video`, `application`).
    pub fn kind(&self) -> &str {
        self.lines
            .first()
            .and_then(|l| l.strip_prefix("m="))
            .and_then(|l| l.split_whitespace().next())
            .unwrap_or_default()
    }

    pub fn mid(&self) -> Option<&str> {
        self.lines.iter().find_map(|l| l.strip_prefix("a=mid:"))
    }

    pub fn find_line(&self, prefix: &str) -> Option<usize> {
        find_line(&self.lines, prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    terminator: &'static str,
    trailing_terminator: bool,
    pub session: Vec<String>,
    pub media: Vec<MediaSection>,
}

impl SessionDescription {
    pub fn parse(text: &str) -> Self {
        let terminator = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let mut lines: Vec<&str> = text.split(terminator).collect();
        let trailing_terminator = lines.last().is_some_and(|l| l.is_empty());
        if trailing_terminator {
            lines.pop();
        }

        let mut session = Vec::new();
        let mut media: Vec<MediaSection> = Vec::new();
        for line in lines {
            if line.starts_with("m=") {
                media.push(MediaSection {
                    lines: vec![line.to_string()],
                });
            } else if let Some(section) = media.last_mut() {
                section.lines.push(line.to_string());
            } else {
                session.push(line.to_string());
            }
        }

        Self {
            terminator,
            trailing_terminator,
            session,
            media,
        }
    }

    pub fn terminator(&self) -> &'static str {
        self.terminator
    }

    pub fn serialize(&self) -> String {
        let lines: Vec<&str> = self
            .session
            .iter()
            .chain(self.media.iter().flat_map(|m| m.lines.iter()))
            .map(String::as_str)
            .collect();
        let mut out = lines.join(self.terminator);
        if self.trailing_terminator {
            out.push_str(self.terminator);
        }
        out
    }
}

pub(crate) fn find_line(lines: &[String], prefix: &str) -> Option<usize> {
    lines.iter().position(|l| l.starts_with(prefix))
}
