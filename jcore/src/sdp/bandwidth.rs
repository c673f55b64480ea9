//! Bandwidth limit injection (`b=AS` / `b=TIAS`).

use super::{MediaSection, SessionDescription, find_line};
use log::warn;
use serde::{Deserialize, Serialize};

/// Below this a screen-share stream is not expected to be usable.
pub const MIN_SCREEN_KBPS: u32 = 300;

/// Which bandwidth modifier the local media stack understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandwidthAttribute {
    /// `b=AS:<kbps>`
    #[default]
    ApplicationSpecific,
    /// `b=TIAS:<bps>`
    TransportIndependent,
}

impl BandwidthAttribute {
    fn line(&self, kbps: u32) -> String {
        match self {
            Self::ApplicationSpecific => format!("b=AS:{kbps}"),
            Self::TransportIndependent => format!("b=TIAS:{}", u64::from(kbps) * 1000),
        }
    }
}

/// Per-media limits in kilobits per second. `None` leaves that block alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthPolicy {
    /// Whole-session limit.
    pub session: Option<u32>,
    pub audio: Option<u32>,
    pub video: Option<u32>,
    /// Used instead of `video` for screen-share video blocks.
    pub screen: Option<u32>,
    pub data: Option<u32>,
}

impl BandwidthPolicy {
    pub fn is_empty(&self) -> bool {
        self.session.is_none()
            && self.audio.is_none()
            && self.video.is_none()
            && self.screen.is_none()
            && self.data.is_none()
    }
}

fn is_bandwidth_limit(line: &str) -> bool {
    line.starts_with("b=AS:") || line.starts_with("b=TIAS:")
}

/// Rewrites bandwidth limits in session descriptions. Pure: the input is
/// never modified, and an empty policy returns it unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SdpBandwidthShaper {
    policy: BandwidthPolicy,
    attribute: BandwidthAttribute,
}

impl SdpBandwidthShaper {
    pub fn new(policy: BandwidthPolicy, attribute: BandwidthAttribute) -> Self {
        Self { policy, attribute }
    }

    pub fn policy(&self) -> &BandwidthPolicy {
        &self.policy
    }

    /// Applies the policy. `screen_share` marks the description's video
    /// blocks as carrying a screen share.
    pub fn shape(&self, sdp: &str, screen_share: bool) -> String {
        if self.policy.is_empty() {
            return sdp.to_string();
        }

        if screen_share {
            match self.policy.screen {
                None => warn!(
                    target: "Jingle/Sdp",
                    "No screen bandwidth configured; screen share is sent without a limit"
                ),
                Some(kbps) if kbps < MIN_SCREEN_KBPS => warn!(
                    target: "Jingle/Sdp",
                    "Screen bandwidth of {kbps} kbps is below {MIN_SCREEN_KBPS}; screen share may fail"
                ),
                Some(_) => {}
            }
        }

        let mut desc = SessionDescription::parse(sdp);

        if let Some(kbps) = self.policy.session {
            self.rewrite_session(&mut desc.session, kbps);
        }
        for section in &mut desc.media {
            if let Some(kbps) = self.limit_for(section, screen_share) {
                self.rewrite_media(section, kbps);
            }
        }

        desc.serialize()
    }

    fn limit_for(&self, section: &MediaSection, screen_share: bool) -> Option<u32> {
        match section.kind() {
            "audio" => self.policy.audio,
            "video" if screen_share => self.policy.screen,
            "video" => self.policy.video,
            "application" => self.policy.data,
            _ => None,
        }
    }

    fn rewrite_session(&self, lines: &mut Vec<String>, kbps: u32) {
        lines.retain(|l| !is_bandwidth_limit(l));
        let at = match find_line(lines, "c=") {
            Some(i) => i + 1,
            None => find_line(lines, "t=").unwrap_or(lines.len()),
        };
        lines.insert(at, self.attribute.line(kbps));
    }

    fn rewrite_media(&self, section: &mut MediaSection, kbps: u32) {
        section.lines.retain(|l| !is_bandwidth_limit(l));
        let at = section
            .find_line("a=mid:")
            .or_else(|| section.find_line("c="))
            .map_or(1, |i| i + 1);
        section.lines.insert(at, self.attribute.line(kbps));
    }
}
