//! Codec parameter transforms on `a=fmtp` lines.
//!
//! Both transforms are no-ops when the codec they target is missing; they
//! never fail and never touch lines outside the codec they adjust.

use super::{MediaSection, SessionDescription};
use serde::{Deserialize, Serialize};

/// `a=rtpmap:<pt> <name>/<clock>[/<channels>]`
fn parse_rtpmap(line: &str) -> Option<(&str, &str, u32)> {
    let rest = line.strip_prefix("a=rtpmap:")?;
    let (payload, encoding) = rest.split_once(' ')?;
    let mut parts = encoding.split('/');
    let name = parts.next()?;
    let clock = parts.next()?.parse().ok()?;
    Some((payload, name, clock))
}

fn find_payload<'a>(section: &'a MediaSection, codec: &str, clock_rate: u32) -> Option<&'a str> {
    section.lines.iter().find_map(|l| {
        let (pt, name, clock) = parse_rtpmap(l)?;
        (name.eq_ignore_ascii_case(codec) && clock == clock_rate).then_some(pt)
    })
}

/// Parsed `a=fmtp:<pt> k=v;k=v` parameter list, order preserved.
struct Fmtp {
    payload: String,
    params: Vec<(String, Option<String>)>,
}

impl Fmtp {
    fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix("a=fmtp:")?;
        let (payload, params) = rest.split_once(' ').unwrap_or((rest, ""));
        let params = params
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| match p.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), Some(v.trim().to_string())),
                None => (p.to_string(), None),
            })
            .collect();
        Some(Self {
            payload: payload.to_string(),
            params,
        })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    fn set(&mut self, key: &str, value: impl ToString) {
        let value = Some(value.to_string());
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
    }

    fn render(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}={v}"),
                None => k.clone(),
            })
            .collect();
        format!("a=fmtp:{} {}", self.payload, params.join(";"))
    }
}

fn fmtp_index(section: &MediaSection, payload: &str) -> Option<usize> {
    section.lines.iter().position(|l| {
        l.strip_prefix("a=fmtp:")
            .and_then(|rest| rest.split_whitespace().next())
            == Some(payload)
    })
}

/// Bitrate floor/ceiling for a video codec, applied only when the codec has
/// a retransmission (RTX) payload bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoBitrateParams {
    pub codec: String,
    pub clock_rate: u32,
    pub min_kbps: u32,
    /// Defaults to `min_kbps`.
    pub max_kbps: Option<u32>,
}

impl Default for VideoBitrateParams {
    fn default() -> Self {
        Self {
            codec: "VP8".to_string(),
            clock_rate: 90000,
            min_kbps: 228,
            max_kbps: None,
        }
    }
}

pub fn set_video_bitrates(sdp: &str, params: &VideoBitrateParams) -> String {
    let mut desc = SessionDescription::parse(sdp);
    let mut changed = false;
    for section in desc.media.iter_mut().filter(|m| m.kind() == "video") {
        changed |= apply_video_bitrates(section, params);
    }
    if changed { desc.serialize() } else { sdp.to_string() }
}

fn apply_video_bitrates(section: &mut MediaSection, params: &VideoBitrateParams) -> bool {
    let Some(payload) = find_payload(section, &params.codec, params.clock_rate).map(str::to_string)
    else {
        return false;
    };

    let rtx_payloads: Vec<String> = section
        .lines
        .iter()
        .filter_map(|l| parse_rtpmap(l))
        .filter(|(_, name, clock)| name.eq_ignore_ascii_case("rtx") && *clock == params.clock_rate)
        .map(|(pt, _, _)| pt.to_string())
        .collect();
    // prefer the rtx stream whose apt= points at our codec
    let rtx_fmtp = rtx_payloads
        .iter()
        .filter_map(|pt| fmtp_index(section, pt))
        .find(|&i| {
            Fmtp::parse(&section.lines[i]).is_some_and(|f| f.get("apt") == Some(payload.as_str()))
        })
        .or_else(|| rtx_payloads.first().and_then(|pt| fmtp_index(section, pt)));
    if rtx_payloads.is_empty() {
        return false;
    }

    let max = params.max_kbps.unwrap_or(params.min_kbps);
    match fmtp_index(section, &payload) {
        Some(i) => {
            let Some(mut fmtp) = Fmtp::parse(&section.lines[i]) else {
                return false;
            };
            fmtp.set("x-google-min-bitrate", params.min_kbps);
            fmtp.set("x-google-max-bitrate", max);
            section.lines[i] = fmtp.render();
        }
        None => {
            let line = format!(
                "a=fmtp:{payload} x-google-min-bitrate={};x-google-max-bitrate={max}",
                params.min_kbps
            );
            let at = rtx_fmtp
                .or_else(|| {
                    section
                        .lines
                        .iter()
                        .position(|l| parse_rtpmap(l).is_some_and(|(pt, _, _)| pt == payload))
                })
                .map_or(section.lines.len(), |i| i + 1);
            section.lines.insert(at, line);
        }
    }
    true
}

/// Opus fmtp parameters. `None` fields are left as they are, except the
/// stereo pair, which defaults to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpusParams {
    pub stereo: Option<bool>,
    pub sprop_stereo: Option<bool>,
    pub max_average_bitrate: Option<u32>,
    pub max_playback_rate: Option<u32>,
    pub cbr: Option<bool>,
    /// In-band forward error correction.
    pub use_inband_fec: Option<bool>,
    pub use_dtx: Option<bool>,
    pub max_ptime: Option<u32>,
}

fn flag(b: bool) -> u8 {
    u8::from(b)
}

pub fn set_opus_attributes(sdp: &str, params: &OpusParams) -> String {
    let mut desc = SessionDescription::parse(sdp);
    let mut changed = false;
    for section in desc.media.iter_mut().filter(|m| m.kind() == "audio") {
        changed |= apply_opus(section, params);
    }
    if changed { desc.serialize() } else { sdp.to_string() }
}

fn apply_opus(section: &mut MediaSection, params: &OpusParams) -> bool {
    let Some(payload) = find_payload(section, "opus", 48000).map(str::to_string) else {
        return false;
    };
    let Some(i) = fmtp_index(section, &payload) else {
        return false;
    };
    let Some(mut fmtp) = Fmtp::parse(&section.lines[i]) else {
        return false;
    };

    fmtp.set("stereo", flag(params.stereo.unwrap_or(true)));
    fmtp.set("sprop-stereo", flag(params.sprop_stereo.unwrap_or(true)));
    if let Some(v) = params.max_average_bitrate {
        fmtp.set("maxaveragebitrate", v);
    }
    if let Some(v) = params.max_playback_rate {
        fmtp.set("maxplaybackrate", v);
    }
    if let Some(v) = params.cbr {
        fmtp.set("cbr", flag(v));
    }
    if let Some(v) = params.use_inband_fec {
        fmtp.set("useinbandfec", flag(v));
    }
    if let Some(v) = params.use_dtx {
        fmtp.set("usedtx", flag(v));
    }
    section.lines[i] = fmtp.render();

    if let Some(ptime) = params.max_ptime {
        let line = format!("a=maxptime:{ptime}");
        match section.find_line("a=maxptime:") {
            Some(j) => section.lines[j] = line,
            None => section.lines.insert(i + 1, line),
        }
    }
    true
}
