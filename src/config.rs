use jcore::ice::IcePolicy;
use jcore::jid::DEFAULT_RELAY_RESOURCE;
use jcore::sdp::{BandwidthAttribute, BandwidthPolicy, OpusParams, VideoBitrateParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_IQ_TIMEOUT_SECS: u64 = 75;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JingleConfig {
    /// Resource of the media relay; sessions with it are relayed.
    pub relay_resource: String,
    pub ice: IcePolicy,
    pub iq_timeout_secs: u64,
    /// Limits in kbps.
    pub bandwidth: BandwidthPolicy,
    pub bandwidth_attribute: BandwidthAttribute,
    pub video_bitrates: Option<VideoBitrateParams>,
    pub opus: Option<OpusParams>,
    /// Whether `<startmuted>` in a session-initiate is surfaced.
    pub start_muted_support: bool,
}

impl Default for JingleConfig {
    fn default() -> Self {
        Self {
            relay_resource: DEFAULT_RELAY_RESOURCE.to_string(),
            ice: IcePolicy::default(),
            iq_timeout_secs: DEFAULT_IQ_TIMEOUT_SECS,
            bandwidth: BandwidthPolicy::default(),
            bandwidth_attribute: BandwidthAttribute::default(),
            video_bitrates: None,
            opus: None,
            start_muted_support: true,
        }
    }
}

impl JingleConfig {
    pub fn iq_timeout(&self) -> Duration {
        Duration::from_secs(self.iq_timeout_secs)
    }
}
