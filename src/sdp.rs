//! Local description post-processing driven by [`JingleConfig`].

use crate::config::JingleConfig;
use jcore::sdp::{
    OpusParams, SdpBandwidthShaper, VideoBitrateParams, set_opus_attributes, set_video_bitrates,
};

/// Applies the configured bandwidth limits and codec parameters to a
/// description before it is handed to the transport engine.
#[derive(Debug, Clone)]
pub struct SdpPostProcessor {
    shaper: SdpBandwidthShaper,
    video_bitrates: Option<VideoBitrateParams>,
    opus: Option<OpusParams>,
}

impl SdpPostProcessor {
    pub fn from_config(config: &JingleConfig) -> Self {
        Self {
            shaper: SdpBandwidthShaper::new(config.bandwidth, config.bandwidth_attribute),
            video_bitrates: config.video_bitrates.clone(),
            opus: config.opus,
        }
    }

    pub fn process(&self, sdp: &str, screen_share: bool) -> String {
        let mut out = self.shaper.shape(sdp, screen_share);
        if let Some(params) = &self.video_bitrates {
            out = set_video_bitrates(&out, params);
        }
        if let Some(params) = &self.opus {
            out = set_opus_attributes(&out, params);
        }
        out
    }
}
