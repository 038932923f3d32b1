use serde::{Deserialize, Serialize};

/// Playback URLs for a signed token on the delivery network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUrls {
    pub iframe: String,
    pub hls: String,
    pub dash: String,
}

impl StreamUrls {
    pub fn for_token(customer_code: &str, token: &str) -> Self {
        let base = format!("https://customer-{customer_code}.cloudflarestream.com/{token}");
        Self {
            iframe: format!("{base}/iframe"),
            hls: format!("{base}/manifest/video.m3u8"),
            dash: format!("{base}/manifest/video.mpd"),
        }
    }
}
