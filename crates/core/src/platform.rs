//! Platform classification for ingest URLs.
//!
//! Maps an RTMP ingest URL to a human-readable provider label by keyword
//! lookup. Classification is purely cosmetic; relaying works the same for
//! every platform.

/// Keyword table, checked in order against the lowercased URL.
const PLATFORM_KEYWORDS: &[(&str, &str)] = &[
    ("youtube", "YouTube"),
    ("facebook", "Facebook"),
    ("twitch", "Twitch"),
    ("tiktok", "TikTok"),
    ("instagram", "Instagram"),
    ("shopee", "Shopee Live"),
    ("restream", "Restream.io"),
];

/// Label used when no keyword matches.
pub const CUSTOM_PLATFORM: &str = "Custom";

/// Classify an RTMP ingest URL into a provider label.
pub fn classify(rtmp_url: &str) -> &'static str {
    let lowered = rtmp_url.to_lowercase();
    PLATFORM_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, label)| *label)
        .unwrap_or(CUSTOM_PLATFORM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_platforms() {
        assert_eq!(classify("rtmp://a.rtmp.youtube.com/live2"), "YouTube");
        assert_eq!(classify("rtmps://live-api-s.facebook.com:443/rtmp"), "Facebook");
        assert_eq!(classify("rtmp://live.twitch.tv/app"), "Twitch");
        assert_eq!(classify("rtmp://push.tiktokcdn.com/live"), "TikTok");
        assert_eq!(classify("rtmps://live-upload.instagram.com:443/rtmp"), "Instagram");
        assert_eq!(classify("rtmp://live.shopee.co.id/live"), "Shopee Live");
        assert_eq!(classify("rtmp://live.restream.io/live"), "Restream.io");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("rtmp://A.RTMP.YOUTUBE.COM/live2"), "YouTube");
    }

    #[test]
    fn test_unknown_falls_back_to_custom() {
        assert_eq!(classify("rtmp://ingest.example.com/live"), "Custom");
        assert_eq!(classify(""), "Custom");
    }
}
