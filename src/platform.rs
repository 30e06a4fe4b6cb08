//! Canonical platform tags.
//!
//! Every boundary (initiate, callback, status, disconnect, storage reads)
//! goes through [`Platform::canonicalize`] so historical names written by
//! older clients and older rows resolve to one tag.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Facebook,
    Instagram,
    Linkedin,
    X,
    Tiktok,
}

impl Platform {
    /// Every recognized platform, in status listing order.
    pub const ALL: [Platform; 6] = [
        Platform::Youtube,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::X,
        Platform::Tiktok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::X => "x",
            Platform::Tiktok => "tiktok",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::Linkedin => "LinkedIn",
            Platform::X => "X (Twitter)",
            Platform::Tiktok => "TikTok",
        }
    }

    /// Historical names still found in old rows and old client builds.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Platform::Youtube => &["google", "google_youtube", "youtube_channel", "yt"],
            Platform::Facebook => &["fb", "facebook_page", "facebook_pages", "meta"],
            Platform::Instagram => &["ig", "instagram_business", "instagram_graph"],
            Platform::Linkedin => &["linkedin_oidc", "linkedin_personal", "li"],
            Platform::X => &["twitter", "x_twitter", "twitter_v2"],
            Platform::Tiktok => &["tik_tok", "tiktok_business"],
        }
    }

    /// Canonical tag followed by every alias; the set a stored row may carry.
    pub fn stored_tags(&self) -> Vec<&'static str> {
        let mut tags = vec![self.as_str()];
        tags.extend_from_slice(self.aliases());
        tags
    }

    /// Resolve a platform name or alias. Case-insensitive; `-` and `_` are interchangeable.
    pub fn canonicalize(name: &str) -> Option<Platform> {
        let normalized = normalize_tag(name);
        if normalized.is_empty() {
            return None;
        }
        Platform::ALL.into_iter().find(|p| {
            p.as_str() == normalized || p.aliases().iter().any(|a| *a == normalized)
        })
    }
}

/// Spelling-insensitive form of a platform name, as compared against [`Platform::stored_tags`].
pub fn normalize_tag(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
