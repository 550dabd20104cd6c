use url::Url;

/// Hosts a drop may link to.
pub const ALLOWED_HOSTS: &[&str] = &[
    "vibezcitizens.com",
    "cdn.vibezcitizens.com",
    "youtube.com",
    "www.youtube.com",
    "youtu.be",
    "instagram.com",
    "www.instagram.com",
    "tiktok.com",
    "www.tiktok.com",
    "linktr.ee",
    "www.linktr.ee",
    "facebook.com",
    "www.facebook.com",
    "x.com",
    "twitter.com",
    "www.twitter.com",
    "google.com",
    "www.google.com",
];

/// Substrings that disqualify a link anywhere in the URL.
pub const BANNED_SUBSTRINGS: &[&str] = &["porn", "sex", "redtube", "xvideos", "xnxx", "onlyfans"];

/// Whether a link may be attached to a drop. An empty link is fine.
pub fn is_safe_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return true;
    }

    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let lowered = url.to_lowercase();
    if BANNED_SUBSTRINGS.iter().any(|b| lowered.contains(b)) {
        return false;
    }

    parsed
        .host_str()
        .map(|host| host.to_lowercase())
        .is_some_and(|host| ALLOWED_HOSTS.contains(&host.as_str()))
}
