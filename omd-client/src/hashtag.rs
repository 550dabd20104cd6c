use once_cell::sync::Lazy;
use regex::Regex;

/// Regex pattern for matching hashtags
/// Matches: #word at the start or after whitespace, 2-30 of [a-z0-9_]
static HASHTAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\s)#([a-z0-9_]{2,30})").expect("Failed to compile hashtag regex")
});

static MULTI_SPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("Failed to compile whitespace regex"));

/// Tags offered as one-tap toggles in the composer.
pub const QUICK_TAGS: &[&str] = &[
    "petfriendly",
    "restroom",
    "truckstop",
    "restaurant",
    "publicpark",
    "gasstation",
];

/// Legacy spelling that the truck-stop toggle also clears.
pub const LEGACY_TRUCK_TAG: &str = "18wheeler";

/// Extract hashtags from a note
///
/// Returns unique hashtag names (without the # prefix), lowercased, in the
/// order they first appear.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for cap in HASHTAG_REGEX.captures_iter(text) {
        let tag = cap[1].to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn bare(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

fn tag_regex(tag: &str) -> Option<Regex> {
    let name = bare(tag);
    if name.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)(^|\s)#{}\b", regex::escape(&name))).ok()
}

/// Whether `note` already carries `tag` (with or without the leading `#`).
pub fn has_tag(note: &str, tag: &str) -> bool {
    tag_regex(tag).is_some_and(|re| re.is_match(note))
}

/// Append `tag` unless present. Non-empty results end with one space so the
/// caret lands after the tag.
pub fn add_tag(note: &str, tag: &str) -> String {
    if has_tag(note, tag) || bare(tag).is_empty() {
        return note.to_string();
    }
    let needs_space = !note.is_empty() && !note.ends_with(char::is_whitespace);
    let joined = format!("{}{}#{}", note, if needs_space { " " } else { "" }, bare(tag));
    format!("{} ", joined.trim())
}

/// Remove every occurrence of `tag`, collapsing the whitespace left behind.
pub fn remove_tag(note: &str, tag: &str) -> String {
    let Some(re) = tag_regex(tag) else {
        return note.to_string();
    };
    let stripped = re.replace_all(note, "$1");
    let cleaned = MULTI_SPACE_REGEX.replace_all(&stripped, " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        String::new()
    } else {
        format!("{} ", cleaned)
    }
}

pub fn toggle_tag(note: &str, tag: &str, checked: bool) -> String {
    if checked {
        add_tag(note, tag)
    } else {
        remove_tag(note, tag)
    }
}

/// The truck-stop toggle always drops the legacy `#18wheeler` spelling.
pub fn toggle_truck_stop(note: &str, checked: bool) -> String {
    let without_legacy = remove_tag(note, LEGACY_TRUCK_TAG);
    toggle_tag(&without_legacy, "truckstop", checked)
}

/// Quick tags currently switched on for `note`.
pub fn active_quick_tags(note: &str) -> Vec<&'static str> {
    QUICK_TAGS
        .iter()
        .copied()
        .filter(|tag| {
            has_tag(note, tag) || (*tag == "truckstop" && has_tag(note, LEGACY_TRUCK_TAG))
        })
        .collect()
}
