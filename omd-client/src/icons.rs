use once_cell::sync::Lazy;
use regex::Regex;

use omd_types::Drop;

/// Marker shown for a drop on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerIcon {
    PetFriendly,
    TruckStop,
    KidsFriendly,
    Restroom,
    Restaurant,
    GasStation,
    PublicPark,
    Camera,
    Note,
    Default,
}

impl MarkerIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerIcon::PetFriendly => "pet",
            MarkerIcon::TruckStop => "truck",
            MarkerIcon::KidsFriendly => "kids",
            MarkerIcon::Restroom => "restroom",
            MarkerIcon::Restaurant => "restaurant",
            MarkerIcon::GasStation => "gas",
            MarkerIcon::PublicPark => "park",
            MarkerIcon::Camera => "camera",
            MarkerIcon::Note => "note",
            MarkerIcon::Default => "default",
        }
    }

    pub fn for_drop(drop: &Drop) -> Self {
        marker_icon_for(drop.note.as_deref(), drop.has_media())
    }
}

fn keyword_regex(words: &str) -> Regex {
    Regex::new(&format!(r"(^|\s)#?({})\b", words)).expect("Failed to compile marker keyword regex")
}

// Checked in order; the first match wins.
static KEYWORD_ICONS: Lazy<Vec<(Regex, MarkerIcon)>> = Lazy::new(|| {
    vec![
        (keyword_regex("pet|pet_friendly|petfriendly"), MarkerIcon::PetFriendly),
        (
            keyword_regex("truckstop|truck_stop|truck|truckfriendly|truck_friendly"),
            MarkerIcon::TruckStop,
        ),
        (keyword_regex("kids|kidsfriendly|kids_friendly|family"), MarkerIcon::KidsFriendly),
        (keyword_regex("restroom|bathroom|toilet|wc"), MarkerIcon::Restroom),
        (keyword_regex("restaurant|food|eat|diner|tacos"), MarkerIcon::Restaurant),
        (keyword_regex("gas|gasstation|fuel|diesel"), MarkerIcon::GasStation),
        (keyword_regex("park|publicpark"), MarkerIcon::PublicPark),
    ]
});

/// Pick the marker for a note: keyword categories first, then photo, then
/// plain note, then the default pin.
pub fn marker_icon_for(note: Option<&str>, has_media: bool) -> MarkerIcon {
    let text = note.unwrap_or_default().to_lowercase();

    if let Some((_, icon)) = KEYWORD_ICONS.iter().find(|(re, _)| re.is_match(&text)) {
        return *icon;
    }
    if has_media {
        MarkerIcon::Camera
    } else if !text.is_empty() {
        MarkerIcon::Note
    } else {
        MarkerIcon::Default
    }
}
