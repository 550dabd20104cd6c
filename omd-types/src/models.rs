use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{FollowStatus, VoteValue};

// Postgres `numeric` columns come back as JSON strings through the REST layer,
// while `float8` columns come back as numbers. Accept both.
mod lenient_f64 {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::Text(s) => s.trim().parse::<f64>().map_err(de::Error::custom),
        }
    }

    pub mod option {
        use super::NumberOrString;
        use serde::{de, Deserialize, Deserializer};

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<NumberOrString>::deserialize(deserializer)? {
                None => Ok(None),
                Some(NumberOrString::Number(n)) => Ok(Some(n)),
                Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
                Some(NumberOrString::Text(s)) => {
                    s.trim().parse::<f64>().map(Some).map_err(de::Error::custom)
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Drops (pins)
// ----------------------------------------------------------------------------

/// A geotagged note/photo marker, in the single shape every read path returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drop {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(deserialize_with = "lenient_f64::deserialize")]
    pub lat: f64,
    #[serde(deserialize_with = "lenient_f64::deserialize")]
    pub lng: f64,
    #[serde(default)]
    pub note: Option<String>,
    /// Legacy single media URL, mirrors `media_urls[0]`.
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub media_urls: Option<Vec<String>>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Drop {
    /// Media to show in a gallery: the array when present, else the legacy field.
    pub fn gallery(&self, cap: usize) -> Vec<String> {
        match &self.media_urls {
            Some(urls) if !urls.is_empty() => urls.iter().take(cap).cloned().collect(),
            _ => self.image_url.iter().cloned().collect(),
        }
    }

    pub fn has_media(&self) -> bool {
        self.image_url.is_some() || self.media_urls.as_ref().is_some_and(|m| !m.is_empty())
    }
}

/// Fields accepted when creating a drop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDrop {
    pub lat: f64,
    pub lng: f64,
    pub note: Option<String>,
    /// Legacy single media URL.
    pub media_url: Option<String>,
    pub media_urls: Option<Vec<String>>,
    pub link_url: Option<String>,
    pub is_private: bool,
}

/// Partial update of a drop. Only these fields can ever be written; an outer
/// `Some` means "supplied", an inner `None` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DropPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_urls: Option<Option<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl DropPatch {
    pub fn is_empty(&self) -> bool {
        self.note.is_none()
            && self.link_url.is_none()
            && self.is_private.is_none()
            && self.image_url.is_none()
            && self.media_urls.is_none()
            && self.lat.is_none()
            && self.lng.is_none()
    }
}

/// Row of the `my_pins_list` aggregate view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropWithStats {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub media_urls: Option<Vec<String>>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub up_count: i64,
    #[serde(default)]
    pub down_count: i64,
}

/// Row of the `top_posters` aggregate view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPoster {
    pub user_id: Uuid,
    pub pin_count: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

// ----------------------------------------------------------------------------
// Votes, views, reports
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinVote {
    pub pin_id: Uuid,
    pub user_id: Uuid,
    pub value: VoteValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub up: i64,
    pub down: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinReport {
    pub pin_id: Uuid,
    pub reporter_id: Uuid,
    pub reason: String,
}

// ----------------------------------------------------------------------------
// Comments and ratings
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    #[serde(alias = "pin_id")]
    pub drop_id: Uuid,
    pub user_id: Uuid,
    #[serde(alias = "body")]
    pub comment: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A comment joined client-side with its author's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<ProfileSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinRating {
    pub pin_id: Uuid,
    pub user_id: Uuid,
    pub rating: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: usize,
}

// ----------------------------------------------------------------------------
// Profiles and follows
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default = "default_discoverable")]
    pub discoverable: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_discoverable() -> bool {
    true
}

/// The subset of a profile shown next to comments and in follower lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Editable profile fields. The username is fixed at registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discoverable: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.photo_url.is_none()
            && self.banner_url.is_none()
            && self.discoverable.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub followers: i64,
    pub following: i64,
    pub drops: i64,
    pub trips: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePhoto {
    pub id: Uuid,
    pub url: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowRequest {
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub status: FollowStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ----------------------------------------------------------------------------
// Trips and stops
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    #[serde(alias = "owner_id")]
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrip {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_private: bool,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TripPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: Uuid,
    pub trip_id: Uuid,
    #[serde(default)]
    pub day_index: i32,
    #[serde(default)]
    pub order_index: i32,
    pub title: String,
    #[serde(default, deserialize_with = "lenient_f64::option::deserialize")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64::option::deserialize")]
    pub lng: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStop {
    pub trip_id: Uuid,
    pub day_index: i32,
    pub order_index: i32,
    pub title: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub note: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StopPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<Option<String>>,
}

// ----------------------------------------------------------------------------
// Notifications
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: Uuid,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ----------------------------------------------------------------------------
// Auth
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session issued by the hosted auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_drop_accepts_numeric_strings() {
        let drop: Drop = serde_json::from_value(json!({
            "id": "6f1c2b1e-8c1a-4e0b-9f52-2d3f4a5b6c7d",
            "lat": "34.05",
            "lng": -118.25,
            "note": "#restroom clean"
        }))
        .unwrap();
        assert_eq!(drop.lat, 34.05);
        assert_eq!(drop.lng, -118.25);
        assert!(!drop.is_private);
        assert!(!drop.has_media());
    }

    #[test]
    fn test_gallery_prefers_array_then_legacy() {
        let mut drop: Drop = serde_json::from_value(json!({
            "id": "6f1c2b1e-8c1a-4e0b-9f52-2d3f4a5b6c7d",
            "lat": 1.0,
            "lng": 2.0,
            "image_url": "https://cdn.example/a.jpg"
        }))
        .unwrap();
        assert_eq!(drop.gallery(10), vec!["https://cdn.example/a.jpg".to_string()]);

        drop.media_urls = Some(vec!["x".into(), "y".into(), "z".into()]);
        assert_eq!(drop.gallery(2), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_drop_patch_serializes_only_supplied_fields() {
        let patch = DropPatch {
            note: Some(None),
            is_private: Some(true),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, json!({ "note": null, "is_private": true }));
        assert!(DropPatch::default().is_empty());
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_comment_accepts_body_alias() {
        let comment: Comment = serde_json::from_value(json!({
            "id": "6f1c2b1e-8c1a-4e0b-9f52-2d3f4a5b6c7d",
            "pin_id": "7f1c2b1e-8c1a-4e0b-9f52-2d3f4a5b6c7d",
            "user_id": "8f1c2b1e-8c1a-4e0b-9f52-2d3f4a5b6c7d",
            "body": "nice spot"
        }))
        .unwrap();
        assert_eq!(comment.comment, "nice spot");
    }

    #[test]
    fn test_stop_lenient_coordinates() {
        let stop: Stop = serde_json::from_value(json!({
            "id": "6f1c2b1e-8c1a-4e0b-9f52-2d3f4a5b6c7d",
            "trip_id": "7f1c2b1e-8c1a-4e0b-9f52-2d3f4a5b6c7d",
            "title": "Lunch",
            "lat": "36.1",
            "lng": null
        }))
        .unwrap();
        assert_eq!(stop.lat, Some(36.1));
        assert_eq!(stop.lng, None);
        assert_eq!(stop.day_index, 0);
    }
}
