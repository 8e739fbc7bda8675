//! # Domain Model: Trips, Places, Cards and Media
//!
//! Four record types, each with an opaque string id. Relationships are plain id
//! fields resolved through the store at read time; nothing embeds another record.
//!
//! ```text
//! Trip ◄──── Card ────► Place          (Card.trip_id, Card.place_id)
//!              │
//!              └──────► Media          (Card.media_id)
//! ```
//!
//! ## Invariants
//!
//! - **Trip**: `updated_at >= created_at`.
//! - **Place**: `geohash` is derived from `(lat, lon)` at [`crate::geohash::PLACE_PRECISION`]
//!   and is the deduplication key: the store holds at most one place per geohash.
//! - **Card**: `place_label_at_save` / `coords_at_save` are a snapshot taken when the
//!   card is created. They are never recomputed from the live place, so later place
//!   edits (or imports) cannot rewrite history.
//! - **Media**: exactly one payload file per id, named `{id}.{ext}` where `ext`
//!   comes from [`extension_for_mime`].
//!
//! ## Wire Format
//!
//! Records serialize with camelCase field names and RFC 3339 timestamps; the same
//! representation is used for the collection files and for export bundles.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::TokiError;
use crate::geohash;

/// Allocate a fresh opaque id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Ids end up in payload file names, so they must be a single plain name.
pub fn validate_id(id: &str) -> crate::error::Result<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(TokiError::InvalidId { id: id.to_string() });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Kilometers,
    Miles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSettings {
    #[serde(default)]
    pub distance_unit: DistanceUnit,
    /// Append a transport estimate to new cards.
    #[serde(default = "default_true")]
    pub transport_estimates: bool,
    /// Offer suggestions for the trip's destination.
    #[serde(default = "default_true")]
    pub suggestions: bool,
    #[serde(default)]
    pub share_locations: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TripSettings {
    fn default() -> Self {
        Self {
            distance_unit: DistanceUnit::Kilometers,
            transport_estimates: true,
            suggestions: true,
            share_locations: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Companion {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationKind {
    Flight,
    Train,
    Lodging,
    Restaurant,
    Activity,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    pub kind: ReservationKind,
    pub title: String,
    #[serde(default)]
    pub confirmation: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub place_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub cover_media_id: Option<String>,
    #[serde(default)]
    pub settings: TripSettings,
    #[serde(default)]
    pub companions: Vec<Companion>,
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(
        name: impl Into<String>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            start_date,
            end_date,
            cover_media_id: None,
            settings: TripSettings::default(),
            companions: Vec::new(),
            reservations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`, never letting it fall behind `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub geohash: String,
    /// Key of the place at an external provider (maps/POI service).
    #[serde(default)]
    pub provider_key: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub metadata: Option<PlaceMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Place {
    pub fn new(lat: f64, lon: f64, label: Option<String>, categories: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            label,
            lat,
            lon,
            geohash: geohash::encode(lat, lon, geohash::PLACE_PRECISION),
            provider_key: None,
            categories,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Photo,
    Note,
    Audio,
}

impl std::str::FromStr for CardKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photo" => Ok(CardKind::Photo),
            "note" => Ok(CardKind::Note),
            "audio" => Ok(CardKind::Audio),
            other => Err(format!("unknown card kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub trip_id: String,
    #[serde(default)]
    pub place_id: Option<String>,
    pub kind: CardKind,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub place_label_at_save: Option<String>,
    #[serde(default)]
    pub coords_at_save: Option<Coordinates>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`crate::store::TripStore::create_card`].
#[derive(Debug, Clone)]
pub struct NewCard {
    pub trip_id: String,
    pub place_id: Option<String>,
    pub kind: CardKind,
    pub taken_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub text: Option<String>,
    pub media_id: Option<String>,
}

impl NewCard {
    pub fn new(trip_id: impl Into<String>, kind: CardKind) -> Self {
        Self {
            trip_id: trip_id.into(),
            place_id: None,
            kind,
            taken_at: Utc::now(),
            tags: Vec::new(),
            text: None,
            media_id: None,
        }
    }

    pub fn at_place(mut self, place_id: impl Into<String>) -> Self {
        self.place_id = Some(place_id.into());
        self
    }

    pub fn taken_at(mut self, taken_at: DateTime<Utc>) -> Self {
        self.taken_at = taken_at;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_media(mut self, media_id: impl Into<String>) -> Self {
        self.media_id = Some(media_id.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    pub mime: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub exif: Option<BTreeMap<String, String>>,
    pub created_at: DateTime<Utc>,
}

impl Media {
    pub fn new(id: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mime: mime.into(),
            width: None,
            height: None,
            exif: None,
            created_at: Utc::now(),
        }
    }

    /// Name of the payload file: `{id}.{ext}`.
    pub fn filename(&self) -> String {
        media_filename(&self.id, &self.mime)
    }
}

/// File extension for a payload of the given MIME type. Unknown types map to `bin`.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/heic" => "heic",
        "audio/m4a" => "m4a",
        "audio/webm" => "webm",
        _ => "bin",
    }
}

pub fn media_filename(id: &str, mime: &str) -> String {
    format!("{}.{}", id, extension_for_mime(mime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_extension_table() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/heic"), "heic");
        assert_eq!(extension_for_mime("audio/m4a"), "m4a");
        assert_eq!(extension_for_mime("audio/webm"), "webm");
        assert_eq!(extension_for_mime("IMAGE/JPEG"), "jpg");
        assert_eq!(extension_for_mime("video/mp4"), "bin");
        assert_eq!(extension_for_mime(""), "bin");
    }

    #[test]
    fn test_media_filename() {
        let media = Media::new("m1", "image/jpeg");
        assert_eq!(media.filename(), "m1.jpg");
        assert_eq!(media_filename("a", "application/pdf"), "a.bin");
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id(&new_id()).is_ok());
        assert!(validate_id("p1").is_ok());
        assert!(validate_id("trip.2025").is_ok());

        for bad in ["", ".", "..", "../x", "a/b", "a\\b", "nul\0"] {
            let err = validate_id(bad).unwrap_err();
            assert!(matches!(err, TokiError::InvalidId { .. }), "{:?}", bad);
        }
    }

    #[test]
    fn test_place_derives_geohash() {
        let place = Place::new(35.6586, 139.7454, Some("Tokyo Tower".into()), vec![]);
        assert_eq!(place.geohash, "xn76g");
    }

    #[test]
    fn test_trip_touch_never_precedes_creation() {
        let mut trip = Trip::new("Future", None, None);
        trip.created_at = Utc::now() + Duration::hours(2);
        trip.touch();
        assert!(trip.updated_at >= trip.created_at);
    }

    #[test]
    fn test_coordinates_validation() {
        assert!(Coordinates::new(90.0, -180.0).is_valid());
        assert!(!Coordinates::new(90.1, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, 181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_card_wire_names_are_camel_case() {
        let card = Card {
            id: "c1".into(),
            trip_id: "t1".into(),
            place_id: Some("p1".into()),
            kind: CardKind::Photo,
            taken_at: Utc::now(),
            tags: vec!["food".into()],
            text: None,
            media_id: Some("m1".into()),
            place_label_at_save: Some("Tokyo Tower".into()),
            coords_at_save: Some(Coordinates::new(35.6586, 139.7454)),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["tripId"], "t1");
        assert_eq!(json["placeLabelAtSave"], "Tokyo Tower");
        assert_eq!(json["coordsAtSave"]["lat"], 35.6586);
        assert_eq!(json["kind"], "photo");
    }

    #[test]
    fn test_trip_settings_default_when_missing() {
        let json = r#"{
            "id": "t1",
            "name": "Old",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-02T00:00:00Z"
        }"#;
        let trip: Trip = serde_json::from_str(json).unwrap();
        assert_eq!(trip.settings, TripSettings::default());
        assert!(trip.companions.is_empty());
    }

    #[test]
    fn test_card_kind_from_str() {
        assert_eq!("Photo".parse::<CardKind>().unwrap(), CardKind::Photo);
        assert!("video".parse::<CardKind>().is_err());
    }
}
