//! Store records and their input shapes
//!
//! [`NewStore`] and [`StorePatch`] are what callers send; [`StoreDraft`] is the
//! trimmed, validated shape the repository persists; [`Store`] is what comes
//! back out of storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::slug::derive_slug;
use crate::user::UserId;
use crate::{Result, ValidationErrors};

/// Storage-assigned store identity
pub type StoreId = i64;

/// The only geometry stores carry
pub const POINT: &str = "Point";

/// A geographic point with its street address.
///
/// `coordinates` is `[longitude, latitude]`, GeoJSON order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    pub coordinates: [f64; 2],
}

impl Location {
    pub fn point(address: impl Into<String>, lng: f64, lat: f64) -> Self {
        Self {
            kind: POINT.to_string(),
            address: address.into(),
            coordinates: [lng, lat],
        }
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }
}

/// A store (point of interest) in the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    /// Unique URL identifier derived from `name`
    pub slug: String,
    pub description: Option<String>,
    /// Distinct tags in the order they were given
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub location: Location,
    /// Filename produced by the image pipeline
    pub photo: Option<String>,
    /// Owner; only the author may update the store
    pub author_id: UserId,
}

impl Store {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Location as supplied by a caller; every part may be missing or malformed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Vec<f64>>,
}

impl NewLocation {
    pub fn point(address: impl Into<String>, lng: f64, lat: f64) -> Self {
        Self {
            kind: Some(POINT.to_string()),
            address: Some(address.into()),
            coordinates: Some(vec![lng, lat]),
        }
    }
}

impl From<Location> for NewLocation {
    fn from(location: Location) -> Self {
        Self {
            kind: Some(location.kind),
            address: Some(location.address),
            coordinates: Some(location.coordinates.to_vec()),
        }
    }
}

/// Input for creating a store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewStore {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub location: NewLocation,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub author_id: UserId,
}

impl NewStore {
    pub fn new(name: impl Into<String>, location: NewLocation, author_id: impl Into<UserId>) -> Self {
        Self {
            name: name.into(),
            location,
            author_id: author_id.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    /// Trim, normalize and validate, reporting every violated field at once
    pub fn into_draft(self) -> Result<StoreDraft> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            errors.push("name", "Please enter a store name!");
        } else if derive_slug(&name).is_empty() {
            errors.push("name", "Store name must contain at least one letter or digit");
        }

        let kind = match self.location.kind.as_deref().map(str::trim) {
            None | Some("") => POINT.to_string(),
            Some(POINT) => POINT.to_string(),
            Some(other) => {
                errors.push("location.type", format!("Unsupported location type '{other}', expected Point"));
                other.to_string()
            }
        };

        let address = self.location.address.as_deref().map(str::trim).unwrap_or_default().to_string();
        if address.is_empty() {
            errors.push("location.address", "Please supply the address!");
        }

        let coordinates = match self.location.coordinates.as_deref() {
            Some(&[lng, lat]) => {
                if !lng.is_finite() || !lat.is_finite() {
                    errors.push("location.coordinates", "Coordinates must be finite numbers");
                } else {
                    if !(-180.0..=180.0).contains(&lng) {
                        errors.push("location.coordinates", "Longitude must be between -180 and 180");
                    }
                    if !(-90.0..=90.0).contains(&lat) {
                        errors.push("location.coordinates", "Latitude must be between -90 and 90");
                    }
                }
                [lng, lat]
            }
            Some(_) => {
                errors.push("location.coordinates", "Coordinates must be exactly [longitude, latitude]");
                [0.0, 0.0]
            }
            None => {
                errors.push("location.coordinates", "Please supply the coordinates!");
                [0.0, 0.0]
            }
        };

        let author_id = self.author_id.trim().to_string();
        if author_id.is_empty() {
            errors.push("author_id", "Please supply an author!");
        }

        errors.into_result()?;

        Ok(StoreDraft {
            name,
            description: trimmed_non_empty(self.description),
            tags: normalize_tags(self.tags),
            location: Location { kind, address, coordinates },
            photo: trimmed_non_empty(self.photo),
            author_id,
        })
    }
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorePatch {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some("")` clears the description
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<NewLocation>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl StorePatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn description(description: impl Into<String>) -> Self {
        Self { description: Some(description.into()), ..Self::default() }
    }

    /// Whether applying this patch would give `current` a different name
    pub fn renames(&self, current: &Store) -> bool {
        self.name
            .as_deref()
            .is_some_and(|name| name.trim() != current.name)
    }

    /// Overlay the patch on a stored record, yielding a full input to
    /// re-validate. The location type is always coerced to Point and the
    /// author is never taken from the patch.
    pub fn apply_to(self, current: &Store) -> NewStore {
        let stored = &current.location;
        let location = match self.location {
            Some(patch) => NewLocation {
                kind: Some(POINT.to_string()),
                address: patch.address.or_else(|| Some(stored.address.clone())),
                coordinates: patch.coordinates.or_else(|| Some(stored.coordinates.to_vec())),
            },
            None => NewLocation {
                kind: Some(POINT.to_string()),
                ..NewLocation::from(stored.clone())
            },
        };

        NewStore {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            description: self.description.or_else(|| current.description.clone()),
            tags: self.tags.unwrap_or_else(|| current.tags.clone()),
            location,
            photo: self.photo.or_else(|| current.photo.clone()),
            author_id: current.author_id.clone(),
        }
    }
}

/// A validated store ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct StoreDraft {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub location: Location,
    pub photo: Option<String>,
    pub author_id: UserId,
}

fn trimmed_non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim, drop blanks and remove duplicates, keeping first-seen order
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> NewStore {
        NewStore::new("  Cafe Deluxe ", NewLocation::point("1 Main St", -0.1276, 51.5072), "alice")
            .with_description("  Great coffee  ")
            .with_tags(["wifi", " wifi ", "", "parking"])
    }

    #[test]
    fn test_into_draft_trims_and_normalizes() {
        let draft = valid_input().into_draft().unwrap();
        assert_eq!(draft.name, "Cafe Deluxe");
        assert_eq!(draft.description.as_deref(), Some("Great coffee"));
        assert_eq!(draft.tags, vec!["wifi", "parking"]);
        assert_eq!(draft.location.kind, POINT);
        assert_eq!(draft.location.coordinates, [-0.1276, 51.5072]);
    }

    #[test]
    fn test_into_draft_reports_every_violation() {
        let input = NewStore {
            name: "   ".into(),
            location: NewLocation {
                kind: None,
                address: None,
                coordinates: Some(vec![1.0]),
            },
            author_id: String::new(),
            ..NewStore::default()
        };

        let err = input.into_draft().unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "location.address", "location.coordinates", "author_id"]);
    }

    #[test]
    fn test_into_draft_rejects_bad_coordinates() {
        let mut input = valid_input();
        input.location.coordinates = Some(vec![f64::NAN, 10.0]);
        assert!(input.into_draft().unwrap_err().field_errors()[0].field == "location.coordinates");

        let mut input = valid_input();
        input.location.coordinates = Some(vec![10.0, 95.0]);
        assert!(input.into_draft().is_err());

        let mut input = valid_input();
        input.location.coordinates = None;
        assert!(input.into_draft().is_err());
    }

    #[test]
    fn test_into_draft_rejects_non_point_on_create() {
        let mut input = valid_input();
        input.location.kind = Some("Polygon".into());
        let err = input.into_draft().unwrap_err();
        assert_eq!(err.field_errors()[0].field, "location.type");
    }

    #[test]
    fn test_patch_coerces_point_and_keeps_author() {
        let store = Store {
            id: 1,
            name: "Cafe Deluxe".into(),
            slug: "cafe-deluxe".into(),
            description: Some("Old".into()),
            tags: vec!["wifi".into()],
            created_at: Utc::now(),
            location: Location {
                kind: "Polygon".into(),
                ..Location::point("1 Main St", 1.0, 2.0)
            },
            photo: None,
            author_id: "alice".into(),
        };

        let patch = StorePatch {
            location: Some(NewLocation {
                kind: Some("Polygon".into()),
                address: Some("2 Side St".into()),
                coordinates: None,
            }),
            ..StorePatch::description("New")
        };
        assert!(!patch.renames(&store));

        let draft = patch.apply_to(&store).into_draft().unwrap();
        assert_eq!(draft.location.kind, POINT);
        assert_eq!(draft.location.address, "2 Side St");
        assert_eq!(draft.location.coordinates, [1.0, 2.0]);
        assert_eq!(draft.description.as_deref(), Some("New"));
        assert_eq!(draft.author_id, "alice");
        assert_eq!(draft.name, "Cafe Deluxe");
    }

    #[test]
    fn test_patch_renames() {
        let store = Store {
            id: 1,
            name: "Cafe Deluxe".into(),
            slug: "cafe-deluxe".into(),
            description: None,
            tags: vec![],
            created_at: Utc::now(),
            location: Location::point("1 Main St", 1.0, 2.0),
            photo: None,
            author_id: "alice".into(),
        };
        assert!(!StorePatch::name(" Cafe Deluxe ").renames(&store));
        assert!(StorePatch::name("Cafe Royale").renames(&store));
        assert!(!StorePatch::default().renames(&store));
    }
}
