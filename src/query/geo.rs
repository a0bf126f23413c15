//! Geospatial nearest-neighbor queries
//!
//! The R*Tree index narrows candidates to a bounding box around the query
//! point; exact great-circle distances decide membership and order.

use serde::Serialize;
use std::f64::consts::FRAC_PI_2;
use crate::storage::SqliteStore;
use crate::store::{Location, StoreId};
use crate::{Error, Result, ValidationErrors};

/// Sphere radius used for distances, in meters
pub const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

pub const DEFAULT_MAX_DISTANCE_METERS: f64 = 10_000.0;
pub const DEFAULT_NEARBY_LIMIT: usize = 10;

/// Slack added to the bounding box so float rounding never drops a point
const BOX_EPSILON_DEGREES: f64 = 1e-6;

/// The projection returned by nearby queries
#[derive(Debug, Clone, Serialize)]
pub struct NearbyStore {
    #[serde(skip)]
    pub id: StoreId,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Location,
    pub photo: Option<String>,
    pub distance_meters: f64,
}

/// A validated nearby query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoQuery {
    pub lat: f64,
    pub lng: f64,
    pub max_distance_meters: f64,
    pub limit: usize,
}

impl GeoQuery {
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let mut errors = ValidationErrors::new();
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            errors.push("lat", "Latitude must be a number between -90 and 90");
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            errors.push("lng", "Longitude must be a number between -180 and 180");
        }
        errors.into_result()?;

        Ok(Self {
            lat,
            lng,
            max_distance_meters: DEFAULT_MAX_DISTANCE_METERS,
            limit: DEFAULT_NEARBY_LIMIT,
        })
    }

    /// Parse raw query-string values, as a transport layer receives them
    pub fn parse(lat: &str, lng: &str) -> Result<Self> {
        let mut errors = ValidationErrors::new();
        let lat = lat.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        let lng = lng.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        if lat.is_none() {
            errors.push("lat", "Latitude must be a number");
        }
        if lng.is_none() {
            errors.push("lng", "Longitude must be a number");
        }

        match (lat, lng) {
            (Some(lat), Some(lng)) => Self::new(lat, lng),
            _ => Err(Error::Validation(errors)),
        }
    }

    pub fn with_max_distance(mut self, meters: f64) -> Result<Self> {
        if !meters.is_finite() || meters < 0.0 {
            let mut errors = ValidationErrors::new();
            errors.push("max_distance", "Maximum distance must be a non-negative number of meters");
            return Err(Error::Validation(errors));
        }
        self.max_distance_meters = meters;
        Ok(self)
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// `(min_lng, max_lng, min_lat, max_lat)` containing every point within
    /// `max_distance_meters`; spans all longitudes near the poles or across
    /// the antimeridian
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let angular = self.max_distance_meters / EARTH_RADIUS_METERS;
        let dlat = angular.to_degrees();
        let min_lat = (self.lat - dlat).max(-90.0);
        let max_lat = (self.lat + dlat).min(90.0);

        let full_lng = (-180.0, 180.0);
        let (min_lng, max_lng) = if min_lat <= -90.0 || max_lat >= 90.0 || angular >= FRAC_PI_2 {
            full_lng
        } else {
            let ratio = angular.sin() / self.lat.to_radians().cos();
            if ratio >= 1.0 {
                full_lng
            } else {
                let dlng = ratio.asin().to_degrees();
                if self.lng - dlng < -180.0 || self.lng + dlng > 180.0 {
                    full_lng
                } else {
                    (self.lng - dlng, self.lng + dlng)
                }
            }
        };

        (
            min_lng - BOX_EPSILON_DEGREES,
            max_lng + BOX_EPSILON_DEGREES,
            min_lat - BOX_EPSILON_DEGREES,
            max_lat + BOX_EPSILON_DEGREES,
        )
    }
}

/// Great-circle distance in meters between two `(lat, lng)` points
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
}

/// Nearest-first store lookup around a point
pub struct GeoIndex<'a> {
    db: &'a SqliteStore,
}

impl<'a> GeoIndex<'a> {
    pub fn new(db: &'a SqliteStore) -> Self {
        Self { db }
    }

    /// Stores within `max_distance_meters` of `(lat, lng)`, nearest first,
    /// at most `limit` of them
    pub fn nearby(&self, lat: f64, lng: f64, max_distance_meters: f64, limit: usize) -> Result<Vec<NearbyStore>> {
        let query = GeoQuery::new(lat, lng)?
            .with_max_distance(max_distance_meters)?
            .with_limit(limit);
        self.query(&query)
    }

    pub fn query(&self, query: &GeoQuery) -> Result<Vec<NearbyStore>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let (min_lng, max_lng, min_lat, max_lat) = query.bounding_box();
        let candidates = self.db.stores_in_box(min_lng, max_lng, min_lat, max_lat)?;
        tracing::debug!(
            "Nearby ({}, {}) within {}m: {} candidates in box",
            query.lat,
            query.lng,
            query.max_distance_meters,
            candidates.len()
        );

        let mut results: Vec<NearbyStore> = candidates
            .into_iter()
            .filter_map(|store| {
                let distance = haversine_meters(query.lat, query.lng, store.location.lat(), store.location.lng());
                (distance <= query.max_distance_meters).then(|| NearbyStore {
                    id: store.id,
                    slug: store.slug,
                    name: store.name,
                    description: store.description,
                    location: store.location,
                    photo: store.photo,
                    distance_meters: distance,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then(a.id.cmp(&b.id))
        });
        results.truncate(query.limit);
        Ok(results)
    }
}
