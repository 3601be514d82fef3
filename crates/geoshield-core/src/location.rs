//! Location groups and the collaborator interfaces the prefetcher consumes.
//!
//! A location group is a cluster of raw coordinate points (a suburb, say)
//! reduced to one representative coordinate: the mean of its valid members.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A cluster of points with one representative coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationGroup {
    pub group_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationGroup {
    pub fn new(group_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            group_id: group_id.into(),
            latitude,
            longitude,
        }
    }
}

/// One raw point as read from storage. Non-numeric values arrive as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLocation {
    pub group_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// True if latitude is within [-90, 90] and longitude within [-180, 180].
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Reduce raw points to one group per id, averaging only valid members.
///
/// Groups are returned in order of first appearance. A group with no valid
/// member is dropped.
pub fn group_locations(points: impl IntoIterator<Item = RawLocation>) -> Vec<LocationGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, (f64, f64, usize)> = HashMap::new();

    for point in points {
        if !sums.contains_key(&point.group_id) {
            order.push(point.group_id.clone());
            sums.insert(point.group_id.clone(), (0.0, 0.0, 0));
        }

        let (Some(lat), Some(lon)) = (point.latitude, point.longitude) else {
            continue;
        };
        if !is_valid_coordinate(lat, lon) {
            continue;
        }

        if let Some(entry) = sums.get_mut(&point.group_id) {
            entry.0 += lat;
            entry.1 += lon;
            entry.2 += 1;
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let (lat_sum, lon_sum, count) = sums.remove(&id)?;
            if count == 0 {
                tracing::debug!("Dropping location group {} with no valid points", id);
                return None;
            }
            let n = count as f64;
            Some(LocationGroup::new(id, lat_sum / n, lon_sum / n))
        })
        .collect()
}

/// Provides the population of location groups to sample from.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn list_location_groups(&self) -> anyhow::Result<Vec<LocationGroup>>;
}

/// Fetches (and thereby caches) data for one coordinate.
#[async_trait]
pub trait CoordinateResolver: Send + Sync {
    async fn resolve_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> anyhow::Result<serde_json::Value>;
}

#[async_trait]
impl LocationSource for Vec<LocationGroup> {
    async fn list_location_groups(&self) -> anyhow::Result<Vec<LocationGroup>> {
        Ok(self.clone())
    }
}
