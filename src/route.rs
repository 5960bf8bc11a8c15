use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    // NaN fails both range checks, so it is rejected as well.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// An ordered list of points, in the order they were captured.
///
/// Serialized as a bare JSON array of `{"latitude": .., "longitude": ..}`
/// objects so other clients can read what we store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route {
    pub points: Vec<GeoPoint>,
}

impl Route {
    pub fn new() -> Self {
        Route { points: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Route> {
        let route: Route = serde_json::from_slice(data)?;
        if let Some(point) = route.points.iter().find(|p| !p.is_valid()) {
            bail!("invalid point in stored route: {:?}", point);
        }
        Ok(route)
    }
}

impl From<Vec<GeoPoint>> for Route {
    fn from(points: Vec<GeoPoint>) -> Self {
        Route { points }
    }
}
