#![allow(dead_code)]

use route_tracker_core::route::{GeoPoint, Route};
use route_tracker_core::route_repository::{RouteRepository, StorageError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// A walk along the Bund in Shanghai.
pub fn sample_points(n: usize) -> Vec<GeoPoint> {
    (0..n)
        .map(|i| GeoPoint::new(31.2304 + i as f64 * 0.0001, 121.4737 + i as f64 * 0.00005))
        .collect()
}

pub fn sample_route(n: usize) -> Route {
    Route::from(sample_points(n))
}

/// In-memory repository whose state can be inspected (and made to fail)
/// through clones after it is handed to a session.
#[derive(Clone, Default)]
pub struct MemoryRouteRepository {
    pub stored: Arc<Mutex<Option<Route>>>,
    pub fail: Arc<AtomicBool>,
    pub num_of_saves: Arc<AtomicUsize>,
}

impl MemoryRouteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn num_of_saves(&self) -> usize {
        self.num_of_saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<Route> {
        self.stored.lock().unwrap().clone()
    }
}

impl RouteRepository for MemoryRouteRepository {
    fn save(&mut self, route: &Route) -> Result<(), StorageError> {
        self.num_of_saves.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(anyhow::anyhow!("disk is full")));
        }
        *self.stored.lock().unwrap() = Some(route.clone());
        Ok(())
    }

    fn fetch_last(&mut self) -> Result<Route, StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(anyhow::anyhow!("disk is gone")));
        }
        Ok(self.stored.lock().unwrap().clone().unwrap_or_default())
    }
}
