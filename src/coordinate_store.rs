use crate::route::{GeoPoint, Route};

/// Append-only buffer for the route being recorded. Owned by the tracking
/// session and never handed out by reference; readers get a copy.
#[derive(Debug, Default)]
pub struct CoordinateStore {
    points: Vec<GeoPoint>,
}

impl CoordinateStore {
    pub fn new() -> Self {
        CoordinateStore { points: Vec::new() }
    }

    pub fn append(&mut self, point: GeoPoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn snapshot(&self) -> Route {
        Route::from(self.points.clone())
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    // Moves the buffered points out, leaving the store empty.
    pub fn take(&mut self) -> Route {
        Route::from(std::mem::take(&mut self.points))
    }
}
