use thiserror::Error;

use crate::route::Route;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
    #[error("stored route is corrupted: {0}")]
    Corrupted(String),
    #[error("persistence worker is not running")]
    WorkerGone,
}

impl StorageError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::WorkerGone)
    }
}

/// Persistence boundary that keeps exactly one route: the last one saved.
pub trait RouteRepository: Send {
    /// Replaces the stored route. Either the whole new route is stored or
    /// the previous one is left untouched.
    fn save(&mut self, route: &Route) -> Result<(), StorageError>;

    /// The last saved route, or an empty one if nothing was ever saved.
    fn fetch_last(&mut self) -> Result<Route, StorageError>;
}
