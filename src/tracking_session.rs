use anyhow::Result;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};

use crate::coordinate_store::CoordinateStore;
use crate::gps_processor::{GpsProcessor, ProcessResult};
use crate::location_feed::{LocationEvent, LocationFeed};
use crate::route::{GeoPoint, Route};
use crate::route_repository::{RouteRepository, StorageError};

/* Recording of one route at a time.

Everything the session knows lives in `SessionState` behind a single mutex:
transitions, appends and reads all go through it, so callbacks from the
location feed can come from any thread.

Persistence runs on a dedicated worker thread that owns the repository. Jobs
are handled in the order they are sent, so a `load_last_route` issued after a
`stop` always sees the route that `stop` saved (or the error it hit).

Every subscription to the feed is tagged with a generation number. Updates
that arrive with an older generation (e.g. the feed was mid-delivery when we
unsubscribed) are dropped.
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackingState {
    Idle,
    Tracking,
}

struct SessionState {
    tracking_state: TrackingState,
    generation: u64,
    current_route: CoordinateStore,
    gps_processor: GpsProcessor,
    last_saved_route: Option<Route>,
    last_feed_error: Option<String>,
}

impl SessionState {
    fn append(&mut self, point: GeoPoint) {
        match self.gps_processor.preprocess(&point) {
            ProcessResult::Append => self.current_route.append(point),
            ProcessResult::Ignore => (),
        }
    }
}

type SharedState = Arc<Mutex<SessionState>>;

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    // a panic while holding the lock cannot leave `SessionState` half
    // updated in a way that matters to us, so keep going.
    state.lock().unwrap_or_else(|e| e.into_inner())
}

enum Job {
    Save {
        route: Route,
        reply: Sender<Result<(), StorageError>>,
    },
    FetchLast {
        reply: Sender<Result<Route, StorageError>>,
    },
}

fn run_persistence_worker(
    mut repository: Box<dyn RouteRepository>,
    jobs: Receiver<Job>,
    state: Weak<Mutex<SessionState>>,
) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Save { route, reply } => {
                let result = repository.save(&route);
                match &result {
                    Ok(()) => {
                        if let Some(state) = state.upgrade() {
                            lock(&state).last_saved_route = Some(route);
                        }
                    }
                    Err(e) => {
                        error!(
                            "[tracking_session] failed to save route (num_of_points={}): {}",
                            route.len(),
                            e
                        );
                    }
                }
                // the caller may have dropped its handle, that is fine.
                let _ = reply.send(result);
            }
            Job::FetchLast { reply } => {
                let result = repository.fetch_last();
                match &result {
                    Ok(route) => {
                        if let Some(state) = state.upgrade() {
                            lock(&state).last_saved_route = Some(route.clone());
                        }
                    }
                    Err(e) => {
                        error!("[tracking_session] failed to load last route: {}", e);
                    }
                }
                let _ = reply.send(result);
            }
        }
    }
    debug!("[tracking_session] persistence worker exiting");
}

/// Outcome of the save started by `TrackingSession::stop`. Dropping it is
/// fine, the save still happens.
pub struct PendingSave {
    num_of_points: usize,
    receiver: Receiver<Result<(), StorageError>>,
}

impl PendingSave {
    pub fn num_of_points(&self) -> usize {
        self.num_of_points
    }

    pub fn wait(self) -> Result<(), StorageError> {
        self.receiver.recv().unwrap_or(Err(StorageError::WorkerGone))
    }

    /// `None` while the save is still running.
    pub fn try_result(&self) -> Option<Result<(), StorageError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(StorageError::WorkerGone)),
        }
    }
}

pub struct TrackingSession {
    state: SharedState,
    feed: Mutex<Box<dyn LocationFeed>>,
    jobs: Mutex<Option<Sender<Job>>>,
    worker: Option<JoinHandle<()>>,
}

impl TrackingSession {
    pub fn new(
        feed: Box<dyn LocationFeed>,
        repository: Box<dyn RouteRepository>,
    ) -> Result<TrackingSession> {
        let state = Arc::new(Mutex::new(SessionState {
            tracking_state: TrackingState::Idle,
            generation: 0,
            current_route: CoordinateStore::new(),
            gps_processor: GpsProcessor::new(),
            last_saved_route: None,
            last_feed_error: None,
        }));

        let (sender, receiver) = mpsc::channel();
        let weak_state = Arc::downgrade(&state);
        let worker = thread::Builder::new()
            .name("route-persistence".to_string())
            .spawn(move || run_persistence_worker(repository, receiver, weak_state))?;

        Ok(TrackingSession {
            state,
            feed: Mutex::new(feed),
            jobs: Mutex::new(Some(sender)),
            worker: Some(worker),
        })
    }

    pub fn state(&self) -> TrackingState {
        lock(&self.state).tracking_state
    }

    pub fn is_tracking(&self) -> bool {
        self.state() == TrackingState::Tracking
    }

    pub fn current_route(&self) -> Route {
        lock(&self.state).current_route.snapshot()
    }

    pub fn last_saved_route(&self) -> Option<Route> {
        lock(&self.state).last_saved_route.clone()
    }

    pub fn last_position(&self) -> Option<GeoPoint> {
        lock(&self.state).gps_processor.last_point().copied()
    }

    pub fn last_feed_error(&self) -> Option<String> {
        lock(&self.state).last_feed_error.clone()
    }

    /// Starts recording a new, empty route. Returns `false` (and does
    /// nothing) if already tracking.
    pub fn start(&self) -> Result<bool> {
        let mut state = lock(&self.state);
        if state.tracking_state == TrackingState::Tracking {
            debug!("[tracking_session] `start` called while tracking, ignored");
            return Ok(false);
        }

        state.generation += 1;
        let generation = state.generation;
        let weak_state = Arc::downgrade(&self.state);
        let sink = Arc::new(move |event: LocationEvent| {
            if let Some(state) = weak_state.upgrade() {
                handle_feed_event(&state, generation, event);
            }
        });

        let mut feed = self
            .feed
            .lock()
            .map_err(|_| anyhow!("location feed lock poisoned"))?;
        feed.subscribe(sink)?;

        state.tracking_state = TrackingState::Tracking;
        state.current_route.clear();
        state.gps_processor.reset();
        state.last_feed_error = None;
        info!("[tracking_session] tracking started: generation={}", generation);
        Ok(true)
    }

    /// Stops recording and hands the route over for saving. Returns `None`
    /// (and writes nothing) if not tracking.
    ///
    /// The in-memory route is cleared right away, whatever the outcome of the
    /// save. A failed save is logged and reported through the returned
    /// handle, it is not retried.
    pub fn stop(&self) -> Option<PendingSave> {
        let mut state = lock(&self.state);
        if state.tracking_state == TrackingState::Idle {
            debug!("[tracking_session] `stop` called while idle, ignored");
            return None;
        }

        state.tracking_state = TrackingState::Idle;
        // invalidate the current subscription before anything else.
        state.generation += 1;
        match self.feed.lock() {
            Ok(mut feed) => feed.unsubscribe(),
            Err(_) => warn!("[tracking_session] location feed lock poisoned"),
        }

        let route = state.current_route.take();
        info!(
            "[tracking_session] tracking stopped: num_of_points={}, num_of_ignored={}",
            route.len(),
            state.gps_processor.num_of_ignored()
        );
        let num_of_points = route.len();
        let (reply, receiver) = mpsc::channel();
        self.send_job(Job::Save { route, reply });
        Some(PendingSave {
            num_of_points,
            receiver,
        })
    }

    /// Appends `point` to the route being recorded. Ignored while idle or if
    /// the point is out of range.
    pub fn on_location_update(&self, point: GeoPoint) {
        let mut state = lock(&self.state);
        if state.tracking_state == TrackingState::Tracking {
            state.append(point);
        }
    }

    /// Reloads `last_saved_route` from the repository. Does not touch the
    /// route being recorded.
    pub fn load_last_route(&self) -> Result<Route, StorageError> {
        let (reply, receiver) = mpsc::channel();
        self.send_job(Job::FetchLast { reply });
        receiver.recv().unwrap_or(Err(StorageError::WorkerGone))
    }

    // If the worker is gone the job (and its reply sender) is dropped, and
    // the waiting side gets `WorkerGone`.
    fn send_job(&self, job: Job) {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        match jobs.as_ref() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    error!("[tracking_session] persistence worker is gone");
                }
            }
            None => error!("[tracking_session] persistence worker is shut down"),
        }
    }
}

fn handle_feed_event(state: &Mutex<SessionState>, generation: u64, event: LocationEvent) {
    let mut state = lock(state);
    if state.generation != generation || state.tracking_state != TrackingState::Tracking {
        debug!(
            "[tracking_session] dropping event from stale subscription: generation={}",
            generation
        );
        return;
    }
    match event {
        LocationEvent::Update(point) => state.append(point),
        LocationEvent::Failure(message) => {
            warn!("[tracking_session] location feed failure: {}", message);
            state.last_feed_error = Some(message);
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        if let Ok(mut feed) = self.feed.lock() {
            feed.unsubscribe();
        }
        // closing the channel lets the worker finish queued saves and exit.
        if let Ok(mut jobs) = self.jobs.lock() {
            *jobs = None;
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("[tracking_session] persistence worker panicked");
            }
        }
    }
}
