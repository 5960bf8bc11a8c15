use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock};

use anyhow::Result;

use crate::file_store::{BlobStore, FileRouteRepository};
use crate::location_feed::{ChannelLocationFeed, LocationEvent};
use crate::logs;
use crate::main_db::{MainDb, RouteBackend, Setting};
use crate::route::{GeoPoint, Route};
use crate::route_repository::RouteRepository;
use crate::tracking_session::{PendingSave, TrackingSession, TrackingState};
use crate::user::{self, User};

// NOTE: lock order is `main_db` before `signed_in_user`.
struct MainState {
    cache_dir: String,
    main_db: Mutex<MainDb>,
    images: BlobStore,
    feed: ChannelLocationFeed,
    session: TrackingSession,
    signed_in_user: Mutex<Option<User>>,
}

static MAIN_STATE: OnceLock<MainState> = OnceLock::new();

/// Sets up logging, storage and the tracking session. Must be called once
/// at app start before anything else in this module.
pub fn init(support_dir: String, cache_dir: String) -> Result<()> {
    if MAIN_STATE.get().is_some() {
        warn!("`init` is called multiple times");
        return Ok(());
    }

    if let Err(e) = logs::init(&cache_dir) {
        // a logger may already be installed (e.g. by tests)
        eprintln!("failed to initialize logging: {}", e);
    }

    let mut main_db = MainDb::open(&support_dir)?;
    let backend = main_db.get_setting_with_default(Setting::RouteBackend, RouteBackend::Sqlite);
    let repository: Box<dyn RouteRepository> = match backend {
        // a second connection, owned by the persistence worker
        RouteBackend::Sqlite => Box::new(MainDb::open(&support_dir)?),
        RouteBackend::File => Box::new(FileRouteRepository::open(
            Path::new(&support_dir).join("routes/"),
        )?),
    };
    let feed = ChannelLocationFeed::new();
    let session = TrackingSession::new(Box::new(feed.clone()), repository)?;
    let images = BlobStore::open(Path::new(&support_dir).join("images/"))?;
    info!("initialized: route_backend={}", backend);

    let state = MainState {
        cache_dir,
        main_db: Mutex::new(main_db),
        images,
        feed,
        session,
        signed_in_user: Mutex::new(None),
    };
    if MAIN_STATE.set(state).is_err() {
        warn!("`init` raced with another `init`");
    }
    Ok(())
}

fn get() -> Result<&'static MainState> {
    MAIN_STATE
        .get()
        .ok_or_else(|| anyhow!("main state is not initialized"))
}

impl MainState {
    fn main_db(&self) -> MutexGuard<'_, MainDb> {
        self.main_db.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn signed_in_user(&self) -> MutexGuard<'_, Option<User>> {
        self.signed_in_user.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// Tracking

pub fn start_tracking() -> Result<bool> {
    get()?.session.start()
}

/// The returned handle reports whether the route was saved. `None` if we
/// were not tracking.
pub fn stop_tracking() -> Result<Option<PendingSave>> {
    Ok(get()?.session.stop())
}

pub fn tracking_state() -> Result<TrackingState> {
    Ok(get()?.session.state())
}

/// Entry point for the platform location service. Updates that arrive while
/// not tracking are dropped.
pub fn on_location_update(points: Vec<GeoPoint>) -> Result<()> {
    let state = get()?;
    for point in points {
        if !state.feed.push(LocationEvent::Update(point)) {
            debug!("location update while not tracking, dropped");
        }
    }
    Ok(())
}

pub fn on_location_error(message: String) -> Result<()> {
    let state = get()?;
    if !state.feed.push(LocationEvent::Failure(message.clone())) {
        warn!("location error while not tracking: {}", message);
    }
    Ok(())
}

pub fn current_route() -> Result<Route> {
    Ok(get()?.session.current_route())
}

pub fn last_position() -> Result<Option<GeoPoint>> {
    Ok(get()?.session.last_position())
}

pub fn last_saved_route() -> Result<Option<Route>> {
    Ok(get()?.session.last_saved_route())
}

pub fn load_last_route() -> Result<Route> {
    Ok(get()?.session.load_last_route()?)
}

/// Takes effect on next launch.
pub fn set_route_backend(backend: RouteBackend) -> Result<()> {
    get()?.main_db().set_setting(Setting::RouteBackend, backend)
}

// Users

pub fn sign_up(login: String, password: String) -> Result<User> {
    let state = get()?;
    let mut main_db = state.main_db();
    let user = user::sign_up(&mut main_db, &login, &password)?;
    main_db.set_setting(Setting::LastSignedInUser, &user.login)?;
    *state.signed_in_user() = Some(user.clone());
    Ok(user)
}

pub fn sign_in(login: String, password: String) -> Result<User> {
    let state = get()?;
    let mut main_db = state.main_db();
    let user = user::sign_in(&mut main_db, &login, &password)?;
    main_db.set_setting(Setting::LastSignedInUser, &user.login)?;
    *state.signed_in_user() = Some(user.clone());
    Ok(user)
}

pub fn sign_out() -> Result<()> {
    let state = get()?;
    state.main_db().clear_setting(Setting::LastSignedInUser)?;
    *state.signed_in_user() = None;
    Ok(())
}

pub fn signed_in_user() -> Result<Option<User>> {
    Ok(get()?.signed_in_user().clone())
}

/// Login to prefill the sign in screen with.
pub fn last_signed_in_login() -> Result<Option<String>> {
    let login = get()?
        .main_db()
        .get_setting_with_default(Setting::LastSignedInUser, String::new());
    Ok(if login.is_empty() { None } else { Some(login) })
}

pub fn change_password(new_password: String) -> Result<()> {
    let state = get()?;
    let mut main_db = state.main_db();
    let login = require_signed_in(state)?.login;
    let user = user::change_password(&mut main_db, &login, &new_password)?;
    *state.signed_in_user() = Some(user);
    Ok(())
}

pub fn rename_user(new_login: String) -> Result<()> {
    let state = get()?;
    let mut main_db = state.main_db();
    let login = require_signed_in(state)?.login;
    let user = user::rename_user(&mut main_db, &login, &new_login)?;
    main_db.set_setting(Setting::LastSignedInUser, &user.login)?;
    *state.signed_in_user() = Some(user);
    Ok(())
}

fn require_signed_in(state: &MainState) -> Result<User> {
    state
        .signed_in_user()
        .clone()
        .ok_or_else(|| anyhow!("no user is signed in"))
}

// Avatar, stored as opaque image bytes

fn avatar_name(user: &User) -> String {
    format!("{}.png", user.id)
}

pub fn set_avatar(image: Vec<u8>) -> Result<()> {
    let state = get()?;
    let user = require_signed_in(state)?;
    state.images.replace(&avatar_name(&user), &image)?;
    info!("avatar updated: user_id={}, size={}", user.id, image.len());
    Ok(())
}

pub fn get_avatar() -> Result<Option<Vec<u8>>> {
    let state = get()?;
    let user = require_signed_in(state)?;
    state.images.fetch(&avatar_name(&user))
}

pub fn remove_avatar() -> Result<bool> {
    let state = get()?;
    let user = require_signed_in(state)?;
    state.images.remove(&avatar_name(&user))
}

// Logs

pub fn set_log_listener(listener: Option<logs::LogListener>) {
    logs::set_listener(listener)
}

pub fn export_logs(target_file_path: String) -> Result<()> {
    logs::export(&get()?.cache_dir, &target_file_path)
}
