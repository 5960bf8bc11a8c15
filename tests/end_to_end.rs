pub mod test_utils;
use route_tracker_core::{
    api::api,
    route::{GeoPoint, Route},
    tracking_session::TrackingState,
};
use std::fs;
use std::sync::{Arc, Mutex};
use tempdir::TempDir;

#[test]
fn basic() {
    let temp_dir = TempDir::new("end_to_end-basic").unwrap();
    println!("temp dir: {:?}", temp_dir.path());

    let sub_folder = |sub| {
        let path = temp_dir.path().join(sub);
        fs::create_dir(&path).unwrap();
        path.into_os_string().into_string().unwrap()
    };
    let cache_dir = sub_folder("cache/");

    assert!(api::start_tracking().is_err());
    api::init(sub_folder("support/"), cache_dir.clone()).unwrap();
    // second call is harmless
    api::init(sub_folder("support2/"), cache_dir).unwrap();

    let log_lines = Arc::new(Mutex::new(Vec::new()));
    let log_lines_ref = log_lines.clone();
    api::set_log_listener(Some(Box::new(move |line| {
        log_lines_ref.lock().unwrap().push(line);
    })));

    // accounts
    assert!(api::signed_in_user().unwrap().is_none());
    assert!(api::set_avatar(vec![1, 2, 3]).is_err());
    let user = api::sign_up("ruslan".to_string(), "qwerty".to_string()).unwrap();
    assert_eq!(api::signed_in_user().unwrap().unwrap().id, user.id);
    api::sign_out().unwrap();
    assert!(api::last_signed_in_login().unwrap().is_none());
    assert!(api::sign_in("ruslan".to_string(), "wrong".to_string()).is_err());
    api::sign_in("ruslan".to_string(), "qwerty".to_string()).unwrap();
    assert_eq!(api::last_signed_in_login().unwrap().unwrap(), "ruslan");
    api::change_password("123456".to_string()).unwrap();
    api::rename_user("safargalin".to_string()).unwrap();
    assert_eq!(api::last_signed_in_login().unwrap().unwrap(), "safargalin");

    // avatar
    assert_eq!(api::get_avatar().unwrap(), None);
    api::set_avatar(vec![0x89, b'P', b'N', b'G']).unwrap();
    assert_eq!(api::get_avatar().unwrap().unwrap(), vec![0x89, b'P', b'N', b'G']);
    assert!(api::remove_avatar().unwrap());

    // tracking
    assert_eq!(api::load_last_route().unwrap(), Route::new());
    api::on_location_update(test_utils::sample_points(3)).unwrap();
    assert!(api::current_route().unwrap().is_empty());

    assert!(api::start_tracking().unwrap());
    assert_eq!(api::tracking_state().unwrap(), TrackingState::Tracking);
    api::on_location_update(vec![
        GeoPoint::new(40.0, -73.0),
        GeoPoint::new(200.0, 5.0),
        GeoPoint::new(40.1, -73.1),
    ])
    .unwrap();
    api::on_location_error("signal lost".to_string()).unwrap();
    assert_eq!(api::current_route().unwrap().len(), 2);
    assert_eq!(
        api::last_position().unwrap(),
        Some(GeoPoint::new(40.1, -73.1))
    );

    let pending = api::stop_tracking().unwrap().unwrap();
    assert!(api::stop_tracking().unwrap().is_none());
    pending.wait().unwrap();
    let expected = Route::from(vec![GeoPoint::new(40.0, -73.0), GeoPoint::new(40.1, -73.1)]);
    assert_eq!(api::last_saved_route().unwrap().unwrap(), expected);
    assert_eq!(api::load_last_route().unwrap(), expected);

    // replaced by the next one
    api::start_tracking().unwrap();
    api::on_location_update(test_utils::sample_points(50)).unwrap();
    api::stop_tracking().unwrap().unwrap().wait().unwrap();
    assert_eq!(api::load_last_route().unwrap(), test_utils::sample_route(50));

    api::set_route_backend(route_tracker_core::main_db::RouteBackend::File).unwrap();

    // logs
    api::export_logs(
        temp_dir
            .path()
            .join("end_to_end_basic-logs.zip")
            .to_str()
            .unwrap()
            .to_string(),
    )
    .unwrap();
    assert!(temp_dir.path().join("end_to_end_basic-logs.zip").exists());
}
