use anyhow::Result;
use std::sync::{Arc, Mutex};

use crate::route::GeoPoint;

#[derive(Clone, Debug, PartialEq)]
pub enum LocationEvent {
    Update(GeoPoint),
    // The feed keeps running after a failure, later updates may still arrive.
    Failure(String),
}

pub type LocationSink = Arc<dyn Fn(LocationEvent) + Send + Sync>;

/// A source of live position updates.
///
/// Implementations deliver events to the sink from whatever thread they
/// like. At most one sink is active; subscribing again replaces it.
/// The sink must not be invoked from inside `subscribe`/`unsubscribe`.
pub trait LocationFeed: Send {
    fn subscribe(&mut self, sink: LocationSink) -> Result<()>;
    fn unsubscribe(&mut self);
}

/// Feed driven from the outside: the platform location service calls
/// `push` for each update and the event is forwarded to the subscriber.
///
/// Clones share the same subscription, so one handle can be injected into
/// the tracking session while another stays with the platform glue.
#[derive(Clone, Default)]
pub struct ChannelLocationFeed {
    sink: Arc<Mutex<Option<LocationSink>>>,
}

impl ChannelLocationFeed {
    pub fn new() -> Self {
        ChannelLocationFeed {
            sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().map(|x| x.is_some()).unwrap_or(false)
    }

    /// Returns false if nobody is subscribed and the event was dropped.
    pub fn push(&self, event: LocationEvent) -> bool {
        // clone the sink so it is not called with our lock held, the sink is
        // free to take its own locks.
        let sink = match self.sink.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        match sink {
            None => false,
            Some(sink) => {
                sink(event);
                true
            }
        }
    }
}

impl LocationFeed for ChannelLocationFeed {
    fn subscribe(&mut self, sink: LocationSink) -> Result<()> {
        let mut guard = self
            .sink
            .lock()
            .map_err(|_| anyhow!("location feed lock poisoned"))?;
        if guard.is_some() {
            warn!("[location_feed] replacing an existing subscriber");
        }
        *guard = Some(sink);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Ok(mut guard) = self.sink.lock() {
            *guard = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn push_only_reaches_current_subscriber() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let mut feed = ChannelLocationFeed::new();
        let handle = feed.clone();

        assert!(!handle.push(LocationEvent::Update(GeoPoint::new(1.0, 1.0))));

        let received_ref = received.clone();
        feed.subscribe(Arc::new(move |event| {
            received_ref.lock().unwrap().push(event);
        }))
        .unwrap();
        assert!(handle.is_subscribed());
        assert!(handle.push(LocationEvent::Update(GeoPoint::new(2.0, 2.0))));
        assert!(handle.push(LocationEvent::Failure("no signal".to_string())));

        feed.unsubscribe();
        assert!(!handle.push(LocationEvent::Update(GeoPoint::new(3.0, 3.0))));

        assert_eq!(
            *received.lock().unwrap(),
            vec![
                LocationEvent::Update(GeoPoint::new(2.0, 2.0)),
                LocationEvent::Failure("no signal".to_string())
            ]
        );
    }
}
