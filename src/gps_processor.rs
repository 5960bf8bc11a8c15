use crate::route::GeoPoint;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ProcessResult {
    Append = 0,
    // negative values are for ones that should not be stored in the route.
    Ignore = -1,
}

impl ProcessResult {
    pub fn to_int(&self) -> i8 {
        *self as i8
    }
}

/// Decides what to do with each location update received while tracking.
///
/// GPS noise (out of range or non-finite coordinates) is dropped. Repeated
/// positions are kept as-is, the route mirrors the raw feed granularity.
pub struct GpsProcessor {
    last_point: Option<GeoPoint>,
    num_of_ignored: usize,
}

impl GpsProcessor {
    pub fn new() -> Self {
        GpsProcessor {
            last_point: None,
            num_of_ignored: 0,
        }
    }

    pub fn last_point(&self) -> Option<&GeoPoint> {
        self.last_point.as_ref()
    }

    pub fn num_of_ignored(&self) -> usize {
        self.num_of_ignored
    }

    pub fn reset(&mut self) {
        self.last_point = None;
        self.num_of_ignored = 0;
    }

    pub fn preprocess(&mut self, point: &GeoPoint) -> ProcessResult {
        if point.is_valid() {
            self.last_point = Some(*point);
            ProcessResult::Append
        } else {
            debug!("[gps_processor] ignoring invalid point: {:?}", point);
            self.num_of_ignored += 1;
            ProcessResult::Ignore
        }
    }
}
