//! Heading and location boundaries. The platform feeds readings in through
//! thread-safe latest-value buffers; the scene loop only ever snapshots
//! them. A missing reading is a normal runtime condition, never an error:
//! every consumer treats `None` as "skip this cue opportunity".

use crate::geo::GeoPoint;
use std::sync::Mutex;

/// A compass heading in degrees with the platform's accuracy indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingReading {
    /// Degrees clockwise from magnetic north, [0, 360).
    pub degrees: f32,
    /// Estimated error in degrees; negative means the reading is invalid.
    pub accuracy_deg: f32,
}

/// A best-effort position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    pub point: GeoPoint,
    pub horizontal_accuracy_m: f32,
}

/// Read side of the heading feed.
pub trait HeadingProvider: Send + Sync {
    /// The latest heading, or `None` when no usable reading exists.
    fn heading(&self) -> Option<HeadingReading>;
}

/// Read side of the location feed.
pub trait LocationProvider: Send + Sync {
    fn location(&self) -> Option<GeoFix>;
}

/// Latest-value buffer for both feeds. The platform callback thread writes,
/// the scene loop reads.
#[derive(Debug, Default)]
pub struct SharedSignals {
    heading: Mutex<Option<HeadingReading>>,
    location: Mutex<Option<GeoFix>>,
}

impl SharedSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new heading. Readings with negative accuracy are the
    /// platform's way of saying "don't trust this"; they clear the buffer.
    pub fn set_heading(&self, reading: HeadingReading) {
        let mut slot = self.heading.lock().unwrap();
        *slot = if reading.accuracy_deg < 0.0 {
            None
        } else {
            Some(reading)
        };
    }

    pub fn set_location(&self, fix: GeoFix) {
        *self.location.lock().unwrap() = Some(fix);
    }

    /// Forgets both readings, e.g. when the platform revokes the sensors.
    pub fn clear(&self) {
        *self.heading.lock().unwrap() = None;
        *self.location.lock().unwrap() = None;
    }
}

impl HeadingProvider for SharedSignals {
    fn heading(&self) -> Option<HeadingReading> {
        *self.heading.lock().unwrap()
    }
}

impl LocationProvider for SharedSignals {
    fn location(&self) -> Option<GeoFix> {
        *self.location.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unavailable() {
        let signals = SharedSignals::new();
        assert!(signals.heading().is_none());
        assert!(signals.location().is_none());
    }

    #[test]
    fn keeps_the_latest_heading() {
        let signals = SharedSignals::new();
        signals.set_heading(HeadingReading {
            degrees: 10.0,
            accuracy_deg: 5.0,
        });
        signals.set_heading(HeadingReading {
            degrees: 20.0,
            accuracy_deg: 5.0,
        });
        assert_eq!(signals.heading().unwrap().degrees, 20.0);
    }

    #[test]
    fn negative_accuracy_invalidates_the_heading() {
        let signals = SharedSignals::new();
        signals.set_heading(HeadingReading {
            degrees: 10.0,
            accuracy_deg: 5.0,
        });
        signals.set_heading(HeadingReading {
            degrees: 99.0,
            accuracy_deg: -1.0,
        });
        assert!(signals.heading().is_none());
    }
}
