//! Testing utilities for the admin loader
//!
//! - `RecordingObserver`: collects load events for assertions
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use replica_admin_durability::testing::RecordingObserver;
//!
//! let observer = Arc::new(RecordingObserver::new());
//! let reader = AdminReader::new(observer.clone());
//! // ... load ...
//! assert_eq!(observer.len(), 0);
//! ```

use parking_lot::Mutex;

use crate::observer::{LoadEvent, LoadObserver};

/// Observer that keeps every event it receives
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LoadEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events received so far, in order
    pub fn events(&self) -> Vec<LoadEvent> {
        self.events.lock().clone()
    }

    /// Number of events received
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether no event was received
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forget recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl LoadObserver for RecordingObserver {
    fn on_event(&self, event: &LoadEvent) {
        self.events.lock().push(event.clone());
    }
}
