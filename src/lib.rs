//! # Garmin GPX
//!
//! Download Garmin Connect activities as GPX files, optionally filtered by
//! name, activity type and distance from a reference point.
//!
//! This library provides:
//! - Great-circle distance and radius checks ([`geo_utils`])
//! - Activity filtering with AND/OR combination ([`filter`])
//! - Activity listing and GPX download over HTTP ([`http`])
//! - Token-based session handling ([`session`]) and a GPX file store ([`store`])
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel filtering with rayon
//! - **`http`** - Enable HTTP client for activity listing and download
//! - **`cli`** - Build the `garmin-gpx` binary (implies `http`)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use garmin_gpx::{filter_activities, Activity, CombineMode, Coordinate, FilterOptions};
//!
//! let home = Coordinate::new(52.3676, 4.9041);
//! let activities = vec![
//!     Activity::new(1, "Morning Run", "running", Some(Coordinate::new(52.37, 4.90)), 1_714_550_000_000),
//!     Activity::new(2, "Alpine Ride", "cycling", Some(Coordinate::new(46.55, 7.98)), 1_714_650_000_000),
//! ];
//!
//! let options = FilterOptions {
//!     radius_km: Some(10.0),
//!     start_coordinate: Some(home),
//!     mode: CombineMode::And,
//!     ..Default::default()
//! };
//! let config = options.resolve(activities.as_slice()).unwrap();
//!
//! let nearby = filter_activities(&activities, &config);
//! assert_eq!(nearby.len(), 1);
//! assert_eq!(nearby[0].name, "Morning Run");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Unified error handling
pub mod error;
pub use error::{DownloaderError, OptionExt, Result};

// Geographic utilities (haversine distance, radius checks)
pub mod geo_utils;
pub use geo_utils::{haversine_km, within_radius, EARTH_RADIUS_KM};

// Activity records as returned by the activity list
pub mod activity;
pub use activity::{Activity, ActivityType};

// Filter engine (name/type/radius predicates, AND/OR combination)
pub mod filter;
#[cfg(feature = "parallel")]
pub use filter::filter_activities_parallel;
pub use filter::{
    filter_activities, is_valid, parse_coordinate, CombineMode, Criterion, FilterConfig,
    FilterOptions, RadiusFilter, ReferenceSource, SkipList,
};

// Activity directory abstraction
pub mod directory;
pub use directory::ActivityDirectory;

// Token storage and session
pub mod session;
pub use session::{OAuth2Token, Session, TokenStore};

// GPX file store
pub mod store;
pub use store::{GpxStore, WriteOutcome};

// HTTP client for Garmin Connect
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{ClientConfig, GarminClient};

// Concurrent GPX download
#[cfg(feature = "http")]
pub mod download;
#[cfg(feature = "http")]
pub use download::{download_all, DownloadConfig, DownloadFailure, DownloadReport};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate in decimal degrees.
///
/// # Example
/// ```
/// use garmin_gpx::Coordinate;
/// let point = Coordinate::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the coordinate lies in the valid latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = DownloaderError;

    fn from_str(s: &str) -> Result<Self> {
        parse_coordinate(s)
    }
}

// ============================================================================
// Tests
// ============================================================================
