//! Activity directory abstraction.
//!
//! The downloader only needs two things from the remote service: the full
//! activity list and the GPX export of a single activity. [`GarminClient`]
//! implements this over HTTP; tests use in-memory directories.
//!
//! [`GarminClient`]: crate::http::GarminClient

use crate::{Activity, Result};

/// Source of activity records and their GPX tracks.
#[allow(async_fn_in_trait)]
pub trait ActivityDirectory {
    /// All activities of the authenticated user, most recent first.
    async fn list_activities(&self) -> Result<Vec<Activity>>;

    /// GPX export of one activity.
    async fn download_gpx(&self, activity_id: u64) -> Result<Vec<u8>>;
}
