//! Tests for concurrent GPX download

use chrono::Local;
use garmin_gpx::download::ProgressCallback;
use garmin_gpx::{
    download_all, Activity, ActivityDirectory, DownloadConfig, DownloaderError, GpxStore, Result,
};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory directory; activities without a track fail with 404.
struct FakeDirectory {
    activities: Vec<Activity>,
    tracks: HashMap<u64, String>,
    requested: Mutex<Vec<u64>>,
}

impl FakeDirectory {
    fn new(activities: Vec<Activity>, with_track: &[u64]) -> Self {
        let tracks = with_track
            .iter()
            .map(|id| (*id, format!("<gpx><trk><name>{}</name></trk></gpx>", id)))
            .collect();
        Self {
            activities,
            tracks,
            requested: Mutex::new(Vec::new()),
        }
    }
}

impl ActivityDirectory for FakeDirectory {
    async fn list_activities(&self) -> Result<Vec<Activity>> {
        Ok(self.activities.clone())
    }

    async fn download_gpx(&self, activity_id: u64) -> Result<Vec<u8>> {
        self.requested.lock().unwrap().push(activity_id);
        self.tracks
            .get(&activity_id)
            .map(|t| t.clone().into_bytes())
            .ok_or_else(|| DownloaderError::from_status(404))
    }
}

/// Directory whose credentials were revoked: every download is a 401.
struct RevokedDirectory {
    requested: AtomicU32,
}

impl ActivityDirectory for RevokedDirectory {
    async fn list_activities(&self) -> Result<Vec<Activity>> {
        Ok(Vec::new())
    }

    async fn download_gpx(&self, _activity_id: u64) -> Result<Vec<u8>> {
        self.requested.fetch_add(1, Ordering::Relaxed);
        Err(DownloaderError::from_status(401))
    }
}

fn activities() -> Vec<Activity> {
    vec![
        Activity::new(1, "Morning Run", "running", None, 1_714_548_600_000),
        Activity::new(2, "Evening Ride", "cycling", None, 1_714_600_000_000),
        Activity::new(3, "Hill Repeats", "running", None, 1_714_700_000_000),
    ]
}

#[tokio::test]
async fn downloads_every_activity() {
    let tmp = tempfile::tempdir().unwrap();
    let store = GpxStore::new(tmp.path().join("gpx_files"));
    let directory = FakeDirectory::new(activities(), &[1, 2, 3]);

    let calls = Arc::new(AtomicU32::new(0));
    let last_total = Arc::new(AtomicU32::new(0));
    let progress: ProgressCallback = {
        let calls = Arc::clone(&calls);
        let last_total = Arc::clone(&last_total);
        Arc::new(move |_done, total| {
            calls.fetch_add(1, Ordering::Relaxed);
            last_total.store(total, Ordering::Relaxed);
        })
    };

    let list = directory.list_activities().await.unwrap();
    let report = download_all(
        &directory,
        &store,
        &list,
        &DownloadConfig { concurrency: 2 },
        Some(progress),
    )
    .await;

    assert_eq!(report.written.len(), 3);
    assert!(report.skipped.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(calls.load(Ordering::Relaxed), 3);
    assert_eq!(last_total.load(Ordering::Relaxed), 3);

    let first = &list[0];
    let path = store.path_for(&first.file_name_in(&Local));
    assert_eq!(report.written[0], path);
    assert_eq!(
        fs::read_to_string(path).unwrap(),
        "<gpx><trk><name>1</name></trk></gpx>"
    );
}

#[tokio::test]
async fn existing_files_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let store = GpxStore::new(tmp.path());
    let list = activities();
    store.write(&list[1].file_name(), b"already here").unwrap();

    let directory = FakeDirectory::new(list.clone(), &[1, 2, 3]);
    let report = download_all(&directory, &store, &list, &DownloadConfig::default(), None).await;

    assert_eq!(report.written.len(), 2);
    assert_eq!(report.skipped, vec![store.path_for(&list[1].file_name())]);
    assert_eq!(
        fs::read_to_string(store.path_for(&list[1].file_name())).unwrap(),
        "already here"
    );
}

#[tokio::test]
async fn failures_do_not_stop_other_downloads() {
    let tmp = tempfile::tempdir().unwrap();
    let store = GpxStore::new(tmp.path());
    let list = activities();
    let directory = FakeDirectory::new(list.clone(), &[1, 3]);

    let report = download_all(&directory, &store, &list, &DownloadConfig::default(), None).await;

    assert_eq!(report.written.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.total(), 3);
    assert_eq!(report.failed[0].activity_id, 2);
    assert!(matches!(
        report.failed[0].error,
        DownloaderError::Http {
            status_code: Some(404),
            ..
        }
    ));

    assert!(report.not_attempted.is_empty());
    assert!(report.fatal().is_none());

    let mut requested = directory.requested.lock().unwrap().clone();
    requested.sort();
    assert_eq!(requested, vec![1, 2, 3]);
}

#[tokio::test]
async fn authentication_failure_stops_downloading() {
    let tmp = tempfile::tempdir().unwrap();
    let store = GpxStore::new(tmp.path());
    let list: Vec<Activity> = (1..=20)
        .map(|id| Activity::new(id, "Run", "running", None, 1_714_548_600_000 + id as i64))
        .collect();
    let directory = RevokedDirectory {
        requested: AtomicU32::new(0),
    };

    let mut report =
        download_all(&directory, &store, &list, &DownloadConfig { concurrency: 1 }, None).await;

    assert_eq!(directory.requested.load(Ordering::Relaxed), 1);
    assert!(report.written.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.not_attempted, (2..=20).collect::<Vec<u64>>());

    let fatal = report.take_fatal().unwrap();
    assert_eq!(fatal.activity_id, 1);
    assert!(matches!(fatal.error, DownloaderError::Authentication { .. }));
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn authentication_failure_stops_concurrent_downloads() {
    let tmp = tempfile::tempdir().unwrap();
    let store = GpxStore::new(tmp.path());
    let list: Vec<Activity> = (1..=20)
        .map(|id| Activity::new(id, "Ride", "cycling", None, 1_714_548_600_000 + id as i64))
        .collect();
    let directory = RevokedDirectory {
        requested: AtomicU32::new(0),
    };

    let report =
        download_all(&directory, &store, &list, &DownloadConfig { concurrency: 4 }, None).await;

    let requested = directory.requested.load(Ordering::Relaxed) as usize;
    assert!(requested <= 4);
    assert_eq!(report.total(), requested);
    assert_eq!(report.total() + report.not_attempted.len(), 20);
    assert!(report.fatal().is_some());
}

#[tokio::test]
async fn empty_list_is_a_no_op() {
    let tmp = tempfile::tempdir().unwrap();
    let store = GpxStore::new(tmp.path().join("never_created"));
    let directory = FakeDirectory::new(Vec::new(), &[]);

    let report = download_all(&directory, &store, &[], &DownloadConfig::default(), None).await;
    assert_eq!(report.total(), 0);
    assert!(!store.dir().exists());
}
