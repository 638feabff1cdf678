//! Core relay job data types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a relay job.
///
/// Transitions happen exclusively through the job store's compare-and-swap
/// `transition` operation; see the supervisor for the legal edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not scheduled, not running.
    Idle,
    /// Waiting for its scheduled start instant.
    Scheduled,
    /// Encoder process running, pushing to the ingest endpoint.
    Live,
    /// Stop requested, waiting for the encoder to terminate.
    Stopping,
    /// Stopped after a successful run.
    Offline,
    /// Failed to start, or the encoder exited unexpectedly.
    Error,
}

impl JobStatus {
    /// Status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Live => "live",
            JobStatus::Stopping => "stopping",
            JobStatus::Offline => "offline",
            JobStatus::Error => "error",
        }
    }

    /// Parse a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(JobStatus::Idle),
            "scheduled" => Some(JobStatus::Scheduled),
            "live" => Some(JobStatus::Live),
            "stopping" => Some(JobStatus::Stopping),
            "offline" => Some(JobStatus::Offline),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    /// A process is (or may still be) associated with the job.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Live | JobStatus::Stopping)
    }

    /// The job may be started from this status.
    pub fn is_startable(&self) -> bool {
        matches!(
            self,
            JobStatus::Idle | JobStatus::Scheduled | JobStatus::Offline | JobStatus::Error
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the media the job relays. Opaque to the orchestrator; the
/// media resolver turns it into playable paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRef {
    /// A single stored asset, addressed by library-relative name.
    Asset { name: String },
    /// An ordered playlist of assets, played in sequence.
    Playlist { names: Vec<String> },
}

/// Where the encoded stream is pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// RTMP ingest URL, e.g. `rtmp://a.rtmp.youtube.com/live2`.
    pub rtmp_url: String,
    /// Secret stream key appended to the URL.
    pub stream_key: String,
}

impl Destination {
    /// Full publish target: URL joined with the stream key.
    pub fn publish_url(&self) -> String {
        format!("{}/{}", self.rtmp_url.trim_end_matches('/'), self.stream_key)
    }
}

/// Output orientation of the encoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Encoder parameters for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeParams {
    /// Video bitrate in kbps.
    #[serde(default = "default_bitrate")]
    pub bitrate_kbps: u32,
    /// Output frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Output resolution as `WIDTHxHEIGHT`.
    #[serde(default = "default_resolution")]
    pub resolution: String,
    /// Output orientation.
    #[serde(default = "default_orientation")]
    pub orientation: Orientation,
    /// Repeat the source indefinitely instead of playing it once.
    #[serde(default = "default_loop")]
    pub loop_source: bool,
}

fn default_bitrate() -> u32 {
    2500
}

fn default_fps() -> u32 {
    30
}

fn default_resolution() -> String {
    "1280x720".to_string()
}

fn default_orientation() -> Orientation {
    Orientation::Horizontal
}

fn default_loop() -> bool {
    true
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            bitrate_kbps: default_bitrate(),
            fps: default_fps(),
            resolution: default_resolution(),
            orientation: default_orientation(),
            loop_source: default_loop(),
        }
    }
}

/// Optional time bounds for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Future instant at which the scheduler should start the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    /// Maximum time the job may stay live, in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

/// One relay job: a stored asset (or playlist) continuously pushed to a
/// remote ingest endpoint by a supervised encoder process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (UUID).
    pub id: String,
    /// Owning account.
    pub owner_id: String,
    /// Human-readable title, also carried into history records.
    pub title: String,
    /// Provider label derived from the destination URL.
    pub platform: String,
    /// Media reference, resolved at start time.
    pub source: SourceRef,
    /// Ingest endpoint and key.
    pub destination: Destination,
    /// Encoder parameters.
    pub encode: EncodeParams,
    /// Optional start instant and duration budget.
    pub schedule: Schedule,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Encoder process id; set iff status is live or stopping.
    pub process_pid: Option<u32>,
    /// Set on transition into live.
    pub started_at: Option<DateTime<Utc>>,
    /// Set on transition out of live.
    pub ended_at: Option<DateTime<Utc>>,
    /// Last failure reason; cleared on successful start.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Instant at which the duration budget elapses, if the job is live and
    /// has one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let minutes = self.schedule.duration_minutes?;
        let started = self.started_at?;
        Some(started + Duration::minutes(i64::from(minutes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Idle,
            JobStatus::Scheduled,
            JobStatus::Live,
            JobStatus::Stopping,
            JobStatus::Offline,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("bogus"), None);
    }

    #[test]
    fn test_status_predicates() {
        assert!(JobStatus::Live.is_active());
        assert!(JobStatus::Stopping.is_active());
        assert!(!JobStatus::Idle.is_active());
        assert!(!JobStatus::Offline.is_active());

        assert!(JobStatus::Idle.is_startable());
        assert!(JobStatus::Scheduled.is_startable());
        assert!(JobStatus::Offline.is_startable());
        assert!(JobStatus::Error.is_startable());
        assert!(!JobStatus::Live.is_startable());
        assert!(!JobStatus::Stopping.is_startable());
    }

    #[test]
    fn test_publish_url_joins_key() {
        let dest = Destination {
            rtmp_url: "rtmp://a.rtmp.youtube.com/live2/".to_string(),
            stream_key: "abcd-1234".to_string(),
        };
        assert_eq!(dest.publish_url(), "rtmp://a.rtmp.youtube.com/live2/abcd-1234");
    }

    #[test]
    fn test_encode_params_defaults() {
        let params = EncodeParams::default();
        assert_eq!(params.bitrate_kbps, 2500);
        assert_eq!(params.fps, 30);
        assert_eq!(params.resolution, "1280x720");
        assert_eq!(params.orientation, Orientation::Horizontal);
        assert!(params.loop_source);
    }

    #[test]
    fn test_source_ref_serde_tagging() {
        let source = SourceRef::Asset {
            name: "intro.mp4".to_string(),
        };
        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"type\":\"asset\""));

        let parsed: SourceRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, source);

        let playlist = SourceRef::Playlist {
            names: vec!["a.mp4".to_string(), "b.mp4".to_string()],
        };
        let json = serde_json::to_string(&playlist).unwrap();
        let parsed: SourceRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, playlist);
    }

    #[test]
    fn test_expires_at() {
        let now = Utc::now();
        let mut job = sample_job();
        assert_eq!(job.expires_at(), None);

        job.schedule.duration_minutes = Some(30);
        assert_eq!(job.expires_at(), None);

        job.started_at = Some(now);
        assert_eq!(job.expires_at(), Some(now + Duration::minutes(30)));
    }

    fn sample_job() -> Job {
        let now = Utc::now();
        Job {
            id: "job-1".to_string(),
            owner_id: "owner-1".to_string(),
            title: "Morning show".to_string(),
            platform: "YouTube".to_string(),
            source: SourceRef::Asset {
                name: "show.mp4".to_string(),
            },
            destination: Destination {
                rtmp_url: "rtmp://a.rtmp.youtube.com/live2".to_string(),
                stream_key: "key".to_string(),
            },
            encode: EncodeParams::default(),
            schedule: Schedule::default(),
            status: JobStatus::Idle,
            process_pid: None,
            started_at: None,
            ended_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
