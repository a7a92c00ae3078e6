//! Original server state captured before the first mutating call.

use super::error::BackupError;
use chrono::{DateTime, Utc};
use stackkit::{ControlPlane, MatchMode, PowerState, VolumeId};

/// Layout of the timestamp suffix in artifact names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Prefix of volume snapshot names.
pub const SNAPSHOT_PREFIX: &str = "DSK";

/// Format the suffix shared by every artifact of one run.
pub fn timestamp_suffix(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Everything rollback needs to know, read once at the start of a run.
///
/// There are no setters: the captured power state and volume list are the
/// reference for restoration and must not change after capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    server: String,
    timestamp: String,
    original_power: PowerState,
    original_volumes: Vec<VolumeId>,
}

impl ExecutionContext {
    /// Read the server's power state and attached volumes.
    ///
    /// The power state is classified with the same `match_mode` the poller
    /// uses, so stop and restart decisions agree with each other.
    pub fn capture(
        cloud: &dyn ControlPlane,
        server: &str,
        timestamp: impl Into<String>,
        match_mode: MatchMode,
    ) -> Result<Self, BackupError> {
        let raw = cloud
            .server_status(server)
            .map_err(|source| BackupError::Capture {
                server: server.to_string(),
                what: "power state",
                source,
            })?;
        let original_power = PowerState::classify(&raw, match_mode);

        let original_volumes =
            cloud
                .attached_volumes(server)
                .map_err(|source| BackupError::Capture {
                    server: server.to_string(),
                    what: "attached volumes",
                    source,
                })?;

        log::info!(
            "Captured {}: power state {}, {} attached volume(s)",
            server,
            original_power,
            original_volumes.len()
        );

        Ok(Self {
            server: server.to_string(),
            timestamp: timestamp.into(),
            original_power,
            original_volumes,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn original_power(&self) -> &PowerState {
        &self.original_power
    }

    pub fn original_volumes(&self) -> &[VolumeId] {
        &self.original_volumes
    }

    /// Name of the server backup image: `{server}_{timestamp}`.
    pub fn server_backup_name(&self) -> String {
        format!("{}_{}", self.server, self.timestamp)
    }

    /// Name of every volume snapshot of this run: `DSK_{server}_{timestamp}`.
    pub fn volume_snapshot_name(&self) -> String {
        format!("{}_{}_{}", SNAPSHOT_PREFIX, self.server, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stackkit::MockCloud;

    const V1: &str = "0b4c6a1e-52d1-4b6f-9a3e-1f2d3c4b5a69";

    #[test]
    fn test_timestamp_suffix() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(timestamp_suffix(at), "20240307090501");
    }

    #[test]
    fn test_capture_reads_state() {
        let cloud = MockCloud::new();
        let v: VolumeId = V1.parse().unwrap();
        cloud.add_server("web01", PowerState::Running);
        cloud.add_attached_volume("web01", &v);

        let ctx =
            ExecutionContext::capture(&cloud, "web01", "20240307090501", MatchMode::Exact).unwrap();

        assert_eq!(ctx.server(), "web01");
        assert_eq!(ctx.original_power(), &PowerState::Running);
        assert_eq!(ctx.original_volumes(), &[v]);
        assert!(cloud.calls().is_empty());
    }

    #[test]
    fn test_artifact_names() {
        let cloud = MockCloud::new();
        cloud.add_server("web01", PowerState::Shutdown);

        let ctx =
            ExecutionContext::capture(&cloud, "web01", "20240307090501", MatchMode::Exact).unwrap();

        assert_eq!(ctx.timestamp(), "20240307090501");
        assert_eq!(ctx.server_backup_name(), "web01_20240307090501");
        assert_eq!(ctx.volume_snapshot_name(), "DSK_web01_20240307090501");
    }

    #[test]
    fn test_capture_failure_is_reported() {
        let cloud = MockCloud::new();
        cloud.add_server("web01", PowerState::Running);
        cloud.reject_queries("web01");

        let err = ExecutionContext::capture(&cloud, "web01", "20240307090501", MatchMode::Exact)
            .unwrap_err();

        assert!(matches!(
            err,
            BackupError::Capture {
                what: "power state",
                ..
            }
        ));
        assert!(cloud.calls().is_empty());
    }

    #[test]
    fn test_capture_classifies_with_match_mode() {
        let cloud = MockCloud::new();
        cloud.add_server("web01", PowerState::Other("Running (1)".to_string()));

        let exact = ExecutionContext::capture(&cloud, "web01", "1", MatchMode::Exact).unwrap();
        let contains =
            ExecutionContext::capture(&cloud, "web01", "1", MatchMode::Contains).unwrap();

        assert!(!exact.original_power().is_running());
        assert_eq!(contains.original_power(), &PowerState::Running);
    }

    #[test]
    fn test_capture_unknown_server() {
        let cloud = MockCloud::new();
        assert!(ExecutionContext::capture(&cloud, "ghost", "1", MatchMode::Exact).is_err());
    }
}
