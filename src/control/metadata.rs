//! Tagged, versioned wire schema for `getMeta` (SPEC_FULL.md §2), replacing
//! the source's heterogeneous pickled dict with a `bincode`-encoded struct.

use serde::{Deserialize, Serialize};

pub const METADATA_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewingWindowWire {
    pub name: String,
    pub rise_utc: String,
    pub set_utc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedWindowWire {
    pub name: String,
    pub rise_utc: String,
    pub set_utc: String,
    pub completed: bool,
}

/// Open Question resolved (SPEC_FULL.md §4): `current_time_utc` is wall
/// clock UTC; clients are responsible for local rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub version: u16,
    pub used_space_bytes: u64,
    pub is_recording: bool,
    pub directory: String,
    pub current_time_utc: String,
    pub schedule: Vec<ViewingWindowWire>,
    pub processed_schedule: Vec<ProcessedWindowWire>,
    pub tracking: bool,
}

impl MetadataSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }
}

/// Payload of the `calibrate_date_time` command's follow-up frame.
#[derive(Debug, Deserialize)]
pub struct DateTimePayload {
    pub datetime: String,
    pub timezone: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_and_decodes() {
        let snapshot = MetadataSnapshot {
            version: METADATA_VERSION,
            used_space_bytes: 1024,
            is_recording: false,
            directory: "/data".to_string(),
            current_time_utc: "2024-01-01T00:00:00Z".to_string(),
            schedule: vec![],
            processed_schedule: vec![],
            tracking: true,
        };

        let bytes = snapshot.encode().unwrap();
        let decoded: MetadataSnapshot = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.version, METADATA_VERSION);
        assert_eq!(decoded.directory, "/data");
        assert!(decoded.tracking);
    }
}
