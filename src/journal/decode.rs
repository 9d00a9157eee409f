// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use super::naming::SnapshotKind;
use super::record::{JournalEntry, Record};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a snapshot file: {0}")]
    NotSnapshot(PathBuf),
}

/// Turns raw journal lines and snapshot file contents into [`Record`]s.
///
/// A decode error means the line or file is dropped; the watcher carries on.
pub trait Decoder: Send + Sync {
    /// Decode one journal line (without its line terminator).
    fn decode_line(&self, line: &[u8]) -> Result<Record, DecodeError>;

    /// Decode the full contents of a snapshot file.
    fn decode_snapshot(&self, kind: SnapshotKind, content: &[u8]) -> Result<Record, DecodeError>;

    /// Read and decode the snapshot file at `path`.
    fn decode_snapshot_file(&self, path: &Path) -> Result<Record, DecodeError> {
        let kind = SnapshotKind::from_path(path)
            .ok_or_else(|| DecodeError::NotSnapshot(path.to_path_buf()))?;
        let content = std::fs::read(path)?;
        self.decode_snapshot(kind, &content)
    }
}

/// Decoder for the game's JSON formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct JournalDecoder;

impl Decoder for JournalDecoder {
    fn decode_line(&self, line: &[u8]) -> Result<Record, DecodeError> {
        let fields: Map<String, Value> = serde_json::from_slice(line)?;
        Ok(Record::Journal(JournalEntry {
            fields,
            raw: String::from_utf8_lossy(line).into_owned(),
        }))
    }

    fn decode_snapshot(&self, kind: SnapshotKind, content: &[u8]) -> Result<Record, DecodeError> {
        let record = match kind {
            SnapshotKind::Cargo => Record::Cargo(from_slice(content)?),
            SnapshotKind::Market => Record::Market(from_slice(content)?),
            SnapshotKind::ModulesInfo => Record::ModulesInfo(from_slice(content)?),
            SnapshotKind::NavRoute => Record::NavRoute(from_slice(content)?),
            SnapshotKind::Outfitting => Record::Outfitting(from_slice(content)?),
            SnapshotKind::Shipyard => Record::Shipyard(from_slice(content)?),
            SnapshotKind::Status => Record::Status(from_slice(content)?),
            SnapshotKind::ShipLocker => Record::ShipLocker(from_slice(content)?),
        };
        Ok(record)
    }
}

fn from_slice<T: DeserializeOwned>(content: &[u8]) -> Result<T, DecodeError> {
    Ok(serde_json::from_slice(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::record::NamedEvent;
    use tempfile::TempDir;

    #[test]
    fn test_decode_line() {
        let decoder = JournalDecoder;
        let line = br#"{"timestamp":"2024-03-01T18:04:11Z","event":"Docked","StationName":"Jameson Memorial"}"#;

        let record = decoder.decode_line(line).unwrap();
        assert_eq!(record.name(), "Docked");
        match record {
            Record::Journal(entry) => {
                assert_eq!(entry.raw.as_bytes(), line);
                assert_eq!(entry.get("StationName").unwrap(), "Jameson Memorial");
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_decode_line_invalid() {
        let decoder = JournalDecoder;
        assert!(matches!(
            decoder.decode_line(b"{\"event\":\"Dock"),
            Err(DecodeError::Json(_))
        ));
        // Valid JSON, but not an object
        assert!(decoder.decode_line(b"[1,2,3]").is_err());
        assert!(decoder.decode_line(b"").is_err());
    }

    #[test]
    fn test_decode_snapshot_kinds() {
        let decoder = JournalDecoder;
        let content = br#"{"timestamp":"2024-03-01T18:04:11Z","event":"Market","MarketID":128666762,"StationName":"Jameson Memorial","Items":[]}"#;

        let record = decoder.decode_snapshot(SnapshotKind::Market, content).unwrap();
        match &record {
            Record::Market(market) => assert_eq!(market.market_id, 128666762),
            other => panic!("unexpected record {:?}", other),
        }
        assert!(record.is_snapshot());

        let locker = decoder
            .decode_snapshot(SnapshotKind::ShipLocker, br#"{"event":"ShipLocker","Items":[]}"#)
            .unwrap();
        assert_eq!(locker.name(), "ShipLocker");
    }

    #[test]
    fn test_decode_snapshot_file() {
        let temp_dir = TempDir::new().unwrap();
        let decoder = JournalDecoder;

        let status = temp_dir.path().join("Status.json");
        std::fs::write(&status, br#"{"timestamp":"2024-03-01T18:04:11Z","event":"Status","Flags":0}"#)
            .unwrap();
        let record = decoder.decode_snapshot_file(&status).unwrap();
        assert!(matches!(record, Record::Status(_)));

        let bad = temp_dir.path().join("Cargo.json");
        std::fs::write(&bad, b"{ not json").unwrap();
        assert!(matches!(
            decoder.decode_snapshot_file(&bad),
            Err(DecodeError::Json(_))
        ));

        assert!(matches!(
            decoder.decode_snapshot_file(&temp_dir.path().join("Market.json")),
            Err(DecodeError::Io(_))
        ));
        assert!(matches!(
            decoder.decode_snapshot_file(&temp_dir.path().join("Backpack.json")),
            Err(DecodeError::NotSnapshot(_))
        ));
    }
}
