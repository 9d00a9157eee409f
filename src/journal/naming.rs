// SPDX-License-Identifier: Apache-2.0

//! File name classification for the journal directory.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Rotating journal files, matched against the lowercased base name.
pub static JOURNAL_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^journal\.[0-9]+\.[0-9]+\.log$").unwrap());

/// Overwrite-in-place snapshot files the game keeps next to the journals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Cargo,
    Market,
    ModulesInfo,
    NavRoute,
    Outfitting,
    Shipyard,
    Status,
    ShipLocker,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 8] = [
        SnapshotKind::Cargo,
        SnapshotKind::Market,
        SnapshotKind::ModulesInfo,
        SnapshotKind::NavRoute,
        SnapshotKind::Outfitting,
        SnapshotKind::Shipyard,
        SnapshotKind::Status,
        SnapshotKind::ShipLocker,
    ];

    /// Lowercase file name of the snapshot.
    pub fn file_name(self) -> &'static str {
        match self {
            SnapshotKind::Cargo => "cargo.json",
            SnapshotKind::Market => "market.json",
            SnapshotKind::ModulesInfo => "modulesinfo.json",
            SnapshotKind::NavRoute => "navroute.json",
            SnapshotKind::Outfitting => "outfitting.json",
            SnapshotKind::Shipyard => "shipyard.json",
            SnapshotKind::Status => "status.json",
            SnapshotKind::ShipLocker => "shiplocker.json",
        }
    }

    /// Classify a path by its base name, ignoring case.
    pub fn from_path(path: impl AsRef<Path>) -> Option<SnapshotKind> {
        let base = lower_base_name(path.as_ref())?;
        SnapshotKind::ALL
            .into_iter()
            .find(|kind| kind.file_name() == base)
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Lowercased base name of `path`, if it has a UTF-8 one.
pub fn lower_base_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_lowercase())
}

pub fn is_journal_file(path: impl AsRef<Path>) -> bool {
    lower_base_name(path.as_ref())
        .map(|base| JOURNAL_FILE_RE.is_match(&base))
        .unwrap_or(false)
}
