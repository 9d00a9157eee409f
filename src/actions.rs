// SPDX-License-Identifier: Apache-2.0

//! Runs external commands in response to journal events.
//!
//! A [`CommandMap`] is loaded from a JSON file mapping event names to
//! commands:
//!
//! ```json
//! {
//!   "FSDJump": { "program": "VPC_LED_Control.exe", "args": ["3344", "80CB", "01", "40", "ff", "40"] },
//!   "Docked":  { "program": "VPC_LED_Control.exe", "args": ["3344", "80CB", "01", "ff", "ff", "ff"] }
//! }
//! ```
//!
//! [`handle_records`] logs every record and forwards the mapped [`Action`]
//! for events newer than the start of the run; [`ActionRunner`] executes
//! them one at a time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tokio::select;
use tracing::{debug, info, warn};

use crate::bounded_channel::{BoundedReceiver, BoundedSender, SendError};
use crate::journal::{NamedEvent, Record};
use crate::shutdown::Shutdown;
use crate::BoxError;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Failed to read action file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid action file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// An external command to run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Action {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Event name to command mapping.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CommandMap(HashMap<String, Action>);

impl CommandMap {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ActionError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| ActionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&content).map_err(|source| ActionError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, event: &str) -> Option<&Action> {
        self.0.get(event)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Action)> for CommandMap {
    fn from_iter<T: IntoIterator<Item = (String, Action)>>(iter: T) -> Self {
        CommandMap(iter.into_iter().collect())
    }
}

/// Log every record and forward mapped actions for events timestamped after
/// `start_time`. Returns when the record queue closes or on shutdown.
pub async fn handle_records(
    mut records: BoundedReceiver<Record>,
    commands: CommandMap,
    actions: BoundedSender<Action>,
    start_time: DateTime<Utc>,
    shutdown: Shutdown,
) -> Result<(), BoxError> {
    loop {
        let record = select! {
            record = records.next() => match record {
                Some(record) => record,
                None => break,
            },
            _ = shutdown.dying() => break,
        };

        let (name, timestamp) = record.name_and_timestamp();
        info!(event = name, timestamp, "Journal event");
        debug!(record = ?record, "Journal record");

        // Replayed backlog is logged but does not trigger commands
        let is_live = record
            .parsed_timestamp()
            .is_some_and(|t| t > start_time);
        if !is_live {
            continue;
        }

        if let Some(action) = commands.get(name) {
            match actions.send_until(action.clone(), &shutdown).await {
                Ok(()) => {}
                Err(SendError::Shutdown) => break,
                Err(SendError::Disconnected) => {
                    warn!("Action runner gone, no further commands will run");
                    break;
                }
            }
        }
    }

    debug!("Record handler stopped");
    Ok(())
}

/// Executes queued actions one at a time.
pub struct ActionRunner {
    actions: BoundedReceiver<Action>,
}

impl ActionRunner {
    pub fn new(actions: BoundedReceiver<Action>) -> Self {
        Self { actions }
    }

    pub async fn run(mut self, shutdown: Shutdown) -> Result<(), BoxError> {
        loop {
            let action = select! {
                action = self.actions.next() => match action {
                    Some(action) => action,
                    None => break,
                },
                _ = shutdown.dying() => break,
            };

            execute(&action, &shutdown).await;
        }

        debug!("Action runner stopped");
        Ok(())
    }
}

async fn execute(action: &Action, shutdown: &Shutdown) {
    let mut command = Command::new(&action.program);
    command
        .args(&action.args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    select! {
        status = command.status() => match status {
            Ok(status) if status.success() => {
                debug!(program = %action.program, "Action completed");
            }
            Ok(status) => {
                warn!(program = %action.program, status = %status, "Action exited with failure");
            }
            Err(e) => {
                warn!(program = %action.program, error = %e, "Failed to run action");
            }
        },
        _ = shutdown.dying() => {}
    }
}
