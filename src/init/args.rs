// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::error::{Error, Result};
use crate::journal::config::{default_directory, JournalConfig, DEFAULT_QUEUE_SIZE};
use crate::tail::StartAt;

/// Always forwarded when a filter is set, so route changes keep flowing.
pub const ALWAYS_FORWARDED_EVENT: &str = "NavRoute";

#[derive(Debug, Args, Clone)]
pub struct WatchArgs {
    /// Journal directory (default: ~/Saved Games/Frontier Developments/Elite Dangerous)
    #[arg(env = "EDWATCH_DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Only forward journal events with this name (repeatable)
    #[arg(short = 'f', long = "filter", env = "EDWATCH_FILTER", action = clap::ArgAction::Append, value_delimiter = ',')]
    pub filter: Vec<String>,

    /// Where to start reading the current journal
    #[arg(value_enum, long, env = "EDWATCH_START_AT", default_value = "beginning")]
    pub start_at: StartAtArg,

    /// Capacity of the record queue
    #[arg(long, env = "EDWATCH_QUEUE_SIZE", default_value_t = DEFAULT_QUEUE_SIZE)]
    pub queue_size: usize,

    /// JSON file mapping event names to commands to run
    #[arg(long, env = "EDWATCH_ACTIONS")]
    pub actions: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum StartAtArg {
    Beginning,
    End,
}

impl From<StartAtArg> for StartAt {
    fn from(value: StartAtArg) -> Self {
        match value {
            StartAtArg::Beginning => StartAt::Beginning,
            StartAtArg::End => StartAt::End,
        }
    }
}

impl WatchArgs {
    pub fn build_config(&self) -> Result<JournalConfig> {
        let directory = match &self.directory {
            Some(dir) => dir.clone(),
            None => default_directory().ok_or_else(|| {
                Error::Config(
                    "No journal directory given and the home directory is unknown".to_string(),
                )
            })?,
        };

        let mut filter: Vec<String> = self
            .filter
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        if !filter.is_empty() {
            filter.push(ALWAYS_FORWARDED_EVENT.to_string());
        }

        Ok(JournalConfig::new(directory)
            .with_event_filter(filter)
            .with_queue_size(self.queue_size)
            .with_start_at(self.start_at.into()))
    }
}
