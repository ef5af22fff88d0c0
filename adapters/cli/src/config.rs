//! TOML configuration file support.
//!
//! Every key is optional. Command-line flags are folded into the parsed
//! tables before they are resolved into engine configuration.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use snake_ensemble_core::{EdgePolicy, GridSize};
use snake_ensemble_system_conductor::ConductorConfig;
use snake_ensemble_world::{RosterEntry, SessionConfig};

const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Contents of a configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) version: Option<u32>,
    pub(crate) session: SessionTable,
    pub(crate) timing: TimingConfig,
}

/// The `[session]` table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SessionTable {
    pub(crate) grid_size: Option<GridSize>,
    pub(crate) edge_policy: Option<EdgePolicy>,
    pub(crate) respawn_ticks: Option<u32>,
    pub(crate) seed: Option<u64>,
    pub(crate) roster: Option<Vec<RosterEntry>>,
}

impl SessionTable {
    /// Builds the session; a missing roster becomes the four-corner ensemble.
    pub(crate) fn resolve(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        let grid_size = self.grid_size.unwrap_or(defaults.grid_size);
        let edge_policy = self.edge_policy.unwrap_or(defaults.edge_policy);

        let mut session = SessionConfig::four_corners(grid_size, edge_policy);
        if let Some(roster) = &self.roster {
            session.roster = roster.clone();
        }
        if let Some(respawn_ticks) = self.respawn_ticks {
            session.respawn_ticks = respawn_ticks;
        }
        if let Some(seed) = self.seed {
            session.seed = seed;
        }
        session
    }
}

/// The `[timing]` table. `bpm` takes precedence over `tick_interval_ms`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct TimingConfig {
    pub(crate) bpm: Option<u32>,
    pub(crate) tick_interval_ms: Option<u64>,
    pub(crate) decision_budget_ms: Option<u64>,
}

impl TimingConfig {
    /// Resolves the table into loop timing, starting from the defaults.
    pub(crate) fn resolve(&self) -> Result<ConductorConfig> {
        let mut config = match self.bpm {
            Some(bpm) => ConductorConfig::from_bpm(bpm)?,
            None => ConductorConfig::default(),
        };
        if let (None, Some(interval)) = (self.bpm, self.tick_interval_ms) {
            config.tick_interval_ms = interval;
        }
        if let Some(budget) = self.decision_budget_ms {
            config.decision_budget_ms = budget;
        }
        if config.tick_interval_ms == 0 {
            bail!("tick interval must be positive");
        }
        Ok(config)
    }
}

/// Reads and parses the configuration file at `path`.
pub(crate) fn load(path: &Path) -> Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid configuration at {}", path.display()))
}

/// Parses configuration file contents.
pub(crate) fn parse(contents: &str) -> Result<FileConfig> {
    let config: FileConfig =
        toml::from_str(contents).context("failed to parse configuration toml contents")?;
    if let Some(version) = config.version {
        if version != SUPPORTED_CONFIG_VERSION {
            bail!(
                "unsupported configuration version {version}; expected {SUPPORTED_CONFIG_VERSION}"
            );
        }
    }
    Ok(config)
}
