//! Engine-wide configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! The single `timezone` is pushed into each component's options.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictOptions, ConflictScope};
use crate::error::{Result, ScheduleError};
use crate::expander::{ExpandOptions, ExpansionLimits};
use crate::gesture::GridConfig;
use crate::slots::{BusinessHours, SlotOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// IANA timezone of the clinic; all wall-clock rules are evaluated in it.
    pub timezone: Tz,
    pub expansion: ExpansionLimits,
    pub business_hours: BusinessHours,
    pub conflict_scope: ConflictScope,
    pub grid: GridConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            expansion: ExpansionLimits::default(),
            business_hours: BusinessHours::default(),
            conflict_scope: ConflictScope::default(),
            grid: GridConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(s).map_err(|e| ScheduleError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.business_hours.validate()?;
        self.grid().validate()?;
        self.expansion.validate()?;
        Ok(())
    }

    pub fn expand_options(&self) -> ExpandOptions {
        ExpandOptions {
            limits: self.expansion,
            timezone: self.timezone,
        }
    }

    pub fn slot_options(&self) -> SlotOptions {
        SlotOptions {
            business_hours: self.business_hours,
            timezone: self.timezone,
        }
    }

    pub fn conflict_options(&self) -> ConflictOptions {
        ConflictOptions {
            scope: self.conflict_scope,
            slots: self.slot_options(),
        }
    }

    pub fn grid(&self) -> GridConfig {
        GridConfig {
            timezone: self.timezone,
            ..self.grid.clone()
        }
    }
}
