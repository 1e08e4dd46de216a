// Licensed under the Apache-2.0 license

//! Board description for an AGDSP access domain.
//!
//! These are the defaults for the emulated board; real boards provide a TOML
//! file with the same layout.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse board description: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid board description: {0}")]
    Invalid(String),
}

/// A register offset and the mask selecting a field inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegFieldConfig {
    pub reg: u32,
    pub mask: u32,
}

impl RegFieldConfig {
    pub const fn new(reg: u32, mask: u32) -> Self {
        Self { reg, mask }
    }
}

/// IPC destination and channel used for the init handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IpcConfig {
    pub dst: u8,
    pub channel: u8,
}

/// Names of the register maps, resolved through the syscon lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SysconConfig {
    pub agcp_ahb: String,
    pub pmu_apb: String,
    #[serde(default)]
    pub agcp_glb: Option<String>,
    #[serde(default)]
    pub clk_rf: Option<String>,
    #[serde(default)]
    pub dvfs_apb: Option<String>,
    #[serde(default)]
    pub agcp_apb: Option<String>,
}

impl SysconConfig {
    /// Optional maps whose cache mode follows the domain power state, in
    /// switch order.
    pub fn cache_maps(&self) -> [Option<&str>; 4] {
        [
            self.agcp_glb.as_deref(),
            self.clk_rf.as_deref(),
            self.dvfs_apb.as_deref(),
            self.agcp_apb.as_deref(),
        ]
    }
}

/// Register fields used by the access controller. Every field is required by
/// the driver at probe time but may be left out of a partial description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldsConfig {
    /// AP access enable bit in the AGCP AHB map.
    pub ap_access_ena: Option<RegFieldConfig>,
    /// Deep sleep control bit in the PMU map.
    pub pmu_sleep_ctrl: Option<RegFieldConfig>,
    /// AGCP sleep status field in the PMU map.
    pub pmu_slp_status: Option<RegFieldConfig>,
    /// AGDSP power state field in the PMU map.
    pub pmu_pwr_status4: Option<RegFieldConfig>,
    /// AGCP subsystem power state field in the PMU map.
    pub pmu_pwr_status3: Option<RegFieldConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub max_wake_polls: u32,
    pub wake_poll_interval_us: u64,
    pub wake_timeout_ms: u64,
    pub wake_settle_us: u64,
    pub cache_settle_us: u64,
    pub channel_retry_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            max_wake_polls: 1_000_000,
            wake_poll_interval_us: 5,
            wake_timeout_ms: 5_000,
            wake_settle_us: 20,
            cache_settle_us: 200,
            channel_retry_ms: 20,
        }
    }
}

impl TimingConfig {
    pub fn wake_poll_interval(&self) -> Duration {
        Duration::from_micros(self.wake_poll_interval_us)
    }

    pub fn wake_timeout(&self) -> Duration {
        Duration::from_millis(self.wake_timeout_ms)
    }

    pub fn wake_settle(&self) -> Duration {
        Duration::from_micros(self.wake_settle_us)
    }

    pub fn cache_settle(&self) -> Duration {
        Duration::from_micros(self.cache_settle_us)
    }

    pub fn channel_retry(&self) -> Duration {
        Duration::from_millis(self.channel_retry_ms)
    }

    /// Timing with every delay removed, for emulated hardware.
    pub fn immediate() -> Self {
        TimingConfig {
            max_wake_polls: 1_000,
            wake_poll_interval_us: 0,
            wake_timeout_ms: 1_000,
            wake_settle_us: 0,
            cache_settle_us: 0,
            channel_retry_ms: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgdspPdConfig {
    /// Power domain name registered with the framework.
    pub name: String,
    /// Added to the shared memory physical address reported to the DSP.
    #[serde(default)]
    pub ddr_addr_offset: u32,
    /// Hardware manages the access enable bit on its own.
    #[serde(default)]
    pub auto_agcp_access: bool,
    #[serde(default)]
    pub ipc: IpcConfig,
    pub syscon: SysconConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Default for AgdspPdConfig {
    fn default() -> Self {
        AgdspPdConfig {
            name: "agdsp-pd".into(),
            ddr_addr_offset: 0,
            auto_agcp_access: false,
            ipc: IpcConfig { dst: 3, channel: 4 },
            syscon: SysconConfig {
                agcp_ahb: "agcp_ahb".into(),
                pmu_apb: "pmu_apb".into(),
                agcp_glb: Some("agcp_glb".into()),
                clk_rf: Some("clk_rf".into()),
                dvfs_apb: Some("dvfs_apb".into()),
                agcp_apb: Some("agcp_apb".into()),
            },
            fields: FieldsConfig {
                ap_access_ena: Some(RegFieldConfig::new(0x3c, 0x4)),
                pmu_sleep_ctrl: Some(RegFieldConfig::new(0xcc, 0x8)),
                pmu_slp_status: Some(RegFieldConfig::new(0xd4, 0x000f_0000)),
                pmu_pwr_status4: Some(RegFieldConfig::new(0xc0, 0x0000_1f00)),
                pmu_pwr_status3: Some(RegFieldConfig::new(0xbc, 0x001f_0000)),
            },
            timing: TimingConfig::default(),
        }
    }
}

impl AgdspPdConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: AgdspPdConfig = toml::de::from_str(s)?;
        config.verify()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks values that parse but can never describe working hardware.
    pub fn verify(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }
        if self.syscon.agcp_ahb.is_empty() || self.syscon.pmu_apb.is_empty() {
            return Err(ConfigError::Invalid(
                "syscon agcp_ahb and pmu_apb must be named".into(),
            ));
        }
        let fields = [
            ("ap_access_ena", self.fields.ap_access_ena),
            ("pmu_sleep_ctrl", self.fields.pmu_sleep_ctrl),
            ("pmu_slp_status", self.fields.pmu_slp_status),
            ("pmu_pwr_status4", self.fields.pmu_pwr_status4),
            ("pmu_pwr_status3", self.fields.pmu_pwr_status3),
        ];
        for (name, field) in fields {
            if let Some(field) = field {
                if field.mask == 0 {
                    return Err(ConfigError::Invalid(format!("{name}: mask is zero")));
                }
            }
        }
        if self.timing.max_wake_polls == 0 {
            return Err(ConfigError::Invalid(
                "timing.max_wake_polls must be at least 1".into(),
            ));
        }
        if self.timing.wake_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.wake_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
