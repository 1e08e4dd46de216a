// Licensed under the Apache-2.0 license

//! Register fields consulted by the access controller.

use agdsp_config::{FieldsConfig, RegFieldConfig};
use agdsp_error::{AgdspError, AgdspResult, RegmapError};
use agdsp_hil::RegisterMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// AGCP subsystem sleep state machine, as reported in the sleep status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum AdcpState {
    DeepSleep = 0,
    XtlWait = 1,
    XtlBufWait = 2,
    DeepSleepXtlOn = 3,
    PllPwrWait = 4,
    Wakeup = 5,
    WakeupLock = 6,
}

/// Power sequencer state of the AGDSP and AGCP domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum PdState {
    Wakeup = 0,
    PowerOnSeq = 1,
    PowerOnM = 2,
    RstAssert = 3,
    IsoOff = 6,
    Shutdown = 7,
    Active = 8,
    Standby = 9,
    IsoOn = 10,
    RstDeassert = 11,
    PowerOffM = 13,
    BisrRst = 14,
    BisrProc = 15,
    PowerOn = 18,
    PowerOff = 29,
}

/// A field inside a 32-bit register, located by byte offset and mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegField {
    pub reg: u32,
    pub mask: u32,
}

impl RegField {
    pub const fn new(reg: u32, mask: u32) -> Self {
        Self { reg, mask }
    }

    /// Position of the lowest set bit of the mask.
    pub fn shift(&self) -> u32 {
        if self.mask == 0 {
            0
        } else {
            self.mask.trailing_zeros()
        }
    }

    /// Extracts the field from a full register value.
    pub fn decode(&self, value: u32) -> u32 {
        (value & self.mask) >> self.shift()
    }

    pub fn is_set(&self, value: u32) -> bool {
        value & self.mask != 0
    }

    /// Reads the register and returns the raw value and the decoded field.
    pub fn read(&self, map: &dyn RegisterMap) -> Result<(u32, u32), RegmapError> {
        let value = map.read(self.reg)?;
        Ok((value, self.decode(value)))
    }
}

impl From<RegFieldConfig> for RegField {
    fn from(cfg: RegFieldConfig) -> Self {
        RegField::new(cfg.reg, cfg.mask)
    }
}

/// The five fields the controller reads or writes, resolved once at probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFields {
    /// AP access enable bit, in the AGCP AHB map.
    pub ap_access_ena: RegField,
    /// Deep sleep bit, in the PMU map.
    pub sleep_ctrl: RegField,
    /// Sleep status field, in the PMU map.
    pub slp_status: RegField,
    /// AGDSP power state field, in the PMU map.
    pub pwr_status4: RegField,
    /// AGCP power state field, in the PMU map.
    pub pwr_status3: RegField,
}

fn required(name: &str, field: Option<RegFieldConfig>) -> AgdspResult<RegField> {
    field
        .map(RegField::from)
        .ok_or_else(|| AgdspError::InvalidConfig(format!("register field {name} is missing")))
}

impl AccessFields {
    pub fn from_config(fields: &FieldsConfig) -> AgdspResult<Self> {
        Ok(AccessFields {
            ap_access_ena: required("ap_access_ena", fields.ap_access_ena)?,
            sleep_ctrl: required("pmu_sleep_ctrl", fields.pmu_sleep_ctrl)?,
            slp_status: required("pmu_slp_status", fields.pmu_slp_status)?,
            pwr_status4: required("pmu_pwr_status4", fields.pmu_pwr_status4)?,
            pwr_status3: required("pmu_pwr_status3", fields.pmu_pwr_status3)?,
        })
    }
}
