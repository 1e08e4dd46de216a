// Licensed under the Apache-2.0 license

use crate::table::{BoardFunction, HookEntry, HookKind};
use crate::HookError;
use log::{debug, warn};
use serde::Deserialize;

/// Cells per speaker entry: function, hook selection, private mode, shared gpio.
pub const PA_INFO_CELLS: usize = 4;

const CELL_FUNCTION: usize = 0;
const CELL_HOOK: usize = 1;
const CELL_PRIV: usize = 2;
const CELL_SHARE_GPIO: usize = 3;

/// External amplifier wiring of a board.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BoardHookConfig {
    /// Flattened `PA_INFO_CELLS`-tuples, one per speaker entry.
    pub pa_info: Vec<u32>,
    /// Enable GPIO per speaker entry, indexed like `pa_info` entries.
    #[serde(default)]
    pub pa_gpios: Vec<u32>,
}

/// The hook selected for one board function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookBinding {
    pub entry: &'static HookEntry,
    /// Enable line; I2C amplifiers have none.
    pub gpio: Option<u32>,
    /// Board amplifier mode.
    pub mode: u32,
}

impl BoardHookConfig {
    pub(crate) fn bindings(&self) -> Result<[Option<HookBinding>; BoardFunction::COUNT], HookError> {
        if self.pa_info.is_empty() {
            return Err(HookError::EmptyPaInfo);
        }
        if self.pa_info.len() % PA_INFO_CELLS != 0 {
            return Err(HookError::PaInfoLength(self.pa_info.len()));
        }

        let mut count = self.pa_info.len() / PA_INFO_CELLS;
        if count > BoardFunction::COUNT {
            warn!(
                "speaker count {} is greater than {}",
                count,
                BoardFunction::COUNT
            );
            count = BoardFunction::COUNT;
        }

        let mut bindings = [None; BoardFunction::COUNT];
        for (i, cells) in self.pa_info.chunks_exact(PA_INFO_CELLS).take(count).enumerate() {
            let function = BoardFunction::try_from(cells[CELL_FUNCTION])
                .map_err(|_| HookError::InvalidFunction(cells[CELL_FUNCTION]))?;
            let entry = HookEntry::by_index(cells[CELL_HOOK])
                .ok_or(HookError::InvalidHook(cells[CELL_HOOK]))?;
            let mode = cells[CELL_PRIV];

            let gpio = if entry.kind == HookKind::I2cSpeaker {
                None
            } else {
                match cells[CELL_SHARE_GPIO] {
                    0 => Some(*self.pa_gpios.get(i).ok_or(HookError::MissingGpio(i))?),
                    share if share as usize > count => {
                        return Err(HookError::ShareGpio { share, count });
                    }
                    share => bindings[share as usize - 1].and_then(|b: HookBinding| b.gpio),
                }
            };

            debug!(
                "{:?}: hook {} mode {} gpio {:?}",
                function, entry.name, mode, gpio
            );
            bindings[function.index()] = Some(HookBinding { entry, gpio, mode });
        }
        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pa_info: &[u32], pa_gpios: &[u32]) -> BoardHookConfig {
        BoardHookConfig {
            pa_info: pa_info.to_vec(),
            pa_gpios: pa_gpios.to_vec(),
        }
    }

    #[test]
    fn test_general_speaker_entries() {
        let bindings = config(&[0, 0, 3, 0, 2, 0, 1, 0], &[60, 61])
            .bindings()
            .unwrap();
        let speaker = bindings[BoardFunction::Speaker.index()].unwrap();
        assert_eq!(speaker.entry.kind, HookKind::GeneralSpeaker);
        assert_eq!(speaker.gpio, Some(60));
        assert_eq!(speaker.mode, 3);
        let earpiece = bindings[BoardFunction::Earpiece.index()].unwrap();
        assert_eq!(earpiece.gpio, Some(61));
        assert!(bindings[BoardFunction::Headphone.index()].is_none());
    }

    #[test]
    fn test_shared_gpio() {
        let bindings = config(&[0, 0, 1, 0, 1, 0, 2, 1], &[60])
            .bindings()
            .unwrap();
        assert_eq!(bindings[BoardFunction::Speaker1.index()].unwrap().gpio, Some(60));
    }

    #[test]
    fn test_i2c_entry_needs_no_gpio() {
        let bindings = config(&[2, 1, 5, 0], &[]).bindings().unwrap();
        let earpiece = bindings[BoardFunction::Earpiece.index()].unwrap();
        assert_eq!(earpiece.entry.kind, HookKind::I2cSpeaker);
        assert_eq!(earpiece.gpio, None);
    }

    #[test]
    fn test_rejects_bad_pa_info() {
        assert_eq!(config(&[], &[]).bindings(), Err(HookError::EmptyPaInfo));
        assert_eq!(
            config(&[0, 0, 1], &[60]).bindings(),
            Err(HookError::PaInfoLength(3))
        );
        assert_eq!(
            config(&[7, 0, 1, 0], &[60]).bindings(),
            Err(HookError::InvalidFunction(7))
        );
        assert_eq!(
            config(&[0, 9, 1, 0], &[60]).bindings(),
            Err(HookError::InvalidHook(9))
        );
        assert_eq!(
            config(&[0, 0, 1, 2], &[60]).bindings(),
            Err(HookError::ShareGpio { share: 2, count: 1 })
        );
        assert_eq!(
            config(&[0, 0, 1, 0], &[]).bindings(),
            Err(HookError::MissingGpio(0))
        );
    }

    #[test]
    fn test_extra_entries_are_ignored() {
        let mut pa_info = Vec::new();
        for function in 0..4 {
            pa_info.extend_from_slice(&[function, 0, 1, 0]);
        }
        pa_info.extend_from_slice(&[9, 9, 9, 9]);
        let bindings = config(&pa_info, &[1, 2, 3, 4]).bindings().unwrap();
        assert!(bindings.iter().all(Option::is_some));
    }

    #[test]
    fn test_from_toml() {
        let config: BoardHookConfig = toml::from_str(
            r#"
            pa_info = [0, 0, 2, 0, 2, 1, 0, 0]
            pa_gpios = [60]
            "#,
        )
        .unwrap();
        let bindings = config.bindings().unwrap();
        assert_eq!(bindings[0].unwrap().gpio, Some(60));
        assert_eq!(bindings[2].unwrap().entry.name, "i2c_speaker");
    }
}
