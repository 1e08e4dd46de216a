// Licensed under the Apache-2.0 license

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Audio output functions that may carry an external amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum BoardFunction {
    Speaker = 0,
    Speaker1 = 1,
    Earpiece = 2,
    Headphone = 3,
}

impl BoardFunction {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        u32::from(self) as usize
    }
}

/// Amplifier activation behaviors a board can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// GPIO-enabled amplifier.
    GeneralSpeaker,
    /// I2C smart amplifier.
    I2cSpeaker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookEntry {
    pub name: &'static str,
    pub kind: HookKind,
    /// GPIO level that enables the amplifier.
    pub en_level: bool,
}

/// Selectable hooks, indexed by the hook cell of the pa info.
pub static HOOK_TABLE: [HookEntry; 2] = [
    HookEntry {
        name: "general_speaker",
        kind: HookKind::GeneralSpeaker,
        en_level: true,
    },
    HookEntry {
        name: "i2c_speaker",
        kind: HookKind::I2cSpeaker,
        en_level: true,
    },
];

impl HookEntry {
    pub fn by_index(index: u32) -> Option<&'static HookEntry> {
        HOOK_TABLE.get(index as usize)
    }

    pub fn by_name(name: &str) -> Option<&'static HookEntry> {
        HOOK_TABLE.iter().find(|entry| entry.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(HookEntry::by_index(0).unwrap().kind, HookKind::GeneralSpeaker);
        assert_eq!(
            HookEntry::by_name("i2c_speaker").unwrap().kind,
            HookKind::I2cSpeaker
        );
        assert!(HookEntry::by_index(2).is_none());
        assert!(HookEntry::by_name("aw87xxx").is_none());
    }

    #[test]
    fn test_board_function_from_cell() {
        assert_eq!(BoardFunction::try_from(2u32), Ok(BoardFunction::Earpiece));
        assert!(BoardFunction::try_from(4u32).is_err());
        assert_eq!(BoardFunction::Headphone.index(), 3);
    }
}
