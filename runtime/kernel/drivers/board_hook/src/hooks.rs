// Licensed under the Apache-2.0 license

use crate::pa_info::{BoardHookConfig, HookBinding};
use crate::table::{BoardFunction, HookKind};
use crate::HookError;
use log::info;
use std::sync::Arc;

/// Output lines driving amplifier enable pins.
pub trait GpioLine: Send + Sync {
    fn set_value(&self, gpio: u32, high: bool);
}

/// An I2C smart amplifier.
pub trait Amplifier: Send + Sync {
    fn speaker_on(&self, mode: u32);
    fn speaker_off(&self);
}

/// Board amplifier hooks, dispatched by board function.
pub struct BoardHooks {
    bindings: [Option<HookBinding>; BoardFunction::COUNT],
    gpio: Arc<dyn GpioLine>,
    amp: Option<Arc<dyn Amplifier>>,
}

impl BoardHooks {
    pub fn new(
        config: &BoardHookConfig,
        gpio: Arc<dyn GpioLine>,
        amp: Option<Arc<dyn Amplifier>>,
    ) -> Result<Self, HookError> {
        let bindings = config.bindings()?;
        if amp.is_none() {
            for (index, binding) in bindings.iter().enumerate() {
                if matches!(binding, Some(b) if b.entry.kind == HookKind::I2cSpeaker) {
                    let function = BoardFunction::try_from(index as u32)
                        .map_err(|_| HookError::InvalidFunction(index as u32))?;
                    return Err(HookError::NoAmplifier(function));
                }
            }
        }
        Ok(Self {
            bindings,
            gpio,
            amp,
        })
    }

    pub fn binding(&self, function: BoardFunction) -> Option<&HookBinding> {
        self.bindings[function.index()].as_ref()
    }

    /// Switches the amplifier behind `function`.
    pub fn apply(&self, function: BoardFunction, on: bool) -> Result<(), HookError> {
        let binding = *self.binding(function).ok_or(HookError::Unbound(function))?;
        info!(
            "{:?}: {} on {} mode {}",
            function, binding.entry.name, on, binding.mode
        );
        match binding.entry.kind {
            HookKind::GeneralSpeaker => {
                let gpio = binding
                    .gpio
                    .ok_or(HookError::MissingGpio(function.index()))?;
                let level = binding.entry.en_level;
                self.gpio.set_value(gpio, if on { level } else { !level });
            }
            HookKind::I2cSpeaker => {
                let amp = self.amp.as_deref().ok_or(HookError::NoAmplifier(function))?;
                if on {
                    amp.speaker_on(binding.mode);
                } else {
                    amp.speaker_off();
                }
            }
        }
        Ok(())
    }
}
