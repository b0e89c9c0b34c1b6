//! This module is used to define the SCPI commands understood by the 2308.

use core::fmt::{self, Write};

use strum_macros::{AsRefStr, EnumIter};

use crate::display::DisplayMessage;

/// Longest command we ever render, including a full 32 character display message.
pub const COMMAND_CAPACITY: usize = 96;

pub type CommandBuffer = heapless::String<COMMAND_CAPACITY>;

/// Used to be less ambiguous about whether something is on or off.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter)]
pub enum State {
    /// Disabled.
    #[default]
    Off = 0x00,
    /// Enabled.
    On = 0x01,
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

/// Quantity selected with `SENSe:FUNCtion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, AsRefStr)]
pub enum SenseFunction {
    #[strum(serialize = "VOLTage")]
    Voltage,
    #[strum(serialize = "CURRent")]
    Current,
}

/// Every command this driver sends to the instrument.
///
/// Rendering goes through [`core::fmt::Display`], see [`Command::render`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command<'a> {
    /// `*RST` - Reset to power-on defaults.
    Reset,
    /// __W__ - Output voltage setpoint, 1 mV resolution.
    SourceVoltage(f64),
    /// __W__ - Output current limit, 100 uA resolution.
    CurrentLimit(f64),
    /// __W__ - Voltage protection level, 1 V resolution.
    VoltageProtection(i64),
    /// __W__ - Enable the voltage protection clamp.
    ///
    /// The 2308 turns the clamp on with a `0` argument.
    VoltageProtectionClamp,
    /// __W__ - Channel 1 output state.
    Output(State),
    /// __W__ - Measured quantity.
    SenseFunction(SenseFunction),
    /// __W__ - Number of readings averaged into one result (1 - 10).
    Average(u8),
    /// __W__ - Integration time in power line cycles (0.002 - 10).
    Nplc(f64),
    /// __W__ - Automatic current range selection.
    CurrentAutoRange(State),
    /// __Q__ - Trigger and return one reading.
    Read,
    /// __W__ - Text shown while text mode is on.
    DisplayText(&'a str),
    /// __W__ - Text mode on the front panel.
    ///
    /// Not affected by `*RST`.
    DisplayTextState(State),
    /// __W__ - Front panel LCD on/off.
    DisplayEnable(State),
}

impl Command<'_> {
    /// Render this command into a fixed size buffer.
    ///
    /// Fails only if the text doesn't fit, which can happen for absurdly large setpoints.
    pub fn render(&self) -> Result<CommandBuffer, fmt::Error> {
        let mut buffer = CommandBuffer::new();
        write!(buffer, "{self}")?;
        Ok(buffer)
    }

    /// Is this a query, i.e. does the instrument answer it?
    pub const fn is_query(&self) -> bool {
        matches!(self, Command::Read)
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Reset => f.write_str("*RST"),
            Command::SourceVoltage(volts) => write!(f, "SOURce1:VOLTage {volts:.3}"),
            Command::CurrentLimit(amps) => write!(f, "SOURce1:CURRent:LIMit:VALue {amps:.4}"),
            Command::VoltageProtection(volts) => write!(f, "SOURce1:VOLTage:PROTection {volts}"),
            Command::VoltageProtectionClamp => f.write_str("SOURce1:VOLTage:PROTection:CLAMp 0"),
            Command::Output(state) => write!(f, "OUTPut1:STATe {}", *state as u8),
            Command::SenseFunction(function) => {
                write!(f, "SENSe:FUNCtion \"{}\"", function.as_ref())
            }
            Command::Average(count) => write!(f, "SENSe:AVERage {count}"),
            Command::Nplc(nplc) => write!(f, "SENSe:NPLCycles {}", General(*nplc)),
            Command::CurrentAutoRange(state) => {
                write!(f, "SENSe:CURRent:RANGe:AUTO {}", *state as u8)
            }
            Command::Read => f.write_str("READ?"),
            Command::DisplayText(text) => write!(f, "DISPlay:TEXT:DATA \"{text}\""),
            Command::DisplayTextState(state) => write!(f, "DISPlay:TEXT:STATe {}", *state as u8),
            Command::DisplayEnable(state) => write!(f, "DISPlay:ENABle {}", *state as u8),
        }
    }
}

/// `*RST` doesn't touch the text display, so it gets switched off explicitly.
pub const fn reset_sequence() -> [Command<'static>; 2] {
    [Command::Reset, Command::DisplayTextState(State::Off)]
}

/// The protection level always goes out before the clamp is enabled.
pub const fn protection_sequence(volts: i64) -> [Command<'static>; 2] {
    [
        Command::VoltageProtection(volts),
        Command::VoltageProtectionClamp,
    ]
}

/// Write the text first, then switch text mode.
pub fn message_sequence(message: &DisplayMessage, state: State) -> [Command<'_>; 2] {
    [
        Command::DisplayText(message.as_str()),
        Command::DisplayTextState(state),
    ]
}

/// Formats a float like C's `%g`: six significant digits, trailing zeros dropped.
///
/// Exponent notation is never used, which is fine for the clamped NPLC range.
#[derive(Debug, Clone, Copy)]
pub struct General(pub f64);

impl fmt::Display for General {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if !value.is_finite() || value == 0.0 {
            return write!(f, "{value}");
        }
        let magnitude = if value < 0.0 { -value } else { value };

        // One digit before the point leaves five after it.
        let mut decimals: usize = 5;
        let mut scale = 1.0;
        while magnitude < scale && decimals < 20 {
            scale /= 10.0;
            decimals += 1;
        }
        while magnitude >= scale * 10.0 && decimals > 0 {
            scale *= 10.0;
            decimals -= 1;
        }

        let mut digits: heapless::String<48> = heapless::String::new();
        write!(digits, "{value:.decimals$}")?;
        let trimmed = if digits.contains('.') {
            digits.trim_end_matches('0').trim_end_matches('.')
        } else {
            digits.as_str()
        };
        f.write_str(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn rendered(command: Command<'_>) -> CommandBuffer {
        command.render().unwrap()
    }

    #[test]
    fn setpoint_commands() {
        assert_eq!(rendered(Command::SourceVoltage(5.0)), "SOURce1:VOLTage 5.000");
        assert_eq!(rendered(Command::SourceVoltage(3.14159)), "SOURce1:VOLTage 3.142");
        assert_eq!(
            rendered(Command::CurrentLimit(0.1)),
            "SOURce1:CURRent:LIMit:VALue 0.1000"
        );
        assert_eq!(
            rendered(Command::CurrentLimit(1.23456)),
            "SOURce1:CURRent:LIMit:VALue 1.2346"
        );
        assert_eq!(
            rendered(Command::VoltageProtection(8)),
            "SOURce1:VOLTage:PROTection 8"
        );
        assert_eq!(
            rendered(Command::VoltageProtectionClamp),
            "SOURce1:VOLTage:PROTection:CLAMp 0"
        );
    }

    #[test]
    fn state_commands() {
        assert_eq!(rendered(Command::Reset), "*RST");
        assert_eq!(rendered(Command::Output(State::On)), "OUTPut1:STATe 1");
        assert_eq!(rendered(Command::Output(State::Off)), "OUTPut1:STATe 0");
        assert_eq!(rendered(Command::DisplayEnable(State::On)), "DISPlay:ENABle 1");
        assert_eq!(
            rendered(Command::DisplayTextState(State::Off)),
            "DISPlay:TEXT:STATe 0"
        );
        assert_eq!(
            rendered(Command::CurrentAutoRange(State::On)),
            "SENSe:CURRent:RANGe:AUTO 1"
        );
    }

    #[test]
    fn sense_commands() {
        assert_eq!(
            rendered(Command::SenseFunction(SenseFunction::Voltage)),
            "SENSe:FUNCtion \"VOLTage\""
        );
        assert_eq!(
            rendered(Command::SenseFunction(SenseFunction::Current)),
            "SENSe:FUNCtion \"CURRent\""
        );
        assert_eq!(rendered(Command::Average(5)), "SENSe:AVERage 5");
        assert_eq!(rendered(Command::Nplc(0.5)), "SENSe:NPLCycles 0.5");
        assert_eq!(rendered(Command::Nplc(0.002)), "SENSe:NPLCycles 0.002");
        assert_eq!(rendered(Command::Nplc(10.0)), "SENSe:NPLCycles 10");
        assert_eq!(rendered(Command::Read), "READ?");
    }

    #[test]
    fn only_read_is_a_query() {
        assert!(Command::Read.is_query());
        assert!(!Command::Reset.is_query());
        assert!(!Command::Nplc(1.0).is_query());
    }

    #[test]
    fn general_format_drops_trailing_zeros() {
        let cases = [
            (1.0, "1"),
            (0.25, "0.25"),
            (0.1234567, "0.123457"),
            (9.9999999, "10"),
            (2.5e-3, "0.0025"),
            (-0.75, "-0.75"),
            (0.0, "0"),
        ];
        for (value, expected) in cases {
            let mut text: heapless::String<32> = heapless::String::new();
            write!(text, "{}", General(value)).unwrap();
            assert_eq!(text, expected, "formatting {value}");
        }
    }

    #[test]
    fn oversized_setpoint_does_not_fit() {
        assert!(Command::SourceVoltage(1e120).render().is_err());
    }

    #[test]
    fn reset_then_text_off() {
        assert_eq!(
            reset_sequence(),
            [Command::Reset, Command::DisplayTextState(State::Off)]
        );
    }

    #[test]
    fn protection_level_before_clamp() {
        let [level, clamp] = protection_sequence(6);
        assert_eq!(level, Command::VoltageProtection(6));
        assert_eq!(clamp, Command::VoltageProtectionClamp);
    }

    #[test]
    fn state_conversions() {
        // Converting between bool and State is the same in both directions.
        for state in State::iter() {
            let converted = State::from(bool::from(state));
            assert_eq!(converted, state);
        }
    }

    #[test]
    fn sense_function_keywords_are_quoted() {
        for function in SenseFunction::iter() {
            let text = rendered(Command::SenseFunction(function));
            assert!(text.ends_with('"'));
            assert!(text.contains(function.as_ref()));
        }
    }
}
