//! Measurement configuration and post-processing of readings.
//!
//! Everything here is pure; the instrument round trip lives in [`crate::psu`].

use core::fmt::Write;

use fugit::MicrosDurationU32;
use strum_macros::EnumIter;

use crate::{
    command::{Command, SenseFunction, State},
    limits::{clamp_average_count, clamp_nplc},
};

/// The two quantities the 2308 can measure on its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Measurement {
    Voltage,
    Current,
}

impl Measurement {
    pub const fn sense_function(self) -> SenseFunction {
        match self {
            Measurement::Voltage => SenseFunction::Voltage,
            Measurement::Current => SenseFunction::Current,
        }
    }

    /// Decimal places a reading is rounded to. (1 mV / 100 uA.)
    pub const fn decimals(self) -> u32 {
        match self {
            Measurement::Voltage => 3,
            Measurement::Current => 4,
        }
    }

    pub const fn default_noise_floor(self) -> f64 {
        match self {
            Measurement::Voltage => 1e-3,
            Measurement::Current => 100e-6,
        }
    }

    /// Voltage uses the range implied by the output setpoint, current needs auto ranging.
    pub const fn auto_range(self) -> bool {
        matches!(self, Measurement::Current)
    }

    /// Commands which configure the sense subsystem, in the order they must be sent.
    ///
    /// Both parameters are expected to be clamped already.
    pub fn sense_sequence(self, average_count: u8, nplc: f64) -> heapless::Vec<Command<'static>, 4> {
        let mut commands: heapless::Vec<Command<'static>, 4> = heapless::Vec::new();
        let mut push = |command: Command<'static>| {
            // Capacity covers the longest sequence.
            let _ = commands.push(command);
        };
        push(Command::SenseFunction(self.sense_function()));
        push(Command::Average(average_count));
        push(Command::Nplc(nplc));
        if self.auto_range() {
            push(Command::CurrentAutoRange(State::On));
        }
        commands
    }

    /// Zero readings that are within the noise floor.
    ///
    /// Voltage is non-negative by convention so only the lower side is checked, current can
    /// flow both ways.
    pub fn filter(self, value: f64, noise_floor: f64) -> f64 {
        let is_noise = match self {
            Measurement::Voltage => value < noise_floor,
            Measurement::Current => value < noise_floor && value > -noise_floor,
        };
        if is_noise { 0.0 } else { value }
    }

    /// Round a raw reading to this quantity's resolution, then apply the noise floor.
    pub fn condition(self, raw: f64, noise_floor: f64) -> f64 {
        self.filter(round_decimals(raw, self.decimals()), noise_floor)
    }
}

/// Sampling parameters for one measurement call.
///
/// Values are taken as requested and clamped when the measurement runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementConfig {
    /// Readings averaged per result, valid range `1 - 10`.
    pub average_count: i32,
    /// Integration time in power line cycles, valid range `0.002 - 10`.
    pub nplc: f64,
    /// Results below this magnitude are reported as `0.0`.
    pub noise_floor: f64,
}

impl MeasurementConfig {
    pub const DEFAULT_AVERAGE_COUNT: i32 = 5;
    pub const DEFAULT_NPLC: f64 = 0.5;

    pub const fn new(average_count: i32, nplc: f64, noise_floor: f64) -> Self {
        Self {
            average_count,
            nplc,
            noise_floor,
        }
    }

    /// Defaults for `measurement`: 5 readings at 0.5 NPLC with its default noise floor.
    pub const fn for_measurement(measurement: Measurement) -> Self {
        Self::new(
            Self::DEFAULT_AVERAGE_COUNT,
            Self::DEFAULT_NPLC,
            measurement.default_noise_floor(),
        )
    }

    /// Voltage defaults, noise floor of 1 mV.
    pub const fn voltage() -> Self {
        Self::for_measurement(Measurement::Voltage)
    }

    /// Current defaults, noise floor of 100 uA.
    pub const fn current() -> Self {
        Self::for_measurement(Measurement::Current)
    }

    pub const fn with_average_count(mut self, average_count: i32) -> Self {
        self.average_count = average_count;
        self
    }

    pub const fn with_nplc(mut self, nplc: f64) -> Self {
        self.nplc = nplc;
        self
    }

    pub const fn with_noise_floor(mut self, noise_floor: f64) -> Self {
        self.noise_floor = noise_floor;
        self
    }

    /// The sampling parameters the instrument will actually receive.
    pub fn clamped(&self) -> (u8, f64) {
        (clamp_average_count(self.average_count), clamp_nplc(self.nplc))
    }

    /// Were any of the sampling parameters outside their range?
    pub fn needs_clamping(&self) -> bool {
        let (average_count, nplc) = self.clamped();
        i32::from(average_count) != self.average_count || nplc != self.nplc
    }

    /// Integration time of a single reading, after clamping.
    pub fn integration_time(&self, line_frequency: LineFrequency) -> MicrosDurationU32 {
        let (_, nplc) = self.clamped();
        let micros = nplc * 1_000_000.0 / f64::from(line_frequency.hertz());
        MicrosDurationU32::micros(micros as u32)
    }
}

/// Mains frequency, which sets the length of one power line cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter)]
pub enum LineFrequency {
    Hz50,
    #[default]
    Hz60,
}

impl LineFrequency {
    pub const fn hertz(self) -> u32 {
        match self {
            LineFrequency::Hz50 => 50,
            LineFrequency::Hz60 => 60,
        }
    }
}

const ROUND_CAPACITY: usize = 64;

/// Round `value` to `decimals` places, halves away from zero.
///
/// Rounding works on the shortest decimal form of the value (what the instrument sent), so
/// `-0.00015` becomes `-0.0002` even though the nearest binary value is slightly smaller.
pub fn round_decimals(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let negative = value.is_sign_negative();
    let magnitude = if negative { -value } else { value };
    let signed_zero = if negative { -0.0 } else { 0.0 };

    // Anything below a tenth of the last place can't round up, and would need a lot of
    // digits to print.
    let mut smallest = 1.0;
    for _ in 0..=decimals {
        smallest /= 10.0;
    }
    if magnitude < smallest {
        return signed_zero;
    }

    let mut text: heapless::String<ROUND_CAPACITY> = heapless::String::new();
    if write!(text, "{magnitude}").is_err() {
        // Too large to carry a fractional part worth rounding.
        return value;
    }
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let places = decimals as usize;
    if fraction.len() <= places {
        return value;
    }

    let mut scaled: u128 = 0;
    for digit in whole.bytes().chain(fraction.bytes().take(places)) {
        scaled = scaled * 10 + u128::from(digit - b'0');
    }
    if fraction.as_bytes()[places] >= b'5' {
        scaled += 1;
    }

    let mut digits: heapless::String<ROUND_CAPACITY> = heapless::String::new();
    if write!(digits, "{scaled:0width$}", width = places + 1).is_err() {
        return value;
    }
    let split = digits.len() - places;
    let mut rounded: heapless::String<ROUND_CAPACITY> = heapless::String::new();
    let written = write!(
        rounded,
        "{}{}.{}",
        if negative { "-" } else { "" },
        &digits[..split],
        &digits[split..]
    );
    match written {
        Ok(()) => rounded.parse().unwrap_or(value),
        Err(_) => value,
    }
}
