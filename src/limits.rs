//! Valid ranges of the instrument parameters and how out-of-range values get corrected.
//!
//! Correction is always silent: a value outside its range is replaced by the nearest bound,
//! never rejected.

/// Closed range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Limits<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Move `value` onto the nearest bound if it lies outside.
    ///
    /// Values that compare neither below nor above (NaN) come back unchanged.
    pub fn clamp(&self, value: T) -> T {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Limits<f64> {
    /// Like [`Limits::clamp`], but NaN lands on the lower bound.
    pub fn clamp_float(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.min
        } else {
            self.clamp(value)
        }
    }
}

/// Readings averaged per result.
pub const AVERAGE_COUNT: Limits<i32> = Limits::new(1, 10);

/// Integration time in power line cycles. (33 us - 167 ms at 60 Hz.)
pub const NPLC: Limits<f64> = Limits::new(0.002, 10.0);

/// Output voltage setpoint, volts.
pub const OUTPUT_VOLTAGE: Limits<f64> = Limits::new(0.0, 15.0);

/// Output current limit, amps.
pub const CURRENT_LIMIT: Limits<f64> = Limits::new(0.006, 5.0);

/// Voltage protection level, volts.
pub const VOLTAGE_PROTECTION: Limits<f64> = Limits::new(0.0, 8.0);

/// Clamp a requested average count into `[1, 10]`.
pub fn clamp_average_count(count: i32) -> u8 {
    // Always 1..=10 after the clamp, so the narrowing is lossless.
    AVERAGE_COUNT.clamp(count) as u8
}

/// Clamp a requested integration time into `[0.002, 10]` NPLC.
pub fn clamp_nplc(nplc: f64) -> f64 {
    NPLC.clamp_float(nplc)
}

/// What to do with output setpoints (voltage, current limit, protection level) outside their
/// declared range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RangePolicy {
    /// Send the value as requested and let the instrument deal with it.
    #[default]
    PassThrough,
    /// Clamp into the declared range like the sampling parameters.
    Clamp,
}

impl RangePolicy {
    pub fn apply(self, limits: &Limits<f64>, value: f64) -> f64 {
        match self {
            RangePolicy::PassThrough => value,
            RangePolicy::Clamp => limits.clamp_float(value),
        }
    }
}
