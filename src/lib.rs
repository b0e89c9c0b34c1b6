//! This crate provides an interface for controlling the Keithley 2308 portable battery simulator,
//! a single channel programmable source which can also measure its own output.
//!
//! It supports `no-std` environments by use of the `no_std` feature flag.
//!
//! The instrument is controlled with SCPI commands over a message based bus (GPIB by default,
//! primary address 16). This crate doesn't open the bus itself: hand it anything implementing
//! [`channel::Channel`], or use [`channel::SerialChannel`] on top of an [`embedded_io`] byte
//! stream such as a GPIB-USB bridge.
//!
//! Supported operations:
//! * Reset to power-on defaults.
//! * Output voltage setpoint (`0 - 15 V`, 1 mV resolution).
//! * Current limit (`6 mA - 5 A`, 100 uA resolution).
//! * Voltage protection level (`0 - 8 V`, 1 V resolution) with the protection clamp.
//! * Output on/off.
//! * Voltage and current measurement with averaging, integration time and a noise floor.
//! * Front panel text messages and LCD on/off.
//!
//! # Example
//!
//! ```
//! use keithley_2308::channel::{Channel, Response};
//! use keithley_2308::measurement::MeasurementConfig;
//! use keithley_2308::psu::Keithley2308;
//!
//! /// Pretends to be an instrument sitting at 4.2 V.
//! struct Battery;
//!
//! impl Channel for Battery {
//!     type Error = ();
//!
//!     fn write(&mut self, _command: &str) -> Result<(), ()> {
//!         Ok(())
//!     }
//!
//!     fn query(&mut self, _command: &str) -> Result<Response, ()> {
//!         Response::try_from("4.2003").map_err(|_| ())
//!     }
//! }
//!
//! let mut psu = Keithley2308::new(Battery);
//! psu.reset().unwrap();
//! psu.set_output_voltage(4.2).unwrap();
//! psu.set_current_limit(1.0).unwrap();
//! psu.enable_output().unwrap();
//!
//! let volts = psu.measure_voltage(MeasurementConfig::voltage()).unwrap();
//! assert_eq!(volts, 4.2);
//! ```

#![cfg_attr(feature = "no_std", no_std)]

pub mod channel;
pub mod command;
pub mod display;
pub mod error;
pub mod limits;
pub mod measurement;
pub mod psu;

#[cfg(test)]
mod mock_serial;
