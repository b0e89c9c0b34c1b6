use crate::{
    channel::{Channel, GpibAddress, Response},
    command::{self, Command, State},
    display::DisplayMessage,
    error::{Error, Result},
    limits::{CURRENT_LIMIT, Limits, OUTPUT_VOLTAGE, RangePolicy, VOLTAGE_PROTECTION},
    measurement::{LineFrequency, Measurement, MeasurementConfig},
};
use fugit::MicrosDurationU32;

/// Driver behaviour which isn't tied to a single call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    /// How output setpoints outside their declared range are handled.
    pub setpoint_policy: RangePolicy,
    /// Mains frequency, used to report integration times.
    pub line_frequency: LineFrequency,
}

/// You can create a Keithley2308 using any [`Channel`] to the instrument.
///
/// The driver owns the channel exclusively, and every method sends its whole command sequence
/// before returning, so the sequences of two operations never interleave.
///
/// For its methods, we use the nomenclature that "set" means to write a configuration and
/// "measure" means to take a reading.
pub struct Keithley2308<C: Channel> {
    channel: C,
    config: ControllerConfig,
}

impl<C: Channel> Keithley2308<C> {
    /// Wrap an already open channel. Nothing is sent.
    pub fn new(channel: C) -> Self {
        Self::with_config(channel, ControllerConfig::default())
    }

    pub fn with_config(channel: C, config: ControllerConfig) -> Self {
        Self { channel, config }
    }

    /// Open a channel to the instrument at `address` and reset it to power-on defaults.
    ///
    /// If the reset fails the channel is closed again before the error is returned.
    pub fn open<F>(address: GpibAddress, factory: F) -> Result<Self, C::Error>
    where
        F: FnOnce(GpibAddress) -> core::result::Result<C, C::Error>,
    {
        log::info!("Opening Keithley 2308 at {}", address);
        let channel = factory(address).map_err(Error::Transport)?;
        let mut instrument = Self::new(channel);
        match instrument.reset() {
            Ok(()) => Ok(instrument),
            Err(err) => {
                // The reset failure is what gets reported.
                if let Err(close_err) = instrument.close() {
                    log::warn!("Closing after failed reset also failed: {:?}", close_err);
                }
                Err(err)
            }
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ControllerConfig {
        &mut self.config
    }

    /// Reset to power-on defaults, including the text display which `*RST` leaves alone.
    pub fn reset(&mut self) -> Result<(), C::Error> {
        self.write_sequence(&command::reset_sequence())
    }

    /// Set the output voltage setpoint in volts, 1 mV resolution. Declared range `0 - 15 V`.
    pub fn set_output_voltage(&mut self, volts: f64) -> Result<(), C::Error> {
        let volts = self.apply_policy("output voltage", &OUTPUT_VOLTAGE, volts);
        self.write_command(Command::SourceVoltage(volts))
    }

    /// Set the output current limit in amps, 100 uA resolution. Declared range `6 mA - 5 A`.
    pub fn set_current_limit(&mut self, amps: f64) -> Result<(), C::Error> {
        let amps = self.apply_policy("current limit", &CURRENT_LIMIT, amps);
        self.write_command(Command::CurrentLimit(amps))
    }

    /// Set the voltage protection level in whole volts and enable the protection clamp.
    ///
    /// Fractional volts are truncated. Declared range `0 - 8 V`.
    pub fn set_voltage_protection(&mut self, volts: f64) -> Result<(), C::Error> {
        let volts = self.apply_policy("voltage protection", &VOLTAGE_PROTECTION, volts);
        self.write_sequence(&command::protection_sequence(volts as i64))
    }

    /// Enable/disable the output.
    pub fn set_output_state(&mut self, state: impl Into<State>) -> Result<(), C::Error> {
        self.write_command(Command::Output(state.into()))
    }

    pub fn enable_output(&mut self) -> Result<(), C::Error> {
        self.set_output_state(State::On)
    }

    pub fn disable_output(&mut self) -> Result<(), C::Error> {
        self.set_output_state(State::Off)
    }

    /// Measure the output voltage in volts, rounded to 1 mV.
    ///
    /// Readings below `config.noise_floor` are returned as `0.0`.
    pub fn measure_voltage(&mut self, config: MeasurementConfig) -> Result<f64, C::Error> {
        self.measure(Measurement::Voltage, config)
    }

    /// Measure the output current in amps, rounded to 100 uA.
    ///
    /// Readings with a magnitude below `config.noise_floor` are returned as `0.0`.
    pub fn measure_current(&mut self, config: MeasurementConfig) -> Result<f64, C::Error> {
        self.measure(Measurement::Current, config)
    }

    /// Configure the sense subsystem for `measurement`, trigger a reading and condition it.
    ///
    /// Sampling parameters are clamped into range first. Neither transport nor parse failures
    /// are retried.
    pub fn measure(
        &mut self,
        measurement: Measurement,
        config: MeasurementConfig,
    ) -> Result<f64, C::Error> {
        let (average_count, nplc) = config.clamped();
        if config.needs_clamping() {
            log::warn!(
                "Sampling parameters (average {}, {} NPLC) out of range, using average {}, {} NPLC",
                config.average_count,
                config.nplc,
                average_count,
                nplc
            );
        }
        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "{:?} measurement, integration time {} us",
                measurement,
                self.integration_time(&config).ticks()
            );
        }

        self.write_sequence(&measurement.sense_sequence(average_count, nplc))?;
        let response = self.query_command(Command::Read)?;
        let raw: f64 = response.trim().parse()?;
        Ok(measurement.condition(raw, config.noise_floor))
    }

    /// Integration time of a single reading taken with `config`, at the configured line
    /// frequency.
    pub fn integration_time(&self, config: &MeasurementConfig) -> MicrosDurationU32 {
        config.integration_time(self.config.line_frequency)
    }

    /// Show `text` on the front panel.
    ///
    /// Text which can't be shown is rejected before anything is sent.
    pub fn show_message(&mut self, text: &str) -> Result<(), C::Error> {
        let message = DisplayMessage::new(text).inspect_err(|err| {
            log::warn!("Rejected display message {:?}: {}", text, err);
        })?;
        self.show_display_message(&message)
    }

    /// Show the default "TEST IN PROGRESS" banner.
    pub fn show_default_message(&mut self) -> Result<(), C::Error> {
        self.show_display_message(&DisplayMessage::default())
    }

    pub fn show_display_message(&mut self, message: &DisplayMessage) -> Result<(), C::Error> {
        self.write_sequence(&command::message_sequence(message, State::On))
    }

    /// Blank the message text and leave text mode.
    pub fn hide_message(&mut self) -> Result<(), C::Error> {
        let blank = DisplayMessage::blank();
        self.write_sequence(&command::message_sequence(&blank, State::Off))
    }

    /// Turn the front panel LCD on/off. Independent of the text mode.
    pub fn set_display_state(&mut self, state: impl Into<State>) -> Result<(), C::Error> {
        self.write_command(Command::DisplayEnable(state.into()))
    }

    pub fn enable_display(&mut self) -> Result<(), C::Error> {
        self.set_display_state(State::On)
    }

    pub fn disable_display(&mut self) -> Result<(), C::Error> {
        self.set_display_state(State::Off)
    }

    /// Send a single command which produces no response.
    pub fn write_command(&mut self, command: Command<'_>) -> Result<(), C::Error> {
        debug_assert!(!command.is_query(), "{} expects a response", command);
        let rendered = command.render().map_err(|_| Error::CommandOverflow)?;
        log::debug!("SCPI write: {}", rendered);
        self.channel.write(&rendered).map_err(Error::Transport)
    }

    /// Send a query and return the raw response.
    pub fn query_command(&mut self, command: Command<'_>) -> Result<Response, C::Error> {
        debug_assert!(command.is_query(), "{} has no response", command);
        let rendered = command.render().map_err(|_| Error::CommandOverflow)?;
        let response = self.channel.query(&rendered).map_err(Error::Transport)?;
        log::debug!("SCPI query: {} -> {:?}", rendered, response.as_str());
        Ok(response)
    }

    /// Send `commands` in order, stopping at the first failure.
    fn write_sequence(&mut self, commands: &[Command<'_>]) -> Result<(), C::Error> {
        for command in commands {
            self.write_command(*command)?;
        }
        Ok(())
    }

    fn apply_policy(&self, name: &str, limits: &Limits<f64>, value: f64) -> f64 {
        let applied = self.config.setpoint_policy.apply(limits, value);
        if !limits.contains(value) {
            log::warn!(
                "Requested {} {} is outside {}..={}, sending {}",
                name,
                value,
                limits.min,
                limits.max,
                applied
            );
        }
        applied
    }

    /// Release the session.
    pub fn close(mut self) -> Result<(), C::Error> {
        log::info!("Closing Keithley 2308 session");
        self.channel.close().map_err(Error::Transport)
    }

    /// Give back the channel without closing it.
    pub fn into_inner(self) -> C {
        self.channel
    }
}

/// Open the instrument at `address`, reset it, run `session` and close the channel again.
///
/// The channel is closed on every path, also when the reset or `session` fails. The first
/// error is the one returned.
pub fn with_session<C, F, G, T>(address: GpibAddress, factory: F, session: G) -> Result<T, C::Error>
where
    C: Channel,
    F: FnOnce(GpibAddress) -> core::result::Result<C, C::Error>,
    G: FnOnce(&mut Keithley2308<C>) -> Result<T, C::Error>,
{
    let mut instrument = Keithley2308::open(address, factory)?;
    let outcome = session(&mut instrument);
    let closed = instrument.close();
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), _) => Err(err),
        (Ok(_), Err(err)) => Err(err),
    }
}
