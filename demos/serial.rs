//! Drive a Keithley 2308 through a Prologix style GPIB-USB bridge.
//!
//! Usage: `cargo run --example serial -- [PORT] [GPIB ADDRESS]`

use std::env;

use inquire::Select;
use keithley_2308::{
    channel::{Channel, GpibAddress, Response, SerialChannel, SerialError},
    measurement::MeasurementConfig,
    psu::with_session,
};
use serialport::SerialPort;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 115200;
// Averaged readings at high NPLC take a while, a reasonably large time out is required.
const SERIAL_TIMEOUT_MS: u64 = 3000;
const OUTPUT_VOLTAGE_V: f64 = 3.7;
const CURRENT_LIMIT_A: f64 = 0.5;
const VOLTAGE_PROTECTION_V: f64 = 5.0;
const STABILIZATION_DELAY_MS: u64 = 1000;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

/// A Prologix style bridge in controller mode with automatic read-back switched off.
///
/// The 2308 complains about an unterminated query when it's addressed to talk after a command
/// with no response, so the bridge only reads after an actual query.
struct Bridge(SerialChannel<PortWrapper>);

impl Channel for Bridge {
    type Error = SerialError<IoError>;

    fn write(&mut self, command: &str) -> Result<(), Self::Error> {
        self.0.write(command)
    }

    fn query(&mut self, command: &str) -> Result<Response, Self::Error> {
        self.0.write(command)?;
        self.0.query("++read eoi")
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.0.close()
    }
}

/// Open the serial port and point the bridge at `address`.
fn open_bridge(port_name: &str, address: GpibAddress) -> Result<Bridge, SerialError<IoError>> {
    let port = serialport::new(port_name, BAUD_RATE)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .map_err(|e| SerialError::Io(IoError(e.into())))?;

    let mut serial = SerialChannel::new(PortWrapper(port));
    // Controller mode, no automatic read-back, LF line ends.
    serial.write("++mode 1")?;
    serial.write("++auto 0")?;
    serial.write("++eos 2")?;
    serial.write(&format!("++addr {}", address.primary()))?;
    Ok(Bridge(serial))
}

fn main() {
    env_logger::init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        // List available serial ports
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        // Interactive selection
        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    let address = match env::args().nth(2) {
        Some(arg) => {
            let primary: u8 = arg.parse().expect("GPIB address must be a number");
            GpibAddress::new(primary).expect("Invalid GPIB address")
        }
        None => GpibAddress::default(),
    };

    println!("Using port: {} for {}", port_name, address);

    let result = with_session(
        address,
        |address| open_bridge(&port_name, address),
        |psu| {
            psu.show_default_message()?;

            psu.set_voltage_protection(VOLTAGE_PROTECTION_V)?;
            psu.set_current_limit(CURRENT_LIMIT_A)?;
            psu.set_output_voltage(OUTPUT_VOLTAGE_V)?;
            println!(
                "Output set to {OUTPUT_VOLTAGE_V} V, limit {CURRENT_LIMIT_A} A, protection {VOLTAGE_PROTECTION_V} V"
            );

            psu.enable_output()?;
            println!("Output enabled");

            // Wait for output to stabilize
            std::thread::sleep(std::time::Duration::from_millis(STABILIZATION_DELAY_MS));

            let volts = psu.measure_voltage(MeasurementConfig::voltage())?;
            let amps = psu.measure_current(MeasurementConfig::current().with_nplc(1.0))?;
            println!("Measured output: {volts:.3} V, {amps:.4} A");

            psu.disable_output()?;
            psu.hide_message()?;
            println!("Output disabled");
            Ok(())
        },
    );

    if let Err(err) = result {
        eprintln!("Session failed: {err}");
        std::process::exit(1);
    }
}
