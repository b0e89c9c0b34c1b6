//! The message based link to the instrument.
//!
//! [`Channel`] is all the driver needs: write a command, or write a command and read back one
//! response line. [`SerialChannel`] provides it on top of any [`embedded_io`] byte stream, e.g.
//! a serial port wired to a GPIB-USB bridge.

use core::fmt;

use embedded_io::Error as _;
use thiserror::Error;

/// Longest response we accept from a query.
pub const RESPONSE_CAPACITY: usize = 64;

pub type Response = heapless::String<RESPONSE_CAPACITY>;

/// Blocking write/query access to one instrument.
///
/// Implementations must deliver commands in the order they are written.
pub trait Channel {
    type Error: fmt::Debug;

    /// Send a command which produces no response.
    fn write(&mut self, command: &str) -> Result<(), Self::Error>;

    /// Send a command and return the instrument's response.
    fn query(&mut self, command: &str) -> Result<Response, Self::Error>;

    /// Release the session. Called once when the driver is closed.
    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Errors from a [`SerialChannel`].
#[derive(Error, Debug)]
pub enum SerialError<I: embedded_io::Error> {
    #[error("Serial communication error")]
    Io(I),
    #[error("Response exceeded the receive buffer")]
    BufferOverflow,
    #[error("Response is not valid UTF-8")]
    InvalidUtf8,
    #[error("Instrument closed the connection without responding")]
    NoResponse,
}

/// You can create a SerialChannel using any interface which implements [embedded_io::Read] & [embedded_io::Write].
///
/// `L` is the size of the receive buffer for a single response line.
pub struct SerialChannel<S: embedded_io::Read + embedded_io::Write, const L: usize = 128> {
    interface: S,
    /// Appended to every command and expected at the end of every response. Default is `"\n"`.
    terminator: &'static str,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> SerialChannel<S, L> {
    pub fn new(interface: S) -> Self {
        Self {
            interface,
            terminator: "\n",
        }
    }

    /// Use a different line terminator, e.g. `"\r\n"`.
    pub fn with_terminator(mut self, terminator: &'static str) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn interface(&self) -> &S {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut S {
        &mut self.interface
    }

    pub fn into_inner(self) -> S {
        self.interface
    }

    fn send(&mut self, command: &str) -> Result<(), SerialError<S::Error>> {
        self.interface
            .write_all(command.as_bytes())
            .map_err(SerialError::Io)?;
        self.interface
            .write_all(self.terminator.as_bytes())
            .map_err(SerialError::Io)?;
        self.interface.flush().map_err(SerialError::Io)
    }

    /// Read one line, without its terminator.
    fn receive(&mut self) -> Result<Response, SerialError<S::Error>> {
        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let terminator = self.terminator.as_bytes();

        // One byte at a time so nothing past the terminator is consumed.
        let mut byte = [0u8; 1];
        loop {
            match self.interface.read(&mut byte) {
                Ok(0) => {
                    if buff.is_empty() {
                        return Err(SerialError::NoResponse);
                    }
                    break;
                }
                Ok(_) => {
                    buff.push(byte[0]).map_err(|_| SerialError::BufferOverflow)?;
                    if buff.ends_with(terminator) {
                        buff.truncate(buff.len() - terminator.len());
                        break;
                    }
                }
                Err(e) => {
                    // A timeout after some data means the instrument didn't terminate its line.
                    if matches!(
                        e.kind(),
                        embedded_io::ErrorKind::Other | embedded_io::ErrorKind::TimedOut
                    ) && !buff.is_empty()
                    {
                        break;
                    }
                    return Err(SerialError::Io(e));
                }
            }
        }

        let text = core::str::from_utf8(&buff).map_err(|_| SerialError::InvalidUtf8)?;
        let mut response = Response::new();
        response
            .push_str(text)
            .map_err(|_| SerialError::BufferOverflow)?;
        Ok(response)
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> Channel for SerialChannel<S, L> {
    type Error = SerialError<S::Error>;

    fn write(&mut self, command: &str) -> Result<(), Self::Error> {
        self.send(command)
    }

    fn query(&mut self, command: &str) -> Result<Response, Self::Error> {
        self.send(command)?;
        self.receive()
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.interface.flush().map_err(SerialError::Io)
    }
}

/// Primary GPIB address of the instrument. The 2308 ships set to 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpibAddress(u8);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("GPIB primary address {0} is outside 0..={max}", max = GpibAddress::MAX)]
pub struct AddressError(pub u8);

impl GpibAddress {
    pub const DEFAULT: Self = Self(16);
    pub const MAX: u8 = 30;

    pub const fn new(primary: u8) -> Result<Self, AddressError> {
        if primary > Self::MAX {
            Err(AddressError(primary))
        } else {
            Ok(Self(primary))
        }
    }

    pub const fn primary(self) -> u8 {
        self.0
    }
}

impl Default for GpibAddress {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for GpibAddress {
    type Error = AddressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Renders the VISA resource name, e.g. `GPIB0::16::INSTR`.
impl fmt::Display for GpibAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIB0::{}::INSTR", self.0)
    }
}
