//! Our error types for the Keithley 2308.

use core::num::ParseFloatError;

use thiserror::Error;

use crate::display::MessageError;

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Errors raised while driving the instrument.
///
/// `E` is the error type of the [`Channel`](crate::channel::Channel) the instrument talks through.
/// Nothing in this crate retries, every failure is handed straight back to the caller.
#[derive(Error, Debug)]
pub enum Error<E> {
    /// A write or query failed at the channel.
    #[error("Channel transport error")]
    Transport(E),
    /// The instrument answered a measurement query with something that isn't a number.
    #[error("Malformed measurement response: {source}")]
    Parse { source: ParseFloatError },
    /// A display message was rejected before anything was written.
    #[error("Display message rejected: {0}")]
    InvalidMessage(MessageError),
    /// A rendered command did not fit into its buffer.
    #[error("Command exceeds the command buffer")]
    CommandOverflow,
}

impl<E> From<ParseFloatError> for Error<E> {
    fn from(source: ParseFloatError) -> Self {
        Error::Parse { source }
    }
}

impl<E> From<MessageError> for Error<E> {
    fn from(err: MessageError) -> Self {
        Error::InvalidMessage(err)
    }
}
