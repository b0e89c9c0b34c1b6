//! Text shown on the 2308's front panel.

use thiserror::Error;

/// Characters the front panel can show at once.
pub const DISPLAY_WIDTH: usize = 32;

/// Shown by [`Keithley2308::show_default_message`](crate::psu::Keithley2308::show_default_message).
pub const DEFAULT_MESSAGE: &str = "TEST IN PROGRESS!!!!!!!!!!!!!!!!";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageError {
    #[error("Message is {length} characters long, the display holds {max}", max = DISPLAY_WIDTH)]
    TooLong { length: usize },
    #[error("Character {character:?} at position {position} can't be shown")]
    InvalidCharacter { position: usize, character: char },
}

/// A message which is known to fit the front panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    text: heapless::String<DISPLAY_WIDTH>,
}

impl DisplayMessage {
    /// Validate `text` for the display.
    ///
    /// Letters, digits, spaces and ASCII punctuation are accepted, except `"` which would end
    /// the quoted command argument early.
    pub fn new(text: &str) -> Result<Self, MessageError> {
        if let Some((position, character)) = text
            .chars()
            .enumerate()
            .find(|(_, c)| !is_displayable(*c))
        {
            return Err(MessageError::InvalidCharacter {
                position,
                character,
            });
        }

        let length = text.len();
        let mut message: heapless::String<DISPLAY_WIDTH> = heapless::String::new();
        message
            .push_str(text)
            .map_err(|_| MessageError::TooLong { length })?;
        Ok(Self { text: message })
    }

    /// A full width of spaces, which is what the panel shows after a reset.
    pub fn blank() -> Self {
        let mut text: heapless::String<DISPLAY_WIDTH> = heapless::String::new();
        for _ in 0..DISPLAY_WIDTH {
            // Exactly fills the capacity.
            let _ = text.push(' ');
        }
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Default for DisplayMessage {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE).unwrap_or_else(|_| Self::blank())
    }
}

impl TryFrom<&str> for DisplayMessage {
    type Error = MessageError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Can `character` be written to the display?
pub fn is_displayable(character: char) -> bool {
    character.is_ascii_alphanumeric()
        || character == ' '
        || (character.is_ascii_punctuation() && character != '"')
}
