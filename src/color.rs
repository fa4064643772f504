use std::str::FromStr;

use crate::errors::ParseError;

/// Represents an RGB combo color.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Color {
    /// red from 0-255
    pub red: u8,

    /// green from 0-255
    pub green: u8,

    /// blue from 0-255
    pub blue: u8,
}

impl Color {
    /// Create a new color from the respective parts
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Color { red, green, blue }
    }
}

impl FromStr for Color {
    type Err = ParseError;

    /// Parses the value side of a `Combo<N> : r,g,b` line.
    fn from_str(input: &str) -> Result<Color, Self::Err> {
        let mut parts = input.split(',').map(str::trim);
        let mut next = || {
            parts
                .next()
                .ok_or(ParseError::InvalidColorComponent)
                .and_then(|c| c.parse::<u8>().map_err(ParseError::from))
        };
        Ok(Color::new(next()?, next()?, next()?))
    }
}
