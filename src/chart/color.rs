use serde::{Serialize, Serializer};

use crate::aggregation::DayPart;

/// An opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel.
    pub red: u8,
    /// Green channel.
    pub green: u8,
    /// Blue channel.
    pub blue: u8,
}

impl Color {
    /// Neutral grey for placeholder series.
    pub const PLACEHOLDER: Color = Color::rgb(200, 200, 200);

    /// A colour from its channels.
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// A colour derived from the MD5 digest of `key`.
    ///
    /// The same key always maps to the same colour.
    pub fn for_key(key: &str) -> Self {
        let md5::Digest(bytes) = md5::compute(key.as_bytes());

        Self::rgb(bytes[0], bytes[1], bytes[2])
    }

    /// The colour as a CSS hex string, e.g. `#ff6384`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// How a chart picks colours for its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Palette {
    /// A colour hashed from each key.
    #[default]
    Hashed,
    /// The fixed day-part colours, hashing any other key.
    DayParts,
}

impl Palette {
    /// The colour `key` is drawn with.
    pub fn color_for(self, key: &str) -> Color {
        match self {
            Self::Hashed => Color::for_key(key),
            Self::DayParts => DayPart::ALL
                .into_iter()
                .find(|part| part.label() == key)
                .map_or_else(|| Color::for_key(key), day_part_color),
        }
    }
}

fn day_part_color(part: DayPart) -> Color {
    match part {
        DayPart::Morning => Color::rgb(0xFF, 0x63, 0x84),
        DayPart::Afternoon => Color::rgb(0x36, 0xA2, 0xEB),
        DayPart::Night => Color::rgb(0xFF, 0xCE, 0x56),
    }
}
