//! Payload encodings for the metadata atoms the engine writes.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, WriteBytesExt};

use crate::{fourcc::FourCC, path::AtomPath};

/// ISO-639-2 code used for every string the engine writes.
pub const DEFAULT_LANGUAGE: &str = "und";

/// Class word marking iTunes/3GPP `data` payloads as UTF-8 text.
pub const TEXT_FLAGS: u32 = 1;

/// Locations of the tags each dialect writes, as chains of atom names.
pub mod paths {
    use crate::kind::constants as c;

    pub type Names = &'static [[u8; 4]];

    pub const ISO_TITLE: Names = &[c::MOOV, c::UDTA, c::META, c::TITL];
    pub const ISO_DESCRIPTION: Names = &[c::MOOV, c::UDTA, c::META, c::DSCP];
    pub const ISO_AUTHOR: Names = &[c::MOOV, c::UDTA, c::META, c::AUTH];
    pub const ISO_LOCATION: Names = &[c::MOOV, c::UDTA, c::META, c::LOCI];
    pub const ITUNES_TITLE: Names = &[c::MOOV, c::UDTA, c::META, c::ILST, c::ITUNES_NAME];
    pub const ITUNES_COMMENT: Names = &[c::MOOV, c::UDTA, c::META, c::ILST, c::ITUNES_COMMENT];
    pub const ITUNES_ARTIST: Names = &[c::MOOV, c::UDTA, c::META, c::ILST, c::ITUNES_ARTIST];
    pub const USER_DATA: Names = &[c::MOOV, c::UDTA];
    pub const XMP: Names = &[c::MOOV, c::UDTA, c::XMP];
}

/// Builds an [`AtomPath`] from one of the non-empty chains in [`paths`].
pub(crate) fn known_path(names: paths::Names) -> AtomPath {
    AtomPath(names.iter().copied().map(FourCC).collect())
}

/// Packs a three-letter ISO-639-2 code into the 15-bit form used by 3GPP boxes.
pub fn pack_language(code: &str) -> u16 {
    code.bytes()
        .take(3)
        .fold(0u16, |acc, c| (acc << 5) | (u16::from(c.wrapping_sub(0x60)) & 0x1f))
}

/// Encodes a 3GPP user-data string (`auth`, and friends): version/flags,
/// packed language and NUL-terminated UTF-8 text.
pub fn encode_user_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(7 + text.len());
    let _ = out.write_u32::<BigEndian>(0);
    let _ = out.write_u16::<BigEndian>(pack_language(DEFAULT_LANGUAGE));
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    out
}

/// A textual place, as written into `loci`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Geotag {
    pub country: String,
    pub city: String,
    pub district: String,
}

impl Geotag {
    pub fn new<S: Into<String>>(country: S, city: S, district: S) -> Geotag {
        Geotag {
            country: country.into(),
            city: city.into(),
            district: district.into(),
        }
    }

    /// The place name, most specific part first, with empty parts left out.
    pub fn place_name(&self) -> String {
        [&self.district, &self.city, &self.country]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Geotag {
    type Err = std::convert::Infallible;

    /// Parses `country,city,district`. Missing parts are left empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ',').map(|x| x.trim().to_string());
        Ok(Geotag {
            country: parts.next().unwrap_or_default(),
            city: parts.next().unwrap_or_default(),
            district: parts.next().unwrap_or_default(),
        })
    }
}

impl fmt::Display for Geotag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.country, self.city, self.district)
    }
}

/// A position in decimal degrees and metres.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseGpsError {
    #[error("expected `latitude,longitude[,altitude]`")]
    Format,
    #[error("invalid number `{0}`")]
    Number(String),
    #[error("coordinate out of range")]
    Range,
}

impl FromStr for GpsPosition {
    type Err = ParseGpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|x| {
                let x = x.trim();
                x.parse::<f64>()
                    .map_err(|_| ParseGpsError::Number(x.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (latitude, longitude, altitude) = match values[..] {
            [lat, lon] => (lat, lon, 0.0),
            [lat, lon, alt] => (lat, lon, alt),
            _ => return Err(ParseGpsError::Format),
        };
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ParseGpsError::Range);
        }
        Ok(GpsPosition {
            latitude,
            longitude,
            altitude,
        })
    }
}

impl fmt::Display for GpsPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.latitude, self.longitude, self.altitude)
    }
}

/// Converts to signed 16.16 fixed point, saturating at the type's range.
fn fixed_16_16(value: f64) -> i32 {
    let scaled = (value * 65536.0).round();
    if scaled >= f64::from(i32::MAX) {
        i32::MAX
    } else if scaled <= f64::from(i32::MIN) {
        i32::MIN
    } else {
        scaled as i32
    }
}

/// Encodes the body of a 3GPP `loci` box.
pub fn encode_location(geotag: &Geotag, position: Option<GpsPosition>) -> Vec<u8> {
    let name = geotag.place_name();
    let position = position.unwrap_or_default();

    let mut out = Vec::with_capacity(32 + name.len());
    let _ = out.write_u32::<BigEndian>(0);
    let _ = out.write_u16::<BigEndian>(pack_language(DEFAULT_LANGUAGE));
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    // Role 0 is "shooting location".
    out.push(0);
    let _ = out.write_i32::<BigEndian>(fixed_16_16(position.longitude));
    let _ = out.write_i32::<BigEndian>(fixed_16_16(position.latitude));
    let _ = out.write_i32::<BigEndian>(fixed_16_16(position.altitude));
    out.extend_from_slice(b"earth\0");
    // Additional notes.
    out.push(0);
    out
}
