//! SONiX USB keyboard lighting control.
//!
//! Lighting is configured with a single 64 byte output report. Only the key color and the two
//! indicator color codes change between commands, every other byte is replayed from a captured
//! "all keys white" report.

use std::str::FromStr;

use bytes::{Bytes, BytesMut};

use crate::{Config, Rgb};

pub const VENDOR_ID: u16 = 0x0c45;
pub const PRODUCT_ID: u16 = 0x8508;

/// Usage of the vendor interface accepting lighting reports.
pub const USAGE: u16 = 146;
pub const USAGE_PAGE: u16 = 65308;

pub const PACKET_LEN: usize = 64;

const KEY_RED: usize = 14;
const KEY_GREEN: usize = 15;
const KEY_BLUE: usize = 16;
const LINE_COLOR: usize = 28;
const VOLUME_COLOR: usize = 30;

/// Captured lighting report with white keys.
#[rustfmt::skip]
pub const TEMPLATE: [u8; PACKET_LEN] = [
    0x04, 0x3b, 0x04, 0x06, 0x22, 0x00, 0x00, 0x00,
    0x00, 0x06, 0x03, 0x01, 0xfa, 0x00, 0xff, 0xff,
    0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x04, 0x06, 0x00, 0x08, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Special index used when none or an invalid one is given (purple).
pub const DEFAULT_SPECIAL: u8 = 5;

/// Indicator color codes for the light bar and the volume knob.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct SpecialColor {
    pub name: &'static str,
    /// Light bar code, one of `1..=8` or `10`.
    pub line: u8,
    /// Volume knob code, one of `1..=9`.
    pub volume: u8,
}

/// Coordinated indicator colors, indexed by special index.
const SPECIAL_COLORS: [SpecialColor; 8] = [
    SpecialColor { name: "off", line: 8, volume: 9 },
    SpecialColor { name: "orange", line: 1, volume: 3 },
    SpecialColor { name: "yellow", line: 2, volume: 4 },
    SpecialColor { name: "green", line: 3, volume: 5 },
    SpecialColor { name: "light blue", line: 4, volume: 6 },
    SpecialColor { name: "purple", line: 6, volume: 8 },
    SpecialColor { name: "red", line: 10, volume: 2 },
    SpecialColor { name: "dark blue", line: 5, volume: 7 },
];

impl SpecialColor {
    /// Look up the indicator colors for a special index.
    ///
    /// Indices outside the table resolve to the default purple theme.
    pub fn from_index(index: u8) -> Self {
        SPECIAL_COLORS
            .get(usize::from(index))
            .copied()
            .unwrap_or(SPECIAL_COLORS[usize::from(DEFAULT_SPECIAL)])
    }
}

/// Parse a special index from user input.
///
/// Anything but a plain decimal literal in `0..=7` yields [`DEFAULT_SPECIAL`].
pub fn parse_special_index(input: Option<&str>) -> u8 {
    let input = match input {
        Some(input) => input.trim(),
        None => return DEFAULT_SPECIAL,
    };

    if input.is_empty() || !input.bytes().all(|byte| byte.is_ascii_digit()) {
        return DEFAULT_SPECIAL;
    }

    match u8::from_str(input) {
        Ok(index) if usize::from(index) < SPECIAL_COLORS.len() => index,
        _ => DEFAULT_SPECIAL,
    }
}

/// Pick the special index whose indicator colors fit a key color best.
pub(crate) fn theme_for_color(color: Rgb) -> u8 {
    let Rgb { r, g, b } = color;

    if g > r && g > b && g > 200 {
        3
    } else if r > g && b > g && (i16::from(r) - i16::from(b)).abs() < 50 {
        5
    } else if r > g && r > b && r > 200 {
        6
    } else if b > r && b > g && b > 200 {
        7
    } else if r > 200 && g > 200 && b < 100 {
        2
    } else if r > 200 && g > 100 && g < 200 && b < 100 {
        1
    } else {
        DEFAULT_SPECIAL
    }
}

/// Overlay key and indicator colors onto the report template.
pub(crate) fn command_packet(color: Rgb, special: SpecialColor) -> Bytes {
    let mut buf = BytesMut::from(&TEMPLATE[..]);

    // Key color.
    buf[KEY_RED] = color.r;
    buf[KEY_GREEN] = color.g;
    buf[KEY_BLUE] = color.b;

    // Indicator colors.
    buf[LINE_COLOR] = special.line;
    buf[VOLUME_COLOR] = special.volume;

    buf.freeze()
}

/// Convert a lighting config to its report.
pub(crate) fn build(config: &Config) -> Bytes {
    let color = config.color.scale(config.intensity);
    command_packet(color, SpecialColor::from_index(config.special))
}
