//! SONiX keyboard RGB CLI tool
//!
//! Controls key backlight, light bar and volume knob colors of the SONiX USB keyboard
//! (VID 0x0c45, PID 0x8508) through its reverse-engineered lighting report.

use std::fmt::{self, Display, Formatter};
use std::num::ParseIntError;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{crate_description, crate_name, crate_version, Arg, ArgAction, ArgMatches, Command};
use hidapi::HidApi;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::session::{Acknowledgment, DeviceSession};

mod controller;
mod error;
mod session;
mod sonix;

/// Key colors accepted by name.
const NAMED_COLORS: [(&str, Rgb); 12] = [
    ("red", Rgb { r: 255, g: 0, b: 0 }),
    ("green", Rgb { r: 0, g: 255, b: 0 }),
    ("blue", Rgb { r: 0, g: 0, b: 255 }),
    ("white", Rgb { r: 255, g: 255, b: 255 }),
    ("black", Rgb { r: 0, g: 0, b: 0 }),
    ("yellow", Rgb { r: 255, g: 255, b: 0 }),
    ("cyan", Rgb { r: 0, g: 255, b: 255 }),
    ("magenta", Rgb { r: 255, g: 0, b: 255 }),
    ("orange", Rgb { r: 255, g: 165, b: 0 }),
    ("purple", Rgb { r: 128, g: 0, b: 128 }),
    ("pink", Rgb { r: 255, g: 192, b: 203 }),
    ("off", Rgb { r: 0, g: 0, b: 0 }),
];

/// RGB color.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
struct Rgb {
    r: u8,
    g: u8,
    b: u8,
}

impl Rgb {
    const WHITE: Self = Self { r: 0xff, g: 0xff, b: 0xff };

    /// Dim all channels to a percentage of their value.
    fn scale(self, intensity: Intensity) -> Self {
        let scale = |channel: u8| (u16::from(channel) * u16::from(intensity.0) / 100) as u8;
        Self { r: scale(self.r), g: scale(self.g), b: scale(self.b) }
    }
}

impl FromStr for Rgb {
    type Err = ();

    /// Parse `#RRGGBB`, `R,G,B` or a color name.
    fn from_str(s: &str) -> Result<Rgb, ()> {
        let s = s.trim().to_lowercase();

        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
                return Err(());
            }

            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ());
            return Ok(Rgb { r: channel(0)?, g: channel(2)?, b: channel(4)? });
        }

        if s.contains(',') {
            let channels = s
                .split(',')
                .map(|channel| u8::from_str(channel.trim()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| ())?;

            return match channels[..] {
                [r, g, b] => Ok(Rgb { r, g, b }),
                _ => Err(()),
            };
        }

        NAMED_COLORS.iter().find(|(name, _)| *name == s).map(|(_, color)| *color).ok_or(())
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parse a key color, returning `None` for anything malformed.
fn parse_key_color(input: Option<&str>) -> Option<Rgb> {
    input.and_then(|input| Rgb::from_str(input).ok())
}

/// Key brightness in percent.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
struct Intensity(u8);

impl Intensity {
    /// Create an intensity, clamping to `0..=100`.
    fn new(percent: i64) -> Self {
        Self(percent.clamp(0, 100) as u8)
    }

    const fn max_value() -> Self {
        Self(100)
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self::max_value()
    }
}

impl FromStr for Intensity {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Intensity::new(i64::from_str(s.trim())?))
    }
}

impl Display for Intensity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// New lighting config.
#[derive(PartialEq, Eq, Debug)]
struct Config {
    color: Rgb,
    intensity: Intensity,
    special: u8,
}

impl Config {
    /// Resolve user input, substituting defaults for anything unparsable.
    fn new(key_color: Option<&str>, intensity: Intensity, special: Option<&str>) -> Self {
        let color = parse_key_color(key_color).unwrap_or_else(|| {
            debug!(?key_color, "using default key color");
            Rgb::WHITE
        });

        Self { color, intensity, special: sonix::parse_special_index(special) }
    }

    fn from_cli(matches: &ArgMatches) -> Self {
        let mut intensity = Intensity::default();
        replace_from_str(&mut intensity, matches, "intensity");

        let mut config = Config::new(
            matches.get_one::<String>("color").map(String::as_str),
            intensity,
            matches.get_one::<String>("special").map(String::as_str),
        );

        if matches.get_flag("match-special") {
            config.special = sonix::theme_for_color(config.color);
        }

        config
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' {} {}", crate_name!(), self.color, self.intensity, self.special)
    }
}

fn main() -> ExitCode {
    let matches = cli();
    init_logging(matches.get_flag("verbose"));

    match matches.subcommand_matches("list") {
        Some(list) => list_devices(list.get_flag("all")),
        None => apply(&matches),
    }
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Apply a lighting config to the keyboard.
fn apply(matches: &ArgMatches) -> ExitCode {
    let config = Config::from_cli(matches);
    let special = sonix::SpecialColor::from_index(config.special);

    println!("Keys:    {} ({}%)", config.color, config.intensity);
    println!(
        "Special: {} ({}, line={}, volume={})\n",
        config.special,
        special.name,
        special.line,
        special.volume,
    );

    let mut session = match DeviceSession::connect() {
        Ok(session) => session,
        Err(err) => {
            eprintln!("\x1b[31mError:\x1b[0m {err}");
            eprintln!(
                "Check that the SONiX keyboard (VID: {:04x}, PID: {:04x}) is connected.",
                sonix::VENDOR_ID,
                sonix::PRODUCT_ID
            );
            return ExitCode::FAILURE;
        },
    };

    let identity = session.identity();
    println!("Connected to device:");
    println!("Manufacturer: {}", identity.manufacturer.as_deref().unwrap_or("N/A"));
    println!("Product: {}\n", identity.product.as_deref().unwrap_or("N/A"));

    let result = session.send(&sonix::build(&config));
    session.disconnect();

    match result {
        Ok(ack) => {
            match ack {
                Acknowledgment::Received(report) => {
                    debug!(len = report.len(), "device acknowledged lighting report")
                },
                Acknowledgment::Missing => debug!("device did not acknowledge lighting report"),
            }

            println!("\x1b[32mSuccessfully applied changes.\x1b[0m");
            println!("To reapply this config, you can run the following command:\n\n{}", config);
            ExitCode::SUCCESS
        },
        Err(err) => {
            eprintln!("\x1b[31mError:\x1b[0m {err}");
            ExitCode::FAILURE
        },
    }
}

/// Print the enumerated HID interfaces, marking the lighting interface.
fn list_devices(all: bool) -> ExitCode {
    let api = match HidApi::new() {
        Ok(api) => api,
        Err(err) => {
            eprintln!("\x1b[31mError:\x1b[0m unable to access HID: {err}");
            return ExitCode::FAILURE;
        },
    };

    let devices = session::enumerate(&api, all);
    if devices.is_empty() {
        println!(
            "No HID interfaces found for VID {:04x}, PID {:04x}.",
            sonix::VENDOR_ID,
            sonix::PRODUCT_ID
        );
    }

    for device in &devices {
        let marker = if device.is_lighting_interface() { "\x1b[32m*\x1b[0m" } else { " " };
        println!(
            "{} {:04x}:{:04x} usage page {:#06x} usage {:#06x} interface {}",
            marker,
            device.vendor_id,
            device.product_id,
            device.usage_page,
            device.usage,
            device.interface_number
        );
        println!("    Manufacturer: {}", device.manufacturer.as_deref().unwrap_or("N/A"));
        println!("    Product: {}", device.product.as_deref().unwrap_or("N/A"));
        println!("    Path: {}", device.path.to_string_lossy());
    }

    if devices.iter().any(|device| device.is_lighting_interface()) {
        ExitCode::SUCCESS
    } else {
        eprintln!("\x1b[31mLighting interface not found.\x1b[0m");
        ExitCode::FAILURE
    }
}

/// Get clap CLI parameters.
fn cli() -> ArgMatches {
    command().get_matches()
}

/// Build the clap CLI definition.
fn command() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .args_conflicts_with_subcommands(true)
        .subcommand(
            Command::new("list").about("List HID interfaces of the keyboard").arg(
                Arg::new("all")
                    .help("List every HID interface")
                    .long("all")
                    .short('a')
                    .action(ArgAction::SetTrue),
            ),
        )
        .arg(
            Arg::new("color")
                .help("Key color [#RRGGBB, R,G,B or name; default: white]")
                .value_name("KEY_COLOR")
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("intensity")
                .help("Key intensity [possible values: 0..=100; default: 100]")
                .value_name("KEY_INTENSITY")
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("special")
                .help(
                    "Light bar and volume knob colors [possible values: 0=off, 1=orange, \
                     2=yellow, 3=green, 4=light blue, 5=purple, 6=red, 7=dark blue; default: 5]",
                )
                .value_name("SPECIAL")
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("match-special")
                .help("Pick light bar and volume knob colors matching the key color")
                .long("match-special")
                .short('m')
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .help("Print debug logs")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue),
        )
}

/// Convert a CLI option from the parameter string.
#[inline]
fn cli_from_str<T>(matches: &ArgMatches, name: &str) -> Option<Result<T, <T as FromStr>::Err>>
where
    T: FromStr,
{
    matches.get_one::<String>(name).map(|value| T::from_str(value))
}

/// Replace config value with the CLI parameter if it is present and valid.
#[inline]
fn replace_from_str<T: FromStr>(option: &mut T, matches: &ArgMatches, name: &str) {
    if let Some(Ok(value)) = cli_from_str(matches, name) {
        *option = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Config {
        let args = std::iter::once("sonix-rgb").chain(args.iter().copied());
        Config::from_cli(&command().try_get_matches_from(args).unwrap())
    }

    #[test]
    fn cli_definition_is_valid() {
        command().debug_assert();
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_key_color(Some("#ff0000")), Some(Rgb { r: 255, g: 0, b: 0 }));
        assert_eq!(parse_key_color(Some("#1A2b3C")), Some(Rgb { r: 0x1a, g: 0x2b, b: 0x3c }));
        assert_eq!(parse_key_color(Some(" #000000 ")), Some(Rgb { r: 0, g: 0, b: 0 }));

        for input in ["ff0000", "#ff00", "#ff00000", "#gg0000", "#+f0000", "0xff0000", "#"].iter()
        {
            assert_eq!(parse_key_color(Some(*input)), None, "input {:?}", input);
        }
    }

    #[test]
    fn decimal_triples() {
        assert_eq!(parse_key_color(Some("255,0,0")), Some(Rgb { r: 255, g: 0, b: 0 }));
        assert_eq!(parse_key_color(Some(" 10 , 20,30 ")), Some(Rgb { r: 10, g: 20, b: 30 }));

        for input in ["256,0,0", "-1,0,0", "1,2", "1,2,3,4", "a,b,c", "1,,2", ","].iter() {
            assert_eq!(parse_key_color(Some(*input)), None, "input {:?}", input);
        }
    }

    #[test]
    fn color_names() {
        let required = [
            "red", "green", "blue", "white", "black", "yellow", "cyan", "magenta", "orange",
            "purple", "pink", "off",
        ];
        for name in required.iter() {
            assert!(parse_key_color(Some(*name)).is_some(), "missing color {}", name);
        }

        assert_eq!(parse_key_color(Some("Blue")), Some(Rgb { r: 0, g: 0, b: 255 }));
        assert_eq!(parse_key_color(Some("orange")), Some(Rgb { r: 255, g: 165, b: 0 }));
        assert_eq!(parse_key_color(Some("chartreuse")), None);
        assert_eq!(parse_key_color(Some("")), None);
        assert_eq!(parse_key_color(None), None);
    }

    #[test]
    fn intensity_scaling() {
        let color = Rgb { r: 255, g: 128, b: 1 };
        assert_eq!(color.scale(Intensity::new(100)), color);
        assert_eq!(color.scale(Intensity::new(0)), Rgb::default());
        assert_eq!(Rgb { r: 0, g: 0, b: 255 }.scale(Intensity::new(50)).b, 127);

        for percent in 0..=100 {
            let scaled = color.scale(Intensity::new(percent));
            assert!(scaled.r <= color.r && scaled.g <= color.g && scaled.b <= color.b);
            assert_eq!(u32::from(scaled.r), 255 * percent as u32 / 100);
        }
    }

    #[test]
    fn intensity_clamps() {
        assert_eq!(Intensity::new(250), Intensity(100));
        assert_eq!(Intensity::new(-5), Intensity(0));
        assert_eq!(Intensity::from_str("42"), Ok(Intensity(42)));
        assert!(Intensity::from_str("bright").is_err());
        assert_eq!(Rgb::WHITE.scale(Intensity::new(250)), Rgb::WHITE);
    }

    #[test]
    fn defaults_without_arguments() {
        assert_eq!(
            config(&[]),
            Config { color: Rgb::WHITE, intensity: Intensity(100), special: 5 }
        );
    }

    #[test]
    fn positional_arguments() {
        assert_eq!(
            config(&["blue", "50", "1"]),
            Config { color: Rgb { r: 0, g: 0, b: 255 }, intensity: Intensity(50), special: 1 }
        );
        assert_eq!(config(&["#ff0000", "100", "8"]).special, 5);
        assert_eq!(config(&["red", "-20"]).intensity, Intensity(0));
        assert_eq!(config(&["red", "-20", "-1"]).special, 5);
    }

    #[test]
    fn invalid_arguments_fall_back() {
        assert_eq!(
            config(&["nonsense", "loud", "purple"]),
            Config { color: Rgb::WHITE, intensity: Intensity(100), special: 5 }
        );
    }

    #[test]
    fn match_special_uses_key_color() {
        assert_eq!(config(&["-m", "red", "10", "1"]).special, 6);
        assert_eq!(config(&["--match-special", "0,255,0"]).special, 3);
    }

    #[test]
    fn list_subcommand() {
        let matches = command().try_get_matches_from(["sonix-rgb", "list", "--all"]).unwrap();
        let list = matches.subcommand_matches("list").unwrap();
        assert!(list.get_flag("all"));

        let matches = command().try_get_matches_from(["sonix-rgb", "-v", "list"]).unwrap();
        assert!(matches.get_flag("verbose"));
    }

    #[test]
    fn reapply_command() {
        let config = config(&["255,165,0", "75", "7"]);
        assert_eq!(config.to_string(), "sonix-rgb '#ffa500' 75 7");
    }

    #[test]
    fn hyphenated_garbage_falls_back() {
        assert_eq!(
            config(&["-1,0,0", "-abc", "-x"]),
            Config { color: Rgb::WHITE, intensity: Intensity(100), special: 5 }
        );
        assert_eq!(config(&["red", "50", "--nope"]).special, 5);

        let config = config(&["-m", "red", "-20"]);
        assert_eq!((config.intensity, config.special), (Intensity(0), 6));
    }
}
