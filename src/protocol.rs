//! Command frame encoding for the Technic Move hub
//!
//! Every LED and motor command is a fixed 8-byte "port output" frame:
//! ```text
//! [ 0x08 | 0x00 | 0x81 | port | 0x11 | 0x51 | mode | payload ]
//! ```
//! The first three bytes are the frame length, the hub id (always zero) and
//! the port output command class. Byte 3 selects the physical output, bytes
//! 4 and 5 request "set output, absolute mode", byte 6 is the output mode
//! and byte 7 carries the payload (a color code, or a signed motor value as
//! its unsigned byte).
//!
//! Encoding is pure table lookup plus validation. Nothing in this module
//! touches the transport.

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

/// GATT characteristic all command frames are written to
pub const COMMAND_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x00001624_1212_efde_1623_785feabcd123);

/// Advertised name fragment identifying the hub during discovery
pub const DEVICE_NAME: &str = "Technic Move";

/// Size of an LED or motor command frame
pub const FRAME_SIZE: usize = 8;

/// Frame length byte
const FRAME_LEN: u8 = 0x08;
/// Hub id, always zero
const HUB_ID: u8 = 0x00;
/// Port output command class
const PORT_OUTPUT: u8 = 0x81;
/// Set-output subcommand
const SET_OUTPUT: u8 = 0x11;
/// Startup/completion info byte for absolute mode
const STARTUP_INFO: u8 = 0x51;
/// Port id of the RGB status light
const LED_PORT: u8 = 0x3f;
/// Mode byte used by LED frames
const LED_MODE: u8 = 0x00;

/// Lower bound for motor values
pub const MOTOR_VALUE_MIN: i32 = -100;
/// Upper bound for motor values
pub const MOTOR_VALUE_MAX: i32 = 100;

/// Errors from command encoding
///
/// All of these are local validation failures. A caller receiving one can
/// correct its input and retry; the hub was never contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown color '{0}' (available: off, pink, purple, blue, cyan, light_green, green, yellow, orange, red, white)")]
    UnknownColor(String),

    #[error("unknown motor channel '{0}' (available: motor_a, motor_b, motor_c)")]
    UnknownChannel(String),

    #[error("unknown motor mode '{0}' (must be 'power' or 'speed')")]
    UnknownMode(String),

    #[error("motor value {0} out of range ({MOTOR_VALUE_MIN}..={MOTOR_VALUE_MAX})")]
    ValueOutOfRange(i32),
}

/// A fully-formed 8-byte command frame, ready to be written to the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_SIZE]);

impl Frame {
    /// Assemble a port output frame for the given port, mode and payload
    fn port_output(port: u8, mode: u8, payload: u8) -> Self {
        Self([
            FRAME_LEN,
            HUB_ID,
            PORT_OUTPUT,
            port,
            SET_OUTPUT,
            STARTUP_INFO,
            mode,
            payload,
        ])
    }

    /// View the frame as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Copy the frame into an owned buffer for the transport
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0)
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self {
        frame.to_bytes()
    }
}

/// Colors supported by the hub status light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Off,
    Pink,
    Purple,
    Blue,
    Cyan,
    LightGreen,
    Green,
    Yellow,
    Orange,
    Red,
    White,
}

impl Color {
    /// Hub color code
    pub fn code(self) -> u8 {
        match self {
            Color::Off => 0x00,
            Color::Pink => 0x01,
            Color::Purple => 0x02,
            Color::Blue => 0x03,
            Color::Cyan => 0x04,
            Color::LightGreen => 0x05,
            Color::Green => 0x06,
            Color::Yellow => 0x07,
            Color::Orange => 0x08,
            Color::Red => 0x09,
            Color::White => 0x0a,
        }
    }

    /// Parse a case-insensitive color name
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "off" => Some(Color::Off),
            "pink" => Some(Color::Pink),
            "purple" => Some(Color::Purple),
            "blue" => Some(Color::Blue),
            "cyan" => Some(Color::Cyan),
            "light_green" => Some(Color::LightGreen),
            "green" => Some(Color::Green),
            "yellow" => Some(Color::Yellow),
            "orange" => Some(Color::Orange),
            "red" => Some(Color::Red),
            "white" => Some(Color::White),
            _ => None,
        }
    }
}

/// The three motor output channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorChannel {
    A,
    B,
    C,
}

impl MotorChannel {
    /// Hub port id for this channel
    pub fn port(self) -> u8 {
        match self {
            MotorChannel::A => 0x32,
            MotorChannel::B => 0x33,
            MotorChannel::C => 0x34,
        }
    }

    /// Parse a channel name, case-insensitive with spaces treated as
    /// underscores ("motor A" and "motor_a" are the same channel)
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace(' ', "_").as_str() {
            "motor_a" => Some(MotorChannel::A),
            "motor_b" => Some(MotorChannel::B),
            "motor_c" => Some(MotorChannel::C),
            _ => None,
        }
    }
}

/// Motor control modes
///
/// The hub encodes both with the same mode byte; they are kept distinct at
/// the API surface in case the firmware ever starts distinguishing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorMode {
    Power,
    Speed,
}

impl MotorMode {
    /// Mode byte placed in the frame
    pub fn mode_byte(self) -> u8 {
        match self {
            MotorMode::Power => 0x00,
            MotorMode::Speed => 0x00,
        }
    }

    /// Parse a case-insensitive mode name
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "power" => Some(MotorMode::Power),
            "speed" => Some(MotorMode::Speed),
            _ => None,
        }
    }
}

/// Encode a status light command
pub fn encode_led(color_name: &str) -> Result<Frame, CodecError> {
    let color = Color::parse(color_name)
        .ok_or_else(|| CodecError::UnknownColor(color_name.to_owned()))?;
    Ok(Frame::port_output(LED_PORT, LED_MODE, color.code()))
}

/// Encode a motor command with the default motor A polarity correction
pub fn encode_motor(channel: &str, mode: &str, value: i32) -> Result<Frame, CodecError> {
    encode_motor_with_polarity(channel, mode, value, true)
}

/// Encode a motor command
///
/// `correct_polarity` controls the sign inversion applied to motor A. The
/// hub wires that channel in reverse, so the inversion is on by default;
/// pass `false` to send values through unchanged.
pub fn encode_motor_with_polarity(
    channel: &str,
    mode: &str,
    value: i32,
    correct_polarity: bool,
) -> Result<Frame, CodecError> {
    let channel = MotorChannel::parse(channel)
        .ok_or_else(|| CodecError::UnknownChannel(channel.to_owned()))?;
    let mode = MotorMode::parse(mode).ok_or_else(|| CodecError::UnknownMode(mode.to_owned()))?;

    if !(MOTOR_VALUE_MIN..=MOTOR_VALUE_MAX).contains(&value) {
        return Err(CodecError::ValueOutOfRange(value));
    }

    let mut value = value as i8;
    if correct_polarity && channel == MotorChannel::A {
        value = -value;
    }

    // Two's-complement byte; the hub reads it back as signed
    Ok(Frame::port_output(channel.port(), mode.mode_byte(), value as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_frame() {
        let frame = encode_led("red").expect("encode failed");
        assert_eq!(
            frame.as_bytes(),
            &[0x08, 0x00, 0x81, 0x3f, 0x11, 0x51, 0x00, 0x09]
        );
    }

    #[test]
    fn test_led_name_is_case_insensitive() {
        assert_eq!(encode_led("RED"), encode_led("red"));
        assert_eq!(encode_led("Light_Green"), encode_led("light_green"));
    }

    #[test]
    fn test_led_unknown_color() {
        let err = encode_led("chartreuse").unwrap_err();
        assert_eq!(err, CodecError::UnknownColor("chartreuse".into()));
    }

    #[test]
    fn test_color_codes_in_range() {
        let colors = [
            Color::Off,
            Color::Pink,
            Color::Purple,
            Color::Blue,
            Color::Cyan,
            Color::LightGreen,
            Color::Green,
            Color::Yellow,
            Color::Orange,
            Color::Red,
            Color::White,
        ];
        for color in colors {
            assert!(color.code() <= 0x0a);
        }
        // One code per name
        let mut codes: Vec<u8> = colors.iter().map(|c| c.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), colors.len());
    }

    #[test]
    fn test_motor_a_is_inverted() {
        let frame = encode_motor("motor A", "power", 50).expect("encode failed");
        assert_eq!(
            frame.as_bytes(),
            &[0x08, 0x00, 0x81, 0x32, 0x11, 0x51, 0x00, 0xce]
        );
    }

    #[test]
    fn test_motor_b_is_not_inverted() {
        let frame = encode_motor("motor B", "speed", -75).expect("encode failed");
        assert_eq!(
            frame.as_bytes(),
            &[0x08, 0x00, 0x81, 0x33, 0x11, 0x51, 0x00, 0xb5]
        );
    }

    #[test]
    fn test_motor_value_out_of_range() {
        let err = encode_motor("motor C", "power", 150).unwrap_err();
        assert_eq!(err, CodecError::ValueOutOfRange(150));

        let err = encode_motor("motor C", "power", -101).unwrap_err();
        assert_eq!(err, CodecError::ValueOutOfRange(-101));
    }

    #[test]
    fn test_motor_range_bounds_are_accepted() {
        assert!(encode_motor("motor B", "power", 100).is_ok());
        assert!(encode_motor("motor B", "power", -100).is_ok());
        assert!(encode_motor("motor B", "power", 0).is_ok());
    }

    #[test]
    fn test_motor_polarity_override() {
        let frame =
            encode_motor_with_polarity("motor A", "power", 50, false).expect("encode failed");
        assert_eq!(frame.as_bytes()[7], 0x32); // 50, no inversion
    }

    #[test]
    fn test_motor_channel_normalization() {
        assert_eq!(MotorChannel::parse("Motor A"), Some(MotorChannel::A));
        assert_eq!(MotorChannel::parse("MOTOR_B"), Some(MotorChannel::B));
        assert_eq!(MotorChannel::parse("motor c"), Some(MotorChannel::C));
        assert_eq!(MotorChannel::parse("motor d"), None);
    }

    #[test]
    fn test_motor_modes_encode_identically() {
        let power = encode_motor("motor B", "power", 40).expect("encode failed");
        let speed = encode_motor("motor B", "SPEED", 40).expect("encode failed");
        assert_eq!(power, speed);
    }

    #[test]
    fn test_motor_unknown_channel_and_mode() {
        assert_eq!(
            encode_motor("motor d", "power", 10).unwrap_err(),
            CodecError::UnknownChannel("motor d".into())
        );
        assert_eq!(
            encode_motor("motor a", "torque", 10).unwrap_err(),
            CodecError::UnknownMode("torque".into())
        );
    }

    #[test]
    fn test_frame_into_bytes() {
        let frame = encode_led("blue").expect("encode failed");
        let bytes: Bytes = frame.into();
        assert_eq!(&bytes[..], frame.as_bytes());
        assert_eq!(bytes.len(), FRAME_SIZE);
    }
}
