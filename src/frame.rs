//! Wire frame format for the Carrier Infinity / Bryant Evolution RS-485 bus.
//!
//! A frame is an 8-byte header, zero or more payload bytes, and a 2-byte
//! little-endian CRC-16 trailer:
//!
//! ```text
//! dest(2) source(2) length(1) pid(1) ext(1) func(1) data(length) crc(2)
//! ```
//!
//! `length` is the payload length only; the full on-wire frame is
//! `length + 10` bytes. `pid` and `ext` are always zero in observed traffic
//! but are preserved on the wire.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::crc;
use crate::error::{FinitudeError, Result};
use crate::registers::{self, DecodedRegister};

/// Number of header bytes preceding the payload (dest, source, length, pid, ext, func).
pub const HEADER_LEN: usize = 8;
/// Number of CRC trailer bytes.
pub const CRC_LEN: usize = 2;
/// Minimum complete frame length (empty payload).
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CRC_LEN;

/// A two-byte bus address: device class in the high byte, bus number (always
/// 1 in observed traffic) in the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u16);

impl Address {
    pub fn from_bytes(b: [u8; 2]) -> Self {
        Address(u16::from_be_bytes(b))
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Parse a 4-hex-digit address such as `"2001"`.
    pub fn from_hex_str(s: &str) -> Result<Self> {
        if s.len() != 4 {
            return Err(FinitudeError::InvalidAddress(s.to_string()));
        }
        let value = u16::from_str_radix(s, 16)
            .map_err(|_| FinitudeError::InvalidAddress(s.to_string()))?;
        Ok(Address(value))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Known bus functions. Only `ACK06`, `READ`, `WRITE`, and `NACK` have been
/// observed in the wild; the remainder are documented by the protocol but
/// unconfirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Function {
    Ack02 = 0x02,
    Ack06 = 0x06,
    Read = 0x0b,
    Write = 0x0c,
    Nack = 0x15,
    ChgTbn = 0x10,
    Alarm = 0x1e,
    RdObj = 0x22,
    RdVar = 0x62,
    Force = 0x63,
    Auto = 0x64,
    List = 0x75,
}

impl Function {
    /// A reply-class frame, i.e. one that can terminate a send-and-wait
    /// transaction.
    pub fn is_reply(self) -> bool {
        matches!(self, Function::Ack06 | Function::Ack02 | Function::Nack)
    }
}

/// Print a function byte as its known name, or `UNKNOWN(0xNN)` if unrecognized.
pub fn function_name(func: u8) -> String {
    match Function::try_from(func) {
        Ok(f) => format!("{f:?}"),
        Err(_) => format!("UNKNOWN({func:#04x})"),
    }
}

/// A frame built locally for transmission on the bus.
#[derive(Debug, Clone)]
pub struct AssembledFrame {
    pub dest: Address,
    pub source: Address,
    pub func: u8,
    pub data: Bytes,
}

impl AssembledFrame {
    pub fn new(dest: Address, source: Address, func: u8, data: impl Into<Bytes>) -> Self {
        AssembledFrame { dest, source, func, data: data.into() }
    }

    /// Render the full on-wire bytes, including the trailing CRC.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.data.len() + CRC_LEN);
        buf.put_slice(&self.dest.to_bytes());
        buf.put_slice(&self.source.to_bytes());
        buf.put_u8(self.data.len() as u8);
        buf.put_u8(0); // pid
        buf.put_u8(0); // ext
        buf.put_u8(self.func);
        buf.put_slice(&self.data);
        let crc = crc::calculate(&buf);
        buf.put_u16_le(crc);
        buf.freeze()
    }
}

/// A frame as received off the bus, already CRC-validated by the framer
/// that produced it (see [`crate::bus::Bus::read_frame`]).
#[derive(Debug, Clone)]
pub struct ParsedFrame {
    bytes: Bytes,
}

impl ParsedFrame {
    /// Wrap a complete on-wire frame (header + payload + CRC). Does not
    /// itself validate length or CRC; callers obtain these from the framer,
    /// which only ever hands out frames it has already validated.
    pub fn new(bytes: Bytes) -> Self {
        ParsedFrame { bytes }
    }

    pub fn dest(&self) -> Address {
        Address::from_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn source(&self) -> Address {
        Address::from_bytes([self.bytes[2], self.bytes[3]])
    }

    pub fn length(&self) -> usize {
        self.bytes[4] as usize
    }

    pub fn pid(&self) -> u8 {
        self.bytes[5]
    }

    pub fn ext(&self) -> u8 {
        self.bytes[6]
    }

    pub fn func(&self) -> u8 {
        self.bytes[7]
    }

    pub fn function(&self) -> Option<Function> {
        Function::try_from(self.func()).ok()
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..HEADER_LEN + self.length()]
    }

    pub fn is_crc_valid(&self) -> bool {
        let end = HEADER_LEN + self.length() + CRC_LEN;
        crc::calculate(&self.bytes[..end]) == 0
    }

    /// Human-readable register identity, e.g. `TStatCurrentParams(3b02)` or
    /// `register(f000)` if the register isn't in the schema table.
    pub fn printable_register(&self) -> Option<String> {
        if self.length() < 3 {
            return None;
        }
        let key = registers::key_hex(&self.data()[0..3]);
        let short = registers::short_key(&key);
        match registers::lookup(&key) {
            Some((name, _)) => Some(format!("{name}({short})")),
            None => Some(format!("register({short})")),
        }
    }

    /// Decode this frame's register payload per the static schema table.
    /// Returns `None` if the function doesn't carry a register reference
    /// (not a READ/WRITE/ACK06, or too short to contain one).
    pub fn parse_register(&self) -> Option<Result<DecodedRegister>> {
        if self.length() < 3 {
            return None;
        }
        if !matches!(
            self.function(),
            Some(Function::Read) | Some(Function::Write) | Some(Function::Ack06)
        ) {
            return None;
        }
        let key = registers::key_hex(&self.data()[0..3]);
        let short = registers::short_key(&key);
        let (name, specs) = match registers::lookup(&key) {
            Some((name, specs)) => (format!("{name}({short})"), specs),
            None => (format!("register({short})"), &[][..]),
        };
        Some(registers::decode(&name, specs, &self.data()[3..]))
    }
}

impl fmt::Display for ParsedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let crc_note = if self.is_crc_valid() { "" } else { " CRC BAD" };
        write!(
            f,
            "to {} from {} len {} {}({:#04x})",
            self.dest(),
            self.source(),
            self.length(),
            function_name(self.func()),
            self.func(),
        )?;
        match self.function() {
            Some(Function::Read) => {
                if let Some(reg) = self.printable_register() {
                    write!(f, " {reg}")?;
                }
            }
            Some(Function::Write) => {
                if let Some(reg) = self.printable_register() {
                    let value = &self.data()[3.min(self.data().len())..];
                    write!(f, " {reg} value {}", hex(value))?;
                }
            }
            Some(Function::Ack06) if self.length() > 3 => {
                if let Some(Ok(decoded)) = self.parse_register() {
                    write!(f, " {}", decoded.label)?;
                    if decoded.values.is_empty() {
                        if !decoded.remainder.is_empty() {
                            write!(f, " values {}", hex(&decoded.remainder))?;
                        }
                    } else {
                        let pairs: Vec<String> =
                            decoded.values.iter().map(|(k, v)| format!("{k}:{v:?}")).collect();
                        write!(f, " {}", pairs.join(", "))?;
                        if !decoded.remainder.is_empty() {
                            write!(f, " unparsed:{}", hex(&decoded.remainder))?;
                        }
                    }
                }
            }
            _ => {
                write!(f, " {}", hex(self.data()))?;
            }
        }
        write!(f, "{crc_note}")
    }
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembled_frame_round_trips_through_parsed_frame() {
        let frame = AssembledFrame::new(
            Address::from_hex_str("2001").unwrap(),
            Address::from_hex_str("3001").unwrap(),
            Function::Read as u8,
            Bytes::from_static(&[0x00, 0x3b, 0x02]),
        );
        let bytes = frame.to_bytes();
        let parsed = ParsedFrame::new(bytes);
        assert!(parsed.is_crc_valid());
        assert_eq!(parsed.dest(), Address::from_hex_str("2001").unwrap());
        assert_eq!(parsed.source(), Address::from_hex_str("3001").unwrap());
        assert_eq!(parsed.length(), 3);
        assert_eq!(parsed.func(), Function::Read as u8);
        assert_eq!(parsed.printable_register().unwrap(), "TStatCurrentParams(3b02)");
    }

    #[test]
    fn corrupted_frame_fails_crc() {
        let frame = AssembledFrame::new(
            Address::from_hex_str("2001").unwrap(),
            Address::from_hex_str("3001").unwrap(),
            Function::Ack06 as u8,
            Bytes::new(),
        );
        let mut bytes = frame.to_bytes().to_vec();
        bytes[0] ^= 0xff;
        let parsed = ParsedFrame::new(Bytes::from(bytes));
        assert!(!parsed.is_crc_valid());
    }

    #[test]
    fn function_name_falls_back_to_unknown() {
        assert_eq!(function_name(0x06), "Ack06");
        assert!(function_name(0xaa).starts_with("UNKNOWN"));
    }

    #[test]
    fn address_rejects_malformed_hex() {
        assert!(Address::from_hex_str("20g1").is_err());
        assert!(Address::from_hex_str("201").is_err());
    }
}
