// ABOUTME: Builds READ/WRITE request frames for a register; matching a reply and
// ABOUTME: servicing the send queue lives in monitor.rs, the crate's single send path

use bytes::Bytes;

use crate::frame::{Address, AssembledFrame, Function};

/// Build a READ frame for `register` (e.g. `0x3b02`).
pub fn build_read(dest: Address, source: Address, register: u16) -> AssembledFrame {
    let mut data = Vec::with_capacity(3);
    data.push(0);
    data.extend_from_slice(&register.to_be_bytes());
    AssembledFrame::new(dest, source, Function::Read as u8, Bytes::from(data))
}

/// Build a WRITE frame for `register`, with an optional segment `mask` and
/// raw `payload` bytes to write.
pub fn build_write(dest: Address, source: Address, register: u16, mask: Option<u16>, payload: &[u8]) -> AssembledFrame {
    let mut data = Vec::with_capacity(3 + payload.len());
    data.push(0);
    data.extend_from_slice(&register.to_be_bytes());
    if let Some(mask) = mask {
        data.push(0);
        data.extend_from_slice(&mask.to_be_bytes());
    }
    data.extend_from_slice(payload);
    AssembledFrame::new(dest, source, Function::Write as u8, Bytes::from(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::from_hex_str(s).unwrap()
    }

    #[test]
    fn build_read_encodes_register_as_a_three_byte_be_prefix() {
        let frame = build_read(addr("2001"), addr("3001"), 0x3b02);
        assert_eq!(frame.func, Function::Read as u8);
        assert_eq!(frame.data.as_ref(), &[0x00, 0x3b, 0x02]);
    }

    #[test]
    fn build_write_appends_mask_and_payload_after_the_register() {
        let frame = build_write(addr("2001"), addr("3001"), 0x3b02, Some(0x00ff), &[0xaa, 0xbb]);
        assert_eq!(frame.func, Function::Write as u8);
        assert_eq!(frame.data.as_ref(), &[0x00, 0x3b, 0x02, 0x00, 0x00, 0xff, 0xaa, 0xbb]);
    }

    #[test]
    fn build_write_without_a_mask_writes_the_payload_directly() {
        let frame = build_write(addr("2001"), addr("3001"), 0x3b02, None, &[0xaa]);
        assert_eq!(frame.data.as_ref(), &[0x00, 0x3b, 0x02, 0xaa]);
    }
}
