//! String descriptors (USB2 9.6.7, USB32 9.6.9).

use smallvec::SmallVec;

use super::constants::STRING_DESC_HEADER_SIZE;
use super::setup::to_le_bytes;
use super::DescriptorKind;
use crate::error::{Error, Result};
use crate::usb::DescriptorWriter;

/// The longest string a descriptor can carry: bLength is one byte and includes the header.
pub const MAX_STRING_UNITS: usize = (u8::MAX as usize - STRING_DESC_HEADER_SIZE as usize) / 2;

/// A LANGID code as reported through string descriptor zero.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LanguageId(pub u16);

impl LanguageId {
    pub const ENGLISH_US: Self = Self(0x0409);

    /// The four bytes of string descriptor zero listing this language.
    pub fn descriptor(self) -> [u8; 4] {
        let [lo, hi] = to_le_bytes(self.0);
        [4, DescriptorKind::String as u8, lo, hi]
    }
}

/// A string held in its wire form: UTF-16LE code units, no terminator.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UsbString {
    utf16le: SmallVec<[u8; 64]>,
}

impl UsbString {
    pub fn new(s: &str) -> Result<Self> {
        let mut utf16le = SmallVec::new();
        let mut units = 0;
        for unit in s.encode_utf16() {
            units += 1;
            if units > MAX_STRING_UNITS {
                return Err(Error::OutOfDomain {
                    what: "string length",
                    index: s.encode_utf16().count(),
                });
            }
            utf16le.extend_from_slice(&unit.to_le_bytes());
        }
        Ok(Self { utf16le })
    }

    /// The encoded code units.
    pub fn as_bytes(&self) -> &[u8] {
        &self.utf16le
    }

    pub fn is_empty(&self) -> bool {
        self.utf16le.is_empty()
    }

    /// bLength of the descriptor carrying this string.
    pub fn descriptor_len(&self) -> u8 {
        // MAX_STRING_UNITS keeps this in range
        (self.utf16le.len() + STRING_DESC_HEADER_SIZE as usize) as u8
    }

    pub fn header(&self) -> [u8; 2] {
        [self.descriptor_len(), DescriptorKind::String as u8]
    }

    /// Emits the full descriptor through `writer`.
    pub fn write_descriptor(&self, writer: &mut DescriptorWriter<'_>) -> Result<()> {
        let header = self.header();
        writer(&[&header[..], self.as_bytes()])
    }

    pub fn to_string_lossy(&self) -> String {
        let units: SmallVec<[u16; 32]> = self
            .utf16le
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_utf16le() {
        let s = UsbString::new("Ab\u{e9}").unwrap();
        assert_eq!(s.as_bytes(), &[b'A', 0, b'b', 0, 0xE9, 0]);
        assert_eq!(s.header(), [8, 3]);
        assert_eq!(s.to_string_lossy(), "Ab\u{e9}");
    }

    #[test]
    fn surrogate_pairs_take_two_units() {
        let s = UsbString::new("\u{1F600}").unwrap();
        assert_eq!(s.as_bytes().len(), 4);
        assert_eq!(s.descriptor_len(), 6);
    }

    #[test]
    fn rejects_strings_longer_than_a_descriptor() {
        let longest = "x".repeat(MAX_STRING_UNITS);
        assert_eq!(UsbString::new(&longest).unwrap().descriptor_len(), 254);
        assert!(UsbString::new(&"x".repeat(MAX_STRING_UNITS + 1)).is_err());
    }

    #[test]
    fn write_descriptor_emits_header_then_units() {
        let s = UsbString::new("hi").unwrap();
        let mut out = Vec::new();
        s.write_descriptor(&mut |data: &[&[u8]]| {
            for span in data {
                out.extend_from_slice(span);
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(out, [6, 3, b'h', 0, b'i', 0]);
    }

    #[test]
    fn language_descriptor() {
        assert_eq!(LanguageId::ENGLISH_US.descriptor(), [4, 3, 0x09, 0x04]);
    }
}
