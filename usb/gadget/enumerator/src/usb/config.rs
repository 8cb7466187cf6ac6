use smallvec::SmallVec;

use super::constants::CONFIG_DESC_SIZE;
use super::setup::to_le_bytes;
use super::{DescriptorKind, InterfaceHandle, UsbString};
use crate::error::Result;

/// Bytes of the descriptor that follow bLength and bDescriptorType.
pub const CONFIG_BODY_SIZE: usize = CONFIG_DESC_SIZE as usize - 2;

const TOTAL_LENGTH_OFFSET: usize = 0;
const INTERFACES_OFFSET: usize = 2;
const CONFIGURATION_VALUE_OFFSET: usize = 3;
const CONFIGURATION_STR_OFFSET: usize = 4;
const ATTRIBUTES_OFFSET: usize = 5;
const MAX_POWER_OFFSET: usize = 6;

bitflags::bitflags! {
    /// bmAttributes of a configuration descriptor.
    #[derive(Default)]
    #[repr(transparent)]
    pub struct ConfigAttributes: u8 {
        /// Reserved, must always be set.
        const RESERVED_ONE = 1 << 7;
        const SELF_POWERED = 1 << 6;
        const REMOTE_WAKEUP = 1 << 5;
    }
}

impl ConfigAttributes {
    pub fn new(self_powered: bool, remote_wakeup: bool) -> Self {
        let mut attributes = Self::RESERVED_ONE;
        attributes.set(Self::SELF_POWERED, self_powered);
        attributes.set(Self::REMOTE_WAKEUP, remote_wakeup);
        attributes
    }

    /// Interprets a raw bitmap. Bits outside the defined ones are dropped and bit 7 is forced.
    pub fn from_byte(raw: u8) -> Self {
        Self::from_bits_truncate(raw) | Self::RESERVED_ONE
    }

    pub fn self_powered(self) -> bool {
        self.contains(Self::SELF_POWERED)
    }

    pub fn remote_wakeup(self) -> bool {
        self.contains(Self::REMOTE_WAKEUP)
    }
}

/// A configuration: its descriptor header and the interfaces it owns.
///
/// wTotalLength, bNumInterfaces, bConfigurationValue and iConfiguration are zero until the
/// enumerator computes them, and are recomputed on every enumeration pass.
pub struct Configuration {
    body: [u8; CONFIG_BODY_SIZE],
    pub name: UsbString,
    interfaces: SmallVec<[InterfaceHandle; 4]>,
}

impl Configuration {
    pub fn new<I>(
        name: &str,
        attributes: ConfigAttributes,
        max_power: u8,
        interfaces: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = InterfaceHandle>,
    {
        let mut body = [0; CONFIG_BODY_SIZE];
        body[ATTRIBUTES_OFFSET] = (attributes | ConfigAttributes::RESERVED_ONE).bits();
        body[MAX_POWER_OFFSET] = max_power;

        Ok(Self {
            body,
            name: UsbString::new(name)?,
            interfaces: interfaces.into_iter().collect(),
        })
    }

    /// The two byte header preceding [Configuration::as_bytes] on the wire.
    pub const fn header() -> [u8; 2] {
        [CONFIG_DESC_SIZE, DescriptorKind::Configuration as u8]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn interfaces(&self) -> &[InterfaceHandle] {
        &self.interfaces
    }

    pub fn total_length(&self) -> u16 {
        u16::from_le_bytes([
            self.body[TOTAL_LENGTH_OFFSET],
            self.body[TOTAL_LENGTH_OFFSET + 1],
        ])
    }

    pub fn num_interfaces(&self) -> u8 {
        self.body[INTERFACES_OFFSET]
    }

    pub fn configuration_value(&self) -> u8 {
        self.body[CONFIGURATION_VALUE_OFFSET]
    }

    pub fn configuration_str(&self) -> u8 {
        self.body[CONFIGURATION_STR_OFFSET]
    }

    pub fn attributes(&self) -> ConfigAttributes {
        ConfigAttributes::from_byte(self.body[ATTRIBUTES_OFFSET])
    }

    /// Maximum bus power in 2mA units.
    pub fn max_power(&self) -> u8 {
        self.body[MAX_POWER_OFFSET]
    }

    pub(crate) fn set_total_length(&mut self, length: u16) {
        self.body[TOTAL_LENGTH_OFFSET..TOTAL_LENGTH_OFFSET + 2]
            .copy_from_slice(&to_le_bytes(length));
    }

    pub(crate) fn set_num_interfaces(&mut self, count: u8) {
        self.body[INTERFACES_OFFSET] = count;
    }

    pub(crate) fn set_configuration_value(&mut self, value: u8) {
        self.body[CONFIGURATION_VALUE_OFFSET] = value;
    }

    pub(crate) fn set_configuration_str(&mut self, index: u8) {
        self.body[CONFIGURATION_STR_OFFSET] = index;
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("body", &self.body)
            .field("name", &self.name.to_string_lossy())
            .field("interfaces", &self.interfaces.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attribute_bits() {
        assert_eq!(ConfigAttributes::new(false, false).bits(), 0x80);
        assert_eq!(ConfigAttributes::new(true, false).bits(), 0xC0);
        assert_eq!(ConfigAttributes::new(false, true).bits(), 0xA0);
        assert_eq!(ConfigAttributes::new(true, true).bits(), 0xE0);

        let raw = ConfigAttributes::from_byte(0x5F);
        assert_eq!(raw.bits(), 0xC0);
        assert!(raw.self_powered());
        assert!(!raw.remote_wakeup());
    }

    #[test]
    fn header_fields() {
        let mut conf =
            Configuration::new("Default", ConfigAttributes::new(true, true), 50, Vec::new())
                .unwrap();
        assert_eq!(conf.total_length(), 0);
        assert_eq!(conf.num_interfaces(), 0);

        conf.set_total_length(0x0122);
        conf.set_num_interfaces(2);
        conf.set_configuration_value(1);
        conf.set_configuration_str(4);

        let mut wire = Configuration::header().to_vec();
        wire.extend_from_slice(conf.as_bytes());
        assert_eq!(wire, [9u8, 0x02, 0x22, 0x01, 2, 1, 4, 0xE0, 50]);
        assert_eq!(conf.total_length(), 0x0122);
        assert!(conf.attributes().remote_wakeup());
        assert_eq!(conf.max_power(), 50);
    }

    #[test]
    fn reserved_bit_is_forced() {
        let conf = Configuration::new("x", ConfigAttributes::SELF_POWERED, 0, Vec::new()).unwrap();
        assert_eq!(conf.attributes().bits(), 0xC0);
    }
}
