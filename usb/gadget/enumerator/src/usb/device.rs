//! Implements the "Device" USB Descriptor.
//!
//! This descriptor is described in USB32 section 9.6.1

use super::constants::DEVICE_DESC_SIZE;
use super::setup::to_le_bytes;
use super::{ClassCode, DescriptorKind, UsbString};
use crate::error::Result;

/// Bytes of the descriptor that follow bLength and bDescriptorType.
pub const DEVICE_BODY_SIZE: usize = DEVICE_DESC_SIZE as usize - 2;

const USB_OFFSET: usize = 0;
const CLASS_OFFSET: usize = 2;
const SUB_CLASS_OFFSET: usize = 3;
const PROTOCOL_OFFSET: usize = 4;
const PACKET_SIZE_OFFSET: usize = 5;
const VENDOR_OFFSET: usize = 6;
const PRODUCT_OFFSET: usize = 8;
const RELEASE_OFFSET: usize = 10;
const MANUFACTURER_STR_OFFSET: usize = 12;
const PRODUCT_STR_OFFSET: usize = 13;
const SERIAL_STR_OFFSET: usize = 14;
const CONFIGURATIONS_OFFSET: usize = 15;

/// Everything about the device that is known before enumeration.
#[derive(Clone, Copy, Debug)]
pub struct DeviceArguments<'a> {
    /// The USB standard version in binary-coded decimal. USB 2.1 would be encoded as 210H.
    pub usb: u16,
    pub class: ClassCode,
    pub sub_class: u8,
    pub protocol: u8,
    pub vendor: u16,
    pub product: u16,
    /// The device release number in binary-coded decimal.
    pub release: u16,
    pub manufacturer: &'a str,
    pub product_name: &'a str,
    pub serial_number: &'a str,
}

/// A USB Device Descriptor.
///
/// This is common to all USB standards, and "provides information that applies globally to the
/// device and all the device's configurations" (USB32 9.6.1). A given device will only have one
/// device descriptor.
///
/// The body is kept in wire order (USB32 Table 9-11, minus bLength and bDescriptorType) so it can
/// be handed to the endpoint as one scatter fragment behind a two byte header. bMaxPacketSize0,
/// the three string indices and bNumConfigurations start at zero and are filled in by the
/// enumerator.
#[derive(Clone, Debug)]
pub struct Device {
    body: [u8; DEVICE_BODY_SIZE],
    pub manufacturer: UsbString,
    pub product: UsbString,
    pub serial_number: UsbString,
}

impl Device {
    pub fn new(args: DeviceArguments<'_>) -> Result<Self> {
        let mut body = [0; DEVICE_BODY_SIZE];
        body[USB_OFFSET..USB_OFFSET + 2].copy_from_slice(&to_le_bytes(args.usb));
        body[CLASS_OFFSET] = args.class as u8;
        body[SUB_CLASS_OFFSET] = args.sub_class;
        body[PROTOCOL_OFFSET] = args.protocol;
        body[VENDOR_OFFSET..VENDOR_OFFSET + 2].copy_from_slice(&to_le_bytes(args.vendor));
        body[PRODUCT_OFFSET..PRODUCT_OFFSET + 2].copy_from_slice(&to_le_bytes(args.product));
        body[RELEASE_OFFSET..RELEASE_OFFSET + 2].copy_from_slice(&to_le_bytes(args.release));

        Ok(Self {
            body,
            manufacturer: UsbString::new(args.manufacturer)?,
            product: UsbString::new(args.product_name)?,
            serial_number: UsbString::new(args.serial_number)?,
        })
    }

    /// The two byte header preceding [Device::as_bytes] on the wire.
    pub const fn header() -> [u8; 2] {
        [DEVICE_DESC_SIZE, DescriptorKind::Device as u8]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.body[offset], self.body[offset + 1]])
    }

    pub fn usb(&self) -> u16 {
        self.u16_at(USB_OFFSET)
    }

    /// Gets the USB Major Version
    pub fn major_usb_vers(&self) -> u8 {
        (self.usb() >> 8) as u8
    }

    /// Gets the USB Minor Version
    pub fn minor_usb_vers(&self) -> u8 {
        (self.usb() & 0xFF) as u8
    }

    pub fn class(&self) -> u8 {
        self.body[CLASS_OFFSET]
    }

    pub fn sub_class(&self) -> u8 {
        self.body[SUB_CLASS_OFFSET]
    }

    pub fn protocol(&self) -> u8 {
        self.body[PROTOCOL_OFFSET]
    }

    pub fn packet_size(&self) -> u8 {
        self.body[PACKET_SIZE_OFFSET]
    }

    pub fn vendor(&self) -> u16 {
        self.u16_at(VENDOR_OFFSET)
    }

    pub fn product_id(&self) -> u16 {
        self.u16_at(PRODUCT_OFFSET)
    }

    pub fn release(&self) -> u16 {
        self.u16_at(RELEASE_OFFSET)
    }

    pub fn manufacturer_str(&self) -> u8 {
        self.body[MANUFACTURER_STR_OFFSET]
    }

    pub fn product_str(&self) -> u8 {
        self.body[PRODUCT_STR_OFFSET]
    }

    pub fn serial_str(&self) -> u8 {
        self.body[SERIAL_STR_OFFSET]
    }

    pub fn configurations(&self) -> u8 {
        self.body[CONFIGURATIONS_OFFSET]
    }

    pub(crate) fn set_packet_size(&mut self, size: u8) {
        self.body[PACKET_SIZE_OFFSET] = size;
    }

    pub(crate) fn set_string_indices(&mut self, manufacturer: u8, product: u8, serial: u8) {
        self.body[MANUFACTURER_STR_OFFSET] = manufacturer;
        self.body[PRODUCT_STR_OFFSET] = product;
        self.body[SERIAL_STR_OFFSET] = serial;
    }

    pub(crate) fn set_configurations(&mut self, count: u8) {
        self.body[CONFIGURATIONS_OFFSET] = count;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn device() -> Device {
        Device::new(DeviceArguments {
            usb: 0x0200,
            class: ClassCode::Misc,
            sub_class: 0x02,
            protocol: 0x01,
            vendor: 0x1209,
            product: 0x0001,
            release: 0x0103,
            manufacturer: "libhal",
            product_name: "Gadget",
            serial_number: "0001",
        })
        .unwrap()
    }

    #[test]
    fn packs_usb20_layout() {
        let mut dev = device();
        dev.set_packet_size(64);
        dev.set_string_indices(1, 2, 3);
        dev.set_configurations(1);

        let mut wire = Device::header().to_vec();
        wire.extend_from_slice(dev.as_bytes());
        assert_eq!(
            wire,
            [
                18u8, 0x01, 0x00, 0x02, 0xEF, 0x02, 0x01, 64, 0x09, 0x12, 0x01, 0x00, 0x03, 0x01, 1,
                2, 3, 1
            ]
        );
    }

    #[test]
    fn enumeration_fields_start_at_zero() {
        let dev = device();
        assert_eq!(dev.packet_size(), 0);
        assert_eq!(dev.manufacturer_str(), 0);
        assert_eq!(dev.product_str(), 0);
        assert_eq!(dev.serial_str(), 0);
        assert_eq!(dev.configurations(), 0);
        assert_eq!(dev.major_usb_vers(), 2);
        assert_eq!(dev.minor_usb_vers(), 0);
        assert_eq!(dev.vendor(), 0x1209);
        assert_eq!(dev.product_id(), 0x0001);
        assert_eq!(dev.release(), 0x0103);
    }
}
