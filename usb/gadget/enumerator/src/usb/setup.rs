use super::DescriptorKind;
use crate::error::{Error, Result};

/// The size of a setup packet on the wire.
pub const SETUP_PACKET_LEN: usize = 8;

/// The 8-byte header that starts every control transfer.
///
/// Multi-byte fields are little-endian on the wire and host-native here.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Setup {
    /// bmRequestType
    pub kind: u8,
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
    /// wLength
    pub length: u16,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReqDirection {
    HostToDevice = 0,
    DeviceToHost = 1,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReqType {
    /// Standard device requests, such as SET_ADDRESS and SET_CONFIGURATION.
    Standard = 0,

    /// Class specific requests, answered by the interfaces.
    Class = 1,

    /// Vendor specific requests, answered by the interfaces.
    Vendor = 2,

    /// Reserved
    Reserved = 3,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReqRecipient {
    Device,
    Interface,
    Endpoint,
    Other,
    VendorSpecific,
    /// 4..=30 are reserved
    Reserved(u8),
}

impl From<u8> for ReqRecipient {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Device,
            1 => Self::Interface,
            2 => Self::Endpoint,
            3 => Self::Other,
            31 => Self::VendorSpecific,
            other => Self::Reserved(other),
        }
    }
}

/// bRequest codes of the standard requests.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetupReq {
    GetStatus = 0x00,
    ClearFeature = 0x01,
    SetFeature = 0x03,
    SetAddress = 0x05,
    GetDescriptor = 0x06,
    SetDescriptor = 0x07,
    GetConfiguration = 0x08,
    SetConfiguration = 0x09,
    GetInterface = 0x0A,
    SetInterface = 0x11,
    SynchFrame = 0x12,
}

/// Classification of a setup packet as a standard request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StandardRequest {
    Known(SetupReq),
    /// A code inside the standard range that has no named request.
    Reserved(u8),
    /// Not a standard request: wrong type bits, code 0x04, or a code past SYNCH_FRAME.
    Invalid,
}

pub const USB_SETUP_DIR_BIT: u8 = 1 << 7;
pub const USB_SETUP_DIR_SHIFT: u8 = 7;
pub const USB_SETUP_REQ_TY_MASK: u8 = 0x60;
pub const USB_SETUP_REQ_TY_SHIFT: u8 = 5;
pub const USB_SETUP_RECIPIENT_MASK: u8 = 0x1F;
pub const USB_SETUP_RECIPIENT_SHIFT: u8 = 0;

/// Packs a 16-bit value into its two wire bytes.
pub const fn to_le_bytes(n: u16) -> [u8; 2] {
    [(n & 0xFF) as u8, (n >> 8) as u8]
}

/// Unpacks a 16-bit value from its two wire bytes.
pub const fn from_le_bytes(first: u8, second: u8) -> u16 {
    (second as u16) << 8 | first as u16
}

impl Setup {
    /// Decodes a setup packet. Anything but exactly eight bytes is a framing error.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() != SETUP_PACKET_LEN {
            return Err(Error::MessageSize {
                expected: SETUP_PACKET_LEN,
                actual: raw.len(),
            });
        }

        Ok(Self {
            kind: raw[0],
            request: raw[1],
            value: from_le_bytes(raw[2], raw[3]),
            index: from_le_bytes(raw[4], raw[5]),
            length: from_le_bytes(raw[6], raw[7]),
        })
    }

    pub fn to_bytes(&self) -> [u8; SETUP_PACKET_LEN] {
        let [value_lo, value_hi] = to_le_bytes(self.value);
        let [index_lo, index_hi] = to_le_bytes(self.index);
        let [length_lo, length_hi] = to_le_bytes(self.length);
        [
            self.kind,
            self.request,
            value_lo,
            value_hi,
            index_lo,
            index_hi,
            length_lo,
            length_hi,
        ]
    }

    pub fn direction(&self) -> ReqDirection {
        if self.kind & USB_SETUP_DIR_BIT == 0 {
            ReqDirection::HostToDevice
        } else {
            ReqDirection::DeviceToHost
        }
    }

    pub const fn req_ty(&self) -> u8 {
        (self.kind & USB_SETUP_REQ_TY_MASK) >> USB_SETUP_REQ_TY_SHIFT
    }

    pub fn request_type(&self) -> ReqType {
        match self.req_ty() {
            0 => ReqType::Standard,
            1 => ReqType::Class,
            2 => ReqType::Vendor,
            _ => ReqType::Reserved,
        }
    }

    pub const fn req_recipient(&self) -> u8 {
        (self.kind & USB_SETUP_RECIPIENT_MASK) >> USB_SETUP_RECIPIENT_SHIFT
    }

    pub fn recipient(&self) -> ReqRecipient {
        ReqRecipient::from(self.req_recipient())
    }

    /// Classifies the packet as a standard request.
    ///
    /// Code 0x04 sits in a gap of the standard table and is never a valid request.
    pub fn standard_request(&self) -> StandardRequest {
        if self.request_type() != ReqType::Standard || self.request == 0x04 || self.request > 0x12
        {
            return StandardRequest::Invalid;
        }

        StandardRequest::Known(match self.request {
            0x00 => SetupReq::GetStatus,
            0x01 => SetupReq::ClearFeature,
            0x03 => SetupReq::SetFeature,
            0x05 => SetupReq::SetAddress,
            0x06 => SetupReq::GetDescriptor,
            0x07 => SetupReq::SetDescriptor,
            0x08 => SetupReq::GetConfiguration,
            0x09 => SetupReq::SetConfiguration,
            0x0A => SetupReq::GetInterface,
            0x11 => SetupReq::SetInterface,
            0x12 => SetupReq::SynchFrame,
            other => return StandardRequest::Reserved(other),
        })
    }

    /// Descriptor type of a GET_DESCRIPTOR/SET_DESCRIPTOR request (high byte of wValue).
    pub const fn descriptor_kind(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Descriptor index of a GET_DESCRIPTOR/SET_DESCRIPTOR request (low byte of wValue).
    pub const fn descriptor_index(&self) -> u8 {
        (self.value & 0xFF) as u8
    }

    pub fn is_get_string_descriptor(&self) -> bool {
        self.standard_request() == StandardRequest::Known(SetupReq::GetDescriptor)
            && self.descriptor_kind() == DescriptorKind::String as u8
    }

    pub const fn get_status() -> Self {
        Self {
            kind: 0b1000_0000,
            request: 0x00,
            value: 0,
            index: 0,
            length: 2,
        }
    }

    pub const fn clear_feature(feature: u16) -> Self {
        Self {
            kind: 0b0000_0000,
            request: 0x01,
            value: feature,
            index: 0,
            length: 0,
        }
    }

    pub const fn set_feature(feature: u16) -> Self {
        Self {
            kind: 0b0000_0000,
            request: 0x03,
            value: feature,
            index: 0,
            length: 0,
        }
    }

    pub const fn set_address(address: u16) -> Self {
        Self {
            kind: 0b0000_0000,
            request: 0x05,
            value: address,
            index: 0,
            length: 0,
        }
    }

    pub const fn get_descriptor(
        kind: DescriptorKind,
        index: u8,
        language: u16,
        length: u16,
    ) -> Self {
        Self {
            kind: 0b1000_0000,
            request: 0x06,
            value: ((kind as u16) << 8) | (index as u16),
            index: language,
            length,
        }
    }

    pub const fn get_configuration() -> Self {
        Self {
            kind: 0b1000_0000,
            request: 0x08,
            value: 0,
            index: 0,
            length: 1,
        }
    }

    pub const fn set_configuration(value: u8) -> Self {
        Self {
            kind: 0b0000_0000,
            request: 0x09,
            value: value as u16,
            index: 0,
            length: 0,
        }
    }

    /// A class request addressed to an interface.
    pub const fn interface_class(
        direction: ReqDirection,
        request: u8,
        value: u16,
        interface: u8,
        length: u16,
    ) -> Self {
        Self {
            kind: ((direction as u8) << USB_SETUP_DIR_SHIFT)
                | ((ReqType::Class as u8) << USB_SETUP_REQ_TY_SHIFT)
                | 0b0_0001,
            request,
            value,
            index: interface as u16,
            length,
        }
    }
}
