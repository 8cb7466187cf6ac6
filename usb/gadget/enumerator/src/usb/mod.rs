//! The Universal Serial Bus (USB) Module
//!
//! Wire formats of everything the device side exchanges with the host over the default control
//! endpoint: the setup packet and the device, configuration, interface, interface association,
//! endpoint and string descriptors.
//!
//! Descriptors are encoded with explicit byte offsets rather than by reinterpreting packed
//! structs, so the byte layout never depends on the target.
//!
//! See the crate-level documentation for the acronyms used to refer to specific documents.
pub use self::config::{ConfigAttributes, Configuration};
pub use self::device::{Device, DeviceArguments};
pub use self::interface::{
    interface_handle, lock_interface, DescriptorCount, DescriptorStart, DescriptorWriter,
    EndpointDescriptor, EndpointTy, Interface, InterfaceAssociationDescriptor,
    InterfaceDescriptor, InterfaceHandle,
};
pub use self::setup::{
    from_le_bytes, to_le_bytes, ReqDirection, ReqRecipient, ReqType, Setup, SetupReq,
    StandardRequest, SETUP_PACKET_LEN,
};
pub use self::string::{LanguageId, UsbString};

/// Wire sizes of the fixed-layout descriptors, header included.
pub mod constants {
    pub const DEVICE_DESC_SIZE: u8 = 18;
    pub const CONFIG_DESC_SIZE: u8 = 9;
    pub const INTERFACE_DESC_SIZE: u8 = 9;
    pub const ENDPOINT_DESC_SIZE: u8 = 7;
    pub const IAD_DESC_SIZE: u8 = 8;
    pub const STRING_DESC_HEADER_SIZE: u8 = 2;
    pub const SIZE_STD_REQ: u8 = 8;
}

/// Enumerates the list of descriptor kinds that can be reported by a USB device to report its
/// attributes to the system. (See USB32 Sections 9.5 and 9.6)
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum DescriptorKind {
    /// A Device Descriptor. See [Device]
    Device = 0x01,
    /// A Configuration Descriptor. See [Configuration]
    Configuration = 0x02,
    /// A String Descriptor. See (USB32 Section 9.6.9).
    String = 0x03,
    /// An Interface Descriptor. See [InterfaceDescriptor]
    Interface = 0x04,
    /// An Endpoint Descriptor. See [EndpointDescriptor]
    Endpoint = 0x05,
    /// A Device Qualifier. USB2-specific.
    DeviceQualifier = 0x06,
    /// The "Other Speed Configuration" descriptor. USB2-specific. See [USB2 9.6.4]
    OtherSpeedConfiguration = 0x07,
    InterfacePower = 0x08,
    OnTheGo = 0x09,
    Debug = 0x0A,
    /// An Interface Association Descriptor. See [InterfaceAssociationDescriptor]
    InterfaceAssociation = 0x0B,
    Security = 0x0C,
    Key = 0x0D,
    EncryptionType = 0x0E,
    /// A Binary Device Object Store Descriptor.
    BinaryObjectStorage = 0x0F,
    DeviceCapability = 0x10,
    WirelessEndpointCompanion = 0x11,
    /// A Super Speed Endpoint Companion Descriptor.
    SuperSpeedCompanion = 0x30,
    SuperSpeedIsochCompanion = 0x31,
}

impl DescriptorKind {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x01 => Self::Device,
            0x02 => Self::Configuration,
            0x03 => Self::String,
            0x04 => Self::Interface,
            0x05 => Self::Endpoint,
            0x06 => Self::DeviceQualifier,
            0x07 => Self::OtherSpeedConfiguration,
            0x08 => Self::InterfacePower,
            0x09 => Self::OnTheGo,
            0x0A => Self::Debug,
            0x0B => Self::InterfaceAssociation,
            0x0C => Self::Security,
            0x0D => Self::Key,
            0x0E => Self::EncryptionType,
            0x0F => Self::BinaryObjectStorage,
            0x10 => Self::DeviceCapability,
            0x11 => Self::WirelessEndpointCompanion,
            0x30 => Self::SuperSpeedCompanion,
            0x31 => Self::SuperSpeedIsochCompanion,
            _ => return None,
        })
    }
}

/// Class codes assigned by USB-IF.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ClassCode {
    /// Use class information in the Interface Descriptors
    UseInterfaceDescriptor = 0x00,
    Audio = 0x01,
    CdcControl = 0x02,
    Hid = 0x03,
    Physical = 0x05,
    Image = 0x06,
    Printer = 0x07,
    MassStorage = 0x08,
    Hub = 0x09,
    CdcData = 0x0A,
    SmartCard = 0x0B,
    ContentSecurity = 0x0D,
    Video = 0x0E,
    PersonalHealthcare = 0x0F,
    AudioVideo = 0x10,
    Billboard = 0x11,
    UsbCBridge = 0x12,
    BulkDisplay = 0x13,
    Mctp = 0x14,
    I3c = 0x3C,
    Diagnostic = 0xDC,
    WirelessController = 0xE0,
    /// Miscellaneous, used together with interface association descriptors
    Misc = 0xEF,
    ApplicationSpecific = 0xFE,
    VendorSpecific = 0xFF,
}

pub(crate) mod config;
pub(crate) mod device;
pub(crate) mod interface;
pub(crate) mod setup;
pub(crate) mod string;
