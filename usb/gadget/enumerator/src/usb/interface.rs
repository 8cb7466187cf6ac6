//! The contract every USB interface (or interface association) plugged into a configuration
//! satisfies, and encoders for the descriptors interfaces emit.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::constants::{ENDPOINT_DESC_SIZE, IAD_DESC_SIZE, INTERFACE_DESC_SIZE};
use super::setup::to_le_bytes;
use super::{DescriptorKind, Setup};
use crate::error::Result;
use crate::udc::ControlDataStage;

/// Sink for descriptor bytes. Each call receives one scatter list.
pub type DescriptorWriter<'w> = dyn FnMut(&[&[u8]]) -> Result<()> + 'w;

/// Shared handle to an interface. A configuration holds these, and the same interface may be
/// placed in several configurations.
pub type InterfaceHandle = Arc<Mutex<dyn Interface + Send>>;

/// Where an interface starts numbering.
///
/// Both fields are `Some` during the enumeration pass that hands out indices. When the host asks
/// for a configuration descriptor they are `None`, and the interface reuses what it was given
/// last time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DescriptorStart {
    pub interface: Option<u8>,
    pub string: Option<u8>,
}

impl DescriptorStart {
    pub const NONE: Self = Self {
        interface: None,
        string: None,
    };

    pub const fn new(interface: u8, string: u8) -> Self {
        Self {
            interface: Some(interface),
            string: Some(string),
        }
    }
}

/// How many interface numbers and string indices an interface consumed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DescriptorCount {
    pub interface: u8,
    pub string: u8,
}

pub trait Interface {
    /// Emits this interface's descriptors (interface, class specific, endpoint...) through
    /// `writer`, numbering interfaces and strings from `start`.
    fn write_descriptors(
        &mut self,
        start: DescriptorStart,
        writer: &mut DescriptorWriter<'_>,
    ) -> Result<DescriptorCount>;

    /// Emits the string descriptor for `index` if this interface owns it.
    ///
    /// Returns `false` without writing anything when the index belongs to someone else.
    fn write_string_descriptor(
        &mut self,
        index: u8,
        writer: &mut DescriptorWriter<'_>,
    ) -> Result<bool>;

    /// Services a control request that is not addressed to the device.
    ///
    /// Returns `false` when the request is not meant for this interface.
    fn handle_request(&mut self, setup: &Setup, stage: &mut ControlDataStage<'_>)
        -> Result<bool>;
}

/// Wraps an interface into a handle a [super::Configuration] can hold.
pub fn interface_handle<I>(interface: I) -> InterfaceHandle
where
    I: Interface + Send + 'static,
{
    Arc::new(Mutex::new(interface))
}

/// Locks an interface. A panic in another holder doesn't leave anything the enumerator depends
/// on half-updated, so poisoning is ignored.
pub fn lock_interface(handle: &InterfaceHandle) -> MutexGuard<'_, dyn Interface + Send + 'static> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The descriptor for a USB Interface (USB32 9.6.5, Table 9-21).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub alternate_setting: u8,
    pub endpoints: u8,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub interface_str: u8,
}

impl InterfaceDescriptor {
    pub fn to_bytes(&self) -> [u8; INTERFACE_DESC_SIZE as usize] {
        [
            INTERFACE_DESC_SIZE,
            DescriptorKind::Interface as u8,
            self.number,
            self.alternate_setting,
            self.endpoints,
            self.class,
            self.sub_class,
            self.protocol,
            self.interface_str,
        ]
    }
}

/// Groups consecutive interfaces into one function (USB32 9.6.4, Table 9-18).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InterfaceAssociationDescriptor {
    pub first_interface: u8,
    pub interface_count: u8,
    pub function_class: u8,
    pub function_sub_class: u8,
    pub function_protocol: u8,
    pub function_str: u8,
}

impl InterfaceAssociationDescriptor {
    pub fn to_bytes(&self) -> [u8; IAD_DESC_SIZE as usize] {
        [
            IAD_DESC_SIZE,
            DescriptorKind::InterfaceAssociation as u8,
            self.first_interface,
            self.interface_count,
            self.function_class,
            self.function_sub_class,
            self.function_protocol,
            self.function_str,
        ]
    }
}

/// Mask that is ANDed to [EndpointDescriptor::attributes] to get the transfer type.
pub const ENDP_ATTR_TY_MASK: u8 = 0x3;

/// Set in [EndpointDescriptor::address] for IN endpoints.
pub const ENDP_ADDR_DIR_IN: u8 = 1 << 7;

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EndpointTy {
    Ctrl = 0,
    Isoch = 1,
    Bulk = 2,
    Interrupt = 3,
}

/// The descriptor for a non-default endpoint of an interface (USB32 9.6.6, Table 9-26).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EndpointDescriptor {
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    pub fn new(
        number: u8,
        is_in: bool,
        ty: EndpointTy,
        max_packet_size: u16,
        interval: u8,
    ) -> Self {
        let direction = if is_in { ENDP_ADDR_DIR_IN } else { 0 };
        Self {
            address: (number & 0x0F) | direction,
            attributes: ty as u8,
            max_packet_size,
            interval,
        }
    }

    pub fn ty(&self) -> EndpointTy {
        match self.attributes & ENDP_ATTR_TY_MASK {
            0 => EndpointTy::Ctrl,
            1 => EndpointTy::Isoch,
            2 => EndpointTy::Bulk,
            _ => EndpointTy::Interrupt,
        }
    }

    pub fn is_in(&self) -> bool {
        self.address & ENDP_ADDR_DIR_IN != 0
    }

    pub fn to_bytes(&self) -> [u8; ENDPOINT_DESC_SIZE as usize] {
        let [mps_lo, mps_hi] = to_le_bytes(self.max_packet_size);
        [
            ENDPOINT_DESC_SIZE,
            DescriptorKind::Endpoint as u8,
            self.address,
            self.attributes,
            mps_lo,
            mps_hi,
            self.interval,
        ]
    }
}
