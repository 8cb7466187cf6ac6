#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use gadget_enumerator::usb::{
    ClassCode, ConfigAttributes, Configuration, DescriptorCount, DescriptorStart,
    DescriptorWriter, Device, DeviceArguments, EndpointDescriptor, EndpointTy, Interface,
    InterfaceAssociationDescriptor, InterfaceDescriptor, InterfaceHandle, ReqDirection, Setup,
    UsbString,
};
use gadget_enumerator::{ControlDataStage, ControlEndpoint, EndpointInfo, Result};

pub const VENDOR: u16 = 0x1209;
pub const PRODUCT: u16 = 0x0001;

/// Everything the enumerator did to the endpoint, in order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EndpointOp {
    Write(Vec<u8>),
    SetAddress(u8),
    Connect(bool),
    Stall(bool),
}

/// A control endpoint whose host side is driven by the test.
///
/// Packets queued before `connect(true)` are announced when the device connects, the way a
/// controller raises one interrupt per setup packet once the pull-up is enabled.
pub struct MockControlEndpoint {
    pub max_packet_size: u16,
    inbox: VecDeque<Vec<u8>>,
    callback: Option<Box<dyn FnMut() + Send>>,
    pub ops: Vec<EndpointOp>,
    pub connected: bool,
}

impl MockControlEndpoint {
    pub fn new(max_packet_size: u16) -> Self {
        Self {
            max_packet_size,
            inbox: VecDeque::new(),
            callback: None,
            ops: Vec::new(),
            connected: false,
        }
    }

    /// Queues a setup packet without announcing it.
    pub fn queue(&mut self, setup: Setup) {
        self.inbox.push_back(setup.to_bytes().to_vec());
    }

    pub fn queue_raw(&mut self, bytes: &[u8]) {
        self.inbox.push_back(bytes.to_vec());
    }

    /// Queues a setup packet and fires the receive callback.
    pub fn host_send(&mut self, setup: Setup) {
        self.queue(setup);
        self.notify();
    }

    pub fn notify(&mut self) {
        if let Some(callback) = self.callback.as_mut() {
            callback();
        }
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                EndpointOp::Write(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every byte written, zero-length packets dropped.
    pub fn output(&self) -> Vec<u8> {
        self.writes().concat()
    }

    pub fn zlp_count(&self) -> usize {
        self.writes().iter().filter(|data| data.is_empty()).count()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl ControlEndpoint for MockControlEndpoint {
    fn info(&self) -> EndpointInfo {
        EndpointInfo {
            max_packet_size: self.max_packet_size,
        }
    }

    fn connect(&mut self, connect: bool) -> syscall::Result<()> {
        self.ops.push(EndpointOp::Connect(connect));
        self.connected = connect;
        if connect {
            for _ in 0..self.inbox.len() {
                self.notify();
            }
        }
        Ok(())
    }

    fn set_address(&mut self, address: u8) -> syscall::Result<()> {
        self.ops.push(EndpointOp::SetAddress(address));
        Ok(())
    }

    fn on_receive(&mut self, callback: Box<dyn FnMut() + Send>) {
        self.callback = Some(callback);
    }

    fn read(&mut self, buffers: &mut [&mut [u8]]) -> syscall::Result<usize> {
        let packet = match self.inbox.pop_front() {
            Some(packet) => packet,
            None => return Ok(0),
        };

        let mut src = &packet[..];
        let mut count = 0;
        for buf in buffers.iter_mut() {
            let len = buf.len().min(src.len());
            buf[..len].copy_from_slice(&src[..len]);
            src = &src[len..];
            count += len;
        }
        Ok(count)
    }

    fn write(&mut self, data: &[&[u8]]) -> syscall::Result<()> {
        self.ops.push(EndpointOp::Write(data.concat()));
        Ok(())
    }

    fn stall(&mut self, stall: bool) -> syscall::Result<()> {
        self.ops.push(EndpointOp::Stall(stall));
        Ok(())
    }
}

/// A vendor interface with one bulk IN endpoint and a name string.
pub struct MockInterface {
    name: UsbString,
    pub number: u8,
    pub string_index: u8,
    /// bRequest this interface answers.
    pub request: u8,
    pub response: Vec<u8>,
    pub received: Vec<u8>,
    pub handled: Vec<Setup>,
    pub string_queries: usize,
    /// Answers host-to-device requests with a device-to-host data stage.
    pub misbehave: bool,
}

impl MockInterface {
    pub const DESCRIPTOR_LEN: usize = 9 + 7;

    pub fn new(name: &str, request: u8) -> Self {
        Self {
            name: UsbString::new(name).unwrap(),
            number: 0,
            string_index: 0,
            request,
            response: Vec::new(),
            received: Vec::new(),
            handled: Vec::new(),
            string_queries: 0,
            misbehave: false,
        }
    }

    pub fn shared(name: &str, request: u8) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(name, request)))
    }
}

impl Interface for MockInterface {
    fn write_descriptors(
        &mut self,
        start: DescriptorStart,
        writer: &mut DescriptorWriter<'_>,
    ) -> Result<DescriptorCount> {
        if let Some(number) = start.interface {
            self.number = number;
        }
        if let Some(string) = start.string {
            self.string_index = string;
        }

        let interface = InterfaceDescriptor {
            number: self.number,
            alternate_setting: 0,
            endpoints: 1,
            class: ClassCode::VendorSpecific as u8,
            sub_class: 0,
            protocol: 0,
            interface_str: self.string_index,
        };
        let endpoint = EndpointDescriptor::new(1, true, EndpointTy::Bulk, 64, 0);
        writer(&[&interface.to_bytes()[..], &endpoint.to_bytes()[..]])?;

        Ok(DescriptorCount {
            interface: 1,
            string: 1,
        })
    }

    fn write_string_descriptor(
        &mut self,
        index: u8,
        writer: &mut DescriptorWriter<'_>,
    ) -> Result<bool> {
        self.string_queries += 1;
        if index != self.string_index {
            return Ok(false);
        }
        self.name.write_descriptor(writer)?;
        Ok(true)
    }

    fn handle_request(
        &mut self,
        setup: &Setup,
        stage: &mut ControlDataStage<'_>,
    ) -> Result<bool> {
        if (setup.index & 0xFF) as u8 != self.number || setup.request != self.request {
            return Ok(false);
        }

        self.handled.push(*setup);
        match stage.direction() {
            ReqDirection::DeviceToHost => {
                stage.write(&[self.response.as_slice()])?;
            }
            ReqDirection::HostToDevice if self.misbehave => {
                stage.write(&[self.response.as_slice()])?;
            }
            ReqDirection::HostToDevice => {
                let mut buf = [0; 64];
                let len = stage.read(&mut buf)?;
                self.received.extend_from_slice(&buf[..len]);
            }
        }
        Ok(true)
    }
}

/// A two interface function grouped by an interface association descriptor. Owns three
/// strings: the function name and one per interface.
pub struct IadMock {
    names: [UsbString; 3],
    pub first_interface: u8,
    pub first_string: u8,
    pub string_queries: usize,
}

impl IadMock {
    pub const DESCRIPTOR_LEN: usize = 8 + 9 + 9;

    pub fn new() -> Self {
        Self {
            names: [
                UsbString::new("Serial").unwrap(),
                UsbString::new("Serial Control").unwrap(),
                UsbString::new("Serial Data").unwrap(),
            ],
            first_interface: 0,
            first_string: 0,
            string_queries: 0,
        }
    }

    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }
}

impl Interface for IadMock {
    fn write_descriptors(
        &mut self,
        start: DescriptorStart,
        writer: &mut DescriptorWriter<'_>,
    ) -> Result<DescriptorCount> {
        if let Some(number) = start.interface {
            self.first_interface = number;
        }
        if let Some(string) = start.string {
            self.first_string = string;
        }

        let association = InterfaceAssociationDescriptor {
            first_interface: self.first_interface,
            interface_count: 2,
            function_class: ClassCode::CdcControl as u8,
            function_sub_class: 0x02,
            function_protocol: 0x01,
            function_str: self.first_string,
        };
        writer(&[&association.to_bytes()[..]])?;

        for i in 0..2 {
            let interface = InterfaceDescriptor {
                number: self.first_interface + i,
                alternate_setting: 0,
                endpoints: 0,
                class: if i == 0 {
                    ClassCode::CdcControl as u8
                } else {
                    ClassCode::CdcData as u8
                },
                sub_class: 0,
                protocol: 0,
                interface_str: self.first_string + 1 + i,
            };
            writer(&[&interface.to_bytes()[..]])?;
        }

        Ok(DescriptorCount {
            interface: 2,
            string: 3,
        })
    }

    fn write_string_descriptor(
        &mut self,
        index: u8,
        writer: &mut DescriptorWriter<'_>,
    ) -> Result<bool> {
        self.string_queries += 1;
        let offset = match index.checked_sub(self.first_string) {
            Some(offset) if usize::from(offset) < self.names.len() => usize::from(offset),
            _ => return Ok(false),
        };
        self.names[offset].write_descriptor(writer)?;
        Ok(true)
    }

    fn handle_request(
        &mut self,
        _setup: &Setup,
        _stage: &mut ControlDataStage<'_>,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Type-erases a shared mock the way a configuration stores it.
pub fn handle<I: Interface + Send + 'static>(interface: &Arc<Mutex<I>>) -> InterfaceHandle {
    interface.clone()
}

pub fn device() -> Device {
    Device::new(DeviceArguments {
        usb: 0x0200,
        class: ClassCode::UseInterfaceDescriptor,
        sub_class: 0,
        protocol: 0,
        vendor: VENDOR,
        product: PRODUCT,
        release: 0x0100,
        manufacturer: "Redox",
        product_name: "Gadget",
        serial_number: "42",
    })
    .unwrap()
}

pub fn configuration(name: &str, interfaces: Vec<InterfaceHandle>) -> Configuration {
    Configuration::new(name, ConfigAttributes::new(false, false), 50, interfaces).unwrap()
}

/// Bytes of `s` as a string descriptor.
pub fn string_descriptor(s: &str) -> Vec<u8> {
    let units: Vec<u8> = s.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect();
    let mut out = vec![(units.len() + 2) as u8, 0x03];
    out.extend(units);
    out
}
