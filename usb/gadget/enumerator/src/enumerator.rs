//! The device side of USB enumeration.
//!
//! [Enumerator::enumerate] finalizes the descriptors, connects the control endpoint and answers
//! device requests until the host selects a configuration. After that every control transfer is
//! serviced with one call to [Enumerator::resume_ctrl_transaction].

use std::slice;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace, warn};

use crate::config::{EnumeratorConfig, DEVICE_STRING_COUNT};
use crate::error::{Error, Result};
use crate::sgl::{make_sub_scatter_bytes, scatter_span_size, take_scatter_bytes};
use crate::udc::{ControlDataStage, ControlEndpoint};
use crate::usb::constants::CONFIG_DESC_SIZE;
use crate::usb::{
    lock_interface, to_le_bytes, Configuration, DescriptorKind, DescriptorStart, Device,
    InterfaceHandle, ReqRecipient, ReqType, Setup, SetupReq, StandardRequest, SETUP_PACKET_LEN,
};

/// What the control endpoint tells the enumerator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlEvent {
    /// A setup packet can be read.
    SetupPending,
    /// The host reset the bus. Whoever is waiting gives up.
    BusReset,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnumeratorState {
    Disconnected,
    /// Connected, no configuration selected yet.
    Enumerating,
    Configured,
}

/// Lets the UDC driver abort whatever the enumerator is waiting for.
#[derive(Clone, Debug)]
pub struct BusResetHandle {
    sender: Sender<ControlEvent>,
}

impl BusResetHandle {
    pub fn signal(&self) -> Result<()> {
        self.sender
            .send(ControlEvent::BusReset)
            .map_err(|_| Error::ChannelClosed)
    }
}

pub struct Enumerator<E: ControlEndpoint, const N: usize> {
    endpoint: E,
    device: Device,
    configs: [Configuration; N],
    config: EnumeratorConfig,
    connected: bool,
    active: Option<usize>,
    /// The interface that answered the last interface string request, with its index.
    string_cache: Option<(u8, InterfaceHandle)>,
    events: Receiver<ControlEvent>,
    notifier: Sender<ControlEvent>,
}

fn narrow(value: usize, what: &'static str) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::OutOfDomain { what, index: value })
}

/// Asks `handle` for string `index`, bounding the answer to `length` bytes. Terminates the data
/// stage when the interface owns the index.
fn write_interface_string<E: ControlEndpoint>(
    endpoint: &mut E,
    handle: &InterfaceHandle,
    index: u8,
    length: usize,
) -> Result<bool> {
    let mut remaining = length;
    let mut writer = |data: &[&[u8]]| -> Result<()> {
        let bounded = take_scatter_bytes(data, remaining);
        let len = scatter_span_size(&bounded);
        if len == 0 {
            return Ok(());
        }
        endpoint.write(&bounded)?;
        remaining -= len;
        Ok(())
    };
    let found = lock_interface(handle).write_string_descriptor(index, &mut writer)?;

    if found {
        endpoint.write(&[])?;
    }
    Ok(found)
}

impl<E: ControlEndpoint, const N: usize> Enumerator<E, N> {
    /// Takes ownership of everything that will be reported to the host. Nothing is sent until
    /// [Enumerator::enumerate] is called.
    pub fn new(
        endpoint: E,
        device: Device,
        configs: [Configuration; N],
        config: EnumeratorConfig,
    ) -> Result<Self> {
        config.validate(N)?;
        let (notifier, events) = crossbeam_channel::unbounded();

        Ok(Self {
            endpoint,
            device,
            configs,
            config,
            connected: false,
            active: None,
            string_cache: None,
            events,
            notifier,
        })
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configs
    }

    pub fn config(&self) -> &EnumeratorConfig {
        &self.config
    }

    pub fn state(&self) -> EnumeratorState {
        if !self.connected {
            EnumeratorState::Disconnected
        } else if self.active.is_some() {
            EnumeratorState::Configured
        } else {
            EnumeratorState::Enumerating
        }
    }

    pub fn active_configuration(&self) -> Result<&Configuration> {
        self.active
            .map(|index| &self.configs[index])
            .ok_or(Error::NotPermitted("no active configuration"))
    }

    pub fn bus_reset_handle(&self) -> BusResetHandle {
        BusResetHandle {
            sender: self.notifier.clone(),
        }
    }

    /// Stops signalling presence to the host and forgets the active configuration.
    pub fn disconnect(&mut self) -> Result<()> {
        self.endpoint.connect(false)?;
        self.reset_state();
        info!("control endpoint disconnected");
        Ok(())
    }

    fn reset_state(&mut self) {
        self.connected = false;
        self.active = None;
        self.string_cache = None;
    }

    /// Runs enumeration until the host selects a configuration.
    ///
    /// Calling this again re-enumerates from scratch: the endpoint is disconnected first if a
    /// configuration is active, and every index is recomputed from the starting string index.
    pub fn enumerate(&mut self) -> Result<()> {
        if self.state() == EnumeratorState::Configured {
            info!("re-enumerating, dropping the active configuration");
            self.disconnect()?;
        }
        self.active = None;
        self.string_cache = None;

        self.prepare()?;

        while self.events.try_recv().is_ok() {}
        let notifier = self.notifier.clone();
        self.endpoint.on_receive(Box::new(move || {
            let _ = notifier.send(ControlEvent::SetupPending);
        }));

        self.endpoint.connect(true)?;
        self.connected = true;
        info!("control endpoint connected, waiting for the host");

        loop {
            self.wait_for_setup()?;

            let setup = match self.read_setup()? {
                Some(setup) => setup,
                None => continue,
            };
            debug!("enumeration request {:02X?}", setup);

            if setup.recipient() != ReqRecipient::Device {
                return Err(Error::ProtocolViolation {
                    recipient: setup.req_recipient(),
                });
            }

            self.handle_standard_device_request(&setup)?;

            if setup.standard_request() == StandardRequest::Known(SetupReq::SetConfiguration)
                && self.active.is_some()
            {
                break;
            }
        }

        info!(
            "configured with bConfigurationValue {}",
            self.active_configuration()?.configuration_value()
        );
        Ok(())
    }

    /// Services one control transfer once a configuration is active.
    pub fn resume_ctrl_transaction(&mut self) -> Result<()> {
        self.wait_for_setup()?;

        let setup = match self.read_setup()? {
            Some(setup) => setup,
            None => return Ok(()),
        };
        debug!("control request {:02X?}", setup);

        if setup.request_type() == ReqType::Standard
            && setup.standard_request() == StandardRequest::Invalid
        {
            warn!("ignoring invalid standard request {:#04x}", setup.request);
            return Ok(());
        }

        if setup.is_get_string_descriptor() {
            return self.handle_get_string_descriptor(&setup);
        }

        if setup.recipient() == ReqRecipient::Device && setup.request_type() == ReqType::Standard
        {
            return self.handle_standard_device_request(&setup);
        }

        self.dispatch_to_interfaces(&setup)
    }

    fn wait_for_setup(&mut self) -> Result<()> {
        let event = match self.config.setup_timeout_ms {
            Some(ms) => self
                .events
                .recv_timeout(Duration::from_millis(ms))
                .map_err(|err| match err {
                    RecvTimeoutError::Timeout => Error::Timeout,
                    RecvTimeoutError::Disconnected => Error::ChannelClosed,
                })?,
            None => self.events.recv().map_err(|_| Error::ChannelClosed)?,
        };

        match event {
            ControlEvent::SetupPending => Ok(()),
            ControlEvent::BusReset => {
                info!("bus reset, dropping the active configuration");
                self.reset_state();
                Err(Error::BusReset)
            }
        }
    }

    /// Reads the pending setup packet. A notification with nothing to read is a spurious wakeup
    /// and yields `None` in both phases; a partial packet is an error.
    fn read_setup(&mut self) -> Result<Option<Setup>> {
        let mut raw = [0; SETUP_PACKET_LEN];
        let read = self.endpoint.read(&mut [&mut raw[..]])?;
        if read == 0 {
            trace!("spurious notification without data");
            return Ok(None);
        }
        if read != SETUP_PACKET_LEN {
            return Err(Error::MessageSize {
                expected: SETUP_PACKET_LEN,
                actual: read,
            });
        }
        Setup::from_bytes(&raw).map(Some)
    }

    /// Assigns string indices, configuration values and interface numbers, and computes
    /// wTotalLength and bNumInterfaces of every configuration.
    fn prepare(&mut self) -> Result<()> {
        let start = usize::from(self.config.starting_string_index);
        let fixed_end = self.config.fixed_string_end(N);

        self.device.set_string_indices(
            narrow(start, "string")?,
            narrow(start + 1, "string")?,
            narrow(start + 2, "string")?,
        );
        self.device.set_configurations(narrow(N, "configuration")?);

        let mut next_string = fixed_end;
        for (i, conf) in self.configs.iter_mut().enumerate() {
            conf.set_configuration_str(narrow(start + DEVICE_STRING_COUNT + i, "string")?);
            conf.set_configuration_value(narrow(
                self.config.configuration_numbering.value_of(i),
                "configuration",
            )?);

            let mut next_interface = 0;
            let mut total = usize::from(CONFIG_DESC_SIZE);
            for handle in conf.interfaces() {
                let first = DescriptorStart::new(
                    narrow(next_interface, "interface")?,
                    narrow(next_string, "string")?,
                );
                let mut emitted = 0;
                let count = lock_interface(handle).write_descriptors(
                    first,
                    &mut |data: &[&[u8]]| -> Result<()> {
                        emitted += scatter_span_size(data);
                        Ok(())
                    },
                )?;

                next_interface += usize::from(count.interface);
                next_string += usize::from(count.string);
                total += emitted;
            }

            conf.set_num_interfaces(narrow(next_interface, "interface")?);
            conf.set_total_length(u16::try_from(total).map_err(|_| Error::OutOfDomain {
                what: "configuration length",
                index: total,
            })?);

            debug!(
                "configuration {}: {} interfaces, {} bytes",
                i,
                conf.num_interfaces(),
                total
            );
        }

        Ok(())
    }

    fn handle_standard_device_request(&mut self, setup: &Setup) -> Result<()> {
        match setup.standard_request() {
            StandardRequest::Known(SetupReq::SetAddress) => {
                let address = (setup.value & 0xFF) as u8;
                self.endpoint.write(&[])?;
                self.endpoint.set_address(address)?;
                info!("host assigned address {}", address);
                Ok(())
            }
            StandardRequest::Known(SetupReq::GetDescriptor) => self.handle_get_descriptor(setup),
            StandardRequest::Known(SetupReq::GetConfiguration) => {
                let value = [self.active_configuration()?.configuration_value()];
                let sub = make_sub_scatter_bytes(usize::from(setup.length), [&value[..]]);
                self.endpoint.write(sub.as_slice())?;
                Ok(())
            }
            StandardRequest::Known(SetupReq::SetConfiguration) => {
                self.handle_set_configuration(setup)
            }
            _ => Err(Error::InvalidRequest {
                request: setup.request,
            }),
        }
    }

    fn handle_set_configuration(&mut self, setup: &Setup) -> Result<()> {
        let value = setup.value & 0xFF;
        match self.config.configuration_numbering.index_of(value) {
            None => {
                self.active = None;
                info!("returned to the addressed state");
            }
            Some(index) if index < N => {
                self.active = Some(index);
                debug!("configuration {} selected", index);
            }
            Some(_) => {
                return Err(Error::OutOfDomain {
                    what: "configuration",
                    index: usize::from(value),
                })
            }
        }
        Ok(())
    }

    fn handle_get_descriptor(&mut self, setup: &Setup) -> Result<()> {
        let length = usize::from(setup.length);

        match DescriptorKind::from_u8(setup.descriptor_kind()) {
            Some(DescriptorKind::Device) => {
                let max_packet_size = self.endpoint.info().max_packet_size;
                let packet_size =
                    u8::try_from(max_packet_size).map_err(|_| Error::OutOfDomain {
                        what: "max packet size",
                        index: usize::from(max_packet_size),
                    })?;
                self.device.set_packet_size(packet_size);

                let header = Device::header();
                let sub = make_sub_scatter_bytes(length, [&header[..], self.device.as_bytes()]);
                self.endpoint.write_and_flush(sub.as_slice())?;
                Ok(())
            }
            Some(DescriptorKind::Configuration) => self.write_configuration_descriptor(setup),
            Some(DescriptorKind::String) => self.handle_get_string_descriptor(setup),
            _ => Err(Error::NotSupported {
                kind: setup.descriptor_kind(),
            }),
        }
    }

    fn write_configuration_descriptor(&mut self, setup: &Setup) -> Result<()> {
        let length = usize::from(setup.length);
        let index = usize::from(setup.descriptor_index());
        let conf = self.configs.get(index).ok_or(Error::OutOfDomain {
            what: "configuration",
            index,
        })?;

        if length <= 2 {
            let total = to_le_bytes(conf.total_length());
            let sub = make_sub_scatter_bytes(length, [&total[..]]);
            self.endpoint.write_and_flush(sub.as_slice())?;
            return Ok(());
        }

        let header = Configuration::header();
        let sub = make_sub_scatter_bytes(length, [&header[..], conf.as_bytes()]);
        self.endpoint.write(sub.as_slice())?;

        if length <= usize::from(CONFIG_DESC_SIZE) {
            self.endpoint.write(&[])?;
            return Ok(());
        }

        let mut emitted = usize::from(CONFIG_DESC_SIZE);
        let endpoint = &mut self.endpoint;
        for handle in conf.interfaces() {
            lock_interface(handle).write_descriptors(
                DescriptorStart::NONE,
                &mut |data: &[&[u8]]| -> Result<()> {
                    let len = scatter_span_size(data);
                    if len == 0 {
                        return Ok(());
                    }
                    endpoint.write(data)?;
                    emitted += len;
                    Ok(())
                },
            )?;
        }

        if emitted != usize::from(conf.total_length()) {
            warn!(
                "configuration {} emitted {} bytes, wTotalLength is {}",
                index,
                emitted,
                conf.total_length()
            );
        }

        self.endpoint.write(&[])?;
        Ok(())
    }

    fn handle_get_string_descriptor(&mut self, setup: &Setup) -> Result<()> {
        let index = setup.descriptor_index();
        let length = usize::from(setup.length);

        if index == 0 {
            let languages = self.config.language().descriptor();
            let sub = make_sub_scatter_bytes(length, [&languages[..]]);
            self.endpoint.write_and_flush(sub.as_slice())?;
            return Ok(());
        }

        let start = usize::from(self.config.starting_string_index);
        let fixed_end = self.config.fixed_string_end(N);
        let position = usize::from(index);

        if (start..fixed_end).contains(&position) {
            self.string_cache = None;
            let string = match position - start {
                0 => &self.device.manufacturer,
                1 => &self.device.product,
                2 => &self.device.serial_number,
                n => &self.configs[n - DEVICE_STRING_COUNT].name,
            };
            let header = string.header();
            let sub = make_sub_scatter_bytes(length, [&header[..], string.as_bytes()]);
            self.endpoint.write_and_flush(sub.as_slice())?;
            return Ok(());
        }

        if position < start {
            return Err(Error::OutOfDomain {
                what: "string",
                index: position,
            });
        }

        if let Some((cached, handle)) = &self.string_cache {
            if *cached == index
                && write_interface_string(&mut self.endpoint, handle, index, length)?
            {
                trace!("string {} answered from cache", index);
                return Ok(());
            }
        }

        // Strings may be requested before SET_CONFIGURATION.
        let candidates = match self.active {
            Some(active) => slice::from_ref(&self.configs[active]),
            None => &self.configs[..],
        };
        for conf in candidates {
            for handle in conf.interfaces() {
                if write_interface_string(&mut self.endpoint, handle, index, length)? {
                    self.string_cache = Some((index, handle.clone()));
                    return Ok(());
                }
            }
        }

        Err(Error::OutOfDomain {
            what: "string",
            index: position,
        })
    }

    fn dispatch_to_interfaces(&mut self, setup: &Setup) -> Result<()> {
        let active = self
            .active
            .ok_or(Error::NotPermitted("no active configuration"))?;

        let mut outcome = Ok(false);
        for handle in self.configs[active].interfaces() {
            let mut stage = ControlDataStage::new(&mut self.endpoint, setup);
            outcome = lock_interface(handle).handle_request(setup, &mut stage);
            if !matches!(outcome, Ok(false)) {
                break;
            }
        }

        // The status stage is owed even when the interface failed.
        self.endpoint.write(&[])?;

        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::UnhandledRequest {
                request: setup.request,
                recipient: setup.req_recipient(),
            }),
            Err(err) => {
                warn!("interface failed request {:#04x}: {}", setup.request, err);
                Err(err)
            }
        }
    }
}
