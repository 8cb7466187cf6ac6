//! The device controller side of the default control endpoint.

use log::trace;

use crate::error::{Error, Result};
use crate::sgl::{scatter_span_size, take_scatter_bytes};
use crate::usb::{ReqDirection, Setup};

/// Static capabilities of a control endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EndpointInfo {
    /// bMaxPacketSize0 as supported by the controller.
    pub max_packet_size: u16,
}

/// The transport for endpoint zero, provided by a UDC driver.
///
/// Writing an empty scatter list sends a zero-length packet.
pub trait ControlEndpoint {
    fn info(&self) -> EndpointInfo;

    /// Starts (`true`) or stops signalling presence to the host.
    fn connect(&mut self, connect: bool) -> syscall::Result<()>;

    /// Adopts `address`. Called after the status stage of SET_ADDRESS has been queued, so the
    /// controller must not switch addresses before that stage completes.
    fn set_address(&mut self, address: u8) -> syscall::Result<()>;

    /// Registers the function invoked whenever new bytes can be read. Replaces any previously
    /// registered callback.
    fn on_receive(&mut self, callback: Box<dyn FnMut() + Send>);

    /// Scatter read of whatever is pending. Returns the number of bytes read.
    fn read(&mut self, buffers: &mut [&mut [u8]]) -> syscall::Result<usize>;

    /// Gather write of one response fragment.
    fn write(&mut self, data: &[&[u8]]) -> syscall::Result<()>;

    fn stall(&mut self, stall: bool) -> syscall::Result<()>;

    /// Writes `data` then terminates the data stage with a zero-length packet.
    fn write_and_flush(&mut self, data: &[&[u8]]) -> syscall::Result<()> {
        self.write(data)?;
        self.write(&[])
    }
}

/// The data stage of one interface-level control transfer.
///
/// Enforces the request direction and never moves more than wLength bytes in total.
pub struct ControlDataStage<'a> {
    endpoint: &'a mut dyn ControlEndpoint,
    direction: ReqDirection,
    remaining: usize,
}

impl<'a> ControlDataStage<'a> {
    pub fn new(endpoint: &'a mut dyn ControlEndpoint, setup: &Setup) -> Self {
        Self {
            endpoint,
            direction: setup.direction(),
            remaining: usize::from(setup.length),
        }
    }

    pub fn direction(&self) -> ReqDirection {
        self.direction
    }

    /// Bytes left before wLength is reached.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Sends response bytes to the host, cut to what is left of wLength.
    pub fn write(&mut self, data: &[&[u8]]) -> Result<usize> {
        if self.direction != ReqDirection::DeviceToHost {
            return Err(Error::WrongDirection);
        }

        let bounded = take_scatter_bytes(data, self.remaining);
        let len = scatter_span_size(&bounded);
        if len == 0 {
            return Ok(0);
        }

        self.endpoint.write(&bounded)?;
        self.remaining -= len;
        trace!("data stage wrote {} bytes, {} left", len, self.remaining);
        Ok(len)
    }

    /// Receives payload bytes from the host into `buf`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.direction != ReqDirection::HostToDevice {
            return Err(Error::WrongDirection);
        }

        let bound = buf.len().min(self.remaining);
        if bound == 0 {
            return Ok(0);
        }

        let len = self.endpoint.read(&mut [&mut buf[..bound]])?;
        self.remaining -= len.min(self.remaining);
        trace!("data stage read {} bytes, {} left", len, self.remaining);
        Ok(len)
    }
}
