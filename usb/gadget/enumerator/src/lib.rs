//! USB Gadget Enumeration
//!
//! This crate implements the device side of USB enumeration: the state machine that answers the
//! control requests a host sends over the default control endpoint (endpoint zero) to bring a
//! freshly attached device to the configured state.
//!
//! A USB device controller (UDC) driver provides the transport through the [ControlEndpoint]
//! trait. The functions the device exposes (HID, CDC, mass storage...) plug into configurations
//! through the [usb::Interface] trait. The [Enumerator] owns the device descriptor and the
//! configurations, hands out string indices and interface numbers, computes descriptor lengths
//! and dispatches interface-level requests once the host has selected a configuration.
//!
//! A control transfer begins with an eight byte setup packet, optionally followed by a data stage
//! in the direction the packet announces, and ends with a status stage. Responses longer than the
//! host asked for are cut at wLength, and a zero-length packet terminates the data stage.
//!
//! This documentation will refer directly to the relevant standards, which are as follows:
//!
//! - USB2  - [Universal Serial Bus Specification](https://www.usb.org/document-library/usb-20-specification)
//! - USB32 - [Universal Serial Bus 3.2 Specification Revision 1.1](https://usb.org/document-library/usb-32-revision-11-june-2022)
//!
pub mod config;
pub mod enumerator;
pub mod error;
pub mod sgl;
pub mod udc;
pub mod usb;

pub use config::{ConfigurationNumbering, EnumeratorConfig};
pub use enumerator::{BusResetHandle, ControlEvent, Enumerator, EnumeratorState};
pub use error::{Error, Result};
pub use udc::{ControlDataStage, ControlEndpoint, EndpointInfo};
