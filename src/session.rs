//! Keyboard HID session.
//!
//! The keyboard exposes several HID interfaces under one vendor/product pair. Lighting reports
//! are only accepted by the vendor interface identified by its usage and usage page, so every
//! connect enumerates afresh and filters on both.

use std::ffi::CString;

use bytes::Bytes;
use hidapi::{DeviceInfo, HidApi, HidDevice, HidResult};
use tracing::{debug, warn};

use crate::controller::HidEndpoint;
use crate::error::SessionError;
use crate::sonix::{self, PACKET_LEN};

/// Maximum time spent waiting for the acknowledgment report.
const ACK_TIMEOUT_MS: i32 = 100;

/// One enumerated HID interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage: u16,
    pub usage_page: u16,
    pub interface_number: i32,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub path: CString,
}

impl DeviceDescriptor {
    /// Check if this is the keyboard's lighting interface.
    pub fn is_lighting_interface(&self) -> bool {
        self.is_keyboard() && self.usage == sonix::USAGE && self.usage_page == sonix::USAGE_PAGE
    }

    fn is_keyboard(&self) -> bool {
        self.vendor_id == sonix::VENDOR_ID && self.product_id == sonix::PRODUCT_ID
    }
}

impl From<&DeviceInfo> for DeviceDescriptor {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            usage: info.usage(),
            usage_page: info.usage_page(),
            interface_number: info.interface_number(),
            manufacturer: info.manufacturer_string().map(String::from),
            product: info.product_string().map(String::from),
            path: info.path().to_owned(),
        }
    }
}

/// List the keyboard's HID interfaces, or every HID interface if `all` is set.
pub fn enumerate(api: &HidApi, all: bool) -> Vec<DeviceDescriptor> {
    api.device_list()
        .map(DeviceDescriptor::from)
        .filter(|descriptor| all || descriptor.is_keyboard())
        .collect()
}

/// Identification of the opened interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub path: String,
}

/// Response to a successfully written packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgment {
    /// Report read back from the device.
    Received(Bytes),
    /// Nothing arrived in time, or the read failed.
    Missing,
}

/// Exclusive handle on the lighting interface.
///
/// The handle is released on [`DeviceSession::disconnect`] or when the session is dropped.
pub struct DeviceSession<E: HidEndpoint = HidDevice> {
    endpoint: Option<E>,
    identity: Identity,
}

impl DeviceSession<HidDevice> {
    /// Find and open the keyboard's lighting interface.
    pub fn connect() -> Result<Self, SessionError> {
        let api = HidApi::new().map_err(SessionError::Unavailable)?;

        let candidates: Vec<_> = enumerate(&api, false)
            .into_iter()
            .inspect(|descriptor| {
                debug!(
                    usage = descriptor.usage,
                    usage_page = descriptor.usage_page,
                    interface = descriptor.interface_number,
                    "enumerated keyboard interface"
                )
            })
            .filter(DeviceDescriptor::is_lighting_interface)
            .collect();

        Self::open_first(&candidates, |descriptor| api.open_path(&descriptor.path))
    }
}

impl<E: HidEndpoint> DeviceSession<E> {
    /// Open the first candidate that can be opened, in enumeration order.
    pub(crate) fn open_first<F>(
        candidates: &[DeviceDescriptor],
        mut open: F,
    ) -> Result<Self, SessionError>
    where
        F: FnMut(&DeviceDescriptor) -> HidResult<E>,
    {
        if candidates.len() > 1 {
            debug!(count = candidates.len(), "multiple lighting interfaces, using first to open");
        }

        let mut last_err = None;
        for candidate in candidates {
            let path = candidate.path.to_string_lossy().into_owned();

            match open(candidate) {
                Ok(endpoint) => {
                    debug!(%path, "opened lighting interface");
                    let identity = Identity {
                        manufacturer: endpoint.manufacturer(),
                        product: endpoint.product(),
                        path,
                    };
                    return Ok(Self { endpoint: Some(endpoint), identity });
                },
                Err(err) => {
                    warn!(%path, %err, "unable to open lighting interface");
                    last_err = Some(err);
                },
            }
        }

        match last_err {
            Some(err) => Err(SessionError::Open(err)),
            None => Err(SessionError::NotFound {
                vendor_id: sonix::VENDOR_ID,
                product_id: sonix::PRODUCT_ID,
                usage: sonix::USAGE,
                usage_page: sonix::USAGE_PAGE,
            }),
        }
    }

    /// Identification strings of the opened interface.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Write a command packet and wait briefly for the device's acknowledgment.
    ///
    /// Only the write decides success. The acknowledgment's content is not checked.
    pub fn send(&self, packet: &[u8]) -> Result<Acknowledgment, SessionError> {
        if packet.len() != PACKET_LEN {
            return Err(SessionError::PacketLength(packet.len()));
        }

        let endpoint = self.endpoint.as_ref().ok_or(SessionError::NotConnected)?;

        debug!(packet = %hex::encode(packet), "writing command packet");
        let written = endpoint.write(packet).map_err(SessionError::Write)?;
        if written != PACKET_LEN {
            return Err(SessionError::ShortWrite { written });
        }

        let mut buf = [0; PACKET_LEN];
        match endpoint.read_timeout(&mut buf, ACK_TIMEOUT_MS) {
            Ok(0) => {
                debug!("no acknowledgment within {}ms", ACK_TIMEOUT_MS);
                Ok(Acknowledgment::Missing)
            },
            Ok(len) => {
                let ack = Bytes::copy_from_slice(&buf[..len]);
                debug!(ack = %hex::encode(&ack), "received acknowledgment");
                Ok(Acknowledgment::Received(ack))
            },
            Err(err) => {
                debug!(%err, "acknowledgment read failed");
                Ok(Acknowledgment::Missing)
            },
        }
    }

    /// Release the device handle.
    pub fn disconnect(&mut self) {
        if self.endpoint.take().is_some() {
            debug!(path = %self.identity.path, "closed lighting interface");
        }
    }
}

impl<E: HidEndpoint> Drop for DeviceSession<E> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
