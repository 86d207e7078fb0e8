//! Device session errors.

use hidapi::HidError;
use thiserror::Error;

/// Errors raised while talking to the keyboard.
#[derive(Error, Debug)]
pub enum SessionError {
    /// HID subsystem could not be initialised.
    #[error("unable to access HID: {0}")]
    Unavailable(#[source] HidError),

    /// No interface with the lighting usage was enumerated.
    #[error(
        "lighting interface not found (VID {vendor_id:04x}, PID {product_id:04x}, usage \
         {usage}, usage page {usage_page})"
    )]
    NotFound { vendor_id: u16, product_id: u16, usage: u16, usage_page: u16 },

    /// Every matching interface failed to open.
    #[error("unable to open device: {0} (root permissions required)")]
    Open(#[source] HidError),

    /// Device accepted fewer bytes than the packet holds.
    #[error("device accepted {written} of 64 bytes")]
    ShortWrite { written: usize },

    /// I/O error while writing the packet.
    #[error("unable to write packet: {0}")]
    Write(#[source] HidError),

    #[error("session is not connected")]
    NotConnected,

    #[error("packet must be 64 bytes, got {0}")]
    PacketLength(usize),
}
