//! HID endpoint abstraction.

use hidapi::{HidDevice, HidResult};

/// Open HID interface capable of raw report exchange.
pub trait HidEndpoint {
    /// Write a raw report, returning the number of bytes accepted.
    fn write(&self, data: &[u8]) -> HidResult<usize>;

    /// Read a raw report, waiting at most `timeout_ms` milliseconds.
    ///
    /// Returns `0` when nothing arrived in time.
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> HidResult<usize>;

    /// Manufacturer string reported by the device.
    fn manufacturer(&self) -> Option<String>;

    /// Product string reported by the device.
    fn product(&self) -> Option<String>;
}

impl HidEndpoint for HidDevice {
    fn write(&self, data: &[u8]) -> HidResult<usize> {
        HidDevice::write(self, data)
    }

    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> HidResult<usize> {
        HidDevice::read_timeout(self, buf, timeout_ms)
    }

    fn manufacturer(&self) -> Option<String> {
        self.get_manufacturer_string().ok().flatten()
    }

    fn product(&self) -> Option<String> {
        self.get_product_string().ok().flatten()
    }
}
