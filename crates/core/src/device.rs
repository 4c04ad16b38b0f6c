//! Device model: discovery and the hidapi-backed connector.

use crate::error::{Error, Result};
use crate::transport::{HidConnector, HidTransport};
use crate::{pids, LOGITECH_VID};
use std::ffi::CString;
use tracing::{debug, info};

/// Supported Logitech headset models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadsetModel {
    G733,
}

impl HeadsetModel {
    /// Look up model from USB product ID.
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            pids::G733 => Some(Self::G733),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::G733 => "Logitech G733 Lightspeed",
        }
    }

    /// USB Product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::G733 => pids::G733,
        }
    }
}

/// Information about a discovered headset interface.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub model: HeadsetModel,
    pub vid: u16,
    pub pid: u16,
    pub path: String,
    pub serial: Option<String>,
    pub interface: i32,
}

fn matching_devices(api: &hidapi::HidApi) -> Vec<(DeviceInfo, CString)> {
    api.device_list()
        .filter(|info| info.vendor_id() == LOGITECH_VID)
        .filter_map(|info| {
            let model = HeadsetModel::from_pid(info.product_id())?;
            Some((
                DeviceInfo {
                    model,
                    vid: info.vendor_id(),
                    pid: info.product_id(),
                    path: info.path().to_string_lossy().into_owned(),
                    serial: info.serial_number().map(|s| s.to_string()),
                    interface: info.interface_number(),
                },
                info.path().to_owned(),
            ))
        })
        .collect()
}

/// Discover all connected headset receivers.
///
/// A receiver exposes several HID interfaces; each one is listed.
pub fn discover_devices() -> Result<Vec<DeviceInfo>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;

    let devices: Vec<DeviceInfo> = matching_devices(&api)
        .into_iter()
        .map(|(info, _)| info)
        .collect();
    for dev in &devices {
        info!(
            model = dev.model.name(),
            vid = format_args!("0x{:04X}", dev.vid),
            pid = format_args!("0x{:04X}", dev.pid),
            interface = dev.interface,
            path = %dev.path,
            "Found Logitech headset"
        );
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// Opens the first matching headset interface through hidapi.
///
/// The `HidApi` context is created on first use and re-enumerated on every
/// open, so a receiver plugged in after startup is picked up.
#[derive(Default)]
pub struct HidapiConnector {
    api: Option<hidapi::HidApi>,
}

impl HidapiConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn api(&mut self) -> Result<&mut hidapi::HidApi> {
        let api = match self.api.take() {
            Some(mut api) => {
                api.refresh_devices()
                    .map_err(|e| Error::Hid(format!("refresh devices: {e}")))?;
                api
            }
            None => hidapi::HidApi::new().map_err(|e| Error::Hid(format!("hidapi init: {e}")))?,
        };
        Ok(self.api.insert(api))
    }
}

impl HidConnector for HidapiConnector {
    fn open(&mut self) -> Result<Box<dyn HidTransport>> {
        let api = self.api()?;
        let (info, path) = matching_devices(api).into_iter().next().ok_or_else(|| {
            Error::DeviceNotFound(format!(
                "no {} (VID=0x{:04X} PID=0x{:04X})",
                HeadsetModel::G733.name(),
                LOGITECH_VID,
                pids::G733
            ))
        })?;

        let device = api
            .open_path(&path)
            .map_err(|e| Error::Hid(format!("open {}: {e}", info.path)))?;
        info!(model = info.model.name(), path = %info.path, "Opened headset");
        Ok(Box::new(HidapiSession { device }))
    }
}

struct HidapiSession {
    device: hidapi::HidDevice,
}

impl HidTransport for HidapiSession {
    fn write_report(&mut self, data: &[u8]) -> Result<usize> {
        self.device
            .write(data)
            .map_err(|e| Error::Hid(format!("write: {e}")))
    }

    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        self.device
            .read_timeout(buf, timeout_ms)
            .map_err(|e| Error::Hid(format!("read_timeout: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headset_model_from_known_pid() {
        assert_eq!(HeadsetModel::from_pid(0x0AB5), Some(HeadsetModel::G733));
        assert_eq!(HeadsetModel::G733.pid(), 0x0AB5);
    }

    #[test]
    fn headset_model_from_unknown_pid() {
        assert_eq!(HeadsetModel::from_pid(0xC08D), None);
        assert_eq!(HeadsetModel::from_pid(0x0000), None);
    }

    #[test]
    fn model_name_non_empty() {
        assert!(HeadsetModel::G733.name().contains("G733"));
    }
}
