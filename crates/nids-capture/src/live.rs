//! Live interface capture, backed by `pcap`. Gated behind the `live`
//! feature since the capture backend itself is an external collaborator;
//! this module only adapts it to [`PacketSource`].

use crate::decode::decode_frame;
use crate::PacketSource;
use nids_common::{NidsError, NidsResult, PacketEvent};
use pcap::{Active, Capture, Device};

/// Captures from a named interface, or the platform default if `iface`
/// is `None`. Permission-denied and device-not-found are fatal per the
/// capture contract; malformed frames are decoded-then-skipped.
pub struct LiveCaptureSource {
    capture: Capture<Active>,
}

impl LiveCaptureSource {
    pub fn open(iface: Option<&str>) -> NidsResult<Self> {
        let device = match iface {
            Some(name) => Device::list()
                .map_err(|e| NidsError::CaptureError(e.to_string()))?
                .into_iter()
                .find(|d| d.name == name)
                .ok_or_else(|| NidsError::CaptureError(format!("no such interface: {name}")))?,
            None => Device::lookup()
                .map_err(|e| NidsError::CaptureError(e.to_string()))?
                .ok_or_else(|| NidsError::CaptureError("no default capture device".into()))?,
        };
        let capture = Capture::from_device(device)
            .map_err(|e| NidsError::CaptureError(e.to_string()))?
            .promisc(true)
            .snaplen(65535)
            .timeout(1000)
            .open()
            .map_err(|e| NidsError::CaptureError(e.to_string()))?;
        Ok(Self { capture })
    }
}

impl PacketSource for LiveCaptureSource {
    fn next_event(&mut self) -> NidsResult<Option<PacketEvent>> {
        loop {
            return match self.capture.next_packet() {
                Ok(packet) => {
                    let ts = packet.header.ts.tv_sec as f64 + packet.header.ts.tv_usec as f64 / 1e6;
                    match decode_frame(ts, packet.data) {
                        Some(event) => Ok(Some(event)),
                        None => continue,
                    }
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(pcap::Error::NoMorePackets) => Ok(None),
                Err(e) => Err(NidsError::CaptureError(e.to_string())),
            };
        }
    }
}
