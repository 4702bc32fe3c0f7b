//! Ethernet/IP frame decoding into [`nids_common::PacketEvent`].
//!
//! Protocol/port fields are filled when the corresponding L4 header is
//! present; ICMP and unrecognized protocols yield absent ports. Malformed
//! frames are silently skipped rather than surfaced as errors, matching
//! the capture contract in the component design.

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use nids_common::{Direction, PacketEvent, Protocol};

/// Decode one raw Ethernet frame captured at `ts` seconds. Returns `None`
/// for anything that isn't a parseable IPv4 frame (non-IP traffic,
/// truncated captures, IPv6 -- out of scope for this engine).
pub fn decode_frame(ts: f64, frame: &[u8]) -> Option<PacketEvent> {
    let sliced = SlicedPacket::from_ethernet(frame).ok()?;
    let ipv4 = match sliced.net? {
        NetSlice::Ipv4(ipv4) => ipv4,
        NetSlice::Ipv6(_) => return None,
    };
    let src_ip = ipv4.header().source_addr();
    let dst_ip = ipv4.header().destination_addr();

    let (protocol, src_port, dst_port) = match sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            (Protocol::Tcp, Some(tcp.source_port()), Some(tcp.destination_port()))
        }
        Some(TransportSlice::Udp(udp)) => {
            (Protocol::Udp, Some(udp.source_port()), Some(udp.destination_port()))
        }
        Some(TransportSlice::Icmpv4(_)) => (Protocol::Icmp, None, None),
        Some(TransportSlice::Icmpv6(_)) => return None,
        None => (Protocol::Other, None, None),
    };

    Some(PacketEvent {
        timestamp: ts,
        src_ip: src_ip.to_string(),
        dst_ip: dst_ip.to_string(),
        src_port,
        dst_port,
        protocol,
        packet_size: frame.len() as u64,
        direction: Direction::classify(src_ip, dst_ip),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_frame(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16) -> Vec<u8> {
        let builder = etherparse::PacketBuilder::ethernet2(
            [0, 1, 2, 3, 4, 5],
            [6, 7, 8, 9, 10, 11],
        )
        .ipv4(src, dst, 64)
        .tcp(src_port, dst_port, 0, 1024);
        let payload = b"hello";
        let mut buf = Vec::new();
        builder.write(&mut buf, payload).unwrap();
        buf
    }

    #[test]
    fn decodes_tcp_frame_with_ports() {
        let frame = tcp_frame([192, 168, 1, 10], [127, 0, 0, 1], 4321, 22);
        let event = decode_frame(1.0, &frame).unwrap();
        assert_eq!(event.src_ip, "192.168.1.10");
        assert_eq!(event.dst_ip, "127.0.0.1");
        assert_eq!(event.dst_port, Some(22));
        assert_eq!(event.protocol, Protocol::Tcp);
    }

    #[test]
    fn truncated_frame_is_skipped() {
        assert!(decode_frame(1.0, &[0u8; 4]).is_none());
    }
}
