//! Packet Source (C1): decodes captured or replayed frames into typed
//! [`nids_common::PacketEvent`]s.
//!
//! The live-capture backend itself is an external collaborator -- this
//! crate decodes whatever bytes it hands back. Three concrete sources are
//! provided: a newline-delimited-JSON reader (used by the standalone CLI
//! subsystems per the external interface), an Ethernet frame decoder used
//! by both the NDJSON-of-raw-frames path and the live source, and,
//! behind the `live` feature, a `pcap`-backed live interface source.

#![warn(missing_docs)]

pub mod decode;
pub mod ndjson;
#[cfg(feature = "live")]
pub mod live;

pub use decode::decode_frame;
pub use ndjson::NdjsonSource;
#[cfg(feature = "live")]
pub use live::LiveCaptureSource;

use nids_common::{NidsResult, PacketEvent};

/// A lazy sequence of decoded packet events. Implementations may be
/// backed by a live interface, a replay file, or a test fixture.
/// `Send` so the ingestion worker can run on a dedicated blocking thread.
pub trait PacketSource: Send {
    /// Returns the next packet event, or `None` at end of stream.
    /// Malformed frames are skipped internally and never surfaced here.
    fn next_event(&mut self) -> NidsResult<Option<PacketEvent>>;
}

impl PacketSource for Box<dyn PacketSource> {
    fn next_event(&mut self) -> NidsResult<Option<PacketEvent>> {
        (**self).next_event()
    }
}
