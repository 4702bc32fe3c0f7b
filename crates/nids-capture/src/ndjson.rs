//! Newline-delimited JSON packet source, used by the standalone CLI
//! subsystems (aggregator, signature matcher) when composed via pipes
//! instead of a live interface.

use crate::PacketSource;
use nids_common::{NidsResult, PacketEvent};
use std::io::BufRead;

/// Reads one JSON-encoded [`PacketEvent`] per line from any buffered
/// reader. A malformed line is logged and skipped; it never aborts the
/// stream, matching the capture contract's "malformed frames are
/// silently skipped" rule.
pub struct NdjsonSource<R> {
    lines: std::io::Lines<R>,
}

impl<R: BufRead + Send> NdjsonSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead + Send> PacketSource for NdjsonSource<R> {
    fn next_event(&mut self) -> NidsResult<Option<PacketEvent>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PacketEvent>(&line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed packet event line");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_valid_events_and_skips_malformed_lines() {
        let input = concat!(
            "{\"timestamp\":1.0,\"src_ip\":\"1.1.1.1\",\"dst_ip\":\"2.2.2.2\",\"src_port\":null,\"dst_port\":22,\"protocol\":\"Tcp\",\"packet_size\":64,\"direction\":\"External\"}\n",
            "not json at all\n",
        );
        let mut source = NdjsonSource::new(Cursor::new(input));
        let event = source.next_event().unwrap().unwrap();
        assert_eq!(event.dst_port, Some(22));
        assert!(source.next_event().unwrap().is_none());
    }
}
