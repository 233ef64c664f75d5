//! Metadata listeners
//!
//! A listener receives every non-empty metadata record, synchronously, on the
//! thread that is reading the stream. Implementations must return quickly.

use crossbeam_channel::{Receiver, Sender};

use crate::stream::metadata::MetadataRecord;

/// Receives decoded ICY metadata
pub trait MetadataListener {
    fn on_metadata(&mut self, record: MetadataRecord);
}

impl<F> MetadataListener for F
where
    F: FnMut(MetadataRecord),
{
    fn on_metadata(&mut self, record: MetadataRecord) {
        self(record)
    }
}

/// Forwards records to another thread over a crossbeam channel.
///
/// A dropped receiver is ignored so the audio side keeps flowing.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<MetadataRecord>,
}

impl ChannelListener {
    pub fn new(tx: Sender<MetadataRecord>) -> Self {
        Self { tx }
    }

    /// Listener plus the receiving end of an unbounded channel
    pub fn channel() -> (Self, Receiver<MetadataRecord>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl MetadataListener for ChannelListener {
    fn on_metadata(&mut self, record: MetadataRecord) {
        if self.tx.send(record).is_err() {
            log::trace!("[ICY] metadata receiver gone, dropping record");
        }
    }
}

/// Discards all metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl MetadataListener for NoopListener {
    fn on_metadata(&mut self, _record: MetadataRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn sample() -> MetadataRecord {
        [("StreamTitle", "Test")].into_iter().collect()
    }

    #[test]
    fn closure_listener_receives_record() {
        let mut seen = Vec::new();
        {
            let mut listener = |r: MetadataRecord| seen.push(r);
            listener.on_metadata(sample());
        }
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].stream_title(), Some("Test"));
    }

    #[test]
    fn sender_listener_forwards() {
        let (tx, rx) = unbounded();
        ChannelListener::new(tx).on_metadata(sample());
        let got = rx.try_recv().unwrap();
        assert_eq!(got.stream_title(), Some("Test"));
    }

    #[test]
    fn channel_pair_connected() {
        let (mut listener, rx) = ChannelListener::channel();
        listener.on_metadata(sample());
        listener.on_metadata(MetadataRecord::new());
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn sender_listener_ignores_closed_channel() {
        let (tx, rx) = unbounded::<MetadataRecord>();
        drop(rx);
        ChannelListener::new(tx).on_metadata(sample());
    }

    #[test]
    fn noop_listener_accepts_anything() {
        NoopListener.on_metadata(sample());
    }
}
