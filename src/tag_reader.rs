//! RFID polling task.
//!
//! Every [`TAG_POLL_PERIOD`] the transceiver is asked for a new card. A UID
//! that reads cleanly is queued for the access machine with a short bounded
//! wait; if the queue stays full the tag is dropped, not retried. The card is
//! halted and its crypto session stopped after every detection.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{with_timeout, Ticker};

use crate::config::{TAG_ENQUEUE_TIMEOUT, TAG_POLL_PERIOD};
use crate::drivers::RfidTransceiver;
use crate::uid::TagUid;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// No card in the field.
    Empty,
    /// A card answered but its UID could not be read.
    ReadFailed,
    Queued(TagUid),
    Dropped(TagUid),
}

pub struct TagReader<R> {
    rfid: R,
}

impl<R: RfidTransceiver> TagReader<R> {
    pub fn new(rfid: R) -> Self {
        Self { rfid }
    }

    /// Poll the transceiver once and queue any UID read.
    pub async fn poll_once<const N: usize>(
        &mut self,
        tags: &Sender<'_, CriticalSectionRawMutex, TagUid, N>,
    ) -> Poll {
        if !self.rfid.card_present() {
            return Poll::Empty;
        }

        let poll = match self.rfid.read_uid() {
            Ok(bytes) => {
                let uid = TagUid::from_bytes(bytes);
                match with_timeout(TAG_ENQUEUE_TIMEOUT, tags.send(uid.clone())).await {
                    Ok(()) => Poll::Queued(uid),
                    Err(_) => Poll::Dropped(uid),
                }
            }
            Err(e) => {
                log::debug!("rfid: uid read failed: {}", e);
                Poll::ReadFailed
            }
        };

        self.rfid.halt();
        self.rfid.stop_crypto();
        poll
    }

    pub async fn run<const N: usize>(
        mut self,
        tags: Sender<'_, CriticalSectionRawMutex, TagUid, N>,
    ) -> ! {
        log::info!("rfid: started, period={}ms", TAG_POLL_PERIOD.as_millis());
        let mut ticker = Ticker::every(TAG_POLL_PERIOD);

        loop {
            match self.poll_once(&tags).await {
                Poll::Queued(uid) => log::info!("rfid: tag uid={}", uid),
                Poll::Dropped(uid) => log::warn!("rfid: queue full, dropping tag uid={}", uid),
                Poll::Empty | Poll::ReadFailed => {}
            }
            ticker.next().await;
        }
    }

    pub fn into_inner(self) -> R {
        self.rfid
    }
}
