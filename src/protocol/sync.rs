//! Frame synchronizer
//!
//! Scans the incoming byte stream for the sync sentinel that marks the
//! start of a frame. This is best-effort resynchronization, not framing
//! with length prefixes or CRC: if noise happens to contain the sentinel
//! byte pair, the scan locks onto a false frame start and the following
//! frame decodes as garbage until the next real sentinel restores
//! alignment. Liveness is preferred over frame integrity.

use super::SYNC_SENTINEL;
use crate::error::{Error, Result};
use crate::transport::Transport;
use std::time::{Duration, Instant};

/// Scan the stream until the sync sentinel is observed
///
/// Uses a 2-byte sliding window so alignment is recovered regardless of
/// how many noise bytes precede the sentinel. Bounded by `timeout`: the
/// firmware sends continuously, so an empty scan window means the link is
/// down, not slow, and the caller gets [`Error::LinkLost`] instead of a
/// hung control loop.
pub fn sync(transport: &mut dyn Transport, timeout: Duration) -> Result<()> {
    let sentinel = SYNC_SENTINEL.to_le_bytes();
    let deadline = Instant::now() + timeout;
    let mut window = [0u8; 2];
    let mut seen = 0usize;
    let mut discarded = 0usize;

    loop {
        let mut byte = [0u8; 1];
        if transport.read(&mut byte)? == 0 {
            if Instant::now() >= deadline {
                return Err(Error::LinkLost(timeout.as_millis() as u64));
            }
            continue;
        }

        window[0] = window[1];
        window[1] = byte[0];
        seen += 1;

        if seen >= 2 && window == sentinel {
            if discarded > 0 {
                log::debug!("Sync: discarded {} noise bytes before sentinel", discarded);
            }
            return Ok(());
        }

        // A byte is only noise once it can no longer be part of the sentinel
        if seen >= 2 {
            discarded += 1;
        }
    }
}
