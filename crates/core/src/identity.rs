//! Session identity generator.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::PeerId;

static NEXT_PEER_ID: AtomicU64 = AtomicU64::new(0);

/// Hand out the next process-unique session id. Ids are never reused.
pub fn next_peer_id() -> PeerId {
    PeerId(NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed))
}
