//! Replay ordering for event streams.

use chrono::{DateTime, Utc};

use crate::event::Sequenced;

/// Events replay by business time, then by stream position.
pub fn replay_key<E: Sequenced>(event: &E) -> (DateTime<Utc>, u64) {
    (event.occurred_at(), event.sequence())
}

/// Sort `events` into replay order.
pub fn in_replay_order<E: Sequenced>(events: &mut [E]) {
    events.sort_by_key(replay_key);
}

/// Whether `events` are already in replay order.
pub fn is_in_replay_order<E: Sequenced>(events: &[E]) -> bool {
    events.windows(2).all(|w| replay_key(&w[0]) <= replay_key(&w[1]))
}
