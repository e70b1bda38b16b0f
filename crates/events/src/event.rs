use chrono::{DateTime, Utc};

/// A recorded fact. Once emitted it is never edited, only followed by more.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, e.g. `"parties.ledger.entry_posted"`.
    fn event_type(&self) -> &'static str;

    /// Business time the fact happened, as the user recorded it.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// An event that knows its position in its stream.
///
/// Two facts can carry the same `occurred_at`; the position decides which
/// one came first.
pub trait Sequenced: Event {
    fn sequence(&self) -> u64;
}
