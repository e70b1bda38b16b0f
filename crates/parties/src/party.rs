use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{Aggregate, AggregateRoot, DomainError, PartyId};
use stockbook_events::Event;

use crate::ledger::{LedgerEntry, LedgerPosting, compute_entry};

/// Party role in the shop's books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    /// The shop purchases stock through this party.
    Buyer,
    /// The shop sells stock to this party.
    Seller,
}

/// Party status lifecycle. Parties are archived, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Archived,
}

/// Aggregate root: Party account with a running balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    name: String,
    role: PartyRole,
    opening_balance: Decimal,
    balance_amount: Decimal,
    status: PartyStatus,
    version: u64,
    created: bool,
}

impl Party {
    /// Create an empty, not-yet-onboarded aggregate instance for rehydration.
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            name: String::new(),
            role: PartyRole::Seller,
            opening_balance: Decimal::ZERO,
            balance_amount: Decimal::ZERO,
            status: PartyStatus::Active,
            version: 0,
            created: false,
        }
    }

    /// Rebuild a party by replaying its events in order.
    pub fn rehydrate<'a>(id: PartyId, events: impl IntoIterator<Item = &'a PartyEvent>) -> Self {
        let mut party = Self::empty(id);
        for event in events {
            party.apply(event);
        }
        party
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> PartyRole {
        self.role
    }

    pub fn opening_balance(&self) -> Decimal {
        self.opening_balance
    }

    /// Current outstanding balance.
    pub fn balance_amount(&self) -> Decimal {
        self.balance_amount
    }

    pub fn status(&self) -> PartyStatus {
        self.status
    }

    pub fn is_onboarded(&self) -> bool {
        self.created
    }

    /// Archived parties keep their history but cannot transact.
    pub fn can_transact(&self) -> bool {
        self.created && self.status == PartyStatus::Active
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OnboardParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardParty {
    pub party_id: PartyId,
    pub name: String,
    pub role: PartyRole,
    pub opening_balance: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveParty {
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    OnboardParty(OnboardParty),
    PostLedgerEntry(LedgerPosting),
    ArchiveParty(ArchiveParty),
}

/// Event: PartyOnboarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyOnboarded {
    pub party_id: PartyId,
    pub name: String,
    pub role: PartyRole,
    pub opening_balance: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartyArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyArchived {
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    PartyOnboarded(PartyOnboarded),
    LedgerEntryPosted(LedgerEntry),
    PartyArchived(PartyArchived),
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::PartyOnboarded(_) => "parties.party.onboarded",
            PartyEvent::LedgerEntryPosted(e) => e.event_type(),
            PartyEvent::PartyArchived(_) => "parties.party.archived",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::PartyOnboarded(e) => e.occurred_at,
            PartyEvent::LedgerEntryPosted(e) => e.occurred_at(),
            PartyEvent::PartyArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::PartyOnboarded(e) => {
                self.id = e.party_id;
                self.name = e.name.clone();
                self.role = e.role;
                self.opening_balance = e.opening_balance;
                self.balance_amount = e.opening_balance;
                self.status = PartyStatus::Active;
                self.created = true;
            }
            PartyEvent::LedgerEntryPosted(e) => {
                self.balance_amount = e.balance_after;
            }
            PartyEvent::PartyArchived(_) => {
                self.status = PartyStatus::Archived;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartyCommand::OnboardParty(cmd) => self.handle_onboard(cmd),
            PartyCommand::PostLedgerEntry(posting) => self.handle_post(posting),
            PartyCommand::ArchiveParty(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Party {
    pub(crate) fn ensure_party_id(&self, party_id: PartyId) -> Result<(), DomainError> {
        if self.id != party_id {
            return Err(DomainError::ledger_invariant("party_id mismatch"));
        }
        Ok(())
    }

    fn handle_onboard(&self, cmd: &OnboardParty) -> Result<Vec<PartyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("party already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.opening_balance < Decimal::ZERO {
            return Err(DomainError::validation("opening balance cannot be negative"));
        }

        Ok(vec![PartyEvent::PartyOnboarded(PartyOnboarded {
            party_id: cmd.party_id,
            name: cmd.name.trim().to_string(),
            role: cmd.role,
            opening_balance: cmd.opening_balance,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_post(&self, posting: &LedgerPosting) -> Result<Vec<PartyEvent>, DomainError> {
        compute_entry(self, posting).map(|entry| vec![PartyEvent::LedgerEntryPosted(entry)])
    }

    fn handle_archive(&self, cmd: &ArchiveParty) -> Result<Vec<PartyEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_party_id(cmd.party_id)?;

        if self.status == PartyStatus::Archived {
            return Err(DomainError::conflict("party is already archived"));
        }

        Ok(vec![PartyEvent::PartyArchived(PartyArchived {
            party_id: cmd.party_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
