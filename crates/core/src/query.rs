//! Client-side cache of the candidate list plus bookkeeping for in-flight mutations.

use std::collections::HashMap;

use crate::types::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Toast-style message surfaced to the user once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Why a dispatched mutation failed. `message` carries the server's text when it sent one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationFailure {
    pub message: Option<String>,
}

impl MutationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

/// Handle for one in-flight mutation. Consumed by [`CandidateQueryCache::settle`].
#[derive(Debug, PartialEq, Eq)]
pub struct MutationTicket {
    id: u64,
    kind: MutationKind,
    candidate_id: Option<String>,
}

impl MutationTicket {
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn candidate_id(&self) -> Option<&str> {
        self.candidate_id.as_deref()
    }
}

#[derive(Debug, Default)]
pub struct CandidateQueryCache {
    candidates: Option<Vec<Candidate>>,
    stale: bool,
    next_ticket: u64,
    in_flight: HashMap<u64, (MutationKind, Option<String>)>,
}

impl CandidateQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fresh list result.
    pub fn store(&mut self, candidates: Vec<Candidate>) {
        self.candidates = Some(candidates);
        self.stale = false;
    }

    pub fn candidates(&self) -> Option<&[Candidate]> {
        self.candidates.as_deref()
    }

    pub fn needs_fetch(&self) -> bool {
        self.candidates.is_none() || self.stale
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Looks a record up in the cached list.
    pub fn find(&self, id: &str) -> Option<&Candidate> {
        self.candidates
            .as_ref()?
            .iter()
            .find(|candidate| candidate.id == id)
    }

    pub fn begin(&mut self, kind: MutationKind, candidate_id: Option<&str>) -> MutationTicket {
        let id = self.next_ticket;
        self.next_ticket += 1;
        let candidate_id = candidate_id.map(str::to_string);
        self.in_flight.insert(id, (kind, candidate_id.clone()));
        MutationTicket {
            id,
            kind,
            candidate_id,
        }
    }

    /// Whether a mutation of `kind` is in flight for `candidate_id`.
    pub fn is_pending(&self, kind: MutationKind, candidate_id: &str) -> bool {
        self.in_flight
            .values()
            .any(|(pending, id)| *pending == kind && id.as_deref() == Some(candidate_id))
    }

    /// Whether any mutation of `kind` is in flight.
    pub fn has_pending(&self, kind: MutationKind) -> bool {
        self.in_flight.values().any(|(pending, _)| *pending == kind)
    }

    /// Ends a mutation. On success the returned rows are folded into the cached list and
    /// the list is marked stale so the next read refetches.
    pub fn settle(
        &mut self,
        ticket: MutationTicket,
        result: Result<Vec<Candidate>, MutationFailure>,
    ) -> Notification {
        self.in_flight.remove(&ticket.id);

        match result {
            Ok(rows) => {
                if let Some(cached) = self.candidates.as_mut() {
                    apply_rows(cached, ticket.kind, rows);
                }
                self.stale = true;
                Notification::success(format!(
                    "Candidate {} successfully",
                    ticket.kind.past_tense()
                ))
            }
            Err(failure) => {
                let message = failure
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| format!("Failed to {} candidate", ticket.kind.as_str()));
                Notification::error(message)
            }
        }
    }
}

fn apply_rows(cached: &mut Vec<Candidate>, kind: MutationKind, rows: Vec<Candidate>) {
    match kind {
        MutationKind::Create => {
            for row in rows {
                if !cached.iter().any(|existing| existing.id == row.id) {
                    cached.push(row);
                }
            }
        }
        MutationKind::Update => {
            for row in rows {
                if let Some(existing) = cached.iter_mut().find(|existing| existing.id == row.id) {
                    *existing = row;
                }
            }
        }
        MutationKind::Delete => {
            cached.retain(|existing| !rows.iter().any(|row| row.id == existing.id));
        }
    }
}
