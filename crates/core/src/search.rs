//! Command-palette search over the already-loaded candidate list.

use crate::events::{DashboardEvent, EventChannel};
use crate::query::Notification;
use crate::types::Candidate;

/// Case-insensitive substring match over the searchable columns. A blank query matches everything.
pub fn matches_search(candidate: &Candidate, query: &str) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    [
        Some(candidate.first_name.as_str()),
        Some(candidate.last_name.as_str()),
        Some(candidate.email.as_str()),
        Some(candidate.title.as_str()),
        Some(candidate.location.as_str()),
        candidate.skills.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|value| value.to_lowercase().contains(&needle))
}

#[derive(Debug)]
pub struct CandidateSearch {
    events: EventChannel<DashboardEvent>,
    open: bool,
    query: String,
}

impl CandidateSearch {
    pub fn new(events: EventChannel<DashboardEvent>) -> Self {
        Self {
            events,
            open: false,
            query: String::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn results<'a>(&self, candidates: &'a [Candidate]) -> Vec<&'a Candidate> {
        candidates
            .iter()
            .filter(|candidate| matches_search(candidate, &self.query))
            .collect()
    }

    /// Text shown when [`CandidateSearch::results`] is empty.
    pub fn empty_message(&self) -> String {
        if self.query.is_empty() {
            "Start typing to search...".to_string()
        } else {
            format!("No results found for \"{}\"", self.query)
        }
    }

    /// Opens the details panel for `candidate` via the event channel, then closes the palette.
    pub fn select(&mut self, candidate: &Candidate) -> Notification {
        self.events
            .emit(&DashboardEvent::OpenCandidateDetails(candidate.clone()));
        self.open = false;
        self.query.clear();
        Notification::success(format!(
            "Opening {} {}'s details",
            candidate.first_name, candidate.last_name
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::types::fixtures::candidate;

    fn people() -> Vec<Candidate> {
        let mut john = candidate("c-1", "John", "Doe");
        john.email = "jdoe@example.com".to_string();
        let mut jane = candidate("c-2", "Jane", "Smith");
        jane.email = "jane@example.com".to_string();
        jane.skills = Some("Rust, Kubernetes".to_string());
        jane.location = "Berlin".to_string();
        vec![john, jane]
    }

    #[test]
    fn doe_matches_name_and_email_only() {
        let rows = people();
        let mut search = CandidateSearch::new(EventChannel::new());
        search.set_query("doe");
        let hits: Vec<_> = search
            .results(&rows)
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(hits, vec!["c-1"]);

        let mut jdoe = rows[1].clone();
        jdoe.first_name = "Someone".to_string();
        jdoe.last_name = "Else".to_string();
        jdoe.email = "jdoe@example.com".to_string();
        assert!(matches_search(&jdoe, "DOE"));
    }

    #[test]
    fn searches_title_location_and_skills() {
        let rows = people();
        assert!(matches_search(&rows[1], "kubern"));
        assert!(matches_search(&rows[1], "berlin"));
        assert!(matches_search(&rows[0], "engineer"));
        assert!(!matches_search(&rows[0], "kubern"));
    }

    #[test]
    fn blank_query_returns_everything() {
        let rows = people();
        let mut search = CandidateSearch::new(EventChannel::new());
        assert_eq!(search.results(&rows).len(), 2);
        assert_eq!(search.empty_message(), "Start typing to search...");

        search.set_query("   ");
        assert_eq!(search.results(&rows).len(), 2);

        search.set_query("zzz");
        assert!(search.results(&rows).is_empty());
        assert_eq!(search.empty_message(), "No results found for \"zzz\"");
    }

    #[test]
    fn select_emits_event_and_resets_palette() {
        let events = EventChannel::new();
        let opened = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&opened);
        let _subscription = events.subscribe(DashboardEvent::OPEN_CANDIDATE_DETAILS, move |event| {
            let DashboardEvent::OpenCandidateDetails(record) = event;
            sink.lock().unwrap().push(record.id.clone());
        });

        let rows = people();
        let mut search = CandidateSearch::new(events);
        search.set_open(true);
        search.set_query("jane");

        let notification = search.select(&rows[1]);
        assert_eq!(notification, Notification::success("Opening Jane Smith's details"));
        assert!(!search.is_open());
        assert_eq!(search.query(), "");
        assert_eq!(*opened.lock().unwrap(), vec!["c-2".to_string()]);
    }
}
