//! Dashboard view state: table, search palette, details panel, editor and delete flow
//! wired around one injected event channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::confirm::{ConfirmDialog, ConfirmPrompt};
use crate::events::{DashboardEvent, EventChannel, Subscription};
use crate::query::{
    CandidateQueryCache, MutationFailure, MutationKind, MutationTicket, Notification,
};
use crate::search::CandidateSearch;
use crate::stats::DashboardStats;
use crate::table::CandidateTable;
use crate::types::Candidate;

const DELETE_TITLE: &str = "Delete Candidate";
const DELETE_DESCRIPTION: &str =
    "Are you sure you want to delete this candidate? This action cannot be undone.";

/// A confirmed delete the host should dispatch, then report back through
/// [`Dashboard::settle`].
#[derive(Debug, PartialEq, Eq)]
pub struct DeleteIntent {
    pub candidate_id: String,
    pub ticket: MutationTicket,
}

/// State of the create/edit form dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Editor {
    #[default]
    Closed,
    New,
    Edit(Candidate),
}

#[derive(Debug, Default)]
struct DetailsPanel {
    candidate: Option<Candidate>,
}

pub struct Dashboard {
    table: CandidateTable,
    search: CandidateSearch,
    cache: CandidateQueryCache,
    delete_dialog: ConfirmDialog<Option<String>>,
    editor: Editor,
    details: Arc<Mutex<DetailsPanel>>,
    _details_subscription: Subscription<DashboardEvent>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("table", &self.table)
            .field("search", &self.search)
            .field("cache", &self.cache)
            .field("delete_dialog", &self.delete_dialog)
            .field("editor", &self.editor)
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Builds the view and subscribes the details panel for as long as the dashboard lives.
    pub fn mount(events: EventChannel<DashboardEvent>) -> Self {
        let details = Arc::new(Mutex::new(DetailsPanel::default()));
        let panel = Arc::clone(&details);
        let subscription = events.subscribe(DashboardEvent::OPEN_CANDIDATE_DETAILS, move |event| {
            let DashboardEvent::OpenCandidateDetails(candidate) = event;
            lock(&panel).candidate = Some(candidate.clone());
        });

        Self {
            table: CandidateTable::default(),
            search: CandidateSearch::new(events),
            cache: CandidateQueryCache::new(),
            delete_dialog: ConfirmDialog::new(),
            editor: Editor::Closed,
            details,
            _details_subscription: subscription,
        }
    }

    /// Whether the candidate list must be (re)fetched before rendering.
    pub fn needs_fetch(&self) -> bool {
        self.cache.needs_fetch()
    }

    /// Feeds a list result into the cache and the table.
    pub fn load(&mut self, candidates: Vec<Candidate>) {
        self.cache.store(candidates.clone());
        self.table.set_rows(candidates);
    }

    pub fn table(&self) -> &CandidateTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut CandidateTable {
        &mut self.table
    }

    pub fn search(&self) -> &CandidateSearch {
        &self.search
    }

    pub fn search_mut(&mut self) -> &mut CandidateSearch {
        &mut self.search
    }

    /// Search hits over the loaded list.
    pub fn search_results(&self) -> Vec<&Candidate> {
        self.search.results(self.table.rows())
    }

    pub fn select_search_result(&mut self, candidate: &Candidate) -> Notification {
        self.search.select(candidate)
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats::from_candidates(self.table.rows())
    }

    pub fn clear_filters(&mut self) -> Notification {
        self.table.clear_filters();
        Notification::success("All filters cleared!")
    }

    pub fn details(&self) -> Option<Candidate> {
        lock(&self.details).candidate.clone()
    }

    /// Opens the details panel from a table row, served from the cache.
    pub fn open_details(&mut self, candidate_id: &str) -> bool {
        match self.cache.find(candidate_id) {
            Some(candidate) => {
                lock(&self.details).candidate = Some(candidate.clone());
                true
            }
            None => false,
        }
    }

    pub fn close_details(&mut self) {
        lock(&self.details).candidate = None;
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn open_new(&mut self) {
        self.editor = Editor::New;
    }

    pub fn begin_edit(&mut self, candidate: &Candidate) {
        self.editor = Editor::Edit(candidate.clone());
    }

    pub fn close_edit(&mut self) {
        self.editor = Editor::Closed;
    }

    /// Asks for confirmation before deleting. Ignored while another delete is in flight
    /// or a confirmation is already open.
    pub fn request_delete(&mut self, candidate: &Candidate) -> bool {
        if self.cache.has_pending(MutationKind::Delete) {
            return false;
        }
        let candidate_id = candidate.id.clone();
        let prompt = ConfirmPrompt::new(DELETE_TITLE, DELETE_DESCRIPTION);
        self.delete_dialog
            .open(prompt, move |confirmed| confirmed.then_some(candidate_id))
            .is_ok()
    }

    pub fn delete_prompt(&self) -> Option<&ConfirmPrompt> {
        self.delete_dialog.prompt()
    }

    pub fn confirm_delete(&mut self) -> Option<DeleteIntent> {
        let candidate_id = self.delete_dialog.confirm().ok().flatten()?;
        let ticket = self
            .cache
            .begin(MutationKind::Delete, Some(&candidate_id));
        Some(DeleteIntent {
            candidate_id,
            ticket,
        })
    }

    /// Cancelling or dismissing the confirmation yields no delete.
    pub fn cancel_delete(&mut self) {
        self.delete_dialog.dismiss();
    }

    pub fn is_deleting(&self, candidate_id: &str) -> bool {
        self.cache.is_pending(MutationKind::Delete, candidate_id)
    }

    /// Starts a create or update; the host dispatches the call and reports back via
    /// [`Dashboard::settle`].
    pub fn begin_mutation(
        &mut self,
        kind: MutationKind,
        candidate_id: Option<&str>,
    ) -> MutationTicket {
        self.cache.begin(kind, candidate_id)
    }

    /// Applies a mutation outcome. Successful saves close the editor.
    pub fn settle(
        &mut self,
        ticket: MutationTicket,
        result: Result<Vec<Candidate>, MutationFailure>,
    ) -> Notification {
        let kind = ticket.kind();
        let succeeded = result.is_ok();
        let notification = self.cache.settle(ticket, result);

        if succeeded {
            if let Some(rows) = self.cache.candidates() {
                self.table.set_rows(rows.to_vec());
            }
            if kind != MutationKind::Delete {
                self.editor = Editor::Closed;
            }
        }
        notification
    }
}

fn lock(panel: &Mutex<DetailsPanel>) -> MutexGuard<'_, DetailsPanel> {
    panel.lock().unwrap_or_else(PoisonError::into_inner)
}
