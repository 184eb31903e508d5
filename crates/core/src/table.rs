//! In-memory filter/sort/paginate engine behind the candidates table.
//!
//! Every setter recomputes the visible sequence synchronously: filters are
//! ANDed, the single-key sort runs over the filtered rows, and pagination
//! windows the sorted result.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use crate::types::{Candidate, CandidateStatus};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Columns the table can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    Name,
    Title,
    Experience,
    AppliedAt,
}

impl SortColumn {
    fn compare(self, a: &Candidate, b: &Candidate) -> Ordering {
        match self {
            Self::Name => compare_text(&a.first_name, &b.first_name)
                .then_with(|| compare_text(&a.last_name, &b.last_name)),
            Self::Title => compare_text(&a.title, &b.title),
            Self::Experience => a.experience.cmp(&b.experience),
            Self::AppliedAt => a.applied_at.cmp(&b.applied_at),
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: SortColumn,
    pub direction: SortDirection,
}

/// Inclusive experience window; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExperienceRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl ExperienceRange {
    pub fn contains(&self, years: u32) -> bool {
        self.min.map_or(true, |min| years >= min) && self.max.map_or(true, |max| years <= max)
    }

    /// Parses a bound typed into a numeric input from its leading digits, so `"3.5"` and
    /// `"3abc"` both read as 3. Text with no leading digits, or a negative value, means
    /// "no bound". Oversized values saturate.
    pub fn parse_bound(raw: &str) -> Option<u32> {
        let trimmed = raw.trim_start();
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let end = unsigned
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(unsigned.len());
        let digits = &unsigned[..end];
        if digits.is_empty() {
            return None;
        }
        Some(digits.parse().unwrap_or(u32::MAX))
    }
}

/// The predicates applied to the candidate list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilters {
    text: Option<String>,
    pub status: Option<CandidateStatus>,
    pub location: Option<String>,
    pub experience: ExperienceRange,
}

impl TableFilters {
    /// Sets the free-text filter; whitespace-only input clears it.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.text = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Returns `true` when the candidate passes every active predicate.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        self.matches_text(candidate)
            && self.status.map_or(true, |status| candidate.status == status)
            && self
                .location
                .as_deref()
                .map_or(true, |location| candidate.location == location)
            && self.experience.contains(candidate.experience)
    }

    fn matches_text(&self, candidate: &Candidate) -> bool {
        let Some(text) = &self.text else {
            return true;
        };
        let needle = text.trim().to_lowercase();
        candidate.full_name().to_lowercase().contains(&needle)
            || candidate.email.to_lowercase().contains(&needle)
    }

    /// Number of predicates currently narrowing the list.
    pub fn active_count(&self) -> usize {
        [
            self.text.is_some(),
            self.status.is_some(),
            self.location.is_some(),
            self.experience.min.is_some(),
            self.experience.max.is_some(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }
}

#[derive(Debug, Clone)]
pub struct CandidateTable {
    rows: Vec<Candidate>,
    filters: TableFilters,
    sort: Option<SortState>,
    page_index: usize,
    page_size: usize,
    selected: HashSet<String>,
    /// Indices into `rows`, filtered then sorted.
    visible: Vec<usize>,
}

impl Default for CandidateTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl CandidateTable {
    pub fn new(rows: Vec<Candidate>) -> Self {
        let mut table = Self {
            rows,
            filters: TableFilters::default(),
            sort: None,
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            selected: HashSet::new(),
            visible: Vec::new(),
        };
        table.recompute();
        table
    }

    /// Replaces the underlying data, keeping filters and sort. The page index is clamped
    /// and selections of rows that no longer exist are dropped.
    pub fn set_rows(&mut self, rows: Vec<Candidate>) {
        self.rows = rows;
        let ids: HashSet<&str> = self.rows.iter().map(|row| row.id.as_str()).collect();
        self.selected.retain(|id| ids.contains(id.as_str()));
        self.recompute();
        self.clamp_page();
    }

    pub fn rows(&self) -> &[Candidate] {
        &self.rows
    }

    pub fn filters(&self) -> &TableFilters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: TableFilters) {
        self.filters = filters;
        self.on_filters_changed();
    }

    pub fn set_text_filter(&mut self, text: impl Into<String>) {
        self.filters.set_text(text);
        self.on_filters_changed();
    }

    pub fn set_status_filter(&mut self, status: Option<CandidateStatus>) {
        self.filters.status = status;
        self.on_filters_changed();
    }

    pub fn set_location_filter(&mut self, location: Option<String>) {
        self.filters.location = location;
        self.on_filters_changed();
    }

    pub fn set_experience_min(&mut self, min: Option<u32>) {
        self.filters.experience.min = min;
        self.on_filters_changed();
    }

    pub fn set_experience_max(&mut self, max: Option<u32>) {
        self.filters.experience.max = max;
        self.on_filters_changed();
    }

    pub fn active_filter_count(&self) -> usize {
        self.filters.active_count()
    }

    /// Resets every predicate, the sort, pagination and the row selection in one step.
    pub fn clear_filters(&mut self) {
        self.filters = TableFilters::default();
        self.sort = None;
        self.page_index = 0;
        self.selected.clear();
        self.recompute();
    }

    pub fn sort(&self) -> Option<SortState> {
        self.sort
    }

    pub fn set_sort(&mut self, sort: Option<SortState>) {
        self.sort = sort;
        self.recompute();
    }

    /// Sorts ascending by `column`, or descending when it is already sorted ascending.
    pub fn toggle_sort(&mut self, column: SortColumn) {
        let direction = match self.sort {
            Some(SortState {
                column: current,
                direction: SortDirection::Ascending,
            }) if current == column => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        self.set_sort(Some(SortState { column, direction }));
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page_index = 0;
    }

    pub fn set_page_index(&mut self, page_index: usize) {
        self.page_index = page_index;
        self.clamp_page();
    }

    pub fn page_count(&self) -> usize {
        self.visible.len().div_ceil(self.page_size)
    }

    pub fn can_previous_page(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next_page(&self) -> bool {
        self.page_index + 1 < self.page_count()
    }

    pub fn next_page(&mut self) {
        if self.can_next_page() {
            self.page_index += 1;
        }
    }

    pub fn previous_page(&mut self) {
        if self.can_previous_page() {
            self.page_index -= 1;
        }
    }

    /// Number of rows passing the filters, across all pages.
    pub fn filtered_count(&self) -> usize {
        self.visible.len()
    }

    /// Filtered rows in sort order, across all pages.
    pub fn filtered_rows(&self) -> impl Iterator<Item = &Candidate> + '_ {
        self.visible.iter().map(move |&index| &self.rows[index])
    }

    /// Rows on the current page.
    pub fn page_rows(&self) -> Vec<&Candidate> {
        self.filtered_rows()
            .skip(self.page_index * self.page_size)
            .take(self.page_size)
            .collect()
    }

    /// Sorted, de-duplicated locations for the location filter options.
    pub fn unique_locations(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.location.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sorted, de-duplicated statuses present in the data.
    pub fn unique_statuses(&self) -> Vec<CandidateStatus> {
        let present: BTreeSet<&str> = self.rows.iter().map(|row| row.status.as_str()).collect();
        present
            .into_iter()
            .filter_map(|status| status.parse().ok())
            .collect()
    }

    /// Flips the selection of a row, returning whether it is now selected.
    pub fn toggle_selected(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            false
        } else if self.rows.iter().any(|row| row.id == id) {
            self.selected.insert(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Selected rows that are still visible under the current filters.
    pub fn selected_count(&self) -> usize {
        self.filtered_rows()
            .filter(|row| self.selected.contains(&row.id))
            .count()
    }

    fn on_filters_changed(&mut self) {
        self.page_index = 0;
        self.recompute();
    }

    fn clamp_page(&mut self) {
        self.page_index = self.page_index.min(self.page_count().saturating_sub(1));
    }

    fn recompute(&mut self) {
        let mut visible: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.filters.matches(row))
            .map(|(index, _)| index)
            .collect();

        if let Some(sort) = self.sort {
            let rows = &self.rows;
            visible.sort_by(|&a, &b| {
                let ordering = sort.column.compare(&rows[a], &rows[b]);
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        self.visible = visible;
    }
}
