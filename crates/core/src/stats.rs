use serde::Serialize;

use crate::types::{Candidate, CandidateStatus};

/// Headline numbers shown above the candidates table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total: usize,
    pub active: usize,
    pub placed: usize,
    /// Mean experience in whole years, rounded half up. Zero for an empty list.
    pub avg_experience: u32,
}

impl DashboardStats {
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        let total = candidates.len();
        let count = |status: CandidateStatus| {
            candidates
                .iter()
                .filter(|candidate| candidate.status == status)
                .count()
        };

        let avg_experience = if total == 0 {
            0
        } else {
            let sum: u64 = candidates
                .iter()
                .map(|candidate| u64::from(candidate.experience))
                .sum();
            let total = total as u64;
            ((2 * sum + total) / (2 * total)) as u32
        };

        Self {
            total,
            active: count(CandidateStatus::Active),
            placed: count(CandidateStatus::Placed),
            avg_experience,
        }
    }
}
