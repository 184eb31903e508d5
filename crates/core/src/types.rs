use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A job applicant record tracked by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub title: String,
    pub experience: u32,
    pub location: String,
    pub status: CandidateStatus,
    pub skills: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    /// Returns `"{first} {last}"`.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Splits the comma-delimited skills column into trimmed, non-empty tokens.
    pub fn skill_list(&self) -> Vec<&str> {
        self.skills
            .as_deref()
            .map(|skills| {
                skills
                    .split(',')
                    .map(str::trim)
                    .filter(|skill| !skill.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Pipeline status of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CandidateStatus {
    Active,
    Inactive,
    Placed,
}

impl CandidateStatus {
    pub const ALL: [CandidateStatus; 3] = [Self::Active, Self::Inactive, Self::Placed];

    /// Returns the canonical wire and database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Placed => "placed",
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "placed" => Ok(Self::Placed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl Serialize for CandidateStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CandidateStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        CandidateStatus::from_str(&value).map_err(D::Error::custom)
    }
}

/// Returned when a string is not one of the enumerated statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown candidate status '{0}'")]
pub struct UnknownStatus(pub String);

/// Validated payload for creating a candidate. Identifiers and timestamps are assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCandidate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub title: String,
    pub experience: u32,
    pub location: String,
    pub status: CandidateStatus,
    pub skills: Option<String>,
}

/// Validated partial update. `None` leaves a field untouched; for the nullable
/// columns `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub title: Option<String>,
    pub experience: Option<u32>,
    pub location: Option<String>,
    pub status: Option<CandidateStatus>,
    pub skills: Option<Option<String>>,
}

impl CandidatePatch {
    /// Returns `true` when the patch carries no field changes.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Produces the record that results from applying the patch, stamping `updated_at`.
    ///
    /// `updated_at` never moves before `created_at`.
    pub fn apply_to(&self, candidate: &Candidate, updated_at: DateTime<Utc>) -> Candidate {
        let mut next = candidate.clone();
        if let Some(value) = &self.first_name {
            next.first_name = value.clone();
        }
        if let Some(value) = &self.last_name {
            next.last_name = value.clone();
        }
        if let Some(value) = &self.email {
            next.email = value.clone();
        }
        if let Some(value) = &self.phone {
            next.phone = value.clone();
        }
        if let Some(value) = &self.title {
            next.title = value.clone();
        }
        if let Some(value) = self.experience {
            next.experience = value;
        }
        if let Some(value) = &self.location {
            next.location = value.clone();
        }
        if let Some(value) = self.status {
            next.status = value;
        }
        if let Some(value) = &self.skills {
            next.skills = value.clone();
        }
        next.updated_at = updated_at.max(candidate.created_at);
        next
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::candidate;
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    #[test]
    fn status_round_trips_through_strings() {
        for status in CandidateStatus::ALL {
            assert_eq!(status.as_str().parse::<CandidateStatus>(), Ok(status));
        }
        assert_eq!(
            "hired".parse::<CandidateStatus>(),
            Err(UnknownStatus("hired".to_string()))
        );
    }

    #[test]
    fn candidate_serializes_with_camel_case_keys() {
        let mut record = candidate("c-1", "John", "Doe");
        record.skills = Some("Rust, SQL".to_string());
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["firstName"], json!("John"));
        assert_eq!(value["userId"], json!("user-1"));
        assert_eq!(value["status"], json!("active"));
        assert_eq!(value["phone"], json!(null));
        assert_eq!(value["appliedAt"], json!("2024-03-01T09:00:00Z"));
    }

    #[test]
    fn skill_list_drops_blank_tokens() {
        let mut record = candidate("c-1", "John", "Doe");
        record.skills = Some(" Rust, ,SQL ,  Docker,".to_string());
        assert_eq!(record.skill_list(), vec!["Rust", "SQL", "Docker"]);

        record.skills = None;
        assert!(record.skill_list().is_empty());
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let record = candidate("c-1", "John", "Doe");
        let later = record.created_at + Duration::hours(1);
        let patch = CandidatePatch {
            title: Some("Staff Engineer".to_string()),
            phone: Some(Some("+1 555".to_string())),
            ..CandidatePatch::default()
        };

        let updated = patch.apply_to(&record, later);
        assert_eq!(updated.title, "Staff Engineer");
        assert_eq!(updated.phone.as_deref(), Some("+1 555"));
        assert_eq!(updated.first_name, record.first_name);
        assert_eq!(updated.experience, record.experience);
        assert_eq!(updated.id, record.id);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn patch_clears_nullable_fields() {
        let mut record = candidate("c-1", "John", "Doe");
        record.skills = Some("Rust".to_string());
        let patch = CandidatePatch {
            skills: Some(None),
            ..CandidatePatch::default()
        };
        assert!(!patch.is_empty());
        assert_eq!(patch.apply_to(&record, record.updated_at).skills, None);
    }

    #[test]
    fn patch_never_moves_updated_before_created() {
        let record = candidate("c-1", "John", "Doe");
        let earlier = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let updated = CandidatePatch::default().apply_to(&record, earlier);
        assert!(updated.created_at <= updated.updated_at);
    }
}
