use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError, sqlite::SqlitePoolOptions, QueryBuilder, Sqlite, SqlitePool,
};
use thiserror::Error;
use uuid::Uuid;

use hireboard_core::types::{Candidate, CandidatePatch, NewCandidate};
use hireboard_core::validation::MAX_EXPERIENCE_YEARS;

const CANDIDATE_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, title, \
     experience, location, status, skills, applied_at, created_at, updated_at";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for reading and mutating candidate records.
    pub fn candidates(&self) -> CandidateRepository {
        CandidateRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for the `candidates` table.
#[derive(Clone)]
pub struct CandidateRepository {
    pool: SqlitePool,
}

impl CandidateRepository {
    /// Returns every candidate in insertion order.
    pub async fn list_all(&self) -> Result<Vec<Candidate>, CandidateError> {
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Candidate::try_from).collect()
    }

    pub async fn fetch_one(&self, id: &str) -> Result<Option<Candidate>, CandidateError> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Candidate::try_from).transpose()
    }

    /// Inserts a new record owned by `user_id`. The identifier and all timestamps are
    /// assigned here; `applied_at` is the creation instant.
    pub async fn insert(
        &self,
        user_id: &str,
        input: &NewCandidate,
        now: DateTime<Utc>,
    ) -> Result<Candidate, CandidateError> {
        let id = Uuid::new_v4().to_string();
        let stamp = to_rfc3339(now);

        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "INSERT INTO candidates ({CANDIDATE_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {CANDIDATE_COLUMNS}"
        ))
        .bind(&id)
        .bind(user_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.title)
        .bind(i64::from(input.experience))
        .bind(&input.location)
        .bind(input.status.as_str())
        .bind(&input.skills)
        .bind(&stamp)
        .bind(&stamp)
        .bind(&stamp)
        .fetch_one(&self.pool)
        .await?;

        Candidate::try_from(row)
    }

    /// Applies `patch` to the record with `id`. Only the fields present in the patch are
    /// written; `updated_at` becomes `max(created_at, now)`, so an empty patch just bumps it.
    /// Returns `None` when no record matched.
    pub async fn update(
        &self,
        id: &str,
        patch: &CandidatePatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Candidate>, CandidateError> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE candidates SET ");
        let mut set = builder.separated(", ");

        if let Some(value) = &patch.first_name {
            set.push("first_name = ").push_bind_unseparated(value.clone());
        }
        if let Some(value) = &patch.last_name {
            set.push("last_name = ").push_bind_unseparated(value.clone());
        }
        if let Some(value) = &patch.email {
            set.push("email = ").push_bind_unseparated(value.clone());
        }
        if let Some(value) = &patch.phone {
            set.push("phone = ").push_bind_unseparated(value.clone());
        }
        if let Some(value) = &patch.title {
            set.push("title = ").push_bind_unseparated(value.clone());
        }
        if let Some(value) = patch.experience {
            set.push("experience = ").push_bind_unseparated(i64::from(value));
        }
        if let Some(value) = &patch.location {
            set.push("location = ").push_bind_unseparated(value.clone());
        }
        if let Some(value) = patch.status {
            set.push("status = ").push_bind_unseparated(value.as_str());
        }
        if let Some(value) = &patch.skills {
            set.push("skills = ").push_bind_unseparated(value.clone());
        }
        set.push("updated_at = MAX(created_at, ")
            .push_bind_unseparated(to_rfc3339(now))
            .push_unseparated(")");

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {CANDIDATE_COLUMNS}"));

        let row = builder
            .build_query_as::<CandidateRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(Candidate::try_from).transpose()
    }

    /// Removes the record with `id`, returning it when it existed.
    pub async fn delete(&self, id: &str) -> Result<Option<Candidate>, CandidateError> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "DELETE FROM candidates WHERE id = ? RETURNING {CANDIDATE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Candidate::try_from).transpose()
    }
}

/// Raw `candidates` row as stored.
#[derive(Debug, sqlx::FromRow)]
pub struct CandidateRow {
    pub id: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub title: String,
    pub experience: i64,
    pub location: String,
    pub status: String,
    pub skills: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CandidateRow> for Candidate {
    type Error = CandidateError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| CandidateError::CorruptRow {
            id: row.id.clone(),
            reason,
        };

        let status = row
            .status
            .parse()
            .map_err(|err| corrupt(format!("{err}")))?;
        let experience = u32::try_from(row.experience)
            .ok()
            .filter(|years| i64::from(*years) <= MAX_EXPERIENCE_YEARS)
            .ok_or_else(|| corrupt(format!("experience {} out of range", row.experience)))?;
        if row.updated_at < row.created_at {
            return Err(corrupt("updated_at precedes created_at".to_string()));
        }

        Ok(Candidate {
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            title: row.title,
            experience,
            location: row.location,
            status,
            skills: row.skills,
            applied_at: row.applied_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Errors that can occur while reading or mutating candidates.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("candidate row {id} is corrupt: {reason}")]
    CorruptRow { id: String, reason: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
