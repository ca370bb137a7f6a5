use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::error::ValidationError;

use super::aggregate::Todo;

pub const TITLE_MAX_CHARS: usize = 100;
pub const DETAIL_MAX_CHARS: usize = 1000;

/// Row id handed out by storage on first save.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InternalId(i64);

impl InternalId {
    pub fn new(value: i64) -> Result<InternalId, ValidationError> {
        if value <= 0 {
            return Err(ValidationError::NonPositiveInternalId(value));
        }
        Ok(InternalId(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PublicId(Uuid);

impl PublicId {
    pub fn parse(value: &str) -> Result<PublicId, ValidationError> {
        Uuid::parse_str(value.trim())
            .map(PublicId)
            .map_err(|_| ValidationError::MalformedPublicId(value.to_string()))
    }
}

impl From<Uuid> for PublicId {
    fn from(uuid: Uuid) -> PublicId {
        PublicId(uuid)
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionNumber(i64);

impl VersionNumber {
    pub const INITIAL: VersionNumber = VersionNumber(1);

    pub fn new(value: i64) -> Result<VersionNumber, ValidationError> {
        if value < 1 {
            return Err(ValidationError::NonPositiveVersion(value));
        }
        Ok(VersionNumber(value))
    }

    pub fn next(self) -> Result<VersionNumber, ValidationError> {
        self.0
            .checked_add(1)
            .map(VersionNumber)
            .ok_or(ValidationError::VersionExhausted(self.0))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DueDate(NaiveDate);

impl DueDate {
    /// Accepts `today` or any later day.
    pub fn new(value: Option<NaiveDate>, today: NaiveDate) -> Result<DueDate, ValidationError> {
        let due = value.ok_or(ValidationError::DueDateRequired)?;
        if due < today {
            return Err(ValidationError::DueDateInPast { due, today });
        }
        Ok(DueDate(due))
    }

    /// Rows read back from storage may be overdue; only new input is held to `today`.
    pub fn from_stored(value: NaiveDate) -> DueDate {
        DueDate(value)
    }

    pub fn get(self) -> NaiveDate {
        self.0
    }
}

/// Whether a transition changed anything observable.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    Changed,
    Unchanged,
}

impl Mutation {
    pub fn is_changed(self) -> bool {
        self == Mutation::Changed
    }
}

/// Caller-supplied content for create and update.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TodoInput {
    pub title: Option<String>,
    pub detail: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl TodoInput {
    pub fn new(title: &str, detail: Option<&str>, due_date: NaiveDate) -> TodoInput {
        TodoInput {
            title: Some(title.to_string()),
            detail: detail.map(str::to_string),
            due_date: Some(due_date),
        }
    }
}

/// A `todos` row as storage sees it, before any invariant is checked.
#[derive(Debug, Clone)]
pub struct StoredTodo {
    pub internal_id: i64,
    pub public_id: String,
    pub version_number: i64,
    pub title: String,
    pub detail: Option<String>,
    pub due_date: NaiveDate,
    pub completed: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a todo at one `(internal_id, version_number)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoHistory {
    pub internal_id: InternalId,
    pub version_number: VersionNumber,
    pub public_id: PublicId,
    pub title: String,
    pub detail: Option<String>,
    pub due_date: NaiveDate,
    pub completed: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl TodoHistory {
    /// `None` while the todo has never been saved.
    pub fn snapshot(todo: &Todo, recorded_at: DateTime<Utc>) -> Option<TodoHistory> {
        Some(TodoHistory {
            internal_id: todo.internal_id()?,
            version_number: todo.version_number(),
            public_id: todo.public_id(),
            title: todo.title().to_string(),
            detail: todo.detail().map(str::to_string),
            due_date: todo.due_date().get(),
            completed: todo.is_completed(),
            deleted: todo.is_deleted(),
            created_at: todo.created_at(),
            updated_at: todo.updated_at(),
            recorded_at,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TodoResponse {
    pub public_id: String,
    pub version_number: i64,
    pub title: String,
    pub detail: Option<String>,
    pub due_date: NaiveDate,
    pub completed: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Todo> for TodoResponse {
    fn from(todo: &Todo) -> TodoResponse {
        TodoResponse {
            public_id: todo.public_id().to_string(),
            version_number: todo.version_number().get(),
            title: todo.title().to_string(),
            detail: todo.detail().map(str::to_string),
            due_date: todo.due_date().get(),
            completed: todo.is_completed(),
            deleted: todo.is_deleted(),
            created_at: todo.created_at(),
            updated_at: todo.updated_at(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HistoryResponse {
    pub version_number: i64,
    pub title: String,
    pub detail: Option<String>,
    pub due_date: NaiveDate,
    pub completed: bool,
    pub deleted: bool,
    pub recorded_at: DateTime<Utc>,
}

impl From<&TodoHistory> for HistoryResponse {
    fn from(entry: &TodoHistory) -> HistoryResponse {
        HistoryResponse {
            version_number: entry.version_number.get(),
            title: entry.title.clone(),
            detail: entry.detail.clone(),
            due_date: entry.due_date,
            completed: entry.completed,
            deleted: entry.deleted,
            recorded_at: entry.recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::testing::date;

    #[test]
    fn internal_id_must_be_positive() {
        assert!(InternalId::new(1).is_ok());
        assert_eq!(
            InternalId::new(0),
            Err(ValidationError::NonPositiveInternalId(0))
        );
        assert!(InternalId::new(-4).is_err());
    }

    #[test]
    fn public_id_accepts_only_uuids() {
        let id = PublicId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");

        assert_eq!(
            PublicId::parse("todo-1"),
            Err(ValidationError::MalformedPublicId("todo-1".into()))
        );
        assert!(PublicId::parse("").is_err());
        assert!(PublicId::parse("   ").is_err());
    }

    #[test]
    fn version_starts_at_one_and_counts_up() {
        assert_eq!(VersionNumber::INITIAL.get(), 1);
        assert_eq!(VersionNumber::INITIAL.next().unwrap().get(), 2);
        assert!(VersionNumber::new(0).is_err());
        assert!(VersionNumber::INITIAL < VersionNumber::INITIAL.next().unwrap());
    }

    #[test]
    fn version_cannot_count_past_the_column_range() {
        let last = VersionNumber::new(i64::MAX).unwrap();
        assert_eq!(
            last.next(),
            Err(ValidationError::VersionExhausted(i64::MAX))
        );
    }

    #[test]
    fn due_date_rejects_missing_and_past_days() {
        let today = date(2024, 5, 10);

        assert_eq!(
            DueDate::new(None, today),
            Err(ValidationError::DueDateRequired)
        );
        assert_eq!(
            DueDate::new(Some(date(2024, 5, 9)), today),
            Err(ValidationError::DueDateInPast {
                due: date(2024, 5, 9),
                today
            })
        );
        assert_eq!(DueDate::new(Some(today), today).unwrap().get(), today);
        assert!(DueDate::new(Some(date(2025, 1, 1)), today).is_ok());
    }

    #[test]
    fn stored_due_dates_may_be_overdue() {
        assert_eq!(
            DueDate::from_stored(date(2001, 1, 1)).get(),
            date(2001, 1, 1)
        );
    }
}
