use chrono::{DateTime, NaiveDate, Utc};

use crate::environment::{Clock, IdGenerator};
use crate::error::ValidationError;

use super::data::*;

/// The todo aggregate. Every field change goes through the methods below, which
/// validate first and only then mutate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    internal_id: Option<InternalId>,
    public_id: PublicId,
    version_number: VersionNumber,
    title: String,
    detail: Option<String>,
    due_date: DueDate,
    completed: bool,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct Content {
    title: String,
    detail: Option<String>,
    due_date: DueDate,
}

impl Content {
    fn validate(input: TodoInput, today: NaiveDate) -> Result<Content, ValidationError> {
        Ok(Content {
            title: validate_title(input.title)?,
            detail: validate_detail(input.detail)?,
            due_date: DueDate::new(input.due_date, today)?,
        })
    }
}

fn validate_title(title: Option<String>) -> Result<String, ValidationError> {
    let title = match title {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(ValidationError::TitleRequired),
    };

    let length = title.chars().count();
    if length > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong(length));
    }

    Ok(title)
}

fn validate_detail(detail: Option<String>) -> Result<Option<String>, ValidationError> {
    if let Some(detail) = &detail {
        let length = detail.chars().count();
        if length > DETAIL_MAX_CHARS {
            return Err(ValidationError::DetailTooLong(length));
        }
    }

    Ok(detail)
}

impl Todo {
    pub fn create(
        input: TodoInput,
        clock: &dyn Clock,
        ids: &dyn IdGenerator,
    ) -> Result<Todo, ValidationError> {
        let content = Content::validate(input, clock.today())?;
        let now = clock.now();

        Ok(Todo {
            internal_id: None,
            public_id: ids.generate(),
            version_number: VersionNumber::INITIAL,
            title: content.title,
            detail: content.detail,
            due_date: content.due_date,
            completed: false,
            deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a todo from storage. The due date is taken as stored, so
    /// overdue rows still load.
    pub fn restore(stored: StoredTodo) -> Result<Todo, ValidationError> {
        Ok(Todo {
            internal_id: Some(InternalId::new(stored.internal_id)?),
            public_id: PublicId::parse(&stored.public_id)?,
            version_number: VersionNumber::new(stored.version_number)?,
            title: validate_title(Some(stored.title))?,
            detail: validate_detail(stored.detail)?,
            due_date: DueDate::from_stored(stored.due_date),
            completed: stored.completed,
            deleted: stored.deleted,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    /// Replaces title, detail and due date. A valid update always counts as a change.
    pub fn update(
        &mut self,
        input: TodoInput,
        clock: &dyn Clock,
    ) -> Result<Mutation, ValidationError> {
        let content = Content::validate(input, clock.today())?;
        let version = self.version_number.next()?;

        self.title = content.title;
        self.detail = content.detail;
        self.due_date = content.due_date;
        self.stamp(version, clock);

        Ok(Mutation::Changed)
    }

    pub fn complete(&mut self, clock: &dyn Clock) -> Result<Mutation, ValidationError> {
        if self.completed {
            return Ok(Mutation::Unchanged);
        }

        let version = self.version_number.next()?;
        self.completed = true;
        self.stamp(version, clock);
        Ok(Mutation::Changed)
    }

    pub fn delete(&mut self, clock: &dyn Clock) -> Result<Mutation, ValidationError> {
        if self.deleted {
            return Ok(Mutation::Unchanged);
        }

        let version = self.version_number.next()?;
        self.deleted = true;
        self.stamp(version, clock);
        Ok(Mutation::Changed)
    }

    fn stamp(&mut self, version: VersionNumber, clock: &dyn Clock) {
        self.version_number = version;
        self.updated_at = clock.now();
    }

    pub(crate) fn with_internal_id(mut self, internal_id: InternalId) -> Todo {
        self.internal_id = Some(internal_id);
        self
    }

    pub fn internal_id(&self) -> Option<InternalId> {
        self.internal_id
    }

    pub fn public_id(&self) -> PublicId {
        self.public_id
    }

    pub fn version_number(&self) -> VersionNumber {
        self.version_number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn due_date(&self) -> DueDate {
        self.due_date
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
