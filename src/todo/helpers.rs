use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{TodoError, TodoResult, ValidationError};

use super::aggregate::Todo;
use super::data::*;
use super::service::{HistoryLog, TodoStore};

const TODO_COLUMNS: &str = "internal_id, public_id, version_number, title, detail, due_date, \
     completed_flag, deleted_flag, created_at, updated_at";

pub fn init_database(db_connection: &Connection) -> TodoResult<()> {
    db_connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS todos (
            internal_id INTEGER PRIMARY KEY AUTOINCREMENT,
            public_id TEXT NOT NULL UNIQUE,
            version_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            detail TEXT,
            due_date TEXT NOT NULL,
            completed_flag INTEGER NOT NULL,
            deleted_flag INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS todo_history (
            internal_id INTEGER NOT NULL,
            version_number INTEGER NOT NULL,
            public_id TEXT NOT NULL,
            title TEXT NOT NULL,
            detail TEXT,
            due_date TEXT NOT NULL,
            completed_flag INTEGER NOT NULL,
            deleted_flag INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (internal_id, version_number)
        );",
    )?;

    Ok(())
}

pub fn get_stored_todo_from_row(row: &Row) -> rusqlite::Result<StoredTodo> {
    Ok(StoredTodo {
        internal_id: row.get(0)?,
        public_id: row.get(1)?,
        version_number: row.get(2)?,
        title: row.get(3)?,
        detail: row.get(4)?,
        due_date: row.get(5)?,
        completed: row.get(6)?,
        deleted: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn restore_todo(stored: StoredTodo) -> TodoResult<Todo> {
    let internal_id = stored.internal_id;
    Todo::restore(stored).map_err(|reason| TodoError::CorruptRow {
        internal_id,
        reason,
    })
}

type HistoryRow = (
    i64,
    String,
    String,
    Option<String>,
    NaiveDate,
    bool,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn get_history_row(row: &Row) -> rusqlite::Result<HistoryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn history_from_row(
    internal_id: InternalId,
    row: HistoryRow,
) -> Result<TodoHistory, ValidationError> {
    let (
        version_number,
        public_id,
        title,
        detail,
        due_date,
        completed,
        deleted,
        created_at,
        updated_at,
        recorded_at,
    ) = row;

    Ok(TodoHistory {
        internal_id,
        version_number: VersionNumber::new(version_number)?,
        public_id: PublicId::parse(&public_id)?,
        title,
        detail,
        due_date,
        completed,
        deleted,
        created_at,
        updated_at,
        recorded_at,
    })
}

/// `todos` and `todo_history` over one borrowed connection (or transaction).
pub struct SqliteTodoStore<'c> {
    db_connection: &'c Connection,
}

impl<'c> SqliteTodoStore<'c> {
    pub fn new(db_connection: &'c Connection) -> SqliteTodoStore<'c> {
        SqliteTodoStore { db_connection }
    }

    fn exists(&self, internal_id: InternalId) -> TodoResult<bool> {
        let found = self
            .db_connection
            .query_row(
                "SELECT 1 FROM todos WHERE internal_id = (?1)",
                params![internal_id.get()],
                |_| Ok(()),
            )
            .optional()?;

        Ok(found.is_some())
    }

    fn insert(&self, todo: Todo) -> TodoResult<Todo> {
        self.db_connection.execute(
            "INSERT INTO todos (public_id, version_number, title, detail, due_date, \
             completed_flag, deleted_flag, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                todo.public_id().to_string(),
                todo.version_number().get(),
                todo.title(),
                todo.detail(),
                todo.due_date().get(),
                todo.is_completed(),
                todo.is_deleted(),
                todo.created_at(),
                todo.updated_at(),
            ],
        )?;

        let internal_id = InternalId::new(self.db_connection.last_insert_rowid())?;
        debug!(%internal_id, public_id = %todo.public_id(), "inserted todo");

        Ok(todo.with_internal_id(internal_id))
    }

    fn update(
        &self,
        internal_id: InternalId,
        todo: Todo,
        expected_version: Option<VersionNumber>,
    ) -> TodoResult<Todo> {
        let changed = match expected_version {
            Some(expected) => self.db_connection.execute(
                "UPDATE todos SET version_number = (?1), title = (?2), detail = (?3), \
                 due_date = (?4), completed_flag = (?5), deleted_flag = (?6), updated_at = (?7) \
                 WHERE internal_id = (?8) AND version_number = (?9)",
                params![
                    todo.version_number().get(),
                    todo.title(),
                    todo.detail(),
                    todo.due_date().get(),
                    todo.is_completed(),
                    todo.is_deleted(),
                    todo.updated_at(),
                    internal_id.get(),
                    expected.get(),
                ],
            )?,
            None => self.db_connection.execute(
                "UPDATE todos SET version_number = (?1), title = (?2), detail = (?3), \
                 due_date = (?4), completed_flag = (?5), deleted_flag = (?6), updated_at = (?7) \
                 WHERE internal_id = (?8)",
                params![
                    todo.version_number().get(),
                    todo.title(),
                    todo.detail(),
                    todo.due_date().get(),
                    todo.is_completed(),
                    todo.is_deleted(),
                    todo.updated_at(),
                    internal_id.get(),
                ],
            )?,
        };

        if changed == 0 {
            return match expected_version {
                Some(expected) if self.exists(internal_id)? => Err(TodoError::VersionConflict {
                    public_id: todo.public_id().to_string(),
                    expected: expected.get(),
                }),
                _ => Err(TodoError::NotFound),
            };
        }

        debug!(%internal_id, version = %todo.version_number(), "updated todo");
        Ok(todo)
    }
}

impl TodoStore for SqliteTodoStore<'_> {
    fn find_by_public_id(&self, public_id: &PublicId) -> TodoResult<Option<Todo>> {
        let stored = self
            .db_connection
            .query_row(
                &format!("SELECT {} FROM todos WHERE public_id = (?1)", TODO_COLUMNS),
                params![public_id.to_string()],
                get_stored_todo_from_row,
            )
            .optional()?;

        stored.map(restore_todo).transpose()
    }

    fn find_all(&self) -> TodoResult<Vec<Todo>> {
        let mut todos_statement = self
            .db_connection
            .prepare(&format!("SELECT {} FROM todos", TODO_COLUMNS))?;

        let rows = todos_statement.query_map(params![], get_stored_todo_from_row)?;

        let mut todos = vec![];
        for row_result in rows {
            todos.push(restore_todo(row_result?)?);
        }

        Ok(todos)
    }

    fn save(&self, todo: Todo, expected_version: Option<VersionNumber>) -> TodoResult<Todo> {
        match todo.internal_id() {
            None => self.insert(todo),
            Some(internal_id) => self.update(internal_id, todo, expected_version),
        }
    }
}

impl HistoryLog for SqliteTodoStore<'_> {
    fn append(&self, entry: &TodoHistory) -> TodoResult<()> {
        self.db_connection.execute(
            "INSERT INTO todo_history (internal_id, version_number, public_id, title, detail, \
             due_date, completed_flag, deleted_flag, created_at, updated_at, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.internal_id.get(),
                entry.version_number.get(),
                entry.public_id.to_string(),
                entry.title,
                entry.detail,
                entry.due_date,
                entry.completed,
                entry.deleted,
                entry.created_at,
                entry.updated_at,
                entry.recorded_at,
            ],
        )?;

        Ok(())
    }

    fn history_of(&self, internal_id: InternalId) -> TodoResult<Vec<TodoHistory>> {
        let mut history_statement = self.db_connection.prepare(
            "SELECT version_number, public_id, title, detail, due_date, completed_flag, \
             deleted_flag, created_at, updated_at, recorded_at \
             FROM todo_history WHERE internal_id = (?1) ORDER BY version_number",
        )?;

        let rows = history_statement.query_map(params![internal_id.get()], get_history_row)?;

        let mut history = vec![];
        for row_result in rows {
            let entry = history_from_row(internal_id, row_result?).map_err(|reason| {
                TodoError::CorruptRow {
                    internal_id: internal_id.get(),
                    reason,
                }
            })?;
            history.push(entry);
        }

        Ok(history)
    }
}
