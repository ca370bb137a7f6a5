use tracing::{debug, info, warn};

use crate::environment::{Clock, TodoEnvironment};
use crate::error::{TodoError, TodoResult};

use super::aggregate::Todo;
use super::data::*;
use super::util::active_in_due_order;

/// Where todos live. `save` assigns the internal id on first insert; on later
/// saves it fails with a version conflict if the stored row no longer carries
/// `expected_version`.
pub trait TodoStore {
    fn find_by_public_id(&self, public_id: &PublicId) -> TodoResult<Option<Todo>>;
    fn find_all(&self) -> TodoResult<Vec<Todo>>;
    fn save(&self, todo: Todo, expected_version: Option<VersionNumber>) -> TodoResult<Todo>;
}

/// Append-only audit log, one entry per effective mutation.
pub trait HistoryLog {
    fn append(&self, entry: &TodoHistory) -> TodoResult<()>;
    fn history_of(&self, internal_id: InternalId) -> TodoResult<Vec<TodoHistory>>;
}

pub struct TodoService<'a, S, H> {
    store: &'a S,
    history: &'a H,
    env: &'a TodoEnvironment,
}

impl<'a, S: TodoStore, H: HistoryLog> TodoService<'a, S, H> {
    pub fn new(store: &'a S, history: &'a H, env: &'a TodoEnvironment) -> TodoService<'a, S, H> {
        TodoService {
            store,
            history,
            env,
        }
    }

    pub fn create_todo(&self, input: TodoInput) -> TodoResult<Todo> {
        let todo = Todo::create(input, self.env.clock.as_ref(), self.env.ids.as_ref())?;
        let saved = self.store.save(todo, None)?;
        self.record(&saved, Mutation::Changed)?;

        info!(public_id = %saved.public_id(), "created todo");
        Ok(saved)
    }

    pub fn update_todo(&self, public_id: &str, input: TodoInput) -> TodoResult<Todo> {
        let mut todo = self.load(public_id)?;
        let loaded_version = todo.version_number();

        let mutation = todo.update(input, self.env.clock.as_ref())?;
        let saved = self.store.save(todo, Some(loaded_version))?;
        self.record(&saved, mutation)?;

        info!(public_id = %saved.public_id(), version = %saved.version_number(), "updated todo");
        Ok(saved)
    }

    pub fn complete_todo(&self, public_id: &str) -> TodoResult<Todo> {
        let mut todo = self.load(public_id)?;
        if todo.is_completed() {
            debug!(public_id = %todo.public_id(), "todo already completed");
            return Ok(todo);
        }

        let loaded_version = todo.version_number();
        let mutation = todo.complete(self.env.clock.as_ref())?;
        let saved = self.store.save(todo, Some(loaded_version))?;
        self.record(&saved, mutation)?;

        info!(public_id = %saved.public_id(), version = %saved.version_number(), "completed todo");
        Ok(saved)
    }

    pub fn delete_todo(&self, public_id: &str) -> TodoResult<Todo> {
        let mut todo = self.load(public_id)?;
        if todo.is_deleted() {
            debug!(public_id = %todo.public_id(), "todo already deleted");
            return Ok(todo);
        }

        let loaded_version = todo.version_number();
        let mutation = todo.delete(self.env.clock.as_ref())?;
        let saved = self.store.save(todo, Some(loaded_version))?;
        self.record(&saved, mutation)?;

        info!(public_id = %saved.public_id(), version = %saved.version_number(), "deleted todo");
        Ok(saved)
    }

    /// Deleted todos are reported exactly like missing ones.
    pub fn get_todo(&self, public_id: &str) -> TodoResult<Todo> {
        let todo = self.load(public_id)?;
        if todo.is_deleted() {
            return Err(TodoError::NotFound);
        }

        Ok(todo)
    }

    pub fn list_active_todos(&self) -> TodoResult<Vec<Todo>> {
        Ok(active_in_due_order(self.store.find_all()?))
    }

    pub fn todo_history(&self, public_id: &str) -> TodoResult<Vec<TodoHistory>> {
        let todo = self.get_todo(public_id)?;
        match todo.internal_id() {
            Some(internal_id) => self.history.history_of(internal_id),
            None => Ok(vec![]),
        }
    }

    fn load(&self, public_id: &str) -> TodoResult<Todo> {
        let public_id = PublicId::parse(public_id)?;
        self.store
            .find_by_public_id(&public_id)?
            .ok_or(TodoError::NotFound)
    }

    fn record(&self, todo: &Todo, mutation: Mutation) -> TodoResult<()> {
        if !mutation.is_changed() {
            return Ok(());
        }

        match TodoHistory::snapshot(todo, self.env.clock.now()) {
            Some(entry) => self.history.append(&entry),
            None => {
                warn!(public_id = %todo.public_id(), "todo has no internal id yet; history skipped");
                Ok(())
            }
        }
    }
}
