use std::cmp::Ordering;

use super::aggregate::Todo;

/// Due date first, then creation time, so equal deadlines keep the order they were added in.
pub fn due_order(a: &Todo, b: &Todo) -> Ordering {
    a.due_date()
        .cmp(&b.due_date())
        .then_with(|| a.created_at().cmp(&b.created_at()))
}

pub fn active_in_due_order(todos: Vec<Todo>) -> Vec<Todo> {
    let mut active: Vec<Todo> = todos.into_iter().filter(|todo| !todo.is_deleted()).collect();
    active.sort_by(due_order);
    active
}
