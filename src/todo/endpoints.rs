use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{get, post, State};

use crate::data::DBConnection;
use crate::environment::TodoEnvironment;
use crate::error::TodoResult;

use super::data::*;
use super::helpers::SqliteTodoStore;
use super::service::TodoService;

type SqliteTodoService<'a> = TodoService<'a, SqliteTodoStore<'a>, SqliteTodoStore<'a>>;

/// Runs one workflow inside a single transaction; any error rolls it back.
fn with_service<T>(
    db_connection: &State<DBConnection>,
    env: &State<TodoEnvironment>,
    run: impl FnOnce(&SqliteTodoService<'_>) -> TodoResult<T>,
) -> TodoResult<T> {
    let db_connection = db_connection.lock()?;
    let transaction = db_connection.unchecked_transaction()?;

    let store = SqliteTodoStore::new(&transaction);
    let result = run(&TodoService::new(&store, &store, env))?;

    transaction.commit()?;
    Ok(result)
}

#[get("/todos")]
pub fn list_todos(
    db_connection: &State<DBConnection>,
    env: &State<TodoEnvironment>,
) -> TodoResult<Json<Vec<TodoResponse>>> {
    let todos = with_service(db_connection, env, |service| service.list_active_todos())?;

    Ok(Json(todos.iter().map(TodoResponse::from).collect()))
}

#[post("/todos", format = "json", data = "<input>")]
pub fn create_todo(
    input: Json<TodoInput>,
    db_connection: &State<DBConnection>,
    env: &State<TodoEnvironment>,
) -> TodoResult<status::Created<Json<TodoResponse>>> {
    let todo = with_service(db_connection, env, |service| {
        service.create_todo(input.into_inner())
    })?;

    let location = format!("/api/todos/{}", todo.public_id());
    Ok(status::Created::new(location).body(Json(TodoResponse::from(&todo))))
}

#[get("/todos/<public_id>")]
pub fn get_todo(
    public_id: &str,
    db_connection: &State<DBConnection>,
    env: &State<TodoEnvironment>,
) -> TodoResult<Json<TodoResponse>> {
    with_service(db_connection, env, |service| service.get_todo(public_id))
        .map(|todo| Json(TodoResponse::from(&todo)))
}

#[post("/todos/<public_id>", format = "json", data = "<input>")]
pub fn update_todo(
    public_id: &str,
    input: Json<TodoInput>,
    db_connection: &State<DBConnection>,
    env: &State<TodoEnvironment>,
) -> TodoResult<Json<TodoResponse>> {
    with_service(db_connection, env, |service| {
        service.update_todo(public_id, input.into_inner())
    })
    .map(|todo| Json(TodoResponse::from(&todo)))
}

#[post("/todos/<public_id>/complete")]
pub fn complete_todo(
    public_id: &str,
    db_connection: &State<DBConnection>,
    env: &State<TodoEnvironment>,
) -> TodoResult<Json<TodoResponse>> {
    with_service(db_connection, env, |service| service.complete_todo(public_id))
        .map(|todo| Json(TodoResponse::from(&todo)))
}

#[post("/todos/<public_id>/delete")]
pub fn delete_todo(
    public_id: &str,
    db_connection: &State<DBConnection>,
    env: &State<TodoEnvironment>,
) -> TodoResult<Json<TodoResponse>> {
    with_service(db_connection, env, |service| service.delete_todo(public_id))
        .map(|todo| Json(TodoResponse::from(&todo)))
}

#[get("/todos/<public_id>/history")]
pub fn get_history(
    public_id: &str,
    db_connection: &State<DBConnection>,
    env: &State<TodoEnvironment>,
) -> TodoResult<Json<Vec<HistoryResponse>>> {
    let history = with_service(db_connection, env, |service| service.todo_history(public_id))?;

    Ok(Json(history.iter().map(HistoryResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use crate::environment::testing::test_environment;
    use crate::todo::data::{HistoryResponse, TodoResponse};
    use rocket::http::{ContentType, Status};
    use rocket::local::blocking::Client;
    use rusqlite::Connection;
    use serde_json::{json, Value};

    fn client() -> Client {
        let db_connection = Connection::open_in_memory().unwrap();
        crate::todo::helpers::init_database(&db_connection).unwrap();
        let (env, _) = test_environment();

        Client::tracked(crate::build_rocket(db_connection, env)).unwrap()
    }

    fn create(client: &Client, body: Value) -> TodoResponse {
        let response = client
            .post("/api/todos")
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Created);
        response.into_json().unwrap()
    }

    #[test]
    fn create_then_fetch() {
        let client = client();
        let created = create(
            &client,
            json!({ "title": "Buy milk", "detail": "2% fat", "due_date": "2024-05-11" }),
        );

        assert_eq!(created.version_number, 1);
        assert!(!created.completed);

        let response = client
            .get(format!("/api/todos/{}", created.public_id))
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        let fetched: TodoResponse = response.into_json().unwrap();
        assert_eq!(fetched.title, "Buy milk");
        assert_eq!(fetched.detail.as_deref(), Some("2% fat"));
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let client = client();
        let response = client
            .post("/api/todos")
            .header(ContentType::JSON)
            .body(json!({ "title": "  ", "due_date": "2024-05-11" }).to_string())
            .dispatch();

        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["status"], 400);
        assert_eq!(body["message"], "title is required");
        assert_eq!(body["path"], "/api/todos");
    }

    #[test]
    fn complete_twice_then_delete_hides_the_todo() {
        let client = client();
        let created = create(
            &client,
            json!({ "title": "Buy milk", "due_date": "2024-05-12" }),
        );
        let id = created.public_id;

        for _ in 0..2 {
            let response = client.post(format!("/api/todos/{}/complete", id)).dispatch();
            assert_eq!(response.status(), Status::Ok);
            let todo: TodoResponse = response.into_json().unwrap();
            assert!(todo.completed);
            assert_eq!(todo.version_number, 2);
        }

        let history: Vec<HistoryResponse> = client
            .get(format!("/api/todos/{}/history", id))
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(history.len(), 2);

        let response = client.post(format!("/api/todos/{}/delete", id)).dispatch();
        assert_eq!(response.status(), Status::Ok);

        let response = client.get(format!("/api/todos/{}", id)).dispatch();
        assert_eq!(response.status(), Status::NotFound);

        let listed: Vec<TodoResponse> = client.get("/api/todos").dispatch().into_json().unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn update_with_past_due_date_is_rejected() {
        let client = client();
        let created = create(
            &client,
            json!({ "title": "Buy milk", "due_date": "2024-05-12" }),
        );

        let response = client
            .post(format!("/api/todos/{}", created.public_id))
            .header(ContentType::JSON)
            .body(json!({ "title": "X", "due_date": "2024-05-01" }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::BadRequest);

        let fetched: TodoResponse = client
            .get(format!("/api/todos/{}", created.public_id))
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(fetched.version_number, 1);
        assert_eq!(fetched.title, "Buy milk");
    }

    #[test]
    fn unknown_and_malformed_ids() {
        let client = client();

        let response = client
            .get("/api/todos/00000000-0000-0000-0000-000000000999")
            .dispatch();
        assert_eq!(response.status(), Status::NotFound);

        let response = client.post("/api/todos/nope/complete").dispatch();
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[test]
    fn unparsable_body_gets_a_json_bad_request() {
        let client = client();
        let response = client
            .post("/api/todos")
            .header(ContentType::JSON)
            .body(r#"{"title":"x","due_date":"2024-13-45"}"#)
            .dispatch();

        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(response.content_type(), Some(ContentType::JSON));
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["status"], 400);
        assert_eq!(body["error"], "Bad Request");
        assert_eq!(body["path"], "/api/todos");
        assert!(body["message"].is_string());
        assert!(body["timestamp"].is_string());

        let listed: Vec<TodoResponse> = client.get("/api/todos").dispatch().into_json().unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn truncated_body_gets_a_json_bad_request() {
        let client = client();
        let response = client
            .post("/api/todos")
            .header(ContentType::JSON)
            .body(r#"{"title":"#)
            .dispatch();

        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["status"], 400);
        assert_eq!(body["path"], "/api/todos");
    }

    #[test]
    fn unknown_route_gets_a_json_not_found() {
        let client = client();
        let response = client.get("/api/nothing/here").dispatch();

        assert_eq!(response.status(), Status::NotFound);
        let body: Value = response.into_json().unwrap();
        assert_eq!(body["status"], 404);
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["path"], "/api/nothing/here");
    }
}
