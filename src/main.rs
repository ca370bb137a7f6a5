use rocket::{catchers, routes, Build, Rocket};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

mod data;
mod environment;
mod error;
mod todo;

use data::DBConnection;
use environment::TodoEnvironment;
use todo::endpoints;

#[derive(Deserialize, Debug)]
struct AppConfig {
    #[serde(default = "default_database_path")]
    database_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("rtodo.db")
}

pub fn build_rocket(connection: Connection, env: TodoEnvironment) -> Rocket<Build> {
    let connection: DBConnection = Arc::new(Mutex::new(connection));

    rocket::build()
        .manage(connection)
        .manage(env)
        .mount(
            "/api",
            routes![
                endpoints::list_todos,
                endpoints::create_todo,
                endpoints::get_todo,
                endpoints::update_todo,
                endpoints::complete_todo,
                endpoints::delete_todo,
                endpoints::get_history,
            ],
        )
        .register(
            "/api",
            catchers![
                error::bad_request,
                error::malformed_body,
                error::not_found,
                error::fallback,
            ],
        )
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "rtodo=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config: AppConfig = rocket::Config::figment().extract()?;

    let connection = Connection::open(&config.database_path)?;
    todo::helpers::init_database(&connection)?;
    info!(path = %config.database_path.display(), "database ready");

    build_rocket(connection, TodoEnvironment::system())
        .launch()
        .await?;

    Ok(())
}
