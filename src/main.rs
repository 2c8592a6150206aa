#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod env;
mod error;
mod models;
mod provision;
mod reconcile;
mod sheet;
mod stats;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use api::{
    api_create_player, api_create_test, api_delete_player, api_delete_test,
    api_download_template, api_get_player_profile, api_get_players, api_get_results,
    api_get_sessions, api_get_tests, api_login, api_logout, api_me, api_me_unauthorized,
    api_provision_accounts, api_register, api_update_player, api_update_test, api_upload_scores,
    health,
};
use auth::unauthorized_api;
use db::clean_expired_sessions;
use env::load_environment;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, tokio};
use telemetry::TelemetryFairing;
use telemetry::init_tracing;
use telemetry::shutdown_telemetry;

use sqlx::SqlitePool;
use tracing::{error, info};

const SESSION_SWEEP_INTERVAL_SECS: u64 = 3600;

fn spawn_session_sweeper(pool: SqlitePool) {
    tokio::spawn(async move {
        // Let startup settle before the first sweep
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(0) => {}
                Ok(count) => info!("Removed {} expired sessions", count),
                Err(e) => error!("Session sweep failed: {}", e),
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS)).await;
        }
    });
}

#[launch]
async fn rocket() -> _ {
    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }
    init_tracing();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_default();

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    spawn_session_sweeper(pool.clone());

    info!("Running database migrations...");
    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        error!("Failed to run migrations: {}", e);
        panic!("Database migration failed: {}", e);
    }
    info!("Migrations complete");

    init_rocket(pool).await
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting fitness tracker");

    rocket::build()
        .manage(pool)
        .mount(
            "/api",
            routes![
                api_login,
                api_me,
                api_me_unauthorized,
                api_logout,
                api_register,
                api_get_players,
                api_create_player,
                api_update_player,
                api_delete_player,
                api_get_player_profile,
                api_get_tests,
                api_create_test,
                api_update_test,
                api_delete_test,
                api_get_sessions,
                api_get_results,
                api_download_template,
                api_upload_scores,
                api_provision_accounts,
            ],
        )
        .register("/api", catchers![unauthorized_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Flush telemetry", |_| {
            Box::pin(async {
                shutdown_telemetry();
            })
        }))
}
