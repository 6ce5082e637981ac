pub mod auth;
pub mod burn;
pub mod config;
pub mod crypto;
pub mod db;
pub mod headers;
pub mod models;
pub mod notify;
pub mod okta;
pub mod rate_limit;
pub mod routes;
pub mod slack;
pub mod sweeper;
pub mod vault;

use config::AppConfig;
use db::{Db, DbError};
use headers::{RequestLogger, SecurityHeaders};
use notify::Notifier;
use okta::{CsrfStateStore, OktaClient};
use rate_limit::{RateLimitConfig, RateLimiter};
use rocket_cors::{AllowedOrigins, CorsOptions};
use std::env;
use std::sync::Arc;
use vault::Vault;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "data/vanish.db".to_string());
    rocket_with_db(&db_path)
}

pub fn rocket_with_db(db_path: &str) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, AppConfig::from_env(), RateLimitConfig::from_env())
}

/// Test entry point: inject configuration directly to avoid env var races.
pub fn rocket_with_config(
    db_path: &str,
    app_config: AppConfig,
    rate_config: RateLimitConfig,
) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, app_config, rate_config)
}

fn build_rocket(
    db_path: &str,
    app_config: AppConfig,
    rate_config: RateLimitConfig,
) -> rocket::Rocket<rocket::Build> {
    // Ensure data directory exists
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    if app_config.session_secret.is_empty() {
        eprintln!("⚠️  SESSION_SECRET is empty; sessions will not survive scrutiny. Set it.");
    }

    let db = Db::new(db_path);
    bootstrap_admin(&db, &app_config);

    let vault = Arc::new(Vault::new(app_config.vault_max_bytes));
    let csrf_states = Arc::new(CsrfStateStore::new());
    let notifier = Notifier::from_config(&app_config);
    let okta_client: Option<OktaClient> = app_config
        .okta
        .enabled
        .then(|| OktaClient::new(app_config.okta.clone()));

    let allowed_origins = if app_config.allowed_origins.is_empty() {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&app_config.allowed_origins)
    };
    let cors = CorsOptions {
        allowed_origins,
        ..Default::default()
    }
    .to_cors()
    .expect("Failed to create CORS");

    // 2 MiB JSON limit covers a 1 MiB ciphertext after base64 plus envelope;
    // anything larger is an abuse of the vault, not a message.
    let figment = rocket::Config::figment()
        .merge(("limits.json", 2 * 1024 * 1024))
        .merge(("limits.string", 64 * 1024))
        .merge(("shutdown.grace", 5));

    let sweep_db_path = db_path.to_string();
    let sweep_vault = vault.clone();
    let sweep_states = csrf_states.clone();
    let sweep_interval = app_config.sweep_interval_secs;

    rocket::custom(figment)
        .manage(app_config)
        .manage(db)
        .manage(vault)
        .manage(csrf_states)
        .manage(notifier)
        .manage(okta_client)
        .manage(rate_config)
        .manage(RateLimiter::new())
        .attach(cors)
        .attach(SecurityHeaders)
        .attach(RequestLogger)
        .register(
            "/",
            rocket::catchers![
                routes::bad_request,
                routes::unauthorized,
                routes::forbidden,
                routes::not_found,
                routes::unprocessable,
                routes::too_many_requests,
                routes::internal_error,
            ],
        )
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::register,
                routes::login,
                routes::me,
                routes::okta_login,
                routes::okta_callback,
                routes::list_users,
                routes::create_message,
                routes::consume_message,
                routes::probe_message,
                routes::get_history,
                routes::update_profile,
                routes::change_password,
                routes::delete_account,
                routes::admin_create_user,
                routes::admin_update_user,
                routes::admin_delete_user,
                routes::import_users,
                routes::admin_statistics,
                routes::admin_cleanup,
                routes::slack_command,
                routes::slack_interaction,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff("Sweep Task", {
            move |_rocket| {
                Box::pin(async move {
                    // In-memory databases are test instances; a sweeper on a
                    // second connection would see a different database.
                    if sweep_db_path != ":memory:" {
                        sweeper::spawn_sweep_task(
                            sweep_db_path,
                            sweep_vault,
                            sweep_states,
                            sweep_interval,
                        );
                        println!("🧹 Sweep task started (every {sweep_interval}s)");
                    }
                })
            }
        }))
        .attach(rocket::fairing::AdHoc::on_shutdown("Vault Teardown", |rocket| {
            Box::pin(async move {
                if let Some(vault) = rocket.state::<Arc<Vault>>() {
                    vault.close();
                }
            })
        }))
}

/// First-run bootstrap: make sure the reserved admin account exists. The
/// one-time password printed here is the only plaintext the service ever
/// deliberately logs.
fn bootstrap_admin(db: &Db, config: &AppConfig) {
    match db.find_user_by_email(&config.admin_email) {
        Ok(_) => {}
        Err(DbError::NotFound) => {
            let password = auth::generate_random_password(24);
            let hash = match auth::hash_password(&password) {
                Ok(h) => h,
                Err(e) => {
                    eprintln!("⚠️  Bootstrap admin hash failed: {e}");
                    return;
                }
            };
            match db.create_user(&config.admin_email, "Administrator", &hash, true) {
                Ok(_) => {
                    println!(
                        "🔑 Bootstrap admin {} created. One-time password: {}",
                        config.admin_email, password
                    );
                    println!("   Change it immediately after first login.");
                }
                Err(e) => eprintln!("⚠️  Bootstrap admin creation failed: {e}"),
            }
        }
        Err(e) => eprintln!("⚠️  Bootstrap admin lookup failed: {e}"),
    }
}
