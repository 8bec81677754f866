use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{App, HttpServer};
use anyhow::Context;
use campus_reviews::app_config::AppConfig;
use campus_reviews::{db, AppState};
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let database = db::connect(&config.database_url(), config.database.max_connections)
        .await
        .context("Failed to connect to the database")?;
    if config.database.create_schema {
        db::create_schema(&database)
            .await
            .context("Failed to create database schema")?;
    }

    let secret = if config.auth.jwt_secret.is_empty() {
        let random_string: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        log::warn!("CAMPUS_AUTH__JWT_SECRET is not set. A random signing key was generated, so every issued token becomes invalid when the application restarts.");
        random_string
    } else {
        config.auth.jwt_secret.clone()
    };

    let bind = config.server.bind.clone();
    let workers = config.server.workers;
    let state = AppState::new(database, config, secret.as_bytes());

    log::info!("Listening on {}", bind);
    let mut server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add(("Referrer-Policy", "no-referrer")),
            )
            .wrap(Logger::new("%a \"%r\" %s %Dms"))
            .configure(move |conf| state.configure(conf))
    });
    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    server.bind(&bind)?.run().await?;
    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
fn init_lib_mods() {
    if let Err(err) = dotenv::dotenv() {
        // A missing .env is normal outside development.
        eprintln!("No .env loaded: {}", err);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
