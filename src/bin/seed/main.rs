use anyhow::Context;
use campus_reviews::app_config::AppConfig;
use campus_reviews::{db, seed};
use env_logger::Env;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let database = db::connect(&config.database_url(), config.database.max_connections)
        .await
        .context("Failed to connect to the database")?;
    db::create_schema(&database)
        .await
        .context("Failed to create database schema")?;

    let users = seed::seed(&database).await.context("Seeding failed")?;
    for user in &users {
        log::info!("{:<10} {} / {}", format!("{:?}", user.role), user.email, seed::DEMO_PASSWORD);
    }
    log::info!("Seeded {} demo users", users.len());
    Ok(())
}
