//! Database connection and schema bootstrap

use crate::orm::{comments, course_professors, courses, likes, professors, reports, reviews, users};
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Statement,
};

/// Open a connection pool.
///
/// SQLite in-memory databases live and die with their connection, so those
/// are pinned to a single pooled connection.
pub async fn connect(url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(url.to_owned());
    if url.contains(":memory:") {
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(max_connections);
    }
    opt.sqlx_logging(false);

    let db = Database::connect(opt).await?;
    log::info!("Connected to {:?} database", db.get_database_backend());
    Ok(db)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

async fn create_index(db: &DatabaseConnection, stmt: IndexCreateStatement) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Create every table and uniqueness index the application relies on.
/// Safe to run against an existing database.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Parents before children for foreign keys.
    create_table(db, &schema, users::Entity).await?;
    create_table(db, &schema, courses::Entity).await?;
    create_table(db, &schema, professors::Entity).await?;
    create_table(db, &schema, course_professors::Entity).await?;
    create_table(db, &schema, reviews::Entity).await?;
    create_table(db, &schema, comments::Entity).await?;
    create_table(db, &schema, likes::Entity).await?;
    create_table(db, &schema, reports::Entity).await?;

    create_index(
        db,
        Index::create()
            .name("idx_likes_review_user")
            .table(likes::Entity)
            .col(likes::Column::ReviewId)
            .col(likes::Column::UserId)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    // NULL targets are distinct, so professor-only reviews do not collide here.
    create_index(
        db,
        Index::create()
            .name("idx_reviews_user_course")
            .table(reviews::Entity)
            .col(reviews::Column::UserId)
            .col(reviews::Column::CourseId)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    create_index(
        db,
        Index::create()
            .name("idx_reviews_user_professor")
            .table(reviews::Entity)
            .col(reviews::Column::UserId)
            .col(reviews::Column::ProfessorId)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    create_index(
        db,
        Index::create()
            .name("idx_reviews_approved_created")
            .table(reviews::Entity)
            .col(reviews::Column::IsApproved)
            .col(reviews::Column::CreatedAt)
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    // Partial index: only one open report per reporter and review.
    // Same syntax on Postgres and SQLite.
    db.execute(Statement::from_string(
        backend,
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_pending_review_user \
         ON reports (review_id, user_id) WHERE status = 'PENDING'",
    ))
    .await?;

    log::info!("Database schema is up to date");
    Ok(())
}
