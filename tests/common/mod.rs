use sea_orm::{Database, DatabaseConnection, DbErr, EntityTrait};
use sea_orm_migration::MigratorTrait;
use std::env;

use orders_loader::entities::prelude::Orders;

/// Set up test database connection
/// Uses TEST_DATABASE_URL environment variable or falls back to default
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let database_url = env::var("TEST_DATABASE_URL").unwrap_or_else(|_| {
        "postgresql://orders_user@localhost:5432/orders_test".to_string()
    });

    let db = Database::connect(&database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Remove every order so each test starts from an empty table
pub async fn cleanup_test_db(db: &DatabaseConnection) -> Result<(), DbErr> {
    Orders::delete_many().exec(db).await?;
    Ok(())
}
