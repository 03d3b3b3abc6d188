//! Persistence for the orders snapshot.
//!
//! Each call runs in its own transaction; an error before `commit` drops the
//! transaction and rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, TransactionTrait,
};

use crate::entities::orders;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert the batch, updating every non-key column on `number` conflict.
    /// Returns the number of rows written.
    async fn upsert_batch(&self, batch: &[orders::Model]) -> Result<u64, DbErr>;

    /// Delete every order whose `loaded_at` differs from `loaded_at`.
    /// Returns the number of rows deleted.
    async fn delete_stale(&self, loaded_at: DateTime<FixedOffset>) -> Result<u64, DbErr>;
}

/// `INSERT ... ON CONFLICT (number) DO UPDATE SET <all other columns>`
pub fn upsert_on_conflict() -> OnConflict {
    OnConflict::column(orders::Column::Number)
        .update_columns([
            orders::Column::OrderNumber,
            orders::Column::PriceUsd,
            orders::Column::PriceRur,
            orders::Column::DeliveryTime,
            orders::Column::LoadedAt,
        ])
        .to_owned()
}

#[derive(Clone)]
pub struct SeaOrmOrderRepository {
    db: DatabaseConnection,
}

impl SeaOrmOrderRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderRepository for SeaOrmOrderRepository {
    async fn upsert_batch(&self, batch: &[orders::Model]) -> Result<u64, DbErr> {
        if batch.is_empty() {
            return Ok(0);
        }

        let models = batch
            .iter()
            .cloned()
            .map(orders::ActiveModel::from);

        let txn = self.db.begin().await?;
        let written = orders::Entity::insert_many(models)
            .on_conflict(upsert_on_conflict())
            .exec_without_returning(&txn)
            .await?;
        txn.commit().await?;

        tracing::debug!(batch = batch.len(), written, "Upserted orders batch");

        Ok(written)
    }

    async fn delete_stale(&self, loaded_at: DateTime<FixedOffset>) -> Result<u64, DbErr> {
        let txn = self.db.begin().await?;
        let result = orders::Entity::delete_many()
            .filter(orders::Column::LoadedAt.ne(loaded_at))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        tracing::debug!(deleted = result.rows_affected, %loaded_at, "Deleted stale orders");

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use sea_orm::{DbBackend, QueryTrait};

    fn order(number: i64) -> orders::Model {
        orders::Model {
            number,
            order_number: 1000 + number,
            price_usd: dec!(10.00),
            price_rur: dec!(901.23),
            delivery_time: NaiveDate::from_ymd_opt(2022, 5, 24).unwrap(),
            loaded_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().fixed_offset(),
        }
    }

    #[test]
    fn test_upsert_statement_updates_every_non_key_column() {
        let sql = orders::Entity::insert_many([order(1), order(2)].map(orders::ActiveModel::from))
            .on_conflict(upsert_on_conflict())
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.starts_with(r#"INSERT INTO "orders""#), "{sql}");
        assert!(sql.contains(r#"ON CONFLICT ("number") DO UPDATE SET"#), "{sql}");
        for column in ["order_number", "price_usd", "price_rur", "delivery_time", "loaded_at"] {
            assert!(
                sql.contains(&format!(r#""{column}" = "excluded"."{column}""#)),
                "missing update of {column}: {sql}"
            );
        }
        assert!(!sql.contains(r#""number" = "excluded"."number""#), "{sql}");
    }

    #[test]
    fn test_delete_statement_filters_on_loaded_at() {
        let loaded_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap().fixed_offset();
        let sql = orders::Entity::delete_many()
            .filter(orders::Column::LoadedAt.ne(loaded_at))
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.starts_with(r#"DELETE FROM "orders" WHERE "orders"."loaded_at" <> "#), "{sql}");
    }
}
