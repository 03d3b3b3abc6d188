//! `SeaORM` Entity for orders table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Row number from the source spreadsheet (natural key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub number: i64,
    pub order_number: i64,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price_usd: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price_rur: Decimal,
    pub delivery_time: Date,
    /// Timestamp of the run that last wrote this row
    #[sea_orm(indexed)]
    pub loaded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
