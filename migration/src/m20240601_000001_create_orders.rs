use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Snapshot of the orders spreadsheet, keyed by the sheet's row number
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Number)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::OrderNumber).big_integer().not_null())
                    .col(ColumnDef::new(Orders::PriceUsd).decimal_len(10, 2).not_null())
                    .col(ColumnDef::new(Orders::PriceRur).decimal_len(10, 2).not_null())
                    .col(ColumnDef::new(Orders::DeliveryTime).date().not_null())
                    .col(
                        ColumnDef::new(Orders::LoadedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Stale-row cleanup filters on loaded_at
        manager
            .create_index(
                Index::create()
                    .name("idx_orders_loaded_at")
                    .table(Orders::Table)
                    .col(Orders::LoadedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Orders {
    Table,
    Number,
    OrderNumber,
    PriceUsd,
    PriceRur,
    DeliveryTime,
    LoadedAt,
}
