//! Create carts table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Carts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Carts::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Carts::Location).string().not_null())
                    .col(ColumnDef::new(Carts::BookingId).big_integer())
                    .col(
                        ColumnDef::new(Carts::Plugged)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Carts::ActionState).string())
                    .col(ColumnDef::new(Carts::ModeResponse).string())
                    .col(ColumnDef::new(Carts::StateOfCharge).string())
                    .col(ColumnDef::new(Carts::StatusFlag).string())
                    .col(
                        ColumnDef::new(Carts::ChargerOk)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Carts::ChargerState).string())
                    .col(
                        ColumnDef::new(Carts::ChargerError)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Carts::BalancingRequest)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Carts::CartCharge)
                            .double()
                            .not_null()
                            .default(100.0),
                    )
                    .col(
                        ColumnDef::new(Carts::Available)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Carts::ErrorCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Carts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Carts {
    Table,
    Name,
    Location,
    BookingId,
    Plugged,
    ActionState,
    ModeResponse,
    StateOfCharge,
    StatusFlag,
    ChargerOk,
    ChargerState,
    ChargerError,
    BalancingRequest,
    CartCharge,
    Available,
    ErrorCount,
}
