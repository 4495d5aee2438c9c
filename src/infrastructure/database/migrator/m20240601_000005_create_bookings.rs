//! Create bookings snapshot table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bookings::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Bookings::ChargingSessionStatus)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bookings::LastChange).date_time())
                    .col(ColumnDef::new(Bookings::PlannedDropTime).date_time())
                    .col(ColumnDef::new(Bookings::DropLocation).string())
                    .col(
                        ColumnDef::new(Bookings::PlannedPlugintimeSecs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Bookings::PlannedPickupTime).date_time())
                    .col(ColumnDef::new(Bookings::BevSlotPlanned).string())
                    .col(ColumnDef::new(Bookings::BevPortLocation).string())
                    .col(ColumnDef::new(Bookings::ActualDropTime).date_time())
                    .col(ColumnDef::new(Bookings::ActualLocation).string())
                    .col(
                        ColumnDef::new(Bookings::ActualPlugintimeSecs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Bookings::ActualPickupTime).date_time())
                    .col(
                        ColumnDef::new(Bookings::ChargeRequest)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Bookings::CreationTime).date_time().not_null())
                    .col(ColumnDef::new(Bookings::CompletionTime).date_time())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Bookings {
    Table,
    Id,
    ChargingSessionStatus,
    LastChange,
    PlannedDropTime,
    DropLocation,
    PlannedPlugintimeSecs,
    PlannedPickupTime,
    BevSlotPlanned,
    BevPortLocation,
    ActualDropTime,
    ActualLocation,
    ActualPlugintimeSecs,
    ActualPickupTime,
    ChargeRequest,
    CreationTime,
    CompletionTime,
}
