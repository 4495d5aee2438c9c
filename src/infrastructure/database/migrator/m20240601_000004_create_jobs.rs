//! Create jobs table
//!
//! Job ids are assigned by the planner (max + 1), so the column is a
//! plain integer primary key without auto-increment.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Jobs::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Jobs::JobType).string().not_null())
                    .col(
                        ColumnDef::new(Jobs::State)
                            .string()
                            .not_null()
                            .default("OPEN"),
                    )
                    .col(ColumnDef::new(Jobs::Schedule).date_time().not_null())
                    .col(ColumnDef::new(Jobs::Deadline).date_time())
                    .col(ColumnDef::new(Jobs::BookingId).big_integer())
                    .col(
                        ColumnDef::new(Jobs::CurrentlyAssigned)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Jobs::RobotName).string())
                    .col(ColumnDef::new(Jobs::CartName).string())
                    .col(ColumnDef::new(Jobs::SourceStation).string())
                    .col(ColumnDef::new(Jobs::TargetStation).string())
                    .col(ColumnDef::new(Jobs::ChargingType).string())
                    .col(ColumnDef::new(Jobs::PortLocation).string())
                    .col(ColumnDef::new(Jobs::Start).date_time())
                    .col(ColumnDef::new(Jobs::End).date_time())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_state")
                    .table(Jobs::Table)
                    .col(Jobs::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_booking")
                    .table(Jobs::Table)
                    .col(Jobs::BookingId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Jobs {
    Table,
    Id,
    JobType,
    State,
    Schedule,
    Deadline,
    BookingId,
    CurrentlyAssigned,
    RobotName,
    CartName,
    SourceStation,
    TargetStation,
    ChargingType,
    PortLocation,
    Start,
    End,
}
