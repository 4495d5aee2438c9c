//! Create robots table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Robots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Robots::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Robots::Location).string().not_null())
                    .col(ColumnDef::new(Robots::CurrentJobId).integer())
                    .col(ColumnDef::new(Robots::OngoingAction).string())
                    .col(ColumnDef::new(Robots::PreviousAction).string())
                    .col(ColumnDef::new(Robots::CartOnRobot).string())
                    .col(
                        ColumnDef::new(Robots::RobotCharge)
                            .double()
                            .not_null()
                            .default(100.0),
                    )
                    .col(
                        ColumnDef::new(Robots::Available)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Robots::ErrorCount)
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
            .drop_table(Table::drop().table(Robots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Robots {
    Table,
    Name,
    Location,
    CurrentJobId,
    OngoingAction,
    PreviousAction,
    CartOnRobot,
    RobotCharge,
    Available,
    ErrorCount,
}
