//! Create distances table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Distances::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Distances::Start).string().not_null())
                    .col(ColumnDef::new(Distances::Target).string().not_null())
                    .col(ColumnDef::new(Distances::Distance).double().not_null())
                    .primary_key(
                        Index::create()
                            .col(Distances::Start)
                            .col(Distances::Target),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Distances::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Distances {
    Table,
    Start,
    Target,
    Distance,
}
