//! The `programmes` table, living in its own per-`source_id` database file
//! (§3, §4.E). A dedicated `MigratorTrait` keeps this schema independent of
//! the main catalog migrator, the way the teacher keeps each logical store
//! migrating on its own schedule.

use sea_orm::entity::prelude::*;
use sea_orm_migration::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "programmes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub channel_id: String,
    pub start_ts: ChronoDateTimeUtc,
    pub stop_ts: ChronoDateTimeUtc,
    pub title: String,
    pub sub_title: Option<String>,
    pub description: Option<String>,
    /// JSON-encoded `Vec<String>`.
    pub categories: String,
    pub episode_num: Option<String>,
    pub rating: Option<String>,
    pub programme_icon: Option<String>,
    /// Anything XMLTV carries that the model above doesn't name explicitly.
    pub extra_json: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub struct ProgrammeMigrator;

#[derive(DeriveIden)]
enum Programmes {
    Table,
    Id,
    ChannelId,
    StartTs,
    StopTs,
    Title,
    SubTitle,
    Description,
    Categories,
    EpisodeNum,
    Rating,
    ProgrammeIcon,
    ExtraJson,
}

#[derive(DeriveMigrationName)]
struct InitialProgrammeSchema;

#[async_trait::async_trait]
impl MigrationTrait for InitialProgrammeSchema {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Programmes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Programmes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Programmes::ChannelId).string().not_null())
                    .col(ColumnDef::new(Programmes::StartTs).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Programmes::StopTs).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Programmes::Title).string().not_null())
                    .col(ColumnDef::new(Programmes::SubTitle).string())
                    .col(ColumnDef::new(Programmes::Description).text())
                    .col(ColumnDef::new(Programmes::Categories).text().not_null().default("[]"))
                    .col(ColumnDef::new(Programmes::EpisodeNum).string())
                    .col(ColumnDef::new(Programmes::Rating).string())
                    .col(ColumnDef::new(Programmes::ProgrammeIcon).string())
                    .col(ColumnDef::new(Programmes::ExtraJson).text())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_programmes_channel_stop")
                    .table(Programmes::Table)
                    .col(Programmes::ChannelId)
                    .col(Programmes::StopTs)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Programmes::Table).to_owned())
            .await
    }
}

impl MigratorTrait for ProgrammeMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(InitialProgrammeSchema)]
    }
}
