use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_portals_table(manager).await?;
        self.create_macs_table(manager).await?;
        self.create_groups_table(manager).await?;
        self.create_channels_table(manager).await?;
        self.create_epg_sources_table(manager).await?;
        self.create_epg_channels_table(manager).await?;
        self.create_indexes(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EpgChannels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EpgSources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Channels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Macs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Portals::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_portals_table(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Portals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Portals::PortalId).string().not_null().primary_key())
                    .col(ColumnDef::new(Portals::Name).string().not_null())
                    .col(ColumnDef::new(Portals::Url).string().not_null())
                    .col(ColumnDef::new(Portals::Proxy).string())
                    .col(ColumnDef::new(Portals::StreamsPerMac).integer().not_null().default(0))
                    .col(ColumnDef::new(Portals::EpgOffset).integer().not_null().default(0))
                    .col(ColumnDef::new(Portals::Enabled).boolean().not_null().default(true))
                    .col(ColumnDef::new(Portals::AutoNormalizeNames).boolean().not_null().default(true))
                    .col(ColumnDef::new(Portals::AutoMatch).boolean().not_null().default(true))
                    .col(ColumnDef::new(Portals::FetchEpg).boolean().not_null().default(true))
                    .col(ColumnDef::new(Portals::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Portals::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn create_macs_table(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Macs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Macs::PortalId).string().not_null())
                    .col(ColumnDef::new(Macs::MacAddress).string().not_null())
                    .col(ColumnDef::new(Macs::ExpiresAt).date())
                    .col(ColumnDef::new(Macs::WatchdogTimeoutSeconds).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Macs::PlaybackLimit).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Macs::LastProfileFetchAt).timestamp_with_time_zone())
                    .primary_key(Index::create().col(Macs::PortalId).col(Macs::MacAddress))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Macs::Table, Macs::PortalId)
                            .to(Portals::Table, Portals::PortalId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_groups_table(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::PortalId).string().not_null())
                    .col(ColumnDef::new(Groups::GenreId).string().not_null())
                    .col(ColumnDef::new(Groups::Name).string().not_null())
                    .col(ColumnDef::new(Groups::ChannelCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Groups::Active).boolean().not_null().default(true))
                    .primary_key(Index::create().col(Groups::PortalId).col(Groups::GenreId))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Groups::Table, Groups::PortalId)
                            .to(Portals::Table, Portals::PortalId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_channels_table(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Channels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Channels::PortalId).string().not_null())
                    .col(ColumnDef::new(Channels::ChannelId).string().not_null())
                    .col(ColumnDef::new(Channels::Name).string().not_null())
                    .col(ColumnDef::new(Channels::Number).string())
                    .col(ColumnDef::new(Channels::Genre).string())
                    .col(ColumnDef::new(Channels::GenreId).string())
                    .col(ColumnDef::new(Channels::Logo).string())
                    .col(ColumnDef::new(Channels::Cmd).string())
                    .col(ColumnDef::new(Channels::AutoName).string())
                    .col(ColumnDef::new(Channels::DisplayName).string())
                    .col(ColumnDef::new(Channels::TagResolution).string())
                    .col(ColumnDef::new(Channels::TagVideoCodec).string())
                    .col(ColumnDef::new(Channels::TagCountry).string())
                    .col(ColumnDef::new(Channels::TagEventTags).string())
                    .col(ColumnDef::new(Channels::TagMiscTags).string())
                    .col(ColumnDef::new(Channels::IsHeader).boolean().not_null().default(false))
                    .col(ColumnDef::new(Channels::IsEvent).boolean().not_null().default(false))
                    .col(ColumnDef::new(Channels::IsRaw).boolean().not_null().default(false))
                    .col(ColumnDef::new(Channels::CustomName).string())
                    .col(ColumnDef::new(Channels::CustomNumber).string())
                    .col(ColumnDef::new(Channels::CustomGenre).string())
                    .col(ColumnDef::new(Channels::CustomEpgId).string())
                    .col(ColumnDef::new(Channels::Enabled).boolean().not_null().default(true))
                    .col(ColumnDef::new(Channels::MatchedName).string())
                    .col(ColumnDef::new(Channels::MatchedSource).string())
                    .col(ColumnDef::new(Channels::MatchedStationId).string())
                    .col(ColumnDef::new(Channels::MatchedCallSign).string())
                    .col(ColumnDef::new(Channels::MatchedLogo).string())
                    .col(ColumnDef::new(Channels::MatchedScore).double())
                    .col(ColumnDef::new(Channels::AvailableMacs).text().not_null().default("[]"))
                    .col(ColumnDef::new(Channels::AlternateIds).text().not_null().default("[]"))
                    .col(ColumnDef::new(Channels::ChannelHash).string().not_null())
                    .col(ColumnDef::new(Channels::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Channels::UpdatedAt).timestamp_with_time_zone().not_null())
                    .primary_key(Index::create().col(Channels::PortalId).col(Channels::ChannelId))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Channels::Table, Channels::PortalId)
                            .to(Portals::Table, Portals::PortalId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_epg_sources_table(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EpgSources::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EpgSources::SourceId).string().not_null().primary_key())
                    .col(ColumnDef::new(EpgSources::Name).string().not_null())
                    .col(ColumnDef::new(EpgSources::Url).string().not_null())
                    .col(ColumnDef::new(EpgSources::SourceType).string().not_null())
                    .col(ColumnDef::new(EpgSources::Enabled).boolean().not_null().default(true))
                    .col(ColumnDef::new(EpgSources::IntervalHours).integer().not_null().default(6))
                    .col(ColumnDef::new(EpgSources::LastFetch).timestamp_with_time_zone())
                    .col(ColumnDef::new(EpgSources::LastRefresh).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await
    }

    async fn create_epg_channels_table(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EpgChannels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EpgChannels::SourceId).string().not_null())
                    .col(ColumnDef::new(EpgChannels::ChannelId).string().not_null())
                    .col(ColumnDef::new(EpgChannels::DisplayName).string())
                    .col(ColumnDef::new(EpgChannels::Icon).string())
                    .col(ColumnDef::new(EpgChannels::Lcn).string())
                    .col(ColumnDef::new(EpgChannels::DisplayNameAliases).text().not_null().default("[]"))
                    .primary_key(Index::create().col(EpgChannels::SourceId).col(EpgChannels::ChannelId))
                    .foreign_key(
                        ForeignKey::create()
                            .from(EpgChannels::Table, EpgChannels::SourceId)
                            .to(EpgSources::Table, EpgSources::SourceId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_channels_portal_genre")
                    .table(Channels::Table)
                    .col(Channels::PortalId)
                    .col(Channels::GenreId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_channels_enabled")
                    .table(Channels::Table)
                    .col(Channels::Enabled)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_macs_expires_at")
                    .table(Macs::Table)
                    .col(Macs::ExpiresAt)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Portals {
    Table,
    PortalId,
    Name,
    Url,
    Proxy,
    StreamsPerMac,
    EpgOffset,
    Enabled,
    AutoNormalizeNames,
    AutoMatch,
    FetchEpg,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Macs {
    Table,
    PortalId,
    MacAddress,
    ExpiresAt,
    WatchdogTimeoutSeconds,
    PlaybackLimit,
    LastProfileFetchAt,
}

#[derive(DeriveIden)]
enum Groups {
    Table,
    PortalId,
    GenreId,
    Name,
    ChannelCount,
    Active,
}

#[derive(DeriveIden)]
enum Channels {
    Table,
    PortalId,
    ChannelId,
    Name,
    Number,
    Genre,
    GenreId,
    Logo,
    Cmd,
    AutoName,
    DisplayName,
    TagResolution,
    TagVideoCodec,
    TagCountry,
    TagEventTags,
    TagMiscTags,
    IsHeader,
    IsEvent,
    IsRaw,
    CustomName,
    CustomNumber,
    CustomGenre,
    CustomEpgId,
    Enabled,
    MatchedName,
    MatchedSource,
    MatchedStationId,
    MatchedCallSign,
    MatchedLogo,
    MatchedScore,
    AvailableMacs,
    AlternateIds,
    ChannelHash,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EpgSources {
    Table,
    SourceId,
    Name,
    Url,
    SourceType,
    Enabled,
    IntervalHours,
    LastFetch,
    LastRefresh,
}

#[derive(DeriveIden)]
enum EpgChannels {
    Table,
    SourceId,
    ChannelId,
    DisplayName,
    Icon,
    Lcn,
    DisplayNameAliases,
}
