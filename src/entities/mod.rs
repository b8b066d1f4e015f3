//! SeaORM entity definitions for the main catalog database (`channels.db`).
//!
//! Table layout follows the data model: portals own MACs and groups;
//! channels belong to a portal and a group; EPG sources and their channel
//! aliases live in the same database, while programmes live in the
//! per-source databases defined in [`crate::epg::programme_entities`].

pub mod channel;
pub mod epg_channel;
pub mod epg_source;
pub mod group;
pub mod mac;
pub mod portal;

pub mod prelude {
    pub use super::channel::Entity as Channels;
    pub use super::epg_channel::Entity as EpgChannels;
    pub use super::epg_source::Entity as EpgSources;
    pub use super::group::Entity as Groups;
    pub use super::mac::Entity as Macs;
    pub use super::portal::Entity as Portals;
}
