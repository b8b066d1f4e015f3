pub mod channel;
pub mod epg_source;
pub mod portal;

pub use channel::ChannelRepository;
pub use epg_source::EpgSourceRepository;
pub use portal::PortalRepository;
