pub mod epg;
pub mod health;
pub mod playlist;
pub mod portal;
pub mod stream;
pub mod xmltv;
