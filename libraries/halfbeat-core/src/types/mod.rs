//! Domain types

mod collection;
mod ids;
mod stream;
mod track;

pub use collection::{Collection, SavedPlaylist};
pub use ids::TrackId;
pub use stream::StreamGrant;
pub use track::Track;
