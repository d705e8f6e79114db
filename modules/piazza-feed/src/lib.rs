//! View core for the Piazza events client.
//!
//! Pure data transforms (cards, rails, markers) feed thin rendering adapters
//! defined in [`surface`]. Components that talk to the events API take it
//! through the [`traits::EventsApi`] seam so they can run headless.

pub mod cards;
pub mod chat;
pub mod context;
pub mod following;
pub mod headless;
pub mod home;
pub mod loader;
pub mod map;
pub mod notice;
pub mod selection;
pub mod surface;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use chat::{ChatLine, ChatPhase, ChatPollingSession, OpenOutcome, SendOutcome};
pub use context::ViewerContext;
pub use following::{FollowingFeed, OrganizerRail, RailSlot};
pub use loader::{FeedLoader, LoadOutcome};
pub use map::{GeoMapProjector, MapLink};
pub use notice::{Notice, NoticeKind};
pub use selection::SelectionController;
pub use traits::EventsApi;
