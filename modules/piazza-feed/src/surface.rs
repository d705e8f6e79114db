//! Rendering adapter traits.
//!
//! Each surface receives plain structured data and owns nothing but pixels
//! (or, for the headless adapters, a record of what it was asked to draw).
//! Implementations are cheap handles: methods take `&self`.

use anyhow::Result;

use piazza_common::{Banner, Bounds};

use crate::cards::EventCard;
use crate::chat::ChatLine;
use crate::following::OrganizerRail;
use crate::home::HomeFeed;
use crate::map::{MapView, MarkerSpec};
use crate::notice::Notice;

pub trait MapSurface: Send + Sync {
    /// Create the map widget (tiles, clustering layer) at `view`.
    fn create(&self, view: &MapView);

    fn add_marker(&self, marker: &MarkerSpec);

    fn clear_markers(&self);

    /// May fail (e.g. the widget has no size yet); callers treat that as non-fatal.
    fn fit_bounds(&self, bounds: &Bounds) -> Result<()>;

    fn zoom(&self) -> u8;

    fn set_view(&self, view: &MapView);

    fn open_label(&self, event_id: &str);
}

pub trait DetailPanel: Send + Sync {
    fn show(&self, card: &EventCard);

    fn hide(&self);
}

pub trait ChatPanel: Send + Sync {
    fn set_title(&self, title: &str);

    /// `None` clears the notice area.
    fn show_notice(&self, notice: Option<&Notice>);

    fn set_composer_enabled(&self, enabled: bool);

    /// Replace the message list. Lines are in chronological order.
    fn render_messages(&self, lines: &[ChatLine]);

    fn scroll_to_latest(&self);

    fn clear_input(&self);
}

pub trait FeedSink: Send + Sync {
    fn render_feed(&self, feed: &HomeFeed);

    /// Replace the feed notice; `None` clears it.
    fn show_notice(&self, notice: Option<&Notice>);
}

pub trait RailSink: Send + Sync {
    fn render_rails(&self, rails: &[OrganizerRail]);

    /// Fill the sponsored slot of the rail keyed by `rail_key`.
    fn fill_sponsored(&self, rail_key: &str, banner: &Banner);

    fn show_notice(&self, notice: &Notice);
}
