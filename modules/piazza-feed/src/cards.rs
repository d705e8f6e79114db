use chrono::{DateTime, Utc};
use serde::Serialize;

use piazza_common::{classify_event, format_date_range, Event, EventStatus, Visibility};

use crate::context::ViewerContext;

/// Label for a raw status outside the known vocabulary.
pub const UNCONFIRMED_STATUS_LABEL: &str = "To be confirmed";

/// Everything a card or detail panel shows for one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCard {
    pub event_id: String,
    pub title: String,
    /// `None` when the record carries a status the vocabulary doesn't know;
    /// such cards sort last and are labelled as unconfirmed.
    pub status: Option<EventStatus>,
    pub status_label: &'static str,
    pub date_range: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub language: Option<String>,
    pub target: Option<String>,
    pub price_label: String,
    pub place: Option<String>,
    pub organizer_name: Option<String>,
    pub visibility: Visibility,
    pub joined: bool,
}

impl EventCard {
    pub fn from_event(event: &Event, ctx: &ViewerContext) -> Self {
        Self::at(event, ctx, Utc::now())
    }

    pub fn at(event: &Event, ctx: &ViewerContext, now: DateTime<Utc>) -> Self {
        let status = match event.status.as_deref() {
            Some(raw) if EventStatus::parse(raw).is_none() => None,
            _ => Some(classify_event(event, now)),
        };
        Self {
            event_id: event.id.clone(),
            title: event.display_title().to_string(),
            status,
            status_label: status.map_or(UNCONFIRMED_STATUS_LABEL, |s| s.label()),
            date_range: format_date_range(event.start_at(), event.end_at()),
            category: event.category.clone(),
            subcategory: event.subcategory.clone(),
            language: event.language.clone(),
            target: event.target.clone(),
            price_label: price_label(event.price, event.currency.as_deref()),
            place: place_label(event),
            organizer_name: event.organizer_ref().name,
            visibility: event.visibility,
            joined: event.is_joined_by(ctx.user_id()),
        }
    }
}

pub fn price_label(price: Option<f64>, currency: Option<&str>) -> String {
    match price {
        Some(p) if p > 0.0 => {
            let amount = format!("{p:.2}").replace('.', ",");
            match currency {
                Some(c) if c.eq_ignore_ascii_case("eur") || c == "€" => format!("€ {amount}"),
                Some(c) => format!("{} {amount}", c.to_uppercase()),
                None => format!("€ {amount}"),
            }
        }
        _ => "Free".to_string(),
    }
}

/// "City, Region, Country" with empty parts dropped.
fn place_label(event: &Event) -> Option<String> {
    let parts: Vec<&str> = [&event.city, &event.region, &event.country]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}
