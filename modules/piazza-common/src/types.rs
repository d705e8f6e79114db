use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::geo::{self, GeoPoint};
use crate::status::EventStatus;
use crate::time;

// --- Event ---

/// An event record as delivered by the events API.
///
/// Well-known fields are typed. Everything else (coordinates, dates, flat
/// organizer fields) stays in `fields` and is read through the extraction
/// rule tables in [`geo`] and [`time`], because the API is not consistent
/// about naming across endpoints. Nulls in the typed fields decode to their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(alias = "_id", deserialize_with = "deserialize_id")]
    pub id: String,
    /// Read through [`Event::display_title`], which falls back to `name`.
    #[serde(default, alias = "titolo", deserialize_with = "deserialize_text")]
    pub title: String,
    #[serde(default, alias = "categoria")]
    pub category: Option<String>,
    #[serde(default, alias = "sottocategoria")]
    pub subcategory: Option<String>,
    #[serde(default, alias = "lingua")]
    pub language: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default, alias = "prezzo", deserialize_with = "deserialize_price")]
    pub price: Option<f64>,
    #[serde(default, alias = "valuta")]
    pub currency: Option<String>,
    #[serde(default, alias = "citta")]
    pub city: Option<String>,
    #[serde(default, alias = "regione")]
    pub region: Option<String>,
    #[serde(default, alias = "paese", alias = "nazione")]
    pub country: Option<String>,
    /// Raw lifecycle status. May be absent or outside the known vocabulary.
    #[serde(default, alias = "stato")]
    pub status: Option<String>,
    #[serde(default, alias = "visibilita", deserialize_with = "deserialize_visibility")]
    pub visibility: Visibility,
    /// Either a full object or a bare organizer id.
    #[serde(default, alias = "organizzatore", deserialize_with = "deserialize_organizer")]
    pub organizer: Option<Organizer>,
    #[serde(default, alias = "iscritto")]
    pub joined: Option<bool>,
    #[serde(default, alias = "partecipanti", deserialize_with = "deserialize_list")]
    pub participants: Vec<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: None,
            subcategory: None,
            language: None,
            target: None,
            price: None,
            currency: None,
            city: None,
            region: None,
            country: None,
            status: None,
            visibility: Visibility::Public,
            organizer: None,
            joined: None,
            participants: Vec::new(),
            fields: Map::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn with_organizer(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.organizer = Some(Organizer {
            id: Some(id.into()),
            name: Some(name.into()),
        });
        self
    }

    /// `title`, or the `name` some endpoints send instead.
    pub fn display_title(&self) -> &str {
        if !self.title.trim().is_empty() {
            return &self.title;
        }
        TITLE_FALLBACK_FIELDS
            .iter()
            .find_map(|name| self.fields.get(*name).and_then(Value::as_str))
            .unwrap_or(&self.title)
    }

    pub fn start_at(&self) -> Option<DateTime<Utc>> {
        time::first_timestamp(&self.fields, time::START_FIELDS)
    }

    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        time::first_timestamp(&self.fields, time::END_FIELDS)
    }

    pub fn coordinates(&self) -> Option<GeoPoint> {
        geo::resolve_coordinates(&self.fields)
    }

    /// Status parsed against the canonical vocabulary, `None` if absent or unknown.
    pub fn known_status(&self) -> Option<EventStatus> {
        self.status.as_deref().and_then(EventStatus::parse)
    }

    pub fn is_past(&self) -> bool {
        self.known_status() == Some(EventStatus::Past)
    }

    /// Organizer reference: the nested object first, then flat `organizer_id` /
    /// `organizer_name` style fields.
    pub fn organizer_ref(&self) -> OrganizerRef {
        let nested = self.organizer.as_ref();
        let id = nested
            .and_then(|o| o.id.clone())
            .or_else(|| first_string(&self.fields, ORGANIZER_ID_FIELDS));
        let name = nested
            .and_then(|o| o.name.clone())
            .or_else(|| first_string(&self.fields, ORGANIZER_NAME_FIELDS))
            .filter(|n| !n.trim().is_empty());
        OrganizerRef { id, name }
    }

    /// Whether `user_id` participates: the explicit `joined` flag wins, otherwise
    /// the participants list is searched.
    pub fn is_joined_by(&self, user_id: Option<&str>) -> bool {
        if let Some(joined) = self.joined {
            return joined;
        }
        let Some(user_id) = user_id else {
            return false;
        };
        self.participants
            .iter()
            .filter_map(id_string)
            .any(|p| p == user_id)
    }
}

const TITLE_FALLBACK_FIELDS: &[&str] = &["name", "nome"];
const ORGANIZER_ID_FIELDS: &[&str] = &["organizer_id", "organizzatore_id", "owner_id"];
const ORGANIZER_NAME_FIELDS: &[&str] = &["organizer_name", "organizzatore_nome", "owner_name"];

fn first_string(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| fields.get(*name).and_then(id_string))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    #[serde(alias = "pubblico")]
    Public,
    #[serde(alias = "privato")]
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organizer {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "nome", alias = "display_name")]
    pub name: Option<String>,
}

/// Organizer identity resolved from whichever fields the record carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizerRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

// --- Chat ---

/// Result of an open-or-join request for an event's room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomGrant {
    #[serde(default, deserialize_with = "deserialize_opt_id", alias = "room_id", alias = "id")]
    pub room_id: Option<String>,
    #[serde(default, alias = "can_send")]
    pub can_send: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "active_from")]
    pub active_from: Option<String>,
    #[serde(default, alias = "active_until")]
    pub active_until: Option<String>,
    #[serde(default)]
    pub locked: bool,
}

impl RoomGrant {
    pub fn locked() -> Self {
        Self {
            room_id: None,
            can_send: false,
            title: None,
            active_from: None,
            active_until: None,
            locked: true,
        }
    }

    /// A grant without a room id is as good as locked.
    pub fn is_accessible(&self) -> bool {
        !self.locked && self.room_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "from_me", alias = "mine", alias = "isMine")]
    pub from_me: bool,
    #[serde(default, alias = "sender_name", alias = "senderName")]
    pub sender: Option<String>,
    #[serde(default, alias = "body", alias = "testo")]
    pub text: String,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
}

// --- Banners ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default, alias = "link_url")]
    pub link_url: Option<String>,
}

// --- Lenient id/number handling ---

/// Opaque ids arrive as strings, numbers, or `{ "id": ... }` objects.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get("id").and_then(id_string),
        _ => None,
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_string(&value).ok_or_else(|| serde::de::Error::custom("event id must be a string or number"))
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_string))
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

fn deserialize_visibility<'de, D>(deserializer: D) -> Result<Visibility, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Visibility>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

fn deserialize_organizer<'de, D>(deserializer: D) -> Result<Option<Organizer>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(value) => Ok(id_string(&value).map(|id| Organizer {
            id: Some(id),
            name: None,
        })),
        None => Ok(None),
    }
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(geo::parse_decimal))
}
