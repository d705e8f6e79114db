use serde::{Deserialize, Serialize};

/// Responses arrive either bare or wrapped in `{ "data": ... }` depending on
/// the endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

/// Acknowledgement body for write endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    #[serde(default = "default_ok")]
    pub ok: bool,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

fn default_ok() -> bool {
    true
}

/// Body for posting a chat message.
#[derive(Debug, Clone, Serialize)]
pub struct PostMessageInput<'a> {
    pub text: &'a str,
}
