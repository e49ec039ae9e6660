use serde::Serialize;

/// Named SSE frame with a JSON body, shared by every subscriber of a feed.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerEvent {
    pub name: &'static str,
    pub data: String,
}

impl ServerEvent {
    pub fn json<T: Serialize>(name: &'static str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            name,
            data: serde_json::to_string(payload)?,
        })
    }
}
