//! Message types for the Remote Build control channel.
//!
//! Requests are plain JSON objects of the form `{"route": ..., "data": {...}}`.
//! Responses carry `{"data": ..., "error": ...}` where either field may be
//! missing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status string returned by `get_status` when the plugin host is up.
pub const STATUS_ALIVE: &str = "Alive";

/// Named remote operation understood by the Remote Build plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    GetStatus,
    GetDataFolder,
    LoadPlugin,
    UnloadPlugin,
}

impl Route {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Route::GetStatus => "get_status",
            Route::GetDataFolder => "get_data_folder",
            Route::LoadPlugin => "load_plugin",
            Route::UnloadPlugin => "unload_plugin",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request. Serialized without any length prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub route: Route,
    pub data: Map<String, Value>,
}

impl Request {
    #[must_use]
    pub fn new(route: Route, data: Map<String, Value>) -> Self {
        Self { route, data }
    }

    /// Request with an empty `data` object.
    #[must_use]
    pub fn bare(route: Route) -> Self {
        Self::new(route, Map::new())
    }

    #[must_use]
    pub fn load_plugin(id: &str, source: PluginSource, kind: PluginType) -> Self {
        let mut data = Map::new();
        data.insert("id".to_string(), Value::from(id));
        data.insert("source".to_string(), Value::from(source.as_str()));
        data.insert("type".to_string(), Value::from(kind.as_str()));
        Self::new(Route::LoadPlugin, data)
    }

    #[must_use]
    pub fn unload_plugin(id: &str) -> Self {
        let mut data = Map::new();
        data.insert("id".to_string(), Value::from(id));
        Self::new(Route::UnloadPlugin, data)
    }
}

/// Inbound response. Both fields are optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Response {
    /// `data` as a string, if it is one.
    #[must_use]
    pub fn data_str(&self) -> Option<&str> {
        self.data.as_ref().and_then(Value::as_str)
    }

    /// Error text, or an empty string when the host reported none.
    ///
    /// A missing `error` key counts as success. Non-string errors are rendered
    /// as JSON so they still surface.
    #[must_use]
    pub fn error_text(&self) -> String {
        match &self.error {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_text().is_empty()
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.data_str() == Some(STATUS_ALIVE)
    }
}

/// Where the host should look for the plugin source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PluginSource {
    /// The per-user `OpenplanetX/Plugins` folder.
    #[default]
    User,
    /// The `Openplanet/Plugins` folder in the game directory.
    App,
}

impl PluginSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PluginSource::User => "user",
            PluginSource::App => "app",
        }
    }
}

/// How the plugin source is packaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PluginType {
    Folder,
    #[default]
    Zip,
}

impl PluginType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PluginType::Folder => "folder",
            PluginType::Zip => "zip",
        }
    }
}

/// Anything the channel can put on the wire.
#[derive(Debug, Clone)]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
    Json(Value),
}

impl Payload {
    /// Encode to the raw bytes written to the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if a JSON value fails to serialize.
    pub fn into_bytes(self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Payload::Bytes(bytes) => Ok(bytes),
            Payload::Text(text) => Ok(text.into_bytes()),
            Payload::Json(value) => serde_json::to_vec(&value),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}
