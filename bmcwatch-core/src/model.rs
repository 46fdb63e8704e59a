//! Typed views of the Redfish documents walked during discovery
//!
//! Every field is optional and decoded leniently: a field with an unexpected
//! JSON type decodes as absent instead of failing the whole document. Links
//! accept both shapes seen in the wild (a bare URL string, or an object with
//! `@odata.id`) and are resolved to a single URL at decode time.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode into `Some(T)` when the value has the right shape, `None` otherwise
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Decode a document, mapping a non-object body to an error message
pub fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, String> {
    if !value.is_object() {
        return Err(format!("expected a JSON object, got {}", json_kind(value)));
    }
    T::deserialize(value).map_err(|e| e.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `{"@odata.id": "..."}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ODataId {
    #[serde(rename = "@odata.id", default, deserialize_with = "lenient")]
    pub odata_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinkShape {
    Bare(String),
    Object(ODataId),
    Other(Value),
}

/// A hypermedia reference, already reduced to its URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "LinkShape")]
pub struct Link(Option<String>);

impl From<LinkShape> for Link {
    fn from(shape: LinkShape) -> Self {
        let url = match shape {
            LinkShape::Bare(url) => Some(url),
            LinkShape::Object(ODataId { odata_id }) => odata_id,
            LinkShape::Other(_) => None,
        };
        Link(url.filter(|u| !u.is_empty()))
    }
}

impl Link {
    pub fn url(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// First entry of an optional link list
pub fn first_link(links: Option<&[Link]>) -> Option<&str> {
    links.and_then(|l| l.first()).and_then(Link::url)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRoot {
    #[serde(default, deserialize_with = "lenient")]
    pub redfish_version: Option<String>,
    #[serde(default)]
    pub systems: Option<Link>,
    #[serde(default)]
    pub session_service: Option<Link>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionServiceDocument {
    #[serde(default)]
    pub sessions: Option<Link>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Collection {
    #[serde(rename = "Members", default, deserialize_with = "lenient")]
    pub members: Option<Vec<Link>>,
    #[serde(rename = "Members@odata.count", default, deserialize_with = "lenient")]
    pub members_count: Option<u64>,
}

impl Collection {
    pub fn first_member(&self) -> Option<&str> {
        first_link(self.members.as_deref())
    }

    /// Advertised member count, falling back to the length of `Members`
    pub fn member_count(&self) -> u64 {
        match self.members_count {
            Some(count) => count,
            None => self.members.as_ref().map_or(0, |m| m.len() as u64),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.member_count() == 0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusBlock {
    #[serde(default, deserialize_with = "lenient")]
    pub health: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessorSummaryDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub count: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<StatusBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemorySummaryDocument {
    #[serde(rename = "TotalSystemMemoryGiB", default, deserialize_with = "lenient")]
    pub total_system_memory_gib: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<StatusBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemLinks {
    #[serde(default, deserialize_with = "lenient")]
    pub chassis: Option<Vec<Link>>,
    #[serde(default, deserialize_with = "lenient")]
    pub managed_by: Option<Vec<Link>>,
}

/// A member of the Systems collection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub manufacturer: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub power_state: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<StatusBlock>,
    #[serde(default, deserialize_with = "lenient")]
    pub processor_summary: Option<ProcessorSummaryDocument>,
    #[serde(default, deserialize_with = "lenient")]
    pub memory_summary: Option<MemorySummaryDocument>,
    #[serde(default, deserialize_with = "lenient")]
    pub links: Option<SystemLinks>,
    #[serde(default)]
    pub processors: Option<Link>,
    #[serde(default)]
    pub memory: Option<Link>,
    #[serde(default)]
    pub storage: Option<Link>,
    #[serde(default)]
    pub power: Option<Link>,
    #[serde(default)]
    pub thermal: Option<Link>,
    #[serde(default)]
    pub ethernet_interfaces: Option<Link>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChassisDocument {
    #[serde(default)]
    pub power_subsystem: Option<Link>,
    #[serde(default)]
    pub power: Option<Link>,
    #[serde(default)]
    pub thermal_subsystem: Option<Link>,
    #[serde(default)]
    pub thermal: Option<Link>,
}

/// `@Message.ExtendedInfo` comes as a list on most firmware, as a single
/// object on some
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExtendedInfo {
    List(Vec<MessageInfo>),
    Single(MessageInfo),
}

#[derive(Debug, Default, Deserialize)]
struct MessageInfo {
    #[serde(rename = "Message", default, deserialize_with = "lenient")]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default, deserialize_with = "lenient")]
    code: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    message: Option<String>,
    #[serde(rename = "@Message.ExtendedInfo", default, deserialize_with = "lenient")]
    extended_info: Option<ExtendedInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDocument {
    #[serde(default, deserialize_with = "lenient")]
    error: Option<ErrorBody>,
}

/// Hints a controller put in a Redfish error response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorHint {
    pub code: Option<String>,
    pub message: Option<String>,
    pub extended: Option<String>,
}

impl ErrorHint {
    pub fn from_body(body: &Value) -> Option<Self> {
        let error = decode::<ErrorDocument>(body).ok()?.error?;
        let extended = match error.extended_info {
            Some(ExtendedInfo::List(list)) => list.into_iter().next().and_then(|m| m.message),
            Some(ExtendedInfo::Single(info)) => info.message,
            None => None,
        };
        Some(ErrorHint {
            code: error.code,
            message: error.message,
            extended,
        })
    }

    /// Most specific message available
    pub fn summary(&self) -> Option<String> {
        self.extended
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.code.clone())
    }
}
