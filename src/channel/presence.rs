use serde::Serialize;
use serde_json::{Map, Value};

/// A presence member as announced by the server or the authorization endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberInfo {
    pub user_id: String,
    pub user_info: Value,
}

impl MemberInfo {
    /// Reads `{user_id, user_info}`; `user_id` may be a string or a number.
    pub fn from_value(value: &Value) -> Option<Self> {
        let user_id = member_id(value.get("user_id")?)?;
        let user_info = value.get("user_info").cloned().unwrap_or(Value::Null);
        Some(Self { user_id, user_info })
    }

    /// Reads the member out of an authorization response.
    ///
    /// Presence auth responses carry the member as a JSON string under
    /// `channel_data`; a bare `{user_id, user_info}` body is accepted too.
    pub fn from_auth_response(response: &Value) -> Option<Self> {
        match response.get("channel_data") {
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|data| Self::from_value(&data)),
            Some(data @ Value::Object(_)) => Self::from_value(data),
            _ => Self::from_value(response),
        }
    }
}

/// Normalizes a member id to the string used as roster key
fn member_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Roster of a presence channel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Members {
    /// This connection's own member entry, filled by the authorization response
    pub me: Option<MemberInfo>,
    /// Number of known member ids. Starts from the server's count, then
    /// grows on a new id and shrinks on removal of a known one; repeated
    /// adds and unknown removals leave it unchanged.
    pub count: u64,
    /// Member ids in arrival order
    pub ids: Vec<String>,
    /// Member id to `user_info`
    pub hash: Map<String, Value>,
}

impl Members {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the `presence` object of a `subscription_succeeded` event.
    ///
    /// Fields the server leaves out keep their current value.
    pub fn merge_presence(&mut self, presence: &Value) {
        if let Some(count) = presence.get("count").and_then(Value::as_u64) {
            self.count = count;
        }
        if let Some(ids) = presence.get("ids").and_then(Value::as_array) {
            self.ids = ids.iter().filter_map(member_id).collect();
        }
        if let Some(hash) = presence.get("hash").and_then(Value::as_object) {
            self.hash = hash.clone();
        }
    }

    /// Applies a `member_added` event. Returns `false` when the data has no member id.
    pub fn add(&mut self, data: &Value) -> bool {
        let Some(member) = MemberInfo::from_value(data) else {
            return false;
        };

        if !self.hash.contains_key(&member.user_id) {
            self.count += 1;
            self.ids.push(member.user_id.clone());
        }
        self.hash.insert(member.user_id, member.user_info);
        true
    }

    /// Applies a `member_removed` event. Returns `false` when the member was unknown.
    pub fn remove(&mut self, data: &Value) -> bool {
        let Some(user_id) = data.get("user_id").and_then(member_id) else {
            return false;
        };

        let known = self.ids.contains(&user_id) || self.hash.contains_key(&user_id);
        self.ids.retain(|id| id != &user_id);
        self.hash.remove(&user_id);
        if known {
            self.count = self.count.saturating_sub(1);
        }
        known
    }

    pub fn get(&self, user_id: &str) -> Option<&Value> {
        self.hash.get(user_id)
    }
}
