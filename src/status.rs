//! Status messages delivered by the streaming API.
//!
//! Known attributes are typed and optional: a key missing from the message (or
//! sent as `null`) is `None`. A known key holding a value of another JSON type
//! is also `None` for its typed field, and the raw value is kept in `extra`
//! together with every attribute that has no typed field.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Status {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_str: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Client the status was posted from, as an HTML anchor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_status_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_user_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_screen_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retweeted_status: Option<Box<Status>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<Value>,
    /// Attributes without a typed field, e.g. `delete` or `limit` notices, and
    /// known attributes whose value did not fit the typed field.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Author of a status.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_str: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friends_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statuses_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    /// Offset from UTC in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Attributes of one message that have not been claimed by a typed field yet.
struct Attributes(Map<String, Value>);

impl Attributes {
    /// Moves `key` into a typed field.
    ///
    /// `null` is dropped. A value that does not fit `T` stays behind and ends
    /// up in `extra`.
    fn take<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let value = self.0.remove(key)?;
        if value.is_null() {
            return None;
        }
        match T::deserialize(&value) {
            Ok(typed) => Some(typed),
            Err(_) => {
                self.0.insert(key.to_string(), value);
                None
            }
        }
    }

    fn into_extra(self) -> BTreeMap<String, Value> {
        self.0.into_iter().collect()
    }
}

impl Status {
    /// Wraps one decoded stream message.
    ///
    /// Fails only if the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let mut attrs = Attributes(map);
        Self {
            id: attrs.take("id"),
            id_str: attrs.take("id_str"),
            text: attrs.take("text"),
            created_at: attrs.take("created_at"),
            source: attrs.take("source"),
            truncated: attrs.take("truncated"),
            favorited: attrs.take("favorited"),
            in_reply_to_status_id: attrs.take("in_reply_to_status_id"),
            in_reply_to_user_id: attrs.take("in_reply_to_user_id"),
            in_reply_to_screen_name: attrs.take("in_reply_to_screen_name"),
            user: attrs.take("user"),
            retweeted_status: attrs.take("retweeted_status"),
            geo: attrs.take("geo"),
            coordinates: attrs.take("coordinates"),
            place: attrs.take("place"),
            extra: attrs.into_extra(),
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Screen name of the author, if the message carried a user.
    pub fn screen_name(&self) -> Option<&str> {
        self.user.as_ref()?.screen_name.as_deref()
    }

    /// Value of any attribute, typed or not, as it appears in the message.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.extra.get(key) {
            return Some(value.clone());
        }
        match serde_json::to_value(self).ok()? {
            Value::Object(mut map) => map.remove(key),
            _ => None,
        }
    }

    /// Borrows an attribute stored in `extra`.
    pub fn extra_field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::from_map)
    }
}

impl User {
    fn from_map(map: Map<String, Value>) -> Self {
        let mut attrs = Attributes(map);
        Self {
            id: attrs.take("id"),
            id_str: attrs.take("id_str"),
            name: attrs.take("name"),
            screen_name: attrs.take("screen_name"),
            location: attrs.take("location"),
            description: attrs.take("description"),
            url: attrs.take("url"),
            protected: attrs.take("protected"),
            verified: attrs.take("verified"),
            followers_count: attrs.take("followers_count"),
            friends_count: attrs.take("friends_count"),
            statuses_count: attrs.take("statuses_count"),
            created_at: attrs.take("created_at"),
            lang: attrs.take("lang"),
            time_zone: attrs.take("time_zone"),
            utc_offset: attrs.take("utc_offset"),
            profile_image_url: attrs.take("profile_image_url"),
            extra: attrs.into_extra(),
        }
    }

    /// Value of any attribute, typed or not, as it appears in the message.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.extra.get(key) {
            return Some(value.clone());
        }
        match serde_json::to_value(self).ok()? {
            Value::Object(mut map) => map.remove(key),
            _ => None,
        }
    }

    pub fn extra_field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

impl<'de> Deserialize<'de> for User {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::from_map)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Status;

    #[test]
    fn exposes_fields_of_the_decoded_message() {
        let status = Status::from_value(json!({
            "id": 1234567890,
            "text": "listening to #musicmonday",
            "source": "web",
            "truncated": false,
            "in_reply_to_status_id": null,
            "user": {
                "id": 42,
                "screen_name": "mbleigh",
                "followers_count": 1000,
                "utc_offset": -21600
            }
        }))
        .expect("decode status");

        assert_eq!(status.id(), Some(1_234_567_890));
        assert_eq!(status.text(), Some("listening to #musicmonday"));
        assert_eq!(status.source.as_deref(), Some("web"));
        assert_eq!(status.truncated, Some(false));
        assert_eq!(status.in_reply_to_status_id, None);
        assert_eq!(status.screen_name(), Some("mbleigh"));
        assert!(status.extra.is_empty());

        let user = status.user().expect("user present");
        assert_eq!(user.id, Some(42));
        assert_eq!(user.followers_count, Some(1000));
        assert_eq!(user.utc_offset, Some(-21600));
    }

    #[test]
    fn missing_attributes_are_none() {
        let status = Status::from_value(json!({})).expect("empty object decodes");
        assert_eq!(status, Status::default());
        assert!(status.text().is_none());
        assert!(status.screen_name().is_none());
        assert!(status.attribute("text").is_none());
    }

    #[test]
    fn unknown_attributes_are_kept_verbatim() {
        let status = Status::from_value(json!({
            "text": "hi",
            "delete": {"status": {"id": 9, "user_id": 3}},
            "user": {"screen_name": "abc", "profile_background_color": "9ae4e8"}
        }))
        .expect("decode status");

        assert_eq!(
            status.extra_field("delete"),
            Some(&json!({"status": {"id": 9, "user_id": 3}}))
        );
        assert!(status.extra_field("text").is_none());
        assert_eq!(
            status.user().and_then(|user| user.extra_field("profile_background_color")),
            Some(&json!("9ae4e8"))
        );
    }

    #[test]
    fn attribute_covers_typed_and_untyped_keys() {
        let status = Status::from_value(json!({
            "id": 5,
            "text": "hi",
            "limit": {"track": 12},
            "user": {"screen_name": "abc"}
        }))
        .expect("decode status");

        assert_eq!(status.attribute("text"), Some(json!("hi")));
        assert_eq!(status.attribute("id"), Some(json!(5)));
        assert_eq!(status.attribute("limit"), Some(json!({"track": 12})));
        assert_eq!(status.attribute("user"), Some(json!({"screen_name": "abc"})));
        assert_eq!(
            status.user().and_then(|user| user.attribute("screen_name")),
            Some(json!("abc"))
        );
        assert!(status.attribute("favorited").is_none());
    }

    #[test]
    fn nested_retweet_decodes_as_status() {
        let status = Status::from_value(json!({
            "text": "RT @abc: original",
            "retweeted_status": {"id": 7, "text": "original"}
        }))
        .expect("decode status");

        let original = status.retweeted_status.as_deref().expect("retweet present");
        assert_eq!(original.id(), Some(7));
        assert_eq!(original.text(), Some("original"));
    }

    #[test]
    fn wrong_typed_values_stay_raw_in_extra() {
        let status = Status::from_value(json!({
            "id": "123",
            "text": "still here",
            "user": {"screen_name": "x", "followers_count": -1},
            "retweeted_status": "not an object"
        }))
        .expect("valid object decodes");

        assert_eq!(status.id(), None);
        assert_eq!(status.extra_field("id"), Some(&json!("123")));
        assert_eq!(status.attribute("id"), Some(json!("123")));
        assert_eq!(status.text(), Some("still here"));
        assert!(status.retweeted_status.is_none());
        assert_eq!(
            status.extra_field("retweeted_status"),
            Some(&json!("not an object"))
        );

        let user = status.user().expect("user present");
        assert_eq!(user.screen_name.as_deref(), Some("x"));
        assert_eq!(user.followers_count, None);
        assert_eq!(user.extra_field("followers_count"), Some(&json!(-1)));
    }

    #[test]
    fn non_object_messages_are_rejected() {
        assert!(Status::from_value(json!(["not", "an", "object"])).is_err());
        assert!(Status::from_value(json!(42)).is_err());
    }
}
