use base64::{Engine as _, engine::general_purpose::STANDARD};
use juniper::{GraphQLScalar, InputValue, ScalarValue};
use std::fmt;

use crate::{api::err::{ApiResult, invalid_input}, model::Key};


/// An opaque, globally-unique identifier for all objects the GraphQL API
/// returns.
///
/// Clients should treat it as opaque, but it is simply the base64 encoded
/// string `<TypeName>:<primary key>`, e.g. `UHJvZHVjdDo3Mg==` for
/// `Product:72`. IDs are decoded lazily (see [`Id::decode`]) so that
/// resolvers can check permissions before complaining about malformed IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, GraphQLScalar)]
#[graphql(
    name = "ID",
    description = "An opaque, globally-unique identifier",
    parse_token(String, i32),
)]
pub(crate) struct Id(String);

/// The parts of a successfully decoded [`Id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedId {
    type_name: String,
    key: Key,
}

impl Id {
    pub(crate) fn new(type_name: &str, key: Key) -> Self {
        Self(STANDARD.encode(format!("{type_name}:{key}")))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the ID into type name and key, or returns an "invalid input"
    /// error if it isn't a well-formed ID.
    pub(crate) fn decode(&self) -> ApiResult<DecodedId> {
        self.try_decode().ok_or_else(|| invalid_input!(
            key = "id.invalid",
            "Couldn't resolve id: {}.",
            self.0,
        ))
    }

    fn try_decode(&self) -> Option<DecodedId> {
        let raw = STANDARD.decode(&self.0).ok()?;
        let raw = String::from_utf8(raw).ok()?;
        let (type_name, key) = raw.split_once(':')?;
        if type_name.is_empty() {
            return None;
        }

        Some(DecodedId {
            type_name: type_name.to_owned(),
            key: key.parse().ok()?,
        })
    }

    fn to_output<S: ScalarValue>(&self) -> juniper::Value<S> {
        juniper::Value::scalar(self.0.clone())
    }

    fn from_input<S: ScalarValue>(input: &InputValue<S>) -> Result<Self, String> {
        // Like in most GraphQL servers, integers are accepted as input IDs
        // too. They just never decode to anything valid.
        if let Some(s) = input.as_string_value() {
            Ok(Self(s.to_owned()))
        } else if let Some(i) = input.as_int_value() {
            Ok(Self(i.to_string()))
        } else {
            Err(format!("Expected `String` or `Int`, found: {input}"))
        }
    }
}

impl DecodedId {
    /// Returns the key if the ID refers to an object of type `type_name`.
    /// There is intentionally no plain getter for the key, which would make
    /// it easy to forget checking the type.
    pub(crate) fn key_for(&self, type_name: &str) -> Option<Key> {
        (self.type_name == type_name).then_some(self.key)
    }

    pub(crate) fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::err::ApiErrorKind;

    #[test]
    fn encoding() {
        assert_eq!(Id::new("Product", Key(72)).as_str(), "UHJvZHVjdDo3Mg==");
        assert_eq!(Id::new("MenuItem", Key(1)).as_str(), "TWVudUl0ZW06MQ==");
    }

    #[test]
    fn decode_roundtrip() {
        let cases = [("Product", 0), ("ProductVariant", 17), ("Webhook", u64::MAX)];
        for (type_name, key) in cases {
            let decoded = Id::new(type_name, Key(key)).decode().unwrap();
            assert_eq!(decoded.type_name(), type_name);
            assert_eq!(decoded.key_for(type_name), Some(Key(key)));
        }
    }

    #[test]
    fn key_requires_matching_type() {
        let decoded = Id::new("Product", Key(5)).decode().unwrap();
        assert_eq!(decoded.key_for("Page"), None);
        assert_eq!(decoded.key_for("product"), None);
    }

    #[test]
    fn malformed_ids_are_invalid_input() {
        let malformed = vec![
            String::new(),
            "garbage!".into(),
            "123".into(),
            STANDARD.encode("Product"),
            STANDARD.encode(":5"),
            STANDARD.encode("Product:"),
            STANDARD.encode("Product:-5"),
            STANDARD.encode("Product:abc"),
            STANDARD.encode([0xff, 0xfe, b':', b'1']),
        ];

        for raw in malformed {
            let err = Id(raw.clone()).decode().unwrap_err();
            assert_eq!(err.kind, ApiErrorKind::InvalidInput);
            assert_eq!(err.msg, format!("Couldn't resolve id: {raw}."));
        }
    }
}
