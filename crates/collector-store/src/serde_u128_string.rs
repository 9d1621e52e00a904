//! Serialize a `u128` as a decimal string.
//!
//! JSON readers commonly lose precision above 2^53, and the generator's
//! word position is a `u128`. Numbers are still accepted on input.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

/// Serialize `value` as a decimal string.
pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

/// Deserialize a `u128` from a decimal string or an unsigned number.
pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U128Input {
        String(String),
        Number(u64),
    }

    match U128Input::deserialize(deserializer)? {
        U128Input::String(raw) => raw.parse::<u128>().map_err(D::Error::custom),
        U128Input::Number(value) => Ok(u128::from(value)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Wrapper {
        #[serde(with = "super")]
        word_pos: u128,
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Wrapper {
            word_pos: u128::from(u64::MAX) + 7,
        })
        .unwrap();
        assert_eq!(json, r#"{"word_pos":"18446744073709551622"}"#);
    }

    #[test]
    fn deserialize_accepts_string() {
        let parsed: Wrapper = serde_json::from_str(r#"{"word_pos":"1337"}"#).unwrap();
        assert_eq!(parsed.word_pos, 1337);
    }

    #[test]
    fn deserialize_accepts_number() {
        let parsed: Wrapper = serde_json::from_str(r#"{"word_pos":1337}"#).unwrap();
        assert_eq!(parsed.word_pos, 1337);
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"word_pos":"abc"}"#).is_err());
    }
}
