//! Log records and their CBOR encoding.

use crate::error::{CoreError, CoreResult};
use ciborium::value::Value;

/// A single entry of the commit log.
///
/// The offset is assigned by the log when the record is appended; whatever
/// the caller puts there is overwritten.
///
/// ## Encoding
///
/// Records are stored as a CBOR map:
///
/// ```text
/// { "offset": uint, "value": bytes }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Opaque payload.
    pub value: Vec<u8>,
    /// Position of the record in the log.
    pub offset: u64,
}

impl Record {
    /// Creates a record with the given payload and offset 0.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            offset: 0,
        }
    }

    /// Encodes to CBOR.
    ///
    /// # Errors
    ///
    /// Returns a codec error if serialization fails.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let map = Value::Map(vec![
            (Value::Text("offset".into()), Value::Integer(self.offset.into())),
            (Value::Text("value".into()), Value::Bytes(self.value.clone())),
        ]);

        let mut buf = Vec::with_capacity(self.value.len() + 24);
        ciborium::into_writer(&map, &mut buf)
            .map_err(|e| CoreError::codec(format!("failed to encode record: {e}")))?;
        Ok(buf)
    }

    /// Decodes from CBOR.
    ///
    /// A missing `offset` decodes as 0 and a missing `value` as empty.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the bytes are not a CBOR map or a field has
    /// the wrong type.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let value: Value = ciborium::from_reader(bytes)
            .map_err(|e| CoreError::codec(format!("failed to decode record: {e}")))?;
        let map = value
            .as_map()
            .ok_or_else(|| CoreError::codec("expected map"))?;

        let get_field = |name: &str| {
            map.iter()
                .find(|(k, _)| k.as_text() == Some(name))
                .map(|(_, v)| v)
        };

        let offset = match get_field("offset") {
            Some(v) => v
                .as_integer()
                .and_then(|i| u64::try_from(i).ok())
                .ok_or_else(|| CoreError::codec("offset is not an unsigned integer"))?,
            None => 0,
        };

        let value = match get_field("value") {
            Some(v) => v
                .as_bytes()
                .cloned()
                .ok_or_else(|| CoreError::codec("value is not a byte string"))?,
            None => Vec::new(),
        };

        Ok(Self { value, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_value(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).unwrap();
        buf
    }

    #[test]
    fn record_roundtrip() {
        let record = Record {
            value: b"hello world".to_vec(),
            offset: 16,
        };
        let decoded = Record::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn decode_missing_fields_defaults() {
        let bytes = encode_value(&Value::Map(vec![]));
        let decoded = Record::decode(&bytes).unwrap();
        assert_eq!(decoded, Record::default());
    }

    #[test]
    fn decode_rejects_non_map() {
        let bytes = encode_value(&Value::Integer(3.into()));
        assert!(matches!(Record::decode(&bytes), Err(CoreError::Codec { .. })));
    }

    #[test]
    fn decode_rejects_wrong_field_type() {
        let bytes = encode_value(&Value::Map(vec![(
            Value::Text("value".into()),
            Value::Text("not bytes".into()),
        )]));
        assert!(matches!(Record::decode(&bytes), Err(CoreError::Codec { .. })));

        let bytes = encode_value(&Value::Map(vec![(
            Value::Text("offset".into()),
            Value::Integer((-1).into()),
        )]));
        assert!(matches!(Record::decode(&bytes), Err(CoreError::Codec { .. })));
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(Record::decode(&[0xff, 0x00, 0x13]).is_err());
        assert!(Record::decode(&[]).is_err());
    }

    proptest! {
        #[test]
        fn any_record_roundtrips(value in prop::collection::vec(any::<u8>(), 0..512), offset in any::<u64>()) {
            let record = Record { value, offset };
            let decoded = Record::decode(&record.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded, record);
        }
    }
}
