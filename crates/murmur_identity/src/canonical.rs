//! Canonical payload encoding.
//!
//! Signatures are computed over a deterministic CBOR map of exactly the
//! immutable fields of an entity. The encoding follows the canonical CBOR
//! rules of RFC 8949 §4.2.1:
//!
//! - Map keys are sorted by their encoded form (length-first, then bytewise)
//! - Integers use the shortest possible encoding
//! - No indefinite-length items, no floats
//!
//! Every payload carries a `kind` entry so a signature over one entity kind
//! can never be replayed as another.

/// A value that may appear in a canonical payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalValue {
    /// Explicit absence of an optional field.
    Null,
    /// Signed integer.
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Text(String),
    /// Nested map with text keys.
    Map(Vec<(String, CanonicalValue)>),
}

/// Builder for the signing input of one entity.
///
/// ```
/// use murmur_identity::CanonicalPayload;
///
/// let a = CanonicalPayload::new("vote").text("id", "v1").integer("value", 1).finish();
/// let b = CanonicalPayload::new("vote").integer("value", 1).text("id", "v1").finish();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone)]
pub struct CanonicalPayload {
    fields: Vec<(String, CanonicalValue)>,
}

impl CanonicalPayload {
    /// Starts a payload for the given entity kind.
    #[must_use]
    pub fn new(kind: &str) -> Self {
        Self {
            fields: vec![("kind".to_string(), CanonicalValue::Text(kind.to_string()))],
        }
    }

    /// Adds a text field.
    #[must_use]
    pub fn text(self, key: &str, value: impl Into<String>) -> Self {
        self.field(key, CanonicalValue::Text(value.into()))
    }

    /// Adds an optional text field, encoded as null when absent.
    #[must_use]
    pub fn optional_text(self, key: &str, value: Option<impl Into<String>>) -> Self {
        let value = value.map_or(CanonicalValue::Null, |v| CanonicalValue::Text(v.into()));
        self.field(key, value)
    }

    /// Adds an integer field.
    #[must_use]
    pub fn integer(self, key: &str, value: i64) -> Self {
        self.field(key, CanonicalValue::Integer(value))
    }

    /// Adds a byte string field.
    #[must_use]
    pub fn bytes(self, key: &str, value: impl Into<Vec<u8>>) -> Self {
        self.field(key, CanonicalValue::Bytes(value.into()))
    }

    /// Adds an arbitrary field.
    #[must_use]
    pub fn field(mut self, key: &str, value: CanonicalValue) -> Self {
        self.fields.push((key.to_string(), value));
        self
    }

    /// Encodes the payload to canonical bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        encode_map(&mut out, &self.fields);
        out
    }
}

fn encode(out: &mut Vec<u8>, value: &CanonicalValue) {
    match value {
        CanonicalValue::Null => out.push(0xf6),
        CanonicalValue::Integer(n) => encode_integer(out, *n),
        CanonicalValue::Bytes(b) => {
            encode_head(out, 2, b.len() as u64);
            out.extend_from_slice(b);
        }
        CanonicalValue::Text(s) => encode_text(out, s),
        CanonicalValue::Map(pairs) => encode_map(out, pairs),
    }
}

#[allow(clippy::cast_sign_loss)]
fn encode_integer(out: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        encode_head(out, 0, n as u64);
    } else {
        // -(n+1) cannot overflow for any negative i64
        encode_head(out, 1, (-(n + 1)) as u64);
    }
}

fn encode_text(out: &mut Vec<u8>, s: &str) {
    encode_head(out, 3, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

#[allow(clippy::cast_possible_truncation)]
fn encode_head(out: &mut Vec<u8>, major_type: u8, value: u64) {
    let mt = major_type << 5;
    if value < 24 {
        out.push(mt | value as u8);
    } else if value <= u64::from(u8::MAX) {
        out.push(mt | 24);
        out.push(value as u8);
    } else if value <= u64::from(u16::MAX) {
        out.push(mt | 25);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u64::from(u32::MAX) {
        out.push(mt | 26);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        out.push(mt | 27);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

fn encode_map(out: &mut Vec<u8>, pairs: &[(String, CanonicalValue)]) {
    let mut encoded: Vec<(Vec<u8>, &CanonicalValue)> = pairs
        .iter()
        .map(|(key, value)| {
            let mut key_bytes = Vec::with_capacity(key.len() + 1);
            encode_text(&mut key_bytes, key);
            (key_bytes, value)
        })
        .collect();

    encoded.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));

    encode_head(out, 5, encoded.len() as u64);
    for (key, value) in encoded {
        out.extend_from_slice(&key);
        encode(out, value);
    }
}
