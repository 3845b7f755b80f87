//! Stable listing ids and content fingerprints

use sha2::{Digest, Sha256};

/// Separator fed between fields so ("ab", "c") and ("a", "bc") never collide
const FIELD_SEPARATOR: u8 = 0x1f;

/// Derives the stable listing id from (source, external_id)
///
/// The id is the first 32 hex characters of SHA-256 over the two parts, so it
/// never depends on crawl order, page number, or any other listing field.
pub fn listing_id(source: &str, external_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([FIELD_SEPARATOR]);
    hasher.update(external_id.trim().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

/// Incremental SHA-256 over a fixed sequence of tagged fields
///
/// Every field is written with its name and a presence marker so that an
/// absent value and an empty string hash differently.
pub struct FieldHasher {
    hasher: Sha256,
}

impl FieldHasher {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.tag(name, b'S');
        self.hasher.update(value.as_bytes());
        self.hasher.update([FIELD_SEPARATOR]);
        self
    }

    pub fn opt_text(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(value) => self.text(name, value),
            None => self.absent(name),
        }
    }

    pub fn opt_int(&mut self, name: &str, value: Option<i64>) -> &mut Self {
        match value {
            Some(value) => self.text(name, &value.to_string()),
            None => self.absent(name),
        }
    }

    /// Floats are hashed through their bit pattern to stay exact
    pub fn opt_float(&mut self, name: &str, value: Option<f64>) -> &mut Self {
        match value {
            Some(value) => self.text(name, &format!("{:016x}", value.to_bits())),
            None => self.absent(name),
        }
    }

    pub fn flag(&mut self, name: &str, value: bool) -> &mut Self {
        self.text(name, if value { "1" } else { "0" })
    }

    pub fn list<'a, I>(&mut self, name: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.tag(name, b'L');
        let mut count = 0usize;
        for value in values {
            self.hasher.update(value.as_bytes());
            self.hasher.update([FIELD_SEPARATOR]);
            count += 1;
        }
        self.hasher.update(count.to_le_bytes());
        self
    }

    pub fn finish(&mut self) -> String {
        let hasher = std::mem::take(&mut self.hasher);
        hex::encode(hasher.finalize())
    }

    fn absent(&mut self, name: &str) -> &mut Self {
        self.tag(name, b'N');
        self
    }

    fn tag(&mut self, name: &str, kind: u8) {
        self.hasher.update(name.as_bytes());
        self.hasher.update([FIELD_SEPARATOR, kind]);
    }
}

impl Default for FieldHasher {
    fn default() -> Self {
        Self::new()
    }
}
