//! Report identifiers and the metadata record attached to each upload.

use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of random bytes in a report identifier.
const REPORT_ID_BYTES: usize = 16;

/// Opaque identifier naming one crash report's artifacts.
///
/// 128 bits from the OS random source, hex-encoded. Identifiers are never
/// derived from upload content, so byte-identical uploads still get distinct
/// storage entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReportId(String);

impl ReportId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; REPORT_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let mut encoded = String::with_capacity(REPORT_ID_BYTES * 2);
        for byte in bytes {
            encoded.push_str(&format!("{:02x}", byte));
        }
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata fields submitted alongside a minidump.
///
/// Every field is optional in the upload and defaults to the empty string.
/// Serialized key order matches the declaration order here.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ReportMetadata {
    pub prod: String,
    pub ver: String,
    pub guid: String,
    pub ptime: String,
    pub ctime: String,
    pub email: String,
    pub comments: String,
}

impl ReportMetadata {
    /// Build a metadata record from parsed multipart form fields.
    ///
    /// Takes the first value of each recognized field; unrecognized fields
    /// are ignored.
    pub fn from_fields(fields: &HashMap<String, Vec<String>>) -> Self {
        Self {
            prod: first_or_empty(fields, "prod"),
            ver: first_or_empty(fields, "ver"),
            guid: first_or_empty(fields, "guid"),
            ptime: first_or_empty(fields, "ptime"),
            ctime: first_or_empty(fields, "ctime"),
            email: first_or_empty(fields, "email"),
            comments: first_or_empty(fields, "comments"),
        }
    }

    /// Serialize as a JSON document terminated by a single newline.
    pub fn to_json_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut encoded = serde_json::to_vec(self)?;
        encoded.push(b'\n');
        Ok(encoded)
    }
}

fn first_or_empty(fields: &HashMap<String, Vec<String>>, name: &str) -> String {
    fields
        .get(name)
        .and_then(|values| values.first())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_id_is_lowercase_hex() {
        let id = ReportId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn report_ids_are_distinct() {
        assert_ne!(ReportId::generate(), ReportId::generate());
    }

    #[test]
    fn from_fields_takes_first_value_and_ignores_unknown() {
        let mut fields = HashMap::new();
        fields.insert("prod".to_string(), vec!["MyApp".to_string(), "Other".to_string()]);
        fields.insert("ver".to_string(), vec!["1.0".to_string()]);
        fields.insert("bogus".to_string(), vec!["dropped".to_string()]);

        let meta = ReportMetadata::from_fields(&fields);
        assert_eq!(meta.prod, "MyApp");
        assert_eq!(meta.ver, "1.0");
        assert_eq!(meta.guid, "");
        assert_eq!(meta.comments, "");
    }

    #[test]
    fn json_line_matches_expected_layout() {
        let mut fields = HashMap::new();
        fields.insert("prod".to_string(), vec!["MyApp".to_string()]);
        fields.insert("ver".to_string(), vec!["1.0".to_string()]);

        let meta = ReportMetadata::from_fields(&fields);
        let encoded = meta.to_json_line().unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            "{\"Prod\":\"MyApp\",\"Ver\":\"1.0\",\"Guid\":\"\",\"Ptime\":\"\",\"Ctime\":\"\",\"Email\":\"\",\"Comments\":\"\"}\n"
        );
    }
}
