//! Resource body parser for extracting links and the ETag
//!
//! This module scans JSON resource bodies for:
//! - Outbound links (`@odata.id` and `href` string values)
//! - The first `@odata.etag` string value
//!
//! Parsing is tolerant: a syntax error ends the scan, and whatever was found
//! before it is kept.

use crate::url::{normalize_uri, resolve_link};
use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Property names whose string values are links to other resources
const LINK_PROPERTIES: [&str; 2] = ["@odata.id", "href"];

const ETAG_PROPERTY: &str = "@odata.etag";

/// Extracted information from a resource body
#[derive(Debug, Default)]
pub struct ParsedResource {
    /// Absolute links in document order of first appearance
    pub links: Vec<Url>,

    /// First `@odata.etag` value, or empty
    pub etag: String,

    /// The syntax error that ended the scan early, if any
    pub syntax_error: Option<serde_json::Error>,
}

/// Parses a resource body and extracts its links and ETag
///
/// # Link Extraction Rules
///
/// **Include:**
/// - String values of properties named `@odata.id` or `href`, at any depth
///
/// **Exclude:**
/// - Values that are objects or arrays (`"href": {...}`)
/// - The fetched resource's own URI
/// - Repeats of a link already extracted from this body
/// - Values that cannot form an `http(s)` URI
///
/// Relative values are resolved against the origin of `fetched`; absolute
/// `http(s)` values are kept as they are.
///
/// # Arguments
///
/// * `content` - The response body (may be malformed)
/// * `fetched` - The URI the body was fetched from
///
/// # Example
///
/// ```
/// use redfish_diver::crawler::parse_resource;
/// use url::Url;
///
/// let body = r#"{"@odata.id":"/redfish/v1","Systems":{"@odata.id":"/redfish/v1/Systems"}}"#;
/// let fetched = Url::parse("https://bmc.lab/redfish/v1").unwrap();
/// let parsed = parse_resource(body, &fetched);
/// assert_eq!(parsed.links.len(), 1);
/// assert_eq!(parsed.links[0].as_str(), "https://bmc.lab/redfish/v1/Systems");
/// ```
pub fn parse_resource(content: &str, fetched: &Url) -> ParsedResource {
    let mut parsed = ParsedResource::default();
    if let Err(e) = scan(content, Some(fetched), &mut parsed) {
        parsed.syntax_error = Some(e);
    }
    parsed
}

/// Extracts the outbound links of a resource body
///
/// See [`parse_resource`] for the extraction rules.
pub fn extract_links(content: &str, fetched: &Url) -> Vec<Url> {
    parse_resource(content, fetched).links
}

/// Extracts the first `@odata.etag` string value, or an empty string
pub fn extract_etag(content: &str) -> String {
    let mut parsed = ParsedResource::default();
    // Whatever was found before a syntax error still counts
    let _ = scan(content, None, &mut parsed);
    parsed.etag
}

/// Returns true if the text is a complete JSON document
///
/// An empty body is not JSON.
pub fn is_json_text(content: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(content).is_ok()
}

/// Walks `content` once, writing links and the ETag into `parsed` as they
/// are met. A blank body is empty, not malformed.
fn scan(
    content: &str,
    base: Option<&Url>,
    parsed: &mut ParsedResource,
) -> Result<(), serde_json::Error> {
    if content.trim().is_empty() {
        return Ok(());
    }

    let mut scanner = Scanner {
        base,
        own_uri: base.and_then(|b| normalize_uri(b.as_str()).ok()),
        seen: HashSet::new(),
        etag_found: false,
        parsed,
    };

    let mut deserializer = serde_json::Deserializer::from_str(content);
    AnyValue {
        scanner: &mut scanner,
    }
    .deserialize(&mut deserializer)?;
    deserializer.end()
}

/// Collection state shared by every level of the walk
struct Scanner<'a> {
    /// Links are only collected when a base is known
    base: Option<&'a Url>,
    own_uri: Option<Url>,
    seen: HashSet<String>,
    etag_found: bool,
    parsed: &'a mut ParsedResource,
}

impl Scanner<'_> {
    fn property_string(&mut self, name: &str, value: &str) {
        if name == ETAG_PROPERTY {
            if !self.etag_found {
                self.etag_found = true;
                self.parsed.etag = value.to_string();
            }
            return;
        }

        let Some(base) = self.base else {
            return;
        };
        if let Some(link) = resolve_link(value, base) {
            if self.own_uri.as_ref() != Some(&link) && self.seen.insert(link.to_string()) {
                self.parsed.links.push(link);
            }
        }
    }
}

/// Any JSON value; objects and arrays are walked into
struct AnyValue<'s, 'a> {
    scanner: &'s mut Scanner<'a>,
}

/// The value of a link or ETag property. Only a string is taken; an object
/// or array is walked like any other value.
struct PropertyValue<'s, 'a> {
    scanner: &'s mut Scanner<'a>,
    name: &'s str,
}

impl<'de> DeserializeSeed<'de> for AnyValue<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for AnyValue<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E>(self, _: bool) -> Result<(), E> {
        Ok(())
    }

    fn visit_i64<E>(self, _: i64) -> Result<(), E> {
        Ok(())
    }

    fn visit_u64<E>(self, _: u64) -> Result<(), E> {
        Ok(())
    }

    fn visit_f64<E>(self, _: f64) -> Result<(), E> {
        Ok(())
    }

    fn visit_str<E>(self, _: &str) -> Result<(), E> {
        Ok(())
    }

    fn visit_unit<E>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let scanner = self.scanner;
        while seq
            .next_element_seed(AnyValue {
                scanner: &mut *scanner,
            })?
            .is_some()
        {}
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let scanner = self.scanner;
        while let Some(key) = map.next_key::<String>()? {
            if key == ETAG_PROPERTY || LINK_PROPERTIES.contains(&key.as_str()) {
                map.next_value_seed(PropertyValue {
                    scanner: &mut *scanner,
                    name: &key,
                })?;
            } else {
                map.next_value_seed(AnyValue {
                    scanner: &mut *scanner,
                })?;
            }
        }
        Ok(())
    }
}

impl<'de> DeserializeSeed<'de> for PropertyValue<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for PropertyValue<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a value for {}", self.name)
    }

    fn visit_bool<E>(self, _: bool) -> Result<(), E> {
        Ok(())
    }

    fn visit_i64<E>(self, _: i64) -> Result<(), E> {
        Ok(())
    }

    fn visit_u64<E>(self, _: u64) -> Result<(), E> {
        Ok(())
    }

    fn visit_f64<E>(self, _: f64) -> Result<(), E> {
        Ok(())
    }

    fn visit_str<E>(self, value: &str) -> Result<(), E> {
        self.scanner.property_string(self.name, value);
        Ok(())
    }

    fn visit_unit<E>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<(), A::Error> {
        AnyValue {
            scanner: self.scanner,
        }
        .visit_seq(seq)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<(), A::Error> {
        AnyValue {
            scanner: self.scanner,
        }
        .visit_map(map)
    }
}
