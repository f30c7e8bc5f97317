//! Documentation text for generated operations and schemas.
//!
//! Lookups use member keys: `T:<type path>` for types and `P:<type path>.<field>` for
//! fields, e.g. `T:sample_project::requests::SampleGetRequest`.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Which part of a member's documentation to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocSection {
    Summary,
    Remarks,
    Example,
}

impl DocSection {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "summary" => Some(DocSection::Summary),
            "remarks" => Some(DocSection::Remarks),
            "example" => Some(DocSection::Example),
            _ => None,
        }
    }
}

/// Source of documentation text.
pub trait DocumentationSource: Send + Sync {
    fn lookup(&self, member: &str, section: DocSection) -> Option<String>;
}

/// Key for a type's documentation.
#[must_use]
pub fn type_key(type_path: &str) -> String {
    format!("T:{type_path}")
}

/// Key for a field's documentation.
#[must_use]
pub fn field_key(type_path: &str, field: &str) -> String {
    format!("P:{type_path}.{field}")
}

/// Documentation source with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDocumentation;

impl DocumentationSource for NoDocumentation {
    fn lookup(&self, _member: &str, _section: DocSection) -> Option<String> {
        None
    }
}

/// In-memory documentation, filled in code.
#[derive(Debug, Clone, Default)]
pub struct StaticDocumentation {
    entries: HashMap<(String, DocSection), String>,
}

impl StaticDocumentation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, member: impl Into<String>, section: DocSection, text: impl Into<String>) -> Self {
        self.insert(member, section, text);
        self
    }

    pub fn insert(&mut self, member: impl Into<String>, section: DocSection, text: impl Into<String>) {
        self.entries.insert((member.into(), section), text.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DocumentationSource for StaticDocumentation {
    fn lookup(&self, member: &str, section: DocSection) -> Option<String> {
        self.entries.get(&(member.to_string(), section)).cloned()
    }
}

/// Documentation loaded from an XML file of the form
///
/// ```xml
/// <doc>
///   <members>
///     <member name="T:app::requests::GetItem">
///       <summary>Fetch one item.</summary>
///     </member>
///   </members>
/// </doc>
/// ```
#[derive(Clone, Default)]
pub struct XmlDocumentation {
    inner: StaticDocumentation,
}

impl fmt::Debug for XmlDocumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocumentation")
            .field("entries", &self.inner.len())
            .finish()
    }
}

impl XmlDocumentation {
    /// Load `<dir>/<module_name>.xml`. A missing or unreadable file gives an empty source.
    #[must_use]
    pub fn for_module(dir: impl AsRef<Path>, module_name: &str) -> Self {
        let path = dir.as_ref().join(format!("{module_name}.xml"));
        let xml = match std::fs::read_to_string(&path) {
            Ok(xml) => xml,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No documentation file");
                return Self::default();
            }
        };
        match Self::parse(&xml) {
            Ok(docs) => {
                debug!(path = %path.display(), entries = docs.inner.len(), "Documentation loaded");
                docs
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring malformed documentation file");
                Self::default()
            }
        }
    }

    /// Parse documentation XML.
    ///
    /// # Errors
    ///
    /// Returns the reader error for malformed XML.
    pub fn parse(xml: &str) -> Result<Self, quick_xml::Error> {
        let mut reader = Reader::from_str(xml);
        let mut docs = StaticDocumentation::new();
        let mut member: Option<String> = None;
        let mut section: Option<DocSection> = None;
        let mut text = String::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if tag == "member" {
                        member = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"name")
                            .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                    } else if member.is_some() && section.is_none() {
                        section = DocSection::from_tag(&tag);
                        text.clear();
                    }
                }
                Event::Text(e) if section.is_some() => {
                    text.push_str(&e.xml_content()?);
                }
                Event::CData(e) if section.is_some() => {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
                Event::GeneralRef(e) if section.is_some() => {
                    let name = String::from_utf8_lossy(&e).into_owned();
                    text.push_str(match name.as_str() {
                        "amp" => "&",
                        "lt" => "<",
                        "gt" => ">",
                        "quot" => "\"",
                        "apos" => "'",
                        _ => "",
                    });
                }
                Event::End(e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if tag == "member" {
                        member = None;
                        section = None;
                    } else if let (Some(current), Some(name)) = (section, &member) {
                        if DocSection::from_tag(&tag) == Some(current) {
                            let cleaned = normalize(&text);
                            if !cleaned.is_empty() {
                                docs.insert(name.clone(), current, cleaned);
                            }
                            section = None;
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(Self { inner: docs })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl DocumentationSource for XmlDocumentation {
    fn lookup(&self, member: &str, section: DocSection) -> Option<String> {
        self.inner.lookup(member, section)
    }
}

// Collapse the indentation doc comments carry into single spaces.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
