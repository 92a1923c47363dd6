use crate::catalog::application::{AddressingMode, ApplicationRecord, Price, RelocatableModule};
use serde::{Deserialize, Serialize};

/// An organisation or community: dealer, developer, forum, service or user group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub name: Option<String>,
    pub url: Option<String>,
    pub advert_url: Option<String>,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub territories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub title: Option<String>,
    pub url: Option<String>,
    pub advert_url: Option<String>,
    pub date: Option<i64>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub territories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: Option<String>,
    pub definition: Option<String>,
    pub url: Option<String>,
}

/// A computer or expansion card (podule)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareRecord {
    pub name: Option<String>,
    pub developer: Option<String>,
    pub identifier: Option<String>,
    pub url: Option<String>,
    pub advert_url: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pricing: Vec<Price>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relocatable_modules: Vec<RelocatableModule>,
}

/// A book or magazine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub title: Option<String>,
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    pub isbn: Option<String>,
    pub issn: Option<String>,
    pub url: Option<String>,
    pub advert_url: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub published: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pricing: Vec<Price>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub territories: Vec<String>,
}

/// A standalone software component: absolute, font, module, utility or definition file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub name: Option<String>,
    pub version: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub developer: Option<String>,
    pub addressing_mode: Option<AddressingMode>,
    pub syntax: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub date: Option<i64>,
}

/// One leaf element of a `riscos.xml` manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "fields", rename_all = "snake_case")]
pub enum ManifestRecord {
    Dealer(Listing),
    Developer(Listing),
    Event(EventRecord),
    Forum(Listing),
    GlossaryEntry(GlossaryEntry),
    Computer(HardwareRecord),
    Podule(HardwareRecord),
    Book(PublicationRecord),
    Magazine(PublicationRecord),
    Service(Listing),
    Absolute(ComponentRecord),
    App(ApplicationRecord),
    Font(ComponentRecord),
    Module(ComponentRecord),
    MonitorDefinitionFile(ComponentRecord),
    PrinterDefinitionFile(ComponentRecord),
    Utility(ComponentRecord),
    UserGroup(Listing),
    Video(VideoRecord),
}

impl ManifestRecord {
    /// The record's own URL, if it names one
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Dealer(l) | Self::Developer(l) | Self::Forum(l) | Self::Service(l) => {
                l.url.as_deref()
            }
            Self::UserGroup(l) => l.url.as_deref(),
            Self::Event(e) => e.url.as_deref(),
            Self::GlossaryEntry(g) => g.url.as_deref(),
            Self::Computer(h) | Self::Podule(h) => h.url.as_deref(),
            Self::Book(p) | Self::Magazine(p) => p.url.as_deref(),
            Self::Absolute(c)
            | Self::Font(c)
            | Self::Module(c)
            | Self::MonitorDefinitionFile(c)
            | Self::PrinterDefinitionFile(c)
            | Self::Utility(c) => c.url.as_deref(),
            Self::App(a) => a.url.as_deref(),
            Self::Video(v) => v.url.as_deref(),
        }
    }

    /// Short name of the element kind, for logging
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Dealer(_) => "dealer",
            Self::Developer(_) => "developer",
            Self::Event(_) => "event",
            Self::Forum(_) => "forum",
            Self::GlossaryEntry(_) => "glossary entry",
            Self::Computer(_) => "computer",
            Self::Podule(_) => "podule",
            Self::Book(_) => "book",
            Self::Magazine(_) => "magazine",
            Self::Service(_) => "service",
            Self::Absolute(_) => "absolute",
            Self::App(_) => "app",
            Self::Font(_) => "font",
            Self::Module(_) => "module",
            Self::MonitorDefinitionFile(_) => "monitor definition file",
            Self::PrinterDefinitionFile(_) => "printer definition file",
            Self::Utility(_) => "utility",
            Self::UserGroup(_) => "user group",
            Self::Video(_) => "video",
        }
    }
}
