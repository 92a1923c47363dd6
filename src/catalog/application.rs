use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Processor addressing mode a relocatable module was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    #[serde(rename = "26-bit")]
    Bit26,
    #[serde(rename = "32-bit")]
    Bit32,
}

impl AddressingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bit26 => "26-bit",
            Self::Bit32 => "32-bit",
        }
    }

    /// Parses the forms used in manifests ("26", "26-bit", "32bit", ...)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.starts_with("26") {
            Some(Self::Bit26)
        } else if s.starts_with("32") {
            Some(Self::Bit32)
        } else {
            None
        }
    }
}

/// A relocatable module shipped inside an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocatableModule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressing_mode: Option<AddressingMode>,
}

/// A module an application's boot or run script insists on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A command-line utility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utility {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,
}

/// A build dependency named in a package control file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Metadata from a `RiscPkg/Control` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: Option<String>,
    pub section: Option<String>,
    pub version: Option<String>,
    pub priority: Option<String>,
    pub maintainer: Option<String>,
    pub source: Option<String>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_depends: Vec<PackageDependency>,
}

impl PackageInfo {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A price quoted in a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Kind of offer ("single", "upgrade", "subscription", ...)
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub amount: String,
}

/// Everything known about one RISC OS application
///
/// Built by the archive extractor from the files inside an application directory,
/// or from an `<app>` element of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub name: Option<String>,
    /// Application directory, e.g. `!Edit`
    pub directory: Option<String>,
    pub version: Option<String>,
    /// Release date as epoch seconds
    pub date: Option<i64>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub purpose: Option<String>,
    pub copyright: Option<String>,
    pub help: Option<String>,
    pub description: Option<String>,
    pub developer: Option<String>,
    pub maintainer: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub categories: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub programming_languages: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relocatable_modules: Vec<RelocatableModule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub module_dependencies: Vec<ModuleDependency>,
    /// Filetypes the application runs (`Alias$@RunType_xxx`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filetypes_run: Vec<String>,
    /// Filetypes the application names (`File$Type_xxx`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filetypes_set: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_variables: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub territories: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absolutes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fonts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub utilities: Vec<Utility>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitor_definition_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub printer_definition_files: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dtp_formats: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub minimum_os_versions: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub arm_architectures: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_stages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pricing: Vec<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageInfo>,
    #[serde(default)]
    pub toolbox_required: bool,
}

impl ApplicationRecord {
    /// A record for the application directory `directory`
    pub fn for_directory(directory: &str) -> Self {
        Self {
            directory: Some(directory.to_string()),
            ..Self::default()
        }
    }

    /// Removes duplicates from the list-valued fields, keeping first occurrences
    pub fn dedup(&mut self) {
        dedup_in_order(&mut self.relocatable_modules, |m| m.name.to_lowercase());
        dedup_in_order(&mut self.module_dependencies, |d| d.name.to_lowercase());
        dedup_in_order(&mut self.utilities, |u| u.name.to_lowercase());
        dedup_in_order(&mut self.filetypes_run, |s| s.to_uppercase());
        dedup_in_order(&mut self.filetypes_set, |s| s.to_uppercase());
        dedup_in_order(&mut self.system_variables, |s| s.to_lowercase());
        dedup_in_order(&mut self.absolutes, |s| s.clone());
        dedup_in_order(&mut self.fonts, |s| s.clone());
        dedup_in_order(&mut self.monitor_definition_files, |s| s.clone());
        dedup_in_order(&mut self.printer_definition_files, |s| s.clone());
        dedup_in_order(&mut self.minimum_os_versions, |s| s.clone());
    }
}

fn dedup_in_order<T, K: Eq + std::hash::Hash>(items: &mut Vec<T>, key: impl Fn(&T) -> K) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(key(item)));
}
