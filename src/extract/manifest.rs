//! `riscos.xml` manifest parsing
//!
//! A manifest is a tree of sections (`dealers`, `software/apps`, ...) holding
//! leaf elements that each become one [`ManifestRecord`]. Tag names are matched
//! case-insensitively with `_` and `-` ignored, so `userGroups`, `user_groups`
//! and `usergroups` are the same section. Sections may be nested under grouping
//! elements or appear directly under the root.

use crate::catalog::{
    AddressingMode, ApplicationRecord, ComponentRecord, EventRecord, GlossaryEntry,
    HardwareRecord, Listing, ManifestRecord, ModuleDependency, Price, PublicationRecord,
    RelocatableModule, Utility, VideoRecord,
};
use crate::extract::{ExtractionError, ExtractionReport, ExtractionResult};
use chrono::NaiveDate;
use roxmltree::{Document, Node};

/// Elements that only group other elements
const SECTIONS: &[&str] = &[
    "riscos",
    "dealers",
    "developers",
    "events",
    "forums",
    "glossary",
    "hardware",
    "computers",
    "podules",
    "publications",
    "books",
    "magazines",
    "services",
    "software",
    "absolutes",
    "apps",
    "fonts",
    "modules",
    "relocatablemodules",
    "monitordefinitionfiles",
    "printerdefinitionfiles",
    "utilities",
    "usergroups",
    "videos",
];

/// Parses a manifest into its leaf records
///
/// Unknown elements are reported as warnings and skipped.
pub fn parse_manifest(xml: &str) -> ExtractionResult<ExtractionReport<ManifestRecord>> {
    let document =
        Document::parse(xml).map_err(|e| ExtractionError::MalformedManifest(e.to_string()))?;

    let mut report = ExtractionReport::default();
    walk(document.root_element(), &mut report);
    Ok(report)
}

fn walk(section: Node, report: &mut ExtractionReport<ManifestRecord>) {
    for child in section.children().filter(Node::is_element) {
        let tag = normalise_tag(child.tag_name().name());
        if let Some(record) = parse_leaf(&tag, child) {
            report.items.push(record);
        } else if SECTIONS.contains(&tag.as_str()) {
            walk(child, report);
        } else if !is_leaf_tag(&tag) {
            report
                .warnings
                .push(format!("unknown manifest element <{}>", child.tag_name().name()));
        }
    }
}

fn normalise_tag(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_leaf_tag(tag: &str) -> bool {
    matches!(
        tag,
        "dealer"
            | "developer"
            | "event"
            | "forum"
            | "entry"
            | "glossaryentry"
            | "computer"
            | "podule"
            | "book"
            | "magazine"
            | "service"
            | "absolute"
            | "app"
            | "font"
            | "module"
            | "relocatablemodule"
            | "monitordefinitionfile"
            | "printerdefinitionfile"
            | "utility"
            | "usergroup"
            | "video"
    )
}

/// Builds the record for a leaf element; `None` for non-leaves and empty leaves
fn parse_leaf(tag: &str, node: Node) -> Option<ManifestRecord> {
    let fields = Fields { node };
    let record = match tag {
        "dealer" => ManifestRecord::Dealer(non_empty(fields.listing())?),
        "developer" => ManifestRecord::Developer(non_empty(fields.listing())?),
        "forum" => ManifestRecord::Forum(non_empty(fields.listing())?),
        "service" => ManifestRecord::Service(non_empty(fields.listing())?),
        "usergroup" => ManifestRecord::UserGroup(non_empty(fields.listing())?),
        "event" => ManifestRecord::Event(non_empty(fields.event())?),
        "entry" | "glossaryentry" => ManifestRecord::GlossaryEntry(non_empty(GlossaryEntry {
            term: fields.text(&["term", "name"]),
            definition: fields.text(&["definition", "description"]),
            url: fields.text(&["url"]),
        })?),
        "computer" => ManifestRecord::Computer(non_empty(fields.hardware())?),
        "podule" => ManifestRecord::Podule(non_empty(fields.hardware())?),
        "book" => ManifestRecord::Book(non_empty(fields.publication())?),
        "magazine" => ManifestRecord::Magazine(non_empty(fields.publication())?),
        "absolute" => ManifestRecord::Absolute(non_empty(fields.component())?),
        "font" => ManifestRecord::Font(non_empty(fields.component())?),
        "module" | "relocatablemodule" => ManifestRecord::Module(non_empty(fields.component())?),
        "monitordefinitionfile" => {
            ManifestRecord::MonitorDefinitionFile(non_empty(fields.component())?)
        }
        "printerdefinitionfile" => {
            ManifestRecord::PrinterDefinitionFile(non_empty(fields.component())?)
        }
        "utility" => ManifestRecord::Utility(non_empty(fields.component())?),
        "app" => ManifestRecord::App(non_empty(fields.application())?),
        "video" => ManifestRecord::Video(non_empty(VideoRecord {
            title: fields.text(&["title", "name"]),
            url: fields.text(&["url"]),
            description: fields.text(&["description"]),
            date: fields.date(&["date", "released"]),
        })?),
        _ => return None,
    };
    Some(record)
}

fn non_empty<T: Default + PartialEq>(value: T) -> Option<T> {
    if value == T::default() {
        None
    } else {
        Some(value)
    }
}

fn node_text(node: Node) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Child lookups on one leaf element
struct Fields<'a, 'input> {
    node: Node<'a, 'input>,
}

impl<'a, 'input> Fields<'a, 'input> {
    fn child(&self, names: &[&str]) -> Option<Node<'a, 'input>> {
        self.node
            .children()
            .filter(Node::is_element)
            .find(|n| names.contains(&normalise_tag(n.tag_name().name()).as_str()))
    }

    fn text(&self, names: &[&str]) -> Option<String> {
        self.child(names).and_then(node_text)
    }

    /// Texts of the children of a list element such as `<territories>`
    fn list(&self, names: &[&str]) -> Vec<String> {
        self.child(names)
            .map(|list| {
                list.children()
                    .filter(Node::is_element)
                    .filter_map(node_text)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A date given as `day`/`month`/`year` attributes or as `YYYY-MM-DD` text
    fn date(&self, names: &[&str]) -> Option<i64> {
        let node = self.child(names)?;
        let from_attributes = || {
            let part = |name: &str| {
                node.attributes()
                    .find(|a| a.name().eq_ignore_ascii_case(name))
                    .and_then(|a| a.value().trim().parse::<u32>().ok())
            };
            let year = i32::try_from(part("year")?).ok()?;
            NaiveDate::from_ymd_opt(year, part("month").unwrap_or(1), part("day").unwrap_or(1))
        };
        let date = from_attributes()
            .or_else(|| NaiveDate::parse_from_str(&node_text(node)?, "%Y-%m-%d").ok())?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
    }

    fn attribute_or_text(&self, names: &[&str], attribute: &str) -> Option<String> {
        let node = self.child(names)?;
        node.attribute(attribute)
            .map(str::to_string)
            .or_else(|| node_text(node))
    }

    /// `<territories>` plus a `territory` attribute on `<description>`
    fn territories(&self) -> Vec<String> {
        let mut territories = self.list(&["territories"]);
        if let Some(territory) = self
            .child(&["description"])
            .and_then(|d| d.attribute("territory"))
        {
            if !territories.iter().any(|t| t == territory) {
                territories.push(territory.to_string());
            }
        }
        territories
    }

    fn pricing(&self) -> Vec<Price> {
        let price = |node: Node, kind: String| {
            node_text(node).map(|amount| Price {
                kind,
                currency: node.attribute("currency").map(str::to_string),
                amount,
            })
        };

        let mut pricing: Vec<Price> = self
            .child(&["pricing"])
            .map(|list| {
                list.children()
                    .filter(Node::is_element)
                    .filter_map(|n| price(n, normalise_tag(n.tag_name().name())))
                    .collect()
            })
            .unwrap_or_default();
        pricing.extend(
            self.node
                .children()
                .filter(|n| n.is_element() && normalise_tag(n.tag_name().name()) == "price")
                .filter_map(|n| price(n, "single".to_string())),
        );
        pricing
    }

    fn relocatable_modules(&self) -> Vec<RelocatableModule> {
        self.child(&["relocatablemodules", "modules"])
            .map(|list| {
                list.children()
                    .filter(Node::is_element)
                    .filter_map(|n| {
                        let module = Fields { node: n };
                        Some(RelocatableModule {
                            name: module.text(&["name"])?,
                            version: module.text(&["version"]),
                            addressing_mode: module
                                .text(&["addressingmode"])
                                .and_then(|m| AddressingMode::parse(&m)),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn listing(&self) -> Listing {
        Listing {
            name: self.text(&["name"]),
            url: self.text(&["url"]),
            advert_url: self.text(&["adverturl"]),
            address: self.text(&["address"]),
            contact: self.text(&["contact"]),
            email: self.text(&["email"]),
            telephone: self.text(&["telephone"]),
            description: self.text(&["description"]),
            territories: self.territories(),
        }
    }

    fn event(&self) -> EventRecord {
        EventRecord {
            title: self.text(&["title", "name"]),
            url: self.text(&["url"]),
            advert_url: self.text(&["adverturl"]),
            date: self.date(&["date", "start", "released"]),
            description: self.text(&["description"]),
            territories: self.territories(),
        }
    }

    fn hardware(&self) -> HardwareRecord {
        HardwareRecord {
            name: self.text(&["name"]),
            developer: self.text(&["developer"]),
            identifier: self.text(&["identifier"]),
            url: self.text(&["url"]),
            advert_url: self.text(&["adverturl"]),
            description: self.text(&["description"]),
            image: self.attribute_or_text(&["image"], "url"),
            pricing: self.pricing(),
            relocatable_modules: self.relocatable_modules(),
        }
    }

    fn publication(&self) -> PublicationRecord {
        let mut authors = self.list(&["authors"]);
        if authors.is_empty() {
            authors.extend(self.text(&["author"]));
        }
        PublicationRecord {
            title: self.text(&["title", "name"]),
            publisher: self.text(&["publisher"]),
            authors,
            isbn: self.text(&["isbn"]),
            issn: self.text(&["issn"]),
            url: self.text(&["url"]),
            advert_url: self.text(&["adverturl"]),
            description: self.text(&["description"]),
            image: self.attribute_or_text(&["image"], "url"),
            published: self.date(&["published", "released", "date"]),
            pricing: self.pricing(),
            territories: self.territories(),
        }
    }

    fn component(&self) -> ComponentRecord {
        ComponentRecord {
            name: self.text(&["name"]),
            version: self.text(&["version"]),
            url: self.text(&["url"]),
            description: self.text(&["description"]),
            developer: self.text(&["developer"]),
            addressing_mode: self
                .text(&["addressingmode"])
                .and_then(|m| AddressingMode::parse(&m)),
            syntax: self.text(&["syntax"]),
        }
    }

    fn application(&self) -> ApplicationRecord {
        let author = self.text(&["author"]).or_else(|| {
            let authors = self.list(&["authors"]);
            (!authors.is_empty()).then(|| authors.join(", "))
        });

        let mut categories: std::collections::BTreeSet<String> =
            self.list(&["categories"]).into_iter().collect();
        categories.extend(self.text(&["category"]));

        let arm_architectures = self
            .child(&["armarchitectures"])
            .map(|list| {
                list.children()
                    .filter(Node::is_element)
                    .filter_map(|n| {
                        let tag = normalise_tag(n.tag_name().name());
                        match tag.strip_prefix("arm") {
                            Some(version) if version.starts_with('v') => {
                                Some(format!("ARM{}", version))
                            }
                            _ => node_text(n),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let module_dependencies = self
            .child(&["moduledependencies"])
            .map(|list| {
                list.children()
                    .filter(Node::is_element)
                    .filter_map(|n| {
                        let dependency = Fields { node: n };
                        Some(ModuleDependency {
                            name: dependency.text(&["name"])?,
                            version: dependency.text(&["version"]),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let utilities = self
            .child(&["utilities"])
            .map(|list| {
                list.children()
                    .filter(Node::is_element)
                    .filter_map(|n| {
                        let utility = Fields { node: n };
                        Some(Utility {
                            name: utility.text(&["name"])?,
                            version: utility.text(&["version"]),
                            syntax: utility.text(&["syntax"]),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut app = ApplicationRecord {
            name: self.text(&["name"]),
            directory: self.text(&["directory"]),
            version: self.text(&["version"]),
            date: self.date(&["released", "date"]),
            author,
            license: self.text(&["license", "licence"]),
            purpose: self.text(&["purpose"]),
            copyright: self.text(&["copyright"]),
            description: self.text(&["description"]),
            developer: self.text(&["developer"]),
            maintainer: self.text(&["maintainer"]),
            url: self.text(&["url"]),
            image: self.attribute_or_text(&["image"], "url"),
            categories,
            programming_languages: self
                .list(&["programminglanguages"])
                .into_iter()
                .collect(),
            relocatable_modules: self.relocatable_modules(),
            module_dependencies,
            filetypes_run: self.list(&["filetypesrun"]),
            filetypes_set: self.list(&["filetypesset"]),
            system_variables: self.list(&["systemvariables"]),
            territories: self.territories().into_iter().collect(),
            fonts: self.list(&["fonts"]),
            utilities,
            arm_architectures,
            key_stages: self.list(&["keystages"]),
            pricing: self.pricing(),
            ..ApplicationRecord::default()
        };
        app.dedup();
        app
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<riscos>
  <dealers>
    <dealer>
      <name>CJE Micro's</name>
      <url>http://www.cjemicros.co.uk/</url>
      <telephone>01273 000000</telephone>
      <description territory="UK">Dealer of RISC OS hardware</description>
    </dealer>
  </dealers>
  <software>
    <apps>
      <app>
        <name>Zap</name>
        <directory>!Zap</directory>
        <version>1.47</version>
        <released day="4" month="1" year="2001"/>
        <author>Zap Developers</author>
        <licence>GPL</licence>
        <price currency="GBP">0.00</price>
        <programming_languages>
          <programming_language>C</programming_language>
        </programming_languages>
        <SystemVariables><systemvariable>Zap$Dir</systemvariable></SystemVariables>
        <territories><territory>English</territory></territories>
        <url>http://zap.tartarus.org/</url>
        <utilities><utility><name>ZapCmd</name></utility></utilities>
      </app>
    </apps>
    <modules>
      <module>
        <name>SharedCLibrary</name>
        <version>5.17</version>
        <addressingMode>32-bit</addressingMode>
      </module>
    </modules>
  </software>
  <hardware>
    <podules><podule><name>Simtec IDE</name><identifier>0x00C7</identifier></podule></podules>
  </hardware>
  <user_groups>
    <usergroup><name>Wakefield RISC OS Computer Club</name></usergroup>
  </user_groups>
  <videos><video><title>Show</title><url>http://v.example.org/1</url></video></videos>
  <sponsors><sponsor/></sponsors>
</riscos>"#;

    #[test]
    fn test_parse_sections() {
        let report = parse_manifest(MANIFEST).unwrap();
        let kinds: Vec<&str> = report.items.iter().map(|r| r.kind_name()).collect();
        assert_eq!(kinds, vec!["dealer", "app", "module", "podule", "user group", "video"]);
        assert_eq!(report.warnings, vec!["unknown manifest element <sponsors>"]);
    }

    #[test]
    fn test_app_fields() {
        let report = parse_manifest(MANIFEST).unwrap();
        let ManifestRecord::App(app) = &report.items[1] else {
            panic!("expected an app");
        };
        assert_eq!(app.directory.as_deref(), Some("!Zap"));
        assert_eq!(app.version.as_deref(), Some("1.47"));
        assert_eq!(app.date, Some(978_566_400));
        assert_eq!(app.license.as_deref(), Some("GPL"));
        assert_eq!(app.pricing[0].currency.as_deref(), Some("GBP"));
        assert!(app.programming_languages.contains("C"));
        assert_eq!(app.system_variables, vec!["Zap$Dir"]);
        assert_eq!(app.utilities[0].name, "ZapCmd");
        assert_eq!(report.items[1].url(), Some("http://zap.tartarus.org/"));
    }

    #[test]
    fn test_listing_territory_attribute() {
        let report = parse_manifest(MANIFEST).unwrap();
        let ManifestRecord::Dealer(dealer) = &report.items[0] else {
            panic!("expected a dealer");
        };
        assert_eq!(dealer.name.as_deref(), Some("CJE Micro's"));
        assert_eq!(dealer.territories, vec!["UK"]);
    }

    #[test]
    fn test_module_addressing_mode() {
        let report = parse_manifest(MANIFEST).unwrap();
        let ManifestRecord::Module(module) = &report.items[2] else {
            panic!("expected a module");
        };
        assert_eq!(module.addressing_mode, Some(AddressingMode::Bit32));
    }

    #[test]
    fn test_flattened_sections_and_case() {
        let xml = "<riscos><Apps><App><Name>Edit</Name></App></Apps>\
                   <Forums><Forum><Name>Stardot</Name></Forum></Forums></riscos>";
        let report = parse_manifest(xml).unwrap();
        assert_eq!(report.items.len(), 2);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_empty_leaves_are_skipped() {
        let report = parse_manifest("<riscos><apps><app/></apps></riscos>").unwrap();
        assert!(report.items.is_empty());
    }

    #[test]
    fn test_malformed_manifest() {
        let result = parse_manifest("<riscos><apps></riscos>");
        assert!(matches!(result, Err(ExtractionError::MalformedManifest(_))));
    }
}
