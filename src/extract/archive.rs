//! ZIP archive scanning
//!
//! Finds the RISC OS application directories (`!Name/`) in an archive and builds
//! one [`ApplicationRecord`] per directory from the members inside it. Members
//! are recognised by their RISC OS filetype (see [`crate::extract::filetype`])
//! and by well-known names such as `!Help`, `!Run` and `Messages`.
//!
//! RISC OS text is Latin-1, so member contents are decoded byte-for-char before
//! any pattern matching.

use crate::catalog::{
    AddressingMode, ApplicationRecord, ModuleDependency, PackageDependency, PackageInfo,
    RelocatableModule, Utility,
};
use crate::extract::filetype::{filetype_of, strip_filetype_suffix};
use crate::extract::{ExtractionError, ExtractionReport, ExtractionResult};
use chrono::NaiveDate;
use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::LazyLock;
use zip::ZipArchive;

static APP_DIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:!Boot/Resources/)?(?:Apps/(\w+)/)?(![\w]+)/").expect("valid app dir regex")
});
static RELEASE_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.\d+)\s\(\d\d\s\w\w\w\s\d\d\d\d\)").expect("valid release stamp regex")
});
static UTILITY_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Syntax:\s*([^\x00\r\n]+?)\s*\x00").expect("valid utility syntax regex")
});
static TEMPLATE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)About this program\s([\w ]+)\s").expect("valid template name regex")
});
static TEMPLATE_COPYRIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\r(Copyright \x{A9} [\w\s]+)\r").expect("valid template copyright regex")
});
static TEMPLATE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r(\d+\.\d+\s+\(\d\d-\w\w\w-\d\d\d?\d?\))\r").expect("valid template version regex")
});
static VERSION_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+\.\d+)\s+\((\d{2})[\- ](Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[\- ]((?:\d{2})?\d{2})\)",
    )
    .expect("valid version date regex")
});
static BARE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+\.\d+)").expect("valid bare version regex"));
static MESSAGES_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:_TaskName|AppName):(.+)").expect("valid messages name regex")
});
static MESSAGES_PURPOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:_Purpose|AppPurpose):(.+)").expect("valid messages purpose regex")
});
static MESSAGES_AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:_Author|AppAuthor):(.+)").expect("valid messages author regex")
});
static MESSAGES_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:_Version|AppVersion):(.+)").expect("valid messages version regex")
});
static HELP_LICENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)This program is (Public Domain|Freeware|Careware)")
        .expect("valid help licence regex")
});
static MIN_OS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)RMEnsure\s+UtilityModule\s+(\d+\.\d+)").expect("valid minimum os regex")
});
static RUN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Set\s+Alias\$@RunType_(\w{3})\b").expect("valid run type regex")
});
static FILE_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Set\s+File\$Type_(\w{3})\s+(\w+)").expect("valid file type regex")
});
static SYSTEM_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Set\s+([A-Za-z0-9]{3,}\$(?:Dir|Path))\b").expect("valid system variable regex")
});
static RM_ENSURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)RMEnsure\s+(\w+)\s+(\d+\.\d+)").expect("valid rmensure regex")
});
static OBEY_COPYRIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\|\s*(?:\x{A9}\s*)?Copyright\s+(?:\x{A9}\s*)?([^\r\n]+)")
        .expect("valid obey copyright regex")
});
static BUILD_DEPENDENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^ ]+) \((.+)\)$").expect("valid build dependency regex")
});

/// Categories recognised in `Apps/<Category>/` paths
const CATEGORIES: &[&str] = &[
    "Administration",
    "Archive",
    "Audio",
    "Chat",
    "Communication",
    "Database",
    "Demo",
    "Desktop",
    "Development",
    "Device",
    "Disc",
    "Document",
    "File",
    "Education",
    "Emulation",
    "Font",
    "Games",
    "Graphics",
    "Library",
    "Mail",
    "Mathematics",
    "Miscellaneous",
    "Network",
    "Presentation",
    "Printing",
    "Spreadsheet",
    "System",
    "Text",
    "Video",
    "Web",
];

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Byte holding the module flags word in a relocatable module header
const MODULE_FLAGS_OFFSET: usize = 0x30;

/// One archive member, as listed in the central directory
#[derive(Debug, Clone)]
struct Member {
    index: usize,
    /// Name with any `,xxx` filetype suffix removed
    path: String,
    filetype: Option<String>,
    is_dir: bool,
}

/// An application directory and every place it appears in the archive
#[derive(Debug)]
struct AppDirectory {
    name: String,
    /// Path prefixes ending in `!Name/`
    prefixes: Vec<String>,
    categories: Vec<String>,
}

struct ArchiveReader<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
    warnings: Vec<String>,
}

impl ArchiveReader<'_> {
    /// Reads a member as Latin-1 text; failures become warnings
    fn read(&mut self, member: &Member) -> Option<String> {
        let result = self.zip.by_index(member.index).map_err(|e| e.to_string()).and_then(|mut file| {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)
                .map(|_| contents)
                .map_err(|e| e.to_string())
        });
        match result {
            Ok(bytes) => Some(latin1(&bytes)),
            Err(e) => {
                self.warnings.push(format!("{}: {}", member.path, e));
                None
            }
        }
    }
}

/// Extracts one application record per application directory in a ZIP archive
///
/// An archive with no application directories yields an empty report. Members
/// that cannot be read are listed in the report's warnings.
///
/// # Errors
///
/// Returns [`ExtractionError::MalformedArchive`] if `bytes` is not a readable
/// ZIP archive.
pub fn extract_applications(bytes: &[u8]) -> ExtractionResult<ExtractionReport<ApplicationRecord>> {
    let zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::MalformedArchive(e.to_string()))?;
    let mut reader = ArchiveReader {
        zip,
        warnings: Vec::new(),
    };

    let members = list_members(&mut reader);
    let directories = find_app_directories(&members);
    let package = members
        .iter()
        .find(|m| m.path.eq_ignore_ascii_case("riscpkg/control"))
        .and_then(|m| reader.read(m))
        .and_then(|control| parse_package_control(&control));

    let mut applications = Vec::with_capacity(directories.len());
    for directory in &directories {
        let mut app = scan_directory(&mut reader, &members, directory);
        if let Some(package) = &package {
            if app.description.is_none() {
                app.description = package.description.clone();
            }
            if app.maintainer.is_none() {
                app.maintainer = package.maintainer.clone();
            }
            app.package = Some(package.clone());
        }
        applications.push(app);
    }

    Ok(ExtractionReport::new(applications, reader.warnings))
}

fn list_members(reader: &mut ArchiveReader) -> Vec<Member> {
    let mut members = Vec::with_capacity(reader.zip.len());
    for index in 0..reader.zip.len() {
        match reader.zip.by_index_raw(index) {
            Ok(file) => {
                let raw_name = file.name().replace('\\', "/");
                members.push(Member {
                    index,
                    path: strip_filetype_suffix(&raw_name).to_string(),
                    filetype: filetype_of(&raw_name, file.extra_data()),
                    is_dir: file.is_dir(),
                });
            }
            Err(e) => reader.warnings.push(format!("member {}: {}", index, e)),
        }
    }
    members
}

fn find_app_directories(members: &[Member]) -> Vec<AppDirectory> {
    let mut directories: Vec<AppDirectory> = Vec::new();

    for member in members {
        let path = if member.is_dir && !member.path.ends_with('/') {
            format!("{}/", member.path)
        } else {
            member.path.clone()
        };
        let Some(captures) = APP_DIR.captures(&path) else {
            continue;
        };
        let (Some(prefix), Some(name)) = (captures.get(0), captures.get(2)) else {
            continue;
        };
        let category = captures.get(1).and_then(|c| {
            CATEGORIES
                .iter()
                .find(|known| known.eq_ignore_ascii_case(c.as_str()))
                .map(|known| known.to_string())
        });

        let position = directories
            .iter()
            .position(|d| d.name.eq_ignore_ascii_case(name.as_str()));
        let index = match position {
            Some(index) => index,
            None => {
                directories.push(AppDirectory {
                    name: name.as_str().to_string(),
                    prefixes: Vec::new(),
                    categories: Vec::new(),
                });
                directories.len() - 1
            }
        };
        let directory = &mut directories[index];
        if !directory
            .prefixes
            .iter()
            .any(|p| p.eq_ignore_ascii_case(prefix.as_str()))
        {
            directory.prefixes.push(prefix.as_str().to_string());
        }
        if let Some(category) = category {
            if !directory.categories.contains(&category) {
                directory.categories.push(category);
            }
        }
    }

    directories
}

/// Path of `member` relative to one of the directory's prefixes
fn relative_path<'m>(member: &'m Member, directory: &AppDirectory) -> Option<&'m str> {
    directory.prefixes.iter().find_map(|prefix| {
        let head = member.path.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix)
            .then(|| &member.path[prefix.len()..])
    })
}

fn scan_directory(
    reader: &mut ArchiveReader,
    members: &[Member],
    directory: &AppDirectory,
) -> ApplicationRecord {
    let mut app = ApplicationRecord::for_directory(&directory.name);
    app.categories.extend(directory.categories.iter().cloned());

    for member in members.iter().filter(|m| !m.is_dir) {
        let Some(relative) = relative_path(member, directory) else {
            continue;
        };
        if relative.is_empty() {
            continue;
        }
        let lower = relative.to_ascii_lowercase();
        let leaf = relative.rsplit('/').next().unwrap_or(relative);

        if let Some(filetype) = member.filetype.as_deref() {
            scan_typed_member(reader, &mut app, member, filetype, relative, leaf);
        }

        if lower.starts_with("c/")
            || lower.starts_with("h/")
            || lower.contains("/c/")
            || lower.contains("/h/")
        {
            app.programming_languages.insert("C".to_string());
        } else if lower == "!help" {
            if let Some(text) = reader.read(member) {
                apply_help(&mut app, &text);
            }
        } else if matches!(
            lower.as_str(),
            "messages" | "resources/1/messages" | "resources/uk/messages" | "resources/en/messages"
        ) {
            if let Some(text) = reader.read(member) {
                apply_messages(&mut app, &text);
            }
        } else if lower == "!boot" || lower == "!run" {
            if let Some(text) = reader.read(member) {
                apply_obey(&mut app, &text);
            }
        }
    }

    if app.arm_architectures.is_empty() {
        let architectures: Vec<&str> = app
            .minimum_os_versions
            .iter()
            .filter_map(|version| arm_architecture(version))
            .collect();
        app.arm_architectures
            .extend(architectures.into_iter().map(str::to_string));
    }
    if app.name.as_deref() == Some("ProgInfo") {
        app.name = None;
    }
    app.dedup();
    app
}

fn scan_typed_member(
    reader: &mut ArchiveReader,
    app: &mut ApplicationRecord,
    member: &Member,
    filetype: &str,
    relative: &str,
    leaf: &str,
) {
    let is_run_image = leaf.eq_ignore_ascii_case("!RunImage");

    match filetype {
        "102" => insert(&mut app.programming_languages, "Perl"),
        "18A" => insert(&mut app.programming_languages, "PHP"),
        "AE4" => insert(&mut app.programming_languages, "Java"),
        "AE5" => insert(&mut app.programming_languages, "Python"),
        "AE6" => insert(&mut app.dtp_formats, "Microsoft Word"),
        "BC5" => insert(&mut app.dtp_formats, "Impression"),
        "B27" => insert(&mut app.dtp_formats, "Ovation"),
        "C32" => insert(&mut app.dtp_formats, "RTF"),
        "FAF" => insert(&mut app.dtp_formats, "HTML"),
        "FF5" => insert(&mut app.dtp_formats, "PostScript"),
        "FAE" => app.toolbox_required = true,
        "FEC" => {
            if let Some(text) = reader.read(member) {
                apply_templates(app, &text);
            }
        }
        "FF6" => app.fonts.push(relative.replace('/', ".")),
        "FF8" if is_run_image => insert(&mut app.programming_languages, "Absolute"),
        "FF8" => app.absolutes.push(relative.replace('/', ".")),
        "FFB" if is_run_image => insert(&mut app.programming_languages, "BBC BASIC"),
        "FFA" if !is_run_image => {
            if let Some(contents) = reader.read(member) {
                app.relocatable_modules.push(describe_module(leaf, &contents));
            }
        }
        "FFC" => {
            if let Some(contents) = reader.read(member) {
                app.utilities.push(Utility {
                    name: leaf.to_string(),
                    version: first_group(&RELEASE_STAMP, &contents),
                    syntax: first_group(&UTILITY_SYNTAX, &contents),
                });
            }
        }
        "FFF" => {
            let lower = relative.to_ascii_lowercase();
            if lower == "messages" || lower.ends_with("/messages") {
                if let Some(territory) = messages_territory(&lower) {
                    insert(&mut app.territories, territory);
                }
            } else if let Some(text) = reader.read(member) {
                if text.starts_with("# Modefile written by !MakeModes")
                    || text.starts_with("# Monitor description file")
                {
                    app.monitor_definition_files.push(relative.replace('/', "."));
                } else if text.starts_with("# Printer definition file") {
                    app.printer_definition_files.push(relative.replace('/', "."));
                }
            }
        }
        _ => {}
    }
}

fn insert(set: &mut std::collections::BTreeSet<String>, value: &str) {
    set.insert(value.to_string());
}

fn describe_module(name: &str, contents: &str) -> RelocatableModule {
    // Latin-1 decoding keeps char offsets equal to byte offsets
    let addressing_mode = contents
        .chars()
        .nth(MODULE_FLAGS_OFFSET)
        .map(|flags| {
            if (flags as u32) & 1 == 1 {
                AddressingMode::Bit32
            } else {
                AddressingMode::Bit26
            }
        });
    RelocatableModule {
        name: name.to_string(),
        version: first_group(&RELEASE_STAMP, contents),
        addressing_mode,
    }
}

/// Territory implied by the location of a `Messages` file
fn messages_territory(lower_relative: &str) -> Option<&'static str> {
    let path = format!("/{}", lower_relative);
    if path == "/messages" || path.ends_with("/resources/en/messages") || path.contains("/uk/") {
        Some("English")
    } else if path.ends_with("/resources/nl/messages") || path.contains("/netherland/") {
        Some("Dutch")
    } else if path.ends_with("/resources/de/messages") || path.contains("/germany/") {
        Some("German")
    } else if path.ends_with("/resources/fr/messages") || path.contains("/france/") {
        Some("French")
    } else if path.ends_with("/resources/it/messages") {
        Some("Italian")
    } else {
        None
    }
}

fn apply_templates(app: &mut ApplicationRecord, text: &str) {
    if let Some(name) = first_group(&TEMPLATE_NAME, text) {
        app.name = Some(name);
    }
    if let Some(copyright) = first_group(&TEMPLATE_COPYRIGHT, text) {
        app.copyright = Some(copyright);
    }
    if let Some(stamp) = first_group(&TEMPLATE_VERSION, text) {
        apply_version_date(app, &stamp);
    }
}

fn apply_messages(app: &mut ApplicationRecord, text: &str) {
    if let Some(name) = first_group(&MESSAGES_NAME, text) {
        app.name = Some(name);
    }
    if let Some(purpose) = first_group(&MESSAGES_PURPOSE, text) {
        app.purpose = Some(purpose);
    }
    if let Some(author) = first_group(&MESSAGES_AUTHOR, text) {
        app.author = Some(author);
    }
    if let Some(stamp) = first_group(&MESSAGES_VERSION, text) {
        apply_version_date(app, &stamp);
    }
}

fn apply_help(app: &mut ApplicationRecord, text: &str) {
    let normalised = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("(C)", "\u{A9}")
        .replace("(c)", "\u{A9}")
        .replace("RiscOS", "RISC OS");

    if let Some(licence) = first_group(&HELP_LICENCE, &normalised) {
        app.license = Some(licence);
    }
    if app.copyright.is_none() {
        app.copyright = text.lines().find_map(|line| {
            let start = line.to_ascii_lowercase().find("copyright")?;
            let copyright = line[start..]
                .trim()
                .replace("(C)", "\u{A9}")
                .replace("(c)", "\u{A9}");
            (!copyright.is_empty()).then_some(copyright)
        });
    }
    if !normalised.is_empty() {
        app.help = Some(html_escape(&normalised));
    }
}

fn apply_obey(app: &mut ApplicationRecord, text: &str) {
    if app.copyright.is_none() {
        if let Some(copyright) = first_group(&OBEY_COPYRIGHT, text) {
            app.copyright = Some(format!("Copyright \u{A9} {}", copyright));
        }
    }

    app.minimum_os_versions.extend(
        MIN_OS
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    );
    app.filetypes_run.extend(
        RUN_TYPE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase()),
    );
    app.filetypes_set.extend(FILE_TYPE.captures_iter(text).filter_map(|c| {
        Some(format!("{} {}", c.get(1)?.as_str().to_uppercase(), c.get(2)?.as_str()))
    }));
    app.system_variables.extend(
        SYSTEM_VARIABLE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|variable| !variable.eq_ignore_ascii_case("run$path")),
    );
    app.module_dependencies
        .extend(RM_ENSURE.captures_iter(text).filter_map(|c| {
            let name = c.get(1)?.as_str();
            if name.eq_ignore_ascii_case("UtilityModule") {
                return None;
            }
            Some(ModuleDependency {
                name: name.to_string(),
                version: c.get(2).map(|m| m.as_str().to_string()),
            })
        }));
}

/// Applies a `1.23 (04-Jan-01)` style stamp to the record
fn apply_version_date(app: &mut ApplicationRecord, stamp: &str) {
    match VERSION_DATE.captures(stamp) {
        Some(captures) => {
            if let Some(version) = captures.get(1).map(|m| m.as_str()) {
                if version != "0.00" {
                    app.version = Some(version.to_string());
                }
            }
            if let (Some(day), Some(month), Some(year)) =
                (captures.get(2), captures.get(3), captures.get(4))
            {
                if let Some(date) = release_date(day.as_str(), month.as_str(), year.as_str()) {
                    app.date = Some(date);
                }
            }
        }
        None => {
            if let Some(version) = first_group(&BARE_VERSION, stamp) {
                if version != "0.00" {
                    app.version = Some(version);
                }
            }
        }
    }
}

/// Epoch seconds of a release date; the placeholder `01-Jan-00` yields `None`
fn release_date(day: &str, month: &str, year: &str) -> Option<i64> {
    let day: u32 = day.parse().ok()?;
    let mut year: i32 = year.parse().ok()?;
    if day == 1 && month.eq_ignore_ascii_case("Jan") && (year == 0 || year == 1900) {
        return None;
    }
    if year < 100 {
        year += if year >= 87 { 1900 } else { 2000 };
    }
    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month))?;
    let date = NaiveDate::from_ymd_opt(year, month as u32 + 1, day)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

/// ARM architecture implied by a minimum RISC OS version
fn arm_architecture(os_version: &str) -> Option<&'static str> {
    match os_version {
        "3.70" | "3.71" => Some("ARMv4"),
        "3.50" | "3.60" => Some("ARMv3"),
        "2.00" | "3.00" | "3.0" | "3.10" | "3.11" => Some("ARMv2"),
        _ => None,
    }
}

/// Parses a `RiscPkg/Control` file; `None` without a `Package:` line
fn parse_package_control(text: &str) -> Option<PackageInfo> {
    let mut package = PackageInfo::default();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Package" => package.name = Some(value.to_string()),
            "Version" => package.version = Some(value.to_string()),
            "Priority" => package.priority = Some(value.to_string()),
            "Section" => package.section = Some(value.to_string()),
            "Maintainer" => package.maintainer = Some(value.to_string()),
            "Source" => package.source = Some(value.to_string()),
            "Description" => package.description = Some(value.to_string()),
            "Build-Depends" => {
                package.build_depends = value
                    .split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(|dependency| match BUILD_DEPENDENCY.captures(dependency) {
                        Some(c) => PackageDependency {
                            name: c[1].to_string(),
                            version: Some(c[2].to_string()),
                        },
                        None => PackageDependency {
                            name: dependency.to_string(),
                            version: None,
                        },
                    })
                    .collect();
            }
            _ => {}
        }
    }
    package.name.is_some().then_some(package)
}

fn first_group(pattern: &Regex, text: &str) -> Option<String> {
    let value = pattern.captures(text)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::filetype::arc0_extra_field;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    /// Builds a stored ZIP; entries ending in `/` become directories
    pub(crate) fn build_zip(entries: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, filetype, contents) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
                continue;
            }
            match filetype {
                Some(filetype) => {
                    writer.start_file_with_extra_data(*name, options).unwrap();
                    writer
                        .write_all(&arc0_extra_field(filetype).unwrap())
                        .unwrap();
                    writer.end_extra_data().unwrap();
                }
                None => writer.start_file(*name, options).unwrap(),
            }
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extraction_determinism() {
        let zip = build_zip(&[
            ("!TestApp/", None, b""),
            ("!TestApp/!Help", None, b"Copyright (C) 2001 Testers\n"),
            ("!TestApp/RModule", Some("FFA"), b"RModule\x001.23 (04 Jan 2001)\x00"),
        ]);

        let first = extract_applications(&zip).unwrap();
        let second = extract_applications(&zip).unwrap();
        assert_eq!(first, second);

        assert_eq!(first.items.len(), 1);
        let app = &first.items[0];
        assert_eq!(app.directory.as_deref(), Some("!TestApp"));
        assert_eq!(
            app.relocatable_modules,
            vec![RelocatableModule {
                name: "RModule".to_string(),
                version: Some("1.23".to_string()),
                addressing_mode: None,
            }]
        );
        assert_eq!(app.copyright.as_deref(), Some("Copyright \u{A9} 2001 Testers"));
        assert_eq!(app.help.as_deref(), Some("Copyright \u{A9} 2001 Testers"));
        assert!(first.warnings.is_empty());
    }

    #[test]
    fn test_not_a_zip() {
        let result = extract_applications(b"<html>not an archive</html>");
        assert!(matches!(result, Err(ExtractionError::MalformedArchive(_))));
    }

    #[test]
    fn test_archive_without_applications() {
        let zip = build_zip(&[("ReadMe", None, b"hello")]);
        let report = extract_applications(&zip).unwrap();
        assert!(report.items.is_empty());
    }

    #[test]
    fn test_module_addressing_mode_from_header() {
        let mut module = vec![0u8; 0x40];
        module[MODULE_FLAGS_OFFSET] = 1;
        module.extend_from_slice(b"\tNetMod\t2.05 (12 Mar 2004)\x00");

        let zip = build_zip(&[("!Net/NetMod", Some("FFA"), &module)]);
        let report = extract_applications(&zip).unwrap();
        let module = &report.items[0].relocatable_modules[0];
        assert_eq!(module.addressing_mode, Some(AddressingMode::Bit32));
        assert_eq!(module.version.as_deref(), Some("2.05"));
    }

    #[test]
    fn test_messages_and_obey_files() {
        let messages = b"_TaskName:Zap\n_Purpose:Text editor\n_Author:Dominic Symes\n_Version:1.47 (04-Jan-01)\n";
        let run = b"| \xa9 Copyright Zap Developers\nRMEnsure UtilityModule 3.50 Error Needs RISC OS 3.5\n\
            RMEnsure SharedCLibrary 5.17 RMLoad System:Modules.CLib\n\
            Set Zap$Dir <Obey$Dir>\nSet Alias$@RunType_FFF Run <Zap$Dir>.!Run %%*0\n\
            Set File$Type_FFD Data\n";
        let zip = build_zip(&[
            ("Apps/Development/!Zap/!Run", Some("FEB"), run),
            ("Apps/Development/!Zap/Messages", Some("FFF"), messages),
            ("Apps/Development/!Zap/c/main", Some("FFF"), b"int main(void);"),
            ("Apps/Development/!Zap/Res", Some("FAE"), b""),
            ("Apps/Development/!Zap/!RunImage", Some("FF8"), b""),
            ("Apps/Development/!Zap/Tools/Strip", Some("FF8"), b""),
            ("Apps/Development/!Zap/Fonts/Mono", Some("FF6"), b""),
        ]);
        let report = extract_applications(&zip).unwrap();
        assert_eq!(report.items.len(), 1);
        let app = &report.items[0];

        assert_eq!(app.name.as_deref(), Some("Zap"));
        assert_eq!(app.purpose.as_deref(), Some("Text editor"));
        assert_eq!(app.author.as_deref(), Some("Dominic Symes"));
        assert_eq!(app.version.as_deref(), Some("1.47"));
        assert_eq!(app.date, Some(978_566_400));
        assert!(app.categories.contains("Development"));
        assert!(app.territories.contains("English"));
        assert!(app.programming_languages.contains("C"));
        assert!(app.programming_languages.contains("Absolute"));
        assert!(app.toolbox_required);
        assert_eq!(app.absolutes, vec!["Tools.Strip"]);
        assert_eq!(app.fonts, vec!["Fonts.Mono"]);
        assert_eq!(app.minimum_os_versions, vec!["3.50"]);
        assert!(app.arm_architectures.contains("ARMv3"));
        assert_eq!(app.module_dependencies[0].name, "SharedCLibrary");
        assert_eq!(app.system_variables, vec!["Zap$Dir"]);
        assert_eq!(app.filetypes_run, vec!["FFF"]);
        assert_eq!(app.filetypes_set, vec!["FFD Data"]);
        assert_eq!(app.copyright.as_deref(), Some("Copyright \u{A9} Zap Developers"));
    }

    #[test]
    fn test_package_control_applies_to_apps() {
        let control = b"Package: Zap\nVersion: 1.47-1\nSection: Editors\n\
            Build-Depends: GCC (>= 3.4), Make\nDescription: Programmer's editor\n";
        let zip = build_zip(&[
            ("RiscPkg/Control", Some("FFF"), control),
            ("Apps/Editors/!Zap/!Boot", Some("FEB"), b""),
        ]);
        let report = extract_applications(&zip).unwrap();
        let app = &report.items[0];
        let package = app.package.as_ref().unwrap();

        assert_eq!(package.name.as_deref(), Some("Zap"));
        assert_eq!(package.section.as_deref(), Some("Editors"));
        assert_eq!(package.build_depends.len(), 2);
        assert_eq!(package.build_depends[0].version.as_deref(), Some(">= 3.4"));
        assert_eq!(app.description.as_deref(), Some("Programmer's editor"));
        // Editors is not a recognised category
        assert!(app.categories.is_empty());
    }

    #[test]
    fn test_placeholder_version_and_date_are_ignored() {
        let mut app = ApplicationRecord::default();
        apply_version_date(&mut app, "0.00 (01-Jan-00)");
        assert_eq!(app.version, None);
        assert_eq!(app.date, None);

        apply_version_date(&mut app, "2.10 (15-Mar-92)");
        assert_eq!(app.version.as_deref(), Some("2.10"));
        assert_eq!(app.date, Some(700_617_600));
    }

    #[test]
    fn test_messages_territories() {
        assert_eq!(messages_territory("messages"), Some("English"));
        assert_eq!(messages_territory("resources/de/messages"), Some("German"));
        assert_eq!(messages_territory("resources/france/messages"), Some("French"));
        assert_eq!(messages_territory("resources/xx/messages"), None);
    }

    #[test]
    fn test_utility_members() {
        let utility = b"\x00Syntax: *Strip <file>\x00 1.02 (01 Feb 1999)";
        let zip = build_zip(&[("!Tools/Strip", Some("FFC"), utility)]);
        let report = extract_applications(&zip).unwrap();
        let utility = &report.items[0].utilities[0];
        assert_eq!(utility.name, "Strip");
        assert_eq!(utility.version.as_deref(), Some("1.02"));
        assert_eq!(utility.syntax.as_deref(), Some("*Strip <file>"));
    }

    #[test]
    fn test_name_suffix_filetypes() {
        let zip = build_zip(&[("!Demo/Lib,ffa", None, b"Lib 0.50 (01 Jan 2010)")]);
        let report = extract_applications(&zip).unwrap();
        assert_eq!(report.items[0].relocatable_modules[0].name, "Lib");
    }
}
