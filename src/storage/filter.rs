//! Query filters for the document store
//!
//! A [`Filter`] is a conjunction of optional conditions over the record columns.
//! An empty filter matches every record.

use rusqlite::types::Value;

/// Condition on a content tag column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagMatch {
    Present,
    Absent,
    Equals(String),
}

/// Comparison against an epoch column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq(i64),
    Lt(i64),
    Le(i64),
    Gt(i64),
    Ge(i64),
}

impl Cmp {
    fn operator(&self) -> (&'static str, i64) {
        match *self {
            Self::Eq(v) => ("=", v),
            Self::Lt(v) => ("<", v),
            Self::Le(v) => ("<=", v),
            Self::Gt(v) => (">", v),
            Self::Ge(v) => (">=", v),
        }
    }
}

/// Columns that support distinct-value queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Url,
    Domain,
    ParentUrl,
    ZipFile,
    RiscosXml,
    RssFeed,
    Directory,
}

impl Field {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Domain => "domain",
            Self::ParentUrl => "parent_url",
            Self::ZipFile => "zip_file",
            Self::RiscosXml => "riscos_xml",
            Self::RssFeed => "rss_feed",
            Self::Directory => "directory",
        }
    }
}

/// Conjunction of optional record conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub id: Option<i64>,
    pub url: Option<String>,
    pub url_prefix: Option<String>,
    /// Case-insensitive; any one suffix matches
    pub url_suffixes: Vec<String>,
    /// Case-insensitive; any one fragment matches
    pub url_contains: Vec<String>,
    pub domain: Option<String>,
    /// Records whose domain is empty
    pub missing_domain: bool,
    pub parent_url: Option<String>,
    pub last_scanned: Option<Cmp>,
    pub next_scan: Option<Cmp>,
    pub zip_file: Option<TagMatch>,
    pub riscos_xml: Option<TagMatch>,
    pub rss_feed: Option<TagMatch>,
    pub directory: Option<TagMatch>,
    pub application_version: Option<TagMatch>,
    pub superseded: Option<bool>,
    pub seed: Option<bool>,
    pub exclude_id: Option<i64>,
    pub limit: Option<usize>,
}

impl Filter {
    /// Matches every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn by_domain(domain: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            ..Self::default()
        }
    }

    pub fn url_prefix(mut self, prefix: &str) -> Self {
        self.url_prefix = Some(prefix.to_string());
        self
    }

    pub fn url_suffixes(mut self, suffixes: &[&str]) -> Self {
        self.url_suffixes = suffixes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn url_contains(mut self, fragments: &[&str]) -> Self {
        self.url_contains = fragments.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn last_scanned(mut self, cmp: Cmp) -> Self {
        self.last_scanned = Some(cmp);
        self
    }

    pub fn next_scan(mut self, cmp: Cmp) -> Self {
        self.next_scan = Some(cmp);
        self
    }

    pub fn zip_file(mut self, tag: TagMatch) -> Self {
        self.zip_file = Some(tag);
        self
    }

    pub fn riscos_xml(mut self, tag: TagMatch) -> Self {
        self.riscos_xml = Some(tag);
        self
    }

    pub fn rss_feed(mut self, tag: TagMatch) -> Self {
        self.rss_feed = Some(tag);
        self
    }

    pub fn directory(mut self, tag: TagMatch) -> Self {
        self.directory = Some(tag);
        self
    }

    pub fn application_version(mut self, tag: TagMatch) -> Self {
        self.application_version = Some(tag);
        self
    }

    pub fn superseded(mut self, superseded: bool) -> Self {
        self.superseded = Some(superseded);
        self
    }

    pub fn exclude_id(mut self, id: i64) -> Self {
        self.exclude_id = Some(id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Renders the filter as a SQL `WHERE` body plus its bound values
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(id) = self.id {
            clauses.push("id = ?".to_string());
            values.push(Value::Integer(id));
        }
        if let Some(id) = self.exclude_id {
            clauses.push("id <> ?".to_string());
            values.push(Value::Integer(id));
        }
        if let Some(url) = &self.url {
            clauses.push("url = ?".to_string());
            values.push(Value::Text(url.clone()));
        }
        if let Some(prefix) = &self.url_prefix {
            clauses.push("url LIKE ? ESCAPE '\\'".to_string());
            values.push(Value::Text(format!("{}%", like_escape(prefix))));
        }
        push_any_like(&mut clauses, &mut values, &self.url_suffixes, |s| {
            format!("%{}", like_escape(s))
        });
        push_any_like(&mut clauses, &mut values, &self.url_contains, |s| {
            format!("%{}%", like_escape(s))
        });
        if let Some(domain) = &self.domain {
            clauses.push("domain = ?".to_string());
            values.push(Value::Text(domain.clone()));
        }
        if self.missing_domain {
            clauses.push("domain = ''".to_string());
        }
        if let Some(parent) = &self.parent_url {
            clauses.push("parent_url = ?".to_string());
            values.push(Value::Text(parent.clone()));
        }
        for (column, cmp) in [
            ("last_scanned", self.last_scanned),
            ("next_scan", self.next_scan),
        ] {
            if let Some(cmp) = cmp {
                let (op, value) = cmp.operator();
                clauses.push(format!("{} {} ?", column, op));
                values.push(Value::Integer(value));
            }
        }
        for (column, tag) in [
            ("zip_file", &self.zip_file),
            ("riscos_xml", &self.riscos_xml),
            ("rss_feed", &self.rss_feed),
            ("directory", &self.directory),
            ("application_version", &self.application_version),
        ] {
            match tag {
                Some(TagMatch::Present) => clauses.push(format!("{} IS NOT NULL", column)),
                Some(TagMatch::Absent) => clauses.push(format!("{} IS NULL", column)),
                Some(TagMatch::Equals(v)) => {
                    clauses.push(format!("{} = ?", column));
                    values.push(Value::Text(v.clone()));
                }
                None => {}
            }
        }
        if let Some(superseded) = self.superseded {
            clauses.push(if superseded {
                "superseded_by IS NOT NULL".to_string()
            } else {
                "superseded_by IS NULL".to_string()
            });
        }
        if let Some(seed) = self.seed {
            clauses.push("seed = ?".to_string());
            values.push(Value::Integer(i64::from(seed)));
        }

        let sql = if clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            clauses.join(" AND ")
        };
        (sql, values)
    }
}

fn push_any_like(
    clauses: &mut Vec<String>,
    values: &mut Vec<Value>,
    patterns: &[String],
    render: impl Fn(&str) -> String,
) {
    if patterns.is_empty() {
        return;
    }
    let alternatives = patterns
        .iter()
        .map(|p| {
            values.push(Value::Text(render(p)));
            "url LIKE ? ESCAPE '\\'"
        })
        .collect::<Vec<_>>()
        .join(" OR ");
    clauses.push(format!("({})", alternatives));
}

/// Escapes LIKE wildcards so the text matches literally
fn like_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
