/// Lifecycle store definitions
///
/// Every URL the spider knows about lives in exactly one of these stores.
use std::fmt;

/// One of the four logical collections a URL record can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Awaiting fetch (the frontier)
    Pending,

    /// Fetched, classified and retained
    Catalog,

    /// Permanently excluded
    Rejected,

    /// Held back while its domain is suspended
    Reserved,
}

impl StoreKind {
    /// Returns true if records in this store are never fetched again without intervention
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Name of the backing table
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Catalog => "catalog",
            Self::Rejected => "rejected",
            Self::Reserved => "reserved",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "catalog" => Some(Self::Catalog),
            "rejected" => Some(Self::Rejected),
            "reserved" => Some(Self::Reserved),
            _ => None,
        }
    }

    /// All stores, in lookup order
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::Catalog, Self::Rejected, Self::Reserved]
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_name())
    }
}
