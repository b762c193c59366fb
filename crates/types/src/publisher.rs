//! Publisher records, attention categories and visit snapshots.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Calendar month of a reporting period. `Any` matches every month in a
/// storage filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Month {
    Any,
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    /// Wire value: `ANY = -1`, `JANUARY..DECEMBER = 1..12`.
    pub fn value(self) -> i32 {
        match self {
            Month::Any => -1,
            Month::January => 1,
            Month::February => 2,
            Month::March => 3,
            Month::April => 4,
            Month::May => 5,
            Month::June => 6,
            Month::July => 7,
            Month::August => 8,
            Month::September => 9,
            Month::October => 10,
            Month::November => 11,
            Month::December => 12,
        }
    }

    pub fn from_value(value: i32) -> Option<Self> {
        Some(match value {
            -1 => Month::Any,
            1 => Month::January,
            2 => Month::February,
            3 => Month::March,
            4 => Month::April,
            5 => Month::May,
            6 => Month::June,
            7 => Month::July,
            8 => Month::August,
            9 => Month::September,
            10 => Month::October,
            11 => Month::November,
            12 => Month::December,
            _ => return None,
        })
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.value())
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i32::deserialize(deserializer)?;
        Month::from_value(value)
            .ok_or_else(|| D::Error::custom(format!("invalid month value {value}")))
    }
}

/// Why a contribution was recorded. The wire values form a bitmask so a
/// storage filter can match several categories at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    AutoContribute,
    Tipping,
    DirectDonation,
    RecurringDonation,
}

/// Bitmask matching every category.
pub const ALL_CATEGORIES: u32 = (1 << 5) - 1;

impl Category {
    pub fn bit(self) -> u32 {
        match self {
            Category::AutoContribute => 1 << 1,
            Category::Tipping => 1 << 2,
            Category::DirectDonation => 1 << 3,
            Category::RecurringDonation => 1 << 4,
        }
    }

    pub fn from_bit(bit: u32) -> Option<Self> {
        Some(match bit {
            b if b == 1 << 1 => Category::AutoContribute,
            b if b == 1 << 2 => Category::Tipping,
            b if b == 1 << 3 => Category::DirectDonation,
            b if b == 1 << 4 => Category::RecurringDonation,
            _ => return None,
        })
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bit())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bit = u32::deserialize(deserializer)?;
        Category::from_bit(bit)
            .ok_or_else(|| D::Error::custom(format!("invalid category bit {bit}")))
    }
}

/// One recorded payment towards a publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionInfo {
    /// Filled only when listing recurring donations.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub publisher: String,
    pub value: f64,
    pub date: u64,
}

/// Accumulated attention and contributions for one publisher in one
/// (month, year) period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherInfo {
    pub id: String,
    pub month: Month,
    pub year: i32,
    /// Milliseconds of attention accumulated this period.
    pub duration: u64,
    pub visits: u32,
    /// Sum of per-visit concave scores; never decreases within a period.
    pub score: f64,
    /// Integer share assigned by the synopsis normalizer, in [0, 100].
    pub percent: u32,
    pub weight: f64,
    pub pinned: bool,
    pub category: Category,
    pub favicon_url: String,
    /// Registry snapshot taken at the last update.
    pub verified: bool,
    /// Append-only payment history.
    pub contributions: Vec<ContributionInfo>,
}

impl PublisherInfo {
    pub fn new(id: impl Into<String>, month: Month, year: i32) -> Self {
        Self {
            id: id.into(),
            month,
            year,
            duration: 0,
            visits: 0,
            score: 0.0,
            percent: 0,
            weight: 0.0,
            pinned: false,
            category: Category::AutoContribute,
            favicon_url: String::new(),
            verified: false,
            contributions: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && self.year > 0
    }
}

/// Storage filter for publisher-info reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherFilter {
    pub id: String,
    pub category: Category,
    pub month: Month,
    pub year: i32,
    /// (column, ascending) pairs; unused on single-record reads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<(String, bool)>,
}

impl PublisherFilter {
    pub fn for_record(id: impl Into<String>, category: Category, month: Month, year: i32) -> Self {
        Self {
            id: id.into(),
            category,
            month,
            year,
            order_by: Vec::new(),
        }
    }
}

/// What the browser knows about a page when a tab event fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub tab_id: u32,
    pub domain: String,
    /// Publisher key for the page; an eTLD+1, or a media-prefixed id.
    pub tld: String,
    pub path: String,
    pub favicon_url: String,
    pub local_month: Month,
    pub local_year: i32,
}

/// A direct payment reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentData {
    pub publisher_id: String,
    pub value: f64,
    pub timestamp: u64,
    pub category: Category,
    pub local_month: Month,
    pub local_year: i32,
}
