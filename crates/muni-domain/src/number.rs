//! Dot-delimited hierarchical account numbers (`"410.1.1"`).

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// A chart-of-accounts key whose dotted segments mirror the account tree.
pub struct AccountNumber(String);

impl AccountNumber {
    /// Parses a dotted account number, rejecting empty or malformed segments.
    pub fn parse(raw: &str) -> Result<Self, AccountNumberError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AccountNumberError::Empty);
        }
        for segment in trimmed.split('.') {
            if segment.is_empty() {
                return Err(AccountNumberError::EmptySegment(trimmed.to_string()));
            }
            if !segment.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(AccountNumberError::InvalidSegment {
                    number: trimmed.to_string(),
                    segment: segment.to_string(),
                });
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Number of dotted segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Final segment of the number (`"410.1.1"` → `"1"`).
    pub fn leaf_segment(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Drops the last segment; `None` when the number has a single segment.
    pub fn parent(&self) -> Option<AccountNumber> {
        self.0.rfind('.').map(|idx| Self(self.0[..idx].to_string()))
    }

    /// True when `self` extends `other` by exactly one segment.
    pub fn is_child_of(&self, other: &AccountNumber) -> bool {
        self.parent().as_ref() == Some(other)
    }

    /// Appends one segment, producing a child number.
    pub fn child(&self, segment: &str) -> Result<AccountNumber, AccountNumberError> {
        Self::parse(&format!("{}.{}", self.0, segment))
    }

    /// Proper prefixes of the number, shortest first (`"410.1.1"` →
    /// `["410", "410.1"]`).
    pub fn ancestors(&self) -> Vec<AccountNumber> {
        let mut chain = Vec::new();
        let mut current = self.parent();
        while let Some(number) = current {
            current = number.parent();
            chain.push(number);
        }
        chain.reverse();
        chain
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = AccountNumberError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = AccountNumberError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<AccountNumber> for String {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}

impl PartialOrd for AccountNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccountNumber {
    /// Segment-wise ordering: numeric segments compare numerically, mixed
    /// or textual segments fall back to lexical order. Keeps sibling
    /// display order stable (`"410.2"` before `"410.10"`). Numerically
    /// equal segments with different spellings (`"01"` vs `"1"`) are
    /// tie-broken lexically so ordering stays consistent with equality.
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.segments();
        let mut right = other.segments();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => {
                    let ordering = match (a.parse::<u64>(), b.parse::<u64>()) {
                        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                        _ => a.cmp(b),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Errors that can occur when constructing [`AccountNumber`] values.
pub enum AccountNumberError {
    Empty,
    EmptySegment(String),
    InvalidSegment { number: String, segment: String },
}

impl fmt::Display for AccountNumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountNumberError::Empty => f.write_str("account number must not be empty"),
            AccountNumberError::EmptySegment(number) => {
                write!(f, "account number `{}` has an empty segment", number)
            }
            AccountNumberError::InvalidSegment { number, segment } => {
                write!(
                    f,
                    "account number `{}` has a non-alphanumeric segment `{}`",
                    number, segment
                )
            }
        }
    }
}

impl std::error::Error for AccountNumberError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(raw: &str) -> AccountNumber {
        AccountNumber::parse(raw).expect("valid number")
    }

    #[test]
    fn parse_rejects_malformed_numbers() {
        assert_eq!(AccountNumber::parse(""), Err(AccountNumberError::Empty));
        assert!(matches!(
            AccountNumber::parse("410..1"),
            Err(AccountNumberError::EmptySegment(_))
        ));
        assert!(matches!(
            AccountNumber::parse("410.1-a"),
            Err(AccountNumberError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn parent_and_child_relationships() {
        let leaf = number("410.1.1");
        assert_eq!(leaf.parent(), Some(number("410.1")));
        assert!(leaf.is_child_of(&number("410.1")));
        assert!(!leaf.is_child_of(&number("410")));
        assert_eq!(number("410").parent(), None);
        assert_eq!(leaf.ancestors(), vec![number("410"), number("410.1")]);
    }

    #[test]
    fn ordering_is_numeric_per_segment() {
        let mut numbers = vec![number("410.10"), number("410.2"), number("410.1.5")];
        numbers.sort();
        assert_eq!(
            numbers,
            vec![number("410.1.5"), number("410.2"), number("410.10")]
        );
    }

    #[test]
    fn ordering_agrees_with_equality_for_zero_padded_segments() {
        let padded = number("410.01");
        let plain = number("410.1");
        assert_ne!(padded, plain);
        assert_eq!(padded.cmp(&plain), std::cmp::Ordering::Less);
        assert_eq!(plain.cmp(&padded), std::cmp::Ordering::Greater);
        assert_eq!(padded.cmp(&padded.clone()), std::cmp::Ordering::Equal);
    }

    #[test]
    fn serde_round_trips_as_string() {
        let original = number("410.1");
        let json = serde_json::to_string(&original).expect("serialize");
        assert_eq!(json, "\"410.1\"");
        let back: AccountNumber = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, original);
    }
}
