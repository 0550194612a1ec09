//! Resolution clause tree.
//!
//! A [`Resolution`] holds an ordered list of operative clauses, each with
//! lettered sub-clauses, each with roman-numbered sub-sub-clauses. Amendment
//! clause paths address nodes in this tree by their written tokens (`4`,
//! `a`, `ii`); the helpers here convert those tokens to numeric indices.

use serde::{Deserialize, Serialize};

use crate::ClausePath;

/// The parent document amendments target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub topic: String,
    pub main_submitter: String,
    #[serde(default)]
    pub clauses: Vec<Clause>,
}

/// Operative clause, addressed by its number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub index: u32,
    pub text: String,
    #[serde(default)]
    pub subclauses: Vec<Subclause>,
}

/// Sub-clause, addressed by letter (`a` = 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subclause {
    pub index: u32,
    pub text: String,
    #[serde(default)]
    pub sub_subclauses: Vec<SubSubclause>,
}

/// Sub-sub-clause, addressed by roman numeral (`ii` = 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSubclause {
    pub index: u32,
    pub text: String,
}

/// Numeric address of an existing clause, sub-clause or sub-sub-clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub clause: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_clause: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_sub_clause: Option<u32>,
}

impl NodeAddress {
    pub fn clause(index: u32) -> Self {
        Self {
            clause: index,
            sub_clause: None,
            sub_sub_clause: None,
        }
    }

    /// Renders the address back into written tokens (`4.a.ii`).
    pub fn to_clause_path(&self) -> ClausePath {
        ClausePath {
            clause: self.clause.to_string(),
            sub_clause: self.sub_clause.and_then(to_letter),
            sub_sub_clause: self.sub_sub_clause.and_then(to_roman),
        }
    }
}

impl Resolution {
    pub fn new(topic: impl Into<String>, main_submitter: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            main_submitter: main_submitter.into(),
            clauses: Vec::new(),
        }
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn find_clause(&self, index: u32) -> Option<&Clause> {
        self.clauses.iter().find(|c| c.index == index)
    }

    /// Resolves a written clause path to the node it names.
    ///
    /// Returns `None` when any token cannot be converted or the node does
    /// not exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use amendment_core::*;
    ///
    /// let resolution = Resolution::new("On Climate Finance", "France").with_clause(
    ///     Clause::new(4, "Encourages").with_subclause(
    ///         Subclause::new(1, "green bonds").with_sub_subclause(SubSubclause::new(2, "audits")),
    ///     ),
    /// );
    /// let node = resolution.locate(&ClausePath::parse_dotted("4.a.ii")).unwrap();
    /// assert_eq!((node.clause, node.sub_clause, node.sub_sub_clause), (4, Some(1), Some(2)));
    /// assert!(resolution.locate(&ClausePath::parse_dotted("4.b")).is_none());
    /// ```
    pub fn locate(&self, path: &ClausePath) -> Option<NodeAddress> {
        let clause_index = clause_number(&path.clause)?;
        let clause = self.find_clause(clause_index)?;
        let mut address = NodeAddress::clause(clause_index);

        let Some(sub_token) = path.sub_clause.as_deref() else {
            return Some(address);
        };
        let sub_index = letter_index(sub_token)?;
        let subclause = clause.subclauses.iter().find(|s| s.index == sub_index)?;
        address.sub_clause = Some(sub_index);

        let Some(sub_sub_token) = path.sub_sub_clause.as_deref() else {
            return Some(address);
        };
        let sub_sub_index = roman_index(sub_sub_token)?;
        subclause
            .sub_subclauses
            .iter()
            .find(|s| s.index == sub_sub_index)?;
        address.sub_sub_clause = Some(sub_sub_index);
        Some(address)
    }
}

impl Clause {
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            subclauses: Vec::new(),
        }
    }

    pub fn with_subclause(mut self, subclause: Subclause) -> Self {
        self.subclauses.push(subclause);
        self
    }
}

impl Subclause {
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            sub_subclauses: Vec::new(),
        }
    }

    pub fn with_sub_subclause(mut self, sub_subclause: SubSubclause) -> Self {
        self.sub_subclauses.push(sub_subclause);
        self
    }
}

impl SubSubclause {
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

fn strip_brackets(token: &str) -> &str {
    token
        .trim()
        .trim_start_matches('(')
        .trim_end_matches([')', '.'])
        .trim()
}

/// Parses a clause number token (`4`, `(4)`).
pub fn clause_number(token: &str) -> Option<u32> {
    strip_brackets(token).parse().ok().filter(|n| *n > 0)
}

/// Converts a sub-clause letter to its 1-based index (`a` = 1, `(c)` = 3).
pub fn letter_index(token: &str) -> Option<u32> {
    let token = strip_brackets(token);
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii_alphabetic() => {
            Some(u32::from(ch.to_ascii_lowercase() as u8 - b'a') + 1)
        }
        _ => None,
    }
}

/// Converts a 1-based index to its sub-clause letter (1 = `a`).
pub fn to_letter(index: u32) -> Option<String> {
    (1..=26)
        .contains(&index)
        .then(|| char::from(b'a' + (index - 1) as u8).to_string())
}

const ROMAN_DIGITS: [(u32, &str); 13] = [
    (1000, "m"),
    (900, "cm"),
    (500, "d"),
    (400, "cd"),
    (100, "c"),
    (90, "xc"),
    (50, "l"),
    (40, "xl"),
    (10, "x"),
    (9, "ix"),
    (5, "v"),
    (4, "iv"),
    (1, "i"),
];

/// Converts a 1-based index to a lowercase roman numeral.
pub fn to_roman(index: u32) -> Option<String> {
    if index == 0 || index > 3999 {
        return None;
    }
    let mut remaining = index;
    let mut out = String::new();
    for (value, digits) in ROMAN_DIGITS {
        while remaining >= value {
            out.push_str(digits);
            remaining -= value;
        }
    }
    Some(out)
}

/// Parses a roman numeral (case-insensitive, brackets allowed).
///
/// Only canonical numerals are accepted: `iiii` and `ic` are rejected.
pub fn roman_index(token: &str) -> Option<u32> {
    let token = strip_brackets(token).to_ascii_lowercase();
    if token.is_empty() {
        return None;
    }

    let mut total = 0u32;
    let mut previous = 0u32;
    for ch in token.chars().rev() {
        let value = match ch {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            'l' => 50,
            'c' => 100,
            'd' => 500,
            'm' => 1000,
            _ => return None,
        };
        if value < previous {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            previous = value;
        }
    }

    (to_roman(total).as_deref() == Some(token.as_str())).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Resolution {
        Resolution::new("On Ocean Plastics", "Norway")
            .with_clause(Clause::new(1, "Urges"))
            .with_clause(
                Clause::new(2, "Calls upon").with_subclause(
                    Subclause::new(3, "coastal states")
                        .with_sub_subclause(SubSubclause::new(4, "fisheries")),
                ),
            )
    }

    #[test]
    fn test_roman_roundtrip_for_common_indices() {
        for (n, roman) in [(1, "i"), (4, "iv"), (9, "ix"), (14, "xiv"), (40, "xl")] {
            assert_eq!(to_roman(n).as_deref(), Some(roman));
            assert_eq!(roman_index(roman), Some(n));
        }
        assert_eq!(roman_index("IV"), Some(4));
        assert_eq!(roman_index("(iii)"), Some(3));
    }

    #[test]
    fn test_roman_rejects_non_canonical() {
        assert_eq!(roman_index("iiii"), None);
        assert_eq!(roman_index("ic"), None);
        assert_eq!(roman_index("abc"), None);
        assert_eq!(roman_index(""), None);
    }

    #[test]
    fn test_letter_index() {
        assert_eq!(letter_index("a"), Some(1));
        assert_eq!(letter_index("C"), Some(3));
        assert_eq!(letter_index("(b)"), Some(2));
        assert_eq!(letter_index("ab"), None);
        assert_eq!(to_letter(26).as_deref(), Some("z"));
        assert_eq!(to_letter(27), None);
    }

    #[test]
    fn test_locate_walks_all_levels() {
        let resolution = sample();
        let node = resolution
            .locate(&ClausePath::parse_dotted("2.c.iv"))
            .unwrap();
        assert_eq!(node.to_clause_path().to_string(), "2.c.iv");

        assert_eq!(
            resolution.locate(&ClausePath::new("1")),
            Some(NodeAddress::clause(1))
        );
        assert_eq!(resolution.locate(&ClausePath::parse_dotted("2.c.v")), None);
        assert_eq!(resolution.locate(&ClausePath::new("9")), None);
        assert_eq!(resolution.locate(&ClausePath::new("preamble")), None);
    }

    #[test]
    fn test_resolution_json_defaults_clauses() {
        let resolution: Resolution =
            serde_json::from_str(r#"{"topic": "On Water", "main_submitter": "Chile"}"#).unwrap();
        assert!(resolution.clauses.is_empty());
    }
}
