//! Placeholder tokenization
//!
//! A single left-to-right scan splits query text into plain text, quoted
//! literals and placeholders (`?` positional, `:name` named). Placeholders
//! inside a quoted literal are never recognized. The scan backs both the
//! positional → named rewrite done when a statement is created and the
//! substitution of rendered values done when it is executed.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};

/// Prefix of the generated named placeholders (`:param1`, `:param2`, ...)
pub const GENERATED_PREFIX: &str = ":param";

/// Query text with positional markers rewritten to named placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedQuery {
    /// Rewritten text
    pub sql: String,
    /// 1-based position → generated placeholder name (with leading `:`)
    pub parameter_map: BTreeMap<usize, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Literal(&'a str),
    Positional,
    Named(&'a str),
}

/// Iterator over the segments of a query string
struct Scanner<'a> {
    sql: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(sql: &'a str) -> Self {
        Self { sql, pos: 0 }
    }

    /// End offset of the literal opened by `quote` at `start`
    fn literal_end(&self, start: usize, quote: u8) -> Result<usize> {
        let bytes = self.sql.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b if b == quote => return Ok(i + 1),
                _ => i += 1,
            }
        }
        Err(Error::syntax(
            format!("unterminated string literal starting at offset {start}"),
            start,
        ))
    }

    /// End offset of the identifier following a `:` at `start`, if any
    fn named_end(&self, start: usize) -> Option<usize> {
        let bytes = self.sql.as_bytes();
        match bytes.get(start + 1) {
            Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
            _ => return None,
        }
        let len = bytes[start + 1..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
            .count();
        Some(start + 1 + len)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Segment<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.sql.as_bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return None;
        }

        match bytes[start] {
            b'?' => {
                self.pos += 1;
                return Some(Ok(Segment::Positional));
            }
            quote @ (b'\'' | b'"') => {
                return Some(self.literal_end(start, quote).map(|end| {
                    self.pos = end;
                    Segment::Literal(&self.sql[start..end])
                }));
            }
            b':' => {
                if let Some(end) = self.named_end(start) {
                    self.pos = end;
                    return Some(Ok(Segment::Named(&self.sql[start..end])));
                }
            }
            _ => {}
        }

        // plain text runs up to the next byte that may open a token
        let end = bytes[start + 1..]
            .iter()
            .position(|b| matches!(b, b'?' | b'\'' | b'"' | b':'))
            .map_or(bytes.len(), |offset| start + 1 + offset);
        self.pos = end;
        Some(Ok(Segment::Text(&self.sql[start..end])))
    }
}

/// Rewrite every positional `?` outside string literals to `:paramN`
///
/// `N` counts placeholders left to right starting at 1. Text without any `?`
/// comes back unchanged with an empty map.
///
/// # Examples
///
/// ```
/// use soql_rdbc::placeholder::convert_positional_to_named;
///
/// let converted = convert_positional_to_named("SELECT Id FROM Contact WHERE Name = ?").unwrap();
/// assert_eq!(converted.sql, "SELECT Id FROM Contact WHERE Name = :param1");
/// assert_eq!(converted.parameter_map[&1], ":param1");
/// ```
pub fn convert_positional_to_named(sql: &str) -> Result<ConvertedQuery> {
    let mut rewritten = String::with_capacity(sql.len() + 8);
    let mut parameter_map = BTreeMap::new();

    for segment in Scanner::new(sql) {
        match segment? {
            Segment::Text(text) | Segment::Literal(text) | Segment::Named(text) => {
                rewritten.push_str(text)
            }
            Segment::Positional => {
                let position = parameter_map.len() + 1;
                let name = format!("{GENERATED_PREFIX}{position}");
                rewritten.push_str(&name);
                parameter_map.insert(position, name);
            }
        }
    }

    Ok(ConvertedQuery {
        sql: rewritten,
        parameter_map,
    })
}

/// Replace every named placeholder that has a rendered value
///
/// Tokens are matched whole, so `:param1` never touches `:param10`; tokens
/// without a value are left in place.
pub fn substitute_named(sql: &str, values: &HashMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(sql.len());

    for segment in Scanner::new(sql) {
        match segment? {
            Segment::Named(token) => match values.get(token) {
                Some(rendered) => out.push_str(rendered),
                None => out.push_str(token),
            },
            Segment::Positional => out.push('?'),
            Segment::Text(text) | Segment::Literal(text) => out.push_str(text),
        }
    }

    Ok(out)
}

/// Named placeholders in order of appearance, duplicates included
pub fn named_placeholders(sql: &str) -> Result<Vec<String>> {
    Scanner::new(sql)
        .filter_map(|segment| match segment {
            Ok(Segment::Named(token)) => Some(Ok(token.to_string())),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_converts_positional_markers_in_order() {
        let converted =
            convert_positional_to_named("SELECT Id FROM Contact WHERE Name = ? AND Surname = ?")
                .unwrap();

        assert_eq!(
            converted.sql,
            "SELECT Id FROM Contact WHERE Name = :param1 AND Surname = :param2"
        );
        assert_eq!(converted.parameter_map.len(), 2);
        assert_eq!(converted.parameter_map[&1], ":param1");
        assert_eq!(converted.parameter_map[&2], ":param2");
    }

    #[test]
    fn test_no_markers_returns_text_unchanged() {
        let sql = "SELECT Id FROM Account WHERE Name = :name";
        let converted = convert_positional_to_named(sql).unwrap();

        assert_eq!(converted.sql, sql);
        assert!(converted.parameter_map.is_empty());
    }

    #[test]
    fn test_marker_inside_literal_is_ignored() {
        let converted =
            convert_positional_to_named("SELECT Id FROM Case WHERE Subject = 'why?' AND Id = ?")
                .unwrap();

        assert_eq!(
            converted.sql,
            "SELECT Id FROM Case WHERE Subject = 'why?' AND Id = :param1"
        );
        assert_eq!(converted.parameter_map.len(), 1);
    }

    #[test]
    fn test_double_quoted_literal_and_escaped_quote() {
        let converted =
            convert_positional_to_named(r#"SELECT Id FROM A WHERE B = "x?" AND C = 'it\'s?' AND D = ?"#)
                .unwrap();

        assert_eq!(
            converted.sql,
            r#"SELECT Id FROM A WHERE B = "x?" AND C = 'it\'s?' AND D = :param1"#
        );
    }

    #[test]
    fn test_unterminated_literal_reports_start_offset() {
        let err = convert_positional_to_named("SELECT Id FROM A WHERE B = 'oops").unwrap_err();

        match err {
            Error::Syntax { position, .. } => assert_eq!(position, 27),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_substitute_matches_whole_tokens() {
        let sql = "SELECT Id FROM A WHERE X = :param1 AND Y = :param10 AND Z = :other";
        let values = HashMap::from([
            (":param1".to_string(), "'a'".to_string()),
            (":param10".to_string(), "10".to_string()),
        ]);

        assert_eq!(
            substitute_named(sql, &values).unwrap(),
            "SELECT Id FROM A WHERE X = 'a' AND Y = 10 AND Z = :other"
        );
    }

    #[test]
    fn test_substitute_leaves_literals_alone() {
        let values = HashMap::from([(":name".to_string(), "'John'".to_string())]);

        assert_eq!(
            substitute_named("SELECT Id FROM A WHERE N = :name AND T = ':name'", &values).unwrap(),
            "SELECT Id FROM A WHERE N = 'John' AND T = ':name'"
        );
    }

    #[test]
    fn test_date_literal_colon_is_not_a_placeholder() {
        let sql = "SELECT Id FROM Opportunity WHERE CloseDate = LAST_N_DAYS:30";
        assert!(named_placeholders(sql).unwrap().is_empty());
    }

    #[test]
    fn test_named_placeholders_in_order() {
        assert_eq!(
            named_placeholders("SELECT Id FROM A WHERE X = :b AND Y = :a AND Z = :b").unwrap(),
            vec![":b", ":a", ":b"]
        );
    }
}
