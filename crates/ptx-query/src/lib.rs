//! # ptx-query
//!
//! Parser for the ptx query language: a small SQL-like pipeline of
//! filtering, grouping, aggregation, sorting, and limiting over log events,
//! plus the closed `--eval` transform-expression language.
//!
//! This crate turns query strings into a strongly-typed AST, handling:
//!
//! - **Comparisons**: `==`, `!=`, `<`, `<=`, `>`, `>=` against string,
//!   integer, and float literals
//! - **Set membership**: `field in {v1, v2, ...}`
//! - **Presence and pattern tests**: `has(field)`, `field matches "pat"`
//! - **Boolean connectives**: `and`, `or`, `not`, parenthesized groups
//! - **Pipeline clauses**: `group [by] a, b`, `count` / `avg f` / `sum f` /
//!   `min f` / `max f`, `sort [by] f [asc|desc]`, `limit n`
//! - **Transforms**: `field = expr` assignments over a closed operator set
//!   (arithmetic, `if(...)`, and a fixed function catalogue)
//!
//! ## Architecture
//!
//! - **PEG grammar** ([`pest`]) for the whole surface, with correct operator
//!   precedence (`not` > `and` > `or`) via Pratt parsing
//! - Case-insensitive keywords; the leading `where` is optional
//! - Structured [`QueryError`]s carrying the failing source position; the
//!   parser never panics past its boundary
//!
//! ## Quick Start
//!
//! ```rust
//! use ptx_query::parse_query;
//!
//! let query = parse_query("status >= 400 group by ip count sort by count desc").unwrap();
//! assert_eq!(query.group_by, vec!["ip"]);
//! assert_eq!(query.aggs[0].output_key(), "count");
//! ```

pub mod ast;
pub mod duration;
pub mod error;
pub mod grammar;

// Re-export the most commonly used types and functions at crate root
pub use ast::{
    Agg, AggFunc, ArithOp, Assignment, CmpOp, Expr, Literal, Query, SortClause, SortDir,
    TransformExpr, TransformFunc,
};
pub use duration::parse_duration;
pub use error::{QueryError, Result, SourceLocation};
pub use grammar::{parse_query, parse_transform};

/// Numeric view of a string under the engine's coercion rule.
///
/// A value is numeric when it matches `-?(\d+\.?\d*|\.\d+)` and parses to a
/// finite number. Exponent notation, infinities, and NaN spellings are
/// deliberately excluded: `"1e3"` compares as a string.
pub fn parse_numeric(s: &str) -> Option<f64> {
    let rest = s.strip_prefix('-').unwrap_or(s);
    if rest.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };

    let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let shape_ok = match frac_part {
        // "12.5", "12." and ".5" are all numeric; "." alone is not.
        Some(frac) => {
            digits(int_part) && digits(frac) && !(int_part.is_empty() && frac.is_empty())
        }
        None => !int_part.is_empty() && digits(int_part),
    };
    if !shape_ok {
        return None;
    }

    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::parse_numeric;

    #[test]
    fn test_parse_numeric_accepts_plain_forms() {
        assert_eq!(parse_numeric("200"), Some(200.0));
        assert_eq!(parse_numeric("-3"), Some(-3.0));
        assert_eq!(parse_numeric("12.5"), Some(12.5));
        assert_eq!(parse_numeric(".5"), Some(0.5));
        assert_eq!(parse_numeric("12."), Some(12.0));
    }

    #[test]
    fn test_parse_numeric_rejects_non_numbers() {
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric("1e3"), None);
        assert_eq!(parse_numeric("NaN"), None);
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("."), None);
        assert_eq!(parse_numeric("1.2.3"), None);
        assert_eq!(parse_numeric(" 5"), None);
    }
}
