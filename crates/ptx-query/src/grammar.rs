//! Query string parser using a pest PEG grammar + Pratt parser.
//!
//! Parses full query pipelines like:
//! - `status >= 500 and method == "GET"`
//! - `status >= 400 group by ip count sort by count desc limit 10`
//! - `level in {"err", "crit"} or not has(request_id)`
//!
//! and `--eval` transform assignments like:
//! - `latency_ms = latency / 1000`
//! - `kind = if(status >= 500, "server", "client")`
//!
//! Keywords are case-insensitive; the leading `where` is optional. All
//! failures surface as [`QueryError::Syntax`] with a source location —
//! nothing panics past this module's boundary.

use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::ast::{
    Agg, AggFunc, ArithOp, Assignment, CmpOp, Expr, Literal, Query, SortClause, SortDir,
    TransformExpr, TransformFunc,
};
use crate::error::{QueryError, Result, SourceLocation};

// ---------------------------------------------------------------------------
// Pest parser (generated from query.pest grammar)
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[grammar = "src/query.pest"]
struct QueryLangParser;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a query string into a [`Query`] AST.
///
/// # Examples
///
/// ```
/// use ptx_query::parse_query;
///
/// let query = parse_query("status >= 500 group by ip count sort by count desc").unwrap();
/// assert_eq!(query.group_by, vec!["ip"]);
/// ```
pub fn parse_query(input: &str) -> Result<Query> {
    let pairs = QueryLangParser::parse(Rule::query, input).map_err(syntax_error)?;

    let pratt = filter_pratt();
    let mut query = Query::default();

    let query_pair = pairs.into_iter().next().expect("query rule always present");
    for pair in query_pair.into_inner() {
        match pair.as_rule() {
            Rule::where_kw | Rule::EOI => {}
            Rule::expr => query.filter = Some(parse_expr(pair, &pratt)),
            Rule::group_clause => {
                for p in pair.into_inner() {
                    if p.as_rule() == Rule::ident {
                        query.group_by.push(p.as_str().to_string());
                    }
                }
            }
            Rule::agg_clause => query.aggs.push(parse_agg(pair)),
            Rule::sort_clause => query.sort = Some(parse_sort(pair)),
            Rule::limit_clause => query.limit = Some(parse_limit(pair)?),
            other => unreachable!("unexpected query clause: {other:?}"),
        }
    }

    Ok(query)
}

/// Parse a `--eval` transform string (`field = expr`) into an [`Assignment`].
pub fn parse_transform(input: &str) -> Result<Assignment> {
    let pairs = QueryLangParser::parse(Rule::transform, input).map_err(syntax_error)?;

    let pratt = transform_pratt();
    let transform_pair = pairs
        .into_iter()
        .next()
        .expect("transform rule always present");

    let mut field = String::new();
    let mut expr = None;
    for pair in transform_pair.into_inner() {
        match pair.as_rule() {
            Rule::ident => field = pair.as_str().to_string(),
            Rule::t_expr => expr = Some(parse_t_expr(pair, &pratt)?),
            Rule::EOI => {}
            other => unreachable!("unexpected transform part: {other:?}"),
        }
    }

    Ok(Assignment {
        field,
        expr: expr.expect("grammar guarantees an expression"),
    })
}

// ---------------------------------------------------------------------------
// Filter expression parsing
// ---------------------------------------------------------------------------

fn filter_pratt() -> PrattParser<Rule> {
    // Earlier rows bind looser: or < and < not.
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
}

fn parse_expr(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> Expr {
    pratt
        .map_primary(|primary| match primary.as_rule() {
            Rule::comparison => parse_comparison(primary),
            Rule::in_expr => parse_in(primary),
            Rule::has_expr => parse_has(primary),
            Rule::match_expr => parse_match(primary),
            Rule::expr => parse_expr(primary, pratt),
            other => unreachable!("unexpected primary rule: {other:?}"),
        })
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::not_op => Expr::Not(Box::new(rhs)),
            other => unreachable!("unexpected prefix rule: {other:?}"),
        })
        .map_infix(|lhs, op, rhs| match op.as_rule() {
            Rule::and_op => merge_binary(Expr::And, lhs, rhs),
            Rule::or_op => merge_binary(Expr::Or, lhs, rhs),
            other => unreachable!("unexpected infix rule: {other:?}"),
        })
        .parse(pair.into_inner())
}

/// Flatten nested connectives of the same kind:
/// `a and (b and c)` becomes `And(a, b, c)` instead of `And(a, And(b, c))`.
fn merge_binary(ctor: fn(Vec<Expr>) -> Expr, lhs: Expr, rhs: Expr) -> Expr {
    let is_same = |expr: &Expr| -> bool {
        matches!(
            (&ctor(vec![]), expr),
            (Expr::And(_), Expr::And(_)) | (Expr::Or(_), Expr::Or(_))
        )
    };

    let mut args = Vec::new();
    for side in [lhs, rhs] {
        if is_same(&side) {
            match side {
                Expr::And(children) | Expr::Or(children) => args.extend(children),
                _ => unreachable!(),
            }
        } else {
            args.push(side);
        }
    }

    ctor(args)
}

fn parse_comparison(pair: Pair<'_, Rule>) -> Expr {
    let mut field = String::new();
    let mut op = CmpOp::Eq;
    let mut value = Literal::Str(String::new());

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => field = p.as_str().to_string(),
            Rule::cmp_op => op = p.as_str().parse().expect("grammar-limited operator"),
            _ => value = parse_literal(p),
        }
    }

    Expr::Compare { field, op, value }
}

fn parse_in(pair: Pair<'_, Rule>) -> Expr {
    let mut field = String::new();
    let mut values = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => field = p.as_str().to_string(),
            Rule::in_kw => {}
            _ => values.push(parse_literal(p)),
        }
    }

    Expr::In { field, values }
}

fn parse_has(pair: Pair<'_, Rule>) -> Expr {
    let field = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::ident)
        .expect("has() must name a field")
        .as_str()
        .to_string();
    Expr::Has { field }
}

fn parse_match(pair: Pair<'_, Rule>) -> Expr {
    let mut field = String::new();
    let mut pattern = String::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => field = p.as_str().to_string(),
            Rule::matches_kw => {}
            Rule::string => pattern = string_content(p),
            other => unreachable!("unexpected match part: {other:?}"),
        }
    }

    Expr::Match { field, pattern }
}

// ---------------------------------------------------------------------------
// Clause parsing
// ---------------------------------------------------------------------------

fn parse_agg(pair: Pair<'_, Rule>) -> Agg {
    let mut func = AggFunc::Count;
    let mut field = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::count_kw => func = AggFunc::Count,
            Rule::agg_func => {
                let inner = p.into_inner().next().expect("agg_func has a keyword");
                func = match inner.as_rule() {
                    Rule::avg_kw => AggFunc::Avg,
                    Rule::sum_kw => AggFunc::Sum,
                    Rule::min_kw => AggFunc::Min,
                    Rule::max_kw => AggFunc::Max,
                    other => unreachable!("unexpected aggregate keyword: {other:?}"),
                };
            }
            Rule::ident => field = Some(p.as_str().to_string()),
            other => unreachable!("unexpected aggregate part: {other:?}"),
        }
    }

    Agg { func, field }
}

fn parse_sort(pair: Pair<'_, Rule>) -> SortClause {
    let mut field = String::new();
    let mut dir = SortDir::Asc;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::sort_kw | Rule::by_kw => {}
            Rule::ident => field = p.as_str().to_string(),
            Rule::sort_dir => {
                let inner = p.into_inner().next().expect("sort_dir has a keyword");
                dir = match inner.as_rule() {
                    Rule::asc_kw => SortDir::Asc,
                    Rule::desc_kw => SortDir::Desc,
                    other => unreachable!("unexpected sort direction: {other:?}"),
                };
            }
            other => unreachable!("unexpected sort part: {other:?}"),
        }
    }

    SortClause { field, dir }
}

fn parse_limit(pair: Pair<'_, Rule>) -> Result<usize> {
    let uint = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::uint)
        .expect("limit carries a uint");
    uint.as_str()
        .parse()
        .map_err(|_| QueryError::Syntax(format!("limit '{}' out of range", uint.as_str()), None))
}

// ---------------------------------------------------------------------------
// Literal parsing
// ---------------------------------------------------------------------------

fn parse_literal(pair: Pair<'_, Rule>) -> Literal {
    match pair.as_rule() {
        Rule::string => Literal::Str(string_content(pair)),
        Rule::float => Literal::Float(pair.as_str().parse().expect("grammar-shaped float")),
        Rule::int => match pair.as_str().parse::<i64>() {
            Ok(n) => Literal::Int(n),
            // Integers beyond i64 degrade to float rather than erroring.
            Err(_) => Literal::Float(pair.as_str().parse().unwrap_or(0.0)),
        },
        other => unreachable!("unexpected literal rule: {other:?}"),
    }
}

/// Extract and unescape the content of a `string` pair.
fn string_content(pair: Pair<'_, Rule>) -> String {
    let inner = pair.into_inner().next().expect("string has inner content");
    unescape(inner.as_str())
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Transform expression parsing
// ---------------------------------------------------------------------------

fn transform_pratt() -> PrattParser<Rule> {
    PrattParser::new()
        .op(Op::infix(Rule::add_op, Assoc::Left) | Op::infix(Rule::sub_op, Assoc::Left))
        .op(Op::infix(Rule::mul_op, Assoc::Left) | Op::infix(Rule::div_op, Assoc::Left))
}

fn parse_t_expr(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> Result<TransformExpr> {
    pratt
        .map_primary(|primary| match primary.as_rule() {
            Rule::if_expr => parse_if(primary, pratt),
            Rule::call_expr => parse_call(primary, pratt),
            Rule::t_expr => parse_t_expr(primary, pratt),
            Rule::ident => Ok(TransformExpr::Field(primary.as_str().to_string())),
            Rule::string | Rule::float | Rule::int => {
                Ok(TransformExpr::Literal(parse_literal(primary)))
            }
            other => unreachable!("unexpected transform primary: {other:?}"),
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::add_op => ArithOp::Add,
                Rule::sub_op => ArithOp::Sub,
                Rule::mul_op => ArithOp::Mul,
                Rule::div_op => ArithOp::Div,
                other => unreachable!("unexpected transform infix: {other:?}"),
            };
            Ok(TransformExpr::Binary {
                op,
                left: Box::new(lhs?),
                right: Box::new(rhs?),
            })
        })
        .parse(pair.into_inner())
}

fn parse_call(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> Result<TransformExpr> {
    let mut name = String::new();
    let mut args = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = p.as_str().to_string(),
            Rule::t_expr => args.push(parse_t_expr(p, pratt)?),
            other => unreachable!("unexpected call part: {other:?}"),
        }
    }

    let func: TransformFunc = name
        .to_ascii_lowercase()
        .parse()
        .map_err(|()| QueryError::UnknownFunction(name.clone()))?;

    if let Some(expected) = func.arity()
        && expected != args.len()
    {
        return Err(QueryError::WrongArity {
            func: name,
            expected,
            got: args.len(),
        });
    }

    Ok(TransformExpr::Call { func, args })
}

fn parse_if(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> Result<TransformExpr> {
    let mut exprs = Vec::new();
    let mut op = CmpOp::Eq;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::if_kw => {}
            Rule::cmp_op => op = p.as_str().parse().expect("grammar-limited operator"),
            Rule::t_expr => exprs.push(parse_t_expr(p, pratt)?),
            other => unreachable!("unexpected if part: {other:?}"),
        }
    }

    // Grammar shape: if(lhs op rhs, then, else) — exactly four expressions.
    let mut exprs = exprs.into_iter();
    let (left, right, then, otherwise) = match (exprs.next(), exprs.next(), exprs.next(), exprs.next())
    {
        (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
        _ => unreachable!("grammar guarantees four if() expressions"),
    };

    Ok(TransformExpr::If {
        left: Box::new(left),
        op,
        right: Box::new(right),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    })
}

// ---------------------------------------------------------------------------
// Error conversion
// ---------------------------------------------------------------------------

fn syntax_error(e: pest::error::Error<Rule>) -> QueryError {
    let (line, col) = match e.line_col {
        LineColLocation::Pos((l, c)) | LineColLocation::Span((l, c), _) => (l, c),
    };
    QueryError::Syntax(
        e.variant.message().into_owned(),
        Some(SourceLocation {
            line: line as u32,
            col: col as u32,
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(field: &str, op: CmpOp, value: Literal) -> Expr {
        Expr::Compare {
            field: field.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn test_simple_comparison() {
        let q = parse_query("status == 200").unwrap();
        assert_eq!(
            q.filter,
            Some(compare("status", CmpOp::Eq, Literal::Int(200)))
        );
        assert!(q.group_by.is_empty());
        assert!(q.aggs.is_empty());
    }

    #[test]
    fn test_optional_where_keyword() {
        let explicit = parse_query("where status == 200").unwrap();
        let implicit = parse_query("status == 200").unwrap();
        assert_eq!(explicit, implicit);
    }

    #[test]
    fn test_and_flattened() {
        let q = parse_query("a == 1 and b == 2 and c == 3").unwrap();
        assert_eq!(
            q.filter,
            Some(Expr::And(vec![
                compare("a", CmpOp::Eq, Literal::Int(1)),
                compare("b", CmpOp::Eq, Literal::Int(2)),
                compare("c", CmpOp::Eq, Literal::Int(3)),
            ]))
        );
    }

    #[test]
    fn test_precedence_not_and_or() {
        // "a == 1 or not b == 2 and c == 3" parses as "a==1 or ((not b==2) and c==3)"
        let q = parse_query("a == 1 or not b == 2 and c == 3").unwrap();
        assert_eq!(
            q.filter,
            Some(Expr::Or(vec![
                compare("a", CmpOp::Eq, Literal::Int(1)),
                Expr::And(vec![
                    Expr::Not(Box::new(compare("b", CmpOp::Eq, Literal::Int(2)))),
                    compare("c", CmpOp::Eq, Literal::Int(3)),
                ]),
            ]))
        );
    }

    #[test]
    fn test_parentheses() {
        let q = parse_query("(a == 1 or b == 2) and c == 3").unwrap();
        assert_eq!(
            q.filter,
            Some(Expr::And(vec![
                Expr::Or(vec![
                    compare("a", CmpOp::Eq, Literal::Int(1)),
                    compare("b", CmpOp::Eq, Literal::Int(2)),
                ]),
                compare("c", CmpOp::Eq, Literal::Int(3)),
            ]))
        );
    }

    #[test]
    fn test_in_expression() {
        let q = parse_query("status in {500, 502, \"bad\"}").unwrap();
        assert_eq!(
            q.filter,
            Some(Expr::In {
                field: "status".to_string(),
                values: vec![
                    Literal::Int(500),
                    Literal::Int(502),
                    Literal::Str("bad".to_string()),
                ],
            })
        );
    }

    #[test]
    fn test_has_expression() {
        let q = parse_query("has(request_id)").unwrap();
        assert_eq!(
            q.filter,
            Some(Expr::Has {
                field: "request_id".to_string()
            })
        );
    }

    #[test]
    fn test_match_expression() {
        let q = parse_query("path matches \"^/api/\"").unwrap();
        assert_eq!(
            q.filter,
            Some(Expr::Match {
                field: "path".to_string(),
                pattern: "^/api/".to_string(),
            })
        );
    }

    #[test]
    fn test_full_pipeline() {
        let q = parse_query("status >= 400 group by ip count sort by count desc limit 10").unwrap();
        assert_eq!(
            q.filter,
            Some(compare("status", CmpOp::Ge, Literal::Int(400)))
        );
        assert_eq!(q.group_by, vec!["ip"]);
        assert_eq!(
            q.aggs,
            vec![Agg {
                func: AggFunc::Count,
                field: None
            }]
        );
        assert_eq!(
            q.sort,
            Some(SortClause {
                field: "count".to_string(),
                dir: SortDir::Desc,
            })
        );
        assert_eq!(q.limit, Some(10));
    }

    #[test]
    fn test_group_without_by() {
        let q = parse_query("group ip, host avg latency").unwrap();
        assert_eq!(q.group_by, vec!["ip", "host"]);
        assert_eq!(
            q.aggs,
            vec![Agg {
                func: AggFunc::Avg,
                field: Some("latency".to_string())
            }]
        );
    }

    #[test]
    fn test_multiple_aggregates() {
        let q = parse_query("group by ip count avg latency max bytes").unwrap();
        assert_eq!(q.aggs.len(), 3);
        assert_eq!(q.aggs[0].output_key(), "count");
        assert_eq!(q.aggs[1].output_key(), "avg_latency");
        assert_eq!(q.aggs[2].output_key(), "max_bytes");
    }

    #[test]
    fn test_case_insensitive_keywords() {
        let q = parse_query("WHERE status >= 500 GROUP BY ip COUNT SORT BY ip ASC LIMIT 5").unwrap();
        assert_eq!(q.group_by, vec!["ip"]);
        assert_eq!(q.limit, Some(5));
        assert_eq!(q.sort.unwrap().dir, SortDir::Asc);
    }

    #[test]
    fn test_keyword_prefix_identifiers() {
        // "android" must not lex as "and" + "roid"
        let q = parse_query("platform == \"x\" and android == 1").unwrap();
        match q.filter.unwrap() {
            Expr::And(args) => {
                assert_eq!(
                    args[1],
                    compare("android", CmpOp::Eq, Literal::Int(1))
                );
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_dotted_field_names() {
        let q = parse_query("request.method == \"GET\"").unwrap();
        assert_eq!(
            q.filter,
            Some(compare(
                "request.method",
                CmpOp::Eq,
                Literal::Str("GET".to_string())
            ))
        );
    }

    #[test]
    fn test_single_quoted_strings() {
        let q = parse_query("method == 'POST'").unwrap();
        assert_eq!(
            q.filter,
            Some(compare("method", CmpOp::Eq, Literal::Str("POST".to_string())))
        );
    }

    #[test]
    fn test_escaped_quotes() {
        let q = parse_query(r#"msg == "say \"hi\"""#).unwrap();
        assert_eq!(
            q.filter,
            Some(compare(
                "msg",
                CmpOp::Eq,
                Literal::Str("say \"hi\"".to_string())
            ))
        );
    }

    #[test]
    fn test_float_literal() {
        let q = parse_query("ratio > 0.75").unwrap();
        assert_eq!(
            q.filter,
            Some(compare("ratio", CmpOp::Gt, Literal::Float(0.75)))
        );
    }

    #[test]
    fn test_negative_literal() {
        let q = parse_query("delta < -3").unwrap();
        assert_eq!(q.filter, Some(compare("delta", CmpOp::Lt, Literal::Int(-3))));
    }

    #[test]
    fn test_empty_query_is_identity() {
        let q = parse_query("").unwrap();
        assert_eq!(q, Query::default());
    }

    #[test]
    fn test_error_carries_location() {
        let err = parse_query("status == ").unwrap_err();
        assert!(err.location().is_some(), "expected a location, got: {err}");
    }

    #[test]
    fn test_dangling_operator_fails() {
        assert!(parse_query("status == 200 and").is_err());
    }

    #[test]
    fn test_unmatched_paren_fails() {
        assert!(parse_query("(status == 200").is_err());
    }

    #[test]
    fn test_double_operator_fails() {
        assert!(parse_query("a == 1 and or b == 2").is_err());
    }

    // -- transform expressions --

    #[test]
    fn test_transform_arithmetic() {
        let t = parse_transform("latency_ms = latency / 1000").unwrap();
        assert_eq!(t.field, "latency_ms");
        assert_eq!(
            t.expr,
            TransformExpr::Binary {
                op: ArithOp::Div,
                left: Box::new(TransformExpr::Field("latency".to_string())),
                right: Box::new(TransformExpr::Literal(Literal::Int(1000))),
            }
        );
    }

    #[test]
    fn test_transform_precedence() {
        // a + b * 2 parses as a + (b * 2)
        let t = parse_transform("x = a + b * 2").unwrap();
        match t.expr {
            TransformExpr::Binary { op: ArithOp::Add, right, .. } => {
                assert!(matches!(
                    *right,
                    TransformExpr::Binary { op: ArithOp::Mul, .. }
                ));
            }
            other => panic!("expected Add at the root, got {other:?}"),
        }
    }

    #[test]
    fn test_transform_function_call() {
        let t = parse_transform("m = upper(method)").unwrap();
        assert_eq!(
            t.expr,
            TransformExpr::Call {
                func: TransformFunc::Upper,
                args: vec![TransformExpr::Field("method".to_string())],
            }
        );
    }

    #[test]
    fn test_transform_conditional() {
        let t = parse_transform("kind = if(status >= 500, \"server\", \"client\")").unwrap();
        match t.expr {
            TransformExpr::If { op, .. } => assert_eq!(op, CmpOp::Ge),
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn test_transform_unknown_function() {
        let err = parse_transform("x = exec(cmd)").unwrap_err();
        assert!(
            matches!(err, QueryError::UnknownFunction(ref name) if name == "exec"),
            "expected UnknownFunction, got: {err}"
        );
    }

    #[test]
    fn test_transform_wrong_arity() {
        let err = parse_transform("x = upper(a, b)").unwrap_err();
        assert!(matches!(err, QueryError::WrongArity { .. }));
    }
}
