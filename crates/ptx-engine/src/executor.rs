//! Query executor: filter → group/aggregate → sort → limit over a batch of
//! events.
//!
//! Execution follows a compile-then-evaluate model: the query is compiled
//! once (regex patterns built up front), then applied as a pure function.
//! No exception escapes this module — a `matches` pattern that fails to
//! compile simply never matches, and every comparison against a missing
//! field is false.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::HashMap;

use regex::Regex;

use ptx_query::{Agg, AggFunc, CmpOp, Expr, Literal, Query, SortDir};

use crate::event::Event;
use crate::value::{Value, compare_values};

/// An aggregation output row: group-field entries plus one entry per
/// aggregate (`count`, `sum_<f>`, `avg_<f>`, `min_<f>`, `max_<f>`).
pub type Row = BTreeMap<String, Value>;

/// The result of executing a query: events when no grouping or aggregation
/// was requested, rows otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Events(Vec<Event>),
    Rows(Vec<Row>),
}

impl Execution {
    pub fn len(&self) -> usize {
        match self {
            Execution::Events(events) => events.len(),
            Execution::Rows(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Execute a query over a batch of events.
///
/// The batch is consumed; input order is preserved through filtering, and
/// sorting is stable with respect to it.
pub fn execute(query: &Query, events: Vec<Event>) -> Execution {
    CompiledQuery::new(query).run(events)
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// A query with its `matches` patterns pre-compiled.
pub struct CompiledQuery<'q> {
    query: &'q Query,
    filter: Option<CompiledExpr>,
}

/// Mirror of [`Expr`] with regexes built. A pattern that failed to compile
/// becomes `Match { regex: None }`, which never matches.
enum CompiledExpr {
    Compare {
        field: String,
        op: CmpOp,
        value: Literal,
    },
    In {
        field: String,
        values: Vec<Literal>,
    },
    Has {
        field: String,
    },
    Match {
        field: String,
        regex: Option<Regex>,
    },
    Not(Box<CompiledExpr>),
    And(Vec<CompiledExpr>),
    Or(Vec<CompiledExpr>),
}

fn compile_expr(expr: &Expr) -> CompiledExpr {
    match expr {
        Expr::Compare { field, op, value } => CompiledExpr::Compare {
            field: field.clone(),
            op: *op,
            value: value.clone(),
        },
        Expr::In { field, values } => CompiledExpr::In {
            field: field.clone(),
            values: values.clone(),
        },
        Expr::Has { field } => CompiledExpr::Has {
            field: field.clone(),
        },
        Expr::Match { field, pattern } => CompiledExpr::Match {
            field: field.clone(),
            regex: Regex::new(pattern).ok(),
        },
        Expr::Not(inner) => CompiledExpr::Not(Box::new(compile_expr(inner))),
        Expr::And(args) => CompiledExpr::And(args.iter().map(compile_expr).collect()),
        Expr::Or(args) => CompiledExpr::Or(args.iter().map(compile_expr).collect()),
    }
}

impl<'q> CompiledQuery<'q> {
    pub fn new(query: &'q Query) -> CompiledQuery<'q> {
        CompiledQuery {
            query,
            filter: query.filter.as_ref().map(compile_expr),
        }
    }

    pub fn run(&self, events: Vec<Event>) -> Execution {
        // 1. Filter, preserving relative order.
        let survivors: Vec<Event> = match &self.filter {
            Some(expr) => events.into_iter().filter(|e| evaluate(expr, e)).collect(),
            None => events,
        };

        // 2. Group & aggregate.
        if self.query.is_aggregation() {
            let mut rows = aggregate(self.query, &survivors);
            if let Some(sort) = &self.query.sort {
                sort_rows(&mut rows, &sort.field, sort.dir);
            }
            if let Some(limit) = self.query.limit {
                rows.truncate(limit);
            }
            return Execution::Rows(rows);
        }

        // 3/4. Sort and limit the surviving events.
        let mut survivors = survivors;
        if let Some(sort) = &self.query.sort {
            sort_events(&mut survivors, &sort.field, sort.dir);
        }
        if let Some(limit) = self.query.limit {
            survivors.truncate(limit);
        }
        Execution::Events(survivors)
    }
}

// ---------------------------------------------------------------------------
// Filter evaluation
// ---------------------------------------------------------------------------

fn evaluate(expr: &CompiledExpr, event: &Event) -> bool {
    match expr {
        CompiledExpr::Compare { field, op, value } => {
            // A missing field fails every comparison, `!=` included:
            // missing is unknown, not unequal.
            match event.get(field) {
                Some(actual) => compare(actual, *op, value),
                None => false,
            }
        }

        CompiledExpr::In { field, values } => match event.get(field) {
            Some(actual) => values.iter().any(|v| compare(actual, CmpOp::Eq, v)),
            None => false,
        },

        CompiledExpr::Has { field } => event.has(field),

        CompiledExpr::Match { field, regex } => match (event.get(field), regex) {
            (Some(actual), Some(re)) => re.is_match(&actual.render()),
            _ => false,
        },

        CompiledExpr::Not(inner) => !evaluate(inner, event),

        CompiledExpr::And(args) => args.iter().all(|a| evaluate(a, event)),

        CompiledExpr::Or(args) => args.iter().any(|a| evaluate(a, event)),
    }
}

/// One comparison under the per-pair coercion rule: numeric when both sides
/// have a numeric view, string otherwise (byte-wise equality, lexicographic
/// ordering).
fn compare(actual: &Value, op: CmpOp, literal: &Literal) -> bool {
    let ordering = match (actual.as_number(), literal.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => actual.render().cmp(&literal.render()),
    };
    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    }
}

// ---------------------------------------------------------------------------
// Grouping & aggregation
// ---------------------------------------------------------------------------

/// Partition events by the rendered group-key tuple and emit one row per
/// group. With no group fields, all events form one synthetic group. Rows
/// come out in first-seen order; only a `sort` clause makes the order part
/// of the contract.
fn aggregate(query: &Query, events: &[Event]) -> Vec<Row> {
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<&Event>, Row)> = Vec::new();

    for event in events {
        let key: Vec<String> = query
            .group_by
            .iter()
            .map(|f| event.render_field(f))
            .collect();

        let slot = *index.entry(key).or_insert_with(|| {
            let mut row = Row::new();
            // Group-field entries come from the group's first event.
            for field in &query.group_by {
                let value = event.get(field).cloned().unwrap_or(Value::Null);
                row.insert(field.clone(), value);
            }
            groups.push((Vec::new(), row));
            groups.len() - 1
        });
        groups[slot].0.push(event);
    }

    // An aggregate-only query over zero events still emits nothing — there
    // is no group to describe.
    for (members, row) in &mut groups {
        for agg in &query.aggs {
            row.insert(agg.output_key(), aggregate_one(agg, members));
        }
    }

    groups.into_iter().map(|(_, row)| row).collect()
}

fn aggregate_one(agg: &Agg, members: &[&Event]) -> Value {
    let field = agg.field.as_deref();
    match agg.func {
        AggFunc::Count => Value::Int(members.len() as i64),

        // Missing or non-numeric values count as zero.
        AggFunc::Sum => {
            let sum: f64 = numeric_values(members, field)
                .map(|v| v.unwrap_or(0.0))
                .sum();
            Value::from_f64(sum)
        }

        // The divisor is the full group size, including events that are
        // missing the field.
        AggFunc::Avg => {
            let sum: f64 = numeric_values(members, field)
                .map(|v| v.unwrap_or(0.0))
                .sum();
            Value::from_f64(sum / members.len() as f64)
        }

        AggFunc::Min => extremum(members, field, Ordering::Less),
        AggFunc::Max => extremum(members, field, Ordering::Greater),
    }
}

fn numeric_values<'a>(
    members: &'a [&Event],
    field: Option<&'a str>,
) -> impl Iterator<Item = Option<f64>> + 'a {
    members
        .iter()
        .map(move |e| field.and_then(|f| e.get(f)).and_then(Value::as_number))
}

/// Min/max consider only present values; with none present the result is
/// null. Comparison is numeric when both sides allow it, else lexicographic.
fn extremum(members: &[&Event], field: Option<&str>, keep: Ordering) -> Value {
    let Some(field) = field else {
        return Value::Null;
    };
    let mut best: Option<&Value> = None;
    for event in members {
        let Some(value) = event.get(field) else {
            continue;
        };
        match best {
            None => best = Some(value),
            Some(current) => {
                if compare_values(Some(value), Some(current)) == keep {
                    best = Some(value);
                }
            }
        }
    }
    best.cloned().unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

fn directed(ordering: Ordering, dir: SortDir) -> Ordering {
    match dir {
        SortDir::Asc => ordering,
        SortDir::Desc => ordering.reverse(),
    }
}

fn sort_events(events: &mut [Event], field: &str, dir: SortDir) {
    events.sort_by(|a, b| directed(compare_values(a.get(field), b.get(field)), dir));
}

fn sort_rows(rows: &mut [Row], field: &str, dir: SortDir) {
    rows.sort_by(|a, b| directed(compare_values(a.get(field), b.get(field)), dir));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptx_query::parse_query;

    fn event(pairs: &[(&str, Value)]) -> Event {
        let mut e = Event::new("test").with_timestamp(0);
        for (k, v) in pairs {
            e.set(k, v.clone());
        }
        e
    }

    fn events_of(result: Execution) -> Vec<Event> {
        match result {
            Execution::Events(events) => events,
            Execution::Rows(_) => panic!("expected events"),
        }
    }

    fn rows_of(result: Execution) -> Vec<Row> {
        match result {
            Execution::Rows(rows) => rows,
            Execution::Events(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_missing_field_fails_all_comparisons() {
        let e = event(&[("status", Value::Int(200))]);
        for q in ["other == 200", "other != 200", "other < 1", "other >= 1"] {
            let query = parse_query(q).unwrap();
            let out = execute(&query, vec![e.clone()]);
            assert!(out.is_empty(), "query {q:?} should drop the event");
        }
    }

    #[test]
    fn test_not_flips_missing_to_true() {
        // A missing status makes `status == 200` false, so `not` selects it.
        let query = parse_query("not status == 200").unwrap();
        let out = execute(&query, vec![event(&[("method", Value::Str("GET".into()))])]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_numeric_string_coercion_symmetry() {
        let as_string = event(&[("status", Value::Str("200".into()))]);
        let as_int = event(&[("status", Value::Int(200))]);
        for q in ["status == 200", "status == \"200\""] {
            let query = parse_query(q).unwrap();
            let out = execute(&query, vec![as_string.clone(), as_int.clone()]);
            assert_eq!(out.len(), 2, "query {q:?} should keep both events");
        }
    }

    #[test]
    fn test_string_ordering_when_not_numeric() {
        let query = parse_query("level < \"c\"").unwrap();
        let out = execute(
            &query,
            vec![
                event(&[("level", Value::Str("a".into()))]),
                event(&[("level", Value::Str("d".into()))]),
            ],
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_filter_and_preserves_order() {
        let input = vec![
            event(&[("status", Value::Int(500)), ("method", Value::Str("GET".into()))]),
            event(&[("status", Value::Int(500)), ("method", Value::Str("POST".into()))]),
            event(&[("status", Value::Int(200)), ("method", Value::Str("GET".into()))]),
        ];
        let query = parse_query("status >= 500 and method == \"GET\"").unwrap();
        let out = events_of(execute(&query, input));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("status"), Some(&Value::Int(500)));
        assert_eq!(out[0].get("method"), Some(&Value::Str("GET".into())));
    }

    #[test]
    fn test_in_expression_numeric_coercion() {
        let input = vec![
            event(&[("status", Value::Str("500".into()))]),
            event(&[("status", Value::Str("502".into()))]),
            event(&[("status", Value::Str("200".into()))]),
        ];
        let query = parse_query("status in {500, 502}").unwrap();
        let out = events_of(execute(&query, input));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("status"), Some(&Value::Str("500".into())));
        assert_eq!(out[1].get("status"), Some(&Value::Str("502".into())));
    }

    #[test]
    fn test_has_and_matches() {
        let input = vec![
            event(&[("path", Value::Str("/api/users".into()))]),
            event(&[("path", Value::Str("/static/app.js".into()))]),
            event(&[("other", Value::Int(1))]),
        ];
        let query = parse_query("has(path) and path matches \"^/api/\"").unwrap();
        let out = events_of(execute(&query, input));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_invalid_match_pattern_never_matches() {
        let query = parse_query("path matches \"(unclosed\"").unwrap();
        let input = vec![event(&[("path", Value::Str("/x".into()))])];
        let out = execute(&query, input);
        assert!(out.is_empty());
    }

    #[test]
    fn test_group_by_count() {
        let ips = ["1.1.1.1", "1.1.1.1", "2.2.2.2", "1.1.1.1", "2.2.2.2"];
        let input: Vec<Event> = ips
            .iter()
            .map(|ip| {
                event(&[
                    ("ip", Value::Str((*ip).into())),
                    ("status", Value::Int(400 + (ip.len() as i64 % 7))),
                ])
            })
            .collect();
        let query = parse_query("status >= 400 group by ip count").unwrap();
        let mut rows = rows_of(execute(&query, input));
        rows.sort_by_key(|r| r.get("ip").map(Value::render));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("ip"), Some(&Value::Str("1.1.1.1".into())));
        assert_eq!(rows[0].get("count"), Some(&Value::Int(3)));
        assert_eq!(rows[1].get("ip"), Some(&Value::Str("2.2.2.2".into())));
        assert_eq!(rows[1].get("count"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_group_avg() {
        let input: Vec<Event> = [50, 200, 500]
            .iter()
            .map(|n| {
                event(&[
                    ("ip", Value::Str("1.1.1.1".into())),
                    ("latency", Value::Int(*n)),
                ])
            })
            .collect();
        let query = parse_query("ip == \"1.1.1.1\" group by ip avg latency").unwrap();
        let rows = rows_of(execute(&query, input));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("ip"), Some(&Value::Str("1.1.1.1".into())));
        assert_eq!(rows[0].get("avg_latency"), Some(&Value::Int(250)));
    }

    #[test]
    fn test_aggregates_without_group_form_synthetic_group() {
        let input = vec![
            event(&[("bytes", Value::Int(10))]),
            event(&[("bytes", Value::Int(30))]),
        ];
        let query = parse_query("count sum bytes").unwrap();
        let rows = rows_of(execute(&query, input));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("count"), Some(&Value::Int(2)));
        assert_eq!(rows[0].get("sum_bytes"), Some(&Value::Int(40)));
    }

    #[test]
    fn test_sum_treats_missing_as_zero_avg_divides_by_group_size() {
        let input = vec![
            event(&[("g", Value::Str("a".into())), ("n", Value::Int(10))]),
            event(&[("g", Value::Str("a".into()))]),
            event(&[("g", Value::Str("a".into())), ("n", Value::Int(20))]),
        ];
        let query = parse_query("group by g sum n avg n").unwrap();
        let rows = rows_of(execute(&query, input));
        assert_eq!(rows[0].get("sum_n"), Some(&Value::Int(30)));
        assert_eq!(rows[0].get("avg_n"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_min_max_ignore_missing_and_null_when_none_present() {
        let input = vec![
            event(&[("g", Value::Str("a".into())), ("n", Value::Int(7))]),
            event(&[("g", Value::Str("a".into()))]),
            event(&[("g", Value::Str("a".into())), ("n", Value::Int(3))]),
        ];
        let query = parse_query("group by g min n max n min other").unwrap();
        let rows = rows_of(execute(&query, input));
        assert_eq!(rows[0].get("min_n"), Some(&Value::Int(3)));
        assert_eq!(rows[0].get("max_n"), Some(&Value::Int(7)));
        assert_eq!(rows[0].get("min_other"), Some(&Value::Null));
    }

    #[test]
    fn test_group_key_missing_field_is_empty_string() {
        let input = vec![
            event(&[("ip", Value::Str("1.1.1.1".into()))]),
            event(&[]),
            event(&[]),
        ];
        let query = parse_query("group by ip count").unwrap();
        let mut rows = rows_of(execute(&query, input));
        rows.sort_by_key(|r| r.get("ip").map(Value::render));
        assert_eq!(rows.len(), 2);
        // The missing-ip group renders its key as empty.
        assert_eq!(rows[0].get("ip"), Some(&Value::Null));
        assert_eq!(rows[0].get("count"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_sort_numeric_and_stable() {
        let input = vec![
            event(&[("n", Value::Str("10".into())), ("tag", Value::Str("a".into()))]),
            event(&[("n", Value::Str("9".into())), ("tag", Value::Str("b".into()))]),
            event(&[("n", Value::Str("9".into())), ("tag", Value::Str("c".into()))]),
        ];
        let query = parse_query("sort by n").unwrap();
        let out = events_of(execute(&query, input));
        // Numeric: 9 < 10; stable: b before c.
        assert_eq!(out[0].get("tag"), Some(&Value::Str("b".into())));
        assert_eq!(out[1].get("tag"), Some(&Value::Str("c".into())));
        assert_eq!(out[2].get("tag"), Some(&Value::Str("a".into())));
    }

    #[test]
    fn test_sort_desc_and_limit() {
        let input = vec![
            event(&[("n", Value::Int(1))]),
            event(&[("n", Value::Int(3))]),
            event(&[("n", Value::Int(2))]),
        ];
        let query = parse_query("sort by n desc limit 2").unwrap();
        let out = events_of(execute(&query, input));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("n"), Some(&Value::Int(3)));
        assert_eq!(out[1].get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_sort_missing_sorts_as_empty() {
        let input = vec![
            event(&[("n", Value::Str("b".into()))]),
            event(&[]),
        ];
        let query = parse_query("sort by n").unwrap();
        let out = events_of(execute(&query, input));
        assert_eq!(out[0].get("n"), None);
        assert_eq!(out[1].get("n"), Some(&Value::Str("b".into())));
    }

    #[test]
    fn test_empty_query_is_identity() {
        let input = vec![
            event(&[("a", Value::Int(1))]),
            event(&[("a", Value::Int(2))]),
        ];
        let query = parse_query("").unwrap();
        let out = events_of(execute(&query, input.clone()));
        assert_eq!(out, input);
    }

    #[test]
    fn test_execution_is_deterministic() {
        let input: Vec<Event> = (0..20)
            .map(|i| {
                event(&[
                    ("k", Value::Str(format!("g{}", i % 3))),
                    ("n", Value::Int(i)),
                ])
            })
            .collect();
        let query = parse_query("n >= 3 group by k count avg n sort by k").unwrap();
        let first = execute(&query, input.clone());
        let second = execute(&query, input);
        assert_eq!(first, second);
    }

    #[test]
    fn test_group_rows_sortable_by_aggregate_key() {
        let input = vec![
            event(&[("ip", Value::Str("a".into()))]),
            event(&[("ip", Value::Str("b".into()))]),
            event(&[("ip", Value::Str("b".into()))]),
        ];
        let query = parse_query("group by ip count sort by count desc").unwrap();
        let rows = rows_of(execute(&query, input));
        assert_eq!(rows[0].get("ip"), Some(&Value::Str("b".into())));
        assert_eq!(rows[1].get("ip"), Some(&Value::Str("a".into())));
    }
}
