//! AST types for the query language: filter expressions, grouping,
//! aggregation, sorting, limiting, and the `--eval` transform language.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// =============================================================================
// Literals
// =============================================================================

/// A literal value appearing on the right-hand side of a comparison or
/// inside an `in { ... }` set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    /// The literal rendered the way the executor compares it: numbers via
    /// their decimal form, strings verbatim.
    pub fn render(&self) -> String {
        match self {
            Literal::Int(n) => n.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Str(s) => s.clone(),
        }
    }

    /// Numeric view of the literal, if it has one. String literals qualify
    /// when they parse as a finite number, matching the per-pair coercion
    /// rule used during evaluation.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Int(n) => Some(*n as f64),
            Literal::Float(f) => f.is_finite().then_some(*f),
            Literal::Str(s) => crate::parse_numeric(s),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

// =============================================================================
// Filter expressions
// =============================================================================

/// Comparison operator in a filter expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

impl FromStr for CmpOp {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "==" => Ok(CmpOp::Eq),
            "!=" => Ok(CmpOp::Ne),
            "<" => Ok(CmpOp::Lt),
            "<=" => Ok(CmpOp::Le),
            ">" => Ok(CmpOp::Gt),
            ">=" => Ok(CmpOp::Ge),
            _ => Err(()),
        }
    }
}

/// Parsed filter expression AST.
///
/// Produced by the PEG grammar + Pratt parser from strings like
/// `status >= 500 and method == "GET"` or
/// `level in {"err", "crit"} or not has(request_id)`.
///
/// `And`/`Or` are n-ary: chains of the same connective are flattened during
/// parsing, so `a and b and c` becomes `And([a, b, c])`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// `field <op> literal`
    Compare {
        field: String,
        op: CmpOp,
        value: Literal,
    },
    /// `field in { v1, v2, ... }`
    In { field: String, values: Vec<Literal> },
    /// `has(field)` — field presence test.
    Has { field: String },
    /// `field matches "pattern"` — regex test against the field's rendering.
    Match { field: String, pattern: String },
    /// Logical NOT of a sub-expression.
    Not(Box<Expr>),
    /// Logical AND of sub-expressions.
    And(Vec<Expr>),
    /// Logical OR of sub-expressions.
    Or(Vec<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { field, op, value } => {
                write!(f, "{field} {} {value}", op.as_str())
            }
            Expr::In { field, values } => {
                let parts: Vec<String> = values.iter().map(|v| format!("{v}")).collect();
                write!(f, "{field} in {{{}}}", parts.join(", "))
            }
            Expr::Has { field } => write!(f, "has({field})"),
            Expr::Match { field, pattern } => write!(f, "{field} matches \"{pattern}\""),
            Expr::Not(inner) => write!(f, "not {inner}"),
            Expr::And(args) => {
                let parts: Vec<String> = args.iter().map(|a| format!("{a}")).collect();
                write!(f, "({})", parts.join(" and "))
            }
            Expr::Or(args) => {
                let parts: Vec<String> = args.iter().map(|a| format!("{a}")).collect();
                write!(f, "({})", parts.join(" or "))
            }
        }
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Aggregate function in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        }
    }
}

/// A single aggregate clause. `count` carries no field; the others require
/// one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agg {
    pub func: AggFunc,
    pub field: Option<String>,
}

impl Agg {
    /// The key this aggregate occupies in an output row:
    /// `count` for count, `<func>_<field>` otherwise.
    pub fn output_key(&self) -> String {
        match &self.field {
            None => self.func.as_str().to_string(),
            Some(field) => format!("{}_{}", self.func.as_str(), field),
        }
    }
}

// =============================================================================
// Sort / limit
// =============================================================================

/// Sort direction. Defaults to ascending when unspecified in the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// The `sort [by] <field> [asc|desc]` clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortClause {
    pub field: String,
    pub dir: SortDir,
}

// =============================================================================
// Query
// =============================================================================

/// A complete parsed query: optional filter, grouping fields, aggregates,
/// sort, and limit. Built once per query string and treated as read-only.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Query {
    /// The `where` expression, if any.
    pub filter: Option<Expr>,
    /// `group by` fields, in declaration order.
    pub group_by: Vec<String>,
    /// Aggregate clauses, in declaration order.
    pub aggs: Vec<Agg>,
    /// Optional sort clause applied to the final result list.
    pub sort: Option<SortClause>,
    /// Optional cap on the number of output items.
    pub limit: Option<usize>,
}

impl Query {
    /// Whether execution produces row maps (grouping/aggregation requested)
    /// rather than events.
    pub fn is_aggregation(&self) -> bool {
        !self.group_by.is_empty() || !self.aggs.is_empty()
    }
}

// =============================================================================
// Transform expressions (`--eval`)
// =============================================================================

/// Arithmetic operator in a transform expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Built-in functions available to transform expressions.
///
/// The function set is closed: anything else is a parse error. This is the
/// sandbox boundary — transforms cannot run arbitrary code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformFunc {
    Upper,
    Lower,
    Trim,
    Len,
    Concat,
    Replace,
}

impl TransformFunc {
    /// Expected argument count, or `None` for variadic (`concat`).
    pub fn arity(&self) -> Option<usize> {
        match self {
            TransformFunc::Upper
            | TransformFunc::Lower
            | TransformFunc::Trim
            | TransformFunc::Len => Some(1),
            TransformFunc::Concat => None,
            TransformFunc::Replace => Some(3),
        }
    }
}

impl FromStr for TransformFunc {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "upper" => Ok(TransformFunc::Upper),
            "lower" => Ok(TransformFunc::Lower),
            "trim" => Ok(TransformFunc::Trim),
            "len" => Ok(TransformFunc::Len),
            "concat" => Ok(TransformFunc::Concat),
            "replace" => Ok(TransformFunc::Replace),
            _ => Err(()),
        }
    }
}

/// Expression tree for the transform language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TransformExpr {
    Literal(Literal),
    /// Reference to an event field by name.
    Field(String),
    Binary {
        op: ArithOp,
        left: Box<TransformExpr>,
        right: Box<TransformExpr>,
    },
    Call {
        func: TransformFunc,
        args: Vec<TransformExpr>,
    },
    /// `if(cond-lhs <op> cond-rhs, then, else)` — the only branching construct.
    If {
        left: Box<TransformExpr>,
        op: CmpOp,
        right: Box<TransformExpr>,
        then: Box<TransformExpr>,
        otherwise: Box<TransformExpr>,
    },
}

/// A parsed `--eval` transform: assign the expression's result to a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub field: String,
    pub expr: TransformExpr,
}
