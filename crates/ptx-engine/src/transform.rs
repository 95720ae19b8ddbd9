//! Per-event transform chain.
//!
//! A transform maps `Event -> Option<Event>`; `None` drops the event.
//! Transforms run in order, and a fault inside one is caught and logged —
//! the event passes through that stage unchanged rather than being lost.
//!
//! User-supplied transforms (`--eval`) are assignments in the closed
//! expression language parsed by `ptx-query`: arithmetic, one conditional
//! form, and a fixed function catalogue. There is no escape hatch into
//! arbitrary code.

use tracing::warn;

use ptx_query::{ArithOp, Assignment, CmpOp, Literal, TransformExpr, TransformFunc};

use crate::event::Event;
use crate::value::Value;

/// A per-event transform.
pub trait Transform: Send + Sync {
    /// Name used in fault diagnostics.
    fn name(&self) -> &str;

    /// Map one event. `None` drops it from the stream.
    fn apply(&self, event: Event) -> Option<Event>;
}

/// An ordered chain of transforms.
#[derive(Default)]
pub struct TransformChain {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformChain {
    pub fn new() -> TransformChain {
        TransformChain::default()
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Run every event through the chain, dropping events a stage maps to
    /// `None` and preserving input order.
    pub fn apply_all(&self, events: Vec<Event>) -> Vec<Event> {
        events
            .into_iter()
            .filter_map(|event| self.apply_one(event))
            .collect()
    }

    fn apply_one(&self, mut event: Event) -> Option<Event> {
        for transform in &self.transforms {
            event = transform.apply(event)?;
        }
        Some(event)
    }
}

// ---------------------------------------------------------------------------
// Expression-based transforms
// ---------------------------------------------------------------------------

/// A `field = expr` transform compiled from a `--eval` argument.
///
/// Evaluation faults (missing operands, division by zero) are logged at
/// warn level and the event passes through unchanged.
pub struct EvalTransform {
    assignment: Assignment,
    label: String,
}

impl EvalTransform {
    pub fn new(assignment: Assignment) -> EvalTransform {
        let label = format!("eval:{}", assignment.field);
        EvalTransform { assignment, label }
    }
}

impl Transform for EvalTransform {
    fn name(&self) -> &str {
        &self.label
    }

    fn apply(&self, mut event: Event) -> Option<Event> {
        match eval_expr(&self.assignment.expr, &event) {
            Ok(value) => {
                event.set(&self.assignment.field, value);
                Some(event)
            }
            Err(fault) => {
                warn!(transform = %self.label, %fault, "transform fault; event passed through");
                Some(event)
            }
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn eval_expr(expr: &TransformExpr, event: &Event) -> Result<Value, String> {
    match expr {
        TransformExpr::Literal(lit) => Ok(literal_value(lit)),

        TransformExpr::Field(name) => Ok(event.get(name).cloned().unwrap_or(Value::Null)),

        TransformExpr::Binary { op, left, right } => {
            let lhs = numeric_operand(left, event)?;
            let rhs = numeric_operand(right, event)?;
            let result = match op {
                ArithOp::Add => lhs + rhs,
                ArithOp::Sub => lhs - rhs,
                ArithOp::Mul => lhs * rhs,
                ArithOp::Div => {
                    if rhs == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    lhs / rhs
                }
            };
            Ok(Value::from_f64(result))
        }

        TransformExpr::Call { func, args } => eval_call(*func, args, event),

        TransformExpr::If {
            left,
            op,
            right,
            then,
            otherwise,
        } => {
            let lhs = eval_expr(left, event)?;
            let rhs = eval_expr(right, event)?;
            if condition_holds(&lhs, *op, &rhs) {
                eval_expr(then, event)
            } else {
                eval_expr(otherwise, event)
            }
        }
    }
}

fn numeric_operand(expr: &TransformExpr, event: &Event) -> Result<f64, String> {
    let value = eval_expr(expr, event)?;
    value
        .as_number()
        .ok_or_else(|| format!("non-numeric operand '{}'", value.render()))
}

fn eval_call(func: TransformFunc, args: &[TransformExpr], event: &Event) -> Result<Value, String> {
    let rendered = |i: usize| -> Result<String, String> {
        eval_expr(&args[i], event).map(|v| v.render())
    };
    match func {
        TransformFunc::Upper => Ok(Value::Str(rendered(0)?.to_uppercase())),
        TransformFunc::Lower => Ok(Value::Str(rendered(0)?.to_lowercase())),
        TransformFunc::Trim => Ok(Value::Str(rendered(0)?.trim().to_string())),
        TransformFunc::Len => Ok(Value::Int(rendered(0)?.chars().count() as i64)),
        TransformFunc::Concat => {
            let mut out = String::new();
            for (i, _) in args.iter().enumerate() {
                out.push_str(&rendered(i)?);
            }
            Ok(Value::Str(out))
        }
        TransformFunc::Replace => {
            let haystack = rendered(0)?;
            let from = rendered(1)?;
            let to = rendered(2)?;
            Ok(Value::Str(haystack.replace(&from, &to)))
        }
    }
}

/// The same numeric-if-both-numeric rule the executor uses for comparisons.
fn condition_holds(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    use std::cmp::Ordering;
    let ordering = match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => lhs.render().cmp(&rhs.render()),
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

#[cfg(test)]
mod tests {
    use super::*;
    use ptx_query::parse_transform;

    fn chain_of(exprs: &[&str]) -> TransformChain {
        let mut chain = TransformChain::new();
        for e in exprs {
            chain.push(Box::new(EvalTransform::new(parse_transform(e).unwrap())));
        }
        chain
    }

    fn event(pairs: &[(&str, Value)]) -> Event {
        let mut e = Event::new("test").with_timestamp(0);
        for (k, v) in pairs {
            e.set(k, v.clone());
        }
        e
    }

    #[test]
    fn test_arithmetic_assignment() {
        let chain = chain_of(&["latency_ms = latency / 1000"]);
        let out = chain.apply_all(vec![event(&[("latency", Value::Int(2500))])]);
        assert_eq!(out[0].get("latency_ms"), Some(&Value::Float(2.5)));
    }

    #[test]
    fn test_string_functions() {
        let chain = chain_of(&[
            "m = upper(method)",
            "route = concat(m, \" \", path)",
        ]);
        let out = chain.apply_all(vec![event(&[
            ("method", Value::Str("get".into())),
            ("path", Value::Str("/x".into())),
        ])]);
        assert_eq!(out[0].get("m"), Some(&Value::Str("GET".into())));
        assert_eq!(out[0].get("route"), Some(&Value::Str("GET /x".into())));
    }

    #[test]
    fn test_conditional() {
        let chain = chain_of(&["kind = if(status >= 500, \"server\", \"client\")"]);
        let out = chain.apply_all(vec![
            event(&[("status", Value::Int(502))]),
            event(&[("status", Value::Int(404))]),
        ]);
        assert_eq!(out[0].get("kind"), Some(&Value::Str("server".into())));
        assert_eq!(out[1].get("kind"), Some(&Value::Str("client".into())));
    }

    #[test]
    fn test_fault_passes_event_through_unchanged() {
        // Arithmetic over a missing field faults; the event must survive
        // without the target field.
        let chain = chain_of(&["x = missing * 2"]);
        let input = event(&[("status", Value::Int(200))]);
        let out = chain.apply_all(vec![input.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], input);
    }

    #[test]
    fn test_division_by_zero_is_a_fault() {
        let chain = chain_of(&["x = 1 / n"]);
        let input = event(&[("n", Value::Int(0))]);
        let out = chain.apply_all(vec![input.clone()]);
        assert_eq!(out[0], input);
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = chain_of(&["n = n + 1", "n = n * 10"]);
        let out = chain.apply_all(vec![event(&[("n", Value::Int(4))])]);
        assert_eq!(out[0].get("n"), Some(&Value::Int(50)));
    }

    #[test]
    fn test_dropping_transform_removes_event() {
        struct DropAll;
        impl Transform for DropAll {
            fn name(&self) -> &str {
                "drop-all"
            }
            fn apply(&self, _event: Event) -> Option<Event> {
                None
            }
        }
        let mut chain = TransformChain::new();
        chain.push(Box::new(DropAll));
        let out = chain.apply_all(vec![event(&[("a", Value::Int(1))])]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_len_and_replace() {
        let chain = chain_of(&[
            "n = len(path)",
            "clean = replace(path, \"/api\", \"\")",
        ]);
        let out = chain.apply_all(vec![event(&[("path", Value::Str("/api/v1".into()))])]);
        assert_eq!(out[0].get("n"), Some(&Value::Int(7)));
        assert_eq!(out[0].get("clean"), Some(&Value::Str("/v1".into())));
    }
}
