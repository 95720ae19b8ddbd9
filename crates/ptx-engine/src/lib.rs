//! # ptx-engine
//!
//! The event pipeline behind ptx: format parsers, detection, the query
//! executor, and the per-event transform chain.
//!
//! This crate consumes the AST produced by [`ptx_query`] and evaluates it
//! over batches of normalized events.
//!
//! ## Architecture
//!
//! - **Parsers** (stateless): each implements [`LineParser`] — a cheap
//!   `can_parse` probe, a `parse` that never errors (unparseable lines
//!   become `None`), and a sample-based `confidence` score.
//! - **Detector**: scores every registered parser over a line sample and
//!   picks the best, with registration order breaking ties.
//! - **Executor** (pure): compiles a query once, then applies
//!   filter → group/aggregate → sort → limit to a batch, producing either
//!   events or row maps.
//! - **Transforms**: an ordered chain of `Event -> Option<Event>` stages
//!   with fault tolerance — a failing stage logs and passes the event
//!   through unchanged.
//!
//! ## Quick Start
//!
//! ```rust
//! use ptx_engine::{Detector, execute};
//! use ptx_query::parse_query;
//!
//! let lines = vec![
//!     r#"{"status": 500, "path": "/api"}"#.to_string(),
//!     r#"{"status": 200, "path": "/"}"#.to_string(),
//! ];
//!
//! let detector = Detector::new();
//! let parser = detector.detect(&lines).expect("json should be detected");
//! let events = parser.parse_many(&lines, "stdin");
//!
//! let query = parse_query("status >= 500").unwrap();
//! let result = execute(&query, events);
//! assert_eq!(result.len(), 1);
//! ```

pub mod detect;
pub mod error;
pub mod event;
pub mod executor;
pub mod formats;
pub mod timestamp;
pub mod transform;
pub mod value;

// Re-export the most commonly used types and functions at crate root
pub use detect::{DEFAULT_SAMPLE_SIZE, Detector};
pub use error::{EngineError, Result};
pub use event::Event;
pub use executor::{CompiledQuery, Execution, Row, execute};
pub use formats::{
    Coercion, HttpParser, JsonParser, LineParser, LogfmtParser, SyslogParser, UserRegexParser,
};
pub use transform::{EvalTransform, Transform, TransformChain};
pub use value::{Value, compare_values};
