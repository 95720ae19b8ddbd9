//! HTTP server log parser: combined access logs and error logs.
//!
//! Both shapes are accepted by one parser, distinguished per line:
//!
//! - Access (combined):
//!   `10.0.0.1 - frank [04/Dec/2025:10:00:00 +0000] "GET /x HTTP/1.1" 200 512 "ref" "ua"`
//! - Error:
//!   `2025/12/04 10:00:00 [error] 1234#0: *55 open() failed, client: 10.0.0.9, ...`

use std::sync::LazyLock;

use regex::Regex;

use crate::event::Event;
use crate::formats::LineParser;
use crate::timestamp;
use crate::value::Value;

static ACCESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        ^(?P<ip>\S+)\s+(?P<ident>\S+)\s+(?P<user>\S+)
        \s+\[(?P<time>[^\]]+)\]
        \s+"(?P<method>\S+)\s+(?P<path>\S+)(?:\s+(?P<proto>[^"]*))?"
        \s+(?P<status>\d{3})\s+(?P<bytes>\d+|-)
        (?:\s+"(?P<referer>[^"]*)"\s+"(?P<ua>[^"]*)")?
        \s*$"#,
    )
    .expect("access log pattern is valid")
});

static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<time>\d{4}/\d{2}/\d{2}\s\d{2}:\d{2}:\d{2})
        \s+\[(?P<level>\w+)\]
        \s+(?P<pid>\d+)\#(?P<tid>\d+):
        \s+(?:\*(?P<conn>\d+)\s+)?(?P<message>.*)$",
    )
    .expect("error log pattern is valid")
});

/// Parser for HTTP server access (combined) and error logs.
pub struct HttpParser;

impl LineParser for HttpParser {
    fn format_name(&self) -> &str {
        "http"
    }

    fn can_parse(&self, line: &str) -> bool {
        ACCESS_RE.is_match(line) || ERROR_RE.is_match(line)
    }

    fn parse(&self, line: &str, source: &str) -> Option<Event> {
        if let Some(caps) = ACCESS_RE.captures(line) {
            return Some(parse_access(&caps, line, source));
        }
        if let Some(caps) = ERROR_RE.captures(line) {
            return Some(parse_error(&caps, line, source));
        }
        None
    }
}

fn parse_access(caps: &regex::Captures<'_>, line: &str, source: &str) -> Event {
    let mut event = Event::new(source).with_raw(line);

    if let Some(ts) = caps.name("time").and_then(|m| timestamp::parse_combined(m.as_str())) {
        event = event.with_timestamp(ts);
    }

    event.set("ip", Value::Str(caps["ip"].to_string()));
    event.set("ident", Value::Str(caps["ident"].to_string()));
    event.set("user", Value::Str(caps["user"].to_string()));
    event.set("method", Value::Str(caps["method"].to_string()));
    event.set("path", Value::Str(caps["path"].to_string()));
    event.set(
        "status",
        Value::Int(caps["status"].parse().unwrap_or_default()),
    );

    // "-" means no body was sent; it counts as zero bytes.
    let bytes = match &caps["bytes"] {
        "-" => 0,
        b => b.parse().unwrap_or_default(),
    };
    event.set("bytes", Value::Int(bytes));

    let referer = caps
        .name("referer")
        .map(|m| m.as_str())
        .filter(|s| *s != "-")
        .unwrap_or("");
    event.set("referer", Value::Str(referer.to_string()));

    let ua = caps.name("ua").map(|m| m.as_str()).unwrap_or("");
    event.set("ua", Value::Str(ua.to_string()));

    event.set("format", Value::Str("combined".to_string()));
    event
}

fn parse_error(caps: &regex::Captures<'_>, line: &str, source: &str) -> Event {
    let mut event = Event::new(source).with_raw(line);

    if let Some(ts) = caps.name("time").and_then(|m| timestamp::parse_error_log(m.as_str())) {
        event = event.with_timestamp(ts);
    }

    event.set("level", Value::Str(caps["level"].to_string()));
    event.set("pid", Value::Int(caps["pid"].parse().unwrap_or_default()));
    event.set("tid", Value::Int(caps["tid"].parse().unwrap_or_default()));
    if let Some(conn) = caps.name("conn") {
        event.set("conn", Value::Int(conn.as_str().parse().unwrap_or_default()));
    }

    let message = &caps["message"];
    event.set("message", Value::Str(message.to_string()));
    if let Some(client_ip) = extract_client_ip(message) {
        event.set("client_ip", Value::Str(client_ip));
    }

    event.set("format", Value::Str("error".to_string()));
    event
}

/// Pull the client address out of an error message containing
/// `"client: <ip>,"`.
fn extract_client_ip(message: &str) -> Option<String> {
    let start = message.find("client: ")? + "client: ".len();
    let rest = &message[start..];
    let end = rest.find(',')?;
    let ip = rest[..end].trim();
    (!ip.is_empty()).then(|| ip.to_string())
}
