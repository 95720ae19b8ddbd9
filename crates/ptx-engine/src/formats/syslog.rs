//! Syslog parser covering RFC5424 and the historical BSD shape.
//!
//! - RFC5424: `<PRI>1 TIMESTAMP HOSTNAME APPNAME PROCID MSGID SD MSG`
//! - BSD: `Mon DD HH:MM:SS host program[pid]: message`, with or without a
//!   leading `<PRI>`.
//!
//! PRI decomposes as `facility = PRI / 8`, `severity = PRI % 8`, mapped
//! through the fixed RFC5424 §6.2.1 tables.

use std::sync::LazyLock;

use regex::Regex;

use crate::event::Event;
use crate::formats::LineParser;
use crate::timestamp;
use crate::value::Value;

/// Facility names, indexed by `PRI / 8`.
const FACILITIES: [&str; 24] = [
    "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "cron", "authpriv",
    "ftp", "ntp", "audit", "alert", "clock", "local0", "local1", "local2", "local3", "local4",
    "local5", "local6", "local7",
];

/// Severity names, indexed by `PRI % 8`.
const SEVERITIES: [&str; 8] = [
    "emerg", "alert", "crit", "err", "warning", "notice", "info", "debug",
];

static BSD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<stamp>[A-Z][a-z]{2}\s+\d{1,2}\s\d{2}:\d{2}:\d{2})
        \s(?P<host>\S+)
        \s(?P<program>[^\s\[:]+)(?:\[(?P<pid>\d+)\])?:
        \s?(?P<message>.*)$",
    )
    .expect("BSD syslog pattern is valid")
});

/// Parser for RFC5424 and BSD syslog lines.
pub struct SyslogParser;

impl LineParser for SyslogParser {
    fn format_name(&self) -> &str {
        "syslog"
    }

    fn can_parse(&self, line: &str) -> bool {
        split_pri(line).is_some() || BSD_RE.is_match(line)
    }

    fn parse(&self, line: &str, source: &str) -> Option<Event> {
        if let Some((pri, rest)) = split_pri(line) {
            // `<PRI>1 ` introduces RFC5424; anything else after a PRI is
            // treated as a BSD body.
            if let Some(rfc_body) = rest.strip_prefix("1 ") {
                return Some(parse_rfc5424(pri, rfc_body, line, source));
            }
            return parse_bsd(Some(pri), rest, line, source);
        }
        parse_bsd(None, line, line, source)
    }
}

/// Split a leading `<PRI>` off the line. PRI is 1-3 digits (0-191).
fn split_pri(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix('<')?;
    let end = rest.find('>')?;
    if end == 0 || end > 3 {
        return None;
    }
    let pri: u32 = rest[..end].parse().ok()?;
    if pri > 191 {
        return None;
    }
    Some((pri, &rest[end + 1..]))
}

fn set_pri_fields(event: &mut Event, pri: u32) {
    let facility = (pri / 8) as usize;
    let severity = (pri % 8) as usize;
    event.set("priority", Value::Int(pri as i64));
    if let Some(name) = FACILITIES.get(facility) {
        event.set("facility", Value::Str((*name).to_string()));
    }
    event.set("severity", Value::Str(SEVERITIES[severity].to_string()));
}

fn parse_rfc5424(pri: u32, body: &str, line: &str, source: &str) -> Event {
    let mut event = Event::new(source).with_raw(line);
    set_pri_fields(&mut event, pri);
    event.set("format", Value::Str("rfc5424".to_string()));

    let mut parts = body.splitn(6, ' ');
    let stamp = parts.next().unwrap_or("-");
    let hostname = parts.next().unwrap_or("-");
    let appname = parts.next().unwrap_or("-");
    let procid = parts.next().unwrap_or("-");
    let msgid = parts.next().unwrap_or("-");
    let rest = parts.next().unwrap_or("");

    if let Some(ts) = timestamp::parse_iso(stamp) {
        event = event.with_timestamp(ts);
    }
    for (name, part) in [
        ("hostname", hostname),
        ("appname", appname),
        ("procid", procid),
        ("msgid", msgid),
    ] {
        if part != "-" {
            event.set(name, Value::Str(part.to_string()));
        }
    }

    let (sd, message) = split_structured_data(rest);
    if let Some(sd) = sd {
        event.set("sd", Value::Str(sd.to_string()));
    }
    event.set("message", Value::Str(message.to_string()));

    event
}

/// Split `rest` into the structured-data element(s) and the free-form
/// message. SD is either `-` or one or more `[...]` groups; `\]` inside a
/// group does not terminate it.
fn split_structured_data(rest: &str) -> (Option<&str>, &str) {
    if let Some(msg) = rest.strip_prefix("- ") {
        return (None, msg);
    }
    if rest == "-" {
        return (None, "");
    }
    if !rest.starts_with('[') {
        return (None, rest);
    }

    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i] == b'[' {
        i += 1;
        let mut escaped = false;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if !escaped => escaped = true,
                b']' if !escaped => break,
                _ => escaped = false,
            }
            i += 1;
        }
        i += 1; // past ']'
    }

    let sd = &rest[..i.min(rest.len())];
    let message = rest.get(i..).unwrap_or("").trim_start();
    (Some(sd), message)
}

fn parse_bsd(pri: Option<u32>, body: &str, line: &str, source: &str) -> Option<Event> {
    let caps = BSD_RE.captures(body)?;

    let mut event = Event::new(source).with_raw(line);
    if let Some(pri) = pri {
        set_pri_fields(&mut event, pri);
    }
    event.set("format", Value::Str("bsd".to_string()));

    if let Some(ts) = timestamp::parse_bsd(&caps["stamp"]) {
        event = event.with_timestamp(ts);
    }
    event.set("host", Value::Str(caps["host"].to_string()));
    event.set("program", Value::Str(caps["program"].to_string()));
    if let Some(pid) = caps.name("pid") {
        event.set("pid", Value::Int(pid.as_str().parse().unwrap_or_default()));
    }
    event.set("message", Value::Str(caps["message"].to_string()));

    Some(event)
}
