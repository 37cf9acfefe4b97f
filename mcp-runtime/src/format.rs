//! Text layout shared by every handler.
//!
//! Listings: `Found N <noun>(s):`, a blank line, then one record per entity
//! (`ID: <id> | <label>` plus indented `Key: value | Key: value` lines),
//! records separated by blank lines. Empty listings: `No <plural> found.`
//! Details: `<Resource> Details:` followed by one `Key: value` per line.

use std::fmt::Display;

use chrono::{DateTime, NaiveDateTime};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One entity inside a listing.
#[derive(Debug, Clone)]
pub struct Record {
    lines: Vec<String>,
}

impl Record {
    pub fn new(id: impl Display, label: &str) -> Self {
        Self {
            lines: vec![format!("ID: {id} | {label}")],
        }
    }

    /// Peer fields rendered on one indented line.
    pub fn line<V: Display>(mut self, fields: &[(&str, V)]) -> Self {
        if fields.is_empty() {
            return self;
        }
        let rendered: Vec<String> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        self.lines.push(format!("  {}", rendered.join(" | ")));
        self
    }

    pub fn field(self, key: &str, value: impl Display) -> Self {
        self.line(&[(key, value)])
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn listing(noun: &str, plural: &str, records: &[Record]) -> String {
    if records.is_empty() {
        return empty(plural);
    }
    let body: Vec<String> = records.iter().map(Record::render).collect();
    format!(
        "Found {} {noun}(s):\n\n{}",
        records.len(),
        body.join("\n\n")
    )
}

pub fn empty(plural: &str) -> String {
    format!("No {plural} found.")
}

/// A single-entity block.
#[derive(Debug, Clone)]
pub struct Details {
    lines: Vec<String>,
}

impl Details {
    pub fn new(resource: &str) -> Self {
        Self::with_header(format!("{resource} Details:"))
    }

    /// `<Resource> created successfully!` and friends.
    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            lines: vec![header.into()],
        }
    }

    pub fn field(mut self, key: &str, value: impl Display) -> Self {
        self.lines.push(format!("{key}: {value}"));
        self
    }

    pub fn field_opt(self, key: &str, value: Option<impl Display>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    /// Blank line then a sub-heading.
    pub fn section(mut self, title: &str) -> Self {
        self.lines.push(String::new());
        self.lines.push(format!("{title}:"));
        self
    }

    /// Raw line, indented two spaces.
    pub fn item(mut self, text: impl Display) -> Self {
        self.lines.push(format!("  {text}"));
        self
    }

    pub fn render(self) -> String {
        self.lines.join("\n")
    }
}

/// Normalizes provider timestamps to second precision; unknown shapes pass
/// through untouched.
pub fn timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return "Unknown".to_string();
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.naive_utc().format(TIMESTAMP_FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
            return parsed.format(TIMESTAMP_FORMAT).to_string();
        }
    }
    raw.to_string()
}

/// Operational flags.
pub fn enabled(flag: bool) -> &'static str {
    if flag { "Enabled" } else { "Disabled" }
}

pub fn gb(value: impl Display) -> String {
    format!("{value} GB")
}

pub fn mb(value: impl Display) -> String {
    format!("{value} MB")
}

pub fn conn_per_sec(value: impl Display) -> String {
    format!("{value} conn/sec")
}

/// `[a, b]`, used inside listing records.
pub fn bracketed<S: AsRef<str>>(items: &[S]) -> String {
    format!("[{}]", joined(items))
}

/// `a, b`, or `None` when empty.
pub fn joined<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        return "None".to_string();
    }
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn or_none(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "None",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_layout() {
        let records = vec![
            Record::new(1, "web-1")
                .line(&[("Status", "running"), ("Region", "us-east")])
                .field("IPv4", bracketed(&["192.168.1.1", "10.0.0.1"])),
            Record::new(2, "web-2"),
        ];
        let text = listing("Linode instance", "Linode instances", &records);
        assert_eq!(
            text,
            "Found 2 Linode instance(s):\n\n\
             ID: 1 | web-1\n  Status: running | Region: us-east\n  IPv4: [192.168.1.1, 10.0.0.1]\n\n\
             ID: 2 | web-2"
        );
    }

    #[test]
    fn empty_listing_says_none_found() {
        assert_eq!(listing("volume", "volumes", &[]), "No volumes found.");
    }

    #[test]
    fn details_layout() {
        let text = Details::new("Volume")
            .field("ID", 7)
            .field_opt("Attached To", None::<u64>)
            .field("Size", gb(20))
            .section("Tags")
            .item("prod")
            .render();
        assert_eq!(text, "Volume Details:\nID: 7\nSize: 20 GB\n\nTags:\n  prod");
    }

    #[test]
    fn timestamps_render_to_seconds() {
        assert_eq!(timestamp(Some("2024-01-02T03:04:05")), "2024-01-02T03:04:05");
        assert_eq!(
            timestamp(Some("2024-01-02T03:04:05.123456")),
            "2024-01-02T03:04:05"
        );
        assert_eq!(
            timestamp(Some("2024-01-02T05:04:05+02:00")),
            "2024-01-02T03:04:05"
        );
        assert_eq!(timestamp(Some("yesterday")), "yesterday");
        assert_eq!(timestamp(None), "Unknown");
    }

    #[test]
    fn flags_units_and_lists() {
        assert_eq!(enabled(true), "Enabled");
        assert_eq!(enabled(false), "Disabled");
        assert_eq!(mb(1024), "1024 MB");
        assert_eq!(conn_per_sec(20), "20 conn/sec");
        assert_eq!(joined::<&str>(&[]), "None");
        assert_eq!(bracketed(&["a"]), "[a]");
        assert_eq!(or_none(Some(" ")), "None");
    }
}
