//! Label tuples and exposition-format escaping.

use std::fmt;

/// The ordered label values identifying one series of a metric.
///
/// Values are stored as a tuple and compared element by element, so
/// `["a,b", "c"]` and `["a", "b,c"]` are distinct series.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LabelValues(Box<[String]>);

impl LabelValues {
    pub fn new(values: &[&str]) -> Self {
        LabelValues(values.iter().map(|v| v.to_string()).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Escapes a label value for the text exposition format.
pub(crate) fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Escapes help text: backslash and newline only.
pub fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Formats `{name="value",...}` for one series, with an optional extra
/// trailing pair (used for histogram `le`).
pub(crate) struct LabelPairs<'a> {
    pub names: &'a [String],
    pub values: &'a LabelValues,
    pub extra: Option<(&'a str, &'a str)>,
}

impl fmt::Display for LabelPairs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.names.is_empty() && self.extra.is_none() {
            return Ok(());
        }
        f.write_str("{")?;
        let mut first = true;
        let pairs = self
            .names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
            .chain(self.extra);
        for (name, value) in pairs {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{}=\"{}\"", name, escape_label_value(value))?;
        }
        f.write_str("}")
    }
}

/// Metric names: `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Label names: `[a-zA-Z_][a-zA-Z0-9_]*`, with the `__` prefix reserved.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
