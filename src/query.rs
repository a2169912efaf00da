//! Launch parameters from a `?mode=…&subject=…` query string

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Key given without `=`
    Flag,
    Value(String),
}

/// Where the dataset comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Bundled sample dataset
    Umb,
    /// Remote data endpoint, by subject
    Nyu,
}

impl Mode {
    /// Anything other than `umb` selects the remote endpoint
    pub fn from_query_value(value: Option<&str>) -> Self {
        match value {
            Some("umb") => Mode::Umb,
            _ => Mode::Nyu,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Umb => f.write_str("umb"),
            Mode::Nyu => f.write_str("nyu"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub mode: Mode,
    pub subject: Option<String>,
}

impl LaunchParams {
    pub fn from_query(query: &str) -> Self {
        let args = parse_query(query);
        let value = |key: &str| match args.get(key) {
            Some(QueryValue::Value(v)) => Some(v.clone()),
            _ => None,
        };
        Self {
            mode: Mode::from_query_value(value("mode").as_deref()),
            subject: value("subject"),
        }
    }

    /// Query string that launches the viewer with these parameters
    pub fn to_query(&self) -> String {
        format!(
            "?mode={}&subject={}",
            self.mode,
            urlencoding::encode(self.subject.as_deref().unwrap_or_default())
        )
    }
}

/// Split a query string into keys and values.
///
/// A leading `?` is dropped, arguments are percent-decoded, keys without `=`
/// become flags, and a trailing `/` plus surrounding whitespace is stripped.
pub fn parse_query(query: &str) -> HashMap<String, QueryValue> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut parsed = HashMap::new();

    for arg in query.split('&').filter(|a| !a.is_empty()) {
        let decoded = urlencoding::decode(arg)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| arg.to_string());

        match decoded.split_once('=') {
            None => {
                parsed.insert(clean(&decoded), QueryValue::Flag);
            }
            Some((key, rest)) => {
                // Only the text up to a second '=' is kept
                let value = rest.split('=').next().unwrap_or_default();
                parsed.insert(key.trim().to_string(), QueryValue::Value(clean(value)));
            }
        }
    }

    parsed
}

fn clean(s: &str) -> String {
    s.strip_suffix('/').unwrap_or(s).trim().to_string()
}
