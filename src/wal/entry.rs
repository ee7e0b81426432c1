//! WAL record definitions
//!
//! One record per line: `timestamp,key,value[,phase]`.

use std::fmt;
use std::str::FromStr;

/// Phase of a logged write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Logged before the shard is mutated
    Start,

    /// Logged after the shard is mutated
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start" => Ok(Phase::Start),
            "done" => Ok(Phase::Done),
            other => Err(format!("unknown phase {:?}", other)),
        }
    }
}

/// A single record in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Unix seconds when the record was written
    pub timestamp: i64,

    pub key: String,

    pub value: String,

    /// `None` for single-phase records (written by compaction)
    pub phase: Option<Phase>,
}

impl WalRecord {
    pub fn new(timestamp: i64, key: impl Into<String>, value: impl Into<String>, phase: Option<Phase>) -> Self {
        Self {
            timestamp,
            key: key.into(),
            value: value.into(),
            phase,
        }
    }

    /// Serialize to one log line, including the trailing newline
    pub fn encode(&self) -> String {
        let mut line = String::with_capacity(24 + self.key.len() + self.value.len());
        line.push_str(&self.timestamp.to_string());
        line.push(',');
        escape_into(&mut line, &self.key);
        line.push(',');
        escape_into(&mut line, &self.value);
        if let Some(phase) = self.phase {
            line.push(',');
            line.push_str(phase.as_str());
        }
        line.push('\n');
        line
    }

    /// Parse one log line (without its trailing newline)
    ///
    /// The error string describes what was malformed; the caller attaches
    /// the file and line number.
    pub fn decode(line: &str) -> std::result::Result<Self, String> {
        let fields = split_fields(line)?;

        let phase = match fields.len() {
            3 => None,
            4 => Some(fields[3].parse::<Phase>()?),
            n => return Err(format!("expected 3 or 4 fields, found {}", n)),
        };

        let timestamp = fields[0]
            .parse::<i64>()
            .map_err(|e| format!("bad timestamp {:?}: {}", fields[0], e))?;

        let mut fields = fields.into_iter();
        let _ = fields.next();
        let key = fields.next().unwrap_or_default();
        let value = fields.next().unwrap_or_default();

        Ok(Self {
            timestamp,
            key,
            value,
            phase,
        })
    }

    /// Whether `policy`-driven replay should apply this record
    pub fn is_replayable(&self, policy: crate::config::RecoveryPolicy) -> bool {
        use crate::config::RecoveryPolicy;
        match (self.phase, policy) {
            (None, _) => true,
            (Some(Phase::Start), RecoveryPolicy::StartWins) => true,
            (Some(Phase::Done), RecoveryPolicy::DoneWins) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Field escaping
// =============================================================================

/// Escape the separator, the escape char and line breaks.
fn escape_into(out: &mut String, field: &str) {
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

/// Split on unescaped commas, unescaping each field.
fn split_fields(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::with_capacity(4);
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => current.push('\\'),
                Some(',') => current.push(','),
                Some('n') => current.push('\n'),
                Some('r') => current.push('\r'),
                Some(other) => return Err(format!("invalid escape \\{}", other)),
                None => return Err("dangling escape at end of line".to_string()),
            },
            ',' => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);

    Ok(fields)
}
