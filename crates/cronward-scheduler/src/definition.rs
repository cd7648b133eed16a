//! Job definition files.
//!
//! A definition is a small INI document with exactly one section named after
//! the file:
//!
//! ```text
//! # /etc/cronward/jobs.d/backup.conf
//! [backup]
//! type = maintenance
//! schedule = 0 2 * * *
//! owner = alice
//! plugin_name = rsync_backup
//! kwargs = {'path': '/data', 'keep': 7, 'mail': True}
//! enabled = true
//! autostart = true
//! ```
//!
//! Keys are case-insensitive and may use `=` or `:`. Lines starting with `#`
//! or `;` are comments; indented lines continue the previous value.

use cronward_core::{Kwargs, Value};
use std::path::{Path, PathBuf};

use crate::cron::CronSchedule;
use crate::error::{Result, SchedulerError};

const REQUIRED_KEYS: [&str; 7] = [
    "type",
    "schedule",
    "owner",
    "plugin_name",
    "kwargs",
    "enabled",
    "autostart",
];

/// A validated job definition, ready to be added to the store.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    pub name: String,
    pub job_type: String,
    pub schedule: CronSchedule,
    pub owner: String,
    pub plugin_name: String,
    pub kwargs: Kwargs,
    /// Whether the job starts out enabled once added.
    pub enabled: bool,
    /// Whether the startup import picks this file up at all.
    pub autostart: bool,
    pub path: PathBuf,
}

impl JobDefinition {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::InvalidDefinition(format!(
                "Cannot read job file: '{}': {e}",
                path.display()
            ))
        })?;
        Self::parse(&text, path)
    }

    /// Parse definition text. `path` names the file the text came from; its
    /// stem must equal the section name.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut sections = parse_ini(text, path)?;
        if sections.len() != 1 {
            return Err(SchedulerError::InvalidDefinition(
                "Cannot have more (or less) than one [section] in job config file.".to_string(),
            ));
        }
        let section = sections.remove(0);

        let stem = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split('.').next())
            .unwrap_or_default();
        if section.name != stem {
            return Err(SchedulerError::InvalidDefinition(format!(
                "Filename: {} (minus .conf) must match header name: [{}]",
                path.display(),
                section.name
            )));
        }

        for key in REQUIRED_KEYS {
            if section.get(key).is_none() {
                return Err(SchedulerError::InvalidDefinition(format!(
                    "Missing one or more attributes '[{key}]' in job config file."
                )));
            }
        }
        let field = |key: &str| section.get(key).unwrap_or_default().to_string();

        let schedule = CronSchedule::parse(&field("schedule"))?;
        let kwargs = parse_kwargs(&field("kwargs")).map_err(|why| {
            SchedulerError::InvalidDefinition(format!(
                "Job file: '{}': kwargs parse error: {why}. Keys and string values must be \
                 quoted, e.g. {{'keyname': 'value', 'mail': True}}",
                path.display()
            ))
        })?;

        Ok(Self {
            job_type: field("type"),
            owner: field("owner"),
            plugin_name: field("plugin_name"),
            enabled: parse_bool("enabled", &field("enabled"), path)?,
            autostart: parse_bool("autostart", &field("autostart"), path)?,
            name: section.name,
            schedule,
            kwargs,
            path: path.to_path_buf(),
        })
    }
}

struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    /// Last assignment wins.
    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_ini(text: &str, path: &Path) -> Result<Vec<Section>> {
    let malformed = |line_no: usize| {
        SchedulerError::InvalidDefinition(format!(
            "Config file: '{}' is not in correct format (line {line_no})",
            path.display()
        ))
    };

    let mut sections: Vec<Section> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        // Continuation of the previous value.
        if raw.starts_with(char::is_whitespace) {
            if let Some((_, value)) = sections.last_mut().and_then(|s| s.entries.last_mut()) {
                value.push('\n');
                value.push_str(line);
                continue;
            }
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| malformed(idx + 1))?;
            sections.push(Section {
                name: name.to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        let section = sections.last_mut().ok_or_else(|| malformed(idx + 1))?;
        let split = line.find(['=', ':']).ok_or_else(|| malformed(idx + 1))?;
        let key = line[..split].trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(malformed(idx + 1));
        }
        let value = line[split + 1..].trim().to_string();
        section.entries.push((key, value));
    }
    Ok(sections)
}

fn parse_bool(key: &str, value: &str, path: &Path) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(SchedulerError::InvalidDefinition(format!(
            "Job file: '{}': '{key}' must be true or false, got '{value}'",
            path.display()
        ))),
    }
}

/// Parse a literal mapping such as `{'path': '/data', "keep": 7, 'mail': True}`.
///
/// Keys are quoted strings. Values are quoted strings, integers, or the
/// booleans `True`/`False` (lower case accepted too).
pub fn parse_kwargs(text: &str) -> std::result::Result<Kwargs, String> {
    let mut p = Literal {
        chars: text.chars().collect(),
        pos: 0,
    };
    let mut kwargs = Kwargs::new();

    p.skip_ws();
    p.expect('{')?;
    loop {
        p.skip_ws();
        if p.eat('}') {
            break;
        }
        let key = p.string()?;
        p.skip_ws();
        p.expect(':')?;
        p.skip_ws();
        let value = p.value()?;
        kwargs.insert(key, value);

        p.skip_ws();
        if p.eat(',') {
            continue;
        }
        p.expect('}')?;
        break;
    }
    p.skip_ws();
    if let Some(c) = p.peek() {
        return Err(format!("unexpected '{c}' after closing brace"));
    }
    Ok(kwargs)
}

struct Literal {
    chars: Vec<char>,
    pos: usize,
}

impl Literal {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> std::result::Result<(), String> {
        match self.peek() {
            Some(found) if found == c => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(format!("expected '{c}', found '{found}'")),
            None => Err(format!("expected '{c}', found end of input")),
        }
    }

    fn string(&mut self) -> std::result::Result<String, String> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            Some(c) => return Err(format!("expected a quoted string, found '{c}'")),
            None => return Err("expected a quoted string, found end of input".to_string()),
        };
        self.pos += 1;

        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err("unterminated string".to_string()),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(c @ ('\\' | '\'' | '"')) => c,
                        Some(c) => return Err(format!("unsupported escape '\\{c}'")),
                        None => return Err("unterminated string".to_string()),
                    };
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn value(&mut self) -> std::result::Result<Value, String> {
        match self.peek() {
            Some('\'' | '"') => self.string().map(Value::String),
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => self.integer(),
            Some(c) if c.is_ascii_alphabetic() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                    self.pos += 1;
                }
                let word: String = self.chars[start..self.pos].iter().collect();
                match word.as_str() {
                    "True" | "true" => Ok(Value::Bool(true)),
                    "False" | "false" => Ok(Value::Bool(false)),
                    _ => Err(format!("unsupported value '{word}'")),
                }
            }
            Some(c) => Err(format!("unsupported value starting with '{c}'")),
            None => Err("expected a value, found end of input".to_string()),
        }
    }

    fn integer(&mut self) -> std::result::Result<Value, String> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos].iter().collect();
        if self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '.') {
            return Err(format!("unsupported number starting '{token}'"));
        }
        token
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("invalid integer '{token}'"))
    }
}
