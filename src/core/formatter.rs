//! Template-driven line formatting
//!
//! Renders a [`LogRecord`] into a single line of Slack text. Templates use
//! `%placeholder%` tokens:
//!
//! - `%datetime%`: record timestamp, rendered with the date format and timezone
//! - `%message%`: the record message
//! - `%context%` / `%extra%`: compact JSON of the field maps, or nothing when empty
//! - `%context.KEY%` / `%extra.KEY%`: a single field value
//! - `%channel%`, `%level_name%`, `%level%`
//!
//! Templates and date formats are validated once, when the formatter is
//! built. Formatting itself cannot fail.

use super::error::{AlertError, Result};
use super::fields::Fields;
use super::log_record::LogRecord;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use std::fmt;
use std::str::FromStr;

/// Default message template
pub const DEFAULT_MESSAGE_FORMAT: &str = "[%datetime%] %message% %context% %extra%";

/// Default date format (PHP `date()` letters)
pub const DEFAULT_DATE_FORMAT: &str = "Y-m-d H:i:s";

/// Timezone used to render `%datetime%`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timezone {
    #[default]
    Utc,
    Local,
    Named(chrono_tz::Tz),
}

impl FromStr for Timezone {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "UTC" | "utc" | "Z" => Ok(Timezone::Utc),
            "Local" | "local" => Ok(Timezone::Local),
            name => name
                .parse::<chrono_tz::Tz>()
                .map(Timezone::Named)
                .map_err(|_| AlertError::config("timezone", format!("Unknown timezone: '{}'", name))),
        }
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timezone::Utc => write!(f, "UTC"),
            Timezone::Local => write!(f, "Local"),
            Timezone::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// A validated strftime pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
}

impl DateFormat {
    /// Parse a date format.
    ///
    /// Formats containing `%` are taken as strftime. Anything else is read as
    /// PHP `date()` letters (`Y-m-d H:i:s`), where a backslash escapes a
    /// literal character.
    ///
    /// # Examples
    ///
    /// ```
    /// use slack_exception_logger::core::DateFormat;
    ///
    /// let format = DateFormat::parse("Y-m-d H:i:s").unwrap();
    /// assert_eq!(format.pattern(), "%Y-%m-%d %H:%M:%S");
    ///
    /// let format = DateFormat::parse("%d/%b/%Y").unwrap();
    /// assert_eq!(format.pattern(), "%d/%b/%Y");
    /// ```
    pub fn parse(format: &str) -> Result<Self> {
        let pattern = if format.contains('%') {
            format.to_string()
        } else {
            translate_php_date(format)?
        };

        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(AlertError::config(
                "dateFormat",
                format!("Invalid date format: '{}'", format),
            ));
        }

        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn format(&self, datetime: &DateTime<Utc>, timezone: &Timezone) -> String {
        match timezone {
            Timezone::Utc => datetime.format(&self.pattern).to_string(),
            Timezone::Local => datetime.with_timezone(&Local).format(&self.pattern).to_string(),
            Timezone::Named(tz) => datetime.with_timezone(tz).format(&self.pattern).to_string(),
        }
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            pattern: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

/// Map PHP `date()` letters to strftime. Letters with no strftime
/// equivalent (`S`, `z`, `t`, `L`, `B`, `I`, `Z`, ...) are rejected rather
/// than printed verbatim.
fn translate_php_date(format: &str) -> Result<String> {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let mapped = match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                continue;
            }
            'Y' => "%Y",
            'y' => "%y",
            'm' => "%m",
            'n' => "%-m",
            'd' => "%d",
            'j' => "%-d",
            'H' => "%H",
            'G' => "%-H",
            'h' => "%I",
            'g' => "%-I",
            'i' => "%M",
            's' => "%S",
            'u' => "%6f",
            'v' => "%3f",
            'A' => "%p",
            'a' => "%P",
            'D' => "%a",
            'l' => "%A",
            'M' => "%b",
            'F' => "%B",
            'N' => "%u",
            'U' => "%s",
            'e' | 'T' => "%Z",
            'P' => "%:z",
            'O' => "%z",
            'w' => "%w",
            'W' => "%V",
            'o' => "%G",
            'c' => "%Y-%m-%dT%H:%M:%S%:z",
            'r' => "%a, %d %b %Y %H:%M:%S %z",
            other if other.is_ascii_alphabetic() => {
                return Err(AlertError::config(
                    "dateFormat",
                    format!(
                        "Unsupported date format character '{}' in '{}'; escape it with a backslash for a literal",
                        other, format
                    ),
                ));
            }
            other => {
                out.push(other);
                continue;
            }
        };
        out.push_str(mapped);
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Datetime,
    Message,
    Context,
    Extra,
    Channel,
    LevelName,
    Level,
    ContextKey(String),
    ExtraKey(String),
}

impl Segment {
    fn is_field_map(&self) -> bool {
        matches!(self, Segment::Context | Segment::Extra)
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        literal.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let name = after.find('%').map(|end| &after[..end]);
        let Some(name) = name.filter(|n| is_placeholder_name(n)) else {
            literal.push('%');
            rest = after;
            continue;
        };

        let segment = match name {
            "datetime" => Segment::Datetime,
            "message" => Segment::Message,
            "context" => Segment::Context,
            "extra" => Segment::Extra,
            "channel" => Segment::Channel,
            "level_name" => Segment::LevelName,
            "level" => Segment::Level,
            _ => match name.split_once('.') {
                Some(("context", key)) if !key.is_empty() => Segment::ContextKey(key.to_string()),
                Some(("extra", key)) if !key.is_empty() => Segment::ExtraKey(key.to_string()),
                _ => {
                    return Err(AlertError::config(
                        "messageFormat",
                        format!("Unknown placeholder '%{}%' in '{}'", name, template),
                    ))
                }
            },
        };

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(segment);
        rest = &after[name.len() + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Formatter turning records into single Slack lines
///
/// # Example
///
/// ```
/// use slack_exception_logger::core::{LineFormatter, LogRecord, Severity, Timezone};
///
/// let formatter = LineFormatter::new("%level_name%: %message% %context%", "Y-m-d", Timezone::Utc, false)
///     .expect("valid template");
///
/// let line = formatter.format(&LogRecord::new(Severity::Error, "disk full"));
/// assert_eq!(line, "ERROR: disk full");
/// ```
#[derive(Debug, Clone)]
pub struct LineFormatter {
    template: String,
    segments: Vec<Segment>,
    date_format: DateFormat,
    timezone: Timezone,
    include_stack_trace: bool,
}

impl LineFormatter {
    /// Build a formatter, validating the template and date format
    pub fn new(
        template: &str,
        date_format: &str,
        timezone: Timezone,
        include_stack_trace: bool,
    ) -> Result<Self> {
        Ok(Self {
            template: template.to_string(),
            segments: parse_template(template)?,
            date_format: DateFormat::parse(date_format)?,
            timezone,
            include_stack_trace,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn includes_stack_trace(&self) -> bool {
        self.include_stack_trace
    }

    /// Render a record
    pub fn format(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(self.template.len() + record.message.len() + 32);
        let mut skip_space = false;

        for segment in &self.segments {
            let rendered = match segment {
                Segment::Literal(text) => {
                    let text = if skip_space {
                        text.strip_prefix(' ').unwrap_or(text)
                    } else {
                        text
                    };
                    out.push_str(text);
                    skip_space = false;
                    continue;
                }
                Segment::Datetime => self.date_format.format(&record.timestamp, &self.timezone),
                Segment::Message => self.message_text(&record.message),
                Segment::Context => render_fields(&self.context_with_error(record)),
                Segment::Extra => render_fields(&record.extra),
                Segment::Channel => record.channel.clone(),
                Segment::LevelName => record.severity.to_str().to_string(),
                Segment::Level => record.severity.rank().to_string(),
                Segment::ContextKey(key) => record
                    .context
                    .get(key)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                Segment::ExtraKey(key) => record
                    .extra
                    .get(key)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            };
            skip_space = segment.is_field_map() && rendered.is_empty();
            out.push_str(&rendered);
        }

        let mut line = out.trim().to_string();

        if self.include_stack_trace {
            if let Some(backtrace) = record.error.as_ref().and_then(|e| e.backtrace.as_deref()) {
                line.push_str("\n[stacktrace]\n");
                line.push_str(backtrace.trim_end());
            }
        }

        line
    }

    fn message_text(&self, message: &str) -> String {
        if self.include_stack_trace {
            message.to_string()
        } else {
            message.replace("\r\n", " ").replace(['\r', '\n'], " ")
        }
    }

    fn context_with_error(&self, record: &LogRecord) -> Fields {
        match &record.error {
            Some(error) if record.context.get("exception").is_none() => {
                let mut context = record.context.clone();
                context.insert("exception", error.summary());
                context
            }
            _ => record.context.clone(),
        }
    }
}

impl Default for LineFormatter {
    fn default() -> Self {
        Self {
            template: DEFAULT_MESSAGE_FORMAT.to_string(),
            segments: vec![
                Segment::Literal("[".into()),
                Segment::Datetime,
                Segment::Literal("] ".into()),
                Segment::Message,
                Segment::Literal(" ".into()),
                Segment::Context,
                Segment::Literal(" ".into()),
                Segment::Extra,
            ],
            date_format: DateFormat::default(),
            timezone: Timezone::Utc,
            include_stack_trace: false,
        }
    }
}

fn render_fields(fields: &Fields) -> String {
    if fields.is_empty() {
        String::new()
    } else {
        fields.to_json()
    }
}

/// Format a record with a one-off template, rendering timestamps in UTC
pub fn format(
    entry: &LogRecord,
    template: &str,
    date_format: &str,
    include_stack_trace: bool,
) -> Result<String> {
    let formatter = LineFormatter::new(template, date_format, Timezone::Utc, include_stack_trace)?;
    Ok(formatter.format(entry))
}
