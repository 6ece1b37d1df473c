//! Enrichment processors
//!
//! A processor adds fields to a record's `extra` map before it is formatted.
//! Processors are named in configuration by identifier and resolved through a
//! [`ProcessorRegistry`] when the configuration is resolved, so an unknown
//! identifier fails setup rather than a later log call.

use super::error::{AlertError, Result};
use super::log_record::LogRecord;
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub trait Processor: Send {
    fn process(&mut self, record: &mut LogRecord);
    fn name(&self) -> &str;
}

/// Constructor for a registered processor
pub type ProcessorCtor = Arc<dyn Fn() -> Box<dyn Processor> + Send + Sync>;

/// A processor identifier paired with its constructor
#[derive(Clone)]
pub struct ResolvedProcessor {
    name: String,
    ctor: ProcessorCtor,
}

impl ResolvedProcessor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instantiate a fresh processor
    pub fn instantiate(&self) -> Box<dyn Processor> {
        (self.ctor)()
    }
}

impl fmt::Debug for ResolvedProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProcessor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registry mapping identifiers to processor constructors
///
/// # Example
///
/// ```
/// use slack_exception_logger::core::ProcessorRegistry;
///
/// let registry = ProcessorRegistry::with_builtins();
/// let resolved = registry
///     .resolve(&["process_id".to_string(), "uid".to_string(), "process_id".to_string()])
///     .unwrap();
/// assert_eq!(resolved.len(), 2);
///
/// assert!(registry.resolve(&["nope".to_string()]).is_err());
/// ```
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    ctors: HashMap<String, ProcessorCtor>,
}

impl ProcessorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Registry with every built-in processor
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("web", || Box::new(WebProcessor::from_env()));
        registry.register("memory_usage", || Box::new(MemoryUsageProcessor::current()));
        registry.register("memory_peak_usage", || Box::new(MemoryUsageProcessor::peak()));
        registry.register("process_id", || Box::new(ProcessIdProcessor));
        registry.register("uid", || Box::new(UidProcessor::new()));
        registry.register("thread", || Box::new(ThreadProcessor));
        registry
    }

    /// Register a processor under `name`, replacing any previous entry
    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn() -> Box<dyn Processor> + Send + Sync + 'static,
    {
        self.ctors.insert(name.into(), Arc::new(ctor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ctors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve configured identifiers, dropping duplicates and keeping the
    /// first occurrence's position
    pub fn resolve(&self, names: &[String]) -> Result<Vec<ResolvedProcessor>> {
        let mut resolved: Vec<ResolvedProcessor> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim();
            if resolved.iter().any(|p| p.name == name) {
                continue;
            }
            let ctor = self.ctors.get(name).ok_or_else(|| {
                AlertError::config(
                    "processors",
                    format!(
                        "Processor could not be found: {} (known: {})",
                        name,
                        self.names().join(", ")
                    ),
                )
            })?;
            resolved.push(ResolvedProcessor {
                name: name.to_string(),
                ctor: Arc::clone(ctor),
            });
        }
        Ok(resolved)
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Request details from the CGI environment: url, ip, http_method, server, referrer
///
/// Captured once at construction. Records are left untouched outside a
/// request (no `REQUEST_URI`).
#[derive(Debug, Clone)]
pub struct WebProcessor {
    server: HashMap<String, String>,
}

impl WebProcessor {
    const FIELDS: [(&'static str, &'static str); 5] = [
        ("url", "REQUEST_URI"),
        ("ip", "REMOTE_ADDR"),
        ("http_method", "REQUEST_METHOD"),
        ("server", "SERVER_NAME"),
        ("referrer", "HTTP_REFERER"),
    ];

    pub fn from_env() -> Self {
        Self::from_vars(
            Self::FIELDS
                .iter()
                .filter_map(|(_, var)| std::env::var(var).ok().map(|v| (var.to_string(), v))),
        )
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            server: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl Processor for WebProcessor {
    fn process(&mut self, record: &mut LogRecord) {
        if !self.server.contains_key("REQUEST_URI") {
            return;
        }
        for (field, var) in Self::FIELDS {
            record.extra.insert(field, self.server.get(var).cloned());
        }
    }

    fn name(&self) -> &str {
        "web"
    }
}

/// Resident memory (`VmRSS`) or its high-water mark (`VmHWM`) from procfs
#[derive(Debug, Clone)]
pub struct MemoryUsageProcessor {
    field: &'static str,
    status_key: &'static str,
}

impl MemoryUsageProcessor {
    pub fn current() -> Self {
        Self {
            field: "memory_usage",
            status_key: "VmRSS:",
        }
    }

    pub fn peak() -> Self {
        Self {
            field: "memory_peak_usage",
            status_key: "VmHWM:",
        }
    }

    fn read_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_status_kib(&status, self.status_key).map(|kib| kib * 1024)
    }
}

impl Processor for MemoryUsageProcessor {
    fn process(&mut self, record: &mut LogRecord) {
        if let Some(bytes) = self.read_bytes() {
            record.extra.insert(self.field, format_bytes(bytes));
        }
    }

    fn name(&self) -> &str {
        self.field
    }
}

fn parse_status_kib(status: &str, key: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}

/// Human-readable size: `2 MB`, `1.5 KB`, `512 B`
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;

    let bytes_f = bytes as f64;
    let (value, unit) = if bytes_f > MB {
        (bytes_f / MB, "MB")
    } else if bytes_f > KB {
        (bytes_f / KB, "KB")
    } else {
        return format!("{} B", bytes);
    };

    let rounded = format!("{:.2}", value);
    let rounded = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rounded, unit)
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessIdProcessor;

impl Processor for ProcessIdProcessor {
    fn process(&mut self, record: &mut LogRecord) {
        record.extra.insert("process_id", std::process::id());
    }

    fn name(&self) -> &str {
        "process_id"
    }
}

/// Tags every record with the same short random id, so alerts from one
/// process run can be grouped
#[derive(Debug, Clone)]
pub struct UidProcessor {
    uid: String,
}

impl UidProcessor {
    pub fn new() -> Self {
        let value: u32 = rand::thread_rng().gen_range(0..0x1000_0000);
        Self {
            uid: format!("{:07x}", value),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }
}

impl Default for UidProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for UidProcessor {
    fn process(&mut self, record: &mut LogRecord) {
        record.extra.insert("uid", self.uid.as_str());
    }

    fn name(&self) -> &str {
        "uid"
    }
}

/// Name (or id, for unnamed threads) of the thread delivering the record
#[derive(Debug, Clone, Copy)]
pub struct ThreadProcessor;

impl Processor for ThreadProcessor {
    fn process(&mut self, record: &mut LogRecord) {
        let current = std::thread::current();
        let thread = match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        };
        record.extra.insert("thread", thread);
    }

    fn name(&self) -> &str {
        "thread"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldValue, Severity};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_dedups_in_order() {
        let registry = ProcessorRegistry::with_builtins();
        let resolved = registry
            .resolve(&names(&["uid", "web", "uid", "process_id", "web"]))
            .unwrap();
        let order: Vec<&str> = resolved.iter().map(|p| p.name()).collect();
        assert_eq!(order, vec!["uid", "web", "process_id"]);
    }

    #[test]
    fn test_unknown_processor_is_config_error() {
        let registry = ProcessorRegistry::with_builtins();
        let err = registry.resolve(&names(&["uid", "WebProcessor"])).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("Processor could not be found: WebProcessor"));
    }

    #[test]
    fn test_custom_registration() {
        struct Tag;
        impl Processor for Tag {
            fn process(&mut self, record: &mut LogRecord) {
                record.extra.insert("tag", "custom");
            }
            fn name(&self) -> &str {
                "tag"
            }
        }

        let mut registry = ProcessorRegistry::new();
        registry.register("tag", || Box::new(Tag));
        let resolved = registry.resolve(&names(&["tag"])).unwrap();
        let mut record = LogRecord::new(Severity::Info, "x");
        resolved[0].instantiate().process(&mut record);
        assert_eq!(record.extra.get("tag"), Some(&FieldValue::String("custom".into())));
    }

    #[test]
    fn test_web_processor() {
        let mut web = WebProcessor::from_vars([
            ("REQUEST_URI", "/checkout"),
            ("REMOTE_ADDR", "192.168.40.1"),
            ("REQUEST_METHOD", "POST"),
        ]);
        let mut record = LogRecord::new(Severity::Error, "x");
        web.process(&mut record);
        assert_eq!(
            record.extra.to_json(),
            r#"{"url":"/checkout","ip":"192.168.40.1","http_method":"POST","server":null,"referrer":null}"#
        );
    }

    #[test]
    fn test_web_processor_outside_request() {
        let mut web = WebProcessor::from_vars(Vec::<(String, String)>::new());
        let mut record = LogRecord::new(Severity::Error, "x");
        web.process(&mut record);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_uid_is_stable_per_instance() {
        let mut uid = UidProcessor::new();
        assert_eq!(uid.uid().len(), 7);
        let mut a = LogRecord::new(Severity::Info, "a");
        let mut b = LogRecord::new(Severity::Info, "b");
        uid.process(&mut a);
        uid.process(&mut b);
        assert_eq!(a.extra.get("uid"), b.extra.get("uid"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024 + 1), "2 MB");
    }

    #[test]
    fn test_parse_status() {
        let status = "Name:\tapp\nVmHWM:\t  20480 kB\nVmRSS:\t  10240 kB\n";
        assert_eq!(parse_status_kib(status, "VmRSS:"), Some(10240));
        assert_eq!(parse_status_kib(status, "VmHWM:"), Some(20480));
        assert_eq!(parse_status_kib(status, "VmSwap:"), None);
    }

    #[test]
    fn test_process_id_and_thread() {
        let mut record = LogRecord::new(Severity::Info, "x");
        ProcessIdProcessor.process(&mut record);
        ThreadProcessor.process(&mut record);
        assert_eq!(
            record.extra.get("process_id"),
            Some(&FieldValue::Int(std::process::id() as i64))
        );
        assert!(record.extra.get("thread").is_some());
    }
}
