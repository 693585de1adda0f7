//! Variable lookup for template rendering.

use chrono::{Local, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Lazily evaluated variable value.
pub type VariableGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Something that resolves variable names to values.
pub trait VariableSource {
    /// Returns the value of `name`, if known.
    fn lookup(&self, name: &str) -> Option<String>;
}

impl VariableSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl VariableSource for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Static values layered over generators.
///
/// A generator runs at most once per scope, so every message in a run sees
/// the same `{{uuid}}` or `{{time}}`.
pub struct VariableScope<'a> {
    values: &'a BTreeMap<String, String>,
    generators: &'a BTreeMap<String, VariableGenerator>,
    cache: Mutex<HashMap<String, String>>,
}

impl<'a> VariableScope<'a> {
    /// Creates a scope.
    #[must_use]
    pub fn new(
        values: &'a BTreeMap<String, String>,
        generators: &'a BTreeMap<String, VariableGenerator>,
    ) -> Self {
        Self {
            values,
            generators,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl VariableSource for VariableScope<'_> {
    fn lookup(&self, name: &str) -> Option<String> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        let make = self.generators.get(name)?;
        let mut cache = self.cache.lock();
        Some(
            cache
                .entry(name.to_string())
                .or_insert_with(|| make())
                .clone(),
        )
    }
}

fn generator(f: impl Fn() -> String + Send + Sync + 'static) -> VariableGenerator {
    Arc::new(f)
}

/// Built-in date, time and id generators.
#[must_use]
pub fn builtin_generators() -> BTreeMap<String, VariableGenerator> {
    BTreeMap::from([
        ("date".to_string(), generator(|| Local::now().format("%Y-%m-%d").to_string())),
        ("time".to_string(), generator(|| Local::now().format("%H:%M:%S").to_string())),
        (
            "datetime".to_string(),
            generator(|| Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        ),
        ("iso".to_string(), generator(|| Utc::now().to_rfc3339())),
        (
            "timestamp".to_string(),
            generator(|| Utc::now().timestamp_millis().to_string()),
        ),
        ("year".to_string(), generator(|| Local::now().format("%Y").to_string())),
        ("month".to_string(), generator(|| Local::now().format("%m").to_string())),
        ("day".to_string(), generator(|| Local::now().format("%d").to_string())),
        ("weekday".to_string(), generator(|| Local::now().format("%A").to_string())),
        (
            "uuid".to_string(),
            generator(|| crate::utils::generate_uuid().to_string()),
        ),
    ])
}

/// Escapes `& < > " '` for HTML contexts.
#[must_use]
pub fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_static_values_win_over_generators() {
        let values = BTreeMap::from([("date".to_string(), "fixed".to_string())]);
        let generators = builtin_generators();
        let scope = VariableScope::new(&values, &generators);
        assert_eq!(scope.lookup("date").as_deref(), Some("fixed"));
    }

    #[test]
    fn test_generator_runs_once_per_scope() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let generators = BTreeMap::from([(
            "n".to_string(),
            generator(move || counter.fetch_add(1, Ordering::SeqCst).to_string()),
        )]);
        let values = BTreeMap::new();
        let scope = VariableScope::new(&values, &generators);

        assert_eq!(scope.lookup("n").as_deref(), Some("0"));
        assert_eq!(scope.lookup("n").as_deref(), Some("0"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scope.lookup("missing"), None);
    }

    #[test]
    fn test_builtin_generator_names() {
        let names: Vec<String> = builtin_generators().into_keys().collect();
        for expected in [
            "date", "datetime", "day", "iso", "month", "time", "timestamp", "uuid", "weekday",
            "year",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_builtin_date_shape() {
        let date = (builtin_generators()["date"])();
        assert_eq!(date.len(), 10);
        assert_eq!(date.matches('-').count(), 2);
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }
}
