//! Key/value configuration accessor.
//!
//! Keys are dotted paths into nested tables (`grpc.port` → `[grpc] port = ...`).
//! An unloaded source answers every lookup with the zero value of the requested type.

use toml::{Table, Value};

/// Read-only access to configuration values by dotted key.
pub trait ConfigSource: Send + Sync {
    /// Raw value at `key`, if present.
    fn get(&self, key: &str) -> Option<Value>;

    /// Whether a configuration document has been loaded.
    fn is_loaded(&self) -> bool;

    fn get_int(&self, key: &str) -> i64 {
        self.get_int_or(key, 0)
    }

    fn get_string(&self, key: &str) -> String {
        self.get_string_or(key, "")
    }

    fn get_bool(&self, key: &str) -> bool {
        self.get_bool_or(key, false)
    }

    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(Value::Integer(i)) => i,
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    fn get_string_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s,
            Some(Value::Integer(i)) => i.to_string(),
            Some(Value::Boolean(b)) => b.to_string(),
            _ => default.to_string(),
        }
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Boolean(b)) => b,
            Some(Value::String(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// `app.env == "prod"`.
    fn is_prod_env(&self) -> bool {
        self.get_string("app.env") == "prod"
    }
}

/// TOML-backed [`ConfigSource`].
#[derive(Debug, Clone, Default)]
pub struct TomlConfig {
    root: Table,
    loaded: bool,
}

impl TomlConfig {
    /// A source with nothing loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_table(root: Table) -> Self {
        Self { root, loaded: true }
    }

    /// Parse a TOML document.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let root: Table = toml::from_str(content)?;
        Ok(Self::from_table(root))
    }

    /// Override a value at a dotted key, creating intermediate tables.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let mut segments: Vec<&str> = key.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };

        let mut table = &mut self.root;
        for segment in segments {
            let entry = table
                .entry(segment.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(Table::new());
            }
            let Value::Table(next) = entry else {
                return;
            };
            table = next;
        }
        table.insert(last.to_string(), value.into());
        self.loaded = true;
    }
}

impl ConfigSource for TomlConfig {
    fn get(&self, key: &str) -> Option<Value> {
        if !self.loaded {
            return None;
        }

        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current.clone())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}
