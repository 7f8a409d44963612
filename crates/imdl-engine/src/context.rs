//! Per-render placeholder values.
//!
//! A [`RenderContext`] maps placeholder names to [`ContextValue`]s. Strings
//! added through `From` are coerced: if the text parses as JSON, the parsed
//! value is stringified instead (`"\"hi\""` renders as `hi`, `" 42 "` as
//! `42`), otherwise the raw text is used as-is.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use imdl_compiler::TagKind;
use serde_json::Value;

/// Bound on chains of lazy values returning lazy values.
const MAX_LAZY_CHAIN: usize = 16;

/// Lazily evaluated value, called with the full context at substitution time.
pub type LazyValue = Arc<dyn Fn(&RenderContext) -> ContextValue + Send + Sync>;

/// A placeholder value.
#[derive(Clone)]
pub enum ContextValue {
    /// Structured value, stringified without re-parsing.
    Literal(Value),
    /// Text parsed as JSON when possible, used verbatim otherwise.
    Coerce(String),
    /// Evaluated on every lookup.
    Lazy(LazyValue),
}

impl ContextValue {
    /// Wrap a closure as a lazy value.
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn(&RenderContext) -> ContextValue + Send + Sync + 'static,
    {
        Self::Lazy(Arc::new(f))
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Coerce(raw) => f.debug_tuple("Coerce").field(raw).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::Coerce(value.to_owned())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::Coerce(value)
    }
}

impl From<Value> for ContextValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ContextValue {
                fn from(value: $ty) -> Self {
                    Self::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_from!(bool, i32, i64, u32, u64, f64);

/// Nonce added to reinserted tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Nonce {
    /// Applies to `<script>` tags only.
    Single(String),
    /// Nonce per tag kind.
    PerKind(BTreeMap<TagKind, String>),
}

impl Nonce {
    /// Nonce for tags of `kind`, if any.
    #[must_use]
    pub fn for_kind(&self, kind: TagKind) -> Option<&str> {
        match self {
            Self::Single(nonce) => (kind == TagKind::Script).then_some(nonce.as_str()),
            Self::PerKind(map) => map.get(&kind).map(String::as_str),
        }
    }
}

/// Values and flags for a single render call.
#[derive(Clone, Debug, Default)]
pub struct RenderContext {
    values: BTreeMap<String, ContextValue>,
    nonce: Option<Nonce>,
    no_layout: bool,
}

impl RenderContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Strings are coerced, every other
    /// value is taken literally. Returns `None` for non-objects.
    ///
    /// `nonce` (a string or a per-kind object) sets the nonce, and a true
    /// `noLayout` or `noTemplate` skips the layout. These keys stay available
    /// as placeholder values too.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        let mut ctx = Self::new();
        ctx.nonce = map.get("nonce").and_then(nonce_from_json);
        ctx.no_layout = ["noLayout", "noTemplate"]
            .iter()
            .any(|key| map.get(*key).and_then(Value::as_bool) == Some(true));
        for (key, value) in map {
            let value = match value {
                Value::String(text) => ContextValue::Coerce(text),
                other => ContextValue::Literal(other),
            };
            ctx.values.insert(key, value);
        }
        Some(ctx)
    }

    /// Add a value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Add a lazily evaluated value.
    #[must_use]
    pub fn with_lazy<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RenderContext) -> ContextValue + Send + Sync + 'static,
    {
        self.with(key, ContextValue::lazy(f))
    }

    /// Set the nonce, overriding the engine's configured one.
    #[must_use]
    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Skip layout wrapping for this render.
    #[must_use]
    pub fn with_no_layout(mut self, no_layout: bool) -> Self {
        self.no_layout = no_layout;
        self
    }

    /// Add or replace a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.values.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn nonce(&self) -> Option<&Nonce> {
        self.nonce.as_ref()
    }

    #[must_use]
    pub fn no_layout(&self) -> bool {
        self.no_layout
    }

    /// Resolve `key` to its output text.
    ///
    /// Lazy values are evaluated against this context. Returns `None` when
    /// the key is absent or resolves to `null`.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<String> {
        let mut value = self.values.get(key)?.clone();
        for _ in 0..MAX_LAZY_CHAIN {
            match value {
                ContextValue::Lazy(f) => value = f(self),
                ContextValue::Literal(literal) => return stringify(&literal),
                ContextValue::Coerce(raw) => return coerce(raw),
            }
        }
        tracing::warn!(key, "Lazy value did not settle, leaving placeholder");
        None
    }
}

fn nonce_from_json(value: &Value) -> Option<Nonce> {
    match value {
        Value::String(nonce) => Some(Nonce::Single(nonce.clone())),
        Value::Object(map) => {
            let mut kinds = BTreeMap::new();
            for (kind, nonce) in map {
                match (kind.parse::<TagKind>(), nonce.as_str()) {
                    (Ok(kind), Some(nonce)) => {
                        kinds.insert(kind, nonce.to_owned());
                    }
                    _ => tracing::warn!(kind = kind.as_str(), "Ignoring unknown nonce entry"),
                }
            }
            Some(Nonce::PerKind(kinds))
        }
        _ => None,
    }
}

fn coerce(raw: String) -> Option<String> {
    match serde_json::from_str::<Value>(&raw) {
        Ok(parsed) => stringify(&parsed),
        Err(_) => Some(raw),
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
