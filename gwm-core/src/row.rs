use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single observation row.
///
/// Columns differ between variables, so the row keeps the backend's JSON
/// object as-is and callers read fields by name using the column names in
/// [`VariableSpec`](crate::VariableSpec).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Map<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a row from `(field, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// True when the field is missing or JSON null.
    pub fn is_null(&self, field: &str) -> bool {
        matches!(self.0.get(field), None | Some(Value::Null))
    }

    /// Point code as a trimmed, non-empty string.
    ///
    /// Numeric codes are accepted and rendered as text.
    pub fn code(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Numeric value of a field. Numeric strings are accepted; anything
    /// that does not yield a finite number is `None`.
    pub fn number(&self, field: &str) -> Option<f64> {
        let value = match self.0.get(field)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Textual value of a field, with numbers rendered as text.
    /// Empty strings are treated as absent.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Keep only the given columns. An empty projection keeps everything.
    pub fn project(&self, columns: &[String]) -> Row {
        if columns.is_empty() {
            return self.clone();
        }
        Row(columns
            .iter()
            .filter_map(|c| self.0.get(c).map(|v| (c.clone(), v.clone())))
            .collect())
    }
}

impl From<Map<String, Value>> for Row {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}
