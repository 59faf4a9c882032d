//! Dynamic values flowing through templates.
//!
//! [`Value`] is the closed set of data kinds a template can see. Hosts that
//! want to expose their own objects without converting them up front
//! implement [`ValueObject`] and wrap them in [`Value::Extension`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use liquid_rs_core::error::LiquidError;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A string-keyed map of values with deterministic (sorted) key order.
pub type Object = BTreeMap<String, Value>;

/// A host object exposed to templates.
///
/// The renderer only ever asks an extension whether it behaves like an array
/// or a map and reads from it through the accessors below; every method has
/// a default so an implementation only fills in what it supports.
pub trait ValueObject: fmt::Debug + Send + Sync {
    /// A short name for diagnostics (e.g. `"user"`).
    fn type_name(&self) -> &'static str;

    /// Whether [`length`](Self::length) and [`at`](Self::at) are meaningful.
    fn is_array(&self) -> bool {
        false
    }

    /// Whether [`property_names`](Self::property_names) and
    /// [`property`](Self::property) are meaningful.
    fn is_map(&self) -> bool {
        false
    }

    /// Number of elements (array-like) or properties (map-like).
    fn length(&self) -> usize {
        0
    }

    /// Element at `index`, or `Null` when out of range.
    fn at(&self, _index: usize) -> Value {
        Value::Null
    }

    /// Property names in a stable order.
    fn property_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Property named `name`, or `Null` when absent.
    fn property(&self, _name: &str) -> Value {
        Value::Null
    }
}

/// A dynamically-typed template value.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::value::Value;
///
/// let v = Value::from(vec![1, 2, 3]);
/// assert_eq!(v.length(), Some(3));
/// assert!(v.is_truthy());
/// assert!(!Value::Null.is_truthy());
/// ```
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Double(f64),
    /// A UTF-8 string.
    String(String),
    /// An ordered list of values.
    Array(Vec<Value>),
    /// A string-keyed map.
    Map(Object),
    /// A host-provided object.
    Extension(Arc<dyn ValueObject>),
}

impl Value {
    /// Returns a short name for the kind of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Extension(ext) => ext.type_name(),
        }
    }

    /// Returns `true` for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for arrays and array-like extensions.
    pub fn is_array(&self) -> bool {
        match self {
            Self::Array(_) => true,
            Self::Extension(ext) => ext.is_array(),
            _ => false,
        }
    }

    /// Returns `true` for maps and map-like extensions.
    pub fn is_map(&self) -> bool {
        match self {
            Self::Map(_) => true,
            Self::Extension(ext) => ext.is_map() && !ext.is_array(),
            _ => false,
        }
    }

    /// Converts this value to a boolean for conditions.
    ///
    /// Booleans are themselves, integers are truthy when nonzero, and every
    /// other kind is truthy unless it is `Null`. Empty strings, arrays, and
    /// maps are therefore truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Null => false,
            _ => true,
        }
    }

    /// Returns the boolean if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a float for either numeric kind.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the string contents if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map if this is a `Map`.
    pub fn as_map(&self) -> Option<&Object> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the elements of an array or array-like extension.
    pub fn to_array(&self) -> Option<Vec<Value>> {
        match self {
            Self::Array(items) => Some(items.clone()),
            Self::Extension(ext) if ext.is_array() => {
                Some((0..ext.length()).map(|i| ext.at(i)).collect())
            }
            _ => None,
        }
    }

    /// Returns the sorted property names of a map or map-like extension.
    pub fn property_names(&self) -> Option<Vec<String>> {
        match self {
            Self::Map(m) => Some(m.keys().cloned().collect()),
            Self::Extension(ext) if ext.is_map() => {
                let mut names = ext.property_names();
                names.sort();
                Some(names)
            }
            _ => None,
        }
    }

    /// Number of elements, properties, or characters.
    ///
    /// Returns `None` for scalars and opaque extensions.
    pub fn length(&self) -> Option<usize> {
        match self {
            Self::String(s) => Some(s.chars().count()),
            Self::Array(items) => Some(items.len()),
            Self::Map(m) => Some(m.len()),
            Self::Extension(ext) if ext.is_array() || ext.is_map() => Some(ext.length()),
            _ => None,
        }
    }

    /// Element at `index` of an array-like value; `Null` when out of range
    /// or when this is not array-like.
    pub fn at(&self, index: i64) -> Self {
        let Ok(index) = usize::try_from(index) else {
            return Self::Null;
        };
        match self {
            Self::Array(items) => items.get(index).cloned().unwrap_or_default(),
            Self::Extension(ext) if ext.is_array() && index < ext.length() => ext.at(index),
            _ => Self::Null,
        }
    }

    /// Property `name` of a map-like value; `Null` when absent or when this
    /// is not map-like.
    pub fn property(&self, name: &str) -> Self {
        match self {
            Self::Map(m) => m.get(name).cloned().unwrap_or_default(),
            Self::Extension(ext) if ext.is_map() => ext.property(name),
            _ => Self::Null,
        }
    }

    /// Renders this value as output text.
    ///
    /// `Null` is empty, strings are verbatim, and integer-valued doubles keep
    /// one decimal place. Arrays and maps are written as JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Double(d) => {
                if d.is_finite() && d.fract() == 0.0 {
                    format!("{d:.1}")
                } else {
                    d.to_string()
                }
            }
            Self::String(s) => s.clone(),
            Self::Array(_) | Self::Map(_) | Self::Extension(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Position of this kind in the cross-type ordering.
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Double(_) => 3,
            Self::String(_) => 4,
            v if v.is_array() => 5,
            v if v.is_map() => 6,
            _ => 7,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

/// Three-way comparison used by the relational operators.
///
/// `Int` and `Double` compare numerically with each other, with NaN equal
/// only to NaN and greater than every other number. Any other pair of
/// differing kinds is ordered by a fixed kind rank, which is stable but not
/// meaningful. Arrays compare by length and then element-wise; maps compare
/// by property count, then by sorted key and value.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use liquid_rs_template::value::{compare, Value};
///
/// assert_eq!(compare(&Value::Int(2), &Value::Double(2.0)), Ordering::Equal);
/// assert_eq!(compare(&Value::from("a"), &Value::from("b")), Ordering::Less);
/// ```
pub fn compare(lhs: &Value, rhs: &Value) -> Ordering {
    if std::ptr::eq(lhs, rhs) {
        return Ordering::Equal;
    }

    match (lhs, rhs) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            let (a, b) = (lhs.as_double().unwrap_or(0.0), rhs.as_double().unwrap_or(0.0));
            compare_doubles(a, b)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Extension(a), Value::Extension(b)) if Arc::ptr_eq(a, b) => Ordering::Equal,
        _ => match lhs.rank().cmp(&rhs.rank()) {
            Ordering::Equal if lhs.is_array() => compare_arrays(lhs, rhs),
            Ordering::Equal if lhs.is_map() => compare_maps(lhs, rhs),
            Ordering::Equal => lhs.type_name().cmp(rhs.type_name()),
            other => other,
        },
    }
}

/// NaN equals itself and sorts above every number; `0.0 == -0.0`.
fn compare_doubles(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

fn compare_arrays(lhs: &Value, rhs: &Value) -> Ordering {
    let (a, b) = (lhs.to_array().unwrap_or_default(), rhs.to_array().unwrap_or_default());
    a.len().cmp(&b.len()).then_with(|| {
        a.iter()
            .zip(&b)
            .map(|(x, y)| compare(x, y))
            .find(|c| c.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

fn compare_maps(lhs: &Value, rhs: &Value) -> Ordering {
    let a = lhs.property_names().unwrap_or_default();
    let b = rhs.property_names().unwrap_or_default();
    a.len().cmp(&b.len()).then_with(|| {
        for (ka, kb) in a.iter().zip(&b) {
            let c = ka
                .cmp(kb)
                .then_with(|| compare(&lhs.property(ka), &rhs.property(kb)));
            if c.is_ne() {
                return c;
            }
        }
        Ordering::Equal
    })
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Double(d) => serializer.serialize_f64(*d),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => items.serialize(serializer),
            Self::Map(m) => m.serialize(serializer),
            Self::Extension(ext) if ext.is_array() => {
                let mut seq = serializer.serialize_seq(Some(ext.length()))?;
                for i in 0..ext.length() {
                    seq.serialize_element(&ext.at(i))?;
                }
                seq.end()
            }
            Self::Extension(ext) if ext.is_map() => {
                let names = self.property_names().unwrap_or_default();
                let mut map = serializer.serialize_map(Some(names.len()))?;
                for name in &names {
                    map.serialize_entry(name, &ext.property(name))?;
                }
                map.end()
            }
            Self::Extension(ext) => serializer.serialize_str(&format!("<{}>", ext.type_name())),
        }
    }
}

/// Converts a JSON object into template data.
///
/// # Errors
///
/// Returns `SerializationError` if `json` is not an object.
pub fn object_from_json(json: serde_json::Value) -> Result<Object, LiquidError> {
    match Value::from(json) {
        Value::Map(m) => Ok(m),
        other => Err(LiquidError::SerializationError(format!(
            "Template data must be a JSON object, got {}",
            other.type_name()
        ))),
    }
}

// -- From implementations --

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Self::Double(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(m: BTreeMap<String, T>) -> Self {
        Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(m: HashMap<String, T>) -> Self {
        Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Self::Null, Into::into)
    }
}

impl From<Arc<dyn ValueObject>> for Value {
    fn from(ext: Arc<dyn ValueObject>) -> Self {
        Self::Extension(ext)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Double))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::Array(arr.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}
