//! Template filters.
//!
//! A filter is applied with `{{ value | name: arg1, arg2 }}`. Filters are
//! looked up by name in a [`FilterRegistry`]; every renderer owns one seeded
//! with the built-in array filters, and hosts register their own on top.

use std::collections::HashMap;
use std::fmt;

use liquid_rs_core::error::EvaluationError;

use crate::value::Value;

/// A template filter.
///
/// Takes the piped value and the literal arguments written after the colon,
/// and returns a transformed value.
pub trait Filter: Send + Sync {
    /// Returns the filter name.
    fn name(&self) -> &str;

    /// Applies the filter to a value with the given arguments.
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError>;
}

type FilterFn = dyn Fn(&Value, &[Value]) -> Result<Value, EvaluationError> + Send + Sync;

/// A filter backed by a closure, created by [`FilterRegistry::register_fn`].
struct FnFilter {
    name: String,
    func: Box<FilterFn>,
}

impl Filter for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        (self.func)(value, args)
    }
}

/// A registry of available template filters.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::filters::FilterRegistry;
/// use liquid_rs_template::value::Value;
///
/// let mut filters = FilterRegistry::with_builtins();
/// filters.register_fn("double", |v, _| Ok(Value::Int(v.as_int().unwrap_or(0) * 2)));
/// assert_eq!(filters.apply("double", &Value::Int(21), &[]).unwrap(), Value::Int(42));
/// assert!(filters.apply("nope", &Value::Null, &[]).is_err());
/// ```
pub struct FilterRegistry {
    filters: HashMap<String, Box<dyn Filter>>,
}

impl FilterRegistry {
    /// Creates a new empty filter registry.
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in filters.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        register_builtins(&mut r);
        r
    }

    /// Registers a filter, replacing any filter with the same name.
    pub fn register(&mut self, filter: Box<dyn Filter>) {
        self.filters.insert(filter.name().to_string(), filter);
    }

    /// Registers a closure as a filter.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvaluationError> + Send + Sync + 'static,
    {
        self.register(Box::new(FnFilter {
            name: name.into(),
            func: Box::new(func),
        }));
    }

    /// Returns `true` if a filter named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Applies a named filter to a value.
    pub fn apply(&self, name: &str, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        let filter = self
            .filters
            .get(name)
            .ok_or_else(|| EvaluationError::new(format!("Invalid filter name '{name}'")))?;
        filter.apply(value, args)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

fn register_builtins(r: &mut FilterRegistry) {
    r.register(Box::new(JoinFilter));
    r.register(Box::new(ConcatFilter));
    r.register(Box::new(FirstFilter));
    r.register(Box::new(LastFilter));
    r.register(Box::new(MapFilter));
    r.register(Box::new(PushFilter));
    r.register(Box::new(PopFilter));
    r.register(Box::new(SizeFilter));
}

// ── helpers ─────────────────────────────────────────────────────────────

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvaluationError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(EvaluationError::new(format!(
            "Filter '{name}' expects {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn expect_array(name: &str, value: &Value) -> Result<Vec<Value>, EvaluationError> {
    value.to_array().ok_or_else(|| {
        EvaluationError::new(format!(
            "Filter '{name}' expects an array, got '{}'",
            value.type_name()
        ))
    })
}

// ── array filters ───────────────────────────────────────────────────────

struct JoinFilter;
impl Filter for JoinFilter {
    fn name(&self) -> &str {
        "join"
    }
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        expect_args("join", args, 0, 1)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        let separator = args.first().map_or_else(|| " ".to_string(), Value::to_display_string);
        let joined = expect_array("join", value)?
            .iter()
            .map(Value::to_display_string)
            .collect::<Vec<_>>()
            .join(&separator);
        Ok(Value::String(joined))
    }
}

struct ConcatFilter;
impl Filter for ConcatFilter {
    fn name(&self) -> &str {
        "concat"
    }
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        expect_args("concat", args, 1, 1)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        let mut items = expect_array("concat", value)?;
        items.extend(expect_array("concat", &args[0])?);
        Ok(Value::Array(items))
    }
}

struct FirstFilter;
impl Filter for FirstFilter {
    fn name(&self) -> &str {
        "first"
    }
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        expect_args("first", args, 0, 0)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(expect_array("first", value)?.into_iter().next().unwrap_or_default())
    }
}

struct LastFilter;
impl Filter for LastFilter {
    fn name(&self) -> &str {
        "last"
    }
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        expect_args("last", args, 0, 0)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(expect_array("last", value)?.pop().unwrap_or_default())
    }
}

/// `map: field` picks one property out of every element.
struct MapFilter;
impl Filter for MapFilter {
    fn name(&self) -> &str {
        "map"
    }
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        expect_args("map", args, 1, 1)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        let Some(field) = args[0].as_str() else {
            return Err(EvaluationError::new(format!(
                "Filter 'map' expects a 'string' field name, got '{}'",
                args[0].type_name()
            )));
        };
        let picked = expect_array("map", value)?
            .iter()
            .map(|item| item.property(field))
            .collect();
        Ok(Value::Array(picked))
    }
}

struct PushFilter;
impl Filter for PushFilter {
    fn name(&self) -> &str {
        "push"
    }
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        expect_args("push", args, 1, 1)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        let mut items = expect_array("push", value)?;
        items.push(args[0].clone());
        Ok(Value::Array(items))
    }
}

struct PopFilter;
impl Filter for PopFilter {
    fn name(&self) -> &str {
        "pop"
    }
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        expect_args("pop", args, 0, 0)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        let mut items = expect_array("pop", value)?;
        items.pop();
        Ok(Value::Array(items))
    }
}

struct SizeFilter;
impl Filter for SizeFilter {
    fn name(&self) -> &str {
        "size"
    }
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, EvaluationError> {
        expect_args("size", args, 0, 0)?;
        Ok(value
            .length()
            .map_or(Value::Null, |len| Value::Int(i64::try_from(len).unwrap_or(i64::MAX))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    fn apply(name: &str, value: Value, args: &[Value]) -> Result<Value, EvaluationError> {
        FilterRegistry::with_builtins().apply(name, &value, args)
    }

    fn person(name: &str) -> Value {
        let mut m = Object::new();
        m.insert("name".into(), Value::from(name));
        Value::Map(m)
    }

    #[test]
    fn test_join() {
        let v = Value::from(vec!["a", "b", "c"]);
        assert_eq!(apply("join", v.clone(), &[]).unwrap(), Value::from("a b c"));
        assert_eq!(
            apply("join", v, &[Value::from(", ")]).unwrap(),
            Value::from("a, b, c")
        );
        assert_eq!(
            apply("join", Value::from(Vec::<i64>::new()), &[]).unwrap(),
            Value::from("")
        );
    }

    #[test]
    fn test_join_mixed_kinds() {
        let v = Value::Array(vec![Value::Int(1), Value::Bool(true), Value::Null]);
        assert_eq!(
            apply("join", v, &[Value::from("-")]).unwrap(),
            Value::from("1-true-")
        );
    }

    #[test]
    fn test_concat() {
        let out = apply(
            "concat",
            Value::from(vec![1, 2]),
            &[Value::from(vec![3])],
        )
        .unwrap();
        assert_eq!(out, Value::from(vec![1, 2, 3]));
    }

    #[test]
    fn test_concat_requires_array_argument() {
        let err = apply("concat", Value::from(vec![1]), &[Value::Int(2)]).unwrap_err();
        assert_eq!(err.message, "Filter 'concat' expects an array, got 'int'");
    }

    #[test]
    fn test_first_and_last() {
        let v = Value::from(vec![1, 2, 3]);
        assert_eq!(apply("first", v.clone(), &[]).unwrap(), Value::Int(1));
        assert_eq!(apply("last", v, &[]).unwrap(), Value::Int(3));
        assert_eq!(
            apply("first", Value::from(Vec::<i64>::new()), &[]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_map() {
        let v = Value::Array(vec![person("SpongeBob"), person("Patrick"), Value::Int(1)]);
        let out = apply("map", v, &[Value::from("name")]).unwrap();
        assert_eq!(
            out,
            Value::Array(vec![
                Value::from("SpongeBob"),
                Value::from("Patrick"),
                Value::Null
            ])
        );
    }

    #[test]
    fn test_map_requires_string_field() {
        let err = apply("map", Value::from(vec![1]), &[Value::Int(0)]).unwrap_err();
        assert!(err.message.contains("field name"));
    }

    #[test]
    fn test_push_and_pop() {
        let v = Value::from(vec![1, 2]);
        assert_eq!(
            apply("push", v.clone(), &[Value::Int(3)]).unwrap(),
            Value::from(vec![1, 2, 3])
        );
        assert_eq!(apply("pop", v, &[]).unwrap(), Value::from(vec![1]));
    }

    #[test]
    fn test_size() {
        assert_eq!(apply("size", Value::from("héllo"), &[]).unwrap(), Value::Int(5));
        assert_eq!(apply("size", Value::from(vec![1, 2]), &[]).unwrap(), Value::Int(2));
        assert_eq!(apply("size", Value::Int(4), &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_null_input_passes_through() {
        for name in ["join", "first", "last", "pop"] {
            assert_eq!(apply(name, Value::Null, &[]).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_argument_count_checked() {
        let err = apply("first", Value::from(vec![1]), &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.message, "Filter 'first' expects 0 argument(s), got 1");
        let err = apply("join", Value::from(vec![1]), &[Value::Int(1), Value::Int(2)]).unwrap_err();
        assert_eq!(err.message, "Filter 'join' expects 0 to 1 argument(s), got 2");
    }

    #[test]
    fn test_non_array_input_rejected() {
        let err = apply("first", Value::from("abc"), &[]).unwrap_err();
        assert_eq!(err.message, "Filter 'first' expects an array, got 'string'");
    }

    #[test]
    fn test_unknown_filter() {
        let err = apply("shout", Value::Null, &[]).unwrap_err();
        assert_eq!(err.message, "Invalid filter name 'shout'");
    }

    #[test]
    fn test_register_fn_overrides_builtin() {
        let mut filters = FilterRegistry::with_builtins();
        filters.register_fn("first", |_, _| Ok(Value::from("mine")));
        assert!(filters.contains("first"));
        assert_eq!(
            filters.apply("first", &Value::Null, &[]).unwrap(),
            Value::from("mine")
        );
    }

    #[test]
    fn test_empty_registry() {
        let filters = FilterRegistry::new();
        assert!(!filters.contains("join"));
        assert!(format!("{filters:?}").contains("FilterRegistry"));
    }
}
