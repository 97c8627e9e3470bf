//! Segment constraints for typed placeholders.
//!
//! A typed placeholder such as `{id:int}` only matches a path segment when the
//! constraint registered under the type name (`int`) accepts it. The built-in
//! types are `int`, `uint`, `float`, `alpha`, `alnum`, `slug` and `uuid`;
//! custom types are added with [`ConstraintSet::insert`] or
//! `RouteTable::with_constraint`.
//!
//! ```
//! use girder_core::routing::{ConstraintSet, EnumConstraint, SegmentConstraint};
//! use std::sync::Arc;
//!
//! let mut set = ConstraintSet::with_builtins();
//! set.insert("status", Arc::new(EnumConstraint::new(["active", "inactive"])));
//!
//! assert!(set.get("int").unwrap().validate("42").is_ok());
//! assert!(set.get("status").unwrap().validate("archived").is_err());
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

static UUID_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .ok()
});

static SLUG_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").ok());

/// Validates one path segment bound to a typed placeholder.
pub trait SegmentConstraint: Send + Sync {
    /// Returns `Ok(())` when `value` is acceptable, or a short reason otherwise.
    fn validate(&self, value: &str) -> Result<(), String>;

    /// Human-readable name used in diagnostics.
    fn description(&self) -> &str;
}

/// Signed integer.
#[derive(Debug, Clone, Copy)]
pub struct IntConstraint;

impl SegmentConstraint for IntConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        value
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a valid integer", value))
    }

    fn description(&self) -> &str {
        "integer"
    }
}

/// Unsigned integer.
#[derive(Debug, Clone, Copy)]
pub struct UIntConstraint;

impl SegmentConstraint for UIntConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        // u64's parser accepts a leading '+'; path ids should not.
        if value.starts_with('+') {
            return Err(format!("'{}' is not a valid unsigned integer", value));
        }
        value
            .parse::<u64>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a valid unsigned integer", value))
    }

    fn description(&self) -> &str {
        "unsigned integer"
    }
}

/// Finite floating point number.
#[derive(Debug, Clone, Copy)]
pub struct FloatConstraint;

impl SegmentConstraint for FloatConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        match value.parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(()),
            _ => Err(format!("'{}' is not a valid float", value)),
        }
    }

    fn description(&self) -> &str {
        "float"
    }
}

/// Letters only.
#[derive(Debug, Clone, Copy)]
pub struct AlphaConstraint;

impl SegmentConstraint for AlphaConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        if !value.is_empty() && value.chars().all(char::is_alphabetic) {
            Ok(())
        } else {
            Err(format!("'{}' must contain only letters", value))
        }
    }

    fn description(&self) -> &str {
        "alphabetic"
    }
}

/// Letters and digits.
#[derive(Debug, Clone, Copy)]
pub struct AlphaNumConstraint;

impl SegmentConstraint for AlphaNumConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        if !value.is_empty() && value.chars().all(char::is_alphanumeric) {
            Ok(())
        } else {
            Err(format!("'{}' must contain only letters and numbers", value))
        }
    }

    fn description(&self) -> &str {
        "alphanumeric"
    }
}

/// Lowercase words separated by single dashes, e.g. `hello-world-2`.
#[derive(Debug, Clone, Copy)]
pub struct SlugConstraint;

impl SegmentConstraint for SlugConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        matches_pattern(&SLUG_PATTERN, value)
            .then_some(())
            .ok_or_else(|| format!("'{}' is not a valid slug", value))
    }

    fn description(&self) -> &str {
        "slug"
    }
}

/// Hyphenated UUID (8-4-4-4-12).
#[derive(Debug, Clone, Copy)]
pub struct UuidConstraint;

impl SegmentConstraint for UuidConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        matches_pattern(&UUID_PATTERN, value)
            .then_some(())
            .ok_or_else(|| format!("'{}' is not a valid UUID", value))
    }

    fn description(&self) -> &str {
        "UUID"
    }
}

fn matches_pattern(pattern: &Lazy<Option<Regex>>, value: &str) -> bool {
    pattern
        .as_ref()
        .map(|regex| regex.is_match(value))
        .unwrap_or(false)
}

/// Matches a user-supplied regular expression.
pub struct RegexConstraint {
    regex: Regex,
    description: String,
}

impl RegexConstraint {
    /// Compile `pattern`. The pattern is matched against the whole segment
    /// only if it is anchored.
    pub fn new(pattern: &str, description: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            description: description.into(),
        })
    }
}

impl SegmentConstraint for RegexConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        if self.regex.is_match(value) {
            Ok(())
        } else {
            Err(format!("'{}' must match {}", value, self.description))
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for RegexConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexConstraint")
            .field("pattern", &self.regex.as_str())
            .field("description", &self.description)
            .finish()
    }
}

/// Segment length in characters, inclusive bounds.
#[derive(Debug, Clone, Copy)]
pub struct LengthConstraint {
    min: Option<usize>,
    max: Option<usize>,
}

impl LengthConstraint {
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }

    pub fn min(min: usize) -> Self {
        Self::new(Some(min), None)
    }

    pub fn max(max: usize) -> Self {
        Self::new(None, Some(max))
    }

    pub fn exact(length: usize) -> Self {
        Self::new(Some(length), Some(length))
    }
}

impl SegmentConstraint for LengthConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        let len = value.chars().count();
        if let Some(min) = self.min.filter(|min| len < *min) {
            return Err(format!("'{}' must be at least {} characters", value, min));
        }
        if let Some(max) = self.max.filter(|max| len > *max) {
            return Err(format!("'{}' must be at most {} characters", value, max));
        }
        Ok(())
    }

    fn description(&self) -> &str {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min == max => "exact length",
            (Some(_), Some(_)) => "length range",
            (Some(_), None) => "minimum length",
            (None, Some(_)) => "maximum length",
            (None, None) => "any length",
        }
    }
}

/// Integer within inclusive bounds.
#[derive(Debug, Clone, Copy)]
pub struct RangeConstraint {
    min: Option<i64>,
    max: Option<i64>,
}

impl RangeConstraint {
    pub fn new(min: Option<i64>, max: Option<i64>) -> Self {
        Self { min, max }
    }

    pub fn min(min: i64) -> Self {
        Self::new(Some(min), None)
    }

    pub fn max(max: i64) -> Self {
        Self::new(None, Some(max))
    }
}

impl SegmentConstraint for RangeConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        let number = value
            .parse::<i64>()
            .map_err(|_| format!("'{}' is not a valid number", value))?;
        if let Some(min) = self.min.filter(|min| number < *min) {
            return Err(format!("'{}' must be at least {}", value, min));
        }
        if let Some(max) = self.max.filter(|max| number > *max) {
            return Err(format!("'{}' must be at most {}", value, max));
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "number in range"
    }
}

/// One of a fixed set of values.
#[derive(Debug, Clone)]
pub struct EnumConstraint {
    values: Vec<String>,
}

impl EnumConstraint {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl SegmentConstraint for EnumConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        if self.values.iter().any(|allowed| allowed == value) {
            Ok(())
        } else {
            Err(format!(
                "'{}' must be one of: {}",
                value,
                self.values.join(", ")
            ))
        }
    }

    fn description(&self) -> &str {
        "enum value"
    }
}

/// Placeholder type names mapped to their constraints.
#[derive(Clone, Default)]
pub struct ConstraintSet {
    constraints: HashMap<String, Arc<dyn SegmentConstraint>>,
}

impl ConstraintSet {
    /// An empty set; typed placeholders will fail to compile against it.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in placeholder types.
    pub fn with_builtins() -> Self {
        let mut set = Self::new();
        set.insert("int", Arc::new(IntConstraint));
        set.insert("uint", Arc::new(UIntConstraint));
        set.insert("float", Arc::new(FloatConstraint));
        set.insert("alpha", Arc::new(AlphaConstraint));
        set.insert("alnum", Arc::new(AlphaNumConstraint));
        set.insert("slug", Arc::new(SlugConstraint));
        set.insert("uuid", Arc::new(UuidConstraint));
        set
    }

    /// Register (or replace) a placeholder type.
    pub fn insert(&mut self, name: impl Into<String>, constraint: Arc<dyn SegmentConstraint>) {
        self.constraints.insert(name.into(), constraint);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SegmentConstraint>> {
        self.constraints.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constraints.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.constraints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSet")
            .field("types", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_constraint() {
        let constraint = IntConstraint;
        assert!(constraint.validate("123").is_ok());
        assert!(constraint.validate("-456").is_ok());
        assert!(constraint.validate("abc").is_err());
        assert!(constraint.validate("12.5").is_err());
    }

    #[test]
    fn test_uint_constraint() {
        let constraint = UIntConstraint;
        assert!(constraint.validate("0").is_ok());
        assert!(constraint.validate("-1").is_err());
        assert!(constraint.validate("+1").is_err());
    }

    #[test]
    fn test_float_constraint() {
        let constraint = FloatConstraint;
        assert!(constraint.validate("1.5").is_ok());
        assert!(constraint.validate("-3").is_ok());
        assert!(constraint.validate("inf").is_err());
        assert!(constraint.validate("NaN").is_err());
    }

    #[test]
    fn test_alpha_and_alnum() {
        assert!(AlphaConstraint.validate("Ada").is_ok());
        assert!(AlphaConstraint.validate("Ada1").is_err());
        assert!(AlphaNumConstraint.validate("Ada1").is_ok());
        assert!(AlphaNumConstraint.validate("Ada-1").is_err());
    }

    #[test]
    fn test_slug_constraint() {
        assert!(SlugConstraint.validate("hello-world-2").is_ok());
        assert!(SlugConstraint.validate("Hello").is_err());
        assert!(SlugConstraint.validate("double--dash").is_err());
        assert!(SlugConstraint.validate("-leading").is_err());
    }

    #[test]
    fn test_uuid_constraint() {
        assert!(
            UuidConstraint
                .validate("550e8400-e29b-41d4-a716-446655440000")
                .is_ok()
        );
        assert!(UuidConstraint.validate("550e8400").is_err());
    }

    #[test]
    fn test_length_constraint() {
        let constraint = LengthConstraint::new(Some(3), Some(5));
        assert!(constraint.validate("abcd").is_ok());
        assert!(constraint.validate("ab").is_err());
        assert!(constraint.validate("abcdef").is_err());
        assert_eq!(LengthConstraint::exact(2).description(), "exact length");
    }

    #[test]
    fn test_range_constraint() {
        let constraint = RangeConstraint::new(Some(1), Some(100));
        assert!(constraint.validate("1").is_ok());
        assert!(constraint.validate("0").is_err());
        assert!(constraint.validate("101").is_err());
        assert!(constraint.validate("x").is_err());
    }

    #[test]
    fn test_regex_and_enum() {
        let lower = RegexConstraint::new("^[a-z]+$", "lowercase letters").unwrap();
        assert!(lower.validate("abc").is_ok());
        assert!(lower.validate("aBc").is_err());

        let status = EnumConstraint::new(["open", "closed"]);
        assert!(status.validate("open").is_ok());
        assert!(status.validate("pending").is_err());
    }

    #[test]
    fn test_builtin_set() {
        let set = ConstraintSet::with_builtins();
        assert_eq!(
            set.names(),
            vec!["alnum", "alpha", "float", "int", "slug", "uint", "uuid"]
        );
        assert!(!set.contains("email"));
    }
}
