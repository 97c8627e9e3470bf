//! Contract keys identify what a caller asks the container for.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

static CONTRACT_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^(?:dyn )?[A-Za-z_][A-Za-z0-9_]*(?:(?:::|\.)[A-Za-z_][A-Za-z0-9_]*)*(?:<.+>)?$",
    )
    .ok()
});

/// Identifier of a service contract.
///
/// Keys are either derived from a Rust type (`ContractKey::of::<T>()`, which
/// uses the fully qualified type name) or given explicitly
/// (`ContractKey::named("cache.store")`). Equality, ordering and hashing
/// only look at the name, so `named(type_name::<T>())` equals `of::<T>()`.
#[derive(Clone)]
pub struct ContractKey {
    name: Cow<'static, str>,
    derived: bool,
}

impl ContractKey {
    /// Key for a Rust type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: Cow::Borrowed(std::any::type_name::<T>()),
            derived: true,
        }
    }

    /// Key with an explicit name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            derived: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Whether the key came from a Rust type rather than an explicit name.
    pub fn is_type_derived(&self) -> bool {
        self.derived
    }

    /// Check that the key is a well-formed type identifier.
    ///
    /// Type-derived keys always pass: every `type_name` names a real type,
    /// including references, tuples, arrays and bounded trait objects.
    pub fn validate(&self) -> Result<()> {
        if self.derived {
            return Ok(());
        }

        let valid = CONTRACT_PATTERN
            .as_ref()
            .map(|pattern| pattern.is_match(&self.name))
            .unwrap_or(false)
            && brackets_balanced(&self.name);

        if valid {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "'{}' is not a valid contract identifier",
                self.name
            )))
        }
    }
}

fn brackets_balanced(s: &str) -> bool {
    let mut depth: i32 = 0;
    for c in s.chars() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

impl PartialEq for ContractKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ContractKey {}

impl Hash for ContractKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for ContractKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContractKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractKey({})", self.name)
    }
}

impl From<&'static str> for ContractKey {
    fn from(name: &'static str) -> Self {
        Self::named(name)
    }
}

impl From<String> for ContractKey {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer;
    trait Notifier {}

    #[test]
    fn test_type_keys_are_valid() {
        assert!(ContractKey::of::<Mailer>().validate().is_ok());
        assert!(ContractKey::of::<String>().validate().is_ok());
        assert!(ContractKey::of::<dyn Notifier>().validate().is_ok());
        assert!(
            ContractKey::of::<std::sync::Arc<Vec<String>>>()
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_named_keys() {
        assert!(ContractKey::named("cache.store").validate().is_ok());
        assert!(ContractKey::named("app::Logger").validate().is_ok());
        assert!(ContractKey::named("").validate().is_err());
        assert!(ContractKey::named("9lives").validate().is_err());
        assert!(ContractKey::named("has space").validate().is_err());
        assert!(ContractKey::named("broken<generic").validate().is_err());
        assert!(ContractKey::named("a..b").validate().is_err());
    }

    #[test]
    fn test_non_path_types_are_valid() {
        assert!(ContractKey::of::<&'static str>().validate().is_ok());
        assert!(ContractKey::of::<(u32, u32)>().validate().is_ok());
        assert!(ContractKey::of::<[u8; 4]>().validate().is_ok());
        assert!(ContractKey::of::<dyn Notifier + Send>().validate().is_ok());
    }

    #[test]
    fn test_named_type_name_equals_type_key() {
        let named = ContractKey::named(std::any::type_name::<Mailer>());
        assert_eq!(named, ContractKey::of::<Mailer>());
        assert!(!named.is_type_derived());
        assert!(ContractKey::of::<Mailer>().is_type_derived());
    }

    #[test]
    fn test_type_key_uses_type_name() {
        assert_eq!(
            ContractKey::of::<String>().as_str(),
            std::any::type_name::<String>()
        );
    }
}
