//! Package identifiers and the ordered publish list
//!
//! A `PublishOrder` is the dependency order of the packages, earliest first.
//! It is built once from configuration and never reordered afterwards.

use crate::core::error::SequenceError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Name of a publishable package, e.g. `l1x-sys`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    /// Create a validated package identifier
    ///
    /// The identifier ends up as a command argument, so anything that a
    /// publish tool could read as a flag or split on is rejected.
    pub fn new<S: Into<String>>(name: S) -> Result<Self, SequenceError> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(SequenceError::InvalidPackage {
                name,
                reason: "name is empty".to_string(),
            });
        }

        if name.starts_with('-') {
            return Err(SequenceError::InvalidPackage {
                name,
                reason: "name must not start with '-'".to_string(),
            });
        }

        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SequenceError::InvalidPackage {
                name,
                reason: "name contains whitespace or control characters".to_string(),
            });
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PackageId {
    type Error = SequenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

/// Non-empty, duplicate-free sequence of packages in publish order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOrder {
    packages: Vec<PackageId>,
}

impl PublishOrder {
    /// Build an order from already validated identifiers
    pub fn new(packages: Vec<PackageId>) -> Result<Self, SequenceError> {
        if packages.is_empty() {
            return Err(SequenceError::EmptyPackageList);
        }

        let mut seen = HashSet::new();
        for package in &packages {
            if !seen.insert(package.as_str()) {
                return Err(SequenceError::DuplicatePackage {
                    name: package.to_string(),
                });
            }
        }

        Ok(Self { packages })
    }

    /// Parse and validate raw names, keeping their order
    pub fn from_names<I, S>(names: I) -> Result<Self, SequenceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let packages = names
            .into_iter()
            .map(PackageId::new)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(packages)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackageId> {
        self.packages.iter()
    }

}

impl<'a> IntoIterator for &'a PublishOrder {
    type Item = &'a PackageId;
    type IntoIter = std::slice::Iter<'a, PackageId>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}

impl fmt::Display for PublishOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.packages.iter().map(PackageId::as_str).collect();
        f.write_str(&names.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_package_id() {
        let id = PackageId::new("l1x-sdk-macros").unwrap();
        assert_eq!(id.as_str(), "l1x-sdk-macros");
        assert_eq!(id.to_string(), "l1x-sdk-macros");
    }

    #[test]
    fn test_empty_package_id_rejected() {
        let result = PackageId::new("   ");
        assert!(matches!(result, Err(SequenceError::InvalidPackage { .. })));
    }

    #[test]
    fn test_flag_like_package_id_rejected() {
        let result = PackageId::new("--allow-dirty");
        assert!(matches!(result, Err(SequenceError::InvalidPackage { .. })));
    }

    #[test]
    fn test_package_id_with_whitespace_rejected() {
        assert!(PackageId::new("l1x sdk").is_err());
        assert!(PackageId::new("l1x-sdk\n").is_err());
    }

    #[test]
    fn test_order_preserves_input_order() {
        let order = PublishOrder::from_names(["l1x-sys", "l1x-sdk-macros", "l1x-sdk"]).unwrap();

        let names: Vec<&str> = order.iter().map(PackageId::as_str).collect();
        assert_eq!(names, vec!["l1x-sys", "l1x-sdk-macros", "l1x-sdk"]);
        assert_eq!(order.len(), 3);
        assert!(!order.is_empty());
    }

    #[test]
    fn test_empty_order_rejected() {
        let result = PublishOrder::from_names(Vec::<String>::new());
        assert!(matches!(result, Err(SequenceError::EmptyPackageList)));
    }

    #[test]
    fn test_duplicate_package_rejected() {
        let result = PublishOrder::from_names(["a", "b", "a"]);
        match result {
            Err(SequenceError::DuplicatePackage { name }) => assert_eq!(name, "a"),
            other => panic!("expected duplicate error, got {:?}", other),
        }
    }

    #[test]
    fn test_order_display() {
        let order = PublishOrder::from_names(["a", "b"]).unwrap();
        assert_eq!(order.to_string(), "a -> b");
    }

    #[test]
    fn test_package_id_deserialization_validates() {
        let ok: PackageId = serde_json::from_str(r#""l1x-sys""#).unwrap();
        assert_eq!(ok.as_str(), "l1x-sys");

        let err = serde_json::from_str::<PackageId>(r#""-p""#);
        assert!(err.is_err());
    }
}
