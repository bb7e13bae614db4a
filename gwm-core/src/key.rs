use crate::{Region, Variable};
use std::fmt;

/// Namespace for per-variable point sets.
pub const POINTS_NAMESPACE: &str = "var_points_v1";
/// Namespace for the distinct region labels of a variable.
pub const REGIONS_NAMESPACE: &str = "var_regions_v1";
/// Namespace for the observation history of a single point.
pub const HISTORY_NAMESPACE: &str = "var_history_v1";

/// Deterministic cache key: `<namespace>:<variable>[:<discriminator>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn points(variable: Variable, region: &Region) -> Self {
        Self(format!("{}:{}:{}", POINTS_NAMESPACE, variable.slug(), region.token()))
    }

    pub fn regions(variable: Variable) -> Self {
        Self(format!("{}:{}", REGIONS_NAMESPACE, variable.slug()))
    }

    pub fn history(variable: Variable, code: &str) -> Self {
        Self(format!("{}:{}:{}", HISTORY_NAMESPACE, variable.slug(), code))
    }

    /// Prefix matching every key of a namespace.
    pub fn namespace_prefix(namespace: &str) -> String {
        format!("{}:", namespace)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn points_key_shape() {
        let key = CacheKey::points(Variable::Nitrate, &Region::named("Alta Pianura"));
        assert_eq!(key.as_str(), "var_points_v1:nitrate:=Alta Pianura");
        assert_eq!(
            CacheKey::points(Variable::Depth, &Region::All).as_str(),
            "var_points_v1:depth:*"
        );
    }

    #[test]
    fn keys_are_deterministic() {
        let a = CacheKey::points(Variable::Flow, &Region::named("Adda"));
        let b = CacheKey::points(Variable::Flow, &"Adda".parse().unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_queries_get_distinct_keys() {
        let regions = [Region::All, Region::named("all regions"), Region::named("*"), Region::named("A")];
        let mut seen = HashSet::new();
        for variable in Variable::ALL {
            for region in &regions {
                assert!(seen.insert(CacheKey::points(variable, region)));
            }
            assert!(seen.insert(CacheKey::regions(variable)));
            assert!(seen.insert(CacheKey::history(variable, "A")));
        }
    }

    #[test]
    fn namespaces_share_no_prefix() {
        let points = CacheKey::namespace_prefix(POINTS_NAMESPACE);
        assert!(CacheKey::points(Variable::Depth, &Region::All).as_str().starts_with(&points));
        assert!(!CacheKey::regions(Variable::Depth).as_str().starts_with(&points));
    }
}
