use std::collections::BTreeMap;

use tracing::info;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Role, User};

/// Maps roles to the URL paths they may reach.
///
/// Loaded once at startup from the role permission table and never refreshed;
/// changing permissions requires a restart.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    roles: BTreeMap<String, Role>,
}

impl AccessPolicy {
    pub fn from_roles<I: IntoIterator<Item = Role>>(roles: I) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    pub fn load(store: &dyn Store) -> Result<Self> {
        let policy = Self::from_roles(store.list_roles()?);
        info!("Loaded access policy for {} roles", policy.roles.len());
        Ok(policy)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// True iff any of `roles` lists `url_path` among its endpoints.
    pub fn is_permitted<I, S>(&self, roles: I, url_path: &str) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        roles.into_iter().any(|name| {
            self.roles
                .get(name.as_ref())
                .is_some_and(|role| role.permissible_endpoints.contains_key(url_path))
        })
    }

    /// Fails with [`Error::PermissionDenied`] unless the user may reach `url_path`.
    pub fn require(&self, user: &User, url_path: &str) -> Result<()> {
        if self.is_permitted(&user.roles, url_path) {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!(
                "user {} may not access {url_path}",
                user.id
            )))
        }
    }

    /// Every endpoint reachable by `roles`, with its display title.
    pub fn endpoints_for<I, S>(&self, roles: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        roles
            .into_iter()
            .filter_map(|name| self.roles.get(name.as_ref()))
            .flat_map(|role| role.permissible_endpoints.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ADMIN, GUARDIAN};

    fn role(name: &str, endpoints: &[&str]) -> Role {
        Role {
            name: name.to_string(),
            permissible_endpoints: endpoints
                .iter()
                .map(|e| (e.to_string(), e.trim_start_matches('/').to_string()))
                .collect(),
        }
    }

    fn policy() -> AccessPolicy {
        AccessPolicy::from_roles([
            role(GUARDIAN, &["/students"]),
            role(ADMIN, &["/students", "/users"]),
        ])
    }

    #[test]
    fn test_is_permitted_any_role() {
        let p = policy();
        assert!(p.is_permitted([GUARDIAN], "/students"));
        assert!(!p.is_permitted([GUARDIAN], "/users"));
        assert!(p.is_permitted([GUARDIAN, ADMIN], "/users"));
        assert!(!p.is_permitted(Vec::<String>::new(), "/students"));
        assert!(!p.is_permitted(["UNKNOWN"], "/students"));
    }

    #[test]
    fn test_endpoints_for_merges_roles() {
        let endpoints = policy().endpoints_for([GUARDIAN, ADMIN]);
        assert_eq!(
            endpoints.keys().collect::<Vec<_>>(),
            vec!["/students", "/users"]
        );
    }
}
