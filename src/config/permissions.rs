use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::types::{ADMIN, BUILTIN_ROLES, GUARDIAN, INSTRUCTOR, Role};

/// Role permission seed file.
///
/// ```toml
/// [roles.GUARDIAN]
/// "/students" = "Students"
/// ```
#[derive(Debug, Deserialize)]
struct PermissionsFile {
    #[serde(default)]
    roles: BTreeMap<String, BTreeMap<String, String>>,
}

pub fn parse_roles(content: &str) -> Result<Vec<Role>> {
    let file: PermissionsFile =
        toml::from_str(content).map_err(|e| Error::Config(format!("invalid permissions file: {e}")))?;

    if file.roles.is_empty() {
        return Err(Error::Config("permissions file defines no roles".to_string()));
    }

    let mut roles = Vec::with_capacity(file.roles.len());
    for (name, endpoints) in file.roles {
        if name.trim().is_empty() {
            return Err(Error::Config("role name cannot be empty".to_string()));
        }
        if let Some(bad) = endpoints.keys().find(|e| !e.starts_with('/')) {
            return Err(Error::Config(format!(
                "endpoint '{bad}' of role {name} must start with '/'"
            )));
        }
        roles.push(Role {
            name,
            permissible_endpoints: endpoints,
        });
    }

    for builtin in BUILTIN_ROLES {
        if !roles.iter().any(|r| r.name == builtin) {
            warn!("Permissions file does not mention built-in role {builtin}");
        }
    }

    Ok(roles)
}

pub fn load_roles(path: &Path) -> Result<Vec<Role>> {
    let content = fs::read_to_string(path)?;
    parse_roles(&content)
}

fn role(name: &str, endpoints: &[(&str, &str)]) -> Role {
    Role {
        name: name.to_string(),
        permissible_endpoints: endpoints
            .iter()
            .map(|(path, title)| (path.to_string(), title.to_string()))
            .collect(),
    }
}

/// Seed used by `admin init` when no permissions file is given.
pub fn default_roles() -> Vec<Role> {
    let students = ("/students", "Students");
    let programs = ("/programs", "Programs");
    let camps = ("/camps", "Camps");
    let users = ("/users", "Users");

    vec![
        role(GUARDIAN, &[students]),
        role(INSTRUCTOR, &[students, programs, camps]),
        role(ADMIN, &[students, programs, camps, users]),
    ]
}
