use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use super::Entity;
use crate::error::{Error, Result};
use crate::membership::Membership;
use crate::policy::AccessPolicy;
use crate::store::Store;
use crate::types::{BASE_ROLE, BUILTIN_ROLES, Identity, User, UserPatch};

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(Error::Validation(format!("invalid email: '{email}'"))),
    }
}

impl Entity for User {
    type Id = str;
    type Fields = Identity;
    type Patch = UserPatch;

    fn open_existing(store: &dyn Store, id: &str) -> Result<Option<Self>> {
        store.get_user(id)
    }

    /// The very first user receives every built-in role; everyone after that
    /// starts with the base role only.
    fn create_new(store: &dyn Store, identity: Identity) -> Result<Self> {
        if identity.id.trim().is_empty() {
            return Err(Error::Validation("user id cannot be empty".to_string()));
        }
        validate_email(&identity.email)?;

        let roles: BTreeSet<String> = if store.count_users()? == 0 {
            BUILTIN_ROLES.iter().map(|r| r.to_string()).collect()
        } else {
            BTreeSet::from([BASE_ROLE.to_string()])
        };

        let user = User {
            id: identity.id,
            given_name: identity.given_name,
            family_name: identity.family_name,
            full_name: identity.full_name,
            picture: identity.picture,
            primary_email: identity.email.trim().to_string(),
            other_emails: Vec::new(),
            roles,
            student_ids: Vec::new(),
            program_ids: Vec::new(),
            created_at: Utc::now(),
        };
        store.create_user(&user)?;

        info!("Created user {} with roles {:?}", user.id, user.roles);
        Ok(user)
    }

    fn update(store: &dyn Store, id: &str, patch: UserPatch) -> Result<Self> {
        let mut user = Self::open(store, id)?;
        patch.apply(&mut user)?;
        store.update_user(&user)?;
        Ok(user)
    }

    /// Detaches the user from students, programs and camps before deleting the row.
    fn delete(store: &dyn Store, id: &str) -> Result<bool> {
        Membership::new(store).detach_user(id)?;
        let deleted = store.delete_user(id)?;
        if deleted {
            info!("Deleted user {}", id);
        }
        Ok(deleted)
    }
}

/// Opens the user behind an identity, creating it on first sign-in. Returning
/// users get their profile refreshed, and an email not seen before is recorded.
pub fn sign_in(store: &dyn Store, identity: Identity) -> Result<User> {
    let Some(mut user) = User::open_existing(store, &identity.id)? else {
        return User::create_new(store, identity);
    };

    let email = identity.email.trim().to_string();
    let patch = UserPatch {
        given_name: Some(identity.given_name).filter(|v| *v != user.given_name),
        family_name: Some(identity.family_name).filter(|v| *v != user.family_name),
        full_name: Some(identity.full_name).filter(|v| *v != user.full_name),
        picture: Some(identity.picture).filter(|v| *v != user.picture),
    };
    let new_email = !email.is_empty()
        && email != user.primary_email
        && !user.other_emails.contains(&email);

    if patch.is_empty() && !new_email {
        return Ok(user);
    }

    patch.apply(&mut user)?;
    if new_email {
        validate_email(&email)?;
        user.other_emails.push(email);
    }
    store.update_user(&user)?;
    Ok(user)
}

/// Replaces a user's role set. Every name must be a built-in role or one the
/// policy knows about.
///
/// Dropping the instructor role also takes the user off every camp roster.
/// Program ownership is left in place.
pub fn set_roles(
    store: &dyn Store,
    policy: &AccessPolicy,
    id: &str,
    roles: &[String],
) -> Result<User> {
    if roles.is_empty() {
        return Err(Error::Validation("a user needs at least one role".to_string()));
    }
    for role in roles {
        if !BUILTIN_ROLES.contains(&role.as_str()) && policy.role(role).is_none() {
            return Err(Error::Validation(format!("unknown role: '{role}'")));
        }
    }

    let mut user = User::open(store, id)?;
    let was_instructor = user.is_instructor();
    user.roles = roles.iter().cloned().collect();
    store.update_user(&user)?;
    info!("Set roles of user {} to {:?}", user.id, user.roles);

    if was_instructor && !user.is_instructor() {
        let left = Membership::new(store).leave_camps(&user.id)?;
        if left > 0 {
            info!("Removed former instructor {} from {} camp(s)", user.id, left);
        }
    }
    Ok(user)
}

/// Records an additional email for the user.
pub fn add_email(store: &dyn Store, id: &str, email: &str) -> Result<User> {
    validate_email(email)?;
    let email = email.trim().to_string();

    let mut user = User::open(store, id)?;
    if email != user.primary_email && !user.other_emails.contains(&email) {
        user.other_emails.push(email);
        store.update_user(&user)?;
    }
    Ok(user)
}

/// Promotes one of the user's emails to primary; the old primary is kept as a
/// secondary address.
pub fn set_primary_email(store: &dyn Store, id: &str, email: &str) -> Result<User> {
    let email = email.trim();
    let mut user = User::open(store, id)?;
    if user.primary_email == email {
        return Ok(user);
    }

    let Some(pos) = user.other_emails.iter().position(|e| e == email) else {
        return Err(Error::NotFound);
    };
    let promoted = user.other_emails.remove(pos);
    let demoted = std::mem::replace(&mut user.primary_email, promoted);
    user.other_emails.push(demoted);
    store.update_user(&user)?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{
        ADMIN, Camp, Duration, GUARDIAN, Grade, GradeRange, INSTRUCTOR, NewCamp, NewProgram,
    };

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            given_name: "Kim".to_string(),
            family_name: "Lee".to_string(),
            full_name: "Kim Lee".to_string(),
            picture: String::new(),
            email: format!("{id}@example.com"),
        }
    }

    #[test]
    fn test_first_user_gets_every_role() {
        let store = store();
        let first = sign_in(&store, identity("107146654681983684193")).unwrap();
        assert!(first.has_role(GUARDIAN));
        assert!(first.has_role(INSTRUCTOR));
        assert!(first.has_role(ADMIN));

        let second = sign_in(&store, identity("2")).unwrap();
        assert_eq!(second.roles, BTreeSet::from([GUARDIAN.to_string()]));
    }

    #[test]
    fn test_sign_in_refreshes_profile() {
        let store = store();
        sign_in(&store, identity("1")).unwrap();

        let mut changed = identity("1");
        changed.given_name = "Kimberly".to_string();
        changed.email = "kim@school.example".to_string();
        let user = sign_in(&store, changed).unwrap();

        assert_eq!(user.given_name, "Kimberly");
        assert_eq!(user.primary_email, "1@example.com");
        assert_eq!(user.other_emails, vec!["kim@school.example".to_string()]);
        assert_eq!(store.count_users().unwrap(), 1);
    }

    #[test]
    fn test_set_roles_rejects_unknown() {
        let store = store();
        let policy = AccessPolicy::default();
        sign_in(&store, identity("1")).unwrap();

        let result = set_roles(&store, &policy, "1", &["WIZARD".to_string()]);
        assert!(matches!(result, Err(Error::Validation(_))));

        let user = set_roles(&store, &policy, "1", &[INSTRUCTOR.to_string()]).unwrap();
        assert!(user.is_instructor());
        assert!(!user.has_role(GUARDIAN));
    }

    #[test]
    fn test_dropping_instructor_role_leaves_camps() {
        let store = store();
        let policy = AccessPolicy::default();
        sign_in(&store, identity("admin")).unwrap();
        sign_in(&store, identity("bob")).unwrap();
        sign_in(&store, identity("carol")).unwrap();
        for id in ["bob", "carol"] {
            set_roles(&store, &policy, id, &[INSTRUCTOR.to_string()]).unwrap();
        }

        let m = Membership::new(&store);
        let program = m
            .create_program_for(
                "bob",
                &NewProgram {
                    title: "Chess".to_string(),
                    grade_range: GradeRange::new(Grade::new(2).unwrap(), Grade::new(5).unwrap())
                        .unwrap(),
                    duration: Duration::Half,
                    tags: String::new(),
                    description: String::new(),
                },
            )
            .unwrap();
        let solo = Camp::create_new(
            &store,
            NewCamp {
                program_id: program.id,
                starts_on: None,
                ends_on: None,
            },
        )
        .unwrap();
        let shared = Camp::create_new(
            &store,
            NewCamp {
                program_id: program.id,
                starts_on: None,
                ends_on: None,
            },
        )
        .unwrap();
        m.add_instructor(solo.id, "bob").unwrap();
        m.add_instructor(shared.id, "bob").unwrap();
        m.add_instructor(shared.id, "carol").unwrap();

        set_roles(&store, &policy, "bob", &[GUARDIAN.to_string()]).unwrap();

        let solo = store.get_camp(solo.id).unwrap().unwrap();
        assert!(solo.roster.is_empty());
        assert_eq!(solo.roster.primary(), None);
        let shared = store.get_camp(shared.id).unwrap().unwrap();
        assert_eq!(shared.roster.instructors(), ["carol".to_string()]);
        assert_eq!(shared.roster.primary(), Some("carol"));
        assert!(store.list_instructor_camps("bob").unwrap().is_empty());
        assert!(m.is_program_owner("bob", program.id).unwrap());
    }

    #[test]
    fn test_primary_email_swap() {
        let store = store();
        sign_in(&store, identity("1")).unwrap();
        add_email(&store, "1", "alt@example.com").unwrap();
        assert!(add_email(&store, "1", "not-an-email").is_err());

        let user = set_primary_email(&store, "1", "alt@example.com").unwrap();
        assert_eq!(user.primary_email, "alt@example.com");
        assert_eq!(user.other_emails, vec!["1@example.com".to_string()]);

        assert!(matches!(
            set_primary_email(&store, "1", "stranger@example.com"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_delete_user_is_idempotent() {
        let store = store();
        sign_in(&store, identity("1")).unwrap();
        assert!(User::delete(&store, "1").unwrap());
        assert!(!User::delete(&store, "1").unwrap());
    }
}
