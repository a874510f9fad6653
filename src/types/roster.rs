use serde::Serialize;

/// Instructors assigned to a camp, in the order they were added.
///
/// Holds the camp invariant: `primary_instructor` is `None` exactly when the
/// roster is empty, and otherwise names one of `instructors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    instructors: Vec<String>,
    primary_instructor: Option<String>,
}

impl Roster {
    /// Builds a roster from persisted `(user_id, is_primary)` rows in insertion order.
    /// A row set with no primary (or several) is repaired to exactly one.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        let mut roster = Roster::default();
        for (user_id, is_primary) in rows {
            if roster.contains(&user_id) {
                continue;
            }
            if is_primary && roster.primary_instructor.is_none() {
                roster.primary_instructor = Some(user_id.clone());
            }
            roster.instructors.push(user_id);
        }
        if roster.primary_instructor.is_none() {
            roster.primary_instructor = roster.instructors.first().cloned();
        }
        roster
    }

    pub fn instructors(&self) -> &[String] {
        &self.instructors
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary_instructor.as_deref()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.instructors.iter().any(|id| id == user_id)
    }

    pub fn len(&self) -> usize {
        self.instructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructors.is_empty()
    }

    /// Adds an instructor. The first instructor on an empty roster becomes primary.
    /// Returns false if the user was already on the roster.
    pub fn add(&mut self, user_id: &str) -> bool {
        if self.contains(user_id) {
            return false;
        }
        self.instructors.push(user_id.to_string());
        if self.primary_instructor.is_none() {
            self.primary_instructor = Some(user_id.to_string());
        }
        true
    }

    /// Moves the primary flag to `user_id`. No-op (false) when the user is not on
    /// the roster or is already primary.
    pub fn make_primary(&mut self, user_id: &str) -> bool {
        if !self.contains(user_id) || self.primary() == Some(user_id) {
            return false;
        }
        self.primary_instructor = Some(user_id.to_string());
        true
    }

    /// Removes an instructor. Removing the primary promotes the earliest-added
    /// remaining instructor; removing the last one clears the primary.
    pub fn remove(&mut self, user_id: &str) -> bool {
        let Some(pos) = self.instructors.iter().position(|id| id == user_id) else {
            return false;
        };
        self.instructors.remove(pos);
        if self.primary() == Some(user_id) {
            self.primary_instructor = self.instructors.first().cloned();
        }
        true
    }

    /// Persistable `(user_id, is_primary)` pairs in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.instructors
            .iter()
            .map(|id| (id.as_str(), self.primary() == Some(id.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(roster: &Roster) {
        match roster.primary() {
            None => assert!(roster.is_empty()),
            Some(p) => assert!(roster.contains(p)),
        }
        assert!(roster.rows().filter(|(_, primary)| *primary).count() <= 1);
    }

    #[test]
    fn test_first_instructor_is_primary() {
        let mut roster = Roster::default();
        assert!(roster.add("u1"));
        assert_eq!(roster.primary(), Some("u1"));
        assert!(roster.add("u2"));
        assert_eq!(roster.primary(), Some("u1"));
        assert!(!roster.add("u2"));
        assert_eq!(roster.len(), 2);
        assert_invariant(&roster);
    }

    #[test]
    fn test_make_primary() {
        let mut roster = Roster::default();
        roster.add("u1");
        roster.add("u2");
        assert!(roster.make_primary("u2"));
        assert_eq!(roster.primary(), Some("u2"));
        assert!(!roster.make_primary("u2"));
        assert!(!roster.make_primary("nobody"));
        assert_eq!(roster.primary(), Some("u2"));
        assert_invariant(&roster);
    }

    #[test]
    fn test_remove_primary_promotes_earliest_remaining() {
        let mut roster = Roster::default();
        roster.add("u1");
        roster.add("u2");
        roster.add("u3");
        roster.make_primary("u2");
        assert!(roster.remove("u2"));
        assert_eq!(roster.primary(), Some("u1"));
        assert!(roster.remove("u1"));
        assert_eq!(roster.primary(), Some("u3"));
        assert!(roster.remove("u3"));
        assert_eq!(roster.primary(), None);
        assert!(!roster.remove("u3"));
        assert_invariant(&roster);
    }

    #[test]
    fn test_from_rows_repairs_primary() {
        let none = Roster::from_rows(vec![("a".into(), false), ("b".into(), false)]);
        assert_eq!(none.primary(), Some("a"));

        let two = Roster::from_rows(vec![("a".into(), false), ("b".into(), true), ("c".into(), true)]);
        assert_eq!(two.primary(), Some("b"));
        assert_invariant(&two);

        let empty = Roster::from_rows(Vec::new());
        assert_eq!(empty.primary(), None);
    }
}
