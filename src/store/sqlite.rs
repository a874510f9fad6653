use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, Type};
use rusqlite::{Connection, OptionalExtension, Params, Row, Transaction, TransactionBehavior, params};
use tracing::warn;

use super::schema::SCHEMA;
use super::{Store, Unlinked};
use crate::error::{Error, Result};
use crate::ordering::{self, IndexChange};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database. Mostly useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Starts a transaction that takes the database write lock up front, so a
/// read-then-write sequence cannot interleave with another writer.
fn write_tx(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn conversion_error(idx: usize, ty: Type, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn grade_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Grade> {
    let ordinal: u8 = row.get(idx)?;
    Grade::new(ordinal).map_err(|e| conversion_error(idx, Type::Integer, e))
}

fn query_column<T: FromSql, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get(0))?;
    rows.collect()
}

// Users

const USER_COLUMNS: &str =
    "id, given_name, family_name, full_name, picture, primary_email, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        given_name: row.get(1)?,
        family_name: row.get(2)?,
        full_name: row.get(3)?,
        picture: row.get(4)?,
        primary_email: row.get(5)?,
        other_emails: Vec::new(),
        roles: Default::default(),
        student_ids: Vec::new(),
        program_ids: Vec::new(),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn load_user_relations(conn: &Connection, user: &mut User) -> rusqlite::Result<()> {
    user.other_emails = query_column(
        conn,
        "SELECT email FROM user_emails WHERE user_id = ?1 ORDER BY email",
        params![user.id],
    )?;
    user.roles = query_column::<String, _>(
        conn,
        "SELECT role FROM user_roles WHERE user_id = ?1",
        params![user.id],
    )?
    .into_iter()
    .collect();
    user.student_ids = query_column(
        conn,
        "SELECT student_id FROM user_students WHERE user_id = ?1 ORDER BY student_id",
        params![user.id],
    )?;
    user.program_ids = query_column(
        conn,
        "SELECT program_id FROM user_programs WHERE user_id = ?1 ORDER BY program_id",
        params![user.id],
    )?;
    Ok(())
}

fn write_user_relations(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM user_emails WHERE user_id = ?1", params![user.id])?;
    for email in &user.other_emails {
        conn.execute(
            "INSERT OR IGNORE INTO user_emails (user_id, email) VALUES (?1, ?2)",
            params![user.id, email],
        )?;
    }

    conn.execute("DELETE FROM user_roles WHERE user_id = ?1", params![user.id])?;
    for role in &user.roles {
        conn.execute(
            "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)",
            params![user.id, role],
        )?;
    }
    Ok(())
}

// Students

const STUDENT_COLUMNS: &str = "id, name, birthdate, school, grade";

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let grade = match row.get::<_, Option<u8>>(4)? {
        Some(ordinal) => {
            Some(Grade::new(ordinal).map_err(|e| conversion_error(4, Type::Integer, e))?)
        }
        None => None,
    };
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        birthdate: row.get(2)?,
        school: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        grade,
    })
}

fn delete_student_rows(conn: &Connection, id: StudentId) -> rusqlite::Result<bool> {
    conn.execute("DELETE FROM user_students WHERE student_id = ?1", params![id])?;
    let rows = conn.execute("DELETE FROM students WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

// Programs

const PROGRAM_COLUMNS: &str = "id, title, from_grade, to_grade, duration, tags, description";

fn program_from_row(row: &Row<'_>) -> rusqlite::Result<Program> {
    let from = grade_at(row, 2)?;
    let to = grade_at(row, 3)?;
    let duration = row
        .get::<_, String>(4)?
        .parse::<Duration>()
        .map_err(|e| conversion_error(4, Type::Text, e))?;
    Ok(Program {
        id: row.get(0)?,
        title: row.get(1)?,
        // Stored ranges are trusted as-is; inverted ones are rejected on write.
        grade_range: GradeRange { from, to },
        duration,
        tags: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}

fn delete_program_rows(conn: &Connection, id: ProgramId) -> rusqlite::Result<bool> {
    conn.execute(
        "DELETE FROM camp_instructors WHERE camp_id IN (SELECT id FROM camps WHERE program_id = ?1)",
        params![id],
    )?;
    conn.execute("DELETE FROM camps WHERE program_id = ?1", params![id])?;
    conn.execute("DELETE FROM levels WHERE program_id = ?1", params![id])?;
    conn.execute("DELETE FROM user_programs WHERE program_id = ?1", params![id])?;
    let rows = conn.execute("DELETE FROM programs WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

// Levels

const LEVEL_COLUMNS: &str = "id, program_id, title, description, list_index";

fn level_from_row(row: &Row<'_>) -> rusqlite::Result<Level> {
    Ok(Level {
        id: row.get(0)?,
        program_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        list_index: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
    })
}

fn apply_index_changes(conn: &Connection, changes: &[IndexChange]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("UPDATE levels SET list_index = ?1 WHERE id = ?2")?;
    for change in changes {
        stmt.execute(params![change.list_index, change.level_id])?;
    }
    Ok(())
}

fn query_levels(conn: &Connection, program_id: ProgramId) -> rusqlite::Result<Vec<Level>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LEVEL_COLUMNS} FROM levels WHERE program_id = ?1 ORDER BY list_index, id"
    ))?;
    let levels = stmt
        .query_map(params![program_id], level_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(levels)
}

/// Loads a program's levels sorted by position, renumbering them first if the
/// stored indices are not exactly 1..=N (e.g. rows written without an index).
fn dense_levels(conn: &Connection, program_id: ProgramId) -> Result<Vec<Level>> {
    let mut levels = query_levels(conn, program_id)?;

    if let Err(e) = ordering::check_dense(&levels) {
        let repairs = ordering::plan_renumber(&levels);
        warn!(
            "Repairing level order of program {}: {} ({} writes)",
            program_id,
            e,
            repairs.len()
        );
        apply_index_changes(conn, &repairs)?;
        ordering::apply_changes(&mut levels, &repairs);
    }

    levels.sort_by_key(|l| l.list_index);
    Ok(levels)
}

fn program_exists(conn: &Connection, id: ProgramId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM programs WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )
}

// Camps

const CAMP_COLUMNS: &str = "c.id, c.program_id, c.starts_on, c.ends_on";

fn camp_from_row(row: &Row<'_>) -> rusqlite::Result<Camp> {
    Ok(Camp {
        id: row.get(0)?,
        program_id: row.get(1)?,
        starts_on: row.get(2)?,
        ends_on: row.get(3)?,
        roster: Roster::default(),
    })
}

fn load_roster(conn: &Connection, camp_id: CampId) -> rusqlite::Result<Roster> {
    let mut stmt = conn.prepare(
        "SELECT user_id, is_primary FROM camp_instructors
         WHERE camp_id = ?1 ORDER BY position, rowid",
    )?;
    let rows = stmt
        .query_map(params![camp_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Roster::from_rows(rows))
}

fn query_camps<P: Params>(conn: &Connection, sql: &str, params: P) -> rusqlite::Result<Vec<Camp>> {
    let mut stmt = conn.prepare(sql)?;
    let mut camps = stmt
        .query_map(params, camp_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for camp in &mut camps {
        camp.roster = load_roster(conn, camp.id)?;
    }
    Ok(camps)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Role reference data

    fn seed_roles(&self, roles: &[Role]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for role in roles {
            for (endpoint, title) in &role.permissible_endpoints {
                tx.execute(
                    "INSERT INTO role_permissions (role, endpoint, endpoint_title)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (role, endpoint) DO UPDATE SET endpoint_title = excluded.endpoint_title",
                    params![role.name, endpoint, title],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn list_roles(&self) -> Result<Vec<Role>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT role, endpoint, endpoint_title FROM role_permissions ORDER BY role, endpoint",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut roles: BTreeMap<String, Role> = BTreeMap::new();
        for row in rows {
            let (name, endpoint, title) = row?;
            roles
                .entry(name.clone())
                .or_insert_with(|| Role {
                    name,
                    permissible_endpoints: BTreeMap::new(),
                })
                .permissible_endpoints
                .insert(endpoint, title);
        }
        Ok(roles.into_values().collect())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO users (id, given_name, family_name, full_name, picture, primary_email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.given_name,
                user.family_name,
                user.full_name,
                user.picture,
                user.primary_email,
                format_datetime(&user.created_at),
            ],
        )?;
        write_user_relations(&tx, user)?;

        tx.commit()?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;

        match user {
            Some(mut user) => {
                load_user_relations(&conn, &mut user)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY family_name, given_name, id"
        ))?;

        let mut users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for user in &mut users {
            load_user_relations(&conn, user)?;
        }
        Ok(users)
    }

    fn count_users(&self) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE users SET given_name = ?1, family_name = ?2, full_name = ?3, picture = ?4,
                primary_email = ?5
             WHERE id = ?6",
            params![
                user.given_name,
                user.family_name,
                user.full_name,
                user.picture,
                user.primary_email,
                user.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        write_user_relations(&tx, user)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Student operations

    fn create_student(&self, student: &NewStudent) -> Result<Student> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO students (name, birthdate, school, grade) VALUES (?1, ?2, ?3, ?4)",
            params![
                student.name,
                student.birthdate,
                student.school,
                student.grade.map(Grade::ordinal),
            ],
        )?;

        Ok(Student {
            id: conn.last_insert_rowid(),
            name: student.name.clone(),
            birthdate: student.birthdate,
            school: student.school.clone(),
            grade: student.grade,
        })
    }

    fn get_student(&self, id: StudentId) -> Result<Option<Student>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
            params![id],
            student_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_students(&self, user_id: &str) -> Result<Vec<Student>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.name, s.birthdate, s.school, s.grade
             FROM students s
             JOIN user_students us ON s.id = us.student_id
             WHERE us.user_id = ?1
             ORDER BY s.name, s.id",
        )?;

        let rows = stmt.query_map(params![user_id], student_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_student(&self, student: &Student) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE students SET name = ?1, birthdate = ?2, school = ?3, grade = ?4 WHERE id = ?5",
            params![
                student.name,
                student.birthdate,
                student.school,
                student.grade.map(Grade::ordinal),
                student.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_student(&self, id: StudentId) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let deleted = delete_student_rows(&tx, id)?;
        tx.commit()?;
        Ok(deleted)
    }

    // Guardianship

    fn add_guardian(&self, user_id: &str, student_id: StudentId) -> Result<bool> {
        let rows = self.conn().execute(
            "INSERT OR IGNORE INTO user_students (user_id, student_id) VALUES (?1, ?2)",
            params![user_id, student_id],
        )?;
        Ok(rows > 0)
    }

    fn remove_guardian(&self, user_id: &str, student_id: StudentId) -> Result<Unlinked> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM user_students WHERE user_id = ?1 AND student_id = ?2",
            params![user_id, student_id],
        )? > 0;

        let remaining: i64 = tx.query_row(
            "SELECT COUNT(*) FROM user_students WHERE student_id = ?1",
            params![student_id],
            |row| row.get(0),
        )?;

        let pruned = remaining == 0 && delete_student_rows(&tx, student_id)?;

        tx.commit()?;
        Ok(Unlinked { removed, pruned })
    }

    fn list_guardians(&self, student_id: StudentId) -> Result<Vec<String>> {
        let conn = self.conn();
        query_column(
            &conn,
            "SELECT user_id FROM user_students WHERE student_id = ?1 ORDER BY user_id",
            params![student_id],
        )
        .map_err(Error::from)
    }

    // Program operations

    fn create_program(&self, program: &NewProgram) -> Result<Program> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO programs (title, from_grade, to_grade, duration, tags, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                program.title,
                program.grade_range.from.ordinal(),
                program.grade_range.to.ordinal(),
                program.duration.as_str(),
                program.tags,
                program.description,
            ],
        )?;

        Ok(Program {
            id: conn.last_insert_rowid(),
            title: program.title.clone(),
            grade_range: program.grade_range,
            duration: program.duration,
            tags: program.tags.clone(),
            description: program.description.clone(),
        })
    }

    fn get_program(&self, id: ProgramId) -> Result<Option<Program>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PROGRAM_COLUMNS} FROM programs WHERE id = ?1"),
            params![id],
            program_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_programs(&self) -> Result<Vec<Program>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROGRAM_COLUMNS} FROM programs ORDER BY title, id"
        ))?;

        let rows = stmt.query_map([], program_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_user_programs(&self, user_id: &str) -> Result<Vec<Program>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.from_grade, p.to_grade, p.duration, p.tags, p.description
             FROM programs p
             JOIN user_programs up ON p.id = up.program_id
             WHERE up.user_id = ?1
             ORDER BY p.title, p.id",
        )?;

        let rows = stmt.query_map(params![user_id], program_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_program(&self, program: &Program) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE programs SET title = ?1, from_grade = ?2, to_grade = ?3, duration = ?4,
                tags = ?5, description = ?6
             WHERE id = ?7",
            params![
                program.title,
                program.grade_range.from.ordinal(),
                program.grade_range.to.ordinal(),
                program.duration.as_str(),
                program.tags,
                program.description,
                program.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_program(&self, id: ProgramId) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let deleted = delete_program_rows(&tx, id)?;
        tx.commit()?;
        Ok(deleted)
    }

    // Program ownership

    fn add_program_owner(&self, user_id: &str, program_id: ProgramId) -> Result<bool> {
        let rows = self.conn().execute(
            "INSERT OR IGNORE INTO user_programs (user_id, program_id) VALUES (?1, ?2)",
            params![user_id, program_id],
        )?;
        Ok(rows > 0)
    }

    fn remove_program_owner(&self, user_id: &str, program_id: ProgramId) -> Result<Unlinked> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM user_programs WHERE user_id = ?1 AND program_id = ?2",
            params![user_id, program_id],
        )? > 0;

        let remaining: i64 = tx.query_row(
            "SELECT COUNT(*) FROM user_programs WHERE program_id = ?1",
            params![program_id],
            |row| row.get(0),
        )?;

        let pruned = remaining == 0 && delete_program_rows(&tx, program_id)?;

        tx.commit()?;
        Ok(Unlinked { removed, pruned })
    }

    fn list_program_owners(&self, program_id: ProgramId) -> Result<Vec<String>> {
        let conn = self.conn();
        query_column(
            &conn,
            "SELECT user_id FROM user_programs WHERE program_id = ?1 ORDER BY user_id",
            params![program_id],
        )
        .map_err(Error::from)
    }

    // Level operations

    fn append_level(&self, program_id: ProgramId, level: &NewLevel) -> Result<Level> {
        let mut conn = self.conn();
        let tx = write_tx(&mut conn)?;

        if !program_exists(&tx, program_id)? {
            return Err(Error::NotFound);
        }
        let list_index = ordering::next_index(&dense_levels(&tx, program_id)?);
        tx.execute(
            "INSERT INTO levels (program_id, title, description, list_index) VALUES (?1, ?2, ?3, ?4)",
            params![program_id, level.title, level.description, list_index],
        )?;
        let id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(Level {
            id,
            program_id,
            title: level.title.clone(),
            description: level.description.clone(),
            list_index,
        })
    }

    fn get_level(&self, id: LevelId) -> Result<Option<Level>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LEVEL_COLUMNS} FROM levels WHERE id = ?1"),
            params![id],
            level_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_levels(&self, program_id: ProgramId) -> Result<Vec<Level>> {
        query_levels(&self.conn(), program_id).map_err(Error::from)
    }

    fn ordered_levels(&self, program_id: ProgramId) -> Result<Vec<Level>> {
        let mut conn = self.conn();
        let tx = write_tx(&mut conn)?;
        let levels = dense_levels(&tx, program_id)?;
        tx.commit()?;
        Ok(levels)
    }

    fn update_level(&self, level: &Level) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE levels SET title = ?1, description = ?2 WHERE id = ?3",
            params![level.title, level.description, level.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn move_level(&self, program_id: ProgramId, level_id: LevelId, new_index: i64) -> Result<Vec<Level>> {
        let mut conn = self.conn();
        let tx = write_tx(&mut conn)?;

        let mut levels = dense_levels(&tx, program_id)?;
        let changes = ordering::plan_move(&levels, level_id, new_index)?;
        apply_index_changes(&tx, &changes)?;

        tx.commit()?;
        ordering::apply_changes(&mut levels, &changes);
        levels.sort_by_key(|l| l.list_index);
        Ok(levels)
    }

    fn delete_level(&self, program_id: ProgramId, level_id: LevelId) -> Result<bool> {
        let mut conn = self.conn();
        let tx = write_tx(&mut conn)?;

        let levels = dense_levels(&tx, program_id)?;
        let changes = match ordering::plan_delete(&levels, level_id) {
            Ok(changes) => changes,
            Err(Error::NotFound) => return Ok(false),
            Err(e) => return Err(e),
        };
        tx.execute("DELETE FROM levels WHERE id = ?1", params![level_id])?;
        apply_index_changes(&tx, &changes)?;

        tx.commit()?;
        Ok(true)
    }

    // Camp operations

    fn create_camp(&self, camp: &NewCamp) -> Result<Camp> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO camps (program_id, starts_on, ends_on) VALUES (?1, ?2, ?3)",
            params![camp.program_id, camp.starts_on, camp.ends_on],
        )?;

        Ok(Camp {
            id: conn.last_insert_rowid(),
            program_id: camp.program_id,
            starts_on: camp.starts_on,
            ends_on: camp.ends_on,
            roster: Roster::default(),
        })
    }

    fn get_camp(&self, id: CampId) -> Result<Option<Camp>> {
        let conn = self.conn();
        let camp = conn
            .query_row(
                &format!("SELECT {CAMP_COLUMNS} FROM camps c WHERE c.id = ?1"),
                params![id],
                camp_from_row,
            )
            .optional()?;

        match camp {
            Some(mut camp) => {
                camp.roster = load_roster(&conn, camp.id)?;
                Ok(Some(camp))
            }
            None => Ok(None),
        }
    }

    fn list_camps(&self) -> Result<Vec<Camp>> {
        let conn = self.conn();
        query_camps(
            &conn,
            &format!("SELECT {CAMP_COLUMNS} FROM camps c ORDER BY c.starts_on, c.id"),
            [],
        )
        .map_err(Error::from)
    }

    fn list_instructor_camps(&self, user_id: &str) -> Result<Vec<Camp>> {
        let conn = self.conn();
        query_camps(
            &conn,
            &format!(
                "SELECT {CAMP_COLUMNS} FROM camps c
                 JOIN camp_instructors ci ON c.id = ci.camp_id
                 WHERE ci.user_id = ?1
                 ORDER BY c.starts_on, c.id"
            ),
            params![user_id],
        )
        .map_err(Error::from)
    }

    fn update_camp(&self, camp: &Camp) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE camps SET program_id = ?1, starts_on = ?2, ends_on = ?3 WHERE id = ?4",
            params![camp.program_id, camp.starts_on, camp.ends_on, camp.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_camp(&self, id: CampId) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM camp_instructors WHERE camp_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM camps WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    fn edit_roster(
        &self,
        camp_id: CampId,
        edit: &mut dyn FnMut(&mut Roster) -> bool,
    ) -> Result<(Camp, bool)> {
        let mut conn = self.conn();
        let tx = write_tx(&mut conn)?;

        let mut camp = tx
            .query_row(
                &format!("SELECT {CAMP_COLUMNS} FROM camps c WHERE c.id = ?1"),
                params![camp_id],
                camp_from_row,
            )
            .optional()?
            .ok_or(Error::NotFound)?;
        camp.roster = load_roster(&tx, camp_id)?;

        let changed = edit(&mut camp.roster);
        if changed {
            tx.execute(
                "DELETE FROM camp_instructors WHERE camp_id = ?1",
                params![camp_id],
            )?;
            for (position, (user_id, is_primary)) in camp.roster.rows().enumerate() {
                tx.execute(
                    "INSERT INTO camp_instructors (camp_id, user_id, is_primary, position)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![camp_id, user_id, is_primary, position as i64],
                )?;
            }
        }

        tx.commit()?;
        Ok((camp, changed))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            full_name: "Ada Lovelace".to_string(),
            picture: String::new(),
            primary_email: format!("{id}@example.com"),
            other_emails: Vec::new(),
            roles: BTreeSet::from([GUARDIAN.to_string()]),
            student_ids: Vec::new(),
            program_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn new_student(name: &str) -> NewStudent {
        NewStudent {
            name: name.to_string(),
            birthdate: NaiveDate::from_ymd_opt(2015, 4, 2).unwrap(),
            school: "Lincoln".to_string(),
            grade: Some(Grade::new(4).unwrap()),
        }
    }

    fn new_program(title: &str) -> NewProgram {
        NewProgram {
            title: title.to_string(),
            grade_range: GradeRange::new(Grade::KINDERGARTEN, Grade::new(2).unwrap()).unwrap(),
            duration: Duration::Full,
            tags: String::new(),
            description: String::new(),
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        // Schema is idempotent
        store.initialize().unwrap();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "role_permissions",
            "users",
            "user_emails",
            "user_roles",
            "students",
            "user_students",
            "programs",
            "user_programs",
            "levels",
            "camps",
            "camp_instructors",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_user_roundtrip_with_relations() {
        let store = store();
        let mut u = user("100");
        u.other_emails = vec!["ada@work.example".to_string()];
        u.roles.insert(INSTRUCTOR.to_string());
        store.create_user(&u).unwrap();

        let fetched = store.get_user("100").unwrap().unwrap();
        assert_eq!(fetched.primary_email, "100@example.com");
        assert_eq!(fetched.other_emails, vec!["ada@work.example".to_string()]);
        assert!(fetched.is_instructor());
        assert_eq!(store.count_users().unwrap(), 1);

        assert!(store.get_user("nope").unwrap().is_none());
        assert!(store.delete_user("100").unwrap());
        assert!(!store.delete_user("100").unwrap());
    }

    #[test]
    fn test_student_crud() {
        let store = store();
        let student = store.create_student(&new_student("Grace")).unwrap();

        let mut fetched = store.get_student(student.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Grace");
        assert_eq!(fetched.grade, Some(Grade::new(4).unwrap()));

        fetched.school = "Roosevelt".to_string();
        store.update_student(&fetched).unwrap();
        assert_eq!(store.get_student(student.id).unwrap().unwrap().school, "Roosevelt");

        assert!(store.delete_student(student.id).unwrap());
        assert!(!store.delete_student(student.id).unwrap());
        assert!(matches!(store.update_student(&fetched), Err(Error::NotFound)));
    }

    #[test]
    fn test_remove_last_guardian_prunes_student() {
        let store = store();
        store.create_user(&user("a")).unwrap();
        store.create_user(&user("b")).unwrap();
        let student = store.create_student(&new_student("Kid")).unwrap();
        assert!(store.add_guardian("a", student.id).unwrap());
        assert!(store.add_guardian("b", student.id).unwrap());
        assert!(!store.add_guardian("b", student.id).unwrap());

        let first = store.remove_guardian("a", student.id).unwrap();
        assert_eq!(first, Unlinked { removed: true, pruned: false });
        assert!(store.get_student(student.id).unwrap().is_some());

        let last = store.remove_guardian("b", student.id).unwrap();
        assert_eq!(last, Unlinked { removed: true, pruned: true });
        assert!(store.get_student(student.id).unwrap().is_none());

        // Repeating the unlink is harmless
        let again = store.remove_guardian("b", student.id).unwrap();
        assert_eq!(again, Unlinked::default());
    }

    #[test]
    fn test_delete_program_cascades_levels_and_camps() {
        let store = store();
        store.create_user(&user("i")).unwrap();
        let program = store.create_program(&new_program("Chess")).unwrap();
        store.add_program_owner("i", program.id).unwrap();
        let level = store
            .append_level(
                program.id,
                &NewLevel {
                    title: "Openings".to_string(),
                    description: String::new(),
                },
            )
            .unwrap();
        let camp = store
            .create_camp(&NewCamp {
                program_id: program.id,
                starts_on: None,
                ends_on: None,
            })
            .unwrap();

        assert!(store.delete_program(program.id).unwrap());
        assert!(store.get_level(level.id).unwrap().is_none());
        assert!(store.get_camp(camp.id).unwrap().is_none());
        assert!(store.list_user_programs("i").unwrap().is_empty());
    }

    #[test]
    fn test_level_defaults_for_missing_fields() {
        let store = store();
        let program = store.create_program(&new_program("Art")).unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO levels (program_id, title) VALUES (?1, 'Sketching')",
                params![program.id],
            )
            .unwrap();

        let levels = store.list_levels(program.id).unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].description, "");
        assert_eq!(levels[0].list_index, 0);
    }

    #[test]
    fn test_ordered_levels_repairs_clashing_indices() {
        let store = store();
        let program = store.create_program(&new_program("Art")).unwrap();
        for title in ["A", "B"] {
            store
                .append_level(
                    program.id,
                    &NewLevel {
                        title: title.to_string(),
                        description: String::new(),
                    },
                )
                .unwrap();
        }
        for title in ["C", "D"] {
            store
                .conn()
                .execute(
                    "INSERT INTO levels (program_id, title, list_index) VALUES (?1, ?2, 2)",
                    params![program.id, title],
                )
                .unwrap();
        }

        let levels = store.ordered_levels(program.id).unwrap();
        let indices: Vec<i64> = levels.iter().map(|l| l.list_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert_eq!(levels[0].title, "A");
        ordering::check_dense(&store.list_levels(program.id).unwrap()).unwrap();

        let appended = store
            .append_level(
                program.id,
                &NewLevel {
                    title: "E".to_string(),
                    description: String::new(),
                },
            )
            .unwrap();
        assert_eq!(appended.list_index, 5);
    }

    #[test]
    fn test_edit_roster_missing_camp_is_not_found() {
        let store = store();
        let result = store.edit_roster(404, &mut |roster: &mut Roster| roster.add("x"));
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[test]
    fn test_roster_persists_order_and_primary() {
        let store = store();
        for id in ["x", "y", "z"] {
            store.create_user(&user(id)).unwrap();
        }
        let program = store.create_program(&new_program("Swim")).unwrap();
        let camp = store
            .create_camp(&NewCamp {
                program_id: program.id,
                starts_on: NaiveDate::from_ymd_opt(2025, 6, 16),
                ends_on: NaiveDate::from_ymd_opt(2025, 6, 20),
            })
            .unwrap();

        let (edited, changed) = store
            .edit_roster(camp.id, &mut |roster: &mut Roster| {
                roster.add("z");
                roster.add("x");
                roster.add("y");
                roster.make_primary("x")
            })
            .unwrap();
        assert!(changed);
        let roster = edited.roster;

        let fetched = store.get_camp(camp.id).unwrap().unwrap();
        assert_eq!(fetched.roster, roster);
        assert_eq!(fetched.starts_on, NaiveDate::from_ymd_opt(2025, 6, 16));
        assert_eq!(store.list_instructor_camps("y").unwrap().len(), 1);
    }

    #[test]
    fn test_seed_and_list_roles() {
        let store = store();
        let roles = vec![Role {
            name: GUARDIAN.to_string(),
            permissible_endpoints: BTreeMap::from([("/students".to_string(), "Students".to_string())]),
        }];
        store.seed_roles(&roles).unwrap();
        store.seed_roles(&roles).unwrap();

        assert_eq!(store.list_roles().unwrap(), roles);
    }
}
