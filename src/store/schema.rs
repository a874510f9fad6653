pub const SCHEMA: &str = r#"
-- Reference data: which endpoints each role may reach
CREATE TABLE IF NOT EXISTS role_permissions (
    role TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    endpoint_title TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (role, endpoint)
);

-- Users are keyed by their identity provider subject id
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    given_name TEXT NOT NULL DEFAULT '',
    family_name TEXT NOT NULL DEFAULT '',
    full_name TEXT NOT NULL DEFAULT '',
    picture TEXT NOT NULL DEFAULT '',
    primary_email TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Secondary emails; the primary one lives on the users row
CREATE TABLE IF NOT EXISTS user_emails (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    email TEXT NOT NULL,
    PRIMARY KEY (user_id, email)
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    PRIMARY KEY (user_id, role)
);

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    birthdate TEXT NOT NULL,       -- YYYY-MM-DD
    school TEXT NOT NULL DEFAULT '',
    grade INTEGER                  -- 0 = K, NULL = unknown
);

-- Guardianship (many-to-many); a student with no rows here is an orphan
CREATE TABLE IF NOT EXISTS user_students (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, student_id)
);

CREATE TABLE IF NOT EXISTS programs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    from_grade INTEGER NOT NULL,
    to_grade INTEGER NOT NULL,
    duration TEXT NOT NULL,        -- 'half' | 'full'
    tags TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT ''
);

-- Program ownership by instructors (many-to-many)
CREATE TABLE IF NOT EXISTS user_programs (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    program_id INTEGER NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, program_id)
);

-- Levels belong to exactly one program; list_index is dense 1..N per program
CREATE TABLE IF NOT EXISTS levels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    program_id INTEGER NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    list_index INTEGER
);

CREATE TABLE IF NOT EXISTS camps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    program_id INTEGER NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
    starts_on TEXT,
    ends_on TEXT
);

-- Camp roster; position preserves the order instructors were added
CREATE TABLE IF NOT EXISTS camp_instructors (
    camp_id INTEGER NOT NULL REFERENCES camps(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    is_primary INTEGER NOT NULL DEFAULT 0,
    position INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (camp_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_user_students_student ON user_students(student_id);
CREATE INDEX IF NOT EXISTS idx_user_programs_program ON user_programs(program_id);
CREATE INDEX IF NOT EXISTS idx_levels_program ON levels(program_id, list_index);
CREATE INDEX IF NOT EXISTS idx_camps_program ON camps(program_id);
CREATE INDEX IF NOT EXISTS idx_camp_instructors_user ON camp_instructors(user_id);
"#;
