//! Test databases shaped like the ones the agent tool writes
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    folder_name TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE branches (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id),
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE project_states (
    id TEXT PRIMARY KEY,
    branch_id TEXT NOT NULL REFERENCES branches(id),
    prev_state_id TEXT,
    step_index INTEGER NOT NULL,
    epics TEXT,
    tasks TEXT,
    steps TEXT,
    iterations TEXT,
    action TEXT
);
CREATE TABLE file_contents (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL
);
CREATE TABLE files (
    id INTEGER PRIMARY KEY,
    project_state_id TEXT NOT NULL REFERENCES project_states(id),
    content_id TEXT REFERENCES file_contents(id),
    path TEXT NOT NULL,
    meta TEXT
);
CREATE TABLE user_inputs (
    id INTEGER PRIMARY KEY,
    project_state_id TEXT NOT NULL,
    branch_id TEXT NOT NULL,
    question TEXT,
    answer_text TEXT,
    answer_button TEXT,
    cancelled INTEGER NOT NULL DEFAULT 0,
    created_at TEXT
);
CREATE TABLE llm_requests (
    id INTEGER PRIMARY KEY,
    project_state_id TEXT NOT NULL,
    branch_id TEXT NOT NULL,
    agent TEXT,
    provider TEXT,
    model TEXT,
    messages TEXT,
    response TEXT,
    prompt_tokens INTEGER,
    completion_tokens INTEGER,
    status TEXT,
    started_at TEXT
);
"#;

/// Two projects: `p1` (newest) with branches `b1` (newest) and `b0`, and `p0`
/// with branch `b2`. `b1` holds states `s1`..`s3`.
pub const SEED_SQL: &str = r#"
INSERT INTO projects VALUES ('p0', 'Older', 'older', '2024-05-01 09:00:00.000000');
INSERT INTO projects VALUES ('p1', 'Newer', 'newer', '2024-05-02 09:00:00.000000');

INSERT INTO branches VALUES ('b0', 'p1', 'main', '2024-05-02 08:00:00.000000');
INSERT INTO branches VALUES ('b1', 'p1', 'retry', '2024-05-02 12:00:00.000000');
INSERT INTO branches VALUES ('b2', 'p0', 'main', '2024-05-01 10:00:00.000000');

INSERT INTO project_states VALUES ('s0', 'b0', NULL, 1, NULL, NULL, NULL, NULL, 'init');
INSERT INTO project_states VALUES ('s1', 'b1', NULL, 1,
    '[{"name": "Initial Project"}]', '[{"description": "scaffold"}]', NULL, NULL, 'planning');
INSERT INTO project_states VALUES ('s2', 'b1', 's1', 2,
    '[{"name": "Auth"}]', '[{"description": "login page"}]', NULL, '[{"status": "check_logs"}]', 'task');
INSERT INTO project_states VALUES ('s3', 'b1', 's2', 3,
    '[{"name": "Auth"}]', '[{"description": "login form validation"}]', '[{"type": "save_file"}]', NULL, 'code');
INSERT INTO project_states VALUES ('s4', 'b2', NULL, 1, NULL, NULL, NULL, NULL, 'init');

INSERT INTO file_contents VALUES ('c1', 'fn login() {}');
INSERT INTO files VALUES (1, 's3', 'c1', 'src/login.rs', '{"description": "login"}');

INSERT INTO user_inputs VALUES (1, 's2', 'b1', 'Continue?', 'yes', 'continue', 0, '2024-05-02 12:30:00');

INSERT INTO llm_requests VALUES (1, 's2', 'b1', 'Architect', 'openai', 'gpt-4o',
    '[{"role": "system", "content": "plan"}]', 'ok', 10, 20, 'success', '2024-05-02 12:10:00');
INSERT INTO llm_requests VALUES (2, 's3', 'b1', 'Developer', 'anthropic', 'claude',
    '[{"role": "user", "content": "hi"}]', 'done', 5, 7, 'success', '2024-05-02 12:40:00');
"#;

pub fn memory_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory sqlite");
    conn.execute_batch(SCHEMA_SQL).expect("schema");
    conn
}

pub fn seed_hierarchy(conn: &Connection) {
    conn.execute_batch(SEED_SQL).expect("seed");
}

/// Seeded database file `name` inside `dir`.
pub fn seeded_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let conn = Connection::open(&path).expect("open fixture file");
    conn.execute_batch(SCHEMA_SQL).expect("schema");
    seed_hierarchy(&conn);
    path
}

/// Raw bytes of a seeded database, as a client would upload them.
pub fn seeded_bytes() -> Vec<u8> {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = seeded_file(dir.path(), "fixture.db");
    std::fs::read(path).expect("read fixture")
}
