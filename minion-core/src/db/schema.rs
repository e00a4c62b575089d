pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    name TEXT PRIMARY KEY,
    agent_class TEXT NOT NULL DEFAULT 'coder' CHECK (agent_class IN ('lead', 'coder', 'builder', 'oracle', 'recon')),
    model TEXT,
    registered_at TEXT,
    last_seen TEXT,
    last_inbox_check TEXT,
    context_updated_at TEXT,
    description TEXT,
    status TEXT DEFAULT 'waiting for work',
    context TEXT,
    context_tokens_used INTEGER,
    context_tokens_limit INTEGER,
    transport TEXT NOT NULL DEFAULT 'terminal' CHECK (transport IN ('terminal', 'daemon'))
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_agent TEXT NOT NULL,
    to_agent TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    read_flag INTEGER NOT NULL DEFAULT 0,
    is_cc INTEGER NOT NULL DEFAULT 0,
    cc_original_to TEXT
);

CREATE TABLE IF NOT EXISTS broadcast_reads (
    agent_name TEXT NOT NULL,
    message_id INTEGER NOT NULL,
    PRIMARY KEY (agent_name, message_id)
);

CREATE TABLE IF NOT EXISTS battle_plan (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    set_by TEXT NOT NULL,
    plan TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'superseded', 'completed', 'abandoned', 'obsolete')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS raid_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_name TEXT NOT NULL,
    entry TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'normal' CHECK (priority IN ('low', 'normal', 'high', 'critical')),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    task_file TEXT NOT NULL,
    project TEXT,
    zone TEXT,
    status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'assigned', 'in_progress', 'fixed', 'verified', 'closed', 'abandoned', 'stale', 'obsolete')),
    blocked_by JSON NOT NULL DEFAULT '[]',
    assigned_to TEXT,
    created_by TEXT NOT NULL,
    files JSON NOT NULL DEFAULT '[]',
    progress TEXT,
    activity_count INTEGER NOT NULL DEFAULT 0,
    result_file TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS file_claims (
    file_path TEXT PRIMARY KEY,
    holder TEXT NOT NULL,
    claimed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS file_waitlist (
    file_path TEXT NOT NULL,
    agent_name TEXT NOT NULL,
    added_at TEXT NOT NULL,
    PRIMARY KEY (file_path, agent_name)
);

CREATE TABLE IF NOT EXISTS fenix_down (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_name TEXT NOT NULL,
    files JSON NOT NULL DEFAULT '[]',
    manifest TEXT NOT NULL,
    consumed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS flags (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0,
    set_by TEXT,
    set_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_messages_to_read ON messages(to_agent, read_flag);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_raid_log_created ON raid_log(created_at);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_assigned ON tasks(assigned_to);
CREATE INDEX IF NOT EXISTS idx_file_claims_holder ON file_claims(holder);
CREATE INDEX IF NOT EXISTS idx_fenix_down_agent ON fenix_down(agent_name, consumed);

-- Only one active battle plan at a time
CREATE UNIQUE INDEX IF NOT EXISTS idx_one_active_plan
    ON battle_plan(status) WHERE status = 'active';
"#;
