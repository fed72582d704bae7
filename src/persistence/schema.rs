//! Embedded DDL (§6). Applied idempotently on startup via `CREATE TABLE IF NOT EXISTS`.

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS exchanges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exchange_id INTEGER NOT NULL REFERENCES exchanges(id),
    symbol TEXT NOT NULL,
    UNIQUE(exchange_id, symbol)
);

CREATE TABLE IF NOT EXISTS market_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exchange_id INTEGER NOT NULL REFERENCES exchanges(id),
    symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    timeframe TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    UNIQUE(exchange_id, symbol_id, timeframe, timestamp)
);

CREATE INDEX IF NOT EXISTS idx_market_data_window ON market_data(exchange_id, symbol_id, timeframe, timestamp);

CREATE TABLE IF NOT EXISTS populations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    symbol TEXT NOT NULL,
    interval TEXT NOT NULL,
    current_generation INTEGER NOT NULL DEFAULT 0,
    size INTEGER NOT NULL,
    rng_seed INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chromosomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    population_id INTEGER NOT NULL REFERENCES populations(id),
    generation INTEGER NOT NULL,
    fingerprint TEXT NOT NULL,
    fitness REAL,
    performance_metrics TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    parent1_id INTEGER REFERENCES chromosomes(id),
    parent2_id INTEGER REFERENCES chromosomes(id),
    weight_distribution TEXT,
    mutation_stats TEXT,
    fitness_history TEXT,
    last_test_date TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chromosomes_population ON chromosomes(population_id);
CREATE INDEX IF NOT EXISTS idx_chromosomes_fingerprint ON chromosomes(fingerprint);
CREATE INDEX IF NOT EXISTS idx_chromosomes_status ON chromosomes(population_id, status);

CREATE TABLE IF NOT EXISTS chromosome_genes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chromosome_id INTEGER NOT NULL REFERENCES chromosomes(id),
    gene_type TEXT NOT NULL,
    params TEXT NOT NULL,
    weight REAL NOT NULL,
    risk_factor REAL NOT NULL,
    UNIQUE(chromosome_id, gene_type)
);

CREATE TABLE IF NOT EXISTS gene_parameters (
    gene_type TEXT NOT NULL,
    parameter_name TEXT NOT NULL,
    default_value TEXT,
    constraint_json TEXT,
    PRIMARY KEY (gene_type, parameter_name)
);

CREATE TABLE IF NOT EXISTS generation_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    population_id INTEGER NOT NULL REFERENCES populations(id),
    generation INTEGER NOT NULL,
    stats TEXT NOT NULL,
    weight_distribution TEXT,
    mutation_stats TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(population_id, generation)
);
"#;
