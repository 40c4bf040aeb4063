//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Multiple statements need the simple query protocol
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Import batches (one per batch request or uploaded file)
CREATE TABLE IF NOT EXISTS import_batches (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    source VARCHAR(20) NOT NULL,
    filename VARCHAR(500),
    total_records INT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Scored anomalies
CREATE TABLE IF NOT EXISTS anomalies (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    num_equipement VARCHAR(255) NOT NULL,
    description TEXT,
    service VARCHAR(255),
    date_detection DATE,
    description_equipement TEXT,
    section_proprietaire VARCHAR(255),
    status VARCHAR(20) NOT NULL DEFAULT 'nouvelle',
    ai_fiabilite_integrite_score SMALLINT NOT NULL CHECK (ai_fiabilite_integrite_score BETWEEN 1 AND 5),
    ai_disponibilite_score SMALLINT NOT NULL CHECK (ai_disponibilite_score BETWEEN 1 AND 5),
    ai_process_safety_score SMALLINT NOT NULL CHECK (ai_process_safety_score BETWEEN 1 AND 5),
    ai_criticality_level SMALLINT NOT NULL CHECK (ai_criticality_level BETWEEN 3 AND 15),
    import_batch_id UUID REFERENCES import_batches(id) ON DELETE SET NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_anomalies_created ON anomalies(created_at);
CREATE INDEX IF NOT EXISTS idx_anomalies_equipment ON anomalies(num_equipement);
CREATE INDEX IF NOT EXISTS idx_anomalies_batch ON anomalies(import_batch_id);
CREATE INDEX IF NOT EXISTS idx_anomalies_criticality ON anomalies(ai_criticality_level);
"#;
