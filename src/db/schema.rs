use sqlx::PgPool;

pub async fn initialize_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tracked_tokens (
            chain_id BIGINT NOT NULL,
            token TEXT NOT NULL,
            from_block BIGINT,
            to_block BIGINT,
            error TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (chain_id, token)
        )",
    )
    .execute(pool)
    .await?;

    // No CHECK on balance: the writer's atomic upsert must be able to
    // observe a transient negative via RETURNING before it rolls the
    // transaction back. Committed rows are always positive.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS token_holders (
            chain_id BIGINT NOT NULL,
            token TEXT NOT NULL,
            holder TEXT NOT NULL,
            balance NUMERIC(78,0) NOT NULL,
            PRIMARY KEY (chain_id, token, holder)
        )",
    )
    .execute(pool)
    .await?;

    // Serves the (balance DESC, holder ASC) keyset pagination.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_token_holders_ranked
            ON token_holders (chain_id, token, balance DESC, holder ASC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
