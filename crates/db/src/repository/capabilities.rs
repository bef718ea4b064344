//! Read access to the agent capability registry.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::CapabilityRow, DbError};

const CAPABILITY_COLUMNS: &str =
    "agent_id, agent_name, entry_reference, action, input_schema, output_schema, risk_level";

pub async fn get_capability(
    pool: &PgPool,
    agent_id: Uuid,
    action: &str,
) -> Result<CapabilityRow, DbError> {
    let sql = format!(
        "SELECT {CAPABILITY_COLUMNS} FROM agent_capabilities WHERE agent_id = $1 AND action = $2"
    );
    sqlx::query_as::<_, CapabilityRow>(&sql)
        .bind(agent_id)
        .bind(action)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Insert or replace a capability.
pub async fn upsert_capability(pool: &PgPool, capability: CapabilityRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO agent_capabilities
            (agent_id, agent_name, entry_reference, action, input_schema, output_schema, risk_level)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (agent_id, action) DO UPDATE
        SET agent_name = EXCLUDED.agent_name,
            entry_reference = EXCLUDED.entry_reference,
            input_schema = EXCLUDED.input_schema,
            output_schema = EXCLUDED.output_schema,
            risk_level = EXCLUDED.risk_level
        "#,
    )
    .bind(capability.agent_id)
    .bind(&capability.agent_name)
    .bind(&capability.entry_reference)
    .bind(&capability.action)
    .bind(&capability.input_schema)
    .bind(&capability.output_schema)
    .bind(capability.risk_level)
    .execute(pool)
    .await?;

    Ok(())
}
