//! State log store: transition history plus the latest-state index.
//!
//! `latest_state_logs` is the only place "what state is X in" may be
//! answered; `state_logs` is the audit trail. Every transition appends a
//! state log row and overwrites (never appends) the latest pointer for
//! that (entity, flow) pair.

use std::collections::BTreeMap;

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::model::{EntityClass, Flow, Outcome, State, StateLog, StateLogEntity};

use super::helpers::{get_datetime, get_opt_uuid, now_rfc3339};
use super::schema::{LatestStateLogs, StateLogs};
use super::{Result, StorageError};

fn latest_entity_column(class: EntityClass) -> LatestStateLogs {
    match class {
        EntityClass::Payment => LatestStateLogs::PaymentId,
        EntityClass::Employee => LatestStateLogs::EmployeeId,
        EntityClass::ReferenceFile => LatestStateLogs::ReferenceFileId,
    }
}

fn entity_columns(entity: &StateLogEntity) -> (Option<String>, Option<String>, Option<String>) {
    let id = entity.id().to_string();
    match entity.class() {
        EntityClass::Payment => (Some(id), None, None),
        EntityClass::Employee => (None, Some(id), None),
        EntityClass::ReferenceFile => (None, None, Some(id)),
    }
}

fn decode_state_log(row: &SqliteRow) -> Result<StateLog> {
    let state_log_id: i64 = row.try_get("state_log_id")?;

    let flow_str: String = row.try_get("flow")?;
    let flow = Flow::from_db_str(&flow_str).ok_or_else(|| StorageError::UnknownEnumValue {
        kind: "flow",
        value: flow_str.clone(),
    })?;

    let parse_state = |value: Option<String>| -> Result<Option<State>> {
        match value {
            Some(value) => State::from_db_str(&value)
                .map(Some)
                .ok_or(StorageError::UnknownEnumValue {
                    kind: "state",
                    value,
                }),
            None => Ok(None),
        }
    };
    let start_state = parse_state(row.try_get("start_state")?)?;
    let end_state = parse_state(row.try_get("end_state")?)?;

    let outcome: Option<String> = row.try_get("outcome")?;
    let outcome = outcome
        .map(|raw| serde_json::from_str::<Outcome>(&raw))
        .transpose()?;

    let payment_id = get_opt_uuid(row, "payment_id")?;
    let employee_id = get_opt_uuid(row, "employee_id")?;
    let reference_file_id = get_opt_uuid(row, "reference_file_id")?;

    let set: Vec<StateLogEntity> = [
        payment_id.map(StateLogEntity::Payment),
        employee_id.map(StateLogEntity::Employee),
        reference_file_id.map(StateLogEntity::ReferenceFile),
    ]
    .into_iter()
    .flatten()
    .collect();

    if set.len() > 1 {
        return Err(StorageError::AmbiguousEntity {
            state_log_id,
            count: set.len(),
        });
    }

    Ok(StateLog {
        state_log_id,
        flow,
        start_state,
        end_state,
        outcome,
        entity: set.into_iter().next(),
        prev_state_log_id: row.try_get("prev_state_log_id")?,
        import_log_id: row.try_get("import_log_id")?,
        created_at: get_datetime(row, "created_at")?,
    })
}

fn select_state_log_columns() -> sea_query::SelectStatement {
    Query::select()
        .columns([
            (StateLogs::Table, StateLogs::StateLogId),
            (StateLogs::Table, StateLogs::Flow),
            (StateLogs::Table, StateLogs::StartState),
            (StateLogs::Table, StateLogs::EndState),
            (StateLogs::Table, StateLogs::Outcome),
            (StateLogs::Table, StateLogs::PaymentId),
            (StateLogs::Table, StateLogs::EmployeeId),
            (StateLogs::Table, StateLogs::ReferenceFileId),
            (StateLogs::Table, StateLogs::PrevStateLogId),
            (StateLogs::Table, StateLogs::ImportLogId),
            (StateLogs::Table, StateLogs::CreatedAt),
        ])
        .to_owned()
}

/// Append a transition for `entity` and repoint the latest-state index.
///
/// `start_state` is the previous head's end state, or `None` at genesis;
/// `prev_state_log_id` links the new row into the entity's linear history.
pub async fn create_state_log(
    conn: &mut SqliteConnection,
    end_state: State,
    outcome: Option<Outcome>,
    entity: StateLogEntity,
    import_log_id: Option<i64>,
) -> Result<StateLog> {
    let flow = end_state.flow();
    let prev = get_latest_state_log_in_flow(conn, &entity, flow).await?;

    let start_state = prev.as_ref().and_then(|p| p.end_state);
    let prev_state_log_id = prev.as_ref().map(|p| p.state_log_id);
    let outcome_json = outcome
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let (payment_id, employee_id, reference_file_id) = entity_columns(&entity);
    let created_at = now_rfc3339();

    let sql = Query::insert()
        .into_table(StateLogs::Table)
        .columns([
            StateLogs::Flow,
            StateLogs::StartState,
            StateLogs::EndState,
            StateLogs::Outcome,
            StateLogs::PaymentId,
            StateLogs::EmployeeId,
            StateLogs::ReferenceFileId,
            StateLogs::PrevStateLogId,
            StateLogs::ImportLogId,
            StateLogs::CreatedAt,
        ])
        .values_panic([
            flow.as_db_str().into(),
            start_state.map(|s| s.as_db_str().to_string()).into(),
            end_state.as_db_str().into(),
            outcome_json.clone().into(),
            payment_id.clone().into(),
            employee_id.clone().into(),
            reference_file_id.clone().into(),
            prev_state_log_id.into(),
            import_log_id.into(),
            created_at.clone().into(),
        ])
        .to_string(SqliteQueryBuilder);

    let state_log_id = sqlx::query(&sql).execute(&mut *conn).await?.last_insert_rowid();

    match prev {
        Some(_) => {
            let sql = Query::update()
                .table(LatestStateLogs::Table)
                .value(LatestStateLogs::StateLogId, state_log_id)
                .and_where(Expr::col(LatestStateLogs::Flow).eq(flow.as_db_str()))
                .and_where(
                    Expr::col(latest_entity_column(entity.class())).eq(entity.id().to_string()),
                )
                .to_string(SqliteQueryBuilder);
            sqlx::query(&sql).execute(&mut *conn).await?;
        }
        None => {
            let sql = Query::insert()
                .into_table(LatestStateLogs::Table)
                .columns([
                    LatestStateLogs::StateLogId,
                    LatestStateLogs::Flow,
                    LatestStateLogs::PaymentId,
                    LatestStateLogs::EmployeeId,
                    LatestStateLogs::ReferenceFileId,
                ])
                .values_panic([
                    state_log_id.into(),
                    flow.as_db_str().into(),
                    payment_id.into(),
                    employee_id.into(),
                    reference_file_id.into(),
                ])
                .to_string(SqliteQueryBuilder);
            sqlx::query(&sql).execute(&mut *conn).await?;
        }
    }

    Ok(StateLog {
        state_log_id,
        flow,
        start_state,
        end_state: Some(end_state),
        outcome,
        entity: Some(entity),
        prev_state_log_id,
        import_log_id,
        created_at: chrono::Utc::now(),
    })
}

/// Current head state log for an (entity, flow) pair. Single indexed
/// lookup through `latest_state_logs`.
pub async fn get_latest_state_log_in_flow(
    conn: &mut SqliteConnection,
    entity: &StateLogEntity,
    flow: Flow,
) -> Result<Option<StateLog>> {
    let sql = select_state_log_columns()
        .from(LatestStateLogs::Table)
        .inner_join(
            StateLogs::Table,
            Expr::col((LatestStateLogs::Table, LatestStateLogs::StateLogId))
                .equals((StateLogs::Table, StateLogs::StateLogId)),
        )
        .and_where(Expr::col((LatestStateLogs::Table, LatestStateLogs::Flow)).eq(flow.as_db_str()))
        .and_where(
            Expr::col((LatestStateLogs::Table, latest_entity_column(entity.class())))
                .eq(entity.id().to_string()),
        )
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
    row.as_ref().map(decode_state_log).transpose()
}

/// Work-queue read: every entity of `class` currently waiting in
/// `end_state`, in creation order.
pub async fn get_all_latest_state_logs_in_end_state(
    conn: &mut SqliteConnection,
    class: EntityClass,
    end_state: State,
) -> Result<Vec<StateLog>> {
    let sql = select_state_log_columns()
        .from(LatestStateLogs::Table)
        .inner_join(
            StateLogs::Table,
            Expr::col((LatestStateLogs::Table, LatestStateLogs::StateLogId))
                .equals((StateLogs::Table, StateLogs::StateLogId)),
        )
        .and_where(
            Expr::col((StateLogs::Table, StateLogs::EndState)).eq(end_state.as_db_str()),
        )
        .and_where(
            Expr::col((LatestStateLogs::Table, latest_entity_column(class))).is_not_null(),
        )
        .order_by((StateLogs::Table, StateLogs::StateLogId), Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(decode_state_log).collect()
}

/// Tally of current states across all latest pointers, keyed by
/// "<flow> - <state>" description. Instrumentation, not business logic.
pub async fn get_state_counts(conn: &mut SqliteConnection) -> Result<BTreeMap<String, i64>> {
    let sql = Query::select()
        .column((StateLogs::Table, StateLogs::Flow))
        .column((StateLogs::Table, StateLogs::EndState))
        .expr_as(
            Expr::col((StateLogs::Table, StateLogs::StateLogId)).count(),
            sea_query::Alias::new("state_count"),
        )
        .from(LatestStateLogs::Table)
        .inner_join(
            StateLogs::Table,
            Expr::col((LatestStateLogs::Table, LatestStateLogs::StateLogId))
                .equals((StateLogs::Table, StateLogs::StateLogId)),
        )
        .group_by_col((StateLogs::Table, StateLogs::Flow))
        .group_by_col((StateLogs::Table, StateLogs::EndState))
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let flow_str: String = row.try_get("flow")?;
        let end_state: Option<String> = row.try_get("end_state")?;
        let count: i64 = row.try_get("state_count")?;

        let flow_desc = Flow::from_db_str(&flow_str)
            .map(|f| f.description().to_string())
            .unwrap_or(flow_str);
        let state_desc = match end_state {
            Some(value) => State::from_db_str(&value)
                .map(|s| s.description().to_string())
                .unwrap_or(value),
            None => "In flight".to_string(),
        };
        counts.insert(format!("{} - {}", flow_desc, state_desc), count);
    }
    Ok(counts)
}

/// Fetch a single state log row by id.
pub async fn get_state_log(
    conn: &mut SqliteConnection,
    state_log_id: i64,
) -> Result<Option<StateLog>> {
    let sql = select_state_log_columns()
        .from(StateLogs::Table)
        .and_where(Expr::col((StateLogs::Table, StateLogs::StateLogId)).eq(state_log_id))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
    row.as_ref().map(decode_state_log).transpose()
}

/// Full history for an (entity, flow) pair, newest first, by walking
/// `prev_state_log_id` from the current head.
pub async fn get_state_history(
    conn: &mut SqliteConnection,
    entity: &StateLogEntity,
    flow: Flow,
) -> Result<Vec<StateLog>> {
    let mut history = Vec::new();
    let mut cursor = get_latest_state_log_in_flow(conn, entity, flow).await?;
    while let Some(log) = cursor {
        let prev_id = log.prev_state_log_id;
        history.push(log);
        cursor = match prev_id {
            Some(id) => get_state_log(conn, id).await?,
            None => None,
        };
    }
    Ok(history)
}

/// Latest states for a set of payments, keyed by payment id. Used by
/// validators that need sibling payments' positions without N queries
/// at call sites that already hold the payments.
pub async fn get_latest_states_for_payments(
    conn: &mut SqliteConnection,
    payment_ids: &[Uuid],
    flow: Flow,
) -> Result<std::collections::HashMap<Uuid, StateLog>> {
    let mut map = std::collections::HashMap::new();
    for payment_id in payment_ids {
        let entity = StateLogEntity::Payment(*payment_id);
        if let Some(log) = get_latest_state_log_in_flow(conn, &entity, flow).await? {
            map.insert(*payment_id, log);
        }
    }
    Ok(map)
}
