use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u64},
    models::StepRecord,
};

fn row_to_step(row: &Row) -> Result<StepRecord> {
    let iteration: i64 = row.get("iteration")?;
    let success: i64 = row.get("success")?;
    let total_ms: i64 = row.get("total_ms")?;
    let created_at: String = row.get("created_at")?;

    Ok(StepRecord {
        id: row.get("id")?,
        run_id: row.get("run_id")?,
        iteration: u32::try_from(iteration).context("iteration out of range")?,
        action: row.get("action")?,
        success: success != 0,
        message: row.get("message")?,
        prediction_result: row.get("prediction_result")?,
        goal_error: row.get("goal_error")?,
        total_ms: to_u64(total_ms, "total_ms")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn insert_step_record(&self, record: &StepRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO step_records (id, run_id, iteration, action, success, message, prediction_result, goal_error, total_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    record.run_id,
                    i64::from(record.iteration),
                    record.action,
                    record.success,
                    record.message,
                    record.prediction_result,
                    record.goal_error,
                    to_i64(record.total_ms)?,
                    record.created_at.to_rfc3339(),
                ],
            )
            .context("failed to insert step record")?;
            Ok(())
        })
        .await
    }

    pub async fn get_step_records(&self, run_id: &str) -> Result<Vec<StepRecord>> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, run_id, iteration, action, success, message, prediction_result, goal_error, total_ms, created_at
                 FROM step_records
                 WHERE run_id = ?1
                 ORDER BY iteration ASC",
            )?;

            let mut rows = stmt.query(params![run_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_step(row)?);
            }
            Ok(records)
        })
        .await
    }
}
