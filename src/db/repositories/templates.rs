use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{connection::Database, helpers::parse_datetime, models::TemplateRecord};
use crate::templates::ElementType;

fn row_to_template(row: &Row) -> Result<TemplateRecord> {
    let element_type: String = row.get("element_type")?;
    let image_path: String = row.get("image_path")?;
    let created_at: String = row.get("created_at")?;

    Ok(TemplateRecord {
        signature: row.get("signature")?,
        name: row.get("name")?,
        element_type: ElementType::parse(&element_type),
        image_path: PathBuf::from(image_path),
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Upserts by signature so a re-promoted element keeps one row.
    pub async fn insert_runtime_template(&self, record: &TemplateRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO runtime_templates (signature, name, element_type, image_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(signature) DO UPDATE SET
                     name = excluded.name,
                     image_path = excluded.image_path",
                params![
                    record.signature,
                    record.name,
                    record.element_type.as_str(),
                    record.image_path.to_string_lossy(),
                    record.created_at.to_rfc3339(),
                ],
            )
            .context("failed to insert runtime template")?;
            Ok(())
        })
        .await
    }

    pub async fn load_runtime_templates(&self) -> Result<Vec<TemplateRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT signature, name, element_type, image_path, created_at
                 FROM runtime_templates
                 ORDER BY created_at ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_template(row)?);
            }
            Ok(records)
        })
        .await
    }
}
