use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::{
    db::{
        connection::{AccessMode, Database},
        helpers::{decode_vector, encode_vector, to_i64, to_u64},
        models::{ClassPrototype, ReferenceRecord},
    },
    vision::FeatureVector,
};

fn row_to_reference(row: &Row) -> Result<ReferenceRecord> {
    let blob: Vec<u8> = row.get("feature")?;
    let id: i64 = row.get("id")?;

    Ok(ReferenceRecord {
        id,
        label: row.get("label")?,
        source_path: row.get("file_path")?,
        vector: FeatureVector::new(
            decode_vector(&blob, "feature")
                .with_context(|| format!("corrupt feature for record {id}"))?,
        ),
    })
}

fn row_to_prototype(row: &Row) -> Result<ClassPrototype> {
    let blob: Vec<u8> = row.get("feature")?;
    let label: String = row.get("label")?;
    let vector = decode_vector(&blob, "feature")
        .with_context(|| format!("corrupt prototype for label {label}"))?;

    Ok(ClassPrototype {
        label,
        vector: FeatureVector::new(vector),
        sample_count: to_u64(row.get("sample_count")?, "sample_count")?,
    })
}

impl Database {
    /// Store one reference embedding and return its id.
    pub async fn insert_reference(
        &self,
        label: &str,
        source_path: &str,
        vector: &FeatureVector,
    ) -> Result<i64> {
        let label = label.to_string();
        let source_path = source_path.to_string();
        let blob = encode_vector(vector.as_slice());

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO features (file_path, label, feature) VALUES (?1, ?2, ?3)",
                params![source_path, label, blob],
            )
            .context("failed to insert reference feature")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// All reference embeddings, ordered by id.
    pub async fn load_reference_records(&self) -> Result<Vec<ReferenceRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, file_path, label, feature FROM features ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_reference(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Replace the whole prototype table in one transaction.
    pub async fn replace_prototypes(&self, prototypes: &[ClassPrototype]) -> Result<()> {
        let prototypes = prototypes.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM prototypes", [])?;
            for prototype in &prototypes {
                tx.execute(
                    "INSERT INTO prototypes (label, feature, sample_count) VALUES (?1, ?2, ?3)",
                    params![
                        prototype.label,
                        encode_vector(prototype.vector.as_slice()),
                        to_i64(prototype.sample_count)?,
                    ],
                )
                .with_context(|| format!("failed to store prototype {}", prototype.label))?;
            }
            tx.commit().context("failed to commit prototypes")?;
            Ok(())
        })
        .await
    }

    pub async fn load_prototypes(&self) -> Result<Vec<ClassPrototype>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT label, feature, sample_count FROM prototypes ORDER BY label ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut prototypes = Vec::new();
            while let Some(row) = rows.next()? {
                prototypes.push(row_to_prototype(row)?);
            }
            Ok(prototypes)
        })
        .await
    }
}
