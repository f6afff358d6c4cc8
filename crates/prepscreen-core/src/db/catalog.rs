//! Screening type catalog persistence.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::catalog::ScreeningTypeCatalog;
use crate::models::{Frequency, FrequencyUnit, Gender, ScreeningType};

/// Raw screening type row before JSON columns are decoded.
struct ScreeningTypeRow {
    id: String,
    name: String,
    description: Option<String>,
    frequency_count: i64,
    frequency_unit: String,
    min_age: Option<i64>,
    max_age: Option<i64>,
    gender: Option<String>,
    keywords: String,
    trigger_conditions: String,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ScreeningTypeRow> for ScreeningType {
    type Error = DbError;

    fn try_from(row: ScreeningTypeRow) -> Result<Self, Self::Error> {
        let unit = FrequencyUnit::parse(&row.frequency_unit).ok_or_else(|| {
            DbError::Constraint(format!("unknown frequency unit '{}'", row.frequency_unit))
        })?;
        let gender = row
            .gender
            .as_deref()
            .map(|g| {
                Gender::parse(g)
                    .ok_or_else(|| DbError::Constraint(format!("unknown gender '{}'", g)))
            })
            .transpose()?;

        Ok(ScreeningType {
            id: row.id,
            name: row.name,
            description: row.description,
            frequency: Frequency {
                count: row.frequency_count as u32,
                unit,
            },
            min_age: row.min_age.map(|v| v as u32),
            max_age: row.max_age.map(|v| v as u32),
            gender,
            keywords: serde_json::from_str(&row.keywords)?,
            trigger_conditions: serde_json::from_str(&row.trigger_conditions)?,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn read_type_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScreeningTypeRow> {
    Ok(ScreeningTypeRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        frequency_count: row.get(3)?,
        frequency_unit: row.get(4)?,
        min_age: row.get(5)?,
        max_age: row.get(6)?,
        gender: row.get(7)?,
        keywords: row.get(8)?,
        trigger_conditions: row.get(9)?,
        active: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

const TYPE_COLUMNS: &str = "id, name, description, frequency_count, frequency_unit, \
     min_age, max_age, gender, keywords, trigger_conditions, active, created_at, updated_at";

/// Insert or update a screening type on a raw connection (used inside
/// import transactions).
fn upsert_screening_type_tx(conn: &Connection, ty: &ScreeningType) -> DbResult<()> {
    let keywords = serde_json::to_string(&ty.keywords)?;
    let triggers = serde_json::to_string(&ty.trigger_conditions)?;
    conn.execute(
        r#"
        INSERT INTO screening_types (
            id, name, description, frequency_count, frequency_unit,
            min_age, max_age, gender, keywords, trigger_conditions,
            active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            frequency_count = excluded.frequency_count,
            frequency_unit = excluded.frequency_unit,
            min_age = excluded.min_age,
            max_age = excluded.max_age,
            gender = excluded.gender,
            keywords = excluded.keywords,
            trigger_conditions = excluded.trigger_conditions,
            active = excluded.active,
            updated_at = datetime('now')
        "#,
        params![
            ty.id,
            ty.name,
            ty.description,
            ty.frequency.count as i64,
            ty.frequency.unit.as_str(),
            ty.min_age.map(|v| v as i64),
            ty.max_age.map(|v| v as i64),
            ty.gender.map(|g| g.as_str()),
            keywords,
            triggers,
            ty.active,
            ty.created_at,
            ty.updated_at,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Insert or update a screening type by id.
    pub fn upsert_screening_type(&self, ty: &ScreeningType) -> DbResult<()> {
        upsert_screening_type_tx(&self.conn, ty)
    }

    /// Get a screening type by id.
    pub fn get_screening_type(&self, id: &str) -> DbResult<Option<ScreeningType>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM screening_types WHERE id = ?", TYPE_COLUMNS),
                [id],
                read_type_row,
            )
            .optional()?;
        row.map(ScreeningType::try_from).transpose()
    }

    /// Get a screening type by its unique name.
    pub fn get_screening_type_by_name(&self, name: &str) -> DbResult<Option<ScreeningType>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM screening_types WHERE name = ?",
                    TYPE_COLUMNS
                ),
                [name],
                read_type_row,
            )
            .optional()?;
        row.map(ScreeningType::try_from).transpose()
    }

    /// List all screening types, active and inactive, by name.
    pub fn list_screening_types(&self) -> DbResult<Vec<ScreeningType>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM screening_types ORDER BY name",
            TYPE_COLUMNS
        ))?;
        let rows = stmt.query_map([], read_type_row)?;
        rows.map(|r| r.map_err(DbError::from).and_then(ScreeningType::try_from))
            .collect()
    }

    /// Load and validate the full catalog.
    pub fn load_catalog(&self) -> DbResult<ScreeningTypeCatalog> {
        let types = self.list_screening_types()?;
        Ok(ScreeningTypeCatalog::new(types)?)
    }

    /// Soft-deactivate a screening type. Existing screening rows survive
    /// and get retired on the next reconcile.
    pub fn deactivate_screening_type(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE screening_types SET active = 0, updated_at = datetime('now') WHERE id = ?",
            [id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Hard-delete a screening type. Refused while screening rows still
    /// reference it; deactivate instead in that case.
    pub fn delete_screening_type(&self, id: &str) -> DbResult<()> {
        let references: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM screenings WHERE screening_type_id = ?",
            [id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(DbError::Constraint(format!(
                "screening type {} is referenced by {} screenings; deactivate it instead",
                id, references
            )));
        }
        let rows_affected = self
            .conn
            .execute("DELETE FROM screening_types WHERE id = ?", [id])?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("screening type {}", id)));
        }
        Ok(())
    }

    /// Import a batch of screening types in one transaction, matching on
    /// name: an existing type keeps its id so screening rows stay linked.
    pub fn import_screening_types(&mut self, types: &[ScreeningType]) -> DbResult<u32> {
        let tx = self.conn.transaction()?;
        let mut imported = 0u32;
        for ty in types {
            let existing_id: Option<String> = tx
                .query_row(
                    "SELECT id FROM screening_types WHERE name = ?",
                    [&ty.name],
                    |row| row.get(0),
                )
                .optional()?;
            match existing_id {
                Some(id) if id != ty.id => {
                    let mut adopted = ty.clone();
                    adopted.id = id;
                    upsert_screening_type_tx(&tx, &adopted)?;
                }
                _ => upsert_screening_type_tx(&tx, ty)?,
            }
            imported += 1;
        }
        tx.commit()?;
        Ok(imported)
    }
}
