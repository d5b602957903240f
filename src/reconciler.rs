use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension};

use crate::classifier;
use crate::models::RawMandateRow;

/// External reference id to internal mandate id.
pub type MandateMapping = HashMap<String, i64>;

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub mapping: MandateMapping,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

/// Upsert mandates by unique name, one row at a time so a failing row never
/// rolls back its siblings. `max_mandates` of zero means no quota.
pub fn reconcile_mandates(
    conn: &Connection,
    rows: &[RawMandateRow],
    max_mandates: usize,
) -> ReconcileOutcome {
    let mut out = ReconcileOutcome::default();
    for row in rows {
        match reconcile_one(conn, row, max_mandates) {
            Ok((id, created)) => {
                out.mapping.insert(row.id.trim().to_string(), id);
                if created {
                    out.created += 1;
                } else {
                    out.updated += 1;
                }
            }
            Err(e) => out.errors.push(e),
        }
    }
    out
}

fn reconcile_one(
    conn: &Connection,
    row: &RawMandateRow,
    max_mandates: usize,
) -> std::result::Result<(i64, bool), String> {
    if row.id.trim().is_empty() || row.name.trim().is_empty() || row.category.trim().is_empty() {
        return Err(format!(
            "Mandate row missing required fields (id='{}', name='{}')",
            row.id, row.name
        ));
    }
    let name = row.name.trim();
    let group = classifier::classify(&row.category)
        .ok_or_else(|| format!("Unknown category '{}' for mandate '{name}'", row.category))?;

    // Explicit existence check: classifying create vs update off timestamp
    // equality is unreliable at clock resolution.
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM mandates WHERE name = ?1", [name], |r| r.get(0))
        .optional()
        .map_err(|e| format!("Failed to look up mandate '{name}': {e}"))?;

    if existing.is_none() && max_mandates > 0 {
        let count: i64 = conn
            .query_row("SELECT count(*) FROM mandates", [], |r| r.get(0))
            .map_err(|e| format!("Failed to count mandates: {e}"))?;
        if count as usize >= max_mandates {
            return Err(format!(
                "Mandate quota reached ({max_mandates}); cannot create '{name}'"
            ));
        }
    }

    conn.execute(
        "INSERT INTO mandates (external_ref, name, mandate_group, currency, is_active) \
         VALUES (?1, ?2, ?3, ?4, 1) \
         ON CONFLICT(name) DO UPDATE SET \
            mandate_group = excluded.mandate_group, \
            external_ref = excluded.external_ref, \
            currency = COALESCE(excluded.currency, currency), \
            is_active = 1, \
            updated_at = datetime('now')",
        rusqlite::params![row.id.trim(), name, group.as_str(), row.currency],
    )
    .map_err(|e| format!("Failed to upsert mandate '{name}': {e}"))?;

    // Re-read the id rather than trusting last_insert_rowid: a concurrent
    // writer may have taken the insert through the conflict branch.
    let id: i64 = conn
        .query_row("SELECT id FROM mandates WHERE name = ?1", [name], |r| r.get(0))
        .map_err(|e| format!("Failed to resolve mandate id for '{name}': {e}"))?;

    Ok((id, existing.is_none()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn mandate(id: &str, name: &str, category: &str) -> RawMandateRow {
        RawMandateRow {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            currency: None,
        }
    }

    #[test]
    fn test_creates_and_maps_new_mandates() {
        let (_dir, conn) = test_db();
        let rows = vec![
            mandate("M1", "Hotel A", "Hébergement"),
            mandate("M2", "Chez Marcel", "Restauration"),
        ];
        let out = reconcile_mandates(&conn, &rows, 0);
        assert_eq!(out.created, 2);
        assert_eq!(out.updated, 0);
        assert!(out.errors.is_empty());
        assert_eq!(out.mapping.len(), 2);
        assert!(out.mapping.contains_key("M1"));
    }

    #[test]
    fn test_resubmitted_name_counts_as_update_and_reclassifies() {
        let (_dir, conn) = test_db();
        let first = reconcile_mandates(&conn, &[mandate("M1", "Hotel A", "Hébergement")], 0);
        assert_eq!(first.created, 1);
        let second = reconcile_mandates(&conn, &[mandate("M1", "Hotel A", "Restauration")], 0);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 1);
        // Same internal id, group now reflects the second call.
        assert_eq!(first.mapping["M1"], second.mapping["M1"]);
        let group: String = conn
            .query_row("SELECT mandate_group FROM mandates WHERE name = 'Hotel A'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(group, "dining");
    }

    #[test]
    fn test_bad_row_does_not_abort_siblings() {
        let (_dir, conn) = test_db();
        let rows = vec![
            mandate("M1", "", "Hébergement"),
            mandate("M2", "Chez Marcel", "Spa"),
            mandate("M3", "Hotel A", "Hébergement"),
        ];
        let out = reconcile_mandates(&conn, &rows, 0);
        assert_eq!(out.created, 1);
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors[0].contains("missing required fields"));
        assert!(out.errors[1].contains("Unknown category 'Spa'"));
        assert_eq!(out.mapping.len(), 1);
    }

    #[test]
    fn test_quota_rejects_new_but_allows_updates() {
        let (_dir, conn) = test_db();
        reconcile_mandates(&conn, &[mandate("M1", "Hotel A", "Hébergement")], 1);
        let out = reconcile_mandates(
            &conn,
            &[
                mandate("M1", "Hotel A", "Hébergement"),
                mandate("M2", "Hotel B", "Hébergement"),
            ],
            1,
        );
        assert_eq!(out.updated, 1);
        assert_eq!(out.created, 0);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].contains("quota"));
    }

    #[test]
    fn test_currency_kept_when_resubmitted_without_one() {
        let (_dir, conn) = test_db();
        let mut with_currency = mandate("M1", "Hotel A", "Hébergement");
        with_currency.currency = Some("CHF".to_string());
        reconcile_mandates(&conn, &[with_currency], 0);
        reconcile_mandates(&conn, &[mandate("M1", "Hotel A", "Hébergement")], 0);
        let currency: Option<String> = conn
            .query_row("SELECT currency FROM mandates WHERE name = 'Hotel A'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(currency.as_deref(), Some("CHF"));
    }
}
