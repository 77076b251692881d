use super::OffcutRepository;
use crate::domain::offcut::{
    Offcut, OffcutListFilter, OffcutReservation, OffcutShape, ReservationFilter,
};
use crate::domain::types::{MaterialCategory, OffcutCondition, OffcutStatus};
use crate::repository::error::RepositoryError;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();

    conn.execute_batch(
        r#"
        INSERT INTO material (material_id, name, category, thickness_mm) VALUES
            ('PLY-6', '桦木胶合板 6mm', 'PLYWOOD', 6.0),
            ('PLY-6B', '椴木胶合板 6mm', 'PLYWOOD', 6.0),
            ('ACR-3', '透明亚克力 3mm', 'ACRYLIC', 3.0);
        "#,
    )
    .unwrap();

    Arc::new(Mutex::new(conn))
}

fn make_offcut(offcut_id: &str, material_id: &str, thickness_mm: f64) -> Offcut {
    let now = Utc::now();
    Offcut {
        offcut_id: offcut_id.to_string(),
        material_id: material_id.to_string(),
        thickness_mm,
        shape: OffcutShape::Rectangle {
            width_mm: 300.0,
            height_mm: 200.0,
        },
        estimated_area_mm2: Some(60_000.0),
        quantity: 1,
        location_label: Some("A-01".to_string()),
        condition: OffcutCondition::Good,
        status: OffcutStatus::Available,
        source: Some("JOB-100".to_string()),
        notes: None,
        created_by_user_id: Some("u1".to_string()),
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn reservation(reservation_id: &str, offcut_id: &str, order_item_id: Option<&str>) -> OffcutReservation {
    OffcutReservation {
        reservation_id: reservation_id.to_string(),
        offcut_id: offcut_id.to_string(),
        order_item_id: order_item_id.map(|s| s.to_string()),
        batch_id: None,
        reserved_by_user_id: "u1".to_string(),
        created_at: Utc::now(),
    }
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = OffcutRepository::from_connection(setup_test_db());
    let offcut = make_offcut("OC1", "PLY-6", 6.0);

    assert_eq!(repo.insert(&offcut).unwrap(), "OC1");

    let found = repo.find_by_id("OC1").unwrap().unwrap();
    assert_eq!(found.material_id, "PLY-6");
    assert_eq!(found.shape, offcut.shape);
    assert_eq!(found.estimated_area_mm2, Some(60_000.0));
    assert_eq!(found.status, OffcutStatus::Available);
    assert_eq!(found.location_label.as_deref(), Some("A-01"));

    assert!(repo.find_by_id("NOPE").unwrap().is_none());
}

#[test]
fn test_irregular_shape_round_trips_through_columns() {
    let repo = OffcutRepository::from_connection(setup_test_db());
    let mut offcut = make_offcut("OC-IRR", "ACR-3", 3.0);
    offcut.shape = OffcutShape::Irregular {
        bounding_box_width_mm: None,
        bounding_box_height_mm: None,
    };
    offcut.estimated_area_mm2 = Some(4_500.0);
    repo.insert(&offcut).unwrap();

    let found = repo.find_by_id("OC-IRR").unwrap().unwrap();
    assert_eq!(found.shape, offcut.shape);
    assert_eq!(found.effective_area(), Some(4_500.0));
}

#[test]
fn test_list_filters_and_excludes_deleted() {
    let repo = OffcutRepository::from_connection(setup_test_db());

    let mut older = make_offcut("OC1", "PLY-6", 6.0);
    older.created_at = Utc::now() - Duration::minutes(5);
    repo.insert(&older).unwrap();

    let mut fair = make_offcut("OC2", "PLY-6", 6.0);
    fair.condition = OffcutCondition::Fair;
    repo.insert(&fair).unwrap();

    repo.insert(&make_offcut("OC3", "ACR-3", 3.0)).unwrap();

    let mut deleted = make_offcut("OC4", "PLY-6", 6.0);
    deleted.deleted_at = Some(Utc::now());
    deleted.status = OffcutStatus::Discarded;
    repo.insert(&deleted).unwrap();

    let all = repo.list(&OffcutListFilter::default()).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|o| o.offcut_id != "OC4"));
    assert_eq!(all.last().unwrap().offcut_id, "OC1");

    let plywood = repo
        .list(&OffcutListFilter {
            material_id: Some("PLY-6".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(plywood.len(), 2);

    let fair_only = repo
        .list(&OffcutListFilter {
            condition: Some(OffcutCondition::Fair),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(fair_only.len(), 1);
    assert_eq!(fair_only[0].offcut_id, "OC2");

    let discarded = repo
        .list(&OffcutListFilter {
            status: Some(OffcutStatus::Discarded),
            ..Default::default()
        })
        .unwrap();
    assert!(discarded.is_empty());
}

#[test]
fn test_category_candidates_filter() {
    let repo = OffcutRepository::from_connection(setup_test_db());

    repo.insert(&make_offcut("OK-SAME-MAT", "PLY-6", 6.0)).unwrap();
    repo.insert(&make_offcut("OK-SAME-CAT", "PLY-6B", 6.0)).unwrap();
    repo.insert(&make_offcut("WRONG-CAT", "ACR-3", 6.0)).unwrap();
    repo.insert(&make_offcut("WRONG-THK", "PLY-6", 9.0)).unwrap();

    let mut damaged = make_offcut("DAMAGED", "PLY-6", 6.0);
    damaged.condition = OffcutCondition::Damaged;
    repo.insert(&damaged).unwrap();

    let mut reserved = make_offcut("RESERVED", "PLY-6", 6.0);
    reserved.status = OffcutStatus::Reserved;
    repo.insert(&reserved).unwrap();

    let mut poor = make_offcut("POOR", "PLY-6", 6.0);
    poor.condition = OffcutCondition::Poor;
    repo.insert(&poor).unwrap();

    let mut ids: Vec<String> = repo
        .list_candidates_by_category("PLYWOOD", 6.0)
        .unwrap()
        .into_iter()
        .map(|o| o.offcut_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["OK-SAME-CAT", "OK-SAME-MAT", "POOR"]);

    let by_material: Vec<String> = repo
        .list_candidates_by_material("PLY-6", 6.0)
        .unwrap()
        .into_iter()
        .map(|o| o.offcut_id)
        .collect();
    assert_eq!(by_material.len(), 2);
    assert!(!by_material.contains(&"OK-SAME-CAT".to_string()));
}

#[test]
fn test_category_candidates_normalise_stored_category_text() {
    let db = setup_test_db();
    db.lock()
        .unwrap()
        .execute_batch(
            r#"
            INSERT INTO material (material_id, name, category, thickness_mm) VALUES
                ('PLY-L', '胶合板 (小写大类)', 'plywood', 6.0),
                ('FELT-2', '羊毛毡 2mm', ' felt ', 2.0);
            "#,
        )
        .unwrap();
    let repo = OffcutRepository::from_connection(db);

    repo.insert(&make_offcut("OC-PLY-L", "PLY-L", 6.0)).unwrap();
    repo.insert(&make_offcut("OC-FELT", "FELT-2", 2.0)).unwrap();

    let plywood: Vec<String> = repo
        .list_candidates_by_category(MaterialCategory::from_db_str("plywood").to_db_str(), 6.0)
        .unwrap()
        .into_iter()
        .map(|o| o.offcut_id)
        .collect();
    assert_eq!(plywood, vec!["OC-PLY-L"]);

    let felt: Vec<String> = repo
        .list_candidates_by_category(MaterialCategory::from_db_str(" felt ").to_db_str(), 2.0)
        .unwrap()
        .into_iter()
        .map(|o| o.offcut_id)
        .collect();
    assert_eq!(felt, vec!["OC-FELT"]);
}

#[test]
fn test_locked_offcut_missing_or_deleted_is_not_found() {
    let repo = OffcutRepository::from_connection(setup_test_db());
    let mut deleted = make_offcut("OC-DEL", "PLY-6", 6.0);
    deleted.deleted_at = Some(Utc::now());
    repo.insert(&deleted).unwrap();

    for id in ["OC-DEL", "OC-MISSING"] {
        let result: Result<(), RepositoryError> =
            repo.with_locked_offcut(id, |_tx, _offcut| panic!("closure must not run"));
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }
}

#[test]
fn test_locked_offcut_rolls_back_on_error() {
    let repo = OffcutRepository::from_connection(setup_test_db());
    repo.insert(&make_offcut("OC1", "PLY-6", 6.0)).unwrap();

    let result: Result<(), RepositoryError> = repo.with_locked_offcut("OC1", |tx, offcut| {
        tx.set_status(&offcut.offcut_id, OffcutStatus::Used, Utc::now())?;
        tx.insert_reservation(&reservation("R1", "OC1", None))?;
        Err(RepositoryError::ValidationError("abort".to_string()))
    });
    assert!(result.is_err());

    let found = repo.find_by_id("OC1").unwrap().unwrap();
    assert_eq!(found.status, OffcutStatus::Available);
    assert!(repo.list_reservations("OC1").unwrap().is_empty());
}

#[test]
fn test_matching_reservation_delete() {
    let repo = OffcutRepository::from_connection(setup_test_db());
    repo.insert(&make_offcut("OC1", "PLY-6", 6.0)).unwrap();

    repo.with_locked_offcut("OC1", |tx, _offcut| -> Result<(), RepositoryError> {
        tx.insert_reservation(&reservation("R1", "OC1", Some("OI-1")))?;
        tx.insert_reservation(&reservation("R2", "OC1", Some("OI-2")))?;
        tx.insert_reservation(&reservation("R3", "OC1", None))?;
        Ok(())
    })
    .unwrap();

    let removed = repo
        .with_locked_offcut("OC1", |tx, offcut| {
            tx.delete_matching_reservations(
                &offcut.offcut_id,
                &ReservationFilter {
                    order_item_id: Some("OI-1".to_string()),
                    batch_id: None,
                },
            )
        })
        .unwrap();
    assert_eq!(removed, 1);

    let left: Vec<String> = repo
        .list_reservations("OC1")
        .unwrap()
        .into_iter()
        .map(|r| r.reservation_id)
        .collect();
    assert_eq!(left.len(), 2);
    assert!(!left.contains(&"R1".to_string()));

    let removed = repo
        .with_locked_offcut("OC1", |tx, offcut| {
            tx.delete_matching_reservations(&offcut.offcut_id, &ReservationFilter::default())
        })
        .unwrap();
    assert_eq!(removed, 2);
}

#[test]
fn test_mark_deleted_hides_offcut() {
    let repo = OffcutRepository::from_connection(setup_test_db());
    repo.insert(&make_offcut("OC1", "PLY-6", 6.0)).unwrap();

    repo.with_locked_offcut("OC1", |tx, offcut| tx.mark_deleted(&offcut.offcut_id, Utc::now()))
        .unwrap();

    assert!(repo.find_by_id("OC1").unwrap().is_none());
    assert!(repo.list(&OffcutListFilter::default()).unwrap().is_empty());
    assert!(repo.list_candidates_by_material("PLY-6", 6.0).unwrap().is_empty());
}
