// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证同一余料上的并发预留/使用只有一个成功
// 每个线程使用独立连接, 由 SQLite 写锁串行化
// ==========================================


#[cfg(test)]
mod concurrent_reserve_test {
    use laser_offcut::api::{ApiError, OffcutApi};
    use laser_offcut::domain::offcut::{ReserveOffcutInput, UseFullInput, UsePartialInput};
    use laser_offcut::domain::types::{OffcutCondition, OffcutStatus};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::test_helpers::{create_rect, setup_api};

    const WORKERS: usize = 8;

    /// 在独立连接上并发执行 op, 返回 (成功数, 冲突数)
    fn race<F>(db_path: &str, op: F) -> (usize, usize)
    where
        F: Fn(&OffcutApi, usize) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let barrier = Arc::new(Barrier::new(WORKERS));

        let handles: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let db_path = db_path.to_string();
                let barrier = barrier.clone();
                let op = op.clone();
                thread::spawn(move || {
                    let api = OffcutApi::open(&db_path).unwrap();
                    barrier.wait();
                    op(&api, worker)
                })
            })
            .collect();

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(()) => ok += 1,
                Err(ApiError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        (ok, conflicts)
    }

    #[test]
    fn test_concurrent_reserve_single_winner() {
        let (_tmp, db_path, api) = setup_api();
        let offcut = create_rect(&api, "PLY-6", 300.0, 200.0, OffcutCondition::Good);

        let offcut_id = offcut.offcut_id.clone();
        let (ok, conflicts) = race(&db_path, move |api, worker| {
            api.reserve(
                &offcut_id,
                &ReserveOffcutInput {
                    order_item_id: Some(format!("OI-{}", worker)),
                    batch_id: None,
                    user_id: format!("op-{}", worker),
                },
            )
            .map(|_| ())
        });

        assert_eq!(ok, 1);
        assert_eq!(conflicts, WORKERS - 1);
        assert_eq!(api.get(&offcut.offcut_id).unwrap().status, OffcutStatus::Reserved);
        assert_eq!(api.list_reservations(&offcut.offcut_id).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_use_full_single_winner() {
        let (_tmp, db_path, api) = setup_api();
        let offcut = create_rect(&api, "PLY-6", 300.0, 200.0, OffcutCondition::Good);

        let offcut_id = offcut.offcut_id.clone();
        let (ok, conflicts) = race(&db_path, move |api, worker| {
            api.use_full(
                &offcut_id,
                &UseFullInput {
                    order_item_id: None,
                    batch_id: None,
                    notes: None,
                    user_id: format!("op-{}", worker),
                },
            )
            .map(|_| ())
        });

        assert_eq!(ok, 1);
        assert_eq!(conflicts, WORKERS - 1);
        assert_eq!(api.list_usages(&offcut.offcut_id).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_partial_use_is_serialized() {
        let (_tmp, db_path, api) = setup_api();
        let offcut = create_rect(&api, "PLY-6", 100.0, 100.0, OffcutCondition::Good);

        // 每次切 500, 8 次共 4000, 剩余 6000 仍高于报废线
        let offcut_id = offcut.offcut_id.clone();
        let (ok, conflicts) = race(&db_path, move |api, worker| {
            api.use_partial(
                &offcut_id,
                &UsePartialInput {
                    used_area_mm2: Some(500.0),
                    used_width_mm: None,
                    used_height_mm: None,
                    order_item_id: None,
                    batch_id: None,
                    notes: None,
                    user_id: format!("op-{}", worker),
                },
            )
            .map(|_| ())
        });

        assert_eq!(ok, WORKERS);
        assert_eq!(conflicts, 0);
        let stored = api.get(&offcut.offcut_id).unwrap();
        assert_eq!(stored.estimated_area_mm2, Some(6_000.0));
        assert_eq!(stored.status, OffcutStatus::Available);
        assert_eq!(api.list_usages(&offcut.offcut_id).unwrap().len(), WORKERS);
    }
}
