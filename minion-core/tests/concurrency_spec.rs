use speculate2::speculate;

speculate! {
    use std::path::Path;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use minion_core::models::*;
    use minion_core::Database;
    use tempfile::TempDir;

    const RACERS: usize = 8;

    /// Migrated file-backed database with `RACERS` agents of `class`,
    /// named `racer-0` onwards.
    fn setup_file_db(path: &Path, class: AgentClass) -> Database {
        let db = Database::open(path).expect("Failed to open database");
        db.migrate().expect("Failed to migrate");
        for i in 0..RACERS {
            db.register(RegisterAgentInput {
                name: format!("racer-{}", i),
                agent_class: class,
                model: None,
                description: None,
                transport: Transport::Daemon,
            })
            .expect("Failed to register");
        }
        db
    }

    /// Runs `op` once per racer, each on its own connection to `path`,
    /// all released from the same barrier.
    fn race<T, F>(path: &Path, op: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(&Database, String) -> T + Send + Sync + 'static,
    {
        let handles: Vec<Database> = (0..RACERS)
            .map(|_| Database::open(path).expect("Failed to open handle"))
            .collect();
        let barrier = Arc::new(Barrier::new(RACERS));
        let op = Arc::new(op);

        let threads: Vec<_> = handles
            .into_iter()
            .enumerate()
            .map(|(i, db)| {
                let barrier = Arc::clone(&barrier);
                let op = Arc::clone(&op);
                thread::spawn(move || {
                    barrier.wait();
                    op(&db, format!("racer-{}", i))
                })
            })
            .collect();

        threads
            .into_iter()
            .map(|t| t.join().expect("racer panicked"))
            .collect()
    }

    describe "claim_file across connections" {
        it "grants a contested path to exactly one agent" {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("messages.db");
            let db = setup_file_db(&path, AgentClass::Builder);

            for round in 0..5 {
                let file = format!("/repo/shared-{}.rs", round);
                let target = file.clone();
                let outcomes = race(&path, move |db, name| db.claim_file(&name, &target));

                let outcomes: Vec<ClaimOutcome> = outcomes
                    .into_iter()
                    .map(|o| o.expect("claim should not fault"))
                    .collect();
                let granted = outcomes
                    .iter()
                    .filter(|o| matches!(o, ClaimOutcome::Granted { .. }))
                    .count();
                assert_eq!(granted, 1);

                let claims = db.get_claims(None).unwrap();
                let claim = claims.iter().find(|c| c.claim.file_path == file).unwrap();
                assert_eq!(claim.waitlist.len(), RACERS - 1);
                assert!(!claim.waitlist.contains(&claim.claim.holder));
            }
        }
    }

    describe "set_battle_plan across connections" {
        it "leaves exactly one active plan" {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("messages.db");
            let db = setup_file_db(&path, AgentClass::Lead);

            let results = race(&path, |db, name| {
                db.set_battle_plan(&name, &format!("plan from {}", name))
            });

            assert!(results.iter().all(|r| r.is_ok()));
            assert_eq!(db.get_battle_plan(PlanStatus::Active).unwrap().len(), 1);
            assert_eq!(
                db.get_battle_plan(PlanStatus::Superseded).unwrap().len(),
                RACERS - 1
            );
        }
    }
}
