use speculate2::speculate;

speculate! {
    use minion_core::models::*;
    use minion_core::{CommsError, Database};

    fn setup_db() -> Database {
        let db = Database::open_memory().expect("Failed to create test database");
        db.migrate().expect("Failed to migrate");
        db
    }

    fn register(db: &Database, name: &str, class: AgentClass) {
        db.register(RegisterAgentInput {
            name: name.into(),
            agent_class: class,
            model: None,
            description: None,
            transport: Transport::Daemon,
        })
        .expect("Failed to register");
    }

    fn active_count(db: &Database) -> i64 {
        db.with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM battle_plan WHERE status = 'active'",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap()
    }

    describe "battle plan" {
        it "is lead only" {
            let db = setup_db();
            register(&db, "ada", AgentClass::Coder);

            let err = db.set_battle_plan("ada", "take over").unwrap_err();

            assert!(matches!(err, CommsError::Unauthorized(_)));
            assert_eq!(
                err.to_string(),
                "Only lead-class agents can set the battle plan. 'ada' is class 'coder'."
            );
        }

        it "supersedes the previous active plan" {
            let db = setup_db();
            register(&db, "boss", AgentClass::Lead);
            let first = db.set_battle_plan("boss", "phase one").unwrap();
            let second = db.set_battle_plan("boss", "phase two").unwrap();

            assert_eq!(active_count(&db), 1);
            assert_eq!(db.active_battle_plan().unwrap().unwrap().id, second.id);
            let superseded = db.get_battle_plan(PlanStatus::Superseded).unwrap();
            assert_eq!(superseded.len(), 1);
            assert_eq!(superseded[0].id, first.id);
        }

        it "never holds two active plans after reactivation" {
            let db = setup_db();
            register(&db, "boss", AgentClass::Lead);
            let first = db.set_battle_plan("boss", "phase one").unwrap();
            let second = db.set_battle_plan("boss", "phase two").unwrap();

            let change = db
                .update_battle_plan_status("boss", first.id, PlanStatus::Active)
                .unwrap();

            assert_eq!(change.from, PlanStatus::Superseded);
            assert_eq!(change.superseded, Some(second.id));
            assert_eq!(active_count(&db), 1);
            assert_eq!(db.active_battle_plan().unwrap().unwrap().id, first.id);
        }

        it "accepts any target status" {
            let db = setup_db();
            register(&db, "boss", AgentClass::Lead);
            let plan = db.set_battle_plan("boss", "go").unwrap();

            db.update_battle_plan_status("boss", plan.id, PlanStatus::Abandoned).unwrap();

            assert!(db.active_battle_plan().unwrap().is_none());
            assert_eq!(db.get_battle_plan(PlanStatus::Abandoned).unwrap().len(), 1);
        }

        it "reports an unknown plan id" {
            let db = setup_db();
            register(&db, "boss", AgentClass::Lead);

            let err = db
                .update_battle_plan_status("boss", 42, PlanStatus::Completed)
                .unwrap_err();

            assert_eq!(err.to_string(), "Battle plan #42 not found.");
        }

        it "rejects unknown statuses by name" {
            let err = PlanStatus::parse("paused").unwrap_err();
            assert!(err.to_string().starts_with("Invalid status 'paused'."));
        }
    }

    describe "raid log" {
        it "is open to any registered agent" {
            let db = setup_db();
            register(&db, "ada", AgentClass::Builder);

            let entry = db.log_raid("ada", "tests green", RaidPriority::Low).unwrap();

            assert_eq!(entry.agent_name, "ada");
            assert_eq!(entry.priority, RaidPriority::Low);
        }

        it "refuses unregistered authors" {
            let db = setup_db();
            let err = db.log_raid("ghost", "boo", RaidPriority::Normal).unwrap_err();
            assert!(matches!(err, CommsError::NotFound(_)));
        }

        it "filters by priority and agent, newest first" {
            let db = setup_db();
            register(&db, "ada", AgentClass::Builder);
            register(&db, "bob", AgentClass::Builder);
            db.log_raid("ada", "one", RaidPriority::High).unwrap();
            db.log_raid("bob", "two", RaidPriority::High).unwrap();
            db.log_raid("ada", "three", RaidPriority::Normal).unwrap();
            db.log_raid("ada", "four", RaidPriority::High).unwrap();

            let entries = db.get_raid_log(&RaidLogFilter {
                priority: Some(RaidPriority::High),
                agent_name: Some("ada".into()),
                count: 20,
            }).unwrap();

            let texts: Vec<&str> = entries.iter().map(|e| e.entry.as_str()).collect();
            assert_eq!(texts, vec!["four", "one"]);
        }

        it "bounds the result by count" {
            let db = setup_db();
            register(&db, "ada", AgentClass::Builder);
            for i in 0..5 {
                db.log_raid("ada", &format!("entry {}", i), RaidPriority::Normal).unwrap();
            }

            let entries = db.get_raid_log(&RaidLogFilter { count: 3, ..Default::default() }).unwrap();

            assert_eq!(entries.len(), 3);
            assert_eq!(entries[0].entry, "entry 4");
        }
    }

    describe "moon_crash" {
        it "can only be cleared by a lead" {
            let db = setup_db();
            register(&db, "ada", AgentClass::Coder);

            let err = db.clear_moon_crash("ada").unwrap_err();

            assert!(matches!(err, CommsError::Unauthorized(_)));
        }

        it "reports whether the flag was raised" {
            let db = setup_db();
            register(&db, "boss", AgentClass::Lead);

            assert!(!db.clear_moon_crash("boss").unwrap());
        }
    }
}
