use speculate2::speculate;

speculate! {
    use std::fs;

    use chrono::{Duration, SecondsFormat, Utc};
    use minion_core::models::*;
    use minion_core::policy::liveness::{LivenessState, Signal};
    use minion_core::{CommsError, Database};
    use rusqlite::params;
    use tempfile::TempDir;

    fn setup_db() -> Database {
        let db = Database::open_memory().expect("Failed to create test database");
        db.migrate().expect("Failed to migrate");
        for (name, class) in [("boss", AgentClass::Lead), ("ada", AgentClass::Coder)] {
            db.register(RegisterAgentInput {
                name: name.into(),
                agent_class: class,
                model: None,
                description: None,
                transport: Transport::Terminal,
            })
            .expect("Failed to register");
        }
        db
    }

    fn minutes_ago(minutes: i64) -> String {
        (Utc::now() - Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn set_last_seen(db: &Database, name: &str, minutes: i64) {
        db.with_connection(|conn| {
            conn.execute(
                "UPDATE agents SET last_seen = ?1 WHERE name = ?2",
                params![minutes_ago(minutes), name],
            )?;
            Ok(())
        })
        .expect("Failed to backdate");
    }

    fn fenix(db: &Database, name: &str, manifest: &str) -> FenixDownRecord {
        db.fenix_down(name, FenixDownInput {
            files: vec!["src/lib.rs".into()],
            manifest: manifest.into(),
        })
        .expect("Failed to file fenix_down")
    }

    describe "cold_start" {
        it "hands over fenix_down records exactly once" {
            let db = setup_db();
            fenix(&db, "ada", "halfway through the lexer");

            let first = db.cold_start("ada").unwrap();
            let second = db.cold_start("ada").unwrap();

            assert_eq!(first.fenix_down.len(), 1);
            assert_eq!(first.fenix_down[0].manifest, "halfway through the lexer");
            assert!(second.fenix_down.is_empty());
        }

        it "only returns the caller's own records" {
            let db = setup_db();
            fenix(&db, "boss", "lead notes");

            assert!(db.cold_start("ada").unwrap().fenix_down.is_empty());
            assert_eq!(db.cold_start("boss").unwrap().fenix_down.len(), 1);
        }

        it "bundles plan, tasks, claims and emergency state" {
            let db = setup_db();
            let dir = TempDir::new().unwrap();
            let spec = dir.path().join("spec.md");
            fs::write(&spec, "# spec").unwrap();
            db.set_battle_plan("boss", "ship").unwrap();
            let task = db.create_task("boss", CreateTaskInput {
                title: "lexer".into(),
                task_file: spec.to_string_lossy().into_owned(),
                project: None,
                zone: None,
                blocked_by: vec![],
            }).unwrap();
            db.assign_task("boss", task.id, "ada").unwrap();
            db.claim_file("ada", "/repo/lexer.rs").unwrap();
            db.log_raid("boss", "kickoff", RaidPriority::High).unwrap();
            db.log_raid("boss", "chatter", RaidPriority::Low).unwrap();

            let state = db.cold_start("ada").unwrap();

            assert_eq!(state.agent.agent.name, "ada");
            assert_eq!(state.battle_plan.unwrap().plan, "ship");
            assert_eq!(state.tasks.len(), 1);
            assert_eq!(state.claims.len(), 1);
            assert!(!state.moon_crash);
            let entries: Vec<&str> = state.recent_raid_log.iter().map(|e| e.entry.as_str()).collect();
            assert!(entries.contains(&"kickoff"));
            assert!(!entries.contains(&"chatter"));
        }

        it "requires a registered agent" {
            let db = setup_db();
            assert!(matches!(db.cold_start("ghost").unwrap_err(), CommsError::NotFound(_)));
        }
    }

    describe "fenix_down" {
        it "logs a normal raid entry" {
            let db = setup_db();
            let record = fenix(&db, "ada", "notes");

            let log = db.get_raid_log(&RaidLogFilter::default()).unwrap();

            assert!(!record.consumed);
            assert_eq!(log[0].priority, RaidPriority::Normal);
            assert!(log[0].entry.contains(&format!("fenix_down #{}", record.id)));
        }
    }

    describe "debrief" {
        it "needs an existing file" {
            let db = setup_db();
            let err = db.debrief("boss", "/definitely/not/here.md").unwrap_err();
            assert!(matches!(err, CommsError::Blocked(_)));
        }

        it "logs a high priority entry" {
            let db = setup_db();
            let dir = TempDir::new().unwrap();
            let file = dir.path().join("debrief.md");
            fs::write(&file, "what went well").unwrap();

            let entry = db.debrief("boss", &file.to_string_lossy()).unwrap();

            assert_eq!(entry.priority, RaidPriority::High);
        }

        it "is lead only" {
            let db = setup_db();
            assert!(matches!(
                db.debrief("ada", "/tmp").unwrap_err(),
                CommsError::Unauthorized(_)
            ));
        }
    }

    describe "end_session" {
        it "completes the active plan and counts loose ends" {
            let db = setup_db();
            let plan = db.set_battle_plan("boss", "ship").unwrap();
            db.claim_file("ada", "/repo/a.rs").unwrap();

            let end = db.end_session("boss").unwrap();

            assert_eq!(end.completed_plan, Some(plan.id));
            assert_eq!(end.held_claims, 1);
            assert_eq!(end.active_tasks, 0);
            assert!(db.active_battle_plan().unwrap().is_none());
            assert_eq!(db.get_battle_plan(PlanStatus::Completed).unwrap().len(), 1);
        }

        it "is lead only" {
            let db = setup_db();
            assert!(db.end_session("ada").is_err());
        }
    }

    describe "health" {
        it "judges liveness from last_seen" {
            let db = setup_db();
            set_last_seen(&db, "ada", 20);

            let report = db.check_activity("ada").unwrap();

            assert_eq!(report.liveness.state, LivenessState::Idle);
            assert_eq!(report.liveness.source, Some(Signal::LastSeen));
        }

        it "marks long silence as possibly dead" {
            let db = setup_db();
            set_last_seen(&db, "ada", 45);

            let report = db.check_activity("ada").unwrap();

            assert_eq!(report.liveness.state, LivenessState::PossiblyDead);
        }

        it "prefers a recent write to a claimed file" {
            let db = setup_db();
            let dir = TempDir::new().unwrap();
            let file = dir.path().join("lib.rs");
            fs::write(&file, "fn main() {}").unwrap();
            db.claim_file("ada", &file.to_string_lossy()).unwrap();
            set_last_seen(&db, "ada", 45);

            let report = db.check_activity("ada").unwrap();

            assert_eq!(report.liveness.state, LivenessState::Active);
            assert_eq!(report.liveness.source, Some(Signal::FileWrite));
        }

        it "lists claimed files changed since set_context" {
            let db = setup_db();
            let dir = TempDir::new().unwrap();
            let file = dir.path().join("lib.rs");
            fs::write(&file, "v1").unwrap();
            db.claim_file("ada", &file.to_string_lossy()).unwrap();
            db.set_context("ada", SetContextInput {
                context: "lib.rs".into(),
                tokens_used: 0,
                tokens_limit: 0,
            }).unwrap();
            db.with_connection(|conn| {
                conn.execute(
                    "UPDATE agents SET context_updated_at = ?1 WHERE name = 'ada'",
                    params![minutes_ago(2)],
                )?;
                Ok(())
            }).unwrap();

            let report = db.check_freshness("ada").unwrap();

            assert!(!report.context_stale);
            assert_eq!(report.changed_since_context.len(), 1);
            assert!(report.changed_since_context[0].path.ends_with("lib.rs"));
        }

        it "shows every member in party_status" {
            let db = setup_db();
            db.set_battle_plan("boss", "ship").unwrap();
            db.claim_file("ada", "/repo/a.rs").unwrap();

            let party = db.party_status().unwrap();

            assert_eq!(party.members.len(), 2);
            assert!(party.battle_plan.is_some());
            let ada = party.members.iter().find(|m| m.view.agent.name == "ada").unwrap();
            assert_eq!(ada.claimed_files, vec!["/repo/a.rs"]);
            assert_eq!(ada.liveness.state, LivenessState::Active);
        }
    }
}
