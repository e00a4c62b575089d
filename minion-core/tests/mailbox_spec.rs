use speculate2::speculate;

speculate! {
    use chrono::{Duration, SecondsFormat, Utc};
    use minion_core::models::*;
    use minion_core::policy::triggers::Trigger;
    use minion_core::{CommsError, Database};
    use rusqlite::params;

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
            transport: Transport::Terminal,
        })
        .expect("Failed to register");
    }

    fn fresh_context(db: &Database, name: &str) {
        db.set_context(name, SetContextInput {
            context: "loaded".into(),
            tokens_used: 0,
            tokens_limit: 0,
        })
        .expect("Failed to set context");
    }

    /// Lead `boss` with an active plan, coders `ada` and `bob` with fresh context.
    fn party(db: &Database) {
        register(db, "boss", AgentClass::Lead);
        register(db, "ada", AgentClass::Coder);
        register(db, "bob", AgentClass::Coder);
        db.set_battle_plan("boss", "go").expect("Failed to set plan");
        for name in ["boss", "ada", "bob"] {
            fresh_context(db, name);
        }
    }

    fn send(db: &Database, from: &str, to: &str, content: &str) -> minion_core::Result<SendReceipt> {
        db.send(SendMessageInput {
            from_agent: from.into(),
            to_agent: to.into(),
            content: content.into(),
            cc: vec![],
        })
    }

    fn backdate(db: &Database, sql: &str, minutes: i64) {
        let at = (Utc::now() - Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Micros, true);
        db.with_connection(|conn| {
            conn.execute(sql, params![at])?;
            Ok(())
        })
        .expect("Failed to backdate");
    }

    describe "send gates" {
        it "blocks every send until a battle plan exists" {
            let db = setup_db();
            register(&db, "boss", AgentClass::Lead);
            register(&db, "ada", AgentClass::Coder);
            fresh_context(&db, "ada");

            let err = send(&db, "ada", "boss", "hi").unwrap_err();

            assert!(matches!(err, CommsError::Blocked(_)));
            assert!(err.to_string().contains("No active battle plan"));
            assert!(db.get_history(10).unwrap().is_empty());
        }

        it "delivers to the lead without a duplicate CC once a plan is active" {
            let db = setup_db();
            register(&db, "boss", AgentClass::Lead);
            register(&db, "ada", AgentClass::Coder);
            fresh_context(&db, "ada");
            let plan = db.set_battle_plan("boss", "go").unwrap();
            assert_eq!(plan.id, 1);

            let receipt = send(&db, "ada", "boss", "hi").unwrap();

            assert!(receipt.cc.is_empty());
            let inbox = db.check_inbox("boss").unwrap();
            assert_eq!(inbox.messages.len(), 1);
            assert_eq!(inbox.messages[0].message.content, "hi");
        }

        it "blocks a sender with unread mail" {
            let db = setup_db();
            party(&db);
            send(&db, "ada", "bob", "ping").unwrap();

            let err = send(&db, "bob", "ada", "pong").unwrap_err();

            assert_eq!(err.to_string(), "You have 1 unread message(s). Call check_inbox first.");
        }

        it "reports the unread gate before the staleness gate" {
            let db = setup_db();
            party(&db);
            send(&db, "ada", "bob", "ping").unwrap();
            backdate(&db, "UPDATE agents SET context_updated_at = ?1 WHERE name = 'bob'", 60);

            let err = send(&db, "bob", "ada", "pong").unwrap_err();

            assert!(err.to_string().contains("unread message"));
        }

        it "counts unacknowledged broadcasts by others" {
            let db = setup_db();
            party(&db);
            send(&db, "ada", BROADCAST, "standup").unwrap();

            assert_eq!(db.unread_count("bob").unwrap(), 1);
            assert_eq!(db.unread_count("ada").unwrap(), 0);
            assert!(send(&db, "ada", "bob", "again").is_ok());
            assert!(send(&db, "bob", "ada", "reply").is_err());
        }

        it "blocks a stale sender" {
            let db = setup_db();
            party(&db);
            backdate(&db, "UPDATE agents SET context_updated_at = ?1 WHERE name = 'ada'", 6);

            let err = send(&db, "ada", "bob", "hi").unwrap_err();

            assert!(err.to_string().starts_with("Context stale (6m old, threshold 5m for coder)"));
        }

        it "allows a lead with ten minute old context" {
            let db = setup_db();
            party(&db);
            backdate(&db, "UPDATE agents SET context_updated_at = ?1 WHERE name = 'boss'", 10);

            assert!(send(&db, "boss", "ada", "hi").is_ok());
        }

        it "blocks a sender whose context was never set" {
            let db = setup_db();
            party(&db);
            register(&db, "cy", AgentClass::Recon);

            let err = send(&db, "cy", "boss", "hi").unwrap_err();

            assert!(err.to_string().starts_with("Context not set."));
        }

        it "auto-registers an unknown sender as a coder" {
            let db = setup_db();
            party(&db);

            send(&db, "stranger", "ada", "hello").unwrap();

            let agent = db.get_agent("stranger").unwrap();
            assert_eq!(agent.agent_class, AgentClass::Coder);
        }
    }

    describe "cc fan-out" {
        it "copies the lead on messages between other agents" {
            let db = setup_db();
            party(&db);

            let receipt = send(&db, "ada", "bob", "diff ready").unwrap();

            assert_eq!(receipt.cc, vec!["boss"]);
            let inbox = db.check_inbox("boss").unwrap();
            assert_eq!(inbox.messages.len(), 1);
            assert_eq!(
                inbox.messages[0].cc_note.as_deref(),
                Some("[CC] originally to: bob")
            );
        }

        it "deduplicates explicit entries and never copies the recipient" {
            let db = setup_db();
            party(&db);
            register(&db, "cy", AgentClass::Builder);

            let receipt = db.send(SendMessageInput {
                from_agent: "ada".into(),
                to_agent: "bob".into(),
                content: "fyi".into(),
                cc: vec!["cy".into(), "bob".into(), "cy".into(), "boss".into()],
            }).unwrap();

            assert_eq!(receipt.cc, vec!["cy", "boss"]);
            assert_eq!(db.check_inbox("bob").unwrap().messages.len(), 1);
        }

        it "does not copy the lead on broadcasts" {
            let db = setup_db();
            party(&db);

            let receipt = send(&db, "ada", BROADCAST, "lunch").unwrap();

            assert!(receipt.cc.is_empty());
        }
    }

    describe "check_inbox" {
        it "returns nothing the second time" {
            let db = setup_db();
            party(&db);
            send(&db, "ada", "bob", "one").unwrap();
            send(&db, "ada", BROADCAST, "two").unwrap();

            let first = db.check_inbox("bob").unwrap();
            let second = db.check_inbox("bob").unwrap();

            assert_eq!(first.messages.len(), 2);
            assert!(second.messages.is_empty());
        }

        it "merges direct and broadcast mail oldest first" {
            let db = setup_db();
            party(&db);
            send(&db, "ada", BROADCAST, "first").unwrap();
            db.check_inbox("boss").unwrap();
            send(&db, "boss", "bob", "second").unwrap();

            let inbox = db.check_inbox("bob").unwrap();
            let contents: Vec<&str> = inbox.messages.iter().map(|m| m.message.content.as_str()).collect();

            assert_eq!(contents, vec!["first", "second"]);
        }

        it "does not return the agent's own broadcasts" {
            let db = setup_db();
            party(&db);
            send(&db, "ada", BROADCAST, "mine").unwrap();

            assert!(db.check_inbox("ada").unwrap().messages.is_empty());
        }

        it "warns about stale context without blocking" {
            let db = setup_db();
            party(&db);
            backdate(&db, "UPDATE agents SET context_updated_at = ?1 WHERE name = 'bob'", 20);

            let inbox = db.check_inbox("bob").unwrap();

            assert!(inbox.staleness_warning.is_some());
        }
    }

    describe "get_history" {
        it "returns the last messages oldest to newest" {
            let db = setup_db();
            party(&db);
            for text in ["a", "b", "c"] {
                send(&db, "boss", BROADCAST, text).unwrap();
            }

            let history = db.get_history(2).unwrap();
            let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();

            assert_eq!(contents, vec!["b", "c"]);
        }
    }

    describe "purge_inbox" {
        it "deletes old direct mail and dismisses old broadcasts" {
            let db = setup_db();
            party(&db);
            send(&db, "ada", "bob", "old direct").unwrap();
            send(&db, "ada", BROADCAST, "old broadcast").unwrap();
            backdate(&db, "UPDATE messages SET timestamp = ?1", 180);

            let outcome = db.purge_inbox("bob", 2).unwrap();

            assert_eq!(outcome.deleted, 1);
            assert_eq!(outcome.dismissed, 1);
            assert_eq!(db.unread_count("bob").unwrap(), 0);
        }

        it "leaves recent mail alone" {
            let db = setup_db();
            party(&db);
            send(&db, "ada", "bob", "fresh").unwrap();

            let outcome = db.purge_inbox("bob", 2).unwrap();

            assert_eq!(outcome.deleted, 0);
            assert_eq!(db.unread_count("bob").unwrap(), 1);
        }
    }

    describe "triggers" {
        it "raises moon_crash and logs a critical entry" {
            let db = setup_db();
            party(&db);

            let receipt = send(&db, "ada", "boss", "MOON_CRASH: prod is down").unwrap();

            assert!(receipt.triggers.contains(&Trigger::MoonCrash));
            assert!(db.moon_crash_active().unwrap());
            let critical = db.get_raid_log(&RaidLogFilter {
                priority: Some(RaidPriority::Critical),
                ..Default::default()
            }).unwrap();
            assert_eq!(critical.len(), 1);
            assert!(critical[0].entry.starts_with("MOON CRASH raised by ada"));
        }

        it "matches trigger words inside longer words" {
            let db = setup_db();
            party(&db);

            let receipt = send(&db, "ada", "boss", "reconnaissance done").unwrap();

            assert_eq!(receipt.triggers, vec![Trigger::Recon]);
            assert!(!db.moon_crash_active().unwrap());
        }

        it "lists the vocabulary with the flag state" {
            let db = setup_db();
            let board = db.get_triggers().unwrap();

            assert_eq!(board.triggers.len(), 5);
            let flag = board.flags.iter().find(|f| f.key == MOON_CRASH).unwrap();
            assert!(!flag.value);
        }
    }
}
