use speculate2::speculate;

speculate! {
    use minion_core::models::*;
    use minion_core::{CommsError, Database};

    fn setup_db() -> Database {
        let db = Database::open_memory().expect("Failed to create test database");
        db.migrate().expect("Failed to migrate");
        for (name, class) in [
            ("boss", AgentClass::Lead),
            ("ada", AgentClass::Builder),
            ("bob", AgentClass::Builder),
            ("cy", AgentClass::Builder),
        ] {
            db.register(RegisterAgentInput {
                name: name.into(),
                agent_class: class,
                model: None,
                description: None,
                transport: Transport::Daemon,
            })
            .expect("Failed to register");
        }
        db
    }

    describe "claim_file" {
        it "grants an unclaimed path" {
            let db = setup_db();

            let outcome = db.claim_file("ada", "/x").unwrap();

            assert!(matches!(outcome, ClaimOutcome::Granted { ref claim } if claim.holder == "ada"));
        }

        it "puts a second claimant on the waitlist" {
            let db = setup_db();
            db.claim_file("ada", "/x").unwrap();

            let outcome = db.claim_file("bob", "/x").unwrap();

            match outcome {
                ClaimOutcome::Waitlisted { holder, position, .. } => {
                    assert_eq!(holder, "ada");
                    assert_eq!(position, 1);
                }
                other => panic!("expected waitlist, got {:?}", other),
            }
            let claims = db.get_claims(None).unwrap();
            assert_eq!(claims.len(), 1);
            assert_eq!(claims[0].waitlist, vec!["bob"]);
        }

        it "never lists an agent twice on one waitlist" {
            let db = setup_db();
            db.claim_file("ada", "/x").unwrap();
            db.claim_file("bob", "/x").unwrap();
            db.claim_file("cy", "/x").unwrap();

            let again = db.claim_file("bob", "/x").unwrap();

            assert!(matches!(again, ClaimOutcome::Waitlisted { position: 1, .. }));
            assert_eq!(db.get_claims(None).unwrap()[0].waitlist, vec!["bob", "cy"]);
        }

        it "is a no-op for the current holder" {
            let db = setup_db();
            db.claim_file("ada", "/x").unwrap();

            let outcome = db.claim_file("ada", "/x").unwrap();

            assert!(matches!(outcome, ClaimOutcome::AlreadyHeld { .. }));
            assert!(outcome.is_granted());
        }

        it "treats equivalent spellings as the same path" {
            let db = setup_db();
            db.claim_file("ada", "/repo/src/lib.rs").unwrap();

            let outcome = db.claim_file("bob", "/repo/./src/../src/lib.rs").unwrap();

            assert!(!outcome.is_granted());
        }

        it "requires a registered agent" {
            let db = setup_db();
            let err = db.claim_file("ghost", "/x").unwrap_err();
            assert!(matches!(err, CommsError::NotFound(_)));
        }
    }

    describe "release_file" {
        it "reports the next in line without granting" {
            let db = setup_db();
            db.claim_file("ada", "/x").unwrap();
            db.claim_file("bob", "/x").unwrap();

            let released = db.release_file("ada", "/x", false).unwrap();

            assert_eq!(released.previous_holder, "ada");
            assert_eq!(released.next_in_line(), Some("bob"));
            assert!(db.get_claims(None).unwrap().is_empty());

            let outcome = db.claim_file("bob", "/x").unwrap();
            assert!(matches!(outcome, ClaimOutcome::Granted { .. }));
        }

        it "refuses a non-holder" {
            let db = setup_db();
            db.claim_file("ada", "/x").unwrap();

            let err = db.release_file("bob", "/x", false).unwrap_err();

            assert!(matches!(err, CommsError::Unauthorized(_)));
            assert_eq!(db.get_claims(None).unwrap().len(), 1);
        }

        it "refuses force from a non-lead" {
            let db = setup_db();
            db.claim_file("ada", "/x").unwrap();

            let err = db.release_file("bob", "/x", true).unwrap_err();

            assert!(err.to_string().starts_with("Only lead-class agents can force-release"));
        }

        it "lets a lead force-release" {
            let db = setup_db();
            db.claim_file("ada", "/x").unwrap();

            let released = db.release_file("boss", "/x", true).unwrap();

            assert_eq!(released.released_by, "boss");
            assert_eq!(released.previous_holder, "ada");
        }

        it "reports an unclaimed path" {
            let db = setup_db();
            let err = db.release_file("ada", "/nothing", false).unwrap_err();
            assert!(matches!(err, CommsError::NotFound(_)));
        }
    }

    describe "get_claims" {
        it "filters by holder" {
            let db = setup_db();
            db.claim_file("ada", "/a").unwrap();
            db.claim_file("bob", "/b").unwrap();

            let mine = db.get_claims(Some("ada")).unwrap();

            assert_eq!(mine.len(), 1);
            assert_eq!(mine[0].claim.file_path, "/a");
        }
    }
}
