use contracts::TrustBelief;
use rescue_api::{RescueSession, Scenario, SqliteBeliefStore, StoreBackend};

const SCENARIO: &str = r#"{
    "start": { "x": 1, "y": 6 },
    "ticks": 30,
    "rooms": [
        { "name": "area 1", "origin": { "x": 0, "y": 0 }, "width": 3, "height": 3,
          "door": { "x": 1, "y": 3 }, "doormat": { "x": 1, "y": 4 } }
    ],
    "drop_zones": [ { "victim": "critically injured man", "location": { "x": 10, "y": 10 } } ],
    "teammate": [
        { "tick": 0, "type": "say", "content": "Found: mildly injured boy in area 5" }
    ]
}"#;

fn scenario() -> Scenario {
    Scenario::from_json_str(SCENARIO).expect("scenario parses")
}

#[test]
fn learned_belief_survives_into_the_next_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("beliefs.sqlite");
    let scenario = scenario();

    let mut first = RescueSession::from_scenario(&scenario).expect("session");
    first.attach_sqlite_store(&db_path).expect("attach");
    first.run_scenario(&scenario, Some(5));
    let learned = first.status().belief;
    assert!(learned.willingness < 0.0, "unannounced find lowers willingness");
    assert_eq!(first.last_persistence_error(), None);
    drop(first);

    let mut second = RescueSession::from_scenario(&scenario).expect("session");
    assert_eq!(second.status().belief, TrustBelief::default());
    second.attach_sqlite_store(&db_path).expect("attach");

    let status = second.status();
    assert_eq!(status.backend, StoreBackend::Sqlite);
    assert_eq!(status.belief, learned);
    assert_eq!(status.ticks_run, 0);
}

#[test]
fn every_tick_appends_one_history_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("beliefs.sqlite");
    let scenario = scenario();

    let mut session = RescueSession::from_scenario(&scenario).expect("session");
    session.attach_sqlite_store(&db_path).expect("attach");
    let outputs = session.run_scenario(&scenario, Some(7));
    let teammate = session.config().teammate_name.clone();
    drop(session);

    let store = SqliteBeliefStore::open_read_only(&db_path).expect("read-only open");
    let history = store.load_history(&teammate, None).expect("history");
    assert_eq!(history.len(), outputs.len());
    assert_eq!(
        history.iter().map(|record| record.tick).collect::<Vec<_>>(),
        (0..7).collect::<Vec<u64>>()
    );
    assert_eq!(history[0].willingness, outputs[0].belief.willingness);

    let beliefs = store.list_beliefs().expect("beliefs");
    assert_eq!(beliefs.len(), 1);
    assert_eq!(beliefs[0].name, teammate);
    assert_eq!(beliefs[0].belief, outputs[6].belief);
}

#[test]
fn read_only_store_refuses_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("beliefs.sqlite");
    SqliteBeliefStore::open(&db_path).expect("create");

    let mut store = SqliteBeliefStore::open_read_only(&db_path).expect("read-only open");
    assert!(store.delete_teammate("human").is_err());
}
