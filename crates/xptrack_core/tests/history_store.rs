use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;
use uuid::Uuid;
use xptrack_core::db::open_db_in_memory;
use xptrack_core::repo::character_repo::{
    CharacterRepository, CharacterRow, SqliteCharacterRepository,
};
use xptrack_core::{
    CharacterId, CharacterSnapshot, HistoryStore, RepoError, SnapshotRejection,
    SqliteHistoryStore,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap()
}

fn seed_character(conn: &Connection, name: &str) -> CharacterId {
    let row = CharacterRow {
        id: Uuid::new_v4(),
        name: name.to_string(),
        world: "San".to_string(),
        created_at: t0(),
    };
    SqliteCharacterRepository::new(conn).insert(&row).unwrap();
    row.id
}

fn snap(id: CharacterId, minutes: i64, level: u32, experience: u64, deaths: u32) -> CharacterSnapshot {
    CharacterSnapshot {
        character_id: id,
        observed_at: t0() + Duration::minutes(minutes),
        level,
        experience,
        deaths,
        vocation: "Elder Druid".to_string(),
        world: "San".to_string(),
    }
}

#[test]
fn append_then_latest_and_all_are_ordered() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_character(&conn, "Alice");
    let store = SqliteHistoryStore::new(&conn);

    store.append(id, &snap(id, 0, 10, 1_000, 0)).unwrap();
    store.append(id, &snap(id, 30, 10, 1_400, 0)).unwrap();
    store.append(id, &snap(id, 90, 11, 2_100, 1)).unwrap();

    let latest = store.latest(id).unwrap();
    assert_eq!(latest.experience, 2_100);
    assert_eq!(latest.level, 11);

    let all = store.all(id).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all
        .windows(2)
        .all(|pair| pair[0].observed_at < pair[1].observed_at
            && pair[0].experience <= pair[1].experience
            && pair[0].deaths <= pair[1].deaths));
}

#[test]
fn latest_on_empty_history_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_character(&conn, "Nobody");
    let store = SqliteHistoryStore::new(&conn);

    let err = store.latest(id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(found) if found == id));
    assert!(store.all(id).unwrap().is_empty());
}

#[test]
fn append_rejects_non_increasing_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_character(&conn, "Alice");
    let store = SqliteHistoryStore::new(&conn);
    store.append(id, &snap(id, 10, 10, 1_000, 0)).unwrap();

    let same_time = store.append(id, &snap(id, 10, 10, 1_200, 0)).unwrap_err();
    assert!(matches!(
        same_time,
        RepoError::InvalidSnapshot(SnapshotRejection::NotAfterLatest { .. })
    ));

    let earlier = store.append(id, &snap(id, 5, 10, 1_200, 0)).unwrap_err();
    assert!(matches!(
        earlier,
        RepoError::InvalidSnapshot(SnapshotRejection::NotAfterLatest { .. })
    ));
    assert_eq!(store.all(id).unwrap().len(), 1);
}

#[test]
fn append_rejects_experience_and_death_regressions() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_character(&conn, "Alice");
    let store = SqliteHistoryStore::new(&conn);
    store.append(id, &snap(id, 0, 20, 50_000, 4)).unwrap();

    let exp_err = store.append(id, &snap(id, 1, 20, 49_999, 4)).unwrap_err();
    match exp_err {
        RepoError::InvalidSnapshot(SnapshotRejection::ExperienceRegressed { latest, observed }) => {
            assert_eq!(latest, 50_000);
            assert_eq!(observed, 49_999);
        }
        other => panic!("unexpected error: {other}"),
    }

    let death_err = store.append(id, &snap(id, 2, 20, 50_000, 3)).unwrap_err();
    assert!(matches!(
        death_err,
        RepoError::InvalidSnapshot(SnapshotRejection::DeathsRegressed {
            latest: 4,
            observed: 3
        })
    ));

    assert_eq!(store.latest(id).unwrap(), snap(id, 0, 20, 50_000, 4));
}

#[test]
fn level_may_drop_while_experience_holds() {
    // A death costs levels upstream but cumulative counters never go back.
    let conn = open_db_in_memory().unwrap();
    let id = seed_character(&conn, "Alice");
    let store = SqliteHistoryStore::new(&conn);
    store.append(id, &snap(id, 0, 30, 100_000, 0)).unwrap();
    store.append(id, &snap(id, 1, 29, 100_000, 1)).unwrap();
    assert_eq!(store.latest(id).unwrap().level, 29);
}

#[test]
fn append_rejects_snapshot_of_another_character() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_character(&conn, "Alice");
    let bob = seed_character(&conn, "Bob");
    let store = SqliteHistoryStore::new(&conn);

    let err = store.append(alice, &snap(bob, 0, 1, 0, 0)).unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidSnapshot(SnapshotRejection::CharacterMismatch { .. })
    ));
}

#[test]
fn histories_are_independent_per_character() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_character(&conn, "Alice");
    let bob = seed_character(&conn, "Bob");
    let store = SqliteHistoryStore::new(&conn);

    store.append(alice, &snap(alice, 10, 50, 900_000, 0)).unwrap();
    // Bob starts earlier and lower; Alice's tail does not constrain him.
    store.append(bob, &snap(bob, 0, 8, 4_000, 0)).unwrap();

    assert_eq!(store.all(alice).unwrap().len(), 1);
    assert_eq!(store.all(bob).unwrap().len(), 1);
}

#[test]
fn since_returns_window_ascending() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_character(&conn, "Alice");
    let store = SqliteHistoryStore::new(&conn);
    for (minute, experience) in [(0, 100), (60, 200), (120, 300), (180, 400)] {
        store.append(id, &snap(id, minute, 5, experience, 0)).unwrap();
    }

    let window = store.since(id, t0() + Duration::minutes(60)).unwrap();
    let values: Vec<u64> = window.iter().map(|s| s.experience).collect();
    assert_eq!(values, vec![200, 300, 400]);
}

#[test]
fn delete_all_removes_every_snapshot() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_character(&conn, "Alice");
    let store = SqliteHistoryStore::new(&conn);
    store.append(id, &snap(id, 0, 5, 100, 0)).unwrap();
    store.append(id, &snap(id, 1, 5, 150, 0)).unwrap();

    assert_eq!(store.delete_all(id).unwrap(), 2);
    assert!(store.all(id).unwrap().is_empty());
    assert!(matches!(store.latest(id), Err(RepoError::NotFound(_))));
}

#[test]
fn stored_snapshot_reads_back_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let id = seed_character(&conn, "Alice");
    let store = SqliteHistoryStore::new(&conn);
    let original = snap(id, 42, 77, 12_345_678, 9);

    store.append(id, &original).unwrap();
    assert_eq!(store.latest(id).unwrap(), original);
}
