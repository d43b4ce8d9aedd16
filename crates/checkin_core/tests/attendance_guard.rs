use checkin_core::db::open_db;
use checkin_core::{
    AttendanceCounts, AttendanceState, DuplicateField, NewRegistration, RegistrationError,
    RegistrationService, RegistrationStore, ScannedToken, SqliteRegistrationRepository,
    TokenPayload,
};
use std::sync::{Arc, Barrier};
use std::thread;

const PARALLEL_SCANS: usize = 8;

#[test]
fn second_mark_is_already_marked_and_flag_stays_true() {
    let store = RegistrationStore::open_in_memory().unwrap();
    let created = store
        .register(&NewRegistration::new("Alice", "a@x.com", "R1"))
        .unwrap();
    assert_eq!(created.state(), AttendanceState::Registered);

    let marked = store.mark_attendance(created.id).unwrap();
    assert!(marked.attended);
    assert_eq!(marked.state(), AttendanceState::Attended);
    let first_attended_at = marked.attended_at.expect("attended_at must be stamped");

    let err = store.mark_attendance(created.id).unwrap_err();
    assert!(matches!(err, RegistrationError::AlreadyMarked(id) if id == created.id));

    let reloaded = store.find_by_id(created.id).unwrap().unwrap();
    assert!(reloaded.attended);
    assert_eq!(reloaded.attended_at, Some(first_attended_at));
}

#[test]
fn unknown_id_is_not_found() {
    let store = RegistrationStore::open_in_memory().unwrap();
    store
        .register(&NewRegistration::new("Alice", "a@x.com", "R1"))
        .unwrap();

    let err = store.mark_attendance(99).unwrap_err();
    assert!(matches!(err, RegistrationError::NotFound(99)));
    assert!(err.is_user_facing());
}

#[test]
fn end_to_end_scenario_counts_one_registered_one_attended() {
    let store = RegistrationStore::open_in_memory().unwrap();

    let alice = store
        .register(&NewRegistration::new("Alice", "a@x.com", "R1"))
        .unwrap();
    assert_eq!(alice.id, 1);
    assert!(!alice.attended);

    let err = store
        .register(&NewRegistration::new("Bob", "a@x.com", "R2"))
        .unwrap_err();
    assert!(matches!(err, RegistrationError::Duplicate(DuplicateField::Email)));

    let payload = TokenPayload::from_registration(&alice).encode().unwrap();
    let scanned = ScannedToken::parse(&payload).unwrap();
    assert!(store.mark_scanned(&scanned).unwrap().attended);

    let err = store.mark_scanned(&scanned).unwrap_err();
    assert!(matches!(err, RegistrationError::AlreadyMarked(1)));

    assert_eq!(
        store.counts().unwrap(),
        AttendanceCounts {
            total_registered: 1,
            total_attended: 1,
        }
    );
}

#[test]
fn parallel_marks_through_shared_store_yield_exactly_one_success() {
    let store = Arc::new(RegistrationStore::open_in_memory().unwrap());
    let id = store
        .register(&NewRegistration::new("Alice", "a@x.com", "R1"))
        .unwrap()
        .id;

    let barrier = Arc::new(Barrier::new(PARALLEL_SCANS));
    let handles = (0..PARALLEL_SCANS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.mark_attendance(id)
            })
        })
        .collect::<Vec<_>>();

    let results = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();
    assert_outcomes(&results, id);
    assert_eq!(store.counts().unwrap().total_attended, 1);
}

#[test]
fn parallel_marks_on_separate_connections_yield_exactly_one_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.sqlite3");
    let id = {
        let conn = open_db(&path).unwrap();
        let service =
            RegistrationService::new(SqliteRegistrationRepository::try_new(&conn).unwrap());
        service
            .register(&NewRegistration::new("Alice", "a@x.com", "R1"))
            .unwrap()
            .id
    };

    let barrier = Arc::new(Barrier::new(PARALLEL_SCANS));
    let handles = (0..PARALLEL_SCANS)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = RegistrationService::new(
                    SqliteRegistrationRepository::try_new(&conn).unwrap(),
                );
                barrier.wait();
                service.mark_attendance(id)
            })
        })
        .collect::<Vec<_>>();

    let results = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();
    assert_outcomes(&results, id);
}

#[test]
fn parallel_registrations_with_same_email_admit_exactly_one() {
    let store = Arc::new(RegistrationStore::open_in_memory().unwrap());
    let barrier = Arc::new(Barrier::new(PARALLEL_SCANS));

    let handles = (0..PARALLEL_SCANS)
        .map(|index| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.register(&NewRegistration::new(
                    format!("Person {index}"),
                    "shared@x.com",
                    format!("R{index}"),
                ))
            })
        })
        .collect::<Vec<_>>();

    let results = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();
    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results.iter().filter_map(|result| result.as_ref().err()).all(
        |err| matches!(err, RegistrationError::Duplicate(DuplicateField::Email))
    ));
    assert_eq!(store.counts().unwrap().total_registered, 1);
}

fn assert_outcomes(
    results: &[Result<checkin_core::Registration, RegistrationError>],
    id: i64,
) {
    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1, "exactly one scan must win: {results:?}");

    for result in results {
        if let Err(err) = result {
            assert!(
                matches!(err, RegistrationError::AlreadyMarked(marked) if *marked == id),
                "losing scans must be AlreadyMarked, got {err}"
            );
        }
    }
}
