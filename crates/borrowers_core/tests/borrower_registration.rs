use borrowers_core::db::{open_db, open_db_in_memory};
use borrowers_core::{
    Borrower, BorrowerField, BorrowerRepository, BorrowerService, BorrowerValidationError, CardId,
    NewBorrower, RegistrationError, RegistrationErrorKind, RepoError, SqliteBorrowerRepository,
};
use rusqlite::Connection;
use std::time::Duration;

fn service(conn: &Connection) -> BorrowerService<SqliteBorrowerRepository<'_>> {
    BorrowerService::new(SqliteBorrowerRepository::try_new(conn).unwrap())
}

fn count(conn: &Connection) -> u64 {
    SqliteBorrowerRepository::try_new(conn)
        .unwrap()
        .count_borrowers()
        .unwrap()
}

#[test]
fn register_then_get_returns_trimmed_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service
        .register("  John Doe ", " 123 Main St", "555-1234\t", " 111-22-3333 ")
        .unwrap();
    assert_eq!(created.card_id.as_str(), "ID000001");

    let loaded = service.get_borrower("ID000001").unwrap().unwrap();
    assert_eq!(
        loaded,
        Borrower {
            card_id: CardId::first(),
            name: "John Doe".to_string(),
            address: "123 Main St".to_string(),
            phone: "555-1234".to_string(),
            ssn: "111-22-3333".to_string(),
        }
    );
    assert_eq!(loaded, created);
}

#[test]
fn sequential_registrations_get_monotonic_ids() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    for n in 1..=12 {
        let created = service
            .register(
                &format!("Borrower {n}"),
                "1 Library Way",
                "555-0000",
                &format!("000-00-{n:04}"),
            )
            .unwrap();
        assert_eq!(created.card_id.as_str(), format!("ID{n:06}"));
    }
    assert_eq!(count(&conn), 12);
    assert_eq!(service.next_card_id().unwrap().as_str(), "ID000013");
}

#[test]
fn next_card_id_on_empty_table_is_first() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(service(&conn).next_card_id().unwrap(), CardId::first());
}

#[test]
fn duplicate_ssn_is_rejected_and_persists_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service
        .register("John Doe", "123 Main St", "555-1234", "111-22-3333")
        .unwrap();

    let err = service
        .register("Johnny Doe", "456 Oak Ave", "555-9999", "111-22-3333")
        .unwrap_err();

    assert_eq!(err.kind(), RegistrationErrorKind::Duplicate);
    assert!(matches!(&err, RegistrationError::DuplicateSsn(ssn) if ssn == "111-22-3333"));
    assert_eq!(count(&conn), 1);
    assert_eq!(service.get_borrower("ID000002").unwrap(), None);
}

#[test]
fn insert_time_ssn_constraint_reports_duplicate() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBorrowerRepository::try_new(&conn).unwrap();
    let input = NewBorrower::new("John Doe", "123 Main St", "555-1234", "111-22-3333").unwrap();

    repo.insert_borrower(&input).unwrap();
    let err = repo.insert_borrower(&input).unwrap_err();

    assert!(matches!(err, RepoError::DuplicateSsn(ssn) if ssn == "111-22-3333"));
    assert_eq!(repo.count_borrowers().unwrap(), 1);
    assert_eq!(repo.next_card_id().unwrap().as_str(), "ID000002");
}

#[test]
fn blank_fields_fail_with_field_specific_validation() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let cases = [
        (("", "a", "p", "s"), BorrowerField::Name),
        (("n", " \t", "p", "s"), BorrowerField::Address),
        (("n", "a", "\n", "s"), BorrowerField::Phone),
        (("n", "a", "p", "   "), BorrowerField::Ssn),
    ];
    for ((name, address, phone, ssn), field) in cases {
        let err = service.register(name, address, phone, ssn).unwrap_err();
        assert!(
            matches!(
                err,
                RegistrationError::Validation(BorrowerValidationError::MissingField(actual))
                    if actual == field
            ),
            "expected missing {field:?}, got {err}"
        );
    }
    assert_eq!(count(&conn), 0);
}

#[test]
fn get_unknown_or_malformed_id_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service
        .register("John Doe", "123 Main St", "555-1234", "111-22-3333")
        .unwrap();

    assert_eq!(service.get_borrower("ID000002").unwrap(), None);
    assert_eq!(service.get_borrower("id000001").unwrap(), None);
    assert_eq!(service.get_borrower("not-a-card").unwrap(), None);
}

#[test]
fn ids_keep_increasing_past_six_digits() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO borrowers (card_id, name, address, phone, ssn)
         VALUES ('ID999999', 'Last Narrow', 'Addr', 'Phone', '999-99-9999');",
        [],
    )
    .unwrap();
    let service = service(&conn);

    let wide = service
        .register("First Wide", "Addr", "Phone", "100-00-0000")
        .unwrap();
    assert_eq!(wide.card_id.as_str(), "ID1000000");

    let wider = service
        .register("Second Wide", "Addr", "Phone", "100-00-0001")
        .unwrap();
    assert_eq!(wider.card_id.as_str(), "ID1000001");
}

#[test]
fn allocation_ignores_gaps_and_uses_current_maximum() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO borrowers (card_id, name, address, phone, ssn)
         VALUES ('ID000041', 'Imported', 'Addr', 'Phone', '555-55-5555');",
        [],
    )
    .unwrap();

    let created = service(&conn)
        .register("New", "Addr", "Phone", "666-66-6666")
        .unwrap();
    assert_eq!(created.card_id.as_str(), "ID000042");
}

#[test]
fn rows_without_well_formed_ids_fail_loudly() {
    let conn = legacy_connection(&["LEGACY-7"]);
    let service = service(&conn);

    let err = service.next_card_id().unwrap_err();
    assert!(matches!(err, RepoError::CorruptCardIdSequence { rows: 1 }));

    let err = service
        .register("John Doe", "123 Main St", "555-1234", "111-22-3333")
        .unwrap_err();
    assert_eq!(err.kind(), RegistrationErrorKind::Store);
    assert_eq!(count(&conn), 1);
}

#[test]
fn legacy_rows_are_skipped_when_a_well_formed_id_exists() {
    let conn = legacy_connection(&["LEGACY-7", "ID000004", "ID12"]);

    let next = service(&conn).next_card_id().unwrap();
    assert_eq!(next.as_str(), "ID000005");
}

#[test]
fn short_digit_ids_do_not_count_as_well_formed() {
    let conn = legacy_connection(&["ID12", "ID99999"]);

    let err = service(&conn).next_card_id().unwrap_err();
    assert!(matches!(err, RepoError::CorruptCardIdSequence { rows: 2 }));
}

#[test]
fn write_lock_timeout_is_reported_as_allocation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("borrowers.db");
    let holder = open_db(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let waiter = open_db(&path).unwrap();
    waiter.busy_timeout(Duration::from_millis(50)).unwrap();
    let repo = SqliteBorrowerRepository::try_new(&waiter).unwrap();
    let input = NewBorrower::new("John Doe", "123 Main St", "555-1234", "111-22-3333").unwrap();

    let err = repo.insert_borrower(&input).unwrap_err();
    assert!(matches!(err, RepoError::Allocation(_)), "unexpected error: {err}");

    holder.execute_batch("ROLLBACK;").unwrap();
    assert_eq!(count(&waiter), 0);
}

#[test]
fn malformed_persisted_id_is_reported_on_read() {
    let conn = legacy_connection(&["LEGACY-7"]);

    let err = service(&conn).get_borrower("LEGACY-7").unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

/// Builds a current-version schema without the card id `CHECK`, as an
/// externally managed database might have.
fn legacy_connection(card_ids: &[&str]) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE borrowers (
            card_id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            phone TEXT NOT NULL,
            ssn TEXT NOT NULL UNIQUE
        );",
    )
    .unwrap();
    conn.execute_batch(&format!(
        "PRAGMA user_version = {};",
        borrowers_core::db::migrations::latest_version()
    ))
    .unwrap();
    for (index, card_id) in card_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO borrowers (card_id, name, address, phone, ssn)
             VALUES (?1, 'Legacy', 'Addr', 'Phone', ?2);",
            [card_id.to_string(), format!("legacy-{index}")],
        )
        .unwrap();
    }
    conn
}
