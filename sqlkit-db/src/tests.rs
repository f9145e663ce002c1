//! Unit tests for the safe SQLite binding.

use std::io::{Read, Seek, SeekFrom, Write};

use test_case::test_case;

use super::*;

/// Runs every statement in `script` to completion.
fn exec(conn: &Connection, script: &str) -> DbResult<()> {
    let mut rest = script;
    while let Some((mut stmt, trailing)) = conn.prepare_next(rest)? {
        stmt.step_to_end()?;
        rest = &rest[rest.len() - trailing..];
    }
    Ok(())
}

fn resetint(conn: &Connection) {
    exec(
        conn,
        "CREATE TABLE resetint (c);
INSERT INTO resetint (c) VALUES (1);
INSERT INTO resetint (c) VALUES (2);
INSERT INTO resetint (c) VALUES (3);",
    )
    .expect("populate resetint");
}

#[test]
fn test_create_insert_select() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    {
        let (mut stmt, _) = conn
            .prepare_transient("CREATE TABLE bartable (foo1 string, foo2 integer);")
            .expect("prepare create");
        assert_eq!(stmt.step().expect("create"), StepResult::Done);
        stmt.finalize().expect("finalize");
    }

    let foo_vals = ["bar", "baz", "bop"];
    for (i, val) in foo_vals.iter().enumerate() {
        let mut stmt = conn
            .prepare("INSERT INTO bartable (foo1, foo2) VALUES ($f1, $f2);")
            .expect("prepare insert");
        stmt.set_text("$f1", val);
        stmt.set_int64("$f2", i64::try_from(i).expect("index"));
        assert_eq!(stmt.step().expect("insert"), StepResult::Done);
    }

    let mut stmt = conn
        .prepare("SELECT foo1, foo2 FROM bartable;")
        .expect("prepare select");
    let mut got_vals = Vec::new();
    let mut got_ints = Vec::new();
    while stmt.step().expect("select").is_row() {
        let val = stmt.column_text(0);
        assert_eq!(stmt.get_text("foo1"), val);
        let int_val = stmt.column_int64(1);
        assert_eq!(stmt.get_int64("foo2"), int_val);
        assert_eq!(stmt.column_type(0), ColumnType::Text);
        assert_eq!(stmt.column_type(1), ColumnType::Integer);
        got_vals.push(val);
        got_ints.push(int_val);
    }
    assert_eq!(got_vals, foo_vals);
    assert_eq!(got_ints, [0, 1, 2]);
    stmt.finalize().expect("finalize");

    conn.close().expect("close");
}

#[test]
fn test_double_quoted_strings_rejected() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let err = conn
        .prepare(r#"SELECT "foo" = 'foo';"#)
        .expect_err("double-quoted string literal");
    assert_eq!(err.kind(), ErrorKind::Prepare);
}

#[test]
fn test_early_interrupt() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let signal = InterruptSignal::new();
    assert!(conn.set_interrupt(Some(signal.clone())).is_none());

    let (mut stmt, _) = conn
        .prepare_transient("CREATE TABLE bartable (foo1 string, foo2 integer);")
        .expect("prepare");
    stmt.step().expect("create");
    stmt.finalize().expect("finalize");

    signal.fire();
    let err = conn
        .prepare("INSERT INTO bartable (foo1, foo2) VALUES ($f1, $f2);")
        .expect_err("prepare after interrupt");
    assert_eq!(err.code(), ResultCode::Interrupt);
    assert!(err.is_interrupted());

    conn.close().expect("close");
}

#[test]
fn test_interrupted_statement_stays_interrupted() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("CREATE TABLE intt (c);").expect("prepare");

    let signal = InterruptSignal::new();
    signal.fire();
    conn.set_interrupt(Some(signal));
    let err = stmt.step().expect_err("interrupted step");
    assert_eq!(err.code(), ResultCode::Interrupt);
    assert_eq!(stmt.state(), StatementState::Interrupted);

    // Clearing the signal alone does not revive the statement.
    conn.set_interrupt(None);
    let err = stmt.step().expect_err("still interrupted");
    assert_eq!(err.code(), ResultCode::Interrupt);

    stmt.reset().expect("reset");
    assert_eq!(stmt.state(), StatementState::Ready);
    assert_eq!(stmt.step().expect("step"), StepResult::Done);
}

#[test]
fn test_interrupt_step_reset() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    resetint(&conn);

    let signal = InterruptSignal::new();
    conn.set_interrupt(Some(signal.clone()));
    {
        let mut stmt = conn.prep("SELECT * FROM resetint;").expect("prep");
        assert_eq!(stmt.step().expect("first row"), StepResult::Row);
        signal.fire();
        let err = stmt.step().expect_err("interrupted");
        assert_eq!(err.code(), ResultCode::Interrupt);
    }

    let previous = conn.set_interrupt(None).expect("previous signal");
    assert!(previous.same_as(&signal));
    let mut stmt = conn
        .prep("SELECT c FROM resetint ORDER BY c;")
        .expect("prep after interrupt");
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.column_int64(0), 1);
    stmt.reset().expect("reset");
}

#[test]
fn test_interrupt_reset() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    resetint(&conn);

    let signal = InterruptSignal::new();
    conn.set_interrupt(Some(signal.clone()));
    {
        let mut stmt = conn.prep("SELECT * FROM resetint;").expect("prep");
        assert_eq!(stmt.step().expect("first row"), StepResult::Row);
    }
    signal.fire();
    conn.set_interrupt(None);

    let mut stmt = conn
        .prep("SELECT c FROM resetint ORDER BY c;")
        .expect("prep after interrupt");
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    stmt.reset().expect("reset");
}

#[test]
fn test_reset_interrupted_ready_statement() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, "CREATE TABLE test (id INTEGER PRIMARY KEY)").expect("create");
    let mut stmt = conn.prepare("SELECT * FROM test").expect("prepare");

    let signal = InterruptSignal::new();
    conn.set_interrupt(Some(signal.clone()));
    signal.fire();

    let err = stmt.reset().expect_err("reset while interrupted");
    assert_eq!(err.code(), ResultCode::Interrupt);
    assert_eq!(err.kind(), ErrorKind::Reset);
}

#[test]
fn test_long_query_aborted_by_interrupt() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let signal = InterruptSignal::new();
    conn.set_interrupt(Some(signal.clone()));
    let mut stmt = conn
        .prepare(
            "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n) \
             SELECT count(*) FROM n;",
        )
        .expect("prepare");
    let remote = signal.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        remote.fire();
    });
    let err = stmt.step().expect_err("endless query must be interrupted");
    handle.join().expect("join");
    assert!(err.is_interrupted());
    assert_eq!(stmt.state(), StatementState::Interrupted);
}

#[test]
fn test_trailing_bytes() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let (stmt, trailing) = conn
        .prepare_transient("BEGIN; -- 56")
        .expect("prepare transient");
    stmt.finalize().expect("finalize");
    assert_eq!(trailing, 6);
    conn.close().expect("close");
}

#[test]
fn test_trailing_bytes_error() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let err = conn
        .prepare("BEGIN; -- 56")
        .expect_err("trailing comment must be rejected");
    assert_eq!(err.kind(), ErrorKind::Prepare);
    conn.prepare("SELECT 1;  \n").expect("trailing whitespace is fine");
}

#[test]
fn test_empty_input() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.prepare("  -- nothing").expect_err("no statement");
    conn.prepare_transient("").expect_err("no statement");
    assert!(conn
        .prepare_next(" /* only a comment */ ")
        .expect("prepare next")
        .is_none());
}

#[test]
fn test_bad_param() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, "CREATE TABLE IF NOT EXISTS badparam (a, b, c);").expect("create");

    let mut stmt = conn
        .prepare("INSERT INTO badparam (a, b, c) VALUES ($a, $b, $c);")
        .expect("prepare");
    stmt.set_text("$a", "col_a");
    stmt.set_text("$b", "col_b");
    stmt.set_text("$badparam", "notaval");
    stmt.set_text("$c", "col_c");
    let err = stmt.step().expect_err("bad param name");
    assert_eq!(err.kind(), ErrorKind::Bind);
    assert!(
        err.to_string().contains("$badparam"),
        "error does not mention \"$badparam\": {err}"
    );
    stmt.finalize().expect("finalize");
}

#[test]
fn test_bind_values_is_eager() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT ?1, ?2").expect("prepare");
    stmt.bind_values(params![1_i64, "two"]).expect("bind");
    let err = stmt
        .bind_values(params![1_i64, "two", 3.0])
        .expect_err("too many values");
    assert_eq!(err.code(), ResultCode::Range);
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.column_value(0), Value::Integer(1));
    assert_eq!(stmt.column_value(1), Value::Text("two".to_string()));
}

#[test]
fn test_parallel_statements() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.prep("CREATE TABLE testparallel (c);")
        .expect("prep")
        .step()
        .expect("create");

    {
        let mut stmt = conn
            .prep("INSERT INTO testparallel (c) VALUES ($c);")
            .expect("prep");
        stmt.set_text("$c", "text");
        stmt.step().expect("insert");
        stmt.reset().expect("reset");
        stmt.step().expect("insert again");
    }

    let mut stmt = conn.prep("SELECT * from testparallel;").expect("prep");
    assert_eq!(stmt.step().expect("first row"), StepResult::Row);

    let mut stmt2 = conn
        .prep("SELECT count(*) from testparallel;")
        .expect("prep");
    assert_eq!(stmt2.step().expect("count"), StepResult::Row);
    assert_eq!(stmt2.column_int(0), 2);

    assert_eq!(stmt.step().expect("second row"), StepResult::Row);
}

#[test]
fn test_bind_bytes() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut val = vec![0u8; 32];
    val[5..16].copy_from_slice(b"hello world");

    conn.prep("CREATE TABLE IF NOT EXISTS bindbytes (c);")
        .expect("prep")
        .step()
        .expect("create");
    {
        let mut stmt = conn
            .prep("INSERT INTO bindbytes (c) VALUES ($bytes);")
            .expect("prep");
        stmt.set_bytes("$bytes", &val);
        stmt.step().expect("insert");
    }

    {
        let mut stmt = conn
            .prep("SELECT count(*) FROM bindbytes WHERE c = $bytes;")
            .expect("prep");
        stmt.set_bytes("$bytes", &val);
        assert_eq!(stmt.step().expect("count"), StepResult::Row);
        assert_eq!(stmt.column_int(0), 1);

        stmt.reset().expect("reset");
        stmt.set_bytes("$bytes", &val);
        assert_eq!(stmt.step().expect("count again"), StepResult::Row);
        assert_eq!(stmt.column_int(0), 1);
    }

    let mut blob = conn
        .open_blob("", "bindbytes", "c", 1, false)
        .expect("open blob");
    let mut stored = Vec::new();
    blob.read_to_end(&mut stored).expect("read blob");
    assert_eq!(stored, val);
    blob.close().expect("close blob");
}

#[test]
fn test_bind_text() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    const VAL: &str = "column_value";

    conn.prep("CREATE TABLE IF NOT EXISTS bindtext (c);")
        .expect("prep")
        .step()
        .expect("create");
    {
        let mut stmt = conn
            .prep("INSERT INTO bindtext (c) VALUES ($text);")
            .expect("prep");
        stmt.set_text("$text", VAL);
        stmt.step().expect("insert");
    }

    let mut stmt = conn
        .prep("SELECT count(*) FROM bindtext WHERE c = $text;")
        .expect("prep");
    stmt.set_text("$text", VAL);
    assert_eq!(stmt.step().expect("count"), StepResult::Row);
    assert_eq!(stmt.column_int(0), 1);

    stmt.reset().expect("reset");
    stmt.set_text("$text", VAL);
    assert_eq!(stmt.step().expect("count again"), StepResult::Row);
    assert_eq!(stmt.column_int(0), 1);
}

#[test]
fn test_embedded_zero_bytes_round_trip() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT $t, $b").expect("prepare");
    stmt.set_text("$t", "a\0b");
    stmt.set_bytes("$b", &[0, 1, 0]);
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.column_text(0), "a\0b");
    assert_eq!(stmt.column_len(0), 3);
    assert_eq!(stmt.column_bytes(1), [0, 1, 0]);
    assert_eq!(stmt.get_len("$b"), 3);
}

#[test]
fn test_empty_blob_is_not_null() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT typeof(?1)").expect("prepare");
    stmt.bind_bytes(1, &[]);
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.column_text(0), "blob");
}

#[test]
fn test_reset_in_ready_keeps_bindings() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT $v").expect("prepare");
    stmt.set_int64("$v", 7);
    stmt.reset().expect("reset in ready");
    assert_eq!(stmt.state(), StatementState::Ready);
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.column_int64(0), 7);

    stmt.reset().expect("reset after row");
    stmt.clear_bindings();
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert!(stmt.is_column_null(0));
}

#[test]
fn test_columns_default_without_row() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT 42 AS answer").expect("prepare");
    assert_eq!(stmt.column_count(), 1);
    assert_eq!(stmt.column_int64(0), 0);
    assert_eq!(stmt.column_type(0), ColumnType::Null);
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.data_count(), 1);
    assert_eq!(stmt.get_int("ANSWER"), 42);
    assert_eq!(stmt.column_int64(9), 0);
    assert_eq!(stmt.step().expect("done"), StepResult::Done);
    assert_eq!(stmt.column_int64(0), 0);
}

#[test]
fn test_extended_codes() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.prep("CREATE TABLE IF NOT EXISTS extcodes (c UNIQUE);")
        .expect("prep")
        .step()
        .expect("create");

    let mut stmt = conn
        .prep("INSERT INTO extcodes (c) VALUES ($c);")
        .expect("prep");
    stmt.set_text("$c", "value1");
    stmt.step().expect("first insert");
    stmt.reset().expect("reset");
    stmt.set_text("$c", "value1");
    let err = stmt.step().expect_err("UNIQUE violation");
    assert_eq!(err.code(), ResultCode::ConstraintUnique);
    assert_eq!(err.code().to_primary(), ResultCode::Constraint);
    assert!(err.is_constraint());

    // The failure is already reported; reset does not repeat it.
    stmt.reset().expect("reset after failure");
}

#[test]
fn test_syntax_error() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let err = conn
        .prepare_transient(" \nSELECT );")
        .expect_err("syntax error");
    let msg = err.to_string();
    assert!(msg.contains("2:8"), "{msg:?} does not contain \"2:8\"");
    assert_eq!(err.offset(), Some(9));
    assert_eq!(err.position, Some(Position { line: 2, column: 8 }));
}

#[test]
fn test_position_locate() {
    assert_eq!(Position::locate("SELECT", 0), Position { line: 1, column: 1 });
    assert_eq!(
        Position::locate("a\nbc\ndef", 6),
        Position { line: 3, column: 2 }
    );
    assert_eq!(Position::locate("ab", 99), Position { line: 1, column: 3 });
}

#[test_case("test-delete.db", OpenFlags::READ_WRITE | OpenFlags::CREATE, "delete" ; "file without wal")]
#[test_case("test-wal.db", OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::WAL, "wal" ; "file with wal")]
#[test_case("test-default-wal.db", OpenFlags::empty(), "wal" ; "file with default flags")]
#[test_case(":memory:", OpenFlags::empty(), "memory" ; "memory database")]
#[test_case("", OpenFlags::empty(), "delete" ; "temporary database")]
fn test_journal_mode(db: &str, flags: OpenFlags, want: &str) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = if db.is_empty() || db == ":memory:" {
        db.to_string()
    } else {
        dir.path().join(db).to_string_lossy().into_owned()
    };
    let conn = Connection::open(&path, flags).expect("open");
    {
        let mut stmt = conn.prep("PRAGMA journal_mode;").expect("prep");
        assert_eq!(stmt.step().expect("step"), StepResult::Row);
        assert_eq!(stmt.get_text("journal_mode"), want);
    }
    conn.close().expect("close");
}

#[test]
fn test_column_index() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, "CREATE TABLE IF NOT EXISTS columnindex (a, b, c);").expect("create");
    let stmt = conn
        .prepare("SELECT b, 1 AS d, a, c, 2 AS A FROM columnindex")
        .expect("prepare");

    assert_eq!(stmt.column_index("a"), Some(2));
    assert_eq!(stmt.column_index("b"), Some(0));
    assert_eq!(stmt.column_index("c"), Some(3));
    assert_eq!(stmt.column_index("d"), Some(1));
    assert_eq!(stmt.column_index("D"), Some(1));
    assert_eq!(stmt.column_index("badcol"), None);
    stmt.finalize().expect("finalize");
}

#[test]
fn test_bind_param_name() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let stmt = conn.prepare("SELECT :foo, :bar;").expect("prepare");
    let mut got: Vec<String> = (1..=stmt.bind_param_count())
        .filter_map(|i| stmt.bind_param_name(i))
        .collect();
    got.sort();
    assert_eq!(got, [":bar", ":foo"]);
    assert!(stmt.bind_param_index(":foo").is_some());
    assert_eq!(stmt.bind_param_index(":baz"), None);
    assert!(stmt.readonly());
}

#[test]
fn test_limit() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let previous = conn.set_limit(Limit::SqlLength, 1);
    assert!(previous > 1);
    assert_eq!(conn.limit(Limit::SqlLength), 1);
    let err = conn.prepare("SELECT 1;").expect_err("statement longer than limit");
    assert_eq!(err.code(), ResultCode::TooBig);
}

#[test]
fn test_set_defensive() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, "PRAGMA writable_schema=ON;").expect("writable schema");
    conn.set_defensive(true).expect("set defensive");
    let err = exec(
        &conn,
        "INSERT INTO sqlite_schema (type, name, tbl_name, sql) \
         VALUES ('table','foo','foo','CREATE TABLE foo (id integer primary key)');",
    )
    .expect_err("writing sqlite_schema in defensive mode");
    assert!(!err.message.is_empty());
}

#[test]
fn test_serialize_into_attached() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(
        &conn,
        "CREATE TABLE foo (msg TEXT NOT NULL);
         INSERT INTO foo VALUES ('Hello, World!');",
    )
    .expect("populate");
    let data = conn.serialize("main").expect("serialize");
    assert!(!data.is_empty());

    exec(&conn, "ATTACH DATABASE ':memory:' AS a;").expect("attach");
    conn.deserialize("a", &data).expect("deserialize");

    let mut stmt = conn.prepare("SELECT msg FROM a.foo;").expect("prepare");
    let mut results = 0;
    while stmt.step().expect("step").is_row() {
        results += 1;
        assert_eq!(stmt.column_text(0), "Hello, World!");
    }
    assert_eq!(results, 1);
}

#[test]
fn test_serialize_unknown_schema() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let err = conn.serialize("nope").expect_err("unknown schema");
    assert_eq!(err.kind(), ErrorKind::Serialize);
}

#[test]
fn test_deserialize_while_statement_runs() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, "CREATE TABLE t (c); INSERT INTO t VALUES (1), (2);").expect("populate");
    let image = conn.serialize("").expect("serialize");

    let mut stmt = conn.prepare("SELECT c FROM t").expect("prepare");
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    let err = conn
        .deserialize("main", &image)
        .expect_err("statement mid-execution");
    assert!(err.is_busy());
    assert_eq!(err.kind(), ErrorKind::Deserialize);

    stmt.reset().expect("reset");
    conn.deserialize("main", &image).expect("deserialize after reset");
}

#[test]
fn test_blob_write_and_seek() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, "CREATE TABLE b (data BLOB);").expect("create");
    {
        let mut stmt = conn
            .prepare("INSERT INTO b (data) VALUES ($data)")
            .expect("prepare");
        stmt.set_zero_blob("$data", 8);
        stmt.step().expect("insert");
    }
    let rowid = conn.last_insert_rowid();

    let mut blob = conn.open_blob("main", "b", "data", rowid, true).expect("open blob");
    assert_eq!(blob.len(), 8);
    assert_eq!(conn.open_handles(), 1);
    blob.write_all(b"abcd").expect("write head");
    blob.seek(SeekFrom::End(-2)).expect("seek");
    blob.write_all(b"yz").expect("write tail");

    let err = blob.write(b"!").expect_err("write past end");
    assert!(DbError::from_io(&err).is_some());
    blob.seek(SeekFrom::Current(-10))
        .expect_err("seek before start");

    assert_eq!(blob.seek(SeekFrom::Start(0)).expect("rewind"), 0);
    let mut out = Vec::new();
    blob.read_to_end(&mut out).expect("read");
    assert_eq!(out, b"abcd\0\0yz");
    assert_eq!(blob.position(), 8);
    let mut buf = [0u8; 4];
    assert_eq!(blob.read(&mut buf).expect("read at end"), 0);
    blob.close().expect("close blob");
    assert_eq!(conn.open_handles(), 0);
}

#[test]
fn test_blob_read_only_and_reopen() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(
        &conn,
        "CREATE TABLE b (id INTEGER PRIMARY KEY, data BLOB, n INTEGER);
         INSERT INTO b VALUES (1, x'0102', 5), (2, x'030405', 6);",
    )
    .expect("populate");

    let mut blob = conn.open_blob("", "b", "data", 1, false).expect("open blob");
    let err = blob.write(b"x").expect_err("read-only blob");
    assert_eq!(
        DbError::from_io(&err).map(DbError::code),
        Some(ResultCode::ReadOnly)
    );

    blob.reopen(2).expect("reopen");
    assert_eq!(blob.len(), 3);
    let mut out = Vec::new();
    blob.read_to_end(&mut out).expect("read");
    assert_eq!(out, [3, 4, 5]);
    drop(blob);

    let err = conn
        .open_blob("", "b", "n", 1, false)
        .expect_err("integer values cannot be opened");
    assert_eq!(err.kind(), ErrorKind::Blob);
}

#[test]
fn test_statement_cache_reuse() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    {
        let mut stmt = conn.prep("SELECT $x").expect("prep");
        stmt.set_int64("$x", 5);
        assert_eq!(stmt.step().expect("step"), StepResult::Row);
        assert_eq!(stmt.column_int64(0), 5);
    }
    assert_eq!(conn.cached_statements(), 1);
    {
        let mut stmt = conn.prep("SELECT $x").expect("prep cached");
        assert_eq!(conn.cached_statements(), 0);
        assert_eq!(stmt.state(), StatementState::Ready);
        assert_eq!(stmt.step().expect("step"), StepResult::Row);
        assert!(stmt.is_column_null(0), "bindings are cleared on return");

        // A second checkout of the same SQL compiles its own copy.
        let other = conn.prep("SELECT $x").expect("prep duplicate");
        assert_eq!(conn.open_handles(), 2);
        drop(other);
        assert_eq!(conn.cached_statements(), 1);
    }
    assert_eq!(conn.cached_statements(), 1);

    conn.prep("SELECT 2").expect("prep").discard();
    assert_eq!(conn.cached_statements(), 1);
    conn.close().expect("close releases cached statements");
}

#[test]
fn test_close_with_leaked_statement() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let stmt = conn.prepare("SELECT 1").expect("prepare");
    std::mem::forget(stmt);
    assert_eq!(conn.open_handles(), 1);

    let (conn, err) = conn.close().expect_err("close with a live statement");
    assert_eq!(err.kind(), ErrorKind::Close);
    assert!(err.is_busy());
    assert_eq!(conn.path(), ":memory:");
}

#[test]
fn test_close_with_live_blob() {
    let setup = "CREATE TABLE b (data BLOB); INSERT INTO b (data) VALUES (x'0102');";

    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, setup).expect("populate");
    let blob = conn.open_blob("", "b", "data", 1, false).expect("open blob");
    assert_eq!(conn.open_handles(), 1);
    drop(blob);
    assert_eq!(conn.open_handles(), 0);
    conn.close().expect("close after the blob dropped");

    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, setup).expect("populate");
    let blob = conn.open_blob("", "b", "data", 1, false).expect("open blob");
    std::mem::forget(blob);

    let (conn, err) = conn.close().expect_err("close with a live blob");
    assert_eq!(err.kind(), ErrorKind::Close);
    assert!(err.is_busy());
    assert!(err.message.contains("1 blobs"), "got {err}");
    assert_eq!(conn.open_handles(), 1);
}

#[test]
fn test_open_options_from_json() {
    let options: OpenOptions = serde_json::from_str(
        r#"{
            "flags": "READ_WRITE | CREATE",
            "busy_timeout_ms": 0,
            "defensive": true,
            "limits": [{ "limit": "sql_length", "value": 100 }]
        }"#,
    )
    .expect("parse options");
    assert_eq!(options.flags, OpenFlags::READ_WRITE | OpenFlags::CREATE);

    let conn = Connection::open_with(":memory:", &options).expect("open with options");
    assert_eq!(conn.limit(Limit::SqlLength), 100);
    assert_eq!(conn.busy_policy(), BusyPolicy::Immediate);
    assert!(!conn.flags().contains(OpenFlags::WAL));

    let defaults: OpenOptions = serde_json::from_str("{}").expect("parse empty");
    assert_eq!(defaults, OpenOptions::default());
    assert_eq!(defaults.busy_timeout(), DEFAULT_BUSY_TIMEOUT);
}

#[test]
fn test_open_missing_file_read_only() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("missing.db");
    let err = Connection::open(&path.to_string_lossy(), OpenFlags::READ_ONLY)
        .expect_err("missing file");
    assert_eq!(err.kind(), ErrorKind::Open);
    assert_eq!(err.code().to_primary(), ResultCode::CantOpen);
}

#[test]
fn test_connection_introspection() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, "CREATE TABLE t (id INTEGER PRIMARY KEY);").expect("create");
    assert!(conn.autocommit());
    exec(&conn, "BEGIN; INSERT INTO t VALUES (10), (11);").expect("insert");
    assert!(!conn.autocommit());
    assert_eq!(conn.changes(), 2);
    assert_eq!(conn.last_insert_rowid(), 11);
    exec(&conn, "COMMIT;").expect("commit");
    assert_eq!(conn.flags(), OpenFlags::DEFAULT);
}

#[test]
fn test_result_codes() {
    assert_eq!(ResultCode::BusySnapshot.to_primary(), ResultCode::Busy);
    assert_eq!(ResultCode::from_code(2067), ResultCode::ConstraintUnique);
    assert_eq!(ResultCode::from_code(5 | (99 << 8)), ResultCode::Busy);
    assert_eq!(ResultCode::from_code(-7), ResultCode::Error);
    assert!(ResultCode::Busy.is_primary());
    assert!(!ResultCode::ConstraintUnique.is_primary());
    assert_eq!(ResultCode::ConstraintUnique.name(), "SQLITE_CONSTRAINT_UNIQUE");
    assert_eq!(i32::from(ResultCode::Done), 101);
}

#[test]
fn test_runtime_queries() {
    runtime::initialize().expect("initialize");
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let used = runtime::memory_used();
    assert!(used > 0);
    assert!(runtime::memory_highwater(false) >= used);
    assert!(runtime::version().starts_with("3."));
    assert!(runtime::version_number() >= 3_038_000);
    drop(conn);
}
