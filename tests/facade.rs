mod common;

use std::time::{Duration, UNIX_EPOCH};

use common::Fixture;
use poolfs::store::ObjectStore;
use poolfs::{Error, Facade as _, HighFacade as _, LowFacade as _, ROOT_OBJECT};

#[test]
fn create_write_and_read_back() {
    let fixture = Fixture::new();

    let file = fixture.fs.hl_mkfile(&ROOT_OBJECT, "a").expect("create file");
    assert_eq!(fixture.fs.lookup(&ROOT_OBJECT, "a").unwrap(), file);

    let written = fixture.fs.write_at(&file, b"hello", 0).expect("write");
    assert_eq!(written, 5);

    let mut buf = [0u8; 5];
    let read = fixture.fs.hl_read_at(&file, &mut buf, 0);
    assert!(read.error.is_none());
    assert_eq!(read.data, b"hello");
}

#[test]
fn write_read_round_trip_at_offset() {
    let fixture = Fixture::new();
    let file = fixture.fs.hl_mkfile(&ROOT_OBJECT, "data.bin").unwrap();

    let payload: Vec<u8> = (0..=255).collect();
    fixture.fs.write_at(&file, &payload, 4096).unwrap();

    let mut buf = vec![0u8; payload.len()];
    let read = fixture.fs.hl_read_at(&file, &mut buf, 4096);
    assert!(read.error.is_none());
    assert_eq!(read.data, payload.as_slice());
}

#[test]
fn read_past_end_is_empty() {
    let fixture = Fixture::new();
    let file = fixture.fs.hl_mkfile(&ROOT_OBJECT, "short").unwrap();
    fixture.fs.write_at(&file, b"abc", 0).unwrap();

    let mut buf = [0u8; 8];
    let read = fixture.fs.hl_read_at(&file, &mut buf, 100);
    assert!(read.error.is_none());
    assert!(read.data.is_empty());

    // A read straddling the end returns the available prefix.
    let read = fixture.fs.hl_read_at(&file, &mut buf, 1);
    assert!(read.error.is_none());
    assert_eq!(read.data, b"bc");

    let read = fixture.fs.hl_read_at2(&file, 8, 0);
    assert!(read.error.is_none());
    assert_eq!(read.data, b"abc");
}

#[test]
fn directory_listing_is_a_set() {
    let fixture = Fixture::new();

    let dir = fixture.fs.hl_mkdir(&ROOT_OBJECT, "d").expect("create dir");
    fixture.fs.hl_mkfile(&dir, "x").unwrap();
    fixture.fs.hl_mkfile(&dir, "y").unwrap();

    let mut names = fixture.fs.readdirnames(&dir).unwrap();
    names.sort();
    assert_eq!(names, ["x", "y"]);
}

#[test]
fn stat_succeeds_until_deleted() {
    let fixture = Fixture::new();

    let file = fixture.fs.hl_mkfile(&ROOT_OBJECT, "f").unwrap();
    let sb = fixture.fs.hl_stat(&file).expect("stat created object");
    assert!(sb.is_regular);
    assert_eq!(sb.size, 0);

    fixture.fs.hl_delete(&ROOT_OBJECT, "f").expect("delete");

    assert!(matches!(fixture.fs.lookup(&ROOT_OBJECT, "f"), Err(Error::NotFound)));
    assert!(matches!(fixture.fs.hl_stat(&file), Err(Error::NotFound)));
    assert!(!fixture.fs.store().object_path(&file).exists());
}

#[test]
fn delete_returns_parent_to_pre_state() {
    let fixture = Fixture::new();

    let before = fixture.fs.readdirnames(&ROOT_OBJECT).unwrap();
    let dir = fixture.fs.hl_mkdir(&ROOT_OBJECT, "scratch").unwrap();
    fixture.fs.hl_delete(&ROOT_OBJECT, "scratch").unwrap();

    let after = fixture.fs.readdirnames(&ROOT_OBJECT).unwrap();
    assert_eq!(before, after);
    assert!(!fixture.fs.store().object_path(&dir).exists());
}

#[test]
fn movelink_transplants_across_directories() {
    let fixture = Fixture::new();

    let dir_a = fixture.fs.hl_mkdir(&ROOT_OBJECT, "A").unwrap();
    let dir_b = fixture.fs.hl_mkdir(&ROOT_OBJECT, "B").unwrap();
    let file = fixture.fs.hl_mkfile(&dir_a, "f").unwrap();
    fixture.fs.write_at(&file, b"payload", 0).unwrap();

    fixture.fs.hl_movelink(&dir_a, "f", &dir_b, "g").expect("movelink");

    assert_eq!(fixture.fs.lookup(&dir_b, "g").unwrap(), file);
    assert!(matches!(fixture.fs.lookup(&dir_a, "f"), Err(Error::NotFound)));

    // The child kept its identity and content.
    let read = fixture.fs.hl_read_at2(&file, 16, 0);
    assert!(read.error.is_none());
    assert_eq!(read.data, b"payload");
}

#[test]
fn movelink_of_missing_entry_fails() {
    let fixture = Fixture::new();
    let dir = fixture.fs.hl_mkdir(&ROOT_OBJECT, "only").unwrap();

    let res = fixture.fs.hl_movelink(&ROOT_OBJECT, "ghost", &dir, "g");
    assert!(matches!(res, Err(Error::NotFound)));
    assert!(matches!(fixture.fs.lookup(&dir, "g"), Err(Error::NotFound)));
}

#[test]
fn del_dirent_keeps_the_artifact() {
    let fixture = Fixture::new();

    let file = fixture.fs.hl_mkfile(&ROOT_OBJECT, "kept").unwrap();
    fixture.fs.del_dirent(&ROOT_OBJECT, "kept").unwrap();

    assert!(matches!(fixture.fs.lookup(&ROOT_OBJECT, "kept"), Err(Error::NotFound)));
    assert!(fixture.fs.store().object_path(&file).exists());
}

#[test]
fn mkfile_refuses_existing_object() {
    let fixture = Fixture::new();

    let file = fixture.fs.hl_mkfile(&ROOT_OBJECT, "once").unwrap();
    assert!(matches!(fixture.fs.mkfile(&file), Err(Error::AlreadyExists)));
    assert!(matches!(
        fixture.fs.put_dirent(&ROOT_OBJECT, "once", &file),
        Err(Error::AlreadyExists)
    ));
}

#[test]
fn failed_entry_install_leaves_an_orphan() {
    let fixture = Fixture::new();
    let bogus_parent = poolfs::Uuid::new_v4();

    let pool_entries = || std::fs::read_dir(fixture.tempdir.path()).unwrap().count();

    let before = pool_entries();
    let res = fixture.fs.hl_mkfile(&bogus_parent, "stranded");
    assert!(res.is_err());
    // The minted file object stays on disk with no entry pointing at it.
    assert_eq!(pool_entries(), before + 1);
}

#[test]
fn lookup_rejects_foreign_symlink_targets() {
    let fixture = Fixture::new();

    let root_path = fixture.fs.store().object_path(&ROOT_OBJECT);
    std::os::unix::fs::symlink("/etc/passwd", root_path.join("alien")).unwrap();

    assert!(matches!(
        fixture.fs.lookup(&ROOT_OBJECT, "alien"),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn chtimes_adjusts_the_stat_record() {
    let fixture = Fixture::new();
    let file = fixture.fs.hl_mkfile(&ROOT_OBJECT, "timed").unwrap();

    let stamp = UNIX_EPOCH + Duration::from_secs(1_000_000_000);
    fixture.fs.chtimes(&file, stamp, stamp).unwrap();

    let sb = fixture.fs.hl_stat(&file).unwrap();
    assert_eq!(sb.mod_time, stamp);
}

#[test]
fn truncate_shrinks_and_grows() {
    let fixture = Fixture::new();
    let file = fixture.fs.hl_mkfile(&ROOT_OBJECT, "sized").unwrap();
    fixture.fs.write_at(&file, b"0123456789", 0).unwrap();

    fixture.fs.truncate(&file, 4).unwrap();
    assert_eq!(fixture.fs.hl_stat(&file).unwrap().size, 4);

    fixture.fs.truncate(&file, 100).unwrap();
    assert_eq!(fixture.fs.hl_stat(&file).unwrap().size, 100);
    let read = fixture.fs.hl_read_at2(&file, 4, 0);
    assert!(read.error.is_none());
    assert_eq!(read.data, b"0123");
}

#[test]
fn uuid_projection_accepts_only_canonical_basenames() {
    assert!(ObjectStore::uuid_from_basename(std::path::Path::new(
        "/pool/6ba7b811-9dad-11d1-80b4-00c04fd430c8"
    ))
    .is_ok());
    for bad in ["passwd", "6BA7B8119DAD11D180B400C04FD430C8", ""] {
        assert!(ObjectStore::uuid_from_basename(std::path::Path::new(bad)).is_err());
    }
}
