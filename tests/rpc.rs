mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use tokio::net::TcpListener;
use tokio::task;

use common::Fixture;
use poolfs::client::RemoteFacade;
use poolfs::{Error, Facade as _, HighFacade as _, LowFacade as _, ROOT_OBJECT};

/// Serves the fixture's facade on an ephemeral loopback port.
async fn start_server(fixture: &Fixture) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let fs = poolfs::cache::CachedStore::new(
        poolfs::store::ObjectStore::new(fixture.tempdir.path()),
        128,
    );
    tokio::spawn(poolfs::handle_forever(listener, Arc::new(fs)));
    addr
}

#[tokio::test]
async fn remote_create_write_read_parity() {
    let fixture = Fixture::new();
    let addr = start_server(&fixture).await;

    task::spawn_blocking(move || {
        let remote = RemoteFacade::dial(addr).expect("dial");

        let file = remote.hl_mkfile(&ROOT_OBJECT, "a").expect("remote mkfile");
        assert_eq!(remote.lookup(&ROOT_OBJECT, "a").unwrap(), file);

        assert_eq!(remote.write_at(&file, b"hello", 0).unwrap(), 5);

        let mut buf = [0u8; 5];
        let read = remote.hl_read_at(&file, &mut buf, 0);
        assert!(read.error.is_none());
        assert_eq!(read.data, b"hello");

        let read = remote.hl_read_at2(&file, 16, 0);
        assert!(read.error.is_none());
        assert_eq!(read.data, b"hello");

        // The same bytes are visible to the local facade.
        let read = fixture.fs.hl_read_at2(&file, 16, 0);
        assert!(read.error.is_none());
        assert_eq!(read.data, b"hello");

        let sb = remote.hl_stat(&file).unwrap();
        assert_eq!(sb.size, 5);
        assert!(sb.is_regular && !sb.is_dir);
    })
    .await
    .expect("client thread");
}

#[tokio::test]
async fn remote_listing_and_movelink_parity() {
    let fixture = Fixture::new();
    let addr = start_server(&fixture).await;

    task::spawn_blocking(move || {
        let remote = RemoteFacade::dial(addr).expect("dial");

        let dir_a = remote.hl_mkdir(&ROOT_OBJECT, "A").unwrap();
        let dir_b = remote.hl_mkdir(&ROOT_OBJECT, "B").unwrap();
        let file = remote.hl_mkfile(&dir_a, "f").unwrap();

        let mut names = remote.readdirnames(&ROOT_OBJECT).unwrap();
        names.sort();
        assert_eq!(names, ["A", "B"]);

        remote.hl_movelink(&dir_a, "f", &dir_b, "g").expect("remote movelink");
        assert_eq!(remote.lookup(&dir_b, "g").unwrap(), file);
        assert!(matches!(remote.lookup(&dir_a, "f"), Err(Error::Remote(_))));

        remote.hl_delete(&dir_b, "g").unwrap();
        assert!(remote.readdirnames(&dir_b).unwrap().is_empty());
    })
    .await
    .expect("client thread");
}

#[tokio::test]
async fn remote_errors_reproduce_messages() {
    let fixture = Fixture::new();
    let addr = start_server(&fixture).await;

    task::spawn_blocking(move || {
        let remote = RemoteFacade::dial(addr).expect("dial");

        let missing = remote.lookup(&ROOT_OBJECT, "ghost").unwrap_err();
        let local = fixture.fs.lookup(&ROOT_OBJECT, "ghost").unwrap_err();
        match missing {
            Error::Remote(message) => assert_eq!(message, local.to_string()),
            other => panic!("expected remote error, got {other:?}"),
        }

        let missing_stat = remote.hl_stat(&poolfs::Uuid::new_v4());
        assert!(matches!(missing_stat, Err(Error::Remote(_))));

        // A failed read reports its error next to the (empty) data.
        let read = remote.hl_read_at2(&poolfs::Uuid::new_v4(), 8, 0);
        assert!(read.data.is_empty());
        assert!(matches!(read.error, Some(Error::Remote(_))));
    })
    .await
    .expect("client thread");
}

#[tokio::test]
async fn remote_chtimes_truncate_parity() {
    let fixture = Fixture::new();
    let addr = start_server(&fixture).await;

    task::spawn_blocking(move || {
        let remote = RemoteFacade::dial(addr).expect("dial");

        let file = remote.hl_mkfile(&ROOT_OBJECT, "timed").unwrap();
        remote.write_at(&file, &[9u8; 32], 0).unwrap();
        remote.truncate(&file, 8).unwrap();

        let stamp = UNIX_EPOCH + Duration::from_secs(1_234_567_890);
        remote.chtimes(&file, stamp, stamp).unwrap();

        let remote_sb = remote.hl_stat(&file).unwrap();
        let local_sb = fixture.fs.hl_stat(&file).unwrap();
        assert_eq!(remote_sb, local_sb);
        assert_eq!(remote_sb.size, 8);
        assert_eq!(remote_sb.mod_time, stamp);
    })
    .await
    .expect("client thread");
}

#[tokio::test]
async fn remote_listing_is_unfiltered() {
    let fixture = Fixture::new();

    // An entry the FUSE adapter would hide; installed directly in the store.
    let file = fixture.fs.hl_mkfile(&ROOT_OBJECT, "plain").unwrap();
    fixture.fs.put_dirent(&ROOT_OBJECT, "odd\\name", &file).unwrap();

    let addr = start_server(&fixture).await;

    task::spawn_blocking(move || {
        let remote = RemoteFacade::dial(addr).expect("dial");
        let mut names = remote.readdirnames(&ROOT_OBJECT).unwrap();
        names.sort();
        assert_eq!(names, ["odd\\name", "plain"]);
    })
    .await
    .expect("client thread");
}
