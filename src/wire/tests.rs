#![cfg(test)]

use std::io::Cursor;
use std::time::{Duration, UNIX_EPOCH};

use uuid::Uuid;

use super::primitive::{bool, put_bool, put_string, put_time, string_max, time};
use super::records::{
    DataReply, DirentArgs, ErrorEnvelope, MovelinkArgs, Request, StatReply, WriteAtArgs,
};
use super::{parse_uuid, read_frame, write_frame, Error};
use crate::facade::Statbuf;

#[test]
fn test_bool_rejects_bad_discriminant() {
    let mut src = Cursor::new([0x00, 0x00, 0x00, 0x02]);
    assert!(matches!(bool(&mut src), Err(Error::EnumDiscMismatch)));

    let mut buf = Vec::new();
    put_bool(&mut buf, true).unwrap();
    assert_eq!(bool(&mut Cursor::new(buf)).unwrap(), true);
}

#[test]
fn test_string_limit() {
    let mut buf = Vec::new();
    put_string(&mut buf, "abcdef").unwrap();
    assert!(matches!(string_max(&mut Cursor::new(&buf), 3), Err(Error::MaxElemLimit)));
    assert_eq!(string_max(&mut Cursor::new(&buf), 16).unwrap(), "abcdef");
}

#[test]
fn test_time_preserves_subsecond() {
    let stamp = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
    let mut buf = Vec::new();
    put_time(&mut buf, stamp).unwrap();
    assert_eq!(time(&mut Cursor::new(buf)).unwrap(), stamp);
}

#[test]
fn test_uuid_raw_text_raw_identity() {
    let id = Uuid::new_v4();
    let raw = id.as_bytes().to_vec();
    let parsed = parse_uuid(&raw).expect("16 raw bytes parse");
    assert_eq!(parsed, id);
    assert_eq!(parsed.to_string().parse::<Uuid>().unwrap(), id);

    assert!(parse_uuid(&[]).is_none());
    assert!(parse_uuid(&[1, 2, 3]).is_none());
}

#[test]
fn test_error_envelope_reproduces_message() {
    let env = ErrorEnvelope { message: "no such object or entry".into(), bad: true };
    let mut buf = Vec::new();
    env.serialize(&mut buf).unwrap();
    let back = ErrorEnvelope::parse(&mut Cursor::new(buf)).unwrap();
    assert_eq!(back, env);
    let err = back.into_result().unwrap_err();
    assert!(matches!(err, crate::facade::Error::Remote(msg) if msg == "no such object or entry"));

    assert!(ErrorEnvelope::ok().into_result().is_ok());
}

#[test]
fn test_data_reply_carries_data_and_error_together() {
    let reply = DataReply {
        data: b"partial prefix".to_vec(),
        err: ErrorEnvelope { message: "i/o error: short read".into(), bad: true },
    };
    let mut buf = Vec::new();
    reply.serialize(&mut buf).unwrap();
    let back = DataReply::parse(&mut Cursor::new(buf)).unwrap();
    assert_eq!(back.data, b"partial prefix");
    assert!(back.err.bad);
}

#[test]
fn test_stat_record_wire_identity() {
    let reply = StatReply {
        stat: Some(Statbuf {
            size: 4096,
            mod_time: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            is_dir: false,
            is_regular: true,
        }),
        err: ErrorEnvelope::ok(),
    };
    let mut buf = Vec::new();
    reply.serialize(&mut buf).unwrap();
    assert_eq!(StatReply::parse(&mut Cursor::new(buf)).unwrap(), reply);
}

#[test]
fn test_request_dispatches_by_method() {
    let id = Uuid::new_v4().as_bytes().to_vec();
    let requests = [
        Request::Lookup(DirentArgs { id: id.clone(), name: "a".into() }),
        Request::HlDelete(DirentArgs { id: id.clone(), name: "b".into() }),
        Request::WriteAt(WriteAtArgs { id: id.clone(), data: b"hello".to_vec(), offset: 7 }),
        Request::HlMovelink(MovelinkArgs {
            old_id: id.clone(),
            old_name: "f".into(),
            new_id: Uuid::NAMESPACE_URL.as_bytes().to_vec(),
            new_name: "g".into(),
        }),
    ];
    for request in requests {
        let mut buf = Vec::new();
        request.serialize(&mut buf).unwrap();
        assert_eq!(Request::parse(&mut Cursor::new(buf)).unwrap(), request);
    }
}

#[test]
fn test_request_rejects_unknown_method() {
    let mut buf = Vec::new();
    super::primitive::put_u32(&mut buf, 99).unwrap();
    assert!(matches!(Request::parse(&mut Cursor::new(buf)), Err(Error::UnknownMethod(99))));
}

#[test]
fn test_frame_round_trip() {
    let mut buf = Vec::new();
    write_frame(&mut buf, b"body bytes").unwrap();
    assert_eq!(read_frame(&mut Cursor::new(buf)).unwrap(), b"body bytes");
}
