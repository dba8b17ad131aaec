// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn drain_frames(buf: &mut FrameBuffer) -> Vec<Vec<String>> {
    buf.drain()
        .unwrap()
        .into_iter()
        .map(|d| match d {
            Drained::Frame(fields) => fields,
            Drained::Corrupt(e) => panic!("unexpected corrupt frame: {e}"),
        })
        .collect()
}

#[test]
fn encode_produces_stx_payload_etx_lrc() {
    let bytes = encode(&["FAULT", "CP-001"]);
    assert_eq!(bytes[0], STX);
    assert_eq!(bytes[bytes.len() - 2], ETX);
    assert_eq!(&bytes[1..bytes.len() - 2], b"FAULT#CP-001");
    assert_eq!(bytes[bytes.len() - 1], lrc(&bytes[..bytes.len() - 1]));
}

#[test]
fn decode_roundtrips_fields() {
    let mut buf = FrameBuffer::new();
    buf.extend(&encode(&["REGISTER", "CP", "CP-001", "40.5", "-3.1", "0.3"]));

    let frames = drain_frames(&mut buf);
    assert_eq!(frames, vec![vec!["REGISTER", "CP", "CP-001", "40.5", "-3.1", "0.3"]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()]);
    assert!(buf.is_empty());
}

#[test]
fn two_concatenated_frames_drain_in_order() {
    let mut buf = FrameBuffer::new();
    let mut bytes = encode(&["FAULT", "CP-001"]);
    bytes.extend(encode(&["RECOVERY", "CP-001"]));
    buf.extend(&bytes);

    let frames = drain_frames(&mut buf);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0][0], "FAULT");
    assert_eq!(frames[1][0], "RECOVERY");
}

#[test]
fn frames_split_across_arbitrary_chunks_reassemble() {
    // S6: two valid frames, split across three chunks at awkward offsets.
    let mut bytes = encode(&["HEARTBEAT", "CP-001", "ACTIVATED"]);
    bytes.extend(encode(&["FAULT", "CP-001"]));

    let mut buf = FrameBuffer::new();
    let cuts = [3, bytes.len() / 2];
    buf.extend(&bytes[..cuts[0]]);
    assert!(drain_frames(&mut buf).is_empty());
    buf.extend(&bytes[cuts[0]..cuts[1]]);
    let mut frames = drain_frames(&mut buf);
    buf.extend(&bytes[cuts[1]..]);
    frames.extend(drain_frames(&mut buf));

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0][0], "HEARTBEAT");
    assert_eq!(frames[1][0], "FAULT");
}

#[test]
fn junk_before_stx_is_skipped() {
    let mut buf = FrameBuffer::new();
    let mut bytes = b"garbage".to_vec();
    bytes.extend(encode(&["FAULT", "CP-001"]));
    buf.extend(&bytes);

    let frames = drain_frames(&mut buf);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0], vec!["FAULT".to_string(), "CP-001".to_string()]);
}

#[test]
fn truncated_frame_is_retained_not_consumed() {
    let bytes = encode(&["FAULT", "CP-001"]);
    let mut buf = FrameBuffer::new();
    buf.extend(&bytes[..bytes.len() - 1]); // missing the LRC byte

    assert!(buf.drain().unwrap().is_empty());
    assert_eq!(buf.len(), bytes.len() - 1);

    buf.extend(&bytes[bytes.len() - 1..]);
    assert_eq!(drain_frames(&mut buf).len(), 1);
}

#[test]
fn lrc_mismatch_is_reported_and_skipped() {
    let mut bytes = encode(&["FAULT", "CP-001"]);
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    bytes.extend(encode(&["RECOVERY", "CP-001"]));

    let mut buf = FrameBuffer::new();
    buf.extend(&bytes);
    let drained = buf.drain().unwrap();

    assert_eq!(drained.len(), 2);
    assert!(matches!(drained[0], Drained::Corrupt(FrameError::LrcMismatch { .. })));
    assert_eq!(drained[1], Drained::Frame(vec!["RECOVERY".into(), "CP-001".into()]));
}

#[test]
fn non_utf8_payload_is_reported_and_skipped() {
    let mut bytes = vec![STX, 0xff, 0xfe, ETX];
    bytes.push(lrc(&bytes));

    let mut buf = FrameBuffer::new();
    buf.extend(&bytes);
    let drained = buf.drain().unwrap();

    assert_eq!(drained, vec![Drained::Corrupt(FrameError::InvalidUtf8)]);
    assert!(buf.is_empty());
}

#[test]
fn unbounded_partial_frame_overflows() {
    let mut buf = FrameBuffer::new();
    let mut bytes = vec![STX];
    bytes.extend(std::iter::repeat(b'x').take(MAX_BUFFER + 1));
    buf.extend(&bytes);

    assert_eq!(buf.drain(), Err(FrameError::Overflow(MAX_BUFFER)));
}

#[test]
fn empty_payload_yields_one_empty_field() {
    let bytes = encode::<&str>(&[]);
    let mut buf = FrameBuffer::new();
    buf.extend(&bytes);

    let frames = drain_frames(&mut buf);
    assert_eq!(frames, vec![vec![String::new()]]);
}
