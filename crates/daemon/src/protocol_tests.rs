// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;

fn id(s: &str) -> StreamId {
    StreamId::new(s).unwrap()
}

#[test]
fn encode_decode_roundtrip_request() {
    let request = Request::Write {
        stream_id: id("build-7/console"),
        token: "abc123".to_string(),
    };

    let encoded = encode(&request).expect("encode failed");
    let decoded: Request = decode(&encoded).expect("decode failed");

    assert_eq!(request, decoded);
}

#[test]
fn encode_decode_roundtrip_response() {
    let response = Response::Status {
        uptime_secs: 3600,
        streams_active: 5,
        streams_finished: 3,
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");

    assert_eq!(response, decoded);
}

#[test]
fn read_request_fields_default() {
    let decoded: Request = decode(br#"{"type":"Read","stream_id":"build-7"}"#).unwrap();

    assert_eq!(
        decoded,
        Request::Read {
            stream_id: id("build-7"),
            mode: ReadMode::Chunks,
            wait: false,
        }
    );
}

#[test]
fn read_mode_is_lowercase_on_the_wire() {
    let request = Request::Read {
        stream_id: id("x"),
        mode: ReadMode::Lines,
        wait: true,
    };

    let json = String::from_utf8(encode(&request).unwrap()).unwrap();
    assert!(json.contains(r#""mode":"lines""#), "unexpected json: {json}");
}

#[test]
fn decode_rejects_unsafe_stream_id() {
    let result: Result<Request, _> = decode(br#"{"type":"MintToken","stream_id":"../../etc/passwd"}"#);

    assert!(matches!(result, Err(ProtocolError::Json(_))));
}

#[test]
fn encode_returns_json_without_length_prefix() {
    let response = Response::Ok;
    let encoded = encode(&response).expect("encode failed");

    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert!(
        json_str.starts_with('{'),
        "should be JSON object: {}",
        json_str
    );
}

#[test]
fn stream_summary_serialization() {
    let summary = StreamSummary {
        id: id("build-7"),
        state: StreamState::Writing,
        bytes: 42,
    };

    let response = Response::Streams {
        streams: vec![summary.clone()],
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");

    match decoded {
        Response::Streams { streams } => {
            assert_eq!(streams.len(), 1);
            assert_eq!(streams[0], summary);
        }
        _ => panic!("Expected Streams response"),
    }
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original)
        .await
        .expect("write failed");

    // write_message adds 4-byte length prefix
    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");

    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data)
        .await
        .expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;

    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn read_message_on_empty_input_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::new());

    assert!(matches!(
        read_message(&mut cursor).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn read_message_rejects_oversized_length() {
    let len = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes();
    let mut cursor = std::io::Cursor::new(len.to_vec());

    assert!(matches!(
        read_message(&mut cursor).await,
        Err(ProtocolError::MessageTooLarge { .. })
    ));
}

#[tokio::test]
async fn frames_roundtrip_including_empty_data() {
    let frames = [
        Frame::Data(Bytes::from_static(b"chunk")),
        Frame::Data(Bytes::new()),
        Frame::End,
    ];

    let mut buffer = Vec::new();
    for frame in &frames {
        write_frame(&mut buffer, frame).await.unwrap();
    }

    let mut cursor = std::io::Cursor::new(buffer);
    for frame in &frames {
        assert_eq!(&read_frame(&mut cursor).await.unwrap(), frame);
    }
    assert!(matches!(
        read_frame(&mut cursor).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn read_frame_rejects_unknown_tag() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, &[0x7f, 1, 2]).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    assert!(matches!(
        read_frame(&mut cursor).await,
        Err(ProtocolError::InvalidFrame(0x7f))
    ));
}

#[tokio::test]
async fn read_frame_rejects_zero_length_message() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, &[]).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    assert!(matches!(
        read_frame(&mut cursor).await,
        Err(ProtocolError::EmptyFrame)
    ));
}

#[tokio::test]
async fn oversized_item_is_split_into_continuation_frames() {
    let item = Bytes::from(vec![7u8; MAX_FRAME_PAYLOAD * 2 + 3]);

    let mut buffer = Vec::new();
    write_item(&mut buffer, item.clone()).await.unwrap();
    write_item(&mut buffer, Bytes::from_static(b"next")).await.unwrap();
    write_frame(&mut buffer, &Frame::End).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    assert!(matches!(
        read_frame(&mut cursor).await.unwrap(),
        Frame::More(piece) if piece.len() == MAX_FRAME_PAYLOAD
    ));
    assert!(matches!(
        read_frame(&mut cursor).await.unwrap(),
        Frame::More(piece) if piece.len() == MAX_FRAME_PAYLOAD
    ));
    assert_eq!(
        read_frame(&mut cursor).await.unwrap(),
        Frame::Data(Bytes::from_static(&[7, 7, 7]))
    );

    cursor.set_position(0);
    assert_eq!(read_item(&mut cursor).await.unwrap(), Some(item));
    assert_eq!(
        read_item(&mut cursor).await.unwrap(),
        Some(Bytes::from_static(b"next"))
    );
    assert_eq!(read_item(&mut cursor).await.unwrap(), None);
}

#[tokio::test]
async fn end_inside_split_item_is_an_error() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, &Frame::More(Bytes::from_static(b"half")))
        .await
        .unwrap();
    write_frame(&mut buffer, &Frame::End).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    assert!(matches!(
        read_item(&mut cursor).await,
        Err(ProtocolError::SplitItem)
    ));
}
