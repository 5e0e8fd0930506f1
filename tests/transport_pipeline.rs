//! 传输层集成测试: 分块传输下的 TS, 单次响应, 状态码处理与会话移交.

mod common;

use std::sync::Arc;

use common::*;
use vigil::codec::{CodecId, FrameType};
use vigil::core::VigilError;
use vigil::format::{CloseStatus, DemuxConfig, FramingKind, StreamDemuxer, TsDemuxer, TsSubDemuxer};

fn demuxer() -> StreamDemuxer {
    init_logger();
    StreamDemuxer::new(DemuxConfig::default()).unwrap()
}

#[test]
fn test_chunked_ts_stream() {
    let mut demuxer = demuxer();
    let rec = Recorder::default();
    let handle = demuxer.open_session(rec.clone()).unwrap();
    feed_headers(
        &mut demuxer,
        handle,
        &["HTTP/1.1 200 OK", "Content-Type: video/mp2t", "Transfer-Encoding: chunked"],
    );
    assert_eq!(
        demuxer.session(handle).unwrap().framing(),
        FramingKind::MultiChunk
    );

    let stream = h264_ts_stream();
    for chunk in stream.chunks(61) {
        assert_eq!(demuxer.parse_data(handle, chunk).unwrap(), chunk.len());
    }
    let frames = rec.frames();
    assert_eq!(frames.len(), 2, "最后一个 PES 等待下一个起始包");
    assert_eq!(frames[0].frame_type, FrameType::I);
    assert_eq!(frames[0].codec_id, CodecId::H264);
    assert_eq!(&frames[0].data[..], &IDR);
    assert_eq!(frames[1].frame_type, FrameType::P);
    assert_eq!(&frames[1].data[..], &P_SLICE);
}

#[test]
fn test_custom_ts_factory() {
    init_logger();
    let mut demuxer = StreamDemuxer::new(DemuxConfig::default())
        .unwrap()
        .with_ts_factory(Arc::new(|| Box::new(TsDemuxer::new()) as Box<dyn TsSubDemuxer>));
    let rec = Recorder::default();
    let handle = demuxer.open_session(rec.clone()).unwrap();
    feed_headers(&mut demuxer, handle, &["HTTP/1.1 200 OK", "Transfer-Encoding: chunked"]);
    demuxer.parse_data(handle, &h264_ts_stream()).unwrap();
    assert_eq!(rec.frames().len(), 2);
}

#[test]
fn test_single_response_body() {
    let mut demuxer = demuxer();
    let rec = Recorder::default();
    let handle = demuxer.open_session(rec.clone()).unwrap();
    feed_headers(
        &mut demuxer,
        handle,
        &["HTTP/1.1 200 OK", "Content-Type: image/jpeg", "Content-Length: 38"],
    );

    let image = jpeg(640, 480);
    assert_eq!(image.len(), 38);
    for chunk in image.chunks(4) {
        demuxer.parse_data(handle, chunk).unwrap();
    }
    let frames = rec.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(&frames[0].data[..], &image[..]);
    assert_eq!((frames[0].width, frames[0].height), (Some(640), Some(480)));
    assert_eq!(
        demuxer.session(handle).unwrap().framing(),
        FramingKind::SingleResponse
    );
}

#[test]
fn test_auth_challenge_then_success() {
    let mut demuxer = demuxer();
    let rec = Recorder::default();
    let handle = demuxer.open_session(rec.clone()).unwrap();
    feed_headers(
        &mut demuxer,
        handle,
        &["HTTP/1.1 401 Unauthorized", "WWW-Authenticate: Basic realm=\"camera\""],
    );
    assert!(demuxer.session_mut(handle).unwrap().take_auth_retry());
    demuxer.parse_data(handle, b"Unauthorized").unwrap();
    assert!(rec.frames().is_empty());

    let content_type = format!("Content-Type: multipart/x-mixed-replace; boundary={BOUNDARY}");
    feed_headers(&mut demuxer, handle, &["HTTP/1.1 200 OK", &content_type]);
    demuxer
        .parse_data(handle, &part("video/h264", &IDR, true))
        .unwrap();
    assert_eq!(rec.frames().len(), 1);
    assert!(rec.closes().is_empty());
}

#[test]
fn test_non_success_status_fails_session() {
    let mut demuxer = demuxer();
    let rec = Recorder::default();
    let handle = demuxer.open_session(rec.clone()).unwrap();
    let err = demuxer
        .parse_header(handle, b"HTTP/1.1 503 Service Unavailable\r\n")
        .unwrap_err();
    assert!(matches!(err, VigilError::ResponseStatus(503)), "err={err}");
    assert_eq!(rec.closes(), vec![(CloseStatus::Error, Some(503))]);
    assert!(demuxer.session(handle).unwrap().is_closed());

    // 已关闭的会话再次关闭不会重复通知
    demuxer.close_session(handle, CloseStatus::Success).unwrap();
    assert_eq!(rec.closes().len(), 1);
}

#[test]
fn test_session_handed_to_worker_thread() {
    let mut demuxer = demuxer();
    let (handle, rec) = open_multipart(&mut demuxer);
    let mut session = demuxer.take_session(handle).unwrap();
    assert!(demuxer.parse_data(handle, b"x").is_err(), "借出期间不可访问");

    let worker = std::thread::spawn(move || {
        session.parse_data(&part("video/h264", &IDR, true)).unwrap();
        session
    });
    let session = worker.join().unwrap();
    demuxer.restore_session(session).unwrap();

    demuxer
        .parse_data(handle, &part("video/h264", &P_SLICE, true))
        .unwrap();
    let types: Vec<_> = rec.frames().iter().map(|f| f.frame_type).collect();
    assert_eq!(types, vec![FrameType::I, FrameType::P]);
}
