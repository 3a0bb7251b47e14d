#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

use tea_core::types::StreamKind;
use tea_pipeline::LineDecoder;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 최대 라인 길이 (작게 제한해 길이 초과 경로를 자주 밟도록 함)
    max_length: u8,
    /// 임의로 나뉜 읽기 조각
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: FuzzInput| {
    let max_length = usize::from(input.max_length);
    let mut decoder = LineDecoder::new(max_length, StreamKind::Stdout);
    let mut buf = BytesMut::new();

    for chunk in input.chunks.iter().take(64) {
        buf.extend_from_slice(chunk);
        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(line)) => {
                    assert!(!line.contains('\n'));
                }
                Ok(None) => break,
                // 길이 초과는 정상적인 에러 경로
                Err(_) => return,
            }
        }
    }

    while let Ok(Some(line)) = decoder.decode_eof(&mut buf) {
        assert!(!line.contains('\n'));
    }
});
