//! 라인 리더 -- 원시 바이트 스트림을 [`Line`] 시퀀스로 변환합니다.
//!
//! [`LineDecoder`]는 `tokio_util::codec::Decoder` 구현으로 프레이밍 규칙을 담당하고,
//! [`LineReader`]는 임의의 `AsyncRead` 위에서 디코더를 구동하여 라인을 채널로 보냅니다.
//!
//! # 프레이밍 규칙
//! - `\n`으로 레코드를 구분하고, 끝의 `\r` 하나는 제거합니다.
//! - 잘못된 UTF-8은 U+FFFD로 대체합니다.
//! - 최대 길이를 넘는 레코드는 잘라내지 않고 [`PipelineError::LineTooLong`]으로 실패합니다.
//! - 스트림 끝에서 줄바꿈 없이 남은 레코드도 한 줄로 내보냅니다.

use bytes::BytesMut;
use metrics::counter;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;
use tracing::debug;

use tea_core::metrics::{LABEL_STREAM, LINES_READ_TOTAL};
use tea_core::types::StreamKind;

use crate::error::PipelineError;
use crate::line::Line;

/// 한 번에 확보하는 읽기 버퍼 크기
const READ_CHUNK: usize = 8 * 1024;

/// 줄바꿈 구분 디코더
#[derive(Debug, Clone)]
pub struct LineDecoder {
    /// 최대 라인 길이 (바이트, 줄바꿈 제외)
    max_length: usize,
    /// 에러 보고용 스트림
    stream: StreamKind,
    /// 다음 `decode` 호출에서 줄바꿈 탐색을 시작할 위치
    next_index: usize,
}

impl LineDecoder {
    /// 새 디코더를 생성합니다.
    pub fn new(max_length: usize, stream: StreamKind) -> Self {
        Self {
            max_length,
            stream,
            next_index: 0,
        }
    }

    /// 최대 라인 길이를 반환합니다.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn finish_record(&self, record: &[u8]) -> Result<String, PipelineError> {
        let record = record.strip_suffix(b"\r").unwrap_or(record);
        if record.len() > self.max_length {
            return Err(PipelineError::LineTooLong {
                stream: self.stream,
                limit: self.max_length,
            });
        }
        Ok(String::from_utf8_lossy(record).into_owned())
    }
}

impl Decoder for LineDecoder {
    type Item = String;
    type Error = PipelineError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = buf[self.next_index..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| self.next_index + offset);

        match newline {
            Some(index) => {
                self.next_index = 0;
                let record = buf.split_to(index + 1);
                self.finish_record(&record[..index]).map(Some)
            }
            None => {
                // `\r` 하나를 허용하므로 max + 1 바이트까지는 아직 판단할 수 없습니다.
                if buf.len() > self.max_length + 1 {
                    return Err(PipelineError::LineTooLong {
                        stream: self.stream,
                        limit: self.max_length,
                    });
                }
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        self.next_index = 0;
        let record = buf.split();
        self.finish_record(&record).map(Some)
    }
}

/// 비동기 라인 리더
///
/// 읽은 라인에는 지정된 출처(origin)가 붙고, 목적지는 출처와 같게 시작합니다.
pub struct LineReader<R> {
    reader: R,
    decoder: LineDecoder,
    origin: StreamKind,
    buf: BytesMut,
    eof: bool,
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    /// 새 리더를 생성합니다.
    ///
    /// `source`는 에러와 메트릭에 쓰이는 실제 스트림이고, `origin`은 라인에 붙는 출처입니다.
    /// 두 값은 shared-streams 토폴로지에서만 다릅니다.
    pub fn new(reader: R, source: StreamKind, origin: StreamKind, max_line_length: usize) -> Self {
        Self {
            reader,
            decoder: LineDecoder::new(max_line_length, source),
            origin,
            buf: BytesMut::with_capacity(READ_CHUNK),
            eof: false,
        }
    }

    /// 다음 라인을 읽습니다. 스트림이 끝나면 `None`을 반환합니다.
    pub async fn next_line(&mut self) -> Result<Option<Line>, PipelineError> {
        loop {
            let decoded = if self.eof {
                self.decoder.decode_eof(&mut self.buf)?
            } else {
                self.decoder.decode(&mut self.buf)?
            };

            if let Some(text) = decoded {
                return Ok(Some(Line::new(text, self.origin)));
            }
            if self.eof {
                return Ok(None);
            }

            self.buf.reserve(READ_CHUNK);
            if self.reader.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
    }

    /// 스트림 끝까지 라인을 읽어 채널로 보냅니다.
    ///
    /// 반환값은 읽은 라인 수입니다. 채널이 가득 차면 읽기를 멈추고 기다립니다.
    pub async fn run(mut self, tx: mpsc::Sender<Line>) -> Result<u64, PipelineError> {
        let stream = self.decoder.stream;
        debug!(%stream, origin = %self.origin, "line reader started");

        let mut count = 0u64;
        while let Some(line) = self.next_line().await? {
            counter!(LINES_READ_TOTAL, LABEL_STREAM => stream.as_str()).increment(1);
            tx.send(line)
                .await
                .map_err(|_| PipelineError::Channel(format!("{stream} line queue closed")))?;
            count += 1;
        }

        debug!(%stream, lines = count, "line reader finished");
        Ok(count)
    }
}
