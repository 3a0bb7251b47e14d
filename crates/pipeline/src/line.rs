//! 파이프라인을 흐르는 데이터 단위

use tea_core::types::StreamKind;

use crate::style::Style;

/// 자식 프로세스가 출력한 한 줄
///
/// 리더가 생성하고, 규칙 엔진이 액션으로 변형하며, 출력 단계에서 한 번 소비됩니다.
/// 목적지와 선택 필드는 출처에서 출발하여 매칭된 규칙의 액션으로만 바뀝니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 줄 내용 (줄바꿈 제외)
    pub text: String,
    /// 줄이 읽힌 스트림
    pub origin: StreamKind,
    /// 줄이 기록될 스트림
    pub destination: StreamKind,
    /// 목적지가 stdout일 때의 전체 대체 텍스트
    pub mark_stdout: Option<String>,
    /// 목적지가 stderr일 때의 전체 대체 텍스트
    pub mark_stderr: Option<String>,
    /// 접두사
    pub prefix: Option<String>,
    /// 접미사
    pub suffix: Option<String>,
    /// 마지막으로 매칭된 규칙의 스타일
    pub style: Option<Style>,
}

impl Line {
    /// 출처와 목적지가 같은 새 라인을 생성합니다.
    pub fn new(text: impl Into<String>, origin: StreamKind) -> Self {
        Self {
            text: text.into(),
            origin,
            destination: origin,
            mark_stdout: None,
            mark_stderr: None,
            prefix: None,
            suffix: None,
            style: None,
        }
    }

    /// 현재 목적지에 적용되는 mark를 반환합니다.
    pub fn mark(&self) -> Option<&str> {
        match self.destination {
            StreamKind::Stdout => self.mark_stdout.as_deref(),
            StreamKind::Stderr => self.mark_stderr.as_deref(),
        }
    }
}
