//! 조건 매칭 로직
//!
//! 정규식은 컴파일 단계에서 한 번만 만들어지므로 여기서는 평가만 수행합니다.

use tea_core::types::{MatchMode, StreamKind};

use super::types::Condition;

impl Condition {
    /// 주어진 출처의 라인을 이 조건이 평가하는지 확인합니다.
    pub fn applies_to(&self, origin: StreamKind) -> bool {
        self.sources.includes(origin)
    }

    /// 텍스트가 조건을 만족하는지 평가합니다.
    ///
    /// | match | negate | 참이 되는 경우 |
    /// |-------|--------|----------------|
    /// | all   | false  | 모든 패턴 매칭 (패턴이 없으면 항상 참) |
    /// | any   | false  | 하나 이상 매칭 |
    /// | all   | true   | 어떤 패턴도 매칭되지 않음 |
    /// | any   | true   | 하나 이상 매칭 실패 |
    pub fn matches(&self, text: &str) -> bool {
        let mut hits = self.patterns.iter().map(|re| re.is_match(text));
        match (self.match_mode, self.negate) {
            (MatchMode::All, false) => hits.all(|hit| hit),
            (MatchMode::Any, false) => hits.any(|hit| hit),
            (MatchMode::All, true) => !hits.any(|hit| hit),
            (MatchMode::Any, true) => hits.any(|hit| !hit),
        }
    }
}
