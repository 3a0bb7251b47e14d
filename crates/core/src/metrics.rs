//! 메트릭 상수 및 설명 등록
//!
//! 라인 파이프라인이 기록하는 카운터의 이름과 설명을 중앙에서 정의합니다.
//! 레코더가 설치되지 않은 경우 `metrics` 매크로 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tea_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(tea_core::metrics::LINES_READ_TOTAL, tea_core::metrics::LABEL_STREAM => "stdout")
//!     .increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스트림 레이블 키 (stdout, stderr)
pub const LABEL_STREAM: &str = "stream";

/// 규칙 레이블 키 (규칙 라벨)
pub const LABEL_RULE: &str = "rule";

// ─── 파이프라인 메트릭 ──────────────────────────────────────────────

/// 자식 프로세스에서 읽은 라인 수 (counter, label: stream)
pub const LINES_READ_TOTAL: &str = "tea_lines_read_total";

/// 규칙 체인이 평가한 라인 수 (counter)
pub const LINES_EVALUATED_TOTAL: &str = "tea_lines_evaluated_total";

/// 규칙 매칭 수 (counter, label: rule)
pub const RULE_MATCHES_TOTAL: &str = "tea_rule_matches_total";

/// 출력 스트림에 기록된 조각 수 (counter, label: stream)
pub const FRAGMENTS_WRITTEN_TOTAL: &str = "tea_fragments_written_total";

/// 자식 프로세스에 보낸 시그널 수 (counter)
pub const SIGNALS_SENT_TOTAL: &str = "tea_signals_sent_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        LINES_READ_TOTAL,
        "Total number of lines read from the child process"
    );
    describe_counter!(
        LINES_EVALUATED_TOTAL,
        "Total number of lines evaluated by a rule chain"
    );
    describe_counter!(RULE_MATCHES_TOTAL, "Total number of rule matches");
    describe_counter!(
        FRAGMENTS_WRITTEN_TOTAL,
        "Total number of output fragments written to stdout/stderr"
    );
    describe_counter!(
        SIGNALS_SENT_TOTAL,
        "Total number of signals delivered to the child process"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        LINES_READ_TOTAL,
        LINES_EVALUATED_TOTAL,
        RULE_MATCHES_TOTAL,
        FRAGMENTS_WRITTEN_TOTAL,
        SIGNALS_SENT_TOTAL,
    ];

    #[test]
    fn all_metrics_start_with_tea_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("tea_"),
                "Metric '{}' does not start with 'tea_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES {
            assert!(name.ends_with("_total"), "Counter '{}' lacks _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_STREAM, LABEL_RULE] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
