#![no_main]

use libfuzzer_sys::fuzz_target;

use tea_core::config::TeaConfig;
use tea_pipeline::RuleSet;

fuzz_target!(|data: &[u8]| {
    // TOML 파서는 &str을 받으므로 UTF-8 변환 필요
    let Ok(toml_str) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = TeaConfig::parse(toml_str) else {
        return;
    };

    // 검증/컴파일 실패는 에러로 끝나야 하며 패닉하면 안 됨
    if let Ok(rule_set) = RuleSet::compile(&config) {
        assert_eq!(rule_set.len(), config.rules.len());
    }
});
