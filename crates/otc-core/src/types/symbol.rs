//! OTC 심볼 정의 및 검증.
//!
//! 이 모듈은 심볼 관련 타입을 정의합니다:
//! - `Symbol` - 검증을 통과한 대문자 심볼 (예: `EURUSD_OTC`)
//! - `SymbolPolicy` - 허용 목록 또는 형식 규칙에 따른 검증기

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::FetchError;

/// OTC 심볼 접미사.
pub const OTC_SUFFIX: &str = "_OTC";

/// 허용 목록이 없을 때 `/symbols`로 안내하는 기본 OTC 심볼 목록.
pub const KNOWN_OTC_SYMBOLS: &[&str] = &[
    // 메이저
    "EURUSD_OTC",
    "GBPUSD_OTC",
    "USDJPY_OTC",
    "USDCHF_OTC",
    "USDCAD_OTC",
    "AUDUSD_OTC",
    "NZDUSD_OTC",
    // 크로스
    "EURJPY_OTC",
    "EURGBP_OTC",
    "EURAUD_OTC",
    "GBPAUD_OTC",
    "GBPJPY_OTC",
    "AUDJPY_OTC",
    "CADJPY_OTC",
];

/// 검증된 심볼.
///
/// `SymbolPolicy`를 통해서만 생성됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// 심볼 문자열.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{기준}{호가}_OTC` 형식이면 (기준, 호가) 통화 코드를 반환합니다.
    pub fn pair(&self) -> Option<(&str, &str)> {
        if is_otc_pair_shape(&self.0) {
            Some((&self.0[0..3], &self.0[3..6]))
        } else {
            None
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 6자리 영문 + `_OTC` 형식인지 확인합니다.
fn is_otc_pair_shape(s: &str) -> bool {
    s.len() == 6 + OTC_SUFFIX.len()
        && s.ends_with(OTC_SUFFIX)
        && s.as_bytes()[..6].iter().all(|b| b.is_ascii_uppercase())
}

/// 심볼 검증 정책.
///
/// 허용 목록이 비어 있지 않으면 목록 포함 여부만 검사하고,
/// 비어 있으면 `{3글자}{3글자}_OTC` 형식 규칙을 적용합니다.
/// 초기화 이후 읽기 전용입니다.
#[derive(Debug, Clone, Default)]
pub struct SymbolPolicy {
    allow_list: BTreeSet<String>,
}

impl SymbolPolicy {
    /// 형식 규칙만 사용하는 정책을 생성합니다.
    pub fn pattern_only() -> Self {
        Self::default()
    }

    /// 허용 목록 정책을 생성합니다.
    ///
    /// 목록 항목도 대문자로 정규화됩니다. 빈 항목은 무시합니다.
    pub fn with_allow_list<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allow_list = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { allow_list }
    }

    /// 허용 목록이 설정되어 있는지 확인합니다.
    pub fn has_allow_list(&self) -> bool {
        !self.allow_list.is_empty()
    }

    /// 허용 목록 (정렬됨).
    pub fn allow_list(&self) -> impl Iterator<Item = &str> {
        self.allow_list.iter().map(String::as_str)
    }

    /// 심볼을 대문자로 정규화하고 검증합니다.
    pub fn normalize_and_validate(&self, raw: &str) -> Result<Symbol, FetchError> {
        let candidate = raw.trim().to_uppercase();

        let accepted = if self.has_allow_list() {
            self.allow_list.contains(&candidate)
        } else {
            is_otc_pair_shape(&candidate)
        };

        if accepted {
            Ok(Symbol(candidate))
        } else if candidate.is_empty() {
            Err(FetchError::InvalidSymbol("symbol is required".to_string()))
        } else if self.has_allow_list() {
            Err(FetchError::InvalidSymbol(format!(
                "{} is not in the supported symbol list",
                truncate_for_message(&candidate)
            )))
        } else {
            Err(FetchError::InvalidSymbol(format!(
                "{} does not match the XXXYYY_OTC pattern",
                truncate_for_message(&candidate)
            )))
        }
    }

    /// 외부에 안내할 심볼 목록.
    ///
    /// 허용 목록이 있으면 그 목록을, 없으면 기본 OTC 목록을 반환합니다.
    pub fn listing(&self) -> Vec<String> {
        if self.has_allow_list() {
            self.allow_list.iter().cloned().collect()
        } else {
            KNOWN_OTC_SYMBOLS.iter().map(|s| s.to_string()).collect()
        }
    }
}

/// 에러 메시지에 포함할 입력 길이 제한.
fn truncate_for_message(s: &str) -> String {
    const MAX_CHARS: usize = 32;
    if s.chars().count() > MAX_CHARS {
        format!("{}...", s.chars().take(MAX_CHARS).collect::<String>())
    } else {
        s.to_string()
    }
}
