//! 종목 코드 헬퍼.
//!
//! JPX 종목 코드(4자리 숫자)와 Yahoo Finance 심볼(`7203.T`) 간 변환 및
//! 코드 형식 검증을 제공합니다.

/// 도쿄증권거래소 Yahoo 접미사.
pub const TOKYO_SUFFIX: &str = ".T";

/// Yahoo Finance용 심볼로 변환합니다.
///
/// 숫자로만 된 코드에는 `.T` 접미사를 붙이고, 그 외(이미 접미사가 있거나
/// 해외 티커)는 그대로 반환합니다.
pub fn format_for_yahoo(symbol: &str) -> String {
    let symbol = symbol.trim();
    if symbol.is_empty() || symbol.ends_with(TOKYO_SUFFIX) {
        return symbol.to_string();
    }
    if symbol.chars().all(|c| c.is_ascii_digit()) {
        return format!("{}{}", symbol, TOKYO_SUFFIX);
    }
    symbol.to_string()
}

/// 종목 코드 형식이 유효한지 확인합니다.
///
/// - 4자리 숫자 (JPX 표준 형식)
/// - 알파벳 티커 (`AAPL`, `BRK-B`, `BRK.A`)
///
/// `1234A`처럼 숫자와 영문이 섞인 코드는 거부합니다.
pub fn is_valid_stock_code(symbol: &str) -> bool {
    let code = symbol.trim().trim_end_matches(TOKYO_SUFFIX);
    if code.is_empty() {
        return false;
    }

    if code.len() == 4 && code.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    let letters: String = code.chars().filter(|c| *c != '.' && *c != '-').collect();
    !letters.is_empty() && letters.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_yahoo() {
        assert_eq!(format_for_yahoo("7203"), "7203.T");
        assert_eq!(format_for_yahoo("7203.T"), "7203.T");
        assert_eq!(format_for_yahoo("AAPL"), "AAPL");
        assert_eq!(format_for_yahoo(""), "");
    }

    #[test]
    fn test_stock_code_validation() {
        assert!(is_valid_stock_code("7203"));
        assert!(is_valid_stock_code("7203.T"));
        assert!(is_valid_stock_code("AAPL"));
        assert!(is_valid_stock_code("BRK.A"));
        assert!(!is_valid_stock_code("1234A"));
        assert!(!is_valid_stock_code("72031"));
        assert!(!is_valid_stock_code(""));
    }
}
