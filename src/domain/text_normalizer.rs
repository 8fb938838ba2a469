//! 文本规范化
//!
//! 合成前的文本清洗：Unicode NFC、控制字符剔除、空白折叠

use unicode_normalization::UnicodeNormalization;

/// 检查是否为需要剔除的控制字符（换行、制表等空白除外）
#[inline]
fn is_stripped_control(ch: char) -> bool {
    ch.is_control() && !ch.is_whitespace()
}

/// 检查是否为零宽字符
#[inline]
fn is_zero_width(ch: char) -> bool {
    matches!(ch, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// 规范化合成文本
///
/// 处理步骤：
/// 1. NFC 组合（避免同一字形的不同编码导致分词差异）
/// 2. 剔除控制字符与零宽字符
/// 3. 任意连续空白折叠为单个空格，并去除首尾空白
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.nfc() {
        if is_stripped_control(ch) || is_zero_width(ch) {
            continue;
        }
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(normalize_text("  Hello \t\n  world  "), "Hello world");
    }

    #[test]
    fn test_whitespace_only_becomes_empty() {
        assert_eq!(normalize_text(" \n\t \u{3000} "), "");
    }

    #[test]
    fn test_nfc_composition() {
        // "e" + 组合重音符 -> "é"
        let decomposed = "caf\u{0065}\u{0301}";
        let normalized = normalize_text(decomposed);
        assert_eq!(normalized, "café");
        assert_eq!(normalized.chars().count(), 4);
    }

    #[test]
    fn test_strip_control_and_zero_width() {
        assert_eq!(normalize_text("Hel\u{0007}lo\u{200B} there"), "Hello there");
    }

    #[test]
    fn test_cjk_untouched() {
        assert_eq!(normalize_text("你好，世界。"), "你好，世界。");
    }
}
