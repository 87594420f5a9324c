// SPDX-License-Identifier: MIT
//
// OSC 8 hyperlinks as plain strings.
//
// `format` wraps text so a supporting terminal renders it as a link;
// `strip_osc8` removes every OSC 8 sequence, leaving only the visible text.
// Sequences are terminated by ST (`ESC \`) or, as some emitters do, BEL.

/// Wrap `text` in an OSC 8 hyperlink to `url`.
///
/// ```
/// use tessera_term::hyperlink::{format, strip_osc8};
///
/// let s = format("https://example.com", "docs");
/// assert_eq!(s, "\x1b]8;;https://example.com\x1b\\docs\x1b]8;;\x1b\\");
/// assert_eq!(strip_osc8(&s), "docs");
/// ```
#[must_use]
pub fn format(url: &str, text: &str) -> String {
    let mut out = String::with_capacity(url.len() + text.len() + 14);
    out.push_str("\x1b]8;;");
    out.push_str(url);
    out.push_str("\x1b\\");
    out.push_str(text);
    out.push_str("\x1b]8;;\x1b\\");
    out
}

const OSC8_INTRO: &str = "\x1b]8;";

/// Remove all OSC 8 sequences from `s`.
///
/// An unterminated sequence swallows the rest of the input, matching what a
/// terminal would display.
#[must_use]
pub fn strip_osc8(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find(OSC8_INTRO) {
        out.push_str(&rest[..start]);
        let body = &rest[start + OSC8_INTRO.len()..];
        match find_terminator(body) {
            Some((end, len)) => rest = &body[end + len..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Position and length of the first ST or BEL in `s`.
fn find_terminator(s: &str) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == 0x07 {
            return Some((i, 1));
        }
        if b == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
            return Some((i, 2));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strip_leaves_plain_text_alone() {
        assert_eq!(strip_osc8("hello"), "hello");
        assert_eq!(strip_osc8(""), "");
    }

    #[test]
    fn strip_handles_bel_terminator() {
        assert_eq!(strip_osc8("\x1b]8;;http://x\x07link\x1b]8;;\x07!"), "link!");
    }

    #[test]
    fn strip_handles_params() {
        let s = "a\x1b]8;id=7;http://x\x1b\\b\x1b]8;;\x1b\\c";
        assert_eq!(strip_osc8(s), "abc");
    }

    #[test]
    fn strip_keeps_other_escapes() {
        assert_eq!(strip_osc8("\x1b[1mbold\x1b[0m"), "\x1b[1mbold\x1b[0m");
    }

    #[test]
    fn unterminated_sequence_drops_tail() {
        assert_eq!(strip_osc8("before\x1b]8;;http://x"), "before");
    }

    #[test]
    fn unicode_text() {
        let s = format("https://例え.jp/パス", "日本語 ✓");
        assert_eq!(strip_osc8(&s), "日本語 ✓");
    }

    proptest! {
        #[test]
        fn format_then_strip_is_identity(url in "\\PC*", text in "\\PC*") {
            prop_assert_eq!(strip_osc8(&format(&url, &text)), text);
        }
    }
}
