//! Output sanitisation for strings embedded in JSON responses.
//!
//! File names come straight from clients and are echoed back to a browser UI, so every
//! string placed in a response body passes through [`sanitize_text`] first.

/// Maximum number of characters kept from any response string.
pub const MAX_RESPONSE_TEXT_CHARS: usize = 1000;

/// Makes a string safe to embed in a response.
///
/// - strips control characters other than newline, tab and carriage return
/// - HTML-escapes `&`, `<`, `>`, `"` and `'`
/// - keeps at most [`MAX_RESPONSE_TEXT_CHARS`] characters of the escaped output
///
/// The limit applies to the output, and an entity that would cross it is dropped whole.
pub fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_RESPONSE_TEXT_CHARS));
    let mut budget = MAX_RESPONSE_TEXT_CHARS;
    let mut plain = [0u8; 4];

    for c in input.chars() {
        let piece: &str = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            '\'' => "&#x27;",
            '\n' | '\t' | '\r' => c.encode_utf8(&mut plain),
            c if c.is_control() => continue,
            c => c.encode_utf8(&mut plain),
        };
        let width = piece.chars().count();
        if width > budget {
            break;
        }
        budget -= width;
        out.push_str(piece);
    }
    out
}
