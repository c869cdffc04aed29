/// Escape-aware boundary detection over the decode buffer.
///
/// The envelope's delimiters (`",\n"`, `"\n]"`) are literal text, so a naive
/// substring search could fire on the same characters inside a row's string
/// values. The scanner tracks JSON string and escape state and only matches
/// delimiters between tokens.

/// Which delimiter matched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// `",\n"` - the text before it is a complete row.
    Separator,
    /// `"\n]"` - the text before it (if non-blank) is the final row.
    Terminator,
}

/// Find the earliest boundary outside string literals.
///
/// Returns the byte offset of the boundary's first character. Both delimiters
/// are pure ASCII, so a returned offset is always a char boundary. A partial
/// delimiter at the end of `text` (a bare `,` or `\n`) does not match; the
/// caller retains the buffer and rescans once the next fragment arrives.
pub fn find_boundary(text: &str) -> Option<(usize, Boundary)> {
    let bytes = text.as_bytes();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b',' if bytes.get(i + 1) == Some(&b'\n') => return Some((i, Boundary::Separator)),
            b'\n' if bytes.get(i + 1) == Some(&b']') => return Some((i, Boundary::Terminator)),
            _ => {}
        }
    }
    None
}
