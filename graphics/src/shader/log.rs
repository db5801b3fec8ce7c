//! Compile log annotation.
//!
//! Driver info logs name the failing line in a handful of formats. Each log
//! line that names a line of the compiled source is followed by that source
//! line:
//!
//! ```text
//! 0:3(12): error: `colour' undeclared
//!   --> 3 |     gl_FragColor = colour;
//! ```

/// Annotate every recognized log line with the source line it names.
pub fn annotate(log: &str, source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = String::with_capacity(log.len() * 2);

    for (i, entry) in log.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(entry);
        let Some(number) = line_number(entry) else {
            continue;
        };
        if let Some(text) = number.checked_sub(1).and_then(|index| lines.get(index)) {
            out.push_str(&format!("\n  --> {number} | {}", text.trim_end()));
        }
    }

    out
}

/// Extract the 1-based source line a log entry refers to.
///
/// Recognized forms:
/// - `line N, column M` (and plain `line N`)
/// - `S:L(C)` and `S:L:` where `S` is the source string index 0
/// - `L:C` for any non-zero first number
/// - `S(L)`
pub fn line_number(entry: &str) -> Option<usize> {
    let lower = entry.to_ascii_lowercase();
    for (pos, _) in lower.match_indices("line ") {
        let at_word = pos == 0 || !lower.as_bytes()[pos - 1].is_ascii_alphabetic();
        if let Some((number, _)) = leading_number(&lower[pos + 5..]).filter(|_| at_word) {
            return Some(number);
        }
    }

    let bytes = entry.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let starts_run = bytes[i].is_ascii_digit()
            && (i == 0 || !(bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'.'));
        if !starts_run {
            i += 1;
            continue;
        }

        let Some((first, len)) = leading_number(&entry[i..]) else {
            i += 1;
            continue;
        };
        let rest = &entry[i + len..];
        if let Some((second, _)) = rest.strip_prefix(':').and_then(leading_number) {
            return Some(if first == 0 { second } else { first });
        }
        if let Some((second, used)) = rest.strip_prefix('(').and_then(leading_number) {
            if rest[1 + used..].starts_with(')') {
                return Some(second);
            }
        }
        i += len;
    }

    None
}

/// Parse the decimal number at the start of `text`, returning it and its length.
fn leading_number(text: &str) -> Option<(usize, usize)> {
    let len = text.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }
    text[..len].parse().ok().map(|number| (number, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "#version 410\nuniform vec4 tint;\nvoid main() {\n    gl_FragColor = colour;\n}\n";

    #[test]
    fn test_line_number_formats() {
        assert_eq!(line_number("0:4(20): error: `colour' undeclared"), Some(4));
        assert_eq!(line_number("ERROR: 0:4: 'colour' : undeclared identifier"), Some(4));
        assert_eq!(line_number("0(4) : error C1008: undefined variable \"colour\""), Some(4));
        assert_eq!(line_number("4:20: use of undeclared identifier"), Some(4));
        assert_eq!(line_number("error at line 4, column 20"), Some(4));
        assert_eq!(line_number("error: linking failed"), None);
        assert_eq!(line_number("vec4 v2:3 mismatch"), None);
    }

    #[test]
    fn test_annotate() {
        let log = "0:4(20): error: `colour' undeclared\n0:4(5): error: type mismatch";
        let annotated = annotate(log, SOURCE);
        assert_eq!(
            annotated,
            "0:4(20): error: `colour' undeclared\n  --> 4 |     gl_FragColor = colour;\n\
             0:4(5): error: type mismatch\n  --> 4 |     gl_FragColor = colour;"
        );
    }

    #[test]
    fn test_out_of_range_lines_are_left_alone() {
        let log = "0:42(1): error: unexpected end of file";
        assert_eq!(annotate(log, SOURCE), log);
    }
}
