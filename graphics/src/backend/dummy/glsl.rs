//! Minimal GLSL scanning for the dummy driver.
//!
//! Extracts `uniform` declarations (plain, comma lists, arrays and uniform
//! blocks) and `#error` directives. This is not a GLSL compiler; it only
//! recovers what program reflection would report.

use crate::types::UniformType;

/// A declared uniform or block member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Declared {
    pub name: String,
    pub ty: UniformType,
    pub array_length: u32,
}

/// A declared uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DeclaredBlock {
    pub name: String,
    pub members: Vec<Declared>,
}

/// Everything reflection needs from one shader stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct Declarations {
    pub uniforms: Vec<Declared>,
    pub blocks: Vec<DeclaredBlock>,
}

/// std140 placement of block members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct BlockLayout {
    /// `(offset, array_stride)` per member, in declaration order.
    pub members: Vec<(u32, u32)>,
    /// Block size rounded up to 16 bytes.
    pub size: u32,
}

#[derive(Debug, Clone)]
struct Token {
    text: String,
    line: usize,
}

const PRECISION: [&str; 3] = ["lowp", "mediump", "highp"];

/// Collect `#error` directives as a driver-style info log.
pub(super) fn error_directives(source: &str) -> Option<String> {
    let errors: Vec<String> = source
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let message = line.trim().strip_prefix("#error")?;
            Some(format!("0:{}(1): error: {}", i + 1, message.trim()))
        })
        .collect();
    (!errors.is_empty()).then(|| errors.join("\n"))
}

/// Scan a stage's source for uniform declarations.
pub(super) fn scan(source: &str) -> Declarations {
    let tokens = tokenize(&strip_comments(source));
    let mut declarations = Declarations::default();
    let mut i = 0;

    while i < tokens.len() {
        if tokens[i].text != "uniform" {
            i += 1;
            continue;
        }
        i += 1;
        i = skip_precision(&tokens, i);

        let opens_block = tokens.get(i + 1).is_some_and(|t| t.text == "{");
        if opens_block {
            let name = tokens[i].text.clone();
            i += 2;
            let mut members = Vec::new();
            while i < tokens.len() && tokens[i].text != "}" {
                i = skip_member_qualifiers(&tokens, i);
                i = parse_declaration(&tokens, i, &mut members);
            }
            // Skip `}` and any instance name up to the terminating `;`.
            while i < tokens.len() && tokens[i].text != ";" {
                i += 1;
            }
            declarations.blocks.push(DeclaredBlock { name, members });
        } else {
            i = parse_declaration(&tokens, i, &mut declarations.uniforms);
        }
    }

    declarations
}

/// Compute std140 offsets for a block's members.
pub(super) fn std140_layout(members: &[Declared]) -> BlockLayout {
    let mut cursor = 0u32;
    let mut placed = Vec::with_capacity(members.len());

    for member in members {
        if member.array_length > 1 {
            let stride = member.ty.std140_array_stride();
            let offset = cursor.next_multiple_of(16);
            placed.push((offset, stride));
            cursor = offset + stride * member.array_length;
        } else {
            let offset = cursor.next_multiple_of(member.ty.std140_align());
            placed.push((offset, 0));
            cursor = offset + member.ty.std140_size();
        }
    }

    BlockLayout {
        members: placed,
        size: cursor.next_multiple_of(16),
    }
}

/// Parse `type name[N] = init, name2;` starting at the type token.
///
/// Returns the index after the terminating `;`.
fn parse_declaration(tokens: &[Token], mut i: usize, out: &mut Vec<Declared>) -> usize {
    let Some(type_token) = tokens.get(i) else {
        return i;
    };
    let ty = UniformType::from_glsl(&type_token.text);
    if ty.is_none() {
        log::warn!(
            "DummyDriver: skipping uniform of unsupported type `{}` at line {}",
            type_token.text,
            type_token.line
        );
    }
    i += 1;

    loop {
        let Some(name) = tokens.get(i) else {
            return i;
        };
        if name.text == ";" {
            return i + 1;
        }
        i += 1;

        let mut array_length = 1;
        if tokens.get(i).is_some_and(|t| t.text == "[") {
            array_length = tokens
                .get(i + 1)
                .and_then(|t| t.text.trim_end_matches(['u', 'U']).parse().ok())
                .unwrap_or(1);
            while i < tokens.len() && tokens[i].text != "]" {
                i += 1;
            }
            i += 1;
        }

        if let Some(ty) = ty {
            out.push(Declared {
                name: name.text.clone(),
                ty,
                array_length,
            });
        }

        // Skip an initializer, respecting nested parentheses.
        let mut depth = 0usize;
        while let Some(token) = tokens.get(i) {
            match token.text.as_str() {
                "(" => depth += 1,
                ")" => depth = depth.saturating_sub(1),
                "," if depth == 0 => break,
                ";" if depth == 0 => break,
                _ => {}
            }
            i += 1;
        }

        match tokens.get(i).map(|t| t.text.as_str()) {
            Some(",") => i += 1,
            Some(";") => return i + 1,
            _ => return i,
        }
    }
}

fn skip_precision(tokens: &[Token], mut i: usize) -> usize {
    while tokens
        .get(i)
        .is_some_and(|t| PRECISION.contains(&t.text.as_str()))
    {
        i += 1;
    }
    i
}

fn skip_member_qualifiers(tokens: &[Token], mut i: usize) -> usize {
    loop {
        match tokens.get(i).map(|t| t.text.as_str()) {
            Some("layout") => {
                while i < tokens.len() && tokens[i].text != ")" {
                    i += 1;
                }
                i += 1;
            }
            Some("row_major" | "column_major" | "lowp" | "mediump" | "highp") => i += 1,
            _ => return i,
        }
    }
}

/// Remove comments and preprocessor lines, keeping line breaks.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_block = false;

    while let Some(c) = chars.next() {
        if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
            } else if c == '\n' {
                out.push('\n');
            }
            continue;
        }
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                in_block = true;
            }
            _ => out.push(c),
        }
    }

    out.lines()
        .map(|line| if line.trim_start().starts_with('#') { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let mut chars = line.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if c.is_whitespace() {
                continue;
            }
            if c.is_alphanumeric() || c == '_' || c == '.' {
                let mut end = start + c.len_utf8();
                while let Some(&(pos, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '.' {
                        end = pos + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    text: line[start..end].to_string(),
                    line: index + 1,
                });
            } else {
                tokens.push(Token {
                    text: c.to_string(),
                    line: index + 1,
                });
            }
        }
    }

    tokens
}
