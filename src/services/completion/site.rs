//! Cursor bookkeeping: the identifier prefix being typed and `#^NAME^#`
//! markers.

/// Source prepared for a completion parse: the partially typed identifier
/// before the cursor is cut out and kept as a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CursorSource {
    pub text: String,
    pub offset: usize,
    pub prefix: String,
}

impl CursorSource {
    pub fn new(source: &str, offset: usize) -> Self {
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];
        let start = before
            .char_indices()
            .rev()
            .take_while(|(_, ch)| ch.is_alphanumeric() || *ch == '_')
            .last()
            .map_or(offset, |(index, _)| index);
        // A prefix cannot start with a digit; `1.` is not a member access.
        let start = match source[start..offset].chars().next() {
            Some(ch) if ch.is_ascii_digit() => offset,
            _ => start,
        };
        let prefix = source[start..offset].to_string();
        let mut text = String::with_capacity(source.len());
        text.push_str(&source[..start]);
        text.push_str(&source[offset..]);
        CursorSource {
            text,
            offset: start,
            prefix,
        }
    }

    /// Text following the cursor.
    pub fn rest(&self) -> &str {
        &self.text[self.offset..]
    }
}

/// Removes every `#^NAME^#` marker and returns the cleaned source with the
/// offset of the marker called `token`.
pub fn strip_markers(source: &str, token: &str) -> Option<(String, usize)> {
    let mut out = String::with_capacity(source.len());
    let mut found = None;
    let mut rest = source;
    while let Some(start) = rest.find("#^") {
        let Some(len) = rest[start + 2..].find("^#") else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + 2 + len];
        if name == token && found.is_none() {
            found = Some(out.len());
        }
        rest = &rest[start + 2 + len + 2..];
    }
    out.push_str(rest);
    found.map(|offset| (out, offset))
}

#[cfg(test)]
#[path = "../../tests/services/completion/t_site.rs"]
mod tests;
