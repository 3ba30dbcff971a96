use super::*;

#[test]
fn test_cursor_source_cuts_identifier_prefix() {
    let source = "let x = foo.ba";
    let cursor = CursorSource::new(source, source.len());
    assert_eq!(cursor.prefix, "ba");
    assert_eq!(cursor.text, "let x = foo.");
    assert_eq!(cursor.offset, "let x = foo.".len());
}

#[test]
fn test_cursor_source_keeps_text_after_cursor() {
    let source = "f(3, b)";
    let cursor = CursorSource::new(source, 6);
    assert_eq!(cursor.prefix, "b");
    assert_eq!(cursor.text, "f(3, )");
    assert_eq!(cursor.rest(), ")");
}

#[test]
fn test_cursor_source_ignores_numeric_prefix() {
    let source = "let y = 12";
    let cursor = CursorSource::new(source, source.len());
    assert_eq!(cursor.prefix, "");
    assert_eq!(cursor.text, source);
}

#[test]
fn test_cursor_source_clamps_offset() {
    let cursor = CursorSource::new("ab", 10);
    assert_eq!(cursor.prefix, "ab");
    assert_eq!(cursor.offset, 0);
}

#[test]
fn test_strip_markers_removes_all_markers() {
    let source = "foo(#^A^#)\nbar.#^B^#\n";
    let (text, offset) = strip_markers(source, "B").expect("marker B");
    assert_eq!(text, "foo()\nbar.\n");
    assert_eq!(offset, "foo()\nbar.".len());
}

#[test]
fn test_strip_markers_missing_token() {
    assert_eq!(strip_markers("x.#^A^#", "B"), None);
}
