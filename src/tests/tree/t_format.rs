use super::*;
use crate::core::parse::parse_source;
use indoc::indoc;

fn dump(source: &str) -> String {
    let parsed = parse_source(source, NodeIdGen::new());
    assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
    format_source_file(&parsed.file)
}

#[test]
fn test_format_struct_with_method() {
    let source = indoc! {"
        struct S {
            var x: Int
            func f(_ a: Int, b: Int = 1) -> Int {
                return a + b * 2
            }
        }
        let s = S(x: 1)
    "};
    let expected = indoc! {"
        struct S
          var x: Int
          func f(_ a: Int, b: Int = 1) -> Int
            return (a + (b * 2))
        let s = S(x: 1)
    "};
    assert_eq!(dump(source), expected);
}

#[test]
fn test_format_enum_and_switch() {
    let source = indoc! {"
        enum E {
            case a, b(Int)
        }
        func g(e: E) {
            switch e {
            case .a:
                break
            case .b(let n) where n > 0:
                print(n)
            default:
                break
            }
        }
    "};
    let expected = indoc! {"
        enum E
          case a, b(Int)
        func g(e: E)
          switch e
            case .a
              break
            case .b(let n) where (n > 0)
              print(n)
            default
              break
    "};
    assert_eq!(dump(source), expected);
}

#[test]
fn test_format_protocol_requirements_and_extension() {
    let source = indoc! {"
        protocol P: Equatable {
            associatedtype A
            var value: Int { get set }
            static func make() -> Self
        }
        extension Int: P {}
    "};
    let expected = indoc! {"
        protocol P: Equatable
          associatedtype A
          var value: Int
            { get set }
          static func make() -> Self
        extension Int: P
    "};
    assert_eq!(dump(source), expected);
}

#[test]
fn test_format_optional_binding_and_optional_type() {
    let source = indoc! {"
        func h(x: Int?) -> Int {
            if let y = x {
                return y
            }
            return -1
        }
    "};
    let expected = indoc! {"
        func h(x: Int?) -> Int
          if let y = x
            return y
          return (-1)
    "};
    assert_eq!(dump(source), expected);
}

#[test]
fn test_format_marks_errors() {
    let parsed = parse_source("let x = )\nlet y = 2\n", NodeIdGen::new());
    assert!(!parsed.errors.is_empty());
    let text = format_source_file(&parsed.file);
    assert!(text.contains("let x = <error>"), "{text}");
    assert!(text.contains("let y = 2"), "{text}");
}
