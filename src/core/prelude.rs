//! Source of the implicit `Swift` module.
//!
//! Builtin types and operators carry `@builtin("name")`; lowering emits a
//! `builtin` instruction for calls to them instead of a function reference.

pub const PRELUDE_SOURCE: &str = r#"
protocol ExpressibleByIntegerLiteral {
    init(integerLiteral value: Int)
}
protocol ExpressibleByFloatLiteral {
    init(floatLiteral value: Double)
}
protocol ExpressibleByStringLiteral {
    init(stringLiteral value: String)
}
protocol ExpressibleByBooleanLiteral {
    init(booleanLiteral value: Bool)
}
protocol ExpressibleByNilLiteral {
    init(nilLiteral: ())
}

protocol Error {}
protocol Equatable {}
protocol Comparable: Equatable {}
protocol Hashable: Equatable {}

@builtin("Int") struct Int {}
@builtin("Double") struct Double {}
@builtin("Bool") struct Bool {}
@builtin("String") struct String {}

typealias IntegerLiteralType = Int
typealias FloatLiteralType = Double
typealias StringLiteralType = String
typealias BooleanLiteralType = Bool
typealias Void = ()

enum Optional<Wrapped> {
    case none
    case some(Wrapped)
}

extension Optional: ExpressibleByNilLiteral {
    @builtin("optional_nil") init(nilLiteral: ())
}

extension Int: ExpressibleByIntegerLiteral, Comparable, Hashable {
    @builtin("int_from_literal") init(integerLiteral value: Int)
    @builtin("double_to_int") init(_ value: Double)
}

extension Double: ExpressibleByIntegerLiteral, ExpressibleByFloatLiteral, Comparable {
    @builtin("int_to_double") init(integerLiteral value: Int)
    @builtin("double_from_literal") init(floatLiteral value: Double)
    @builtin("int_to_double") init(_ value: Int)
}

extension Bool: ExpressibleByBooleanLiteral, Equatable, Hashable {
    @builtin("bool_from_literal") init(booleanLiteral value: Bool)
}

extension String: ExpressibleByStringLiteral, Comparable, Hashable {
    @builtin("string_from_literal") init(stringLiteral value: String)
}

@builtin("int_add") func + (lhs: Int, rhs: Int) -> Int
@builtin("int_sub") func - (lhs: Int, rhs: Int) -> Int
@builtin("int_mul") func * (lhs: Int, rhs: Int) -> Int
@builtin("int_div") func / (lhs: Int, rhs: Int) -> Int
@builtin("int_rem") func % (lhs: Int, rhs: Int) -> Int
@builtin("int_neg") func - (operand: Int) -> Int
@builtin("int_eq") func == (lhs: Int, rhs: Int) -> Bool
@builtin("int_ne") func != (lhs: Int, rhs: Int) -> Bool
@builtin("int_lt") func < (lhs: Int, rhs: Int) -> Bool
@builtin("int_le") func <= (lhs: Int, rhs: Int) -> Bool
@builtin("int_gt") func > (lhs: Int, rhs: Int) -> Bool
@builtin("int_ge") func >= (lhs: Int, rhs: Int) -> Bool

@builtin("double_add") func + (lhs: Double, rhs: Double) -> Double
@builtin("double_sub") func - (lhs: Double, rhs: Double) -> Double
@builtin("double_mul") func * (lhs: Double, rhs: Double) -> Double
@builtin("double_div") func / (lhs: Double, rhs: Double) -> Double
@builtin("double_neg") func - (operand: Double) -> Double
@builtin("double_eq") func == (lhs: Double, rhs: Double) -> Bool
@builtin("double_ne") func != (lhs: Double, rhs: Double) -> Bool
@builtin("double_lt") func < (lhs: Double, rhs: Double) -> Bool
@builtin("double_le") func <= (lhs: Double, rhs: Double) -> Bool
@builtin("double_gt") func > (lhs: Double, rhs: Double) -> Bool
@builtin("double_ge") func >= (lhs: Double, rhs: Double) -> Bool

@builtin("bool_not") func ! (operand: Bool) -> Bool
@builtin("bool_eq") func == (lhs: Bool, rhs: Bool) -> Bool
@builtin("bool_ne") func != (lhs: Bool, rhs: Bool) -> Bool

@builtin("string_concat") func + (lhs: String, rhs: String) -> String
@builtin("string_eq") func == (lhs: String, rhs: String) -> Bool
@builtin("string_ne") func != (lhs: String, rhs: String) -> Bool
@builtin("string_lt") func < (lhs: String, rhs: String) -> Bool

@builtin("print_int") func print(_ value: Int)
@builtin("print_double") func print(_ value: Double)
@builtin("print_bool") func print(_ value: Bool)
@builtin("print_string") func print(_ value: String)
"#;
