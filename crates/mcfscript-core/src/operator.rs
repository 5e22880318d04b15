//! Binary and unary operators.
//!
//! The left operand's variant decides what an operator means; the right
//! operand is converted to whatever the left side needs. `1 + '2'` is the
//! integer 3 while `'1' + 2` is the string `"12"`.

use url::form_urlencoded;

use crate::error::ScriptError;
use crate::variable::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `||`
    LogicalOr,
    /// `|`
    Or,
    /// `&&`
    LogicalAnd,
    /// `&`
    And,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::LogicalOr => "||",
            BinaryOperator::Or => "|",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::And => "&",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        }
    }

    /// The result that makes evaluating the right operand unnecessary, if
    /// `left` decides it.
    pub fn short_circuit(self, left: &Variable) -> Option<bool> {
        match (self, left) {
            (BinaryOperator::LogicalAnd, Variable::Boolean(false)) => Some(false),
            (BinaryOperator::LogicalOr, Variable::Boolean(true)) => Some(true),
            _ => None,
        }
    }

    fn illegal(self, left: &Variable) -> ScriptError {
        ScriptError::unsupported(&format!("binary {}", self.symbol()), left.type_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `!`: logical not. An integer is true when non-zero, so `!2` is `0`.
    Not,
    /// `-`
    Negate,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Negate => "-",
        }
    }
}

impl Variable {
    pub fn binary(&self, op: BinaryOperator, right: &Variable) -> Result<Variable, ScriptError> {
        use BinaryOperator::*;

        match self {
            Variable::Int(a) => {
                let a = *a;
                let b = right.to_int()?;
                let overflow = || ScriptError::type_error(format!("Integer overflow in {} {} {}", a, op.symbol(), b));
                let value = match op {
                    Add => a.checked_add(b).ok_or_else(overflow)?,
                    Subtract => a.checked_sub(b).ok_or_else(overflow)?,
                    Multiply => a.checked_mul(b).ok_or_else(overflow)?,
                    Divide => {
                        if b == 0 {
                            return Err(ScriptError::type_error("Integer division by zero"));
                        }
                        a.checked_div(b).ok_or_else(overflow)?
                    }
                    And => a & b,
                    Or => a | b,
                    LogicalAnd | LogicalOr => return Err(op.illegal(self)),
                    _ => return Ok(Variable::Boolean(compare(op, &a, &b))),
                };
                Ok(Variable::Int(value))
            }
            Variable::Float(a) => {
                let b = right.to_float()?;
                match op {
                    Add => Ok(Variable::Float(a + b)),
                    Subtract => Ok(Variable::Float(a - b)),
                    Multiply => Ok(Variable::Float(a * b)),
                    Divide => Ok(Variable::Float(a / b)),
                    Equal | NotEqual | Less | Greater | LessEqual | GreaterEqual => {
                        Ok(Variable::Boolean(compare(op, a, &b)))
                    }
                    _ => Err(op.illegal(self)),
                }
            }
            Variable::Boolean(a) => match op {
                And | LogicalAnd => Ok(Variable::Boolean(*a && right.to_bool()?)),
                Or | LogicalOr => Ok(Variable::Boolean(*a || right.to_bool()?)),
                Equal => Ok(Variable::Boolean(*a == right.to_bool()?)),
                NotEqual => Ok(Variable::Boolean(*a != right.to_bool()?)),
                _ => Err(op.illegal(self)),
            },
            Variable::String(a) => match op {
                Add => Ok(Variable::String(format!("{}{}", a, right.to_string_value()?))),
                Equal => Ok(Variable::Boolean(*a == right.to_string_value()?)),
                NotEqual => Ok(Variable::Boolean(*a != right.to_string_value()?)),
                _ => Err(op.illegal(self)),
            },
            Variable::Url(a) => match op {
                Add => Ok(Variable::Url(append_segment(a, right)?)),
                Equal => Ok(Variable::Boolean(*a == right.to_string_value()?)),
                NotEqual => Ok(Variable::Boolean(*a != right.to_string_value()?)),
                _ => Err(op.illegal(self)),
            },
            Variable::ConnectionName(a) => match op {
                Equal => Ok(Variable::Boolean(*a == right.to_string_value()?)),
                NotEqual => Ok(Variable::Boolean(*a != right.to_string_value()?)),
                _ => Err(op.illegal(self)),
            },
            Variable::Configuration(c) if op == Add => {
                let child = appended_child(self, right)?;
                let mut copy = c.borrow().deep_copy();
                copy.children.push(child);
                Ok(Variable::configuration(copy))
            }
            Variable::ConfigurationNode(n) if op == Add => {
                let child = appended_child(self, right)?;
                let mut copy = n.borrow().deep_copy();
                copy.children.push(child);
                Ok(Variable::node(copy))
            }
            _ => Err(op.illegal(self)),
        }
    }

    pub fn unary(&self, op: UnaryOperator) -> Result<Variable, ScriptError> {
        match (self, op) {
            (Variable::Boolean(b), UnaryOperator::Not) => Ok(Variable::Boolean(!b)),
            (Variable::Int(i), UnaryOperator::Not) => Ok(Variable::Int(i64::from(*i == 0))),
            (Variable::Int(i), UnaryOperator::Negate) => i
                .checked_neg()
                .map(Variable::Int)
                .ok_or_else(|| ScriptError::type_error(format!("Integer overflow in -{}", i))),
            (Variable::Float(f), UnaryOperator::Negate) => Ok(Variable::Float(-f)),
            _ => Err(ScriptError::unsupported(
                &format!("unary {}", op.symbol()),
                self.type_name(),
            )),
        }
    }
}

fn compare<T: PartialOrd>(op: BinaryOperator, a: &T, b: &T) -> bool {
    match op {
        BinaryOperator::Equal => a == b,
        BinaryOperator::NotEqual => a != b,
        BinaryOperator::Less => a < b,
        BinaryOperator::Greater => a > b,
        BinaryOperator::LessEqual => a <= b,
        BinaryOperator::GreaterEqual => a >= b,
        _ => false,
    }
}

/// Copy of `right` to append as a child of `left`.
fn appended_child(
    left: &Variable,
    right: &Variable,
) -> Result<crate::configuration::NodeHandle, ScriptError> {
    match right {
        Variable::ConfigurationNode(node) => Ok(node.borrow().deep_copy().into_handle()),
        other => Err(ScriptError::type_error(format!(
            "Cannot add {} to {}",
            other.type_name(),
            left.type_name()
        ))),
    }
}

/// Appends `/segment` to a URL, form-encoding the segment with spaces as `%20`.
fn append_segment(base: &str, segment: &Variable) -> Result<String, ScriptError> {
    let text = match segment {
        Variable::ConnectionName(name) => escape_connection_name(name),
        other => other.to_string_value()?,
    };
    let encoded: String = form_urlencoded::byte_serialize(text.as_bytes()).collect();
    Ok(format!("{}/{}", base, encoded.replace('+', "%20")))
}

/// Makes a connection name safe as one path segment: `.` becomes `..` and
/// `/` becomes `.+`.
pub fn escape_connection_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '.' => out.push_str(".."),
            '/' => out.push_str(".+"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::ConfigurationNode;
    use crate::error::ErrorKind;
    use BinaryOperator::*;

    fn int(v: &Variable) -> i64 {
        match v {
            Variable::Int(i) => *i,
            other => panic!("expected integer, got {:?}", other),
        }
    }

    fn boolean(v: &Variable) -> bool {
        v.to_bool().unwrap()
    }

    #[test]
    fn test_integer_arithmetic() {
        let three = Variable::Int(3);
        assert_eq!(int(&three.binary(Divide, &Variable::Int(2)).unwrap()), 1);
        assert_eq!(int(&Variable::Int(1).binary(And, &Variable::Int(5)).unwrap()), 1);
        assert_eq!(int(&Variable::Int(1).binary(Or, &Variable::Int(2)).unwrap()), 3);
        assert_eq!(int(&three.binary(Add, &Variable::String("2".into())).unwrap()), 5);
        assert_eq!(int(&three.binary(Multiply, &Variable::Float(2.9)).unwrap()), 6);
    }

    #[test]
    fn test_integer_errors() {
        let err = Variable::Int(1).binary(Divide, &Variable::Int(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert!(Variable::Int(i64::MAX).binary(Add, &Variable::Int(1)).is_err());
        assert!(Variable::Int(1).binary(LogicalAnd, &Variable::Int(1)).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert!(boolean(&Variable::Int(2).binary(Less, &Variable::Int(3)).unwrap()));
        assert!(boolean(&Variable::Float(2.5).binary(GreaterEqual, &Variable::Int(2)).unwrap()));
        assert!(!boolean(&Variable::String("a".into()).binary(Equal, &Variable::String("b".into())).unwrap()));
        assert!(Variable::String("a".into()).binary(Less, &Variable::String("b".into())).is_err());
    }

    #[test]
    fn test_boolean_operators() {
        let t = Variable::Boolean(true);
        let f = Variable::Boolean(false);
        assert!(!boolean(&t.binary(And, &f).unwrap()));
        assert!(boolean(&f.binary(LogicalOr, &t).unwrap()));
        assert!(boolean(&t.binary(NotEqual, &f).unwrap()));
        let err = t.binary(Add, &f).unwrap_err();
        assert_eq!(err.message, "binary + illegal for boolean");
    }

    #[test]
    fn test_short_circuit_only_on_deciding_boolean() {
        assert_eq!(LogicalAnd.short_circuit(&Variable::Boolean(false)), Some(false));
        assert_eq!(LogicalAnd.short_circuit(&Variable::Boolean(true)), None);
        assert_eq!(LogicalOr.short_circuit(&Variable::Boolean(true)), Some(true));
        assert_eq!(And.short_circuit(&Variable::Boolean(false)), None);
        assert_eq!(LogicalOr.short_circuit(&Variable::Int(1)), None);
    }

    #[test]
    fn test_unary() {
        assert!(!Variable::Boolean(true).unary(UnaryOperator::Not).unwrap().to_bool().unwrap());
        assert_eq!(int(&Variable::Int(2).unary(UnaryOperator::Negate).unwrap()), -2);
        assert_eq!(int(&Variable::Int(0).unary(UnaryOperator::Not).unwrap()), 1);
        assert_eq!(int(&Variable::Int(2).unary(UnaryOperator::Not).unwrap()), 0);
        assert!(Variable::String("x".into()).unary(UnaryOperator::Negate).is_err());
    }

    #[test]
    fn test_url_append_encodes_segment() {
        let url = Variable::Url("abc".into());
        let joined = url.binary(Add, &Variable::String("def ghi".into())).unwrap();
        assert_eq!(joined.to_string_value().unwrap(), "abc/def%20ghi");

        let name = Variable::ConnectionName("there/guys.".into());
        let joined = Variable::Url("hello".into()).binary(Add, &name).unwrap();
        assert_eq!(joined.to_string_value().unwrap(), "hello/there.%2Bguys..");
    }

    #[test]
    fn test_node_add_copies_both_sides() {
        let parent = Variable::node(ConfigurationNode::new("p"));
        let child = Variable::node(ConfigurationNode::new("c"));
        let sum = parent.binary(Add, &child).unwrap();
        assert_eq!(sum.attribute("__size__").unwrap().resolve().unwrap().to_int().unwrap(), 1);
        assert_eq!(parent.attribute("__size__").unwrap().resolve().unwrap().to_int().unwrap(), 0);
        assert!(parent.binary(Add, &Variable::Int(1)).is_err());
    }
}
