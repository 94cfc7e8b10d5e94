//! Predicate AST
//!
//! A closed set of node kinds. Front ends build trees with the fluent
//! helpers below; the compiler matches on every variant exhaustively.
//!
//! ```ignore
//! let person = Expr::subject::<Person>();
//! let predicate = person
//!     .clone()
//!     .member::<String>("name")
//!     .starts_with(Expr::constant("Jo"))
//!     .and(person.member::<Option<i32>>("age").ne(Expr::null()));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::types::{DescribeType, TypeDescriptor, Value};

/// Boolean combinators and comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl BinaryOp {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
        };
        f.write_str(op)
    }
}

/// String-pattern methods lowered to `LIKE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMethod {
    Contains,
    StartsWith,
    EndsWith,
}

impl StringMethod {
    /// Wrap a value with `%` on the matching side(s)
    pub fn pattern(&self, value: &str) -> String {
        match self {
            StringMethod::Contains => format!("%{}%", value),
            StringMethod::StartsWith => format!("{}%", value),
            StringMethod::EndsWith => format!("%{}", value),
        }
    }
}

/// A value read from outside the predicate, evaluated when compiled.
#[derive(Clone)]
pub struct Captured(Arc<dyn Fn() -> Value + Send + Sync>);

impl Captured {
    pub fn new<F, V>(read: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self(Arc::new(move || read().into()))
    }

    pub fn evaluate(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Captured(..)")
    }
}

/// Predicate expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    /// Type-coercion wrapper; transparent to SQL
    Convert(Box<Expr>),
    /// `owner.name`, where `ty` is the member's declared type
    Member {
        owner: Box<Expr>,
        name: String,
        ty: TypeDescriptor,
    },
    /// External variable, evaluated at compile time
    Captured(Captured),
    Constant(Value),
    /// The predicate's own root parameter
    Subject(TypeDescriptor),
    StringMatch {
        method: StringMethod,
        receiver: Box<Expr>,
        argument: Box<Expr>,
    },
    /// Three-way comparison method
    CompareTo {
        receiver: Box<Expr>,
        argument: Box<Expr>,
    },
    /// `item IN collection`, where the collection is a bound value
    ContainedIn {
        collection: Box<Expr>,
        item: Box<Expr>,
    },
    /// At least one element of `source` satisfies `body`; the element is
    /// referenced from `body` through [`Expr::Slot`].
    Any {
        source: Box<Expr>,
        body: Box<Expr>,
    },
    /// Unbound element of an enclosing [`Expr::Any`]
    Slot,
    /// A parameter already bound in the current compilation, referenced by
    /// name and emitted as is (never rewritten)
    Parameter(String),
    /// A node kind the front end could not express; dropped when compiled
    Unsupported(String),
}

impl Expr {
    // ========================================================================
    // Leaves
    // ========================================================================

    pub fn subject<T: DescribeType>() -> Self {
        Expr::Subject(T::describe())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn null() -> Self {
        Expr::Constant(Value::Null)
    }

    pub fn captured<F, V>(read: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Expr::Captured(Captured::new(read))
    }

    pub fn slot() -> Self {
        Expr::Slot
    }

    pub fn unsupported(description: impl Into<String>) -> Self {
        Expr::Unsupported(description.into())
    }

    // ========================================================================
    // Composition
    // ========================================================================

    /// Access member `name` of type `T` on this expression
    pub fn member<T: DescribeType>(self, name: &str) -> Self {
        Expr::Member {
            owner: Box::new(self),
            name: name.to_string(),
            ty: T::describe(),
        }
    }

    pub fn binary(self, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn and(self, right: Expr) -> Self {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: Expr) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    pub fn eq(self, right: Expr) -> Self {
        self.binary(BinaryOp::Equal, right)
    }

    pub fn ne(self, right: Expr) -> Self {
        self.binary(BinaryOp::NotEqual, right)
    }

    pub fn gt(self, right: Expr) -> Self {
        self.binary(BinaryOp::GreaterThan, right)
    }

    pub fn ge(self, right: Expr) -> Self {
        self.binary(BinaryOp::GreaterThanOrEqual, right)
    }

    pub fn lt(self, right: Expr) -> Self {
        self.binary(BinaryOp::LessThan, right)
    }

    pub fn le(self, right: Expr) -> Self {
        self.binary(BinaryOp::LessThanOrEqual, right)
    }

    pub fn convert(self) -> Self {
        Expr::Convert(Box::new(self))
    }

    pub fn contains(self, argument: Expr) -> Self {
        self.string_match(StringMethod::Contains, argument)
    }

    pub fn starts_with(self, argument: Expr) -> Self {
        self.string_match(StringMethod::StartsWith, argument)
    }

    pub fn ends_with(self, argument: Expr) -> Self {
        self.string_match(StringMethod::EndsWith, argument)
    }

    fn string_match(self, method: StringMethod, argument: Expr) -> Self {
        Expr::StringMatch {
            method,
            receiver: Box::new(self),
            argument: Box::new(argument),
        }
    }

    pub fn compare_to(self, argument: Expr) -> Self {
        Expr::CompareTo {
            receiver: Box::new(self),
            argument: Box::new(argument),
        }
    }

    /// `self IN collection`
    pub fn is_in(self, collection: Expr) -> Self {
        Expr::ContainedIn {
            collection: Box::new(collection),
            item: Box::new(self),
        }
    }

    /// `source.any(|element| body)`, with `element` written as [`Expr::slot`]
    pub fn any(source: Expr, body: Expr) -> Self {
        Expr::Any {
            source: Box::new(source),
            body: Box::new(body),
        }
    }

    /// Replace every [`Expr::Slot`] not bound by a nested `Any` with `value`.
    pub fn bind_slot(&self, value: &Expr) -> Expr {
        let bind = |node: &Expr| Box::new(node.bind_slot(value));
        match self {
            Expr::Slot => value.clone(),
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: bind(left),
                right: bind(right),
            },
            Expr::Not(inner) => Expr::Not(bind(inner)),
            Expr::Convert(inner) => Expr::Convert(bind(inner)),
            Expr::Member { owner, name, ty } => Expr::Member {
                owner: bind(owner),
                name: name.clone(),
                ty: ty.clone(),
            },
            Expr::StringMatch {
                method,
                receiver,
                argument,
            } => Expr::StringMatch {
                method: *method,
                receiver: bind(receiver),
                argument: bind(argument),
            },
            Expr::CompareTo { receiver, argument } => Expr::CompareTo {
                receiver: bind(receiver),
                argument: bind(argument),
            },
            Expr::ContainedIn { collection, item } => Expr::ContainedIn {
                collection: bind(collection),
                item: bind(item),
            },
            // The inner body's slot belongs to the inner quantifier
            Expr::Any { source, body } => Expr::Any {
                source: bind(source),
                body: body.clone(),
            },
            Expr::Captured(_)
            | Expr::Constant(_)
            | Expr::Subject(_)
            | Expr::Parameter(_)
            | Expr::Unsupported(_) => self.clone(),
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_bind_slot_replaces_unbound_slots() {
        let template = Expr::slot().eq(Expr::constant(1)).and(!Expr::slot());
        let bound = template.bind_slot(&Expr::constant("x"));

        assert_matches!(bound, Expr::Binary { op: BinaryOp::And, ref left, ref right } => {
            assert_matches!(**left, Expr::Binary { ref left, .. } => {
                assert_matches!(**left, Expr::Constant(Value::Text(ref s)) if s == "x");
            });
            assert_matches!(**right, Expr::Not(ref inner) => {
                assert_matches!(**inner, Expr::Constant(_));
            });
        });
    }

    #[test]
    fn test_bind_slot_leaves_nested_quantifier_body() {
        let inner = Expr::any(Expr::slot(), Expr::slot().eq(Expr::constant(2)));
        let bound = inner.bind_slot(&Expr::constant(vec![1, 2]));

        assert_matches!(bound, Expr::Any { ref source, ref body } => {
            assert_matches!(**source, Expr::Constant(Value::Array(_)));
            assert_matches!(**body, Expr::Binary { ref left, .. } => {
                assert_matches!(**left, Expr::Slot);
            });
        });
    }

    #[test]
    fn test_captured_evaluates_lazily() {
        let counter = Arc::new(std::sync::atomic::AtomicI64::new(0));
        let read = counter.clone();
        let captured = Captured::new(move || read.load(std::sync::atomic::Ordering::SeqCst));

        counter.store(7, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(captured.evaluate(), Value::Int(7));
    }

    #[test]
    fn test_patterns() {
        assert_eq!(StringMethod::Contains.pattern("x"), "%x%");
        assert_eq!(StringMethod::StartsWith.pattern("x"), "x%");
        assert_eq!(StringMethod::EndsWith.pattern("x"), "%x");
        assert_eq!(BinaryOp::GreaterThanOrEqual.to_string(), ">=");
    }
}
