//! # FHIRPath Parse Trees
//!
//! The evaluator walks trees of [`Expression`] nodes. Producing them from source
//! text is the job of an external parser; this module only defines the node
//! types, a JSON encoding (so trees can be handed over between processes), and
//! builder helpers for constructing trees in code.
//!
//! ## Building trees
//!
//! ```rust
//! use kestrel_fhirpath::ast::{BinaryOperator, Expression};
//!
//! // Patient.name.where(use = 'official').given.first()
//! let expr = Expression::path("Patient.name")
//!     .call("where", vec![Expression::binary(
//!         BinaryOperator::Equal,
//!         Expression::identifier("use"),
//!         Expression::string("official"),
//!     )])
//!     .member("given")
//!     .call("first", vec![]);
//!
//! assert_eq!(expr.to_string(), "Patient.name.where(use = 'official').given.first()");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a literal node. The literal's source text is kept alongside and
/// converted to a value at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiteralKind {
    /// `{}`: the empty collection.
    Null,
    Boolean,
    String,
    Integer,
    Decimal,
    Date,
    DateTime,
    Time,
    Quantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOperator {
    Multiply,
    Divide,
    Div,
    Mod,
    Add,
    Subtract,
    Concatenate,
    Union,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Equal,
    NotEqual,
    Equivalent,
    NotEquivalent,
    In,
    Contains,
    And,
    Or,
    Xor,
    Implies,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Div => "div",
            BinaryOperator::Mod => "mod",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Concatenate => "&",
            BinaryOperator::Union => "|",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Equivalent => "~",
            BinaryOperator::NotEquivalent => "!~",
            BinaryOperator::In => "in",
            BinaryOperator::Contains => "contains",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Xor => "xor",
            BinaryOperator::Implies => "implies",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeOperator {
    Is,
    As,
}

/// A possibly namespace-qualified type name (`Patient`, `System.String`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpecifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl TypeSpecifier {
    /// Parses `Name` or `Namespace.Name`, stripping backtick delimiters.
    pub fn parse(text: &str) -> Self {
        let clean = text.replace('`', "");
        match clean.rsplit_once('.') {
            Some((namespace, name)) => TypeSpecifier {
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            },
            None => TypeSpecifier {
                namespace: None,
                name: clean,
            },
        }
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A node of a FHIRPath parse tree.
///
/// Member access and function calls without a target apply to `$this` of the
/// enclosing scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expression {
    Literal {
        #[serde(rename = "literalKind")]
        literal_kind: LiteralKind,
        raw: String,
    },
    MemberAccess {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Box<Expression>>,
        name: String,
    },
    FunctionCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Box<Expression>>,
        name: String,
        #[serde(default)]
        args: Vec<Expression>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Indexer {
        base: Box<Expression>,
        index: Box<Expression>,
    },
    TypeTest {
        op: TypeOperator,
        operand: Box<Expression>,
        #[serde(rename = "type")]
        type_specifier: TypeSpecifier,
    },
    ThisRef,
    IndexRef,
    TotalRef,
    ExternalConstantRef {
        name: String,
    },
}

impl Expression {
    pub fn literal(literal_kind: LiteralKind, raw: impl Into<String>) -> Self {
        Expression::Literal {
            literal_kind,
            raw: raw.into(),
        }
    }

    pub fn null() -> Self {
        Self::literal(LiteralKind::Null, "{}")
    }

    pub fn boolean(value: bool) -> Self {
        Self::literal(LiteralKind::Boolean, value.to_string())
    }

    /// A string literal holding `value` verbatim (no escapes to undo).
    pub fn string(value: impl Into<String>) -> Self {
        Self::literal(LiteralKind::String, value)
    }

    pub fn integer(value: i64) -> Self {
        Self::literal(LiteralKind::Integer, value.to_string())
    }

    pub fn decimal(raw: impl Into<String>) -> Self {
        Self::literal(LiteralKind::Decimal, raw)
    }

    pub fn date(raw: impl Into<String>) -> Self {
        Self::literal(LiteralKind::Date, raw)
    }

    pub fn date_time(raw: impl Into<String>) -> Self {
        Self::literal(LiteralKind::DateTime, raw)
    }

    pub fn time(raw: impl Into<String>) -> Self {
        Self::literal(LiteralKind::Time, raw)
    }

    /// A quantity literal such as `5 'mg'` or `3 days`.
    pub fn quantity(raw: impl Into<String>) -> Self {
        Self::literal(LiteralKind::Quantity, raw)
    }

    /// A member access on `$this`.
    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::MemberAccess {
            target: None,
            name: name.into(),
        }
    }

    /// A dotted chain of member accesses: `path("Patient.name.given")`.
    pub fn path(path: &str) -> Self {
        let mut segments = path.split('.');
        let first = Self::identifier(segments.next().unwrap_or_default());
        segments.fold(first, |expr, segment| expr.member(segment))
    }

    pub fn member(self, name: impl Into<String>) -> Self {
        Expression::MemberAccess {
            target: Some(Box::new(self)),
            name: name.into(),
        }
    }

    /// A function call applied to this expression.
    pub fn call(self, name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            target: Some(Box::new(self)),
            name: name.into(),
            args,
        }
    }

    /// A function call applied to `$this`.
    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            target: None,
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn index(self, index: Expression) -> Self {
        Expression::Indexer {
            base: Box::new(self),
            index: Box::new(index),
        }
    }

    pub fn is_type(self, type_name: &str) -> Self {
        Expression::TypeTest {
            op: TypeOperator::Is,
            operand: Box::new(self),
            type_specifier: TypeSpecifier::parse(type_name),
        }
    }

    pub fn as_type(self, type_name: &str) -> Self {
        Expression::TypeTest {
            op: TypeOperator::As,
            operand: Box::new(self),
            type_specifier: TypeSpecifier::parse(type_name),
        }
    }

    pub fn constant(name: impl Into<String>) -> Self {
        Expression::ExternalConstantRef { name: name.into() }
    }

    /// Reads a type name from an unevaluated argument such as `Patient` or
    /// `FHIR.Patient`, as passed to `ofType()`, `is()` and `as()`.
    pub fn as_type_specifier(&self) -> Option<TypeSpecifier> {
        match self {
            Expression::MemberAccess { target: None, name } => Some(TypeSpecifier::parse(name)),
            Expression::MemberAccess {
                target: Some(target),
                name,
            } => {
                let namespace = target.as_type_specifier()?;
                Some(TypeSpecifier {
                    namespace: Some(namespace.to_string()),
                    name: name.replace('`', ""),
                })
            }
            Expression::Literal {
                literal_kind: LiteralKind::String,
                raw,
            } => Some(TypeSpecifier::parse(raw.trim_matches('\''))),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal { literal_kind, raw } => match literal_kind {
                LiteralKind::String if !raw.starts_with('\'') => {
                    write!(f, "'{}'", raw.replace('\\', "\\\\").replace('\'', "\\'"))
                }
                LiteralKind::Date | LiteralKind::DateTime if !raw.starts_with('@') => {
                    write!(f, "@{}", raw)
                }
                LiteralKind::Time if !raw.starts_with('@') => write!(f, "@T{}", raw.trim_start_matches('T')),
                _ => f.write_str(raw),
            },
            Expression::MemberAccess { target: None, name } => f.write_str(name),
            Expression::MemberAccess {
                target: Some(target),
                name,
            } => write!(f, "{}.{}", target, name),
            Expression::FunctionCall { target, name, args } => {
                if let Some(target) = target {
                    write!(f, "{}.", target)?;
                }
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expression::BinaryOp { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Expression::UnaryOp { op, operand } => match op {
                UnaryOperator::Plus => write!(f, "+{}", operand),
                UnaryOperator::Minus => write!(f, "-{}", operand),
                UnaryOperator::Not => write!(f, "{}.not()", operand),
            },
            Expression::Indexer { base, index } => write!(f, "{}[{}]", base, index),
            Expression::TypeTest {
                op,
                operand,
                type_specifier,
            } => {
                let keyword = match op {
                    TypeOperator::Is => "is",
                    TypeOperator::As => "as",
                };
                write!(f, "{} {} {}", operand, keyword, type_specifier)
            }
            Expression::ThisRef => f.write_str("$this"),
            Expression::IndexRef => f.write_str("$index"),
            Expression::TotalRef => f.write_str("$total"),
            Expression::ExternalConstantRef { name } => write!(f, "%{}", name),
        }
    }
}
