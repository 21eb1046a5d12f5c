//! Runtime values for the UDIL interpreter.

use std::fmt;
use std::rc::Rc;

use udil_syntax::ast::{Statement, TypeTag};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Padding for auto-extended lists and the zero value of statement types
    Null,
    /// A 64-bit signed integer value
    Int(i64),
    /// A 64-bit floating point value
    Real(f64),
    /// Text content, stored without quote markers
    Text(String),
    /// An ordered, heterogeneous list
    List(Vec<Value>),
    /// A block or a single statement
    Block(Rc<Statement>),
}

impl Value {
    /// The zero value a declaration of `tag` starts with.
    pub fn zero(tag: TypeTag) -> Value {
        match tag {
            TypeTag::Int => Value::Int(0),
            TypeTag::Real => Value::Real(0.0),
            TypeTag::Text => Value::Text(String::new()),
            TypeTag::List => Value::List(Vec::new()),
            TypeTag::Block => Value::Null,
        }
    }

    /// Runtime tag of this value; `Null` has none.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(TypeTag::Int),
            Value::Real(_) => Some(TypeTag::Real),
            Value::Text(_) => Some(TypeTag::Text),
            Value::List(_) => Some(TypeTag::List),
            Value::Block(_) => Some(TypeTag::Block),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_tag().map_or("null", |t| t.as_str())
    }

    /// Whether a binding tagged `tag` may hold this value. `Null` stands in
    /// for an unset statement.
    pub fn fits(&self, tag: TypeTag) -> bool {
        match self {
            Value::Null => tag == TypeTag::Block,
            v => v.type_tag() == Some(tag),
        }
    }

    /// Text used when a value addresses a sync channel or name: text by
    /// content, anything else by its rendering.
    pub fn key_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Real(x) => write!(f, "{:?}", x),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, it) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", it)?;
                }
                write!(f, "]")
            }
            Value::Block(stmt) => write!(f, "{}", stmt),
        }
    }
}
