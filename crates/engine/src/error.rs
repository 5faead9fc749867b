use metapath_types::ValueError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetapathError {
    #[error("Syntax error at offset {position}: expected {expected}, found {found}")]
    SyntaxError {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Division by zero")]
    DivideByZero,

    #[error("Undefined function {}#{arity}", qualified(.namespace, .name))]
    UndefinedFunction {
        namespace: Option<String>,
        name: String,
        arity: usize,
    },

    #[error("Variable '${name}' is not defined")]
    UndefinedVariable { name: String },

    #[error("Invalid value for cast: {0}")]
    InvalidValueForCast(String),

    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    #[error("Context item is required but not set")]
    NoContextItem,

    #[error("Array index {index} out of bounds (size: {size})")]
    ArrayIndexOutOfBounds { index: i64, size: usize },

    #[error("Function '{function}' error: {message}")]
    Function { function: String, message: String },
}

fn qualified(namespace: &Option<String>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("Q{{{}}}{}", ns, name),
        None => name.to_string(),
    }
}

impl MetapathError {
    pub fn syntax(
        position: usize,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::SyntaxError {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Self::ArithmeticOverflow(message.into())
    }

    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn undefined_function(namespace: Option<&str>, name: &str, arity: usize) -> Self {
        Self::UndefinedFunction {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            arity,
        }
    }

    /// The XPath error code closest to this error.
    pub fn code(&self) -> &'static str {
        match self {
            MetapathError::SyntaxError { .. } => "XPST0003",
            MetapathError::TypeError(_) => "XPTY0004",
            MetapathError::InvalidValue(_) => "FORG0001",
            MetapathError::DivideByZero => "FOAR0001",
            MetapathError::UndefinedFunction { .. } => "XPST0017",
            MetapathError::UndefinedVariable { .. } => "XPST0008",
            MetapathError::InvalidValueForCast(_) => "XPTY0117",
            MetapathError::ArithmeticOverflow(_) => "FOAR0002",
            MetapathError::NoContextItem => "XPDY0002",
            MetapathError::ArrayIndexOutOfBounds { .. } => "FOAY0001",
            MetapathError::Function { .. } => "FOER0000",
        }
    }
}

impl From<ValueError> for MetapathError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::InvalidValue { .. } => MetapathError::InvalidValue(err.to_string()),
            ValueError::InvalidValueForCast { .. } => {
                MetapathError::InvalidValueForCast(err.to_string())
            }
            ValueError::Incomparable { .. } => MetapathError::TypeError(err.to_string()),
            ValueError::Overflow(message) => MetapathError::ArithmeticOverflow(message),
        }
    }
}
