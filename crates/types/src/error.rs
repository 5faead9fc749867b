use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Invalid {type_name} value '{value}': {reason}")]
    InvalidValue {
        type_name: String,
        value: String,
        reason: String,
    },

    #[error("Cannot cast {from} to {to}")]
    InvalidValueForCast { from: String, to: String },

    #[error("Values of type {left} and {right} are not comparable")]
    Incomparable { left: String, right: String },

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
}

impl ValueError {
    pub fn invalid(
        type_name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            type_name: type_name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn cast(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidValueForCast {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn incomparable(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::Incomparable {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Self::Overflow(message.into())
    }
}
