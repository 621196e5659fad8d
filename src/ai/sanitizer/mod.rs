pub mod validator;

pub use validator::{validate_sql, Rejection, RejectionKind};
