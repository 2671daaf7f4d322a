//! External service integrations.

pub mod mailer {
    pub use crate::mailer::*;
}
