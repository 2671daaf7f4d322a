// Domain-layer modules and shared errors/models
pub mod intake {
    pub use crate::intake::*;
}

pub mod lifecycle {
    pub use crate::lifecycle::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod spam_guard {
    pub use crate::spam_guard::*;
}

pub mod errors {
    pub use crate::errors::*;
}
