//! External service integrations.

pub mod store_client {
    pub use crate::store_client::*;
}

pub mod classifier {
    pub use crate::classifier::*;
}
