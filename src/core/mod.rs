// Domain-layer modules and shared errors/models
pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod decision {
    pub use crate::decision::*;
}

pub mod scorer {
    pub use crate::scorer::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
