// Domain-layer modules and shared errors/models
pub mod identification {
    pub use crate::identification::*;
}

pub mod resolver {
    pub use crate::resolver::*;
}

pub mod accounts {
    pub use crate::accounts::*;
}

pub mod provisioning {
    pub use crate::provisioning::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
