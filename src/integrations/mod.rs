//! External service integrations.

pub mod rest_client {
    pub use crate::rest_client::*;
}

pub mod auth_client {
    pub use crate::auth_client::*;
}

pub mod db {
    pub use crate::db::*;
}
