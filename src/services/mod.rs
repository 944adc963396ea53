// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod password;
pub mod storage;
pub mod tokens;

pub use storage::{MediaStorage, UploadResult};
pub use tokens::{TokenPair, TokenService};
