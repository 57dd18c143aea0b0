//! Controller Client Layer
//!
//! - [`RestClient`]: JSON GET/POST capability the query executors consume
//! - [`Controller`]: a `RestClient` whose session can be re-established
//! - [`VManageClient`]: reqwest-based vManage implementation (form login,
//!   XSRF token, optional tenant switch)

mod error;
mod rest;
mod vmanage;

pub use error::ClientError;
pub use rest::{Controller, RestClient};
pub use vmanage::VManageClient;
