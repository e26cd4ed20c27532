//! Matter workspaces: the client/matter registry and the message/file relay.

pub mod registry;
pub mod relay;

pub use registry::Registry;
pub use relay::{FileUpload, Relay};
