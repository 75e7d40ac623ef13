mod batch_id;
mod init;
mod spans;

pub use batch_id::BatchId;
pub use init::{init_logger, warn_if_slow};
pub use spans::{child_span, root_span};
