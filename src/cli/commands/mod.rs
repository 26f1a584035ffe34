mod init;
mod serve;
mod tail;
mod trends;

pub use init::execute_init;
pub use serve::execute_serve;
pub use tail::execute_tail;
pub use trends::execute_trends;
