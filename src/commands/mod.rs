mod extract;
mod init;
mod textify;

pub use extract::{extract_dump, ExtractArgs};
pub use init::init_config;
pub use textify::textify_stream;
