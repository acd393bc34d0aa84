pub mod http;
pub mod token_file;

pub use http::HttpBackendAdapter;
pub use token_file::FileSessionStore;
