//! Reading messages: decryption, decompression and one pass signature checks.

mod decrypt;
mod reader;
mod source;
mod types;

pub use self::decrypt::PromptFn;
pub use self::reader::read_message;
pub use self::types::MessageDetails;
