mod filter;
mod image;
mod message;
mod store;

pub use filter::filter_messages;
pub use image::{mime_for_path, ImageBlob};
pub use message::{ImageRef, Message, MessageBody, MessageId, Role};
pub use store::{Session, SessionChange};
