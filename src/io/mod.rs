/*!
 * I/O Module
 * Byte-stream endpoints used to wire child standard streams
 */

pub mod stream;

pub use stream::{Access, Stream};
