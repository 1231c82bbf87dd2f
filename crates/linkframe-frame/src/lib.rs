//! Single-byte length-prefixed text framing.
//!
//! Every message on the wire is one length byte followed by exactly that many
//! payload bytes (0–255), with nothing else around it. Payloads carry text in
//! an encoding both ends agree on.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod encoding;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_command, encode_frame, Frame, FrameConfig, LinkCodec, OversizePolicy,
    HEADER_SIZE, MAX_PAYLOAD,
};
pub use encoding::TextEncoding;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
