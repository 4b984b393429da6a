mod payload_codec;

pub use payload_codec::{PayloadCodec, PAYLOAD_LEN};
