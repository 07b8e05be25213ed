#![forbid(unsafe_code)]

pub mod wire;

pub use wire::{
	DEFAULT_MAX_FRAME_SIZE, InboundFrame, OutboundFrame, RawMessage, RawUser, WireError, decode_history_page,
	decode_inbound_frame, encode_outbound_frame,
};
