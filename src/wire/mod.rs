//! Wire format: binary capture frames and JSON control events

mod frame;
mod message;

pub use frame::{FRAME_HEADER_LEN, OutboundFrame, SOURCE_MICROPHONE};
pub use message::{ClientEvent, EventKind, ServerEvent};
