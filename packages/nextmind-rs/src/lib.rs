//! Reader and signal conditioning for NextMind `.raw` / `.inf` recordings.
//!
//! The reader decodes a payload whose layout is described by a `.inf` sidecar,
//! or inferred from its size when the sidecar is partial or missing. The
//! shielding pipeline then filters the decoded buffer and handles artifacts.

pub mod codec;
pub mod error;
pub mod inf;
pub mod inference;
pub mod locator;
pub mod mmap_utils;
pub mod reader;
pub mod shielding;
pub mod signal;
pub mod types;
pub mod writer;

pub use codec::{decode_bytes, encode};
pub use error::{NextMindError, Result};
pub use inf::{read_inf, InfMetadata};
pub use inference::{infer_layout, infer_metadata, InferenceOptions};
pub use locator::{discover, find_sessions, DiscoverOptions, Discovery, RecordingRef, StreamKind};
pub use reader::{
    decode, open_recording, open_recording_with, read_metadata, read_metadata_with, ReaderConfig,
};
pub use shielding::{ArtifactAction, ShieldingConfig, ShieldingReport};
pub use signal::SignalBuffer;
pub use types::*;
pub use writer::write_recording;
