use nextmind_rs::NextMindError;

pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
pub const INPUT_ERROR: i32 = 2;
pub const PARTIAL_FAILURE: i32 = 3;

/// Exit code for a library error: bad or unreadable input is an input error,
/// anything the filesystem refused while working is an execution error.
pub fn for_error(err: &NextMindError) -> i32 {
    match err {
        NextMindError::Io { .. } => EXECUTION_ERROR,
        NextMindError::NotFound { .. }
        | NextMindError::MetadataParse { .. }
        | NextMindError::Inference { .. }
        | NextMindError::TruncatedFile { .. }
        | NextMindError::InvalidFilterParams(_)
        | NextMindError::OversizedFile { .. } => INPUT_ERROR,
    }
}
