/// Size of the buffer used when streaming uploads to disk and when comparing files.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Suffix given to every staging file.
pub const TEMP_SUFFIX: &str = ".tmp";
