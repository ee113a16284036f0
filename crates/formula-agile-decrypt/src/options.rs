/// Resource limits applied while parsing descriptors and verifying passwords.
///
/// Encrypted documents are untrusted input: the spin count alone decides how much CPU a password
/// check costs, so it is capped before any hashing starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptOptions {
    /// Largest accepted `spinCount`. Office writes 100 000.
    pub max_spin_count: u32,
    /// Largest accepted `EncryptionInfo` stream, in bytes.
    pub max_encryption_info_len: usize,
    /// Largest accepted base64 attribute value, in bytes of encoded text.
    pub max_field_len: usize,
}

pub const DEFAULT_MAX_SPIN_COUNT: u32 = 10_000_000;
pub const DEFAULT_MAX_ENCRYPTION_INFO_LEN: usize = 1024 * 1024;
pub const DEFAULT_MAX_FIELD_LEN: usize = 64 * 1024;

impl Default for DecryptOptions {
    fn default() -> Self {
        Self {
            max_spin_count: DEFAULT_MAX_SPIN_COUNT,
            max_encryption_info_len: DEFAULT_MAX_ENCRYPTION_INFO_LEN,
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }
}
