//! Streaming decryption of the `EncryptedPackage` segments.
//!
//! After the 8-byte plaintext length, the stream holds the package in 4096-byte plaintext
//! segments. Segment `i` is encrypted on its own with
//! `IV = resize(Hash(keySalt || LE32(i)), blockSize)`. The last segment is padded to a whole
//! number of blocks with arbitrary bytes that never reach the caller.

use std::fmt;
use std::io::{self, Read};

use zeroize::{Zeroize, Zeroizing};

use crate::cipher::{CbcDecryptor, CipherAlgorithm, SegmentPadding};
use crate::crypto::{generate_iv, next_block_size, segment_block_key, HashAlgorithm};
use crate::error::{AgileDecryptError, Result};

/// Plaintext bytes per `EncryptedPackage` segment.
pub const SEGMENT_SIZE: usize = 0x1000;

/// Everything needed to decrypt any segment of one package.
pub(crate) struct SegmentKey {
    pub(crate) content_key: Zeroizing<Vec<u8>>,
    pub(crate) key_salt: Vec<u8>,
    pub(crate) hash_algorithm: HashAlgorithm,
    pub(crate) cipher_algorithm: CipherAlgorithm,
    pub(crate) block_size: usize,
}

impl fmt::Debug for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentKey")
            .field("content_key_len", &self.content_key.len())
            .field("key_salt_len", &self.key_salt.len())
            .field("hash_algorithm", &self.hash_algorithm)
            .field("cipher_algorithm", &self.cipher_algorithm)
            .field("block_size", &self.block_size)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// No segment has been requested yet.
    Uninitialized,
    /// The next segment to decrypt is a full, unpadded one or the final one.
    Streaming { next_segment: u32 },
    /// The buffered segment is the last one.
    FinalSegment,
    Exhausted,
    /// A previous read failed; the reader yields nothing further.
    Failed { segment: u32 },
}

/// `Read` adapter yielding the decrypted package, one segment at a time.
///
/// The underlying reader must be positioned right after the 8-byte size prefix. Reads never yield
/// more than the declared plaintext length and never consume ciphertext past the final segment.
pub struct ChunkedCipherReader<R> {
    inner: R,
    key: SegmentKey,
    plaintext_len: u64,
    decrypted_len: u64,
    state: ReaderState,
    segment: Vec<u8>,
    segment_pos: usize,
    segment_len: usize,
}

impl<R> ChunkedCipherReader<R> {
    pub(crate) fn new(inner: R, key: SegmentKey, plaintext_len: u64) -> Self {
        Self {
            inner,
            key,
            plaintext_len,
            decrypted_len: 0,
            state: ReaderState::Uninitialized,
            segment: Vec::new(),
            segment_pos: 0,
            segment_len: 0,
        }
    }

    /// Declared plaintext length from the `EncryptedPackage` size prefix.
    pub fn plaintext_len(&self) -> u64 {
        self.plaintext_len
    }

    /// Plaintext bytes handed to the caller so far.
    pub fn position(&self) -> u64 {
        let buffered = (self.segment_len - self.segment_pos) as u64;
        self.decrypted_len - buffered
    }

    /// Whether every declared byte has been read.
    pub fn is_exhausted(&self) -> bool {
        self.state == ReaderState::Exhausted
    }

    fn wipe_segment(&mut self) {
        zeroize_vec_full(&mut self.segment);
        self.segment_pos = 0;
        self.segment_len = 0;
    }
}

impl<R: Read> ChunkedCipherReader<R> {
    /// Decrypt the next segment into the buffer. Returns `false` at end of stream.
    fn load_next_segment(&mut self) -> Result<bool> {
        let index = match self.state {
            ReaderState::Uninitialized => {
                log::debug!(
                    "decrypting EncryptedPackage: {} bytes in {} segment(s)",
                    self.plaintext_len,
                    self.plaintext_len.div_ceil(SEGMENT_SIZE as u64)
                );
                0
            }
            ReaderState::Streaming { next_segment } => next_segment,
            ReaderState::FinalSegment | ReaderState::Exhausted => {
                self.wipe_segment();
                self.state = ReaderState::Exhausted;
                return Ok(false);
            }
            ReaderState::Failed { segment } => {
                return Err(AgileDecryptError::DecryptionFailed {
                    segment,
                    reason: "an earlier read of this stream failed".to_string(),
                })
            }
        };

        let remaining = self.plaintext_len - self.decrypted_len;
        if remaining == 0 {
            self.wipe_segment();
            self.state = ReaderState::Exhausted;
            return Ok(false);
        }

        let is_final = remaining <= SEGMENT_SIZE as u64;
        let (plain_len, padding) = if is_final {
            let plain_len = remaining as usize;
            (plain_len, SegmentPadding::Trailing { plaintext_len: plain_len })
        } else {
            (SEGMENT_SIZE, SegmentPadding::None)
        };
        let cipher_len = next_block_size(plain_len, self.key.block_size)?;

        self.wipe_segment();
        self.segment.resize(cipher_len, 0);
        let read = read_up_to(&mut self.inner, &mut self.segment)?;
        if read < cipher_len {
            return Err(AgileDecryptError::DecryptionFailed {
                segment: index,
                reason: format!(
                    "expected {cipher_len} ciphertext bytes, stream ended after {read}"
                ),
            });
        }

        let iv = generate_iv(
            self.key.hash_algorithm,
            &self.key.key_salt,
            Some(&segment_block_key(index)),
            self.key.block_size,
        )?;
        let kept = CbcDecryptor::new(self.key.cipher_algorithm, &self.key.content_key, &iv)
            .and_then(|cipher| cipher.decrypt(&mut self.segment, padding))
            .map_err(|err| AgileDecryptError::DecryptionFailed {
                segment: index,
                reason: err.to_string(),
            })?;

        log::trace!(
            "decrypted EncryptedPackage segment {index}: {cipher_len} ciphertext bytes, {kept} plaintext bytes{}",
            if is_final { " (final)" } else { "" }
        );

        self.segment_pos = 0;
        self.segment_len = kept;
        self.decrypted_len += kept as u64;
        self.state = if is_final {
            ReaderState::FinalSegment
        } else {
            let next_segment =
                index
                    .checked_add(1)
                    .ok_or_else(|| AgileDecryptError::DecryptionFailed {
                        segment: index,
                        reason: "segment index exceeds u32".to_string(),
                    })?;
            ReaderState::Streaming { next_segment }
        };
        Ok(true)
    }

    fn failure_segment(&self) -> u32 {
        match self.state {
            ReaderState::Streaming { next_segment } => next_segment,
            ReaderState::Failed { segment } => segment,
            _ => 0,
        }
    }
}

impl<R: Read> Read for ChunkedCipherReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let available = self.segment_len - self.segment_pos;
            if available > 0 {
                let take = available.min(buf.len());
                buf[..take]
                    .copy_from_slice(&self.segment[self.segment_pos..self.segment_pos + take]);
                self.segment_pos += take;
                return Ok(take);
            }

            match self.load_next_segment() {
                Ok(true) => continue,
                Ok(false) => return Ok(0),
                Err(err) => {
                    let segment = self.failure_segment();
                    self.wipe_segment();
                    self.state = ReaderState::Failed { segment };
                    return Err(err.into_io());
                }
            }
        }
    }
}

impl<R> Drop for ChunkedCipherReader<R> {
    fn drop(&mut self) {
        zeroize_vec_full(&mut self.segment);
    }
}

impl<R> fmt::Debug for ChunkedCipherReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedCipherReader")
            .field("key", &self.key)
            .field("plaintext_len", &self.plaintext_len)
            .field("decrypted_len", &self.decrypted_len)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
pub(crate) fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(AgileDecryptError::Io {
                    context: "reading EncryptedPackage ciphertext",
                    source,
                })
            }
        }
    }
    Ok(filled)
}

/// Zero the initialized bytes and the spare capacity, leaving the vector empty.
fn zeroize_vec_full(buf: &mut Vec<u8>) {
    buf.zeroize();
    for slot in buf.spare_capacity_mut() {
        slot.write(0);
    }
}
