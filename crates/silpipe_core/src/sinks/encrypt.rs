//! AES-128-CBC stream encryption for encrypted log files.
//!
//! The file layout is the `SILE` magic, a 16-byte IV in the clear, and
//! then the CBC/PKCS#7 ciphertext of the packet stream. A fresh random
//! IV is generated each time a file is opened.

use crate::error::{CoreError, CoreResult};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use std::io::Write;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-128 key size in bytes.
pub const KEY_SIZE: usize = 16;
/// CBC initialization vector size in bytes.
pub const IV_SIZE: usize = 16;

const BLOCK: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// AES-128 key material, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Derives a key from the configured key string: the UTF-8 bytes
    /// truncated or zero-padded to 16 bytes.
    pub fn from_option(key: &str) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        let raw = key.as_bytes();
        let n = raw.len().min(KEY_SIZE);
        bytes[..n].copy_from_slice(&raw[..n]);
        Self { bytes }
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generates a random initialization vector.
pub fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// A writer adapter that CBC-encrypts everything written through it.
///
/// Partial blocks are held back until enough plaintext arrives;
/// [`EncryptStream::finish`] applies PKCS#7 padding and must be called
/// exactly once before the underlying writer is closed.
pub struct EncryptStream<W: Write> {
    writer: W,
    cipher: Aes128CbcEnc,
    pending: Vec<u8>,
}

impl<W: Write> EncryptStream<W> {
    /// Starts an encrypting stream over `writer`. The caller writes
    /// the magic and IV in the clear before constructing this.
    pub fn new(writer: W, key: &EncryptionKey, iv: &[u8; IV_SIZE]) -> Self {
        Self {
            writer,
            cipher: Aes128CbcEnc::new(key.as_bytes().into(), iv.into()),
            pending: Vec::with_capacity(BLOCK),
        }
    }

    /// Encrypts and writes `data`, buffering any trailing partial
    /// block.
    pub fn write_all(&mut self, data: &[u8]) -> CoreResult<()> {
        self.pending.extend_from_slice(data);
        let full = self.pending.len() - self.pending.len() % BLOCK;
        if full == 0 {
            return Ok(());
        }
        let mut blocks: Vec<u8> = self.pending.drain(..full).collect();
        for chunk in blocks.chunks_exact_mut(BLOCK) {
            self.cipher
                .encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        self.writer.write_all(&blocks)?;
        Ok(())
    }

    /// Flushes the underlying writer. The pending partial block stays
    /// buffered; only `finish` can emit it.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Pads, encrypts and writes the final block, flushes, and
    /// returns the underlying writer.
    pub fn finish(mut self) -> CoreResult<W> {
        let pad = BLOCK - self.pending.len() % BLOCK;
        let mut last = std::mem::take(&mut self.pending);
        last.resize(last.len() + pad, pad as u8);
        for chunk in last.chunks_exact_mut(BLOCK) {
            self.cipher
                .encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        self.writer.write_all(&last)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Decrypts a complete CBC/PKCS#7 ciphertext. Used by tests and by
/// tooling reading encrypted log files back.
pub fn decrypt(key: &EncryptionKey, iv: &[u8; IV_SIZE], ciphertext: &[u8]) -> CoreResult<Vec<u8>> {
    let mut buffer = ciphertext.to_vec();
    let cipher = Aes128CbcDec::new(key.as_bytes().into(), iv.into());
    let plain = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| CoreError::write("ciphertext has invalid length or padding"))?;
    Ok(plain.to_vec())
}
