//! AES-ECB decryption for IoStore directory indices and chunk blocks.
//!
//! Mirrors `pak-reader-pak::crypto`; kept as a small local copy rather
//! than a cross-crate dependency since both call sites are a few
//! lines of RustCrypto plumbing, not shared logic worth factoring out.

use aes::cipher::{BlockDecryptMut, KeyInit};
use ecb::Decryptor;

type Aes128EcbDec = Decryptor<aes::Aes128>;
type Aes192EcbDec = Decryptor<aes::Aes192>;
type Aes256EcbDec = Decryptor<aes::Aes256>;

pub fn decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>, String> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() % 16 != 0 {
        return Err("ciphertext length not a multiple of 16".to_string());
    }

    let mut buffer = data.to_vec();
    match key.len() {
        16 => Aes128EcbDec::new(key.into())
            .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer)
            .map_err(|e| e.to_string())?,
        24 => Aes192EcbDec::new(key.into())
            .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer)
            .map_err(|e| e.to_string())?,
        32 => Aes256EcbDec::new(key.into())
            .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer)
            .map_err(|e| e.to_string())?,
        n => return Err(format!("invalid key length: {n}")),
    };
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_misaligned_length() {
        assert!(decrypt(&[0u8; 15], &[0u8; 16]).is_err());
    }

    #[test]
    fn empty_input_is_a_noop() {
        assert_eq!(decrypt(&[], &[0u8; 16]).unwrap(), Vec::<u8>::new());
    }
}
