//! AES-ECB decryption for PAK index and entry payloads.
//!
//! PAK containers encrypt in 16-byte ECB blocks with no padding; the
//! key length (16/24/32 bytes) selects AES-128/192/256.

use aes::cipher::{BlockDecryptMut, KeyInit};
use ecb::Decryptor;

use crate::{Error, Result};

type Aes128EcbDec = Decryptor<aes::Aes128>;
type Aes192EcbDec = Decryptor<aes::Aes192>;
type Aes256EcbDec = Decryptor<aes::Aes256>;

/// Decrypt `data` in place using AES-ECB with `key`.
///
/// `data.len()` must be a multiple of 16; `key.len()` must be 16, 24,
/// or 32. No padding is added or removed.
pub fn decrypt_in_place(data: &mut [u8], key: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    if data.len() % 16 != 0 {
        return Err(Error::Decryption("ciphertext length not a multiple of 16".to_string()));
    }

    match key.len() {
        16 => decrypt_blocks::<Aes128EcbDec>(Aes128EcbDec::new(key.into()), data),
        24 => decrypt_blocks::<Aes192EcbDec>(Aes192EcbDec::new(key.into()), data),
        32 => decrypt_blocks::<Aes256EcbDec>(Aes256EcbDec::new(key.into()), data),
        n => Err(Error::Decryption(format!("invalid key length: {n}"))),
    }
}

fn decrypt_blocks<D: BlockDecryptMut>(decryptor: D, data: &mut [u8]) -> Result<()> {
    decryptor
        .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(data)
        .map_err(|e| Error::Decryption(e.to_string()))?;
    Ok(())
}

/// Decrypt `data` using AES-ECB with `key`, returning a new buffer.
pub fn decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = data.to_vec();
    decrypt_in_place(&mut buffer, key)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypt(data: &[u8], key: &[u8]) -> Vec<u8> {
        use aes::cipher::BlockEncryptMut;
        let mut buffer = data.to_vec();
        match key.len() {
            16 => {
                ecb::Encryptor::<aes::Aes128>::new(key.into())
                    .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer, data.len())
                    .unwrap();
            }
            32 => {
                ecb::Encryptor::<aes::Aes256>::new(key.into())
                    .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer, data.len())
                    .unwrap();
            }
            _ => panic!("unsupported test key length"),
        }
        buffer
    }

    #[test]
    fn roundtrips_with_256_bit_key() {
        let key = [0x11u8; 32];
        let plaintext = [0x42u8; 32];
        let ciphertext = encrypt(&plaintext, &key);
        let decrypted = decrypt(&ciphertext, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn roundtrips_with_128_bit_key() {
        let key = [0x99u8; 16];
        let plaintext = [0x07u8; 16];
        let ciphertext = encrypt(&plaintext, &key);
        let decrypted = decrypt(&ciphertext, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn rejects_misaligned_length() {
        let err = decrypt_in_place(&mut [0u8; 15], &[0u8; 16]).unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn rejects_bad_key_length() {
        let err = decrypt_in_place(&mut [0u8; 16], &[0u8; 20]).unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn empty_input_is_a_noop() {
        let mut data: [u8; 0] = [];
        assert!(decrypt_in_place(&mut data, &[0u8; 16]).is_ok());
    }
}
