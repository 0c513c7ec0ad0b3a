//! Decryption of the object store credentials kept in organization records.
//!
//! Credentials are stored hex encoded, AES-256-CBC encrypted with the SHA-256
//! of `CIPHER_KEY` as key and the first 16 bytes of the SHA-256 of
//! `CIPHER_IV_KEY` as IV.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};

use crate::error::{DocumentError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; 32],
    iv: [u8; 16],
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCipher(..)")
    }
}

impl CredentialCipher {
    pub fn new(cipher_key: &str, cipher_iv_key: &str) -> Self {
        let mut key = [0u8; 32];
        key.copy_from_slice(&Sha256::digest(cipher_key.as_bytes()));
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&Sha256::digest(cipher_iv_key.as_bytes())[..16]);
        Self { key, iv }
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        let data = hex::decode(encrypted.trim())
            .map_err(|e| DocumentError::Config(format!("credential is not hex encoded: {}", e)))?;
        let plain = Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&data)
            .map_err(|_| DocumentError::Config("cannot decrypt credential".to_string()))?;
        String::from_utf8(plain)
            .map_err(|_| DocumentError::Config("decrypted credential is not UTF-8".to_string()))
    }

    pub fn encrypt(&self, text: &str) -> String {
        let data = Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(text.as_bytes());
        hex::encode(data)
    }
}
