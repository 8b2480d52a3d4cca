//! 章节正文解密 (AES-128-CBC, PKCS7, key == iv)
//!
//! 密钥以 16 个字符码的数组形式藏在站点主程序脚本中，按逆序拼接。

use std::sync::OnceLock;

use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::interfaces::Fetcher;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("key must be 16 bytes")]
    KeyLength,

    #[error("bad padding")]
    Padding,
}

fn key_codes_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+(?:,\s*\d+){15})\]").unwrap())
}

/// 从脚本源码中提取密钥
pub fn extract_key(script: &str) -> Option<String> {
    let codes = key_codes_pattern().captures(script)?.get(1)?.as_str();

    let key: Option<String> = codes
        .split(',')
        .map(|code| code.trim().parse::<u32>().ok().and_then(char::from_u32))
        .collect();

    key.map(|k| k.chars().rev().collect())
}

/// 解密 base64 密文
pub fn decrypt(cipher_text: &str, key: &str) -> Result<String, CipherError> {
    if cipher_text.is_empty() {
        return Ok(String::new());
    }

    let bytes = STANDARD.decode(cipher_text.trim())?;
    let key = key.as_bytes();
    let decryptor = Aes128CbcDec::new_from_slices(key, key).map_err(|_| CipherError::KeyLength)?;
    let plain = decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
        .map_err(|_| CipherError::Padding)?;

    Ok(String::from_utf8_lossy(&plain).into_owned())
}

/// 解密失败时返回空串，章节仍会落库
pub fn decrypt_or_empty(cipher_text: &str, key: &str) -> String {
    decrypt(cipher_text, key).unwrap_or_else(|e| {
        warn!("章节正文解密失败: {}", e);
        String::new()
    })
}

/// 拉取主程序脚本并提取密钥
///
/// 传输错误原样返回以便重试；脚本为空或不含密钥数组时返回 `None`。
pub async fn recover_key(
    fetcher: &dyn Fetcher,
    bundle_url: &str,
) -> crate::core::error::Result<Option<String>> {
    info!("拉取主程序脚本以提取密钥: {}", bundle_url);

    let script = fetcher.get_text(bundle_url).await.inspect_err(|e| {
        warn!("主程序脚本获取失败: {}", e);
    })?;

    let key = extract_key(&script);
    if key.is_none() {
        warn!("主程序脚本中未找到密钥数组");
    }
    Ok(key)
}
