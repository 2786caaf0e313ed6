//! Base58Check 解码与派生校验（WIF / 传统地址）
//!
//! 语义要点：
//! - Base58 的数值是任意精度大整数（常见地址超过 64 位），这里用字节向量
//!   做基数转换，避免溢出。
//! - 校验和为 `SHA256(SHA256(payload))` 前 4 字节，逐字节精确比较。
//! - 解码失败只作为"非法地址"的布尔结果向上传递，绝不触发致命错误。

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Base58 字母表（不含 0、O、I、l）
pub const B58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// WIF 版本字节：主网 0x80，测试网 0xEF
pub const WIF_VERSIONS: [u8; 2] = [0x80, 0xEF];
/// 传统地址版本字节：P2PKH(0x00)、P2SH(0x05)、测试网(0x6F)
pub const LEGACY_VERSIONS: [u8; 3] = [0x00, 0x05, 0x6F];

/// Base58Check 解码错误（仅在本模块内部区分原因，外部多以 bool 消费）
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid base58 character")]
    BadCharacter,
    #[error("decoded data shorter than checksum")]
    TooShort,
    #[error("checksum mismatch")]
    BadChecksum,
}

/// Base58Check 解码：返回去掉 4 字节校验和后的载荷
pub fn decode_base58_check(s: &str) -> Result<Vec<u8>, DecodeError> {
    // 大端字节向量表示的大整数，逐字符做 num = num * 58 + digit
    let mut num: Vec<u8> = Vec::new();
    for ch in s.bytes() {
        let digit = B58_ALPHABET
            .iter()
            .position(|&a| a == ch)
            .ok_or(DecodeError::BadCharacter)? as u32;
        let mut carry = digit;
        for b in num.iter_mut().rev() {
            let v = (*b as u32) * 58 + carry;
            *b = (v & 0xFF) as u8;
            carry = v >> 8;
        }
        while carry > 0 {
            num.insert(0, (carry & 0xFF) as u8);
            carry >>= 8;
        }
    }
    // 前导 '1' 代表数值 0，大整数表示会丢失它们；这里按 Base58Check
    // 约定补回前导零字节，否则 0x00 版本（P2PKH）地址校验必然失败
    let leading = s.bytes().take_while(|&c| c == b'1').count();
    let mut full = vec![0u8; leading];
    full.append(&mut num);
    let num = full;
    if num.len() < 4 {
        return Err(DecodeError::TooShort);
    }
    let (payload, checksum) = num.split_at(num.len() - 4);
    let digest = Sha256::digest(Sha256::digest(payload));
    if &digest[..4] != checksum {
        return Err(DecodeError::BadChecksum);
    }
    Ok(payload.to_vec())
}

/// WIF 判定：解码成功 + 版本字节 0x80/0xEF + 载荷长 33 或 34（34 表示带压缩后缀）
pub fn is_valid_wif(candidate: &str) -> bool {
    match decode_base58_check(candidate) {
        Ok(payload) => {
            matches!(payload.first(), Some(v) if WIF_VERSIONS.contains(v))
                && matches!(payload.len(), 33 | 34)
        }
        Err(_) => false,
    }
}

/// 传统地址判定：解码成功 + 版本字节属于 P2PKH/P2SH 主网或测试网
pub fn is_valid_legacy_address(candidate: &str) -> bool {
    match decode_base58_check(candidate) {
        Ok(payload) => matches!(payload.first(), Some(v) if LEGACY_VERSIONS.contains(v)),
        Err(_) => false,
    }
}

#[cfg(test)]
pub(crate) fn encode_base58_check(payload: &[u8]) -> String {
    // 仅测试用的编码端：payload + SHA256d 前 4 字节，再做基数转换
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut full = payload.to_vec();
    full.extend_from_slice(&digest[..4]);

    let mut digits: Vec<u8> = Vec::new(); // 基数 58 的"数位"，大端
    for &byte in &full {
        let mut carry = byte as u32;
        for d in digits.iter_mut().rev() {
            let v = ((*d as u32) << 8) + carry;
            *d = (v % 58) as u8;
            carry = v / 58;
        }
        while carry > 0 {
            digits.insert(0, (carry % 58) as u8);
            carry /= 58;
        }
    }
    for &byte in &full {
        if byte == 0 {
            digits.insert(0, 0);
        } else {
            break;
        }
    }
    digits.iter().map(|&d| B58_ALPHABET[d as usize] as char).collect()
}
