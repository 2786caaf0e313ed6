//! Bech32（BIP-173）校验和验证
//!
//! 只做地址真伪判定，不解析 witness 程序；校验失败一律返回 false。

/// 数据部分的 32 符号字符表
pub const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// polymod 生成多项式常量（BIP-173）
const GENERATORS: [u32; 5] = [0x3B6A_57B2, 0x2650_8E6D, 0x1EA1_19FA, 0x3D42_33DD, 0x2A14_62B3];

/// 默认允许的前缀：主网 bc、测试网 tb
pub const DEFAULT_HRPS: [&str; 2] = ["bc", "tb"];

/// 25 位状态的迭代 XOR/移位校验
fn polymod(values: impl IntoIterator<Item = u8>) -> u32 {
    let mut chk: u32 = 1;
    for v in values {
        let top = (chk >> 25) & 0xFF;
        chk = ((chk & 0x1FF_FFFF) << 5) ^ (v as u32);
        for (i, gen) in GENERATORS.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= *gen;
            }
        }
    }
    chk
}

/// hrp 展开：先输出各字符高 5 位，再一个 0 分隔符，再各字符低 5 位
fn hrp_expand(hrp: &str) -> Vec<u8> {
    let mut out: Vec<u8> = hrp.bytes().map(|c| c >> 5).collect();
    out.push(0);
    out.extend(hrp.bytes().map(|c| c & 31));
    out
}

/// 验证一个 Bech32 地址的校验和，前缀必须在 `allowed_hrps` 内
pub fn verify_bech32(address: &str, allowed_hrps: &[&str]) -> bool {
    let addr = address.trim().to_lowercase();
    if addr.bytes().any(|c| !(33..=126).contains(&c)) {
        return false;
    }
    let sep = match addr.rfind('1') {
        Some(pos) => pos,
        None => return false,
    };
    let (hrp, data) = (&addr[..sep], &addr[sep + 1..]);
    if !allowed_hrps.contains(&hrp) {
        return false;
    }
    let mut values = Vec::with_capacity(data.len());
    for ch in data.bytes() {
        match BECH32_CHARSET.iter().position(|&c| c == ch) {
            Some(v) => values.push(v as u8),
            None => return false,
        }
    }
    polymod(hrp_expand(hrp).into_iter().chain(values)) == 1
}
