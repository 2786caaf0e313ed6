//! 候选行打分：把各个验证器的输出合成一个可解释的怀疑度分值
//!
//! 权重是策略而不是物理常量：全部集中在 `ScoreWeights`，可由策略文件
//! 覆盖，便于运营方调灵敏度而不动扫描逻辑。

use regex::Regex;
use serde::Deserialize;

use crate::base58::{decode_base58_check, is_valid_wif, LEGACY_VERSIONS};
use crate::bech32::{verify_bech32, DEFAULT_HRPS};

/// 各类命中的加分权重（默认值沿用既有启发式）
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// 每个校验通过的 Bech32 地址
    pub bech32: u32,
    /// 每个校验通过的传统地址
    pub legacy: u32,
    /// 存在任意有效 WIF（一次性）
    pub wif: u32,
    /// 存在 0x + 64 位十六进制私钥形态（一次性）
    pub eth_hex: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { bech32: 4, legacy: 3, wif: 15, eth_hex: 10 }
    }
}

/// 单行打分器；正则只编译一次
pub struct CandidateScorer {
    weights: ScoreWeights,
    bech32_re: Regex,
    legacy_re: Regex,
    wif_re: Regex,
    eth_hex_re: Regex,
}

impl CandidateScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self {
            weights,
            bech32_re: Regex::new(r"(bc1[ac-hj-np-z02-9]{25,87}|tb1[ac-hj-np-z02-9]{25,87})")
                .expect("bech32 regex"),
            legacy_re: Regex::new(
                r"(?:^|[^A-Za-z0-9])([13][1-9A-HJ-NP-Za-km-z]{25,34})(?:[^A-Za-z0-9]|$)",
            )
            .expect("legacy regex"),
            wif_re: Regex::new(r"(5[HJK][1-9A-HJ-NP-Za-km-z]{49,51}|[KL][1-9A-HJ-NP-Za-km-z]{51,52})")
                .expect("wif regex"),
            eth_hex_re: Regex::new(r"\b0x[a-fA-F0-9]{64}\b").expect("eth hex regex"),
        }
    }

    /// 对一行文本独立运行全部检查，返回 (总分, 原因标签)
    /// 分值为 0 表示噪声，调用方不应生成 Hit
    pub fn score_line(&self, text: &str) -> (u32, Vec<String>) {
        let mut score = 0;
        let mut reasons = Vec::new();

        let good_bech = self
            .bech32_re
            .find_iter(text)
            .filter(|m| verify_bech32(m.as_str(), &DEFAULT_HRPS))
            .count();
        if good_bech > 0 {
            score += self.weights.bech32 * good_bech as u32;
            reasons.push(format!("{good_bech} bech32"));
        }

        let good_legacy = self
            .legacy_re
            .captures_iter(text)
            .filter(|caps| {
                let addr = &caps[1];
                matches!(decode_base58_check(addr),
                    Ok(payload) if matches!(payload.first(), Some(v) if LEGACY_VERSIONS.contains(v)))
            })
            .count();
        if good_legacy > 0 {
            score += self.weights.legacy * good_legacy as u32;
            reasons.push(format!("{good_legacy} legacy"));
        }

        if self.wif_re.find_iter(text).any(|m| is_valid_wif(m.as_str())) {
            score += self.weights.wif;
            reasons.push("valid WIF".to_string());
        }

        if self.eth_hex_re.is_match(text) {
            score += self.weights.eth_hex;
            reasons.push("eth priv hex".to_string());
        }

        (score, reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BECH32_ADDR: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    fn scorer() -> CandidateScorer {
        CandidateScorer::new(ScoreWeights::default())
    }

    #[test]
    fn one_valid_bech32_scores_four() {
        let (score, reasons) = scorer().score_line(&format!("found {BECH32_ADDR} in dump"));
        assert_eq!(score, 4);
        assert_eq!(reasons, vec!["1 bech32".to_string()]);
    }

    #[test]
    fn two_bech32_addresses_double_the_weight() {
        let (score, reasons) = scorer().score_line(&format!("{BECH32_ADDR} {BECH32_ADDR}"));
        assert_eq!(score, 8);
        assert_eq!(reasons, vec!["2 bech32".to_string()]);
    }

    #[test]
    fn legacy_address_scores_three() {
        let (score, reasons) = scorer().score_line("addr=1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa;");
        assert_eq!(score, 3);
        assert_eq!(reasons, vec!["1 legacy".to_string()]);
    }

    #[test]
    fn wif_is_flat_fifteen() {
        let line = "key 5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ here";
        let (score, reasons) = scorer().score_line(line);
        assert_eq!(score, 15);
        assert_eq!(reasons, vec!["valid WIF".to_string()]);
    }

    #[test]
    fn eth_hex_pattern_scores_ten() {
        let line = format!("privkey=0x{}", "ab".repeat(32));
        let (score, reasons) = scorer().score_line(&line);
        assert_eq!(score, 10);
        assert_eq!(reasons, vec!["eth priv hex".to_string()]);
    }

    #[test]
    fn noise_scores_zero() {
        assert_eq!(scorer().score_line("").0, 0);
        assert_eq!(scorer().score_line("nothing interesting here 12345").0, 0);
        // 形似 bech32 但校验失败
        assert_eq!(scorer().score_line("bc1qqqqqqqqqqqqqqqqqqqqqqqqqqqqq").0, 0);
    }

    #[test]
    fn weights_are_tunable() {
        let weights = ScoreWeights { bech32: 100, ..Default::default() };
        let (score, _) = CandidateScorer::new(weights).score_line(BECH32_ADDR);
        assert_eq!(score, 100);
    }
}
