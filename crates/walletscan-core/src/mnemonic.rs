//! 助记词检测：词表成员的连续片段匹配
//!
//! 设计要点：
//! - 词表必须是完整的 BIP-39 英文 2048 词（来自 `bip39` crate 的内置表）。
//!   早期原型里用截断词表会直接造成漏检。
//! - 非词表 token（长度 ≥ 3 的字母串）会打断连续片段；只有同一片段内的
//!   连续窗口才可能构成候选短语。
//! - 长度按 24→21→18→15→12 从长到短检查：包含 24 词短语的文本不应被
//!   报成它的 12 词子串。

use std::collections::HashSet;

use bip39::Language;
use regex::Regex;

/// 按偏好顺序排列的规范短语长度（从长到短）
pub const PHRASE_LENGTHS: [usize; 5] = [24, 21, 18, 15, 12];

/// 助记词检测器；构造一次、整个流水线共享
pub struct MnemonicDetector {
    wordlist: HashSet<&'static str>,
    token_re: Regex,
}

impl Default for MnemonicDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MnemonicDetector {
    pub fn new() -> Self {
        let wordlist: HashSet<&'static str> =
            Language::English.word_list().iter().copied().collect();
        debug_assert_eq!(wordlist.len(), 2048);
        Self {
            wordlist,
            token_re: Regex::new(r"[a-z]{3,}").expect("token regex"),
        }
    }

    /// 在自由文本中找第一个规范长度的候选短语；返回空格拼接的短语
    pub fn detect(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        // 先切出词表成员的连续片段（run），非词表 token 作为断点
        let mut runs: Vec<Vec<&str>> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for m in self.token_re.find_iter(&lowered) {
            let token = m.as_str();
            if self.wordlist.contains(token) {
                current.push(token);
            } else if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }

        for size in PHRASE_LENGTHS {
            for run in &runs {
                if run.len() >= size {
                    return Some(run[..size].join(" "));
                }
            }
        }
        None
    }
}
