//! 语言检测模块
//!
//! 优先使用 whatlang 识别，结果不可靠或不在支持集合内时退回到按文字区块计数。
//! 检测永远不会失败，总会给出一个最佳猜测。

use std::sync::OnceLock;

use whatlang::{Detector, Lang};

/// 语言代码，例如 `en`、`zh-CN`
pub type LanguageCode = String;

/// 支持的规范语言集合
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "zh-CN", "ja", "ko", "fr", "de", "es", "ru", "it", "pt"];

// 文字区块阈值
const KANA_THRESHOLD: f64 = 0.1;
const HANGUL_THRESHOLD: f64 = 0.1;
const IDEOGRAPH_THRESHOLD: f64 = 0.3;

/// 进程级的 whatlang 识别器，首次使用时初始化
fn native_detector() -> &'static Detector {
    static DETECTOR: OnceLock<Detector> = OnceLock::new();
    DETECTOR.get_or_init(|| {
        tracing::debug!("初始化语言识别器");
        Detector::with_allowlist(vec![
            Lang::Eng,
            Lang::Cmn,
            Lang::Jpn,
            Lang::Kor,
            Lang::Fra,
            Lang::Deu,
            Lang::Spa,
            Lang::Rus,
            Lang::Ita,
            Lang::Por,
        ])
    })
}

fn lang_to_code(lang: Lang) -> Option<&'static str> {
    match lang {
        Lang::Eng => Some("en"),
        Lang::Cmn => Some("zh-CN"),
        Lang::Jpn => Some("ja"),
        Lang::Kor => Some("ko"),
        Lang::Fra => Some("fr"),
        Lang::Deu => Some("de"),
        Lang::Spa => Some("es"),
        Lang::Rus => Some("ru"),
        Lang::Ita => Some("it"),
        Lang::Por => Some("pt"),
        _ => None,
    }
}

/// 语言检测器
#[derive(Debug, Clone, Copy)]
pub struct LanguageDetector {
    use_native: bool,
}

impl LanguageDetector {
    /// 使用 whatlang 识别并带文字计数回退
    pub fn new() -> Self {
        Self { use_native: true }
    }

    /// 只使用文字区块计数
    pub fn script_only() -> Self {
        Self { use_native: false }
    }

    /// 检测文本语言
    pub fn detect(&self, text: &str) -> LanguageCode {
        if self.use_native {
            if let Some(code) = Self::detect_native(text) {
                return code.to_string();
            }
        }
        detect_by_script(text).to_string()
    }

    fn detect_native(text: &str) -> Option<&'static str> {
        let info = native_detector().detect(text)?;
        if !info.is_reliable() {
            tracing::debug!("whatlang 结果不可靠: {:?} ({:.2})", info.lang(), info.confidence());
            return None;
        }
        lang_to_code(info.lang())
    }
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_ideograph(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}' | '\u{f900}'..='\u{faff}')
}

pub fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309f}' | '\u{30a0}'..='\u{30ff}')
}

pub fn is_hangul(c: char) -> bool {
    matches!(c, '\u{ac00}'..='\u{d7af}' | '\u{1100}'..='\u{11ff}' | '\u{3130}'..='\u{318f}')
}

/// 按文字区块计数判断语言
pub fn detect_by_script(text: &str) -> &'static str {
    let mut total = 0usize;
    let mut kana = 0usize;
    let mut hangul = 0usize;
    let mut ideographs = 0usize;

    for c in text.chars().filter(|c| c.is_alphabetic()) {
        total += 1;
        if is_kana(c) {
            kana += 1;
        } else if is_hangul(c) {
            hangul += 1;
        } else if is_ideograph(c) {
            ideographs += 1;
        }
    }

    if total == 0 {
        return "en";
    }

    let ratio = |count: usize| count as f64 / total as f64;

    if ratio(kana) > KANA_THRESHOLD {
        "ja"
    } else if ratio(hangul) > HANGUL_THRESHOLD {
        "ko"
    } else if ratio(ideographs) > IDEOGRAPH_THRESHOLD {
        "zh-CN"
    } else {
        "en"
    }
}

/// 语言是否使用汉字分词
pub fn is_cjk_language(lang: &str) -> bool {
    lang.starts_with("zh")
}
