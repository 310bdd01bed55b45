//! Deterministic clean-up of recognized text.
//!
//! The steps run in a fixed order and each one assumes the previous ones have
//! run: digit repair needs the script fixes, suffix repair needs collapsed
//! whitespace, and the currency, IBAN and ID passes need normalized
//! punctuation. Running the pipeline twice over well-formed banking text gives
//! the same result as running it once.

use std::sync::OnceLock;

use regex::{Captures, NoExpand, Regex};
use stp_core::LocaleSettings;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_dotted_capital, r"\bl\.(\p{Lu})");
re!(re_long_numeric_run, r"\b[0-9OoIlSBGE\s]{15,25}\b");
re!(re_date_letter_o, r"\bO([0-9])\b");
re!(re_horizontal_space, r"[^\S\n]+");
re!(re_line_breaks, r"\s*\n\s*");
re!(re_disallowed, r#"[^\w\s.,;:!?(){}\[\]"'₺$€/\-@%&]"#);
re!(re_repeated_periods, r"\.(?:[^\S\n]*\.)+");
re!(re_split_as, r"\bA\s*\.\s*Ş\s*\.");
re!(re_split_ltd_sti, r"\bLtd\s*\.\s*Şti\s*\.");
re!(
    re_national_id,
    r"(?i)(\b(?:tckn|t\.\s?c\.\s?kimlik\s+no|kimlik\s+no|t\.\s?c\.\s?no|tc\s+no)\s*[:.]?\s*)([0-9](?:[ \t]?[0-9]){10})\b"
);

/// Characters recognition engines commonly emit in place of letters of the
/// home script.
const SCRIPT_CONFUSIONS: &[(char, char)] = &[('|', 'I'), ('¢', 'ç'), ('§', 'ş')];

/// Case-insensitive, word-bounded. A trailing period is consumed so the
/// canonical spelling's own period is not doubled.
const COMPANY_SUFFIXES: &[(&str, &str)] = &[
    (r"(?i)\b(?:AJŞ|AŞ)\b\.?", "A.Ş."),
    (r"(?i)\bLTD\b\.?", "Ltd."),
    (r"(?i)\b(?:ŞTİ|STI|ŞTI)\b\.?", "Şti."),
    (r"(?i)\bLİMİTED\b", "Limited"),
    (r"(?i)\bKOLLEKTIF\b\.?", "Koll."),
    (r"(?i)\bKOMANDIT\b\.?", "Kom."),
    (r"(?i)\bANONIM\b", "Anonim"),
];

const DOMAIN_PHRASES: &[(&str, &str)] = &[
    ("IBAN nolu", "IBAN numaralı"),
    ("nolu hesab", "numaralı hesab"),
];

const SENTENCE_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];
const CLOSING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '"', '\''];

fn company_suffixes() -> &'static [(Regex, &'static str)] {
    static TABLE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        COMPANY_SUFFIXES
            .iter()
            .map(|(pat, canonical)| (Regex::new(pat).expect("invalid regex"), *canonical))
            .collect()
    })
}

fn domain_phrases() -> &'static [(Regex, &'static str)] {
    static TABLE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        DOMAIN_PHRASES
            .iter()
            .map(|(from, to)| {
                let pat = format!("(?i){}", regex::escape(from));
                (Regex::new(&pat).expect("invalid regex"), *to)
            })
            .collect()
    })
}

// ── Normalizer ───────────────────────────────────────────────────────────────

pub struct TextNormalizer {
    iban_confusable: Regex,
    iban: Regex,
    currency_synonyms: Option<Regex>,
    amount: Regex,
    currency: String,
    country_len: usize,
}

impl TextNormalizer {
    /// Patterns that depend on the home country are compiled here.
    pub fn new(locale: &LocaleSettings) -> Result<Self, regex::Error> {
        let country = regex::escape(&locale.home_country);
        let iban_confusable = Regex::new(&format!(
            r"\b{country}{}\b",
            iban_body(locale.iban_length, "[0-9OoIlSBGE]")
        ))?;
        let iban = Regex::new(&format!(
            r"\b{country}(?:[ \t]*[0-9]){{{}}}\b",
            locale.iban_length.saturating_sub(2)
        ))?;

        let synonyms: Vec<String> = locale
            .currency_synonyms
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| bounded(s))
            .collect();
        let currency_synonyms = if synonyms.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?:{})", synonyms.join("|")))?)
        };

        let mut words = vec!["USD".to_string(), "EUR".to_string()];
        let mut symbols = vec![regex::escape("$"), regex::escape("€")];
        if is_word(&locale.currency) {
            words.insert(0, regex::escape(&locale.currency));
        } else {
            symbols.insert(0, regex::escape(&locale.currency));
        }
        let amount = Regex::new(&format!(
            r"\b([0-9]+(?:[ \t]*[.,][ \t]*[0-9]+|[ \t]+[0-9]{{3}}\b)*)[ \t]*(?:({})\b|({}))",
            words.join("|"),
            symbols.join("|")
        ))?;

        Ok(Self {
            iban_confusable,
            iban,
            currency_synonyms,
            amount,
            currency: locale.currency.clone(),
            country_len: locale.home_country.len(),
        })
    }

    pub fn normalize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let text = fix_script(text);
        let text = self.fix_digits(&text);
        let text = collapse_whitespace(&text);
        let text = fix_company_suffixes(&text);
        let text = fix_domain_phrases(&text);
        let text = normalize_punctuation(&text);
        let text = self.normalize_currency(&text);
        let text = self.format_ibans(&text);
        let text = join_national_ids(&text);
        let text = collapse_whitespace(&text);
        tracing::debug!(len = text.len(), "text normalized");
        text
    }

    /// Letter/digit repair, only inside IBAN-shaped spans and long numeric runs.
    fn fix_digits(&self, text: &str) -> String {
        let text = self.iban_confusable.replace_all(text, |caps: &Captures| {
            let m = &caps[0];
            let (cc, rest) = m.split_at(self.country_len.min(m.len()));
            format!("{cc}{}", map_confusables(rest))
        });
        let text = re_long_numeric_run().replace_all(&text, |caps: &Captures| {
            caps[0]
                .split_inclusive(char::is_whitespace)
                .map(|token| {
                    if token.chars().any(|c| c.is_ascii_digit()) {
                        map_confusables(token)
                    } else {
                        token.to_string()
                    }
                })
                .collect::<String>()
        });
        re_date_letter_o().replace_all(&text, "0$1").into_owned()
    }

    fn normalize_currency(&self, text: &str) -> String {
        let text = match &self.currency_synonyms {
            Some(re) => re.replace_all(text, NoExpand(&self.currency)).into_owned(),
            None => text.to_string(),
        };
        self.amount
            .replace_all(&text, |caps: &Captures| {
                let symbol = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                format!("{} {symbol}", format_amount(&caps[1]))
            })
            .into_owned()
    }

    fn format_ibans(&self, text: &str) -> String {
        self.iban
            .replace_all(text, |caps: &Captures| {
                let compact: Vec<char> = caps[0].chars().filter(|c| !c.is_whitespace()).collect();
                compact
                    .chunks(4)
                    .map(|chunk| chunk.iter().collect::<String>())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .into_owned()
    }
}

/// Check digits plus BBAN for an IBAN of `len` characters, with optional
/// whitespace between 4-character groups. Letter confusions are only repaired
/// on this regular layout so that neighbouring words are never absorbed.
fn iban_body(len: usize, class: &str) -> String {
    let rest = len.saturating_sub(4);
    let mut body = format!("{class}{{2}}");
    for _ in 0..rest / 4 {
        body.push_str(&format!(r"\s*{class}{{4}}"));
    }
    if rest % 4 > 0 {
        body.push_str(&format!(r"\s*{class}{{{}}}", rest % 4));
    }
    body
}

fn is_word(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphanumeric)
}

fn bounded(token: &str) -> String {
    if is_word(token) {
        format!(r"\b{}\b", regex::escape(token))
    } else {
        regex::escape(token)
    }
}

fn map_confusables(span: &str) -> String {
    span.chars()
        .map(|c| match c {
            'O' | 'o' => '0',
            'I' | 'l' => '1',
            'S' => '5',
            'B' | 'E' => '8',
            'G' => '6',
            other => other,
        })
        .collect()
}

fn fix_script(text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| {
            SCRIPT_CONFUSIONS
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        })
        .collect();
    re_dotted_capital().replace_all(&text, "İ$1").into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    let text = re_horizontal_space().replace_all(text, " ");
    let text = re_line_breaks().replace_all(&text, "\n");
    text.trim().to_string()
}

fn fix_company_suffixes(text: &str) -> String {
    company_suffixes()
        .iter()
        .fold(text.to_string(), |acc, (re, canonical)| {
            re.replace_all(&acc, *canonical).into_owned()
        })
}

fn fix_domain_phrases(text: &str) -> String {
    domain_phrases()
        .iter()
        .fold(text.to_string(), |acc, (re, canonical)| {
            re.replace_all(&acc, *canonical).into_owned()
        })
}

fn normalize_punctuation(text: &str) -> String {
    let text = re_disallowed().replace_all(text, "");
    let text = re_repeated_periods().replace_all(&text, ".");
    let text = re_split_as().replace_all(&text, "A.Ş.");
    let text = re_split_ltd_sti().replace_all(&text, "Ltd. Şti.");
    space_after_punctuation(&text)
}

/// One space after sentence punctuation, none before it. Separators inside
/// numbers (`1.500,00`, `15.03.2024`, `10:30`) and dotted abbreviations
/// (`A.Ş.`, `T.C.`) are left alone.
fn space_after_punctuation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if !SENTENCE_PUNCTUATION.contains(&c) {
            out.push(c);
            i += 1;
            continue;
        }

        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let inside_token = match (prev, next) {
            (Some(p), Some(n)) if p.is_ascii_digit() && n.is_ascii_digit() => true,
            // `A.Ş`, `T.C`, `banka.com`; but not `dünya.Yarın`
            (Some(p), Some(n)) if c == '.' && p.is_alphabetic() && n.is_alphabetic() => {
                let single_letter = i < 2 || !chars[i - 2].is_alphabetic();
                single_letter || n.is_lowercase()
            }
            _ => false,
        };
        if inside_token {
            out.push(c);
            i += 1;
            continue;
        }

        while out.ends_with([' ', '\t']) {
            out.pop();
        }
        out.push(c);
        i += 1;
        while i < chars.len() && matches!(chars[i], ' ' | '\t') {
            i += 1;
        }
        match chars.get(i) {
            None | Some('\n') => {}
            Some(n) if CLOSING_PUNCTUATION.contains(n) => {}
            Some(_) => out.push(' '),
        }
    }
    out
}

/// `1. 500, 00` and `1 500,00` → `1.500,00`. A final group of one or two
/// digits is the decimal part; everything before it is regrouped in thousands.
fn format_amount(number: &str) -> String {
    let groups: Vec<String> = number
        .split(['.', ','])
        .map(|g| g.split_whitespace().collect::<String>())
        .filter(|g| !g.is_empty())
        .collect();
    let (integer, decimal) = match groups.split_last() {
        Some((last, rest)) if !rest.is_empty() && last.len() <= 2 => (rest.concat(), Some(last.as_str())),
        _ => (groups.concat(), None),
    };
    let grouped = group_thousands(&integer);
    match decimal {
        Some(d) => format!("{grouped},{d}"),
        None => grouped,
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

fn join_national_ids(text: &str) -> String {
    re_national_id()
        .replace_all(text, |caps: &Captures| {
            let digits: String = caps[2].chars().filter(|c| c.is_ascii_digit()).collect();
            format!("{}{digits}", &caps[1])
        })
        .into_owned()
}
