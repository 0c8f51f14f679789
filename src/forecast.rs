//! Forward-looking capital-expenditure guidance extraction.
//!
//! Filings discuss planned capex in prose, usually under MD&A. This
//! extractor is deliberately lexical: a sentence qualifies only when it
//! carries both a capital-expenditure term and a forward-looking cue, so
//! purely historical capex mentions do not leak in. Extracted values are
//! text-derived and carry a fixed lower confidence than structured facts.

use regex::Regex;

use super::EdgarClient;
use super::catalog::Filing;
use super::error::Result;
use super::payload::{ForecastStatement, MissingData, Provenance, SourceKind};
use super::segments::archive_cik;

const TEXT_CONFIDENCE: f64 = 0.6;
const SNIPPET_CHARS: usize = 200;
const LOCATION_HINT: &str = "MD&A > Liquidity and Capital Resources";

/// Compiled pattern set for guidance detection.
///
/// Held in a struct rather than module globals so pattern sets stay
/// overridable in one place and compile once per run.
#[derive(Debug)]
pub struct ForecastExtractor {
    capex: Regex,
    forward: Regex,
    timeframe: Regex,
    amount: Regex,
    billion: Regex,
    million: Regex,
    markup: Regex,
}

impl ForecastExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            capex: Regex::new(r"(?i)capital expenditures|capex")?,
            forward: Regex::new(r"(?i)expect|plan|anticipate|estimate|will invest|project|guidance")?,
            timeframe: Regex::new(
                r"(?i)fiscal\s+\d{4}|FY\d{2,4}|next\s+(?:fiscal\s+)?year|next\s+12\s+months",
            )?,
            amount: Regex::new(r"\$\s*(\d+(?:\.\d+)?)")?,
            billion: Regex::new(r"(?i)billion")?,
            million: Regex::new(r"(?i)million")?,
            markup: Regex::new(r"<[^>]+>")?,
        })
    }

    /// Replaces markup with spaces so sentence boundaries survive tag
    /// removal.
    pub fn strip_markup(&self, html: &str) -> String {
        self.markup.replace_all(html, " ").into_owned()
    }

    /// Parses up to two currency-like numbers out of a sentence, scaled
    /// by a magnitude word when present. One number is a point estimate;
    /// two become a (min, max) range regardless of their order in text.
    fn parse_money(&self, sentence: &str) -> Option<(f64, f64)> {
        let scale = if self.billion.is_match(sentence) {
            1_000_000_000.0
        } else if self.million.is_match(sentence) {
            1_000_000.0
        } else {
            1.0
        };

        let values: Vec<f64> = self
            .amount
            .captures_iter(sentence)
            .take(2)
            .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
            .map(|v| v * scale)
            .collect();

        match values.as_slice() {
            [] => None,
            [v] => Some((*v, *v)),
            [a, b] => Some((a.min(*b), a.max(*b))),
            _ => None,
        }
    }

    /// Scans narrative text for forward-looking capex guidance.
    pub fn extract_from_text(
        &self,
        text: &str,
        filing: &Filing,
        source_ref: &str,
    ) -> Vec<ForecastStatement> {
        let mut out = Vec::new();

        for sentence in split_sentences(text) {
            if !self.capex.is_match(sentence) || !self.forward.is_match(sentence) {
                continue;
            }
            let Some((value_min, value_max)) = self.parse_money(sentence) else {
                continue;
            };
            let timeframe = self
                .timeframe
                .find(sentence)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "unspecified".to_string());

            out.push(ForecastStatement {
                value_min,
                value_max,
                unit: "USD".to_string(),
                timeframe,
                source: SourceKind::Text,
                snippet: sentence.trim().chars().take(SNIPPET_CHARS).collect(),
                location_hint: LOCATION_HINT.to_string(),
                confidence: TEXT_CONFIDENCE,
                provenance: Provenance {
                    filing_type: filing.form.as_str().to_string(),
                    accession: filing.accession.clone(),
                    filing_date: filing.filing_date.clone(),
                    source_ref: source_ref.to_string(),
                    unit: "USD".to_string(),
                },
            });
        }
        out
    }
}

/// Splits text into sentences after terminal punctuation followed by
/// whitespace. The regex crate has no lookbehind, so this is a scanner
/// with the same observable split.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some((next_idx, next)) = chars.peek().copied() {
                if next.is_whitespace() {
                    sentences.push(&text[start..next_idx]);
                    start = next_idx;
                }
            }
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

impl EdgarClient {
    /// Extracts forward-looking capex guidance from a filing's primary
    /// narrative document.
    ///
    /// A filing with no qualifying sentence yields an empty list and one
    /// missing-data entry; that is the expected common case.
    pub async fn extract_forecasts(
        &self,
        extractor: &ForecastExtractor,
        cik: &str,
        filing: &Filing,
        use_cache: bool,
    ) -> Result<(Vec<ForecastStatement>, Vec<MissingData>)> {
        let url = format!(
            "{}/data/{}/{}/{}",
            self.edgar_archives_url,
            archive_cik(cik),
            filing.accession.replace("-", ""),
            filing.primary_doc
        );
        let html = self.fetch_text(&url, use_cache).await?;
        self.record_artifact(&filing.accession, &filing.primary_doc);

        let text = extractor.strip_markup(&html);
        let statements = extractor.extract_from_text(&text, filing, &url);
        let missing = if statements.is_empty() {
            vec![MissingData::new(
                "forecasted_capex",
                "No clearly forward-looking CAPEX guidance sentence found.",
            )]
        } else {
            Vec::new()
        };
        Ok((statements, missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FiscalPeriod, FormType};

    fn filing() -> Filing {
        Filing {
            form: FormType::Annual,
            filing_date: "2024-11-01".to_string(),
            report_date: Some("2024-09-28".to_string()),
            accession: "0001-01-000001".to_string(),
            primary_doc: "a.htm".to_string(),
            fiscal_year: Some(2024),
            fiscal_period: FiscalPeriod::Fy,
        }
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = split_sentences("First one. Second one! Third? Tail without end");
        assert_eq!(
            sentences,
            vec!["First one.", "Second one!", "Third?", "Tail without end"]
        );
    }

    #[test]
    fn requires_both_capex_term_and_forward_cue() {
        let extractor = ForecastExtractor::new().unwrap();
        let f = filing();

        // Historical mention only: no forward cue.
        let historical = "Capital expenditures were $2.0 billion in fiscal 2024.";
        // Forward cue but no capex term.
        let vague = "We expect revenue of $3 billion next year.";
        let qualifying = "We expect capital expenditures of approximately $2.5 billion in fiscal 2025.";

        assert!(extractor.extract_from_text(historical, &f, "url").is_empty());
        assert!(extractor.extract_from_text(vague, &f, "url").is_empty());

        let found = extractor.extract_from_text(qualifying, &f, "url");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value_min, 2_500_000_000.0);
        assert_eq!(found[0].value_max, 2_500_000_000.0);
        assert_eq!(found[0].timeframe, "fiscal 2025");
        assert_eq!(found[0].source, SourceKind::Text);
    }

    #[test]
    fn two_numbers_form_a_range_regardless_of_order() {
        let extractor = ForecastExtractor::new().unwrap();
        let found = extractor.extract_from_text(
            "We plan capex between $4.0 billion and $3.0 billion next year.",
            &filing(),
            "url",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value_min, 3_000_000_000.0);
        assert_eq!(found[0].value_max, 4_000_000_000.0);
        assert_eq!(found[0].timeframe, "next year");
    }

    #[test]
    fn million_scaling_and_unspecified_timeframe() {
        let extractor = ForecastExtractor::new().unwrap();
        let found = extractor.extract_from_text(
            "The company anticipates capex of $750 million.",
            &filing(),
            "url",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value_min, 750_000_000.0);
        assert_eq!(found[0].timeframe, "unspecified");
    }

    #[test]
    fn sentence_without_numbers_is_discarded() {
        let extractor = ForecastExtractor::new().unwrap();
        let found = extractor.extract_from_text(
            "We expect capital expenditures to increase substantially.",
            &filing(),
            "url",
        );
        assert!(found.is_empty());
    }

    #[test]
    fn strip_markup_preserves_sentence_boundaries() {
        let extractor = ForecastExtractor::new().unwrap();
        let text = extractor.strip_markup("<p>We expect capex of $1 billion.</p><p>Next.</p>");
        let sentences = split_sentences(&text);
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn text_confidence_stays_below_structured() {
        assert!(TEXT_CONFIDENCE < 0.95);
    }
}
