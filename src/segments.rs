//! Dimensional (segment-level) metric extraction from XBRL instance
//! documents.
//!
//! The structured facts feed only carries company totals. Per-segment
//! breakdowns live in the filing's raw instance XML, where facts point at
//! contexts and contexts carry explicit dimension members (e.g. a
//! business-segment axis with a `ServicesMember`). Extraction here:
//!
//! 1. Lists the filing's file index and picks the most likely instance
//!    document (linkbases and oversized files excluded).
//! 2. Parses contexts: id, dimension members, period end/instant.
//! 3. Walks every numeric fact, keeping those whose context matches the
//!    filing's report date and carries at least one member, and emits one
//!    segment row per (fact, member).
//!
//! A filing without a locatable instance document fails soft: empty
//! lists plus a missing-data entry, never an error.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use super::EdgarClient;
use super::catalog::Filing;
use super::error::{FactkitError, Result};
use super::facts::MetricAliases;
use super::payload::{MissingData, Provenance, SegmentMetric, SourceKind};

const SEGMENT_CONFIDENCE: f64 = 0.85;

/// Listing of one filing's files, as served by its `index.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct FilingIndex {
    pub directory: FilingDirectory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilingDirectory {
    #[serde(default)]
    pub item: Vec<FilingIndexItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilingIndexItem {
    #[serde(default)]
    pub name: String,
    /// File size as reported by the listing; a plain byte count.
    #[serde(default)]
    pub size: String,
}

/// Per-segment breakdowns of the primary metric set for one filing.
#[derive(Debug, Clone, Default)]
pub struct SegmentBreakdown {
    pub revenue: Vec<SegmentMetric>,
    pub profit: Vec<SegmentMetric>,
    pub capex: Vec<SegmentMetric>,
}

impl SegmentBreakdown {
    pub fn is_empty(&self) -> bool {
        self.revenue.is_empty() && self.profit.is_empty() && self.capex.is_empty()
    }
}

/// A dimension/member pair attached to a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionMember {
    pub dimension: String,
    pub member: String,
}

#[derive(Debug, Default)]
struct InstanceContext {
    members: Vec<DimensionMember>,
    end: Option<String>,
}

/// Picks the most likely instance document from a filing's file listing.
///
/// Calculation/definition/label/presentation linkbases are excluded, as
/// are files over the per-artifact cap. Among the rest, `_htm.xml`
/// naming marks the inline-XBRL instance export and scores highest; size
/// breaks ties (bigger wins), then name for determinism.
pub fn choose_instance_name(items: &[FilingIndexItem], max_bytes: u64) -> Option<String> {
    const LINKBASES: [&str; 4] = ["_cal.xml", "_def.xml", "_lab.xml", "_pre.xml"];

    items
        .iter()
        .filter(|i| i.name.ends_with(".xml"))
        .filter(|i| !LINKBASES.iter().any(|suffix| i.name.ends_with(suffix)))
        .filter(|i| i.size.parse::<u64>().map(|s| s <= max_bytes).unwrap_or(true))
        .max_by_key(|i| {
            (
                i.name.ends_with("_htm.xml"),
                i.size.parse::<u64>().unwrap_or(0),
                i.name.clone(),
            )
        })
        .map(|i| i.name.clone())
}

fn local_name(qname: &[u8]) -> String {
    let start = qname
        .iter()
        .rposition(|&b| b == b':')
        .map(|p| p + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&qname[start..]).into_owned()
}

/// A plain numeric literal: optional sign, digits, optional decimals.
/// Facts with scaled, formatted, or textual values are rejected.
fn is_plain_numeric(text: &str) -> bool {
    let rest = text.strip_prefix('-').unwrap_or(text);
    if rest.is_empty() {
        return false;
    }
    let mut parts = rest.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    !int_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.is_none_or(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

/// Parses an instance document's contexts: one pass collecting id,
/// explicit dimension members, and the period end (or instant) date.
fn parse_contexts(xml: &str) -> Result<HashMap<String, InstanceContext>> {
    #[derive(PartialEq)]
    enum Pending {
        None,
        MemberText(String),
        EndDate,
    }

    let mut contexts = HashMap::new();
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    let mut current_id: Option<String> = None;
    let mut current = InstanceContext::default();
    let mut in_segment = false;
    let mut pending = Pending::None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| FactkitError::XmlError(e.to_string()))?
        {
            Event::Start(ref e) => match local_name(e.name().as_ref()).as_str() {
                "context" => {
                    let id = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"id")
                        .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                    current_id = id;
                    current = InstanceContext::default();
                    in_segment = false;
                }
                "segment" if current_id.is_some() => in_segment = true,
                "explicitMember" if in_segment => {
                    let dimension = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"dimension")
                        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
                        .unwrap_or_default();
                    pending = Pending::MemberText(dimension);
                }
                "endDate" | "instant" if current_id.is_some() => pending = Pending::EndDate,
                _ => {}
            },
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| FactkitError::XmlError(err.to_string()))?
                    .trim()
                    .to_string();
                match std::mem::replace(&mut pending, Pending::None) {
                    Pending::MemberText(dimension) => {
                        current.members.push(DimensionMember {
                            dimension,
                            member: text,
                        });
                    }
                    Pending::EndDate => {
                        // endDate wins over a later instant only in
                        // malformed documents; last writer is fine.
                        current.end = Some(text);
                    }
                    Pending::None => {}
                }
            }
            Event::End(ref e) => match local_name(e.name().as_ref()).as_str() {
                "context" => {
                    if let Some(id) = current_id.take() {
                        contexts.insert(id, std::mem::take(&mut current));
                    }
                }
                "segment" => in_segment = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(contexts)
}

/// Walks every fact in an instance document and emits segment rows for
/// those in the metric tag sets whose context is dimensional and matches
/// the filing's report date.
pub fn parse_instance_segments(
    xml: &str,
    filing: &Filing,
    aliases: &MetricAliases,
    source_ref: &str,
) -> Result<SegmentBreakdown> {
    let contexts = parse_contexts(xml)?;

    let revenue_tags: HashSet<&str> = aliases.revenue.iter().map(String::as_str).collect();
    let profit_tags: HashSet<&str> = aliases.net_income.iter().map(String::as_str).collect();
    let capex_tags: HashSet<&str> = aliases.capex_tags().into_iter().collect();

    let mut out = SegmentBreakdown::default();
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    // (tag local name, context ref, accumulated text) of the fact
    // element currently open, if any.
    let mut open_fact: Option<(String, String, String)> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| FactkitError::XmlError(e.to_string()))?
        {
            Event::Start(ref e) => {
                let context_ref = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"contextRef")
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                open_fact = context_ref
                    .map(|ctx| (local_name(e.name().as_ref()), ctx, String::new()));
            }
            Event::Text(e) => {
                if let Some((_, _, text)) = open_fact.as_mut() {
                    text.push_str(
                        e.unescape()
                            .map_err(|err| FactkitError::XmlError(err.to_string()))?
                            .as_ref(),
                    );
                }
            }
            Event::End(_) => {
                let Some((tag, context_ref, text)) = open_fact.take() else {
                    continue;
                };
                let Some(context) = contexts.get(&context_ref) else {
                    continue;
                };
                if let (Some(report_date), Some(end)) =
                    (filing.report_date.as_deref(), context.end.as_deref())
                {
                    if end != report_date {
                        continue;
                    }
                }
                if context.members.is_empty() {
                    continue;
                }
                let text = text.trim();
                if !is_plain_numeric(text) {
                    continue;
                }
                let Ok(value) = text.parse::<f64>() else {
                    continue;
                };

                let target = if revenue_tags.contains(tag.as_str()) {
                    &mut out.revenue
                } else if profit_tags.contains(tag.as_str()) {
                    &mut out.profit
                } else if capex_tags.contains(tag.as_str()) {
                    &mut out.capex
                } else {
                    continue;
                };

                for member in &context.members {
                    target.push(SegmentMetric {
                        segment: member
                            .member
                            .rsplit(':')
                            .next()
                            .unwrap_or(&member.member)
                            .to_string(),
                        value,
                        unit: "USD".to_string(),
                        xbrl_tag: tag.clone(),
                        dimension: member.dimension.clone(),
                        member: member.member.clone(),
                        source: SourceKind::Xbrl,
                        confidence: SEGMENT_CONFIDENCE,
                        provenance: Provenance {
                            filing_type: filing.form.as_str().to_string(),
                            accession: filing.accession.clone(),
                            filing_date: filing.filing_date.clone(),
                            source_ref: source_ref.to_string(),
                            unit: "USD".to_string(),
                        },
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// Missing-data entries for every empty breakdown list. Partial
/// availability is reported per field, not collapsed.
pub fn breakdown_missing(breakdown: &SegmentBreakdown) -> Vec<MissingData> {
    const REASON: &str = "No dimensional facts found in XBRL instance for this filing.";
    let mut missing = Vec::new();
    if breakdown.revenue.is_empty() {
        missing.push(MissingData::new("revenue_by_segment", REASON));
    }
    if breakdown.profit.is_empty() {
        missing.push(MissingData::new("profit_by_segment", REASON));
    }
    if breakdown.capex.is_empty() {
        missing.push(MissingData::new("capex_by_segment", REASON));
    }
    missing
}

/// Strips leading zeros the way archive URLs expect.
pub(crate) fn archive_cik(cik: &str) -> &str {
    let trimmed = cik.trim_start_matches('0');
    if trimmed.is_empty() { "0" } else { trimmed }
}

impl EdgarClient {
    pub(crate) fn filing_index_url(&self, cik: &str, accession: &str) -> String {
        format!(
            "{}/data/{}/{}/index.json",
            self.edgar_archives_url,
            archive_cik(cik),
            accession.replace("-", "")
        )
    }

    pub(crate) fn filing_file_url(&self, cik: &str, accession: &str, filename: &str) -> String {
        format!(
            "{}/data/{}/{}/{}",
            self.edgar_archives_url,
            archive_cik(cik),
            accession.replace("-", ""),
            filename
        )
    }

    /// Locates a filing's instance document, returning its URL and file
    /// name, or `None` when the filing has none we can use.
    async fn locate_instance_document(
        &self,
        cik: &str,
        filing: &Filing,
        use_cache: bool,
    ) -> Result<Option<(String, String)>> {
        let index_url = self.filing_index_url(cik, &filing.accession);
        let index: FilingIndex = match self.fetch_json(&index_url, use_cache).await {
            Ok(index) => index,
            // A filing with no listable directory has no instance
            // document; that is data absence, not a transport failure.
            Err(FactkitError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(
            choose_instance_name(&index.directory.item, self.max_artifact_bytes).map(|name| {
                (self.filing_file_url(cik, &filing.accession, &name), name)
            }),
        )
    }

    /// Extracts per-segment metric breakdowns for one filing.
    ///
    /// Fails soft when no instance document can be located; every empty
    /// output list gets its own missing-data entry.
    pub async fn extract_segments(
        &self,
        cik: &str,
        filing: &Filing,
        aliases: &MetricAliases,
        use_cache: bool,
    ) -> Result<(SegmentBreakdown, Vec<MissingData>)> {
        let Some((url, name)) = self.locate_instance_document(cik, filing, use_cache).await? else {
            return Ok((
                SegmentBreakdown::default(),
                vec![MissingData::new(
                    "segment_metrics",
                    "XBRL instance XML not found for filing.",
                )],
            ));
        };

        let xml = self.fetch_text(&url, use_cache).await?;
        self.record_artifact(&filing.accession, &name);

        let breakdown = parse_instance_segments(&xml, filing, aliases, &url)?;
        let missing = breakdown_missing(&breakdown);
        Ok((breakdown, missing))
    }
}
