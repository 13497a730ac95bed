//! Tolerant parsing of free-text model responses.
//!
//! Every structured field reports whether it was read from the response or
//! defaulted, so degradation stays observable. English and Portuguese labels
//! are both recognised, with or without markdown emphasis.

use cogloop_core::{clamp_unit, AuditFindings, FieldConfidence};
use regex::Regex;
use std::sync::OnceLock;

/// Score substituted when the auditor response lacks one.
pub const DEFAULT_AUDIT_SCORE: f64 = 0.8;

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn label_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(
        &RE,
        r"^\s*(?:[-*>#]+\s*)?(?:\*\*|__)?([\p{L}][\p{L} ]{0,40}?)(?:\s*\([^)]*\))?(?:\*\*|__)?\s*[:=]\s*(?:\*\*|__)?\s*(.*)$",
    )
}

fn number_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(-?\d+(?:[.,]\d+)?)(?:\s*/\s*(\d+(?:[.,]\d+)?))?\s*(%)?")
}

fn bullet_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Safety,
    Ethics,
    Concerns,
    Recommendations,
    Reasoning,
    Flagged,
    Agreement,
    Themes,
    Consensus,
    Title,
    Summary,
    Insights,
}

fn field_for(label: &str) -> Option<Field> {
    let l = label.trim().to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| l.contains(n));
    // List and prose labels first: "Ethical concerns" is a concern list, not a score.
    let field = if has(&["concern", "preocupa"]) {
        Field::Concerns
    } else if has(&["recommend", "recomenda"]) {
        Field::Recommendations
    } else if has(&["reasoning", "racioc", "justifica"]) {
        Field::Reasoning
    } else if has(&["flag", "sinaliza"]) {
        Field::Flagged
    } else if has(&["safety", "seguran"]) {
        Field::Safety
    } else if has(&["ethic", "ética", "etica"]) {
        Field::Ethics
    } else if has(&["agreement", "concordância", "concordancia"]) {
        Field::Agreement
    } else if has(&["theme", "tema"]) {
        Field::Themes
    } else if has(&["consensus", "consenso"]) {
        Field::Consensus
    } else if has(&["title", "título", "titulo"]) {
        Field::Title
    } else if has(&["summary", "resumo"]) {
        Field::Summary
    } else if has(&["insight", "percep", "ideias"]) {
        Field::Insights
    } else {
        return None;
    };
    Some(field)
}

enum Line<'a> {
    Field(Field, &'a str),
    Bullet(&'a str),
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if let Some(caps) = label_re().and_then(|re| re.captures(line)) {
        let label = caps.get(1).map_or("", |m| m.as_str());
        if let Some(field) = field_for(label) {
            let value = caps.get(2).map_or("", |m| m.as_str());
            return Line::Field(field, value.trim().trim_end_matches(['*', '_']).trim());
        }
    }
    if let Some(caps) = bullet_re().and_then(|re| re.captures(line)) {
        return Line::Bullet(caps.get(1).map_or("", |m| m.as_str()).trim());
    }
    Line::Text(line)
}

fn decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// First number in `text`, read as a unit fraction. `8/10` is divided by its
/// denominator; `85%` and bare values in (1, 100] are taken as percentages;
/// `0,8` is accepted as a decimal.
pub fn parse_unit_number(text: &str) -> Option<f64> {
    let caps = number_re()?.captures(text)?;
    let mut value = decimal(caps.get(1)?.as_str())?;
    if let Some(denominator) = caps.get(2) {
        let denominator = decimal(denominator.as_str())?;
        if denominator <= 0.0 {
            return None;
        }
        value /= denominator;
    } else if caps.get(3).is_some() || (value > 1.0 && value <= 100.0) {
        value /= 100.0;
    }
    if value > 1.0 {
        return None;
    }
    Some(clamp_unit(value))
}

fn split_items(value: &str) -> Vec<String> {
    let lowered = value.trim().to_lowercase();
    if matches!(
        lowered.trim_end_matches('.'),
        "" | "none" | "n/a" | "nenhum" | "nenhuma" | "nada" | "-"
    ) {
        return Vec::new();
    }
    value
        .split([';', '|'])
        .map(|s| s.trim().trim_matches('"').trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Auditor response fields, each score tagged with where it came from.
#[derive(Debug, Clone)]
pub struct ParsedAudit {
    pub findings: AuditFindings,
    pub safety: FieldConfidence,
    pub ethics: FieldConfidence,
}

impl ParsedAudit {
    pub fn score_confidence(&self) -> FieldConfidence {
        if self.safety == FieldConfidence::Parsed && self.ethics == FieldConfidence::Parsed {
            FieldConfidence::Parsed
        } else {
            FieldConfidence::Defaulted
        }
    }

    /// Names of the fields that fell back to defaults.
    pub fn defaulted_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.safety == FieldConfidence::Defaulted {
            out.push("safety");
        }
        if self.ethics == FieldConfidence::Defaulted {
            out.push("ethics");
        }
        out
    }
}

pub fn parse_audit(text: &str) -> ParsedAudit {
    let mut safety = None;
    let mut ethics = None;
    let mut findings = AuditFindings::default();
    let mut reasoning: Vec<&str> = Vec::new();
    let mut current: Option<Field> = None;

    for line in text.lines() {
        match classify(line) {
            Line::Field(field, value) => {
                current = Some(field);
                match field {
                    Field::Safety => safety = safety.or_else(|| parse_unit_number(value)),
                    Field::Ethics => ethics = ethics.or_else(|| parse_unit_number(value)),
                    Field::Concerns => findings.concerns.extend(split_items(value)),
                    Field::Recommendations => findings.recommendations.extend(split_items(value)),
                    Field::Flagged => findings.flagged_content.extend(split_items(value)),
                    Field::Reasoning if !value.is_empty() => reasoning.push(value),
                    _ => {}
                }
            }
            Line::Bullet(item) => match current {
                Some(Field::Concerns) => findings.concerns.extend(split_items(item)),
                Some(Field::Recommendations) => findings.recommendations.extend(split_items(item)),
                Some(Field::Flagged) => findings.flagged_content.extend(split_items(item)),
                Some(Field::Reasoning) => reasoning.push(item),
                _ => {}
            },
            Line::Text(t) => {
                if current == Some(Field::Reasoning) && !t.trim().is_empty() {
                    reasoning.push(t.trim());
                }
            }
        }
    }

    findings.safety_score = safety.unwrap_or(DEFAULT_AUDIT_SCORE);
    findings.ethics_score = ethics.unwrap_or(DEFAULT_AUDIT_SCORE);
    findings.reasoning = reasoning.join(" ");

    ParsedAudit {
        findings,
        safety: if safety.is_some() { FieldConfidence::Parsed } else { FieldConfidence::Defaulted },
        ethics: if ethics.is_some() { FieldConfidence::Parsed } else { FieldConfidence::Defaulted },
    }
}

/// `AGREEMENT:` line of a reflection, if present.
pub fn parse_agreement(text: &str) -> Option<f64> {
    text.lines().find_map(|line| match classify(line) {
        Line::Field(Field::Agreement, value) => parse_unit_number(value),
        _ => None,
    })
}

/// Reflection text without its trailing agreement line.
pub fn strip_agreement(text: &str) -> String {
    text.lines()
        .filter(|line| !matches!(classify(line), Line::Field(Field::Agreement, _)))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Default)]
pub struct ParsedSynthesis {
    pub body: String,
    pub themes: Option<Vec<String>>,
    pub consensus: Option<f64>,
}

pub fn parse_synthesis(text: &str) -> ParsedSynthesis {
    let mut parsed = ParsedSynthesis::default();
    let mut body = Vec::new();
    for line in text.lines() {
        match classify(line) {
            Line::Field(Field::Themes, value) => {
                let themes: Vec<String> = value
                    .split([',', ';'])
                    .map(|t| t.trim().trim_end_matches('.').to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                if !themes.is_empty() {
                    parsed.themes = Some(themes);
                }
            }
            Line::Field(Field::Consensus, value) => parsed.consensus = parse_unit_number(value),
            _ => body.push(line),
        }
    }
    parsed.body = body.join("\n").trim().to_string();
    parsed
}

#[derive(Debug, Clone, Default)]
pub struct ParsedDocumentation {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub insights: Vec<String>,
    pub body: String,
}

pub fn parse_documentation(text: &str) -> ParsedDocumentation {
    let mut parsed = ParsedDocumentation::default();
    let mut body = Vec::new();
    let mut in_insights = false;
    for line in text.lines() {
        match classify(line) {
            Line::Field(Field::Title, value) if parsed.title.is_none() && !value.is_empty() => {
                parsed.title = Some(value.trim_matches('"').to_string());
                in_insights = false;
            }
            Line::Field(Field::Summary, value) if parsed.summary.is_none() && !value.is_empty() => {
                parsed.summary = Some(value.to_string());
                in_insights = false;
            }
            Line::Field(Field::Insights, value) => {
                parsed.insights.extend(split_items(value));
                in_insights = true;
            }
            Line::Bullet(item) if in_insights => parsed.insights.extend(split_items(item)),
            _ => {
                in_insights = false;
                body.push(line);
            }
        }
    }
    parsed.body = body.join("\n").trim().to_string();
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_numbers_accept_percent_and_comma() {
        assert_eq!(parse_unit_number("0.85"), Some(0.85));
        assert_eq!(parse_unit_number("Confidence: 85%"), Some(0.85));
        assert_eq!(parse_unit_number("0,7"), Some(0.7));
        assert_eq!(parse_unit_number("72"), Some(0.72));
        assert_eq!(parse_unit_number("450"), None);
        assert_eq!(parse_unit_number("no number"), None);
    }

    #[test]
    fn unit_numbers_divide_by_denominator() {
        assert_eq!(parse_unit_number("8/10"), Some(0.8));
        assert_eq!(parse_unit_number("4 / 5"), Some(0.8));
        assert_eq!(parse_unit_number("7/0"), None);
        assert_eq!(parse_unit_number("12/10"), None);
    }

    #[test]
    fn out_of_ten_scores_read_as_fractions() {
        let parsed = parse_audit("SAFETY: 8/10\nETHICS: 9/10\nCONCERNS: none");
        assert_eq!(parsed.score_confidence(), FieldConfidence::Parsed);
        assert_eq!(parsed.findings.safety_score, 0.8);
        assert_eq!(parsed.findings.ethics_score, 0.9);
    }

    #[test]
    fn parenthesised_label_hints_are_ignored() {
        let parsed = parse_audit("Safety score (0-1): 0.9\n**Ethics (0-1):** 0.85\nConcerns (if any): none");
        assert_eq!(parsed.score_confidence(), FieldConfidence::Parsed);
        assert_eq!(parsed.findings.safety_score, 0.9);
        assert_eq!(parsed.findings.ethics_score, 0.85);
        assert!(parsed.findings.concerns.is_empty());
    }

    #[test]
    fn english_audit_layout_parses() {
        let text = "SAFETY: 0.9\nETHICS: 0.75\nCONCERNS: vague claims; missing sources\n\
                    RECOMMENDATIONS: none\nREASONING: Mostly careful.\nIt stays abstract.\nFLAGGED: none";
        let parsed = parse_audit(text);
        assert_eq!(parsed.score_confidence(), FieldConfidence::Parsed);
        assert_eq!(parsed.findings.safety_score, 0.9);
        assert_eq!(parsed.findings.ethics_score, 0.75);
        assert_eq!(parsed.findings.concerns, vec!["vague claims", "missing sources"]);
        assert!(parsed.findings.recommendations.is_empty());
        assert_eq!(parsed.findings.reasoning, "Mostly careful. It stays abstract.");
    }

    #[test]
    fn portuguese_markdown_layout_parses() {
        let text = "**Segurança:** 0,6\n**Ética**: 40%\nPreocupações:\n- tom agressivo\n- generalização\n\
                    Recomendações: suavizar o tom";
        let parsed = parse_audit(text);
        assert_eq!(parsed.findings.safety_score, 0.6);
        assert_eq!(parsed.findings.ethics_score, 0.4);
        assert_eq!(parsed.findings.concerns, vec!["tom agressivo", "generalização"]);
        assert_eq!(parsed.findings.recommendations, vec!["suavizar o tom"]);
    }

    #[test]
    fn missing_scores_default_and_are_reported() {
        let parsed = parse_audit("The thoughts look fine to me.");
        assert_eq!(parsed.findings.safety_score, DEFAULT_AUDIT_SCORE);
        assert_eq!(parsed.findings.ethics_score, DEFAULT_AUDIT_SCORE);
        assert_eq!(parsed.score_confidence(), FieldConfidence::Defaulted);
        assert_eq!(parsed.defaulted_fields(), vec!["safety", "ethics"]);

        let half = parse_audit("Safety: 0.95");
        assert_eq!(half.safety, FieldConfidence::Parsed);
        assert_eq!(half.ethics, FieldConfidence::Defaulted);
    }

    #[test]
    fn synthesis_and_documentation_fields() {
        let s = parse_synthesis("Solitude tunes the self.\nTHEMES: Solitude, Self-knowledge.\nCONSENSUS: 0.7");
        assert_eq!(s.body, "Solitude tunes the self.");
        assert_eq!(s.themes, Some(vec!["solitude".to_string(), "self-knowledge".to_string()]));
        assert_eq!(s.consensus, Some(0.7));

        let d = parse_documentation("TITLE: On Solitude\nSUMMARY: Short.\nINSIGHTS: a; b\n- c\n\n# Body\ntext");
        assert_eq!(d.title.as_deref(), Some("On Solitude"));
        assert_eq!(d.summary.as_deref(), Some("Short."));
        assert_eq!(d.insights, vec!["a", "b", "c"]);
        assert!(d.body.starts_with("# Body"));
    }

    #[test]
    fn agreement_line_is_read_and_stripped() {
        let text = "I mostly agree.\nAGREEMENT: 0.8";
        assert_eq!(parse_agreement(text), Some(0.8));
        assert_eq!(strip_agreement(text), "I mostly agree.");
    }
}
