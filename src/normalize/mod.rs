pub mod reference;
pub mod similarity;

use crate::config;
use crate::model::call::JoinedCall;
use reference::{OrgMappingEntry, ReferenceTables};
use similarity::{SimilarityScorer, TokenSortRatio};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedOrg {
    pub account: String,
    pub industry: String,
    pub industry_api: String,
}

impl NormalizedOrg {
    fn new(account: &str, industry: &str, industry_api: &str) -> Self {
        NormalizedOrg {
            account: account.to_string(),
            industry: industry.to_string(),
            industry_api: industry_api.to_string(),
        }
    }
}

/// Maps raw account data to a canonical organisation and industry. Pure over
/// its reference tables: the same input always yields the same output.
pub struct OrgNormalizer {
    tables: ReferenceTables,
    scorer: Box<dyn SimilarityScorer>,
    threshold: f64,
}

impl OrgNormalizer {
    pub fn new(tables: ReferenceTables) -> Self {
        OrgNormalizer::with_scorer(tables, Box::new(TokenSortRatio), config::FUZZY_MATCH_THRESHOLD)
    }

    pub fn with_scorer(
        tables: ReferenceTables,
        scorer: Box<dyn SimilarityScorer>,
        threshold: f64,
    ) -> Self {
        OrgNormalizer {
            tables,
            scorer,
            threshold,
        }
    }

    /// Domain match, then fuzzy name match, then industry-code match, then the
    /// industry mapping table; falls back to the input unchanged.
    pub fn normalize(&self, account_name: &str, website: &str, industry: &str) -> NormalizedOrg {
        if let Some(entry) = self.match_domain(website) {
            return NormalizedOrg::new(&entry.org_name, &entry.industry, industry);
        }
        if let Some(entry) = self.match_name(account_name) {
            return NormalizedOrg::new(&entry.org_name, &entry.industry, industry);
        }
        if self.tables.orgs.iter().any(|e| e.industry == industry) {
            return NormalizedOrg::new(account_name, industry, industry);
        }
        match self.tables.industries.get(industry) {
            Some(mapped) => NormalizedOrg::new(account_name, mapped, industry),
            None => NormalizedOrg::new(account_name, industry, industry),
        }
    }

    fn match_domain(&self, website: &str) -> Option<&OrgMappingEntry> {
        let host = website_host(website)?;
        self.tables
            .orgs
            .iter()
            .find(|e| e.primary_domain.trim().eq_ignore_ascii_case(&host))
    }

    fn match_name(&self, account_name: &str) -> Option<&OrgMappingEntry> {
        if account_name.trim().is_empty() || account_name == config::NOT_AVAILABLE {
            return None;
        }
        let mut best: Option<(&OrgMappingEntry, f64)> = None;
        for entry in &self.tables.orgs {
            let score = self.scorer.score(account_name, &entry.org_name);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((entry, score));
            }
        }
        best.filter(|(_, score)| *score > self.threshold)
            .map(|(entry, _)| entry)
    }

    /// Fills the four organisation fields of every call from its Account
    /// context (`Name`, `Website`, `Industry`).
    pub fn apply(&self, calls: &mut [JoinedCall]) {
        for call in calls.iter_mut() {
            let account_name = call.account_field("Name");
            let website = call.account_field("Website");
            let industry = call.account_field("Industry");
            let normalized = self.normalize(&account_name, &website, &industry);
            call.account_api = account_name;
            call.account_normalized = normalized.account;
            call.industry_normalized = normalized.industry;
            call.industry_api = normalized.industry_api;
        }
    }
}

/// Lowercased host of a website value; scheme-less values are read as
/// `http://<value>`.
pub fn website_host(website: &str) -> Option<String> {
    let trimmed = website.trim();
    if trimmed.is_empty() || trimmed == config::NOT_AVAILABLE {
        return None;
    }
    let parsed = url::Url::parse(trimmed)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| url::Url::parse(&format!("http://{}", trimmed)).ok())?;
    parsed.host_str().map(|h| h.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::reference::IndustryMappingEntry;
    use super::*;

    fn org(domain: &str, name: &str, industry: &str) -> OrgMappingEntry {
        OrgMappingEntry {
            primary_domain: domain.to_string(),
            org_name: name.to_string(),
            industry: industry.to_string(),
        }
    }

    fn normalizer(orgs: Vec<OrgMappingEntry>, industries: Vec<(&str, &str)>) -> OrgNormalizer {
        let industries = industries
            .into_iter()
            .map(|(code, label)| IndustryMappingEntry {
                industry_code: code.to_string(),
                label: label.to_string(),
            })
            .collect();
        OrgNormalizer::new(ReferenceTables::new(orgs, industries))
    }

    #[test]
    fn domain_match_returns_reference_org() {
        let n = normalizer(vec![org("acme.com", "Acme Inc", "Tech")], vec![]);
        let out = n.normalize("Acme Incorporated", "http://acme.com/page", "Other");
        assert_eq!(out, NormalizedOrg::new("Acme Inc", "Tech", "Other"));
    }

    #[test]
    fn domain_match_wins_over_a_better_fuzzy_candidate() {
        let n = normalizer(
            vec![
                org("globex.com", "Acme Incorporated", "Energy"),
                org("acme.com", "Acme Inc", "Tech"),
            ],
            vec![],
        );
        let out = n.normalize("Acme Incorporated", "https://WWW.ACME.COM", "Other");
        assert_eq!(out.account, "Acme Incorporated");
        let out = n.normalize("Acme Incorporated", "https://ACME.COM/about", "Other");
        assert_eq!(out, NormalizedOrg::new("Acme Inc", "Tech", "Other"));
    }

    #[test]
    fn fuzzy_match_above_threshold() {
        let n = normalizer(vec![org("acme.io", "Acme, Inc.", "Tech")], vec![]);
        let out = n.normalize("Acme Inc", "N/A", "Software");
        assert_eq!(out, NormalizedOrg::new("Acme, Inc.", "Tech", "Software"));
    }

    #[test]
    fn weak_fuzzy_score_falls_through_to_industry_rules() {
        let n = normalizer(
            vec![org("acme.io", "Acme Inc", "Tech")],
            vec![("Software", "Technology")],
        );
        let out = n.normalize("Globex", "N/A", "Software");
        assert_eq!(out, NormalizedOrg::new("Globex", "Technology", "Software"));
    }

    struct FixedScores(Vec<(&'static str, f64)>);

    impl SimilarityScorer for FixedScores {
        fn score(&self, _left: &str, right: &str) -> f64 {
            self.0
                .iter()
                .find(|(name, _)| *name == right)
                .map_or(0.0, |(_, score)| *score)
        }
    }

    fn scored(orgs: Vec<OrgMappingEntry>, scores: Vec<(&'static str, f64)>) -> OrgNormalizer {
        OrgNormalizer::with_scorer(
            ReferenceTables::new(orgs, vec![]),
            Box::new(FixedScores(scores)),
            config::FUZZY_MATCH_THRESHOLD,
        )
    }

    #[test]
    fn fuzzy_threshold_is_strict() {
        let orgs = vec![org("acme.io", "Acme Inc", "Tech")];
        let at_threshold = scored(orgs.clone(), vec![("Acme Inc", 80.0)]);
        let out = at_threshold.normalize("Acme", "N/A", "Software");
        assert_eq!(out, NormalizedOrg::new("Acme", "Software", "Software"));

        let above = scored(orgs, vec![("Acme Inc", 80.5)]);
        let out = above.normalize("Acme", "N/A", "Software");
        assert_eq!(out, NormalizedOrg::new("Acme Inc", "Tech", "Software"));
    }

    #[test]
    fn tied_fuzzy_scores_keep_the_first_entry() {
        let n = scored(
            vec![
                org("low.io", "Acme Low", "Retail"),
                org("one.io", "Acme One", "Tech"),
                org("two.io", "Acme Two", "Energy"),
            ],
            vec![("Acme Low", 85.0), ("Acme One", 92.0), ("Acme Two", 92.0)],
        );
        let out = n.normalize("Acme", "N/A", "Other");
        assert_eq!(out, NormalizedOrg::new("Acme One", "Tech", "Other"));
    }

    #[test]
    fn industry_code_equal_to_a_canonical_industry_is_kept() {
        let n = normalizer(
            vec![org("acme.io", "Acme Inc", "Tech")],
            vec![("Tech", "Should Not Apply")],
        );
        let out = n.normalize("Globex", "N/A", "Tech");
        assert_eq!(out, NormalizedOrg::new("Globex", "Tech", "Tech"));
    }

    #[test]
    fn nothing_matches_returns_input_unchanged() {
        let n = normalizer(vec![], vec![]);
        let out = n.normalize("Initech", "initech.com", "Consulting");
        assert_eq!(out, NormalizedOrg::new("Initech", "Consulting", "Consulting"));
    }

    #[test]
    fn normalization_is_repeatable() {
        let n = normalizer(
            vec![org("acme.com", "Acme Inc", "Tech"), org("x.com", "Globex", "Energy")],
            vec![("Oil", "Energy")],
        );
        let inputs = [
            ("Acme", "acme.com", "Other"),
            ("Globex Corp", "N/A", "Oil"),
            ("", "", ""),
            ("N/A", "not a url at all", "N/A"),
        ];
        for (name, site, industry) in inputs {
            assert_eq!(n.normalize(name, site, industry), n.normalize(name, site, industry));
        }
    }

    #[test]
    fn website_host_handles_bare_domains_and_placeholders() {
        assert_eq!(website_host("acme.com").as_deref(), Some("acme.com"));
        assert_eq!(website_host("HTTPS://Acme.com/x?y=1").as_deref(), Some("acme.com"));
        assert_eq!(website_host("N/A"), None);
        assert_eq!(website_host(""), None);
    }
}
