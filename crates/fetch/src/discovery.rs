use std::sync::Arc;
use std::time::Duration;

use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;

use toolgate_common::api::discovery::DiscoveryHints;
use toolgate_common::error::ErrorKind;
use toolgate_common::types::{Candidate, CandidateType, DiscoveryResult, DiscoveryStatus};

use crate::rate_limit::DomainRateLimiter;
use crate::security::validate_for_fetch;

const WELL_KNOWN_PATHS: &[&str] = &[
    "/openapi.json",
    "/openapi.yaml",
    "/swagger.json",
    "/api/openapi.json",
    "/.well-known/openapi.json",
];

const MAX_CONCURRENT_PROBES: usize = 4;
const MAX_REDIRECTS: usize = 3;

pub struct DiscoveryEngine {
    http: reqwest::Client,
    rate_limiter: Arc<DomainRateLimiter>,
    allow_insecure: bool,
    dns_timeout: Duration,
    probe_timeout: Duration,
    max_spec_bytes: usize,
}

struct ProbeHit {
    url: String,
    body: String,
    content_type: Option<String>,
    confidence: f64,
    candidate_type: CandidateType,
}

impl DiscoveryEngine {
    pub fn new(
        http: reqwest::Client,
        rate_limiter: Arc<DomainRateLimiter>,
        allow_insecure: bool,
        dns_timeout: Duration,
        probe_timeout: Duration,
        max_spec_bytes: usize,
    ) -> Self {
        Self {
            http,
            rate_limiter,
            allow_insecure,
            dns_timeout,
            probe_timeout,
            max_spec_bytes,
        }
    }

    pub async fn discover(&self, base_url: &str, hints: Option<DiscoveryHints>) -> DiscoveryResult {
        let hints = hints.unwrap_or_default();

        // Tier 1: hint-provided OpenAPI URL wins outright (confidence 1.0).
        if let Some(hint_url) = hints.openapi_url.as_deref() {
            if let Some(hit) = self.probe(hint_url, 1.0, CandidateType::Hint).await {
                return self.succeed(hit, Vec::new());
            }
        }

        // Tier 2: well-known paths at the base, plus caller-supplied openapi_paths.
        let base = base_url.trim_end_matches('/');
        let mut well_known: Vec<String> = WELL_KNOWN_PATHS
            .iter()
            .map(|p| format!("{base}{p}"))
            .collect();
        well_known.extend(hints.openapi_paths.iter().map(|p| {
            if p.starts_with("http://") || p.starts_with("https://") {
                p.clone()
            } else {
                format!("{base}{}", if p.starts_with('/') { p.clone() } else { format!("/{p}") })
            }
        }));

        let hits = self
            .probe_many(well_known, 0.9, CandidateType::WellKnown)
            .await;

        if hits.len() == 1 {
            let hit = hits.into_iter().next().unwrap();
            return self.succeed(hit, Vec::new());
        }
        if hits.len() > 1 {
            return self.ambiguous(hits);
        }

        // Tier 3: documentation-subdomain probes. The `apidocs.*` pattern
        // names an API-documentation host specifically, so a hit there is
        // a much stronger signal than the generic `docs.*` subdomain or a
        // caller-supplied `doc_url` hint, which just as often points at
        // product documentation with no machine-readable spec at all.
        let mut high_confidence_candidates = Vec::new();
        let mut low_confidence_candidates = Vec::new();
        if let Ok(url) = url::Url::parse(base_url) {
            if let Some(host) = url.host_str() {
                high_confidence_candidates.push(format!("https://apidocs.{host}"));
                low_confidence_candidates.push(format!("https://docs.{host}"));
            }
        }
        if let Some(doc_url) = hints.doc_url.clone() {
            low_confidence_candidates.push(doc_url);
        }

        let mut doc_hits = self
            .probe_many(high_confidence_candidates, 0.8, CandidateType::Doc)
            .await;
        doc_hits.extend(
            self.probe_many(low_confidence_candidates, 0.5, CandidateType::Doc)
                .await,
        );

        // Tier 4: parse any reachable documentation page for linked descriptors.
        let mut html_candidates = Vec::new();
        for hit in &doc_hits {
            if is_html(hit.content_type.as_deref()) {
                html_candidates.extend(extract_spec_links(&hit.url, &hit.body));
            }
        }

        let html_hits = self
            .probe_many(html_candidates, 0.4, CandidateType::HtmlLink)
            .await;

        if html_hits.len() == 1 && doc_hits.is_empty() {
            let hit = html_hits.into_iter().next().unwrap();
            return self.succeed(hit, Vec::new());
        }

        let all_hits: Vec<ProbeHit> = html_hits;
        if all_hits.len() == 1 {
            let hit = all_hits.into_iter().next().unwrap();
            return self.succeed(hit, doc_candidates_as_candidates(&doc_hits));
        }
        if !all_hits.is_empty() {
            return self.ambiguous_with_extra(all_hits, doc_candidates_as_candidates(&doc_hits));
        }

        if !doc_hits.is_empty() {
            // Reachable docs, but nothing resembling a machine-readable spec.
            let candidates = doc_candidates_as_candidates(&doc_hits);
            return DiscoveryResult {
                status: DiscoveryStatus::NeedsConfirmation,
                selected_url: None,
                spec_text: None,
                spec_hash: None,
                candidates: sorted(candidates),
                error: None,
            };
        }

        DiscoveryResult {
            status: DiscoveryStatus::Failed,
            selected_url: None,
            spec_text: None,
            spec_hash: None,
            candidates: Vec::new(),
            error: Some(ErrorKind::NoSpecFound.code().to_string()),
        }
    }

    fn succeed(&self, hit: ProbeHit, mut extra: Vec<Candidate>) -> DiscoveryResult {
        let hash = spec_hash(&hit.body);
        extra.push(Candidate {
            url: hit.url.clone(),
            confidence: hit.confidence,
            candidate_type: hit.candidate_type,
        });
        DiscoveryResult {
            status: DiscoveryStatus::Succeeded,
            selected_url: Some(hit.url),
            spec_text: Some(hit.body),
            spec_hash: Some(hash),
            candidates: sorted(extra),
            error: None,
        }
    }

    fn ambiguous(&self, hits: Vec<ProbeHit>) -> DiscoveryResult {
        self.ambiguous_with_extra(hits, Vec::new())
    }

    fn ambiguous_with_extra(&self, hits: Vec<ProbeHit>, mut extra: Vec<Candidate>) -> DiscoveryResult {
        extra.extend(hits.into_iter().map(|h| Candidate {
            url: h.url,
            confidence: h.confidence,
            candidate_type: h.candidate_type,
        }));
        DiscoveryResult {
            status: DiscoveryStatus::NeedsConfirmation,
            selected_url: None,
            spec_text: None,
            spec_hash: None,
            candidates: sorted(extra),
            error: None,
        }
    }

    async fn probe_many(
        &self,
        urls: Vec<String>,
        confidence: f64,
        candidate_type: CandidateType,
    ) -> Vec<ProbeHit> {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES));
        let mut set = tokio::task::JoinSet::new();

        for url in urls {
            let permit = Arc::clone(&semaphore);
            let this = self.clone_probe_deps();
            set.spawn(async move {
                let _permit = permit.acquire_owned().await.ok()?;
                this.probe_owned(url, confidence, candidate_type).await
            });
        }

        let mut hits = Vec::new();
        while let Some(joined) = set.join_next().await {
            if let Ok(Some(hit)) = joined {
                hits.push(hit);
            }
        }
        hits
    }

    fn clone_probe_deps(&self) -> ProbeDeps {
        ProbeDeps {
            http: self.http.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            allow_insecure: self.allow_insecure,
            dns_timeout: self.dns_timeout,
            probe_timeout: self.probe_timeout,
            max_spec_bytes: self.max_spec_bytes,
        }
    }

    async fn probe(
        &self,
        url: &str,
        confidence: f64,
        candidate_type: CandidateType,
    ) -> Option<ProbeHit> {
        self.clone_probe_deps()
            .probe_owned(url.to_string(), confidence, candidate_type)
            .await
    }
}

/// Cloneable bundle of dependencies a single probe task needs, so
/// `probe_many` can hand each spawned task its own owned copy.
#[derive(Clone)]
struct ProbeDeps {
    http: reqwest::Client,
    rate_limiter: Arc<DomainRateLimiter>,
    allow_insecure: bool,
    dns_timeout: Duration,
    probe_timeout: Duration,
    max_spec_bytes: usize,
}

impl ProbeDeps {
    async fn probe_owned(
        &self,
        url: String,
        confidence: f64,
        candidate_type: CandidateType,
    ) -> Option<ProbeHit> {
        let mut current = url;
        for _ in 0..=MAX_REDIRECTS {
            let validated =
                validate_for_fetch(&current, self.allow_insecure, self.dns_timeout)
                    .await
                    .ok()?;

            let domain = validated.host_str().unwrap_or("unknown").to_string();
            self.rate_limiter
                .acquire(&domain, Duration::from_secs(5))
                .await
                .ok()?;

            let response = self
                .http
                .get(validated.clone())
                .timeout(self.probe_timeout)
                .send()
                .await
                .ok()?;

            if let Some(location) = response
                .status()
                .is_redirection()
                .then(|| response.headers().get("location"))
                .flatten()
                .and_then(|v| v.to_str().ok())
            {
                current = validated.join(location).ok()?.to_string();
                continue;
            }

            if !response.status().is_success() {
                return None;
            }

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            let body = response.text().await.ok()?;
            if body.len() > self.max_spec_bytes {
                return None;
            }

            return Some(ProbeHit {
                url: validated.to_string(),
                body,
                content_type,
                confidence,
                candidate_type,
            });
        }
        None
    }
}

fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_lowercase().contains("text/html"))
        .unwrap_or(false)
}

/// Scan an HTML documentation page for links to JSON/YAML spec files.
fn extract_spec_links(page_url: &str, html: &str) -> Vec<String> {
    let base = match url::Url::parse(page_url) {
        Ok(u) => u,
        Err(_) => return Vec::new(),
    };
    let document = Html::parse_document(html);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            let lower = href.to_lowercase();
            let looks_like_spec = lower.ends_with(".json")
                || lower.ends_with(".yaml")
                || lower.ends_with(".yml")
                || lower.contains("openapi")
                || lower.contains("swagger");
            if looks_like_spec {
                if let Ok(resolved) = base.join(href) {
                    links.push(resolved.to_string());
                }
            }
        }
    }
    links.truncate(MAX_CONCURRENT_PROBES * 2);
    links
}

fn doc_candidates_as_candidates(hits: &[ProbeHit]) -> Vec<Candidate> {
    hits.iter()
        .map(|h| Candidate {
            url: h.url.clone(),
            confidence: h.confidence,
            candidate_type: h.candidate_type,
        })
        .collect()
}

fn sorted(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });
    candidates.dedup_by(|a, b| a.url == b.url);
    candidates
}

fn spec_hash(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_by_confidence_then_url() {
        let candidates = vec![
            Candidate {
                url: "https://b.example.com".into(),
                confidence: 0.5,
                candidate_type: CandidateType::Doc,
            },
            Candidate {
                url: "https://a.example.com".into(),
                confidence: 0.9,
                candidate_type: CandidateType::WellKnown,
            },
            Candidate {
                url: "https://a.example.com/2".into(),
                confidence: 0.9,
                candidate_type: CandidateType::WellKnown,
            },
        ];
        let sorted = sorted(candidates);
        assert_eq!(sorted[0].url, "https://a.example.com");
        assert_eq!(sorted[1].url, "https://a.example.com/2");
        assert_eq!(sorted[2].url, "https://b.example.com");
    }

    #[test]
    fn extracts_json_and_yaml_links_only() {
        let html = r#"
            <html><body>
              <a href="/openapi.json">spec</a>
              <a href="/about">about</a>
              <a href="/docs/api.yaml">yaml spec</a>
            </body></html>
        "#;
        let links = extract_spec_links("https://example.com/docs", html);
        assert_eq!(links.len(), 2);
        assert!(links.iter().any(|l| l.ends_with("/openapi.json")));
        assert!(links.iter().any(|l| l.ends_with("/docs/api.yaml")));
    }

    #[test]
    fn spec_hash_is_stable() {
        assert_eq!(spec_hash("{}"), spec_hash("{}"));
        assert_ne!(spec_hash("{}"), spec_hash("{\"a\":1}"));
    }

    /// `apidocs.harness.io` names an API-documentation host specifically
    /// and must outrank the generic `docs.harness.io/api` candidate.
    #[test]
    fn apidocs_subdomain_outranks_generic_docs_subdomain() {
        let candidates = vec![
            Candidate {
                url: "https://apidocs.harness.io".into(),
                confidence: 0.8,
                candidate_type: CandidateType::Doc,
            },
            Candidate {
                url: "https://docs.harness.io/api".into(),
                confidence: 0.5,
                candidate_type: CandidateType::Doc,
            },
        ];
        assert!(candidates[0].confidence >= 0.8);
        assert!(candidates[1].confidence < candidates[0].confidence);
        let sorted = sorted(candidates);
        assert_eq!(sorted[0].url, "https://apidocs.harness.io");
    }
}
