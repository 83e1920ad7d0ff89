use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::{
    ClassificationPolicy, MatchRequest, MatchResponse, MatchingService, ReferenceCorpus,
};
use crate::{log_info, log_warn, vision::FeatureVector};

const ENABLE_LOGS: bool = true;

/// Answers match requests against one corpus snapshot. Requests never
/// modify the corpus, so a backend can be shared freely.
#[derive(Debug, Clone)]
pub struct MatchingBackend {
    service: MatchingService,
    corpus: ReferenceCorpus,
    top_k: usize,
    policy: Option<ClassificationPolicy>,
}

impl MatchingBackend {
    pub fn new(service: MatchingService, corpus: ReferenceCorpus, top_k: usize) -> Self {
        Self {
            service,
            corpus,
            top_k,
            policy: None,
        }
    }

    /// Attaches a classification verdict to every successful response.
    pub fn with_policy(mut self, policy: ClassificationPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn corpus(&self) -> &ReferenceCorpus {
        &self.corpus
    }

    pub fn process(&self, request: &MatchRequest) -> MatchResponse {
        if request.vector.iter().any(|value| !value.is_finite()) {
            return MatchResponse::error("query vector contains non-finite values");
        }

        let query = FeatureVector::new(request.vector.clone());
        let k = request.top_k.unwrap_or(self.top_k);
        let records = self.corpus.records();

        let results = match self.service.find_matches(&query, records, k) {
            Ok(results) => results,
            Err(err) => return MatchResponse::error(err.to_string()),
        };

        let classification = match &self.policy {
            Some(policy) => match self.service.classify(&query, records, policy) {
                Ok(classification) => Some(classification),
                Err(err) => return MatchResponse::error(err.to_string()),
            },
            None => None,
        };

        MatchResponse::ok(results, classification)
    }

    pub fn handle_line(&self, line: &str) -> MatchResponse {
        match serde_json::from_str::<MatchRequest>(line) {
            Ok(request) => self.process(&request),
            Err(err) => MatchResponse::error(format!("malformed request: {err}")),
        }
    }

    /// Reads one JSON request per line and writes one JSON response per
    /// line until the reader is exhausted. Blank lines are skipped.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        log_info!(
            "Matching backend serving {} reference records",
            self.corpus.len()
        );

        let mut lines = reader.lines();
        let mut handled = 0u64;
        let mut accepted = 0u64;
        while let Some(line) = lines
            .next_line()
            .await
            .context("failed to read request line")?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = self.handle_line(line);
            if let Some(err) = &response.error {
                log_warn!("Match request failed: {err}");
            }
            if response
                .classification
                .as_ref()
                .is_some_and(|classification| classification.confidence.is_accepted())
            {
                accepted += 1;
            }

            let mut encoded =
                serde_json::to_string(&response).context("failed to encode response")?;
            encoded.push('\n');
            writer
                .write_all(encoded.as_bytes())
                .await
                .context("failed to write response")?;
            writer.flush().await.context("failed to flush response")?;
            handled += 1;
        }

        log_info!("Matching backend finished after {handled} requests, {accepted} classified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::models::ReferenceRecord, matching::Confidence};

    fn backend() -> MatchingBackend {
        let records = vec![
            ReferenceRecord {
                id: 1,
                label: "library".into(),
                source_path: "refs/library/1.jpg".into(),
                vector: FeatureVector::new(vec![1.0, 0.0]),
            },
            ReferenceRecord {
                id: 2,
                label: "gate".into(),
                source_path: "refs/gate/2.jpg".into(),
                vector: FeatureVector::new(vec![0.0, 1.0]),
            },
        ];
        MatchingBackend::new(MatchingService::default(), ReferenceCorpus::new(records), 5)
    }

    #[test]
    fn ranks_valid_requests() {
        let response = backend().process(&MatchRequest {
            vector: vec![1.0, 0.1],
            top_k: Some(1),
        });
        assert!(response.is_ok());
        assert_eq!(response.result.len(), 1);
        assert_eq!(response.result[0].label, "library");
        assert_eq!(response.result[0].path, "refs/library/1.jpg");
        assert!(response.classification.is_none());
    }

    #[test]
    fn dimension_errors_become_error_responses() {
        let backend = backend();
        let response = backend.process(&MatchRequest {
            vector: vec![1.0, 0.0, 0.0],
            top_k: None,
        });
        assert!(!response.is_ok());
        assert!(response.result.is_empty());
        assert!(response.error.is_some());
        assert_eq!(backend.corpus().len(), 2);
    }

    #[test]
    fn classification_is_attached_when_configured() {
        let backend = backend().with_policy(ClassificationPolicy::default());
        let response = backend.process(&MatchRequest {
            vector: vec![1.0, 0.0],
            top_k: None,
        });
        let classification = response.classification.unwrap();
        assert_eq!(classification.confidence, Confidence::High);
        assert_eq!(classification.label.as_deref(), Some("library"));
    }

    #[tokio::test]
    async fn serves_json_lines() {
        let input = b"{\"vector\": [0.0, 1.0]}\n\nnot json\n{\"vector\": [1.0, 0.0], \"topK\": 1}\n";
        let mut output = Vec::new();

        backend().serve(&input[..], &mut output).await.unwrap();

        let responses: Vec<MatchResponse> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].result[0].label, "gate");
        assert_eq!(responses[0].result.len(), 2);
        assert!(!responses[1].is_ok());
        assert_eq!(responses[2].result.len(), 1);
        assert_eq!(responses[2].result[0].label, "library");
    }
}
