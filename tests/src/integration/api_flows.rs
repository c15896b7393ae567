//! # API Flows
//!
//! `HttpSubmissionApi` against the REST endpoints of the analysis server:
//! multipart upload, bearer auth, status polling and report retrieval.

#[cfg(test)]
mod tests {
    use shared_types::{ModuleId, RiskLevel, SubmissionId};
    use submission_session::{ApiError, Document, HttpSubmissionApi, SessionConfig};

    use crate::integration::frames;
    use crate::integration::{AnalysisServer, UPLOADED_SUBMISSION_ID};

    fn id(raw: &str) -> SubmissionId {
        SubmissionId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_create_submission_uploads_multipart() {
        let server = AnalysisServer::start().await.unwrap();
        let config = SessionConfig {
            auth_token: Some("instructor-token".to_string()),
            ..server.config()
        };
        let api = HttpSubmissionApi::new(config);

        let receipt = api
            .create_submission(
                Document::new("essay.md", b"# The Tempest\n\nA reading.".to_vec()),
                &[ModuleId::AiDetection, ModuleId::Plagiarism],
                Some("assignment-7"),
            )
            .await
            .unwrap();

        assert_eq!(receipt.submission_id.as_str(), UPLOADED_SUBMISSION_ID);
        assert_eq!(receipt.status, "processing");
        assert!(!receipt.is_cached());
        assert_eq!(receipt.estimated_seconds, Some(45));

        let uploads = server.uploads();
        assert_eq!(uploads.len(), 1);
        let upload = &uploads[0];
        assert_eq!(upload.file_name.as_deref(), Some("essay.md"));
        assert_eq!(upload.size, 25);
        assert_eq!(upload.modules.as_deref(), Some("ai_detection,plagiarism"));
        assert_eq!(upload.assignment_id.as_deref(), Some("assignment-7"));
        assert_eq!(upload.authorization.as_deref(), Some("Bearer instructor-token"));
    }

    #[tokio::test]
    async fn test_document_from_disk_is_uploaded() {
        let server = AnalysisServer::start().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab-report.txt");
        std::fs::write(&path, "Observations and results.").unwrap();

        let api = HttpSubmissionApi::new(server.config());
        let document = Document::from_path(&path).await.unwrap();
        api.create_submission(document, &ModuleId::DEFAULT_SELECTION, None)
            .await
            .unwrap();

        let upload = &server.uploads()[0];
        assert_eq!(upload.file_name.as_deref(), Some("lab-report.txt"));
        assert_eq!(
            upload.modules.as_deref(),
            Some("ai_detection,plagiarism,writing_profile")
        );
        assert!(upload.assignment_id.is_none());
        assert!(upload.authorization.is_none());
    }

    #[tokio::test]
    async fn test_invalid_document_never_reaches_server() {
        let server = AnalysisServer::start().await.unwrap();
        let api = HttpSubmissionApi::new(server.config());

        let err = api
            .create_submission(
                Document::new("payload.exe", vec![0x4d, 0x5a]),
                &[ModuleId::AiDetection],
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidSubmission(_)));
        assert!(server.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let server = AnalysisServer::start().await.unwrap();
        server.require_token("secret");
        let api = HttpSubmissionApi::new(server.config());

        let err = api.get_status(&id("sub-locked")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));

        let authorized = HttpSubmissionApi::new(SessionConfig {
            auth_token: Some("secret".to_string()),
            ..server.config()
        });
        assert!(authorized.get_status(&id("sub-locked")).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_reflects_report() {
        let server = AnalysisServer::start().await.unwrap();
        let api = HttpSubmissionApi::new(server.config());

        let status = api.get_status(&id("sub-status")).await.unwrap();
        assert_eq!(status.status, "processing");
        assert!(status.integrity_score.is_none());

        server.report(
            "sub-status",
            frames::report("sub-status", 0.71, "HIGH", &[("ai_detection", 0.9, 1.0)]),
        );
        let status = api.get_status(&id("sub-status")).await.unwrap();
        assert_eq!(status.status, "completed");
        assert_eq!(status.integrity_score, Some(0.71));
        assert_eq!(status.risk_level, Some(RiskLevel::High));
    }

    #[tokio::test]
    async fn test_fetch_report() {
        let server = AnalysisServer::start().await.unwrap();
        server.report(
            "sub-report",
            frames::report(
                "sub-report",
                0.71,
                "HIGH",
                &[("ai_detection", 0.9, 0.6), ("plagiarism", 0.4, 0.4)],
            ),
        );
        let api = HttpSubmissionApi::new(server.config());

        let report = api.fetch_report(&id("sub-report")).await.unwrap();
        assert_eq!(report.submission_id.as_str(), "sub-report");
        assert!(report.risk_is_consistent());
        assert_eq!(report.module(ModuleId::AiDetection).unwrap().weight, Some(0.6));
        assert_eq!(report.flags.len(), 1);
        assert!(report.pdf_download_url.is_some());

        let err = api.fetch_report(&id("sub-unknown")).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
