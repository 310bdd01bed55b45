use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use stp_core::{Decision, EntityRecord, Settings};
use stp_decision::{DecisionEngine, IntentClassifier};
use stp_ocr::{DocumentPipeline, DocumentText, OcrBackend, PdfRasterizer};

#[derive(Debug, Args)]
pub struct OcrArgs {
    /// Scanned document: JPEG, PNG or PDF.
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct DecideArgs {
    /// Entity record produced by the extraction service.
    pub entities: PathBuf,

    /// Intent rules (TOML `[[rule]]` tables) replacing the built-in set.
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    pub file: PathBuf,
    pub entities: PathBuf,

    #[arg(long)]
    pub rules: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutput {
    pub document: DocumentText,
    pub decision: Decision,
}

pub async fn ocr(settings: &Settings, args: OcrArgs) -> Result<serde_json::Value> {
    let text = run_text_stage(settings, &args.file).await?;
    Ok(serde_json::to_value(text)?)
}

pub async fn decide(settings: &Settings, args: DecideArgs) -> Result<serde_json::Value> {
    let engine = build_engine(settings, args.rules.as_deref())?;
    let record = load_entities(&args.entities).await?;
    Ok(serde_json::to_value(engine.decide(&record))?)
}

pub async fn process(settings: &Settings, args: ProcessArgs) -> Result<serde_json::Value> {
    let engine = build_engine(settings, args.rules.as_deref())?;
    let record = load_entities(&args.entities).await?;
    let document = run_text_stage(settings, &args.file).await?;
    let decision = engine.decide(&record);
    Ok(serde_json::to_value(ProcessOutput { document, decision })?)
}

async fn run_text_stage(settings: &Settings, file: &Path) -> Result<DocumentText> {
    let pipeline = DocumentPipeline::with_rasterizer(settings, recognizer(settings), rasterizer(settings))
        .context("building document pipeline")?;
    pipeline
        .process_file(file)
        .await
        .with_context(|| format!("processing {}", file.display()))
}

fn build_engine(settings: &Settings, rules: Option<&Path>) -> Result<DecisionEngine> {
    let Some(path) = rules else {
        return Ok(DecisionEngine::new(settings));
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading intent rules {}", path.display()))?;
    let classifier = IntentClassifier::from_toml(&content)
        .with_context(|| format!("parsing intent rules {}", path.display()))?;
    Ok(DecisionEngine::with_classifier(settings, classifier))
}

async fn load_entities(path: &Path) -> Result<EntityRecord> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading entity record {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing entity record {}", path.display()))
}

#[cfg(feature = "tesseract")]
fn recognizer(settings: &Settings) -> Box<dyn OcrBackend> {
    use stp_ocr::recognizer::tesseract_backend::TesseractRecognizer;
    Box::new(TesseractRecognizer::new(
        &settings.recognition,
        settings.preprocess.target_dpi,
    ))
}

#[cfg(not(feature = "tesseract"))]
fn recognizer(_settings: &Settings) -> Box<dyn OcrBackend> {
    tracing::warn!("built without the `tesseract` feature, recognition yields no text");
    Box::new(stp_ocr::UnavailableRecognizer)
}

/// Library directory taken from `PDFIUM_LIB_DIR`, system library otherwise.
#[cfg(feature = "pdfium")]
fn rasterizer(settings: &Settings) -> Box<dyn PdfRasterizer> {
    use stp_ocr::pages::pdfium_backend::PdfiumRasterizer;
    let library_dir = std::env::var_os("PDFIUM_LIB_DIR").map(PathBuf::from);
    Box::new(PdfiumRasterizer::new(library_dir, settings.preprocess.max_dimension))
}

#[cfg(not(feature = "pdfium"))]
fn rasterizer(_settings: &Settings) -> Box<dyn PdfRasterizer> {
    Box::new(stp_ocr::NoPdfSupport)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSFER: &str = r#"{
        "customer": {"name": "Ayşe Yılmaz", "nationalId": "10000000146"},
        "senderAccount": {"iban": "TR330006100519786457841326"},
        "receiverAccount": {"iban": "TR190006200012345678901234"},
        "transaction": {"amount": 2500},
        "documentAnalysis": {"documentType": "eft_form", "intent": "havale"}
    }"#;

    #[tokio::test]
    async fn decide_reads_entity_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        tokio::fs::write(&path, TRANSFER).await.unwrap();

        let out = decide(&Settings::default(), DecideArgs { entities: path, rules: None })
            .await
            .unwrap();
        assert_eq!(out["category"], "APPROVED");
        assert_eq!(out["confidence"], 100.0);
    }

    #[tokio::test]
    async fn decide_uses_custom_rules() {
        let dir = tempfile::tempdir().unwrap();
        let entities = dir.path().join("entities.json");
        let rules = dir.path().join("rules.toml");
        tokio::fs::write(&entities, TRANSFER).await.unwrap();
        tokio::fs::write(
            &rules,
            "[[rule]]\nname = \"limit\"\nintent = \"transfer_limit_increase\"\npriority = 5\nkeywords = [\"havale\"]\n",
        )
        .await
        .unwrap();

        let out = decide(&Settings::default(), DecideArgs { entities, rules: Some(rules) })
            .await
            .unwrap();
        assert_eq!(out["intent"], "transfer_limit_increase");
        assert_eq!(out["confidence"], 75.0);
    }

    #[tokio::test]
    async fn malformed_entities_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = decide(&Settings::default(), DecideArgs { entities: path, rules: None })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("parsing entity record"));
    }

    #[tokio::test]
    async fn ocr_rejects_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.gif");
        tokio::fs::write(&path, b"GIF89a").await.unwrap();

        let err = ocr(&Settings::default(), OcrArgs { file: path }).await.unwrap_err();
        assert!(err.to_string().starts_with("processing"));
    }
}
