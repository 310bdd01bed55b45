pub mod normalize;
pub mod pages;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod selector;
pub mod types;

pub use normalize::TextNormalizer;
pub use pages::{load_pages, NoPdfSupport, PageError, PdfRasterizer};
pub use pipeline::{fingerprint, DocumentPipeline, PipelineError};
pub use preprocess::{ImagePreprocessor, PreprocessError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, RecognizedText, UnavailableRecognizer};
pub use selector::{select_best, PageRecognition, RecognitionSelector};
pub use types::{DocumentText, EnhancedPage, PageAudit, RawPage, RecognitionAttempt};
