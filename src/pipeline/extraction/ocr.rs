use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::{BoundingBox, OcrEngine, OcrPageResult, TextBlock};
use super::ExtractionError;

// ═══════════════════════════════════════════════════════════
// Worker
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Ready,
}

struct WorkerInner {
    engine: Box<dyn OcrEngine>,
    state: WorkerState,
}

/// Long-lived recognition worker wrapping one OCR engine.
///
/// One recognition is in flight at a time; callers queue on the mutex.
/// The engine is terminated when the worker is dropped.
pub struct OcrWorker {
    inner: Mutex<WorkerInner>,
}

impl OcrWorker {
    pub fn new(engine: Box<dyn OcrEngine>) -> Self {
        Self {
            inner: Mutex::new(WorkerInner {
                engine,
                state: WorkerState::Idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkerInner> {
        // A panic mid-recognition leaves no partial state worth discarding.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Acquire the engine. A no-op on a ready worker; on failure the worker
    /// stays idle and the call can be retried.
    pub fn initialize(&self) -> Result<(), ExtractionError> {
        let mut inner = self.lock();
        if inner.state == WorkerState::Ready {
            return Ok(());
        }
        inner.engine.initialize()?;
        inner.state = WorkerState::Ready;
        tracing::info!("OCR worker ready");
        Ok(())
    }

    pub fn state(&self) -> WorkerState {
        self.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == WorkerState::Ready
    }

    /// Recognize one encoded bitmap.
    ///
    /// A failure here is local to the bitmap unless the engine reports
    /// itself unusable, in which case the worker drops back to idle.
    pub fn recognize(&self, image_png: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let mut inner = self.lock();
        if inner.state != WorkerState::Ready {
            return Err(ExtractionError::OcrNotReady);
        }

        match inner.engine.recognize(image_png) {
            Ok(mut result) => {
                result.confidence = clamp_unit(result.confidence);
                for block in &mut result.blocks {
                    block.confidence = clamp_unit(block.confidence);
                }
                Ok(result)
            }
            Err(e) => {
                if e.is_engine_unavailable() {
                    tracing::warn!(error = %e, "OCR engine lost, worker needs re-initialization");
                    inner.state = WorkerState::Idle;
                }
                Err(e)
            }
        }
    }

    /// Release the engine. Safe on a worker that was never initialized.
    pub fn terminate(&self) {
        let mut inner = self.lock();
        if inner.state == WorkerState::Ready {
            inner.engine.terminate();
            inner.state = WorkerState::Idle;
            tracing::debug!("OCR worker terminated");
        }
    }
}

impl Drop for OcrWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

// ═══════════════════════════════════════════════════════════
// Tesseract
// ═══════════════════════════════════════════════════════════

/// Locate a tessdata directory holding every requested language.
///
/// Order: explicit directory (config or `TESSDATA_PREFIX`), then common
/// system install paths.
pub fn find_tessdata_dir(explicit: Option<&Path>, languages: &str) -> Result<PathBuf, ExtractionError> {
    let has_languages = |dir: &Path| {
        languages
            .split('+')
            .filter(|l| !l.is_empty())
            .all(|lang| dir.join(format!("{lang}.traineddata")).exists())
    };

    if let Some(dir) = explicit {
        if has_languages(dir) {
            return Ok(dir.to_path_buf());
        }
        tracing::warn!(path = %dir.display(), languages, "Configured tessdata directory lacks traineddata");
    }

    let candidates = [
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4.00/tessdata",
        "/usr/share/tessdata",
        "/usr/local/share/tessdata",
        "/opt/homebrew/share/tessdata",
    ];

    for path in &candidates {
        let p = PathBuf::from(path);
        if has_languages(&p) {
            return Ok(p);
        }
    }

    Err(ExtractionError::TessdataNotFound(
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(candidates[0])),
    ))
}

/// Tesseract engine holding one API handle between recognitions.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct TesseractEngine {
    tessdata_dir: PathBuf,
    languages: String,
    api: Option<tesseract::Tesseract>,
}

#[cfg(feature = "ocr")]
impl TesseractEngine {
    pub fn new(tessdata_dir: &Path, languages: &str) -> Result<Self, ExtractionError> {
        for lang in languages.split('+').filter(|l| !l.is_empty()) {
            if !tessdata_dir.join(format!("{lang}.traineddata")).exists() {
                return Err(ExtractionError::TessdataNotFound(tessdata_dir.to_path_buf()));
            }
        }

        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            languages: languages.to_string(),
            api: None,
        })
    }

    fn create_api(&self) -> Result<tesseract::Tesseract, ExtractionError> {
        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?;

        tesseract::Tesseract::new(Some(tessdata_str), Some(&self.languages))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractEngine {
    fn initialize(&mut self) -> Result<(), ExtractionError> {
        if self.api.is_none() {
            self.api = Some(self.create_api()?);
            tracing::info!(
                tessdata = %self.tessdata_dir.display(),
                languages = %self.languages,
                "Tesseract OCR initialized"
            );
        }
        Ok(())
    }

    fn recognize(&mut self, image_png: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let api = self.api.take().ok_or(ExtractionError::OcrNotReady)?;

        // set_image consumes the handle; on failure rebuild it so the
        // engine stays usable for the next bitmap.
        let mut api = match api.set_image_from_mem(image_png) {
            Ok(api) => api,
            Err(e) => {
                self.api = Some(self.create_api()?);
                return Err(ExtractionError::OcrProcessing(format!("{e:?}")));
            }
        };

        let outcome = (|| -> Result<OcrPageResult, ExtractionError> {
            let text = api
                .get_text()
                .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;
            let confidence = api.mean_text_conf().clamp(0, 100) as f32 / 100.0;
            let blocks = match api.get_tsv_text(0) {
                Ok(tsv) => parse_tsv_blocks(&tsv),
                Err(e) => {
                    tracing::debug!(error = ?e, "TSV output unavailable, no block geometry");
                    Vec::new()
                }
            };
            Ok(OcrPageResult {
                text,
                confidence,
                blocks,
            })
        })();

        self.api = Some(api);
        outcome
    }

    fn terminate(&mut self) {
        self.api = None;
    }
}

/// Aggregate Tesseract TSV word rows into blocks.
///
/// TSV columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Level 2 rows carry block geometry, level 5 rows
/// carry words. Confidence is 0-100 (-1 when unassigned).
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
pub(crate) fn parse_tsv_blocks(tsv: &str) -> Vec<TextBlock> {
    struct Acc {
        key: (u32, u32),
        bbox: Option<BoundingBox>,
        word_union: Option<BoundingBox>,
        text: String,
        last_line: Option<(u32, u32)>,
        conf_sum: f32,
        conf_count: usize,
    }

    let mut blocks: Vec<Acc> = Vec::new();

    for line in tsv.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            continue;
        }
        let nums: Option<Vec<i64>> = fields[..11].iter().map(|f| f.trim().parse().ok()).collect();
        // Header row and malformed rows fail to parse
        let Some(nums) = nums else { continue };

        let level = nums[0];
        let key = (nums[1].max(0) as u32, nums[2].max(0) as u32);
        let bbox = BoundingBox::from_origin_size(
            nums[6].max(0) as u32,
            nums[7].max(0) as u32,
            nums[8].max(0) as u32,
            nums[9].max(0) as u32,
        );

        let idx = match blocks.iter().position(|b| b.key == key) {
            Some(i) => i,
            None => {
                blocks.push(Acc {
                    key,
                    bbox: None,
                    word_union: None,
                    text: String::new(),
                    last_line: None,
                    conf_sum: 0.0,
                    conf_count: 0,
                });
                blocks.len() - 1
            }
        };
        let acc = &mut blocks[idx];

        match level {
            2 => acc.bbox = Some(bbox),
            5 => {
                let word = fields.get(11).map(|w| w.trim()).unwrap_or_default();
                if word.is_empty() {
                    continue;
                }
                let line_key = (nums[3].max(0) as u32, nums[4].max(0) as u32);
                match acc.last_line {
                    Some(prev) if prev != line_key => acc.text.push('\n'),
                    Some(_) => acc.text.push(' '),
                    None => {}
                }
                acc.last_line = Some(line_key);
                acc.text.push_str(word);

                let conf = nums[10];
                if conf >= 0 {
                    acc.conf_sum += conf.min(100) as f32 / 100.0;
                    acc.conf_count += 1;
                }

                acc.word_union = Some(match acc.word_union {
                    Some(u) => BoundingBox {
                        x0: u.x0.min(bbox.x0),
                        y0: u.y0.min(bbox.y0),
                        x1: u.x1.max(bbox.x1),
                        y1: u.y1.max(bbox.y1),
                    },
                    None => bbox,
                });
            }
            _ => {}
        }
    }

    blocks
        .into_iter()
        .filter(|b| !b.text.is_empty())
        .filter_map(|b| {
            let bbox = b.bbox.or(b.word_union)?;
            let confidence = if b.conf_count == 0 {
                0.0
            } else {
                b.conf_sum / b.conf_count as f32
            };
            Some(TextBlock {
                text: b.text,
                confidence,
                bbox,
            })
        })
        .collect()
}

/// Stand-in used when no OCR backend could be set up. Every `initialize`
/// fails with the original reason, so image documents report `OcrInit`
/// while PDF text layers keep working.
pub struct UnavailableOcrEngine {
    reason: String,
}

impl UnavailableOcrEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl OcrEngine for UnavailableOcrEngine {
    fn initialize(&mut self) -> Result<(), ExtractionError> {
        Err(ExtractionError::OcrInit(self.reason.clone()))
    }

    fn recognize(&mut self, _image_png: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        Err(ExtractionError::OcrNotReady)
    }

    fn terminate(&mut self) {}
}

// ═══════════════════════════════════════════════════════════
// Mock
// ═══════════════════════════════════════════════════════════

/// Mock OCR engine for unit testing without Tesseract.
///
/// Returns the configured text with one block per line. Call counters are
/// shared so tests can inspect them after the engine is boxed into a worker.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
    pub fail_init: bool,
    pub fail_recognize: bool,
    pub init_calls: Arc<AtomicUsize>,
    pub terminate_calls: Arc<AtomicUsize>,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            fail_init: false,
            fail_recognize: false,
            init_calls: Arc::new(AtomicUsize::new(0)),
            terminate_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::new("", 0.0)
        }
    }

    pub fn failing_recognize() -> Self {
        Self {
            fail_recognize: true,
            ..Self::new("", 0.0)
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn initialize(&mut self) -> Result<(), ExtractionError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(ExtractionError::OcrInit("mock engine refused to start".into()));
        }
        Ok(())
    }

    fn recognize(&mut self, _image_png: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        if self.fail_recognize {
            return Err(ExtractionError::OcrProcessing("mock recognition failure".into()));
        }

        let blocks = self
            .text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(i, l)| TextBlock {
                text: l.trim().to_string(),
                confidence: self.confidence,
                bbox: BoundingBox::from_origin_size(0, i as u32 * 20, 400, 18),
            })
            .collect();

        Ok(OcrPageResult {
            text: self.text.clone(),
            confidence: self.confidence,
            blocks,
        })
    }

    fn terminate(&mut self) {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
    }
}
