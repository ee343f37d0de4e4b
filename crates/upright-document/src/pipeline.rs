// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Whole-document pipelines — per-page orientation on a rayon pool and
// per-page classification on tokio tasks, both committing results by page
// index.
//
// Cancellation stops pages that have not started; pages already committed
// are kept and the outcome lists what is missing. A page that cannot be
// rasterised aborts the whole run.

use std::sync::Arc;

use rayon::prelude::*;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use upright_core::error::{Result, UprightError};
use upright_core::{
    ClassificationResult, OrientationResult, PageIndex, PageSlots, PipelineConfig, RotationCandidate,
};

use crate::classify::{ClassifierPage, PageClassifier};
use crate::image::page::PageImage;
use crate::scan::normalize::{NormalizedPages, RotationNormalizer};
use crate::scan::orientation::{OrientationEstimator, select_best};
use crate::scan::preprocess::Preprocessor;
use crate::traits::Rasterizer;

/// Result of an orientation run.
#[derive(Debug)]
pub struct OrientationOutcome {
    pub angles: PageSlots<OrientationResult>,
    /// Upright colour pages, when requested.
    pub upright: Option<NormalizedPages>,
    /// Every candidate's score per page, when requested.
    pub scores: Option<PageSlots<Vec<RotationCandidate>>>,
    pub cancelled: bool,
}

/// One page's share of an orientation run.
struct OrientedPage {
    page: PageIndex,
    angle: u16,
    upright: Option<PageImage>,
    scores: Option<Vec<RotationCandidate>>,
}

/// Rasterise, preprocess, estimate, and optionally normalise every page.
pub struct OrientationPipeline {
    preprocessor: Preprocessor,
    estimator: OrientationEstimator,
    normalizer: RotationNormalizer,
    workers: usize,
    keep_scores: bool,
}

impl OrientationPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            estimator: OrientationEstimator::new(),
            normalizer: RotationNormalizer::new(),
            workers: config.estimator_workers,
            keep_scores: false,
        }
    }

    /// Also keep every candidate's score, for diagnostics.
    pub fn with_scores(mut self, keep_scores: bool) -> Self {
        self.keep_scores = keep_scores;
        self
    }

    /// Orient one page image.
    pub fn orient_page(&self, image: &PageImage) -> u16 {
        let mask = self.preprocessor.prepare(image);
        self.estimator.estimate(&mask)
    }

    fn orient(&self, page: PageIndex, image: &PageImage, normalize: bool) -> OrientedPage {
        let (angle, scores) = if self.keep_scores {
            let mask = self.preprocessor.prepare(image);
            let candidates = self.estimator.score_all(&mask);
            (select_best(&candidates).angle, Some(candidates))
        } else {
            (self.orient_page(image), None)
        };
        debug!(page = %page, angle, "Page oriented");
        OrientedPage {
            page,
            angle,
            upright: normalize.then(|| self.normalizer.normalize(image, angle)),
            scores,
        }
    }

    /// Process every page of `rasterizer` on a dedicated thread pool.
    ///
    /// Pages run in parallel and each page's candidate angles run in
    /// parallel inside the same pool. When `normalize` is set the upright
    /// pages are kept for output.
    #[instrument(skip_all, fields(pages = rasterizer.page_count(), workers = self.workers))]
    pub fn run(
        &self,
        rasterizer: &dyn Rasterizer,
        normalize: bool,
        cancel: &CancellationToken,
    ) -> Result<OrientationOutcome> {
        let page_count = rasterizer.page_count();
        info!(page_count, "Orientation started");

        // 0 lets rayon pick one thread per core.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("upright-orient-{i}"))
            .build()
            .map_err(|err| UprightError::Config(format!("cannot start orientation pool: {}", err)))?;

        let pages: Vec<Option<OrientedPage>> = pool.install(|| {
            (0..page_count)
                .into_par_iter()
                .map(|index| {
                    if cancel.is_cancelled() {
                        return Ok(None);
                    }
                    let page = PageIndex(index);
                    let image = rasterizer.render(page)?;
                    Ok(Some(self.orient(page, &image, normalize)))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut angles = PageSlots::new(page_count);
        let mut upright = normalize.then(|| NormalizedPages::new(page_count));
        let mut scores = self.keep_scores.then(|| PageSlots::new(page_count));
        for oriented in pages.into_iter().flatten() {
            let page = oriented.page;
            angles.commit(page, OrientationResult { page, angle: oriented.angle });
            if let (Some(collected), Some(image)) = (upright.as_mut(), oriented.upright) {
                collected.commit(page, image);
            }
            if let (Some(collected), Some(candidates)) = (scores.as_mut(), oriented.scores) {
                collected.commit(page, candidates);
            }
        }

        let cancelled = cancel.is_cancelled();
        if cancelled {
            warn!(missing = angles.missing().len(), "Orientation cancelled");
        } else {
            info!("Orientation complete");
        }
        Ok(OrientationOutcome {
            angles,
            upright,
            scores,
            cancelled,
        })
    }
}

/// Result of a classification run.
#[derive(Debug)]
pub struct ClassificationOutcome {
    pub classes: PageSlots<ClassificationResult>,
    pub cancelled: bool,
}

/// Classify every page of `rasterizer`, at most `workers` pages at a time.
///
/// Each page is rendered on a blocking thread and classified on its own
/// task. Per-page OCR failures resolve to UNREADABLE inside the classifier;
/// only a rasterisation failure ends the run.
#[instrument(skip_all, fields(pages = rasterizer.page_count(), workers = workers))]
pub async fn classify_document(
    classifier: PageClassifier,
    rasterizer: Arc<dyn Rasterizer>,
    workers: usize,
    cancel: CancellationToken,
) -> Result<ClassificationOutcome> {
    let page_count = rasterizer.page_count();
    info!(page_count, "Classification started");

    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks: JoinSet<Result<ClassificationResult>> = JoinSet::new();

    for index in 0..page_count {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let classifier = classifier.clone();
        let rasterizer = Arc::clone(&rasterizer);
        tasks.spawn(async move {
            let _permit = permit;
            let page = PageIndex(index);
            let image = tokio::task::spawn_blocking(move || rasterizer.render(page))
                .await
                .map_err(|err| UprightError::Rasterize {
                    page,
                    detail: format!("render task aborted: {}", err),
                })??;
            Ok(classifier.classify(&ClassifierPage::new(page, image)).await)
        });
    }

    let mut classes = PageSlots::new(page_count);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(result)) => {
                classes.commit(result.page, result);
            }
            Ok(Err(err)) => {
                tasks.abort_all();
                return Err(err);
            }
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => {}
        }
    }

    let cancelled = cancel.is_cancelled();
    if cancelled {
        warn!(missing = classes.missing().len(), "Classification cancelled");
    } else {
        info!("Classification complete");
    }
    Ok(ClassificationOutcome { classes, cancelled })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use image::{Rgb, RgbImage};
    use upright_core::error::OcrFailure;
    use upright_core::{PageClass, PageIndex};

    use crate::pdf::raster::ImageSetRasterizer;
    use crate::stub::NoTextLayer;
    use crate::traits::OcrProbe;

    /// White page with horizontal rows of glyph-like strokes.
    fn text_page(size: u32) -> PageImage {
        let margin = size / 5;
        PageImage::from_rgb(RgbImage::from_fn(size, size, |x, y| {
            let inside = (margin..size - margin).contains(&x) && (margin..size - margin).contains(&y);
            if inside && (y % 14) < 6 && (x % 6) < 4 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }))
    }

    /// Clockwise rotation applied to each of [`sample_pages`]; `None` is blank.
    const APPLIED: [Option<u16>; 5] = [Some(0), Some(90), None, Some(180), Some(270)];

    fn sample_pages() -> Vec<PageImage> {
        let upright = text_page(120);
        APPLIED
            .iter()
            .map(|applied| match applied {
                Some(angle) => upright.rotated(*angle),
                None => PageImage::blank(120, 120),
            })
            .collect()
    }

    /// How far `estimated` is from undoing `applied`, modulo a half turn.
    fn residual(applied: u16, estimated: u16) -> u16 {
        let d = (applied + estimated) % 180;
        d.min(180 - d)
    }

    fn config_with_workers(estimator_workers: usize) -> PipelineConfig {
        PipelineConfig {
            estimator_workers,
            ..Default::default()
        }
    }

    #[test]
    fn parallel_orientation_matches_sequential() {
        let rasterizer = ImageSetRasterizer::from_images(sample_pages());
        let token = CancellationToken::new();

        let sequential = OrientationPipeline::new(&config_with_workers(1))
            .run(&rasterizer, false, &token)
            .unwrap();
        let parallel = OrientationPipeline::new(&config_with_workers(4))
            .run(&rasterizer, false, &token)
            .unwrap();

        let seq = sequential.angles.into_complete().unwrap();
        let par = parallel.angles.into_complete().unwrap();
        assert_eq!(seq, par);
        assert!(seq.iter().enumerate().all(|(i, r)| r.page == PageIndex(i)));

        for (result, applied) in seq.iter().zip(APPLIED) {
            match applied {
                Some(applied) => assert!(
                    residual(applied, result.angle) <= 2,
                    "page {} rotated by {applied} estimated {}",
                    result.page,
                    result.angle
                ),
                None => assert_eq!(result.angle, 0, "blank page keeps angle 0"),
            }
        }
    }

    #[test]
    fn scores_are_collected_inside_the_run() {
        let rasterizer = ImageSetRasterizer::from_images(sample_pages());
        let outcome = OrientationPipeline::new(&config_with_workers(2))
            .with_scores(true)
            .run(&rasterizer, false, &CancellationToken::new())
            .unwrap();
        let scores = outcome.scores.unwrap().into_complete().unwrap();
        let angles = outcome.angles.into_complete().unwrap();
        for (candidates, result) in scores.iter().zip(&angles) {
            assert_eq!(candidates.len(), 360);
            assert_eq!(select_best(candidates).angle, result.angle);
        }
    }

    #[test]
    fn scores_are_not_kept_by_default() {
        let rasterizer = ImageSetRasterizer::from_images(vec![PageImage::blank(8, 8)]);
        let outcome = OrientationPipeline::new(&config_with_workers(1))
            .run(&rasterizer, false, &CancellationToken::new())
            .unwrap();
        assert!(outcome.scores.is_none());
    }

    #[test]
    fn normalized_pages_are_collected() {
        let rasterizer = ImageSetRasterizer::from_images(sample_pages());
        let outcome = OrientationPipeline::new(&config_with_workers(2))
            .run(&rasterizer, true, &CancellationToken::new())
            .unwrap();
        assert!(!outcome.cancelled);
        let upright = outcome.upright.unwrap();
        assert!(upright.is_complete());
    }

    #[test]
    fn cancelled_before_start_commits_nothing() {
        let rasterizer = ImageSetRasterizer::from_images(sample_pages());
        let token = CancellationToken::new();
        token.cancel();
        let outcome = OrientationPipeline::new(&config_with_workers(2))
            .run(&rasterizer, false, &token)
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.angles.missing().len(), 5);
    }

    /// Rasteriser that cancels the run once a given page is rendered.
    struct CancellingRasterizer {
        inner: ImageSetRasterizer,
        cancel_at: PageIndex,
        token: CancellationToken,
    }

    impl Rasterizer for CancellingRasterizer {
        fn page_count(&self) -> usize {
            self.inner.page_count()
        }

        fn render(&self, page: PageIndex) -> Result<PageImage> {
            if page == self.cancel_at {
                self.token.cancel();
            }
            self.inner.render(page)
        }
    }

    #[test]
    fn cancellation_keeps_committed_pages() {
        let token = CancellationToken::new();
        let rasterizer = CancellingRasterizer {
            inner: ImageSetRasterizer::from_images(sample_pages()),
            cancel_at: PageIndex(2),
            token: token.clone(),
        };
        let outcome = OrientationPipeline::new(&config_with_workers(1))
            .run(&rasterizer, false, &token)
            .unwrap();
        assert!(outcome.cancelled);
        // The page that triggered cancellation had already started.
        assert!(outcome.angles.get(PageIndex(2)).is_some());
        assert!(!outcome.angles.missing().is_empty());
    }

    #[test]
    fn render_failure_is_fatal() {
        let rasterizer = ImageSetRasterizer::from_paths(["/nonexistent/page-1.png"]);
        let err = OrientationPipeline::new(&config_with_workers(1))
            .run(&rasterizer, false, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, UprightError::Rasterize { .. }));
    }

    /// Probe whose outcome depends on page width: even widths succeed, odd
    /// widths fail. Narrow pages answer slowest so completion order differs
    /// from page order.
    struct WidthProbe {
        calls: AtomicUsize,
        on_call: Option<CancellationToken>,
    }

    impl OcrProbe for WidthProbe {
        fn recognize(&self, page: &PageImage) -> std::result::Result<String, OcrFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = &self.on_call {
                token.cancel();
            }
            std::thread::sleep(Duration::from_millis(u64::from(60 - page.width())));
            if page.width() % 2 == 0 {
                Ok("text".into())
            } else {
                Err(OcrFailure::RecognitionFailed("noise".into()))
            }
        }
    }

    fn width_pages() -> Arc<dyn Rasterizer> {
        Arc::new(ImageSetRasterizer::from_images(
            [10u32, 11, 20, 21, 30].map(|w| PageImage::blank(w, 10)),
        ))
    }

    async fn classify_with(workers: usize, on_call: Option<CancellationToken>) -> ClassificationOutcome {
        let cancel = on_call.clone().unwrap_or_default();
        let probe = Arc::new(WidthProbe {
            calls: AtomicUsize::new(0),
            on_call,
        });
        let classifier = PageClassifier::new(Arc::new(NoTextLayer), probe, &PipelineConfig::default());
        classify_document(classifier, width_pages(), workers, cancel)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_classification_matches_sequential() {
        let sequential = classify_with(1, None).await;
        let parallel = classify_with(4, None).await;
        assert!(!parallel.cancelled);

        let seq: Vec<PageClass> = sequential
            .classes
            .into_complete()
            .unwrap()
            .into_iter()
            .map(|r| r.class)
            .collect();
        let par: Vec<PageClass> = parallel
            .classes
            .into_complete()
            .unwrap()
            .into_iter()
            .map(|r| r.class)
            .collect();
        assert_eq!(seq, par);
        assert_eq!(
            par,
            vec![
                PageClass::OcrRecoverable,
                PageClass::Unreadable,
                PageClass::OcrRecoverable,
                PageClass::Unreadable,
                PageClass::OcrRecoverable,
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_classification_keeps_partial_results() {
        let outcome = classify_with(1, Some(CancellationToken::new())).await;
        assert!(outcome.cancelled);
        // The first page was in flight when the token fired and still commits.
        assert!(outcome.classes.get(PageIndex(0)).is_some());
        assert_eq!(
            outcome.classes.missing(),
            vec![PageIndex(1), PageIndex(2), PageIndex(3), PageIndex(4)]
        );
    }

    #[tokio::test]
    async fn classification_render_failure_is_fatal() {
        let rasterizer: Arc<dyn Rasterizer> =
            Arc::new(ImageSetRasterizer::from_paths(["/nonexistent/page-1.png"]));
        let classifier = PageClassifier::new(
            Arc::new(NoTextLayer),
            Arc::new(crate::stub::UnavailableProbe::default()),
            &PipelineConfig::default(),
        );
        let err = classify_document(classifier, rasterizer, 2, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UprightError::Rasterize { page: PageIndex(0), .. }));
    }

    #[tokio::test]
    async fn empty_document_is_complete() {
        let rasterizer: Arc<dyn Rasterizer> = Arc::new(ImageSetRasterizer::from_images(Vec::new()));
        let classifier = PageClassifier::new(
            Arc::new(NoTextLayer),
            Arc::new(crate::stub::UnavailableProbe::default()),
            &PipelineConfig::default(),
        );
        let outcome = classify_document(classifier, rasterizer, 2, CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.classes.is_complete());
        assert!(outcome.classes.is_empty());
    }
}
