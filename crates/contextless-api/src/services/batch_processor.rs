use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info, Instrument, Span};

use crate::document::Chunk;
use crate::models::CompressionLevel;
use crate::services::transformer::{ChunkResult, RemoteError, TextTransformer};

/// Separator between chunk outputs in the combined content.
pub const PART_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedResult {
    pub summary: String,
    pub optimized_content: String,
}

/// Fans chunks out to the remote transformer in bounded batches and
/// reassembles the answers in chunk order.
#[derive(Clone)]
pub struct BatchProcessor {
    transformer: Arc<dyn TextTransformer>,
    batch_size: usize,
    batch_pause: Duration,
}

impl BatchProcessor {
    pub fn new(
        transformer: Arc<dyn TextTransformer>,
        batch_size: usize,
        batch_pause: Duration,
    ) -> Self {
        Self {
            transformer,
            batch_size: batch_size.max(1),
            batch_pause,
        }
    }

    /// Transform every chunk and combine the results.
    ///
    /// The first failing chunk aborts its in-flight siblings and every later
    /// batch. Dropping the returned future aborts all in-flight calls.
    pub async fn run(
        &self,
        chunks: Vec<Chunk>,
        level: CompressionLevel,
    ) -> Result<CombinedResult, RemoteError> {
        let total = chunks.len();
        if total == 0 {
            return Err(RemoteError::Generic("no chunks to process".to_string()));
        }

        let ranges = batch_ranges(total, self.batch_size);
        if ranges.len() == 1 {
            info!("Using PARALLEL processing ({} chunks, {} compression)", total, level);
        } else {
            info!(
                "Using BATCHED processing ({} chunks in {} batches of {})",
                total,
                ranges.len(),
                self.batch_size
            );
        }

        let started = Instant::now();
        let mut results: Vec<(usize, ChunkResult)> = Vec::with_capacity(total);
        let mut pending = chunks.into_iter();
        let batch_count = ranges.len();

        for (batch_no, range) in ranges.into_iter().enumerate() {
            let batch: Vec<Chunk> = pending.by_ref().take(range.len()).collect();

            if batch_count > 1 {
                info!(
                    "Processing batch {}/{} ({} chunks)",
                    batch_no + 1,
                    batch_count,
                    batch.len()
                );
            }

            results.extend(self.run_batch(batch, level, total).await?);

            if batch_no + 1 < batch_count {
                debug!("Waiting {:?} before next batch", self.batch_pause);
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        results.sort_by_key(|(index, _)| *index);

        info!(
            "All {} chunk(s) processed in {:.2}s",
            total,
            started.elapsed().as_secs_f64()
        );

        Ok(combine_results(
            results.into_iter().map(|(_, result)| result).collect(),
        ))
    }

    async fn run_batch(
        &self,
        batch: Vec<Chunk>,
        level: CompressionLevel,
        total: usize,
    ) -> Result<Vec<(usize, ChunkResult)>, RemoteError> {
        let mut set = JoinSet::new();

        for chunk in batch {
            let transformer = self.transformer.clone();
            debug!(
                "Launching chunk {}/{} ({} characters)",
                chunk.index + 1,
                total,
                chunk.char_len()
            );

            set.spawn(
                async move {
                    let result = transformer.transform(&chunk.content, level).await;
                    (chunk.index, result)
                }
                .instrument(Span::current()),
            );
        }

        let mut completed = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            let (index, result) = joined.map_err(|e| {
                set.abort_all();
                RemoteError::Generic(format!("chunk task failed: {}", e))
            })?;

            match result {
                Ok(chunk_result) => {
                    debug!("Chunk {}/{} completed", index + 1, total);
                    completed.push((index, chunk_result));
                }
                Err(e) => {
                    error!("Chunk {}/{} failed: {}", index + 1, total, e);
                    set.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(completed)
    }
}

/// Consecutive index ranges of at most `batch_size` chunks.
pub fn batch_ranges(total: usize, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = batch_size.max(1);
    (0..total)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(total))
        .collect()
}

/// Join ordered chunk results. A single result passes through unchanged.
pub fn combine_results(mut results: Vec<ChunkResult>) -> CombinedResult {
    if results.len() == 1 {
        let only = results.remove(0);
        return CombinedResult {
            summary: only.summary,
            optimized_content: only.optimized_content,
        };
    }

    let parts = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("Part {}: {}", i + 1, r.summary))
        .collect::<Vec<_>>()
        .join(" ");

    let summary = format!(
        "This content was processed in {} parts. {}",
        results.len(),
        parts
    );

    let optimized_content = results
        .into_iter()
        .map(|r| r.optimized_content)
        .collect::<Vec<_>>()
        .join(PART_SEPARATOR);

    CombinedResult {
        summary,
        optimized_content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transformer::MockTextTransformer;
    use async_trait::async_trait;
    use rand::Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                index: i,
                content: format!("chunk-{}", i),
                overlap: None,
            })
            .collect()
    }

    fn echo(text: &str) -> ChunkResult {
        ChunkResult {
            summary: format!("sum {}", text),
            optimized_content: format!("opt {}", text),
        }
    }

    /// Echoes its input after a per-call delay and tracks concurrency.
    struct DelayedEcho {
        delays: Vec<Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        starts: Mutex<Vec<(tokio::time::Instant, String)>>,
    }

    impl DelayedEcho {
        fn new(delays: Vec<Duration>) -> Self {
            Self {
                delays,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                starts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextTransformer for DelayedEcho {
        async fn transform(
            &self,
            text: &str,
            _level: CompressionLevel,
        ) -> Result<ChunkResult, RemoteError> {
            let index: usize = text.trim_start_matches("chunk-").parse().unwrap();
            self.starts
                .lock()
                .unwrap()
                .push((tokio::time::Instant::now(), text.to_string()));

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delays[index]).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(echo(text))
        }
    }

    #[test]
    fn test_batch_ranges() {
        assert_eq!(batch_ranges(25, 10), vec![0..10, 10..20, 20..25]);
        assert_eq!(batch_ranges(10, 10), vec![0..10]);
        assert_eq!(batch_ranges(3, 10), vec![0..3]);
        assert!(batch_ranges(0, 10).is_empty());
    }

    #[test]
    fn test_combine_single_passes_through() {
        let combined = combine_results(vec![echo("a")]);
        assert_eq!(combined.summary, "sum a");
        assert_eq!(combined.optimized_content, "opt a");
    }

    #[test]
    fn test_combine_multiple() {
        let combined = combine_results(vec![echo("a"), echo("b"), echo("c")]);
        assert_eq!(
            combined.summary,
            "This content was processed in 3 parts. Part 1: sum a Part 2: sum b Part 3: sum c"
        );
        assert_eq!(
            combined.optimized_content,
            "opt a\n\n---\n\nopt b\n\n---\n\nopt c"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_survives_random_completion() {
        let mut rng = rand::rng();

        for _ in 0..100 {
            let n = rng.random_range(1..=30);
            let delays = (0..n)
                .map(|_| Duration::from_millis(rng.random_range(0..500)))
                .collect();
            let processor = BatchProcessor::new(
                Arc::new(DelayedEcho::new(delays)),
                10,
                Duration::from_secs(1),
            );

            let result = processor
                .run(chunks(n), CompressionLevel::Balanced)
                .await
                .unwrap();

            let expected: Vec<String> = (0..n).map(|i| format!("opt chunk-{}", i)).collect();
            assert_eq!(result.optimized_content, expected.join(PART_SEPARATOR));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_twenty_five_chunks_run_in_three_paused_batches() {
        // Reverse latency so later chunks finish first inside each batch
        let delays = (0..25).map(|i| Duration::from_millis(250 - i * 10)).collect();
        let transformer = Arc::new(DelayedEcho::new(delays));
        let processor = BatchProcessor::new(transformer.clone(), 10, Duration::from_secs(1));

        let started = tokio::time::Instant::now();
        let result = processor
            .run(chunks(25), CompressionLevel::Aggressive)
            .await
            .unwrap();

        assert!(result.summary.starts_with("This content was processed in 25 parts."));
        assert_eq!(transformer.max_in_flight.load(Ordering::SeqCst), 10);

        let starts = transformer.starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 25);

        // Each batch starts after the slowest call of the previous one plus the pause
        let start_ms = |t: &tokio::time::Instant| (*t - started).as_millis();
        let mut offsets: Vec<u128> = starts.iter().map(|(t, _)| start_ms(t)).collect();
        offsets.dedup();
        assert_eq!(offsets, vec![0, 250 + 1000, 250 + 1000 + 150 + 1000]);

        let batch_sizes: Vec<usize> = offsets
            .iter()
            .map(|o| starts.iter().filter(|(t, _)| start_ms(t) == *o).count())
            .collect();
        assert_eq!(batch_sizes, vec![10, 10, 5]);

        // Two pauses, none after the last batch
        assert_eq!(started.elapsed().as_millis(), 1250 + 1150 + 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_input_has_no_pause() {
        let transformer = Arc::new(DelayedEcho::new(vec![Duration::from_millis(100); 10]));
        let processor = BatchProcessor::new(transformer.clone(), 10, Duration::from_secs(1));

        let started = tokio::time::Instant::now();
        processor.run(chunks(10), CompressionLevel::Minimal).await.unwrap();

        assert_eq!(transformer.max_in_flight.load(Ordering::SeqCst), 10);
        assert_eq!(started.elapsed().as_millis(), 100);
    }

    #[tokio::test]
    async fn test_any_failure_fails_the_run() {
        for failing in [0usize, 3, 6] {
            let mut mock = MockTextTransformer::new();
            mock.expect_transform().returning(move |text, _| {
                if text == format!("chunk-{}", failing) {
                    Err(RemoteError::RateLimited("429".into()))
                } else {
                    Ok(echo(text))
                }
            });

            let processor = BatchProcessor::new(Arc::new(mock), 10, Duration::ZERO);
            let err = processor
                .run(chunks(7), CompressionLevel::Balanced)
                .await
                .unwrap_err();
            assert!(matches!(err, RemoteError::RateLimited(_)));
        }
    }

    #[tokio::test]
    async fn test_failure_stops_later_batches() {
        let mut mock = MockTextTransformer::new();
        mock.expect_transform()
            .withf(|text, _| text == "chunk-1")
            .times(1)
            .returning(|_, _| Err(RemoteError::Timeout("slow".into())));
        mock.expect_transform()
            .withf(|text, _| text == "chunk-0")
            .times(0..=1)
            .returning(|text, _| Ok(echo(text)));
        // Chunks 2..5 belong to later batches and must never be sent

        let processor = BatchProcessor::new(Arc::new(mock), 2, Duration::ZERO);
        let err = processor
            .run(chunks(5), CompressionLevel::Balanced)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_aborts_in_flight_siblings() {
        struct FailFast {
            finished: AtomicUsize,
        }

        #[async_trait]
        impl TextTransformer for FailFast {
            async fn transform(
                &self,
                text: &str,
                _level: CompressionLevel,
            ) -> Result<ChunkResult, RemoteError> {
                if text == "chunk-0" {
                    return Err(RemoteError::Config("bad key".into()));
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
                self.finished.fetch_add(1, Ordering::SeqCst);
                Ok(echo(text))
            }
        }

        let transformer = Arc::new(FailFast {
            finished: AtomicUsize::new(0),
        });
        let processor = BatchProcessor::new(transformer.clone(), 10, Duration::ZERO);

        let err = processor
            .run(chunks(5), CompressionLevel::Balanced)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Config(_)));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transformer.finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let processor =
            BatchProcessor::new(Arc::new(MockTextTransformer::new()), 10, Duration::ZERO);
        assert!(processor.run(Vec::new(), CompressionLevel::Balanced).await.is_err());
    }
}
