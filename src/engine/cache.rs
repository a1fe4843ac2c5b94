//! Audio Buffer Cache
//!
//! Memoizes decoded source ranges keyed by `(resource_id, start, end)`.
//! A miss fetches the resource through the `ByteSource`, decodes it at the
//! output rate, trims it to the range and stores the result. With
//! `cache_decoded` the untrimmed decode is kept per resource as well, so
//! a second range of the same file skips the fetch and the decode.
//!
//! Failures are returned and never stored; the next request retries.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use crate::engine::buffer::AudioBuffer;
use crate::engine::io::decode_audio;
use crate::engine::source::ByteSource;
use crate::error::{MixlineError, Result};
use crate::timeline::SourceRange;

type RangeKey = (String, u64, u64);

fn range_key(resource_id: &str, start: f64, end: f64) -> RangeKey {
    // +0.0 folds -0.0 into 0.0 so both hash alike
    (
        resource_id.to_string(),
        (start + 0.0).to_bits(),
        (end + 0.0).to_bits(),
    )
}

/// Counters since construction or the last `clear`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub decodes: u64,
}

/// A range that could not be loaded during `preload`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreloadFailure {
    pub resource_id: String,
    pub start: f64,
    pub end: f64,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreloadReport {
    pub loaded: usize,
    pub failed: Vec<PreloadFailure>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct AudioBufferCache<S> {
    source: S,
    sample_rate: u32,
    cache_decoded: bool,
    ranges: HashMap<RangeKey, Arc<AudioBuffer>>,
    decoded: HashMap<String, Arc<AudioBuffer>>,
    stats: CacheStats,
}

impl<S: ByteSource> AudioBufferCache<S> {
    /// Cache decoding to `sample_rate`, keeping whole-resource decodes
    pub fn new(source: S, sample_rate: u32) -> Self {
        Self {
            source,
            sample_rate,
            cache_decoded: true,
            ranges: HashMap::new(),
            decoded: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Toggle the per-resource decode memo
    pub fn with_decoded_cache(mut self, enabled: bool) -> Self {
        self.cache_decoded = enabled;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Decoded PCM for `[start, end)` seconds of `resource_id`
    ///
    /// The end is clamped to the length of the audio. Empty or inverted
    /// ranges, negative starts, and starts at or past the end of the audio
    /// are `InvalidRange`.
    pub fn load_range(&mut self, resource_id: &str, start: f64, end: f64) -> Result<Arc<AudioBuffer>> {
        let invalid = || MixlineError::InvalidRange {
            resource_id: resource_id.to_string(),
            start,
            end,
        };

        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(invalid());
        }

        let key = range_key(resource_id, start, end);
        if let Some(buffer) = self.ranges.get(&key) {
            self.stats.hits += 1;
            return Ok(Arc::clone(buffer));
        }
        self.stats.misses += 1;

        let full = self.decode_resource(resource_id)?;
        let slice = full.slice_secs(start, end).ok_or_else(invalid)?;
        debug!(
            "[Cache] {} [{:.3}, {:.3}) -> {} samples",
            resource_id,
            start,
            end,
            slice.len()
        );

        let buffer = Arc::new(slice);
        self.ranges.insert(key, Arc::clone(&buffer));
        Ok(buffer)
    }

    /// Load every range, collecting failures instead of stopping
    pub fn preload<'a, I>(&mut self, ranges: I) -> PreloadReport
    where
        I: IntoIterator<Item = &'a SourceRange>,
    {
        let mut report = PreloadReport::default();

        for range in ranges {
            match self.load_range(&range.resource_id, range.start, range.end) {
                Ok(_) => report.loaded += 1,
                Err(e) => {
                    warn!("[Cache] preload {} failed: {}", range.resource_id, e);
                    report.failed.push(PreloadFailure {
                        resource_id: range.resource_id.clone(),
                        start: range.start,
                        end: range.end,
                        code: e.error_code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }

    pub fn contains(&self, resource_id: &str, start: f64, end: f64) -> bool {
        self.ranges.contains_key(&range_key(resource_id, start, end))
    }

    /// Number of cached ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop every entry whose resource is not in `keep`
    ///
    /// Returns the number of evicted ranges. Buffers still held by voices stay
    /// alive until those voices drop them.
    pub fn retain_resources(&mut self, keep: &BTreeSet<&str>) -> usize {
        let before = self.ranges.len();
        self.ranges.retain(|(id, _, _), _| keep.contains(id.as_str()));
        self.decoded.retain(|id, _| keep.contains(id.as_str()));
        let evicted = before - self.ranges.len();
        if evicted > 0 {
            debug!("[Cache] evicted {} ranges", evicted);
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
        self.decoded.clear();
        self.stats = CacheStats::default();
    }

    fn decode_resource(&mut self, resource_id: &str) -> Result<Arc<AudioBuffer>> {
        if let Some(full) = self.decoded.get(resource_id) {
            return Ok(Arc::clone(full));
        }

        self.stats.fetches += 1;
        let bytes = self.source.fetch(resource_id)?;

        self.stats.decodes += 1;
        let full = Arc::new(decode_audio(resource_id, &bytes, self.sample_rate)?);

        if self.cache_decoded {
            self.decoded.insert(resource_id.to_string(), Arc::clone(&full));
        }
        Ok(full)
    }
}

impl<S> std::fmt::Debug for AudioBufferCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBufferCache")
            .field("sample_rate", &self.sample_rate)
            .field("cache_decoded", &self.cache_decoded)
            .field("ranges", &self.ranges.len())
            .field("decoded", &self.decoded.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;
    use crate::engine::io::{encode_wav, generate_test_tone};
    use crate::engine::source::MemorySource;
    use pretty_assertions::assert_eq;

    const RATE: u32 = 8000;

    fn source() -> MemorySource {
        let a = generate_test_tone(220.0, 0.5, 10.0, ChannelLayout::Stereo, RATE);
        let b = generate_test_tone(330.0, 0.5, 4.0, ChannelLayout::Mono, RATE);
        MemorySource::new()
            .with("a", encode_wav(&a, 16).unwrap())
            .with("b", encode_wav(&b, 16).unwrap())
            .with("junk", b"not audio".to_vec())
    }

    #[test]
    fn test_load_range_trims() {
        let mut cache = AudioBufferCache::new(source(), RATE);

        let buffer = cache.load_range("a", 2.0, 5.0).unwrap();
        assert_eq!(buffer.len(), 3 * RATE as usize);
        assert_eq!(buffer.channels(), 2);
        assert!(cache.contains("a", 2.0, 5.0));
    }

    #[test]
    fn test_hit_returns_shared_buffer() {
        let mut cache = AudioBufferCache::new(source(), RATE);

        let first = cache.load_range("a", 0.0, 1.0).unwrap();
        let second = cache.load_range("a", 0.0, 1.0).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                fetches: 1,
                decodes: 1,
            }
        );
    }

    #[test]
    fn test_decoded_memo_skips_refetch() {
        let mut cache = AudioBufferCache::new(source(), RATE);
        cache.load_range("a", 0.0, 1.0).unwrap();
        cache.load_range("a", 5.0, 7.0).unwrap();
        assert_eq!(cache.stats().fetches, 1);
        assert_eq!(cache.len(), 2);

        let mut uncached = AudioBufferCache::new(source(), RATE).with_decoded_cache(false);
        uncached.load_range("a", 0.0, 1.0).unwrap();
        uncached.load_range("a", 5.0, 7.0).unwrap();
        assert_eq!(uncached.stats().fetches, 2);
        assert_eq!(uncached.stats().decodes, 2);
    }

    #[test]
    fn test_end_clamps_to_audio_length() {
        let mut cache = AudioBufferCache::new(source(), RATE);
        let buffer = cache.load_range("b", 3.0, 9.0).unwrap();
        assert_eq!(buffer.len(), RATE as usize);
    }

    #[test]
    fn test_invalid_ranges() {
        let mut cache = AudioBufferCache::new(source(), RATE);

        for (start, end) in [(3.0, 3.0), (5.0, 2.0), (-1.0, 2.0), (4.0, 6.0)] {
            let err = cache.load_range("b", start, end).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_RANGE", "range {}..{}", start, end);
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failures_are_not_cached() {
        let mut cache = AudioBufferCache::new(source(), RATE);

        let missing = cache.load_range("nope", 0.0, 1.0).unwrap_err();
        assert_eq!(missing.error_code(), "RESOURCE_NOT_FOUND");
        let junk = cache.load_range("junk", 0.0, 1.0).unwrap_err();
        assert_eq!(junk.error_code(), "DECODE_FAILED");

        cache.load_range("junk", 0.0, 1.0).unwrap_err();
        assert_eq!(cache.stats().decodes, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_preload_reports_failures() {
        let mut cache = AudioBufferCache::new(source(), RATE);
        let ranges = vec![
            SourceRange::new("a", 0.0, 2.0),
            SourceRange::new("b", 0.0, 2.0),
            SourceRange::new("nope", 0.0, 2.0),
        ];

        let report = cache.preload(&ranges);
        assert_eq!(report.loaded, 2);
        assert!(!report.is_complete());
        assert_eq!(report.failed[0].resource_id, "nope");
        assert_eq!(report.failed[0].code, "RESOURCE_NOT_FOUND");
    }

    #[test]
    fn test_retain_resources() {
        let mut cache = AudioBufferCache::new(source(), RATE);
        cache.load_range("a", 0.0, 1.0).unwrap();
        cache.load_range("a", 1.0, 2.0).unwrap();
        cache.load_range("b", 0.0, 1.0).unwrap();

        let keep: BTreeSet<&str> = ["b"].into_iter().collect();
        assert_eq!(cache.retain_resources(&keep), 2);
        assert!(cache.contains("b", 0.0, 1.0));
        assert!(!cache.contains("a", 0.0, 1.0));

        // "a" must be fetched again
        cache.load_range("a", 0.0, 1.0).unwrap();
        assert_eq!(cache.stats().fetches, 3);
    }

    #[test]
    fn test_clear() {
        let mut cache = AudioBufferCache::new(source(), RATE);
        cache.load_range("a", 0.0, 1.0).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
