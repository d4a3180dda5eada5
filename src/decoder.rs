//! Memoized per-shape envelope decoders.
//!
//! Each declared payload shape gets one [`Decoder`], built the first time the
//! shape is requested and kept for the life of the cache. Concurrent callers
//! asking for the same shape share a single build: the map lock is held only
//! long enough to find or create the shape's slot, and the slot itself is a
//! [`OnceLock`] that lets exactly one caller run the build while the others
//! wait for its result.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::envelope::Envelope;

type Slot = Arc<OnceLock<Arc<dyn Any + Send + Sync>>>;

/// Decodes a raw JSON body into `Envelope<T>`.
pub struct Decoder<T> {
    shape: &'static str,
    decode: fn(Value) -> serde_json::Result<Envelope<T>>,
}

impl<T> Decoder<T>
where
    T: DeserializeOwned + 'static,
{
    fn build() -> Self {
        Self {
            shape: std::any::type_name::<T>(),
            decode: serde_json::from_value::<Envelope<T>>,
        }
    }

    /// Validates `body` as an envelope whose `data` conforms to `T`.
    pub fn decode(&self, body: Value) -> serde_json::Result<Envelope<T>> {
        (self.decode)(body)
    }

    /// Name of the payload shape this decoder validates.
    pub fn shape(&self) -> &'static str {
        self.shape
    }
}

impl<T> fmt::Debug for Decoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder").field("shape", &self.shape).finish()
    }
}

/// A cache of [`Decoder`]s keyed by payload type.
///
/// Entries are never evicted; the number of distinct shapes a program
/// declares is small and fixed.
///
/// # Examples
///
/// ```
/// use neo_tariff::decoder::DecoderCache;
///
/// let cache = DecoderCache::new();
/// let first = cache.decoder::<Vec<u32>>();
/// let second = cache.decoder::<Vec<u32>>();
///
/// assert_eq!(first.shape(), second.shape());
/// assert_eq!(cache.builds(), 1);
/// ```
#[derive(Default)]
pub struct DecoderCache {
    slots: Mutex<HashMap<TypeId, Slot>>,
    builds: AtomicUsize,
}

impl DecoderCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by the transports.
    pub fn global() -> &'static DecoderCache {
        static GLOBAL: OnceLock<DecoderCache> = OnceLock::new();
        GLOBAL.get_or_init(DecoderCache::new)
    }

    /// Returns the decoder for `T`, building it on first use.
    pub fn decoder<T>(&self) -> Arc<Decoder<T>>
    where
        T: DeserializeOwned + 'static,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(TypeId::of::<T>()).or_default())
        };

        let erased = slot
            .get_or_init(|| {
                self.builds.fetch_add(1, Ordering::SeqCst);
                let decoder = Decoder::<T>::build();
                tracing::debug!(shape = decoder.shape(), "Built envelope decoder");
                let erased: Arc<dyn Any + Send + Sync> = Arc::new(decoder);
                erased
            })
            .clone();

        // Slots are keyed by `TypeId::of::<T>()`, so the downcast always matches.
        erased
            .downcast::<Decoder<T>>()
            .unwrap_or_else(|_| Arc::new(Decoder::build()))
    }

    /// Number of decoders built so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Number of distinct shapes cached.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no shape has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DecoderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderCache")
            .field("shapes", &self.len())
            .field("builds", &self.builds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Barrier;
    use std::thread;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Version {
        year: i64,
    }

    #[test]
    fn test_second_lookup_hits_cache() {
        let cache = DecoderCache::new();

        let first = cache.decoder::<Vec<Version>>();
        assert_eq!(cache.builds(), 1);

        let second = cache.decoder::<Vec<Version>>();
        assert_eq!(cache.builds(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_shapes_get_distinct_decoders() {
        let cache = DecoderCache::new();
        assert!(cache.is_empty());

        cache.decoder::<Version>();
        cache.decoder::<Vec<Version>>();
        cache.decoder::<Value>();

        assert_eq!(cache.builds(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_decoder_validates_payload() {
        let cache = DecoderCache::new();
        let decoder = cache.decoder::<Vec<Version>>();

        let envelope = decoder
            .decode(json!({"success": true, "data": [{"year": 2024}, {"year": 2025}]}))
            .unwrap();
        assert_eq!(
            envelope.data,
            Some(vec![Version { year: 2024 }, Version { year: 2025 }])
        );

        assert!(decoder
            .decode(json!({"success": true, "data": {"year": 2025}}))
            .is_err());
        assert!(decoder.shape().contains("Version"));
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let cache = Arc::new(DecoderCache::new());
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.decoder::<Vec<Version>>()
                })
            })
            .collect();

        let decoders: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.builds(), 1);
        assert!(decoders.iter().all(|d| Arc::ptr_eq(d, &decoders[0])));
    }
}
