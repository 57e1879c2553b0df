//! Calendar bucketing of a time-ordered index.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

use crate::index::OrderedIndex;
use crate::media::{MediaId, MediaItem};
use crate::GalleryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Month, Granularity::Year];

    /// Truncates a calendar date to the start of its day, month or year.
    pub fn truncate(self, date: NaiveDate) -> NaiveDate {
        let truncated = match self {
            Granularity::Day => Some(date),
            Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        };
        truncated.unwrap_or(date)
    }

    fn slot(self) -> usize {
        match self {
            Granularity::Day => 0,
            Granularity::Month => 1,
            Granularity::Year => 2,
        }
    }
}

/// Time zone in which capture times are mapped to calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceZone {
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl ReferenceZone {
    pub fn date_of(&self, millis: i64) -> Option<NaiveDate> {
        let utc = DateTime::<Utc>::from_timestamp_millis(millis)?;
        let date = match self {
            ReferenceZone::Local => utc.with_timezone(&chrono::Local).date_naive(),
            ReferenceZone::Utc => utc.date_naive(),
            ReferenceZone::Fixed(offset) => utc.with_timezone(offset).date_naive(),
        };
        Some(date)
    }
}

impl FromStr for ReferenceZone {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "local" | "" => return Ok(ReferenceZone::Local),
            "utc" | "z" => return Ok(ReferenceZone::Utc),
            _ => {}
        }

        let invalid = || GalleryError::InvalidTimeZone(s.to_string());
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(invalid());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(ReferenceZone::Fixed)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for ReferenceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceZone::Local => write!(f, "local"),
            ReferenceZone::Utc => write!(f, "utc"),
            ReferenceZone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// Calendar key of a bucket. Undated sorts below every date, so a
/// descending walk puts it last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKey {
    Undated,
    Dated(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: BucketKey,
    pub granularity: Granularity,
    /// Newest first. Never empty.
    pub members: Vec<MediaId>,
}

impl Bucket {
    fn open(key: BucketKey, granularity: Granularity, first: MediaId) -> Self {
        Bucket {
            key,
            granularity,
            members: vec![first],
        }
    }

    pub fn cover(&self) -> MediaId {
        self.members[0]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.members.contains(&id)
    }

    pub fn label(&self) -> String {
        match self.key {
            BucketKey::Undated => "Undated".to_string(),
            BucketKey::Dated(date) => match self.granularity {
                Granularity::Day => date.format("%-d %b %Y").to_string(),
                Granularity::Month => date.format("%B %Y").to_string(),
                Granularity::Year => date.format("%Y").to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalBucketizer {
    zone: ReferenceZone,
}

impl TemporalBucketizer {
    pub fn new(zone: ReferenceZone) -> Self {
        TemporalBucketizer { zone }
    }

    pub fn zone(&self) -> ReferenceZone {
        self.zone
    }

    pub fn key_for(&self, item: &MediaItem, granularity: Granularity) -> BucketKey {
        item.capture_millis()
            .and_then(|ms| self.zone.date_of(ms))
            .map(|date| BucketKey::Dated(granularity.truncate(date)))
            .unwrap_or(BucketKey::Undated)
    }

    /// Groups an index into calendar buckets in one pass. The index is
    /// newest first, so buckets come out newest first as well.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, index)))]
    pub fn bucketize(&self, index: &OrderedIndex, granularity: Granularity) -> Vec<Bucket> {
        let mut buckets = Vec::new();
        let mut open: Option<Bucket> = None;

        for item in index {
            let key = self.key_for(item, granularity);
            match open.as_mut() {
                Some(bucket) if bucket.key == key => bucket.members.push(item.id),
                _ => {
                    if let Some(done) = open.take() {
                        buckets.push(done);
                    }
                    open = Some(Bucket::open(key, granularity, item.id));
                }
            }
        }
        if let Some(done) = open {
            buckets.push(done);
        }

        tracing::debug!(?granularity, buckets = buckets.len(), "bucketized index");
        buckets
    }
}

/// Lazily filled per-granularity bucket lists, dropped on reload.
#[derive(Debug, Clone, Default)]
pub struct BucketCache {
    slots: [Option<Vec<Bucket>>; 3],
}

impl BucketCache {
    pub fn get_or_build(
        &mut self,
        granularity: Granularity,
        bucketizer: &TemporalBucketizer,
        index: &OrderedIndex,
    ) -> &[Bucket] {
        self.slots[granularity.slot()]
            .get_or_insert_with(|| bucketizer.bucketize(index, granularity))
    }

    pub fn is_cached(&self, granularity: Granularity) -> bool {
        self.slots[granularity.slot()].is_some()
    }

    pub fn invalidate(&mut self) {
        self.slots = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().timestamp_millis()
    }

    fn utc_bucketizer() -> TemporalBucketizer {
        TemporalBucketizer::new(ReferenceZone::Utc)
    }

    fn date(y: i32, m: u32, d: u32) -> BucketKey {
        BucketKey::Dated(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn day_buckets_for_mixed_dates() {
        let index = OrderedIndex::build(vec![
            MediaItem::new(1, "a", Some(ms(2024, 1, 5, 10))),
            MediaItem::new(2, "b", Some(ms(2024, 1, 5, 9))),
            MediaItem::new(3, "c", Some(ms(2024, 1, 3, 0))),
            MediaItem::new(4, "d", Some(ms(2024, 2, 1, 0))),
        ]);
        let buckets = utc_bucketizer().bucketize(&index, Granularity::Day);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].key, date(2024, 2, 1));
        assert_eq!(buckets[0].members, vec![MediaId(4)]);
        assert_eq!(buckets[1].key, date(2024, 1, 5));
        assert_eq!(buckets[1].members, vec![MediaId(1), MediaId(2)]);
        assert_eq!(buckets[2].key, date(2024, 1, 3));
        for bucket in &buckets {
            assert_eq!(bucket.cover(), bucket.members[0]);
        }
    }

    #[test]
    fn month_and_year_truncation() {
        let index = OrderedIndex::build(vec![
            MediaItem::new(1, "a", Some(ms(2024, 3, 20, 10))),
            MediaItem::new(2, "b", Some(ms(2024, 3, 1, 9))),
            MediaItem::new(3, "c", Some(ms(2023, 12, 31, 23))),
        ]);
        let months = utc_bucketizer().bucketize(&index, Granularity::Month);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].key, date(2024, 3, 1));
        assert_eq!(months[0].label(), "March 2024");

        let years = utc_bucketizer().bucketize(&index, Granularity::Year);
        assert_eq!(years.len(), 2);
        assert_eq!(years[1].key, date(2023, 1, 1));
        assert_eq!(years[1].label(), "2023");
    }

    #[test]
    fn undated_items_form_trailing_bucket() {
        let index = OrderedIndex::build(vec![
            MediaItem::new(1, "a", None),
            MediaItem::new(2, "b", Some(ms(2022, 6, 1, 12))),
            MediaItem::new(3, "c", Some(0)),
        ]);
        let buckets = utc_bucketizer().bucketize(&index, Granularity::Day);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].key, BucketKey::Undated);
        assert_eq!(buckets[1].members, vec![MediaId(1), MediaId(3)]);
        assert_eq!(buckets[1].label(), "Undated");
    }

    #[test]
    fn empty_and_single() {
        let empty = OrderedIndex::build(Vec::new());
        for g in Granularity::ALL {
            assert!(utc_bucketizer().bucketize(&empty, g).is_empty());
        }

        let single = OrderedIndex::build(vec![MediaItem::new(9, "x", Some(ms(2020, 2, 29, 1)))]);
        for g in Granularity::ALL {
            let buckets = utc_bucketizer().bucketize(&single, g);
            assert_eq!(buckets.len(), 1);
            assert_eq!(buckets[0].cover(), MediaId(9));
        }
    }

    #[test]
    fn partition_covers_index_once() {
        let items: Vec<MediaItem> = (0..300u64)
            .map(|i| {
                let ts = if i % 11 == 0 {
                    None
                } else {
                    Some(ms(2019, 1, 1, 0) + (i as i64 * 7_919_000_000) % 200_000_000_000)
                };
                MediaItem::new(i, "p", ts)
            })
            .collect();
        let index = OrderedIndex::build(items);

        for g in Granularity::ALL {
            let buckets = utc_bucketizer().bucketize(&index, g);
            let flattened: Vec<MediaId> = buckets.iter().flat_map(|b| b.members.clone()).collect();
            let expected: Vec<MediaId> = index.ids().collect();
            assert_eq!(flattened, expected);
            assert!(buckets.windows(2).all(|w| w[0].key > w[1].key));
        }
    }

    #[test]
    fn fixed_zone_moves_day_boundary() {
        // 23:30 UTC on Jan 1 is already Jan 2 at +02:00
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap().timestamp_millis();
        let index = OrderedIndex::build(vec![MediaItem::new(1, "a", Some(ts))]);
        let zone: ReferenceZone = "+02:00".parse().unwrap();
        let buckets = TemporalBucketizer::new(zone).bucketize(&index, Granularity::Day);
        assert_eq!(buckets[0].key, date(2024, 1, 2));
        assert_eq!(buckets[0].label(), "2 Jan 2024");
    }

    #[test]
    fn parses_zones() {
        assert_eq!("local".parse::<ReferenceZone>().unwrap(), ReferenceZone::Local);
        assert_eq!("UTC".parse::<ReferenceZone>().unwrap(), ReferenceZone::Utc);
        assert_eq!(
            "-05:30".parse::<ReferenceZone>().unwrap(),
            ReferenceZone::Fixed(FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert!("mars".parse::<ReferenceZone>().is_err());
        assert!("+99:00".parse::<ReferenceZone>().is_err());
    }

    #[test]
    fn huge_offsets_are_rejected() {
        for s in ["+999999:00", "-2147483647:00", "+24:00", "+05:99"] {
            assert!(matches!(
                s.parse::<ReferenceZone>(),
                Err(GalleryError::InvalidTimeZone(_))
            ));
        }
    }

    #[test]
    fn out_of_range_timestamps_share_the_trailing_undated_bucket() {
        let index = OrderedIndex::build(vec![
            MediaItem::new(1, "far", Some(i64::MAX)),
            MediaItem::new(2, "dated", Some(ms(2024, 1, 1, 0))),
            MediaItem::new(3, "missing", None),
        ]);
        let buckets = utc_bucketizer().bucketize(&index, Granularity::Day);
        let keys: Vec<BucketKey> = buckets.iter().map(|b| b.key).collect();
        assert_eq!(
            keys,
            vec![
                BucketKey::Dated(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
                BucketKey::Undated,
            ]
        );
        assert!(buckets.windows(2).all(|w| w[0].key > w[1].key));
        assert_eq!(buckets[1].members, vec![MediaId(1), MediaId(3)]);
    }

    #[test]
    fn cache_builds_once_until_invalidated() {
        let index = OrderedIndex::build(vec![MediaItem::new(1, "a", Some(ms(2024, 1, 1, 0)))]);
        let bucketizer = utc_bucketizer();
        let mut cache = BucketCache::default();
        assert!(!cache.is_cached(Granularity::Month));
        assert_eq!(cache.get_or_build(Granularity::Month, &bucketizer, &index).len(), 1);
        assert!(cache.is_cached(Granularity::Month));
        assert!(!cache.is_cached(Granularity::Day));
        cache.invalidate();
        assert!(!cache.is_cached(Granularity::Month));
    }
}
