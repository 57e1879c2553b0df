use cache::CacheManager;
use criterion::{criterion_group, criterion_main, Criterion};
use gallery::MediaItem;
use tempfile::NamedTempFile;

fn sample_media_item(id: u64) -> MediaItem {
    let mut item = MediaItem::new(id, format!("{}.jpg", id), Some(1_600_000_000_000 + id as i64 * 60_000));
    item.mime_type = "image/jpeg".into();
    item
}

fn bench_insert_batch(c: &mut Criterion) {
    let items: Vec<MediaItem> = (0..1_000).map(sample_media_item).collect();
    c.bench_function("insert_batch_1k", |b| {
        b.iter(|| {
            let tmp = NamedTempFile::new().unwrap();
            let cache = CacheManager::new(tmp.path()).unwrap();
            cache.insert_media_items(&items).unwrap();
        })
    });
}

fn bench_load_all(c: &mut Criterion) {
    let tmp = NamedTempFile::new().unwrap();
    let cache = CacheManager::new(tmp.path()).unwrap();
    let items: Vec<MediaItem> = (0..10_000).map(sample_media_item).collect();
    cache.insert_media_items(&items).unwrap();

    c.bench_function("get_all_media_items_10k", |b| {
        b.iter(|| {
            let _ = cache.get_all_media_items().unwrap();
        })
    });
}

criterion_group!(benches, bench_insert_batch, bench_load_all);
criterion_main!(benches);
