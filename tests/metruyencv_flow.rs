mod common;

use std::sync::Arc;

use aes::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use readstory::core::config::{AppConfig, SiteConfig};
use readstory::core::model::Source;
use readstory::engine::CrawlService;
use readstory::sites::StrategyRegistry;
use readstory::store::MemoryStore;

use common::StubFetcher;

const KEY: &str = "0123456789abcdef";
const LANDING: &str = "https://metruyencv.com/truyen/vo-luyen";
const API: &str =
    "https://backend.metruyencv.com/api/chapters?filter[book_id]=136693&filter[type]=published";
const BUNDLE: &str = "https://metruyencv.com/build/assets/app-9327baa8.js";

fn encrypt(plain: &str) -> String {
    let key = KEY.as_bytes();
    let enc = cbc::Encryptor::<aes::Aes128>::new_from_slices(key, key).unwrap();
    STANDARD
        .encode(enc.encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes()))
        .replace('/', "\\/")
}

fn chapter_page(key: u32) -> String {
    format!(
        r#"<html><head>
            <script type="module" src="/build/assets/app-9327baa8.js"></script>
        </head><body>
            <script>window.chapterData = {{ chapter: {{ id: {key}, content: "{}" }} }};</script>
        </body></html>"#,
        encrypt(&format!("<p>Chương {key}</p>"))
    )
}

fn bundle_script() -> String {
    let codes: Vec<String> = KEY.chars().rev().map(|c| (c as u32).to_string()).collect();
    format!("import a from'./x.js';const k=[{}];export{{k}};", codes.join(","))
}

fn fetcher() -> StubFetcher {
    let mut fetcher = StubFetcher::default()
        .route(
            LANDING,
            r#"<html><body><h1>Võ Luyện</h1>
               <script>window.bookData = {"book":{"id":136693,"name":"Võ Luyện"}};</script>
               </body></html>"#,
        )
        .route(
            API,
            r#"{"data":[{"name":"Chương 1","index":"1"},{"name":"Chương 2","index":"2"},{"name":"Chương 3","index":3}]}"#,
        )
        .route(BUNDLE, bundle_script());
    for key in 1..=3 {
        fetcher = fetcher.route(format!("{}/chuong-{}", LANDING, key), chapter_page(key));
    }
    fetcher
}

#[tokio::test(start_paused = true)]
async fn key_is_recovered_once_and_reused() {
    let fetcher = Arc::new(fetcher());
    let config = Arc::new(AppConfig::default());
    let store = Arc::new(MemoryStore::new());
    let registry = StrategyRegistry::new(&config, fetcher.clone());
    let service = CrawlService::new(registry, store.clone(), config);

    let report = service.crawl_story(LANDING).await.unwrap();

    assert_eq!(report.story.name, "vo-luyen");
    assert_eq!(report.story.title, "Võ Luyện");
    assert_eq!(report.story.source, Source::Mtc);
    assert_eq!(report.saved.len(), 3);
    assert_eq!(fetcher.hits(BUNDLE), 1);

    let chapters = store.chapters_of(report.story.id);
    for (chapter, key) in chapters.iter().zip(1..=3) {
        assert_eq!(chapter.key, key);
        assert_eq!(chapter.title, format!("Chương {}", key));
        assert_eq!(chapter.content, format!("<p>Chương {}</p>", key));
    }
}

fn service_with_fallback(fetcher: Arc<StubFetcher>, store: Arc<MemoryStore>, fallback: &str) -> CrawlService {
    let mut config = AppConfig::default();
    config.sites.insert(
        "metruyencv".to_string(),
        SiteConfig::builder().fallback_key(fallback.to_string()).build(),
    );
    let config = Arc::new(config);
    CrawlService::new(StrategyRegistry::new(&config, fetcher), store, config)
}

#[tokio::test(start_paused = true)]
async fn transient_bundle_failure_does_not_pin_fallback() {
    let fetcher = Arc::new(fetcher().fail_first(BUNDLE, 1));
    let store = Arc::new(MemoryStore::new());
    let service = service_with_fallback(fetcher.clone(), store.clone(), "stale");

    let report = service.crawl_story(LANDING).await.unwrap();
    assert_eq!(report.saved.len(), 3);
    // 第一次失败，第二次恢复成功后缓存
    assert_eq!(fetcher.hits(BUNDLE), 2);

    let contents: Vec<_> = store
        .chapters_of(report.story.id)
        .into_iter()
        .map(|c| c.content)
        .collect();
    assert_eq!(contents, ["<p>Chương 1</p>", "<p>Chương 2</p>", "<p>Chương 3</p>"]);
}

#[tokio::test(start_paused = true)]
async fn bundle_without_key_falls_back_per_chapter() {
    let mut stub = StubFetcher::default()
        .route(LANDING, r#"<script>window.bookData = {"book":{"id":136693}};</script>"#)
        .route(
            API,
            r#"{"data":[{"name":"Chương 1","index":"1"},{"name":"Chương 2","index":"2"}]}"#,
        )
        .route(BUNDLE, "export const build = 'x';");
    for key in 1..=2 {
        stub = stub.route(format!("{}/chuong-{}", LANDING, key), chapter_page(key));
    }
    let fetcher = Arc::new(stub);
    let store = Arc::new(MemoryStore::new());
    let service = service_with_fallback(fetcher.clone(), store.clone(), "stale");

    let report = service.crawl_story(LANDING).await.unwrap();

    // 回退密钥不缓存，每个章节都重新尝试恢复；长度无效的回退密钥解密得到空串
    assert_eq!(fetcher.hits(BUNDLE), 2);
    assert_eq!(report.story.title, "vo-luyen");
    let chapters = store.chapters_of(report.story.id);
    assert_eq!(chapters.len(), 2);
    assert!(chapters.iter().all(|c| c.content.is_empty()));
}
