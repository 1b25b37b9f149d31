//! Integration tests for the gator RSS aggregator
//!
//! These tests drive the public command registry against a real SQLite file,
//! a mock feed server and temporary config/cache files.

mod common {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use gator::browser::UrlOpener;
    use gator::cache::PostCache;
    use gator::commands::{Command, CommandRegistry, DispatchError};
    use gator::config::Config;
    use gator::db::Database;
    use gator::fetcher::Fetcher;
    use gator::state::AppState;
    use tempfile::TempDir;

    /// Create a temporary directory for test databases
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("test.db");
        format!("sqlite:{}?mode=rwc", db_path.display())
    }

    #[derive(Clone, Default)]
    pub struct RecordingOpener {
        pub opened: Arc<Mutex<Vec<String>>>,
    }

    impl UrlOpener for RecordingOpener {
        fn open(&self, url: &str) -> std::io::Result<()> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    pub struct FailingOpener;

    impl UrlOpener for FailingOpener {
        fn open(&self, _url: &str) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no browser"))
        }
    }

    pub async fn create_state(temp_dir: &TempDir, opener: Box<dyn UrlOpener>) -> AppState {
        let db = Database::new(&create_db_path(temp_dir)).await.unwrap();
        db.initialize().await.unwrap();

        AppState::new(
            db,
            Config::default(),
            temp_dir.path().join("gatorconfig.toml"),
            Fetcher::new(Duration::from_secs(5)).unwrap(),
        )
        .with_cache(PostCache::new(temp_dir.path().join("posts.json")))
        .with_opener(opener)
    }

    pub async fn run(
        registry: &CommandRegistry,
        state: &AppState,
        line: &str,
    ) -> Result<(), DispatchError> {
        let mut words = line.split_whitespace().map(str::to_string);
        let name = words.next().unwrap();
        registry.dispatch(state, &Command::new(name, words.collect())).await
    }

    pub fn rss_document(items: &[(&str, &str, &str)]) -> String {
        let items: String = items
            .iter()
            .map(|(title, link, date)| {
                format!(
                    "<item><title>{}</title><link>{}</link>\
                     <description>About {}</description><pubDate>{}</pubDate></item>",
                    title, link, title, date
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0"><channel>
                <title>Blog</title><link>https://blog.example.com</link>
                <description>A blog</description>{}
            </channel></rss>"#,
            items
        )
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::common::*;
    use gator::config::Config;

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp_dir = create_temp_dir();
        let config = Config::load_or_default(temp_dir.path().join("nope.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.browse_limit, 2);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert!(config.current_user_name.is_none());
    }

    #[test]
    fn test_config_round_trip() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("gatorconfig.toml");
        std::fs::write(
            &path,
            r#"
            db_url = "sqlite:other.db"
            current_user_name = "kahya"
            browse_limit = 10
            "#,
        )
        .unwrap();

        let mut config = Config::load(&path).unwrap();
        assert_eq!(config.db_url, "sqlite:other.db");
        assert_eq!(config.current_user_name.as_deref(), Some("kahya"));
        assert_eq!(config.browse_limit, 10);
        assert_eq!(config.fetch_timeout_secs, 30);

        config.set_current_user("holgith", &path).unwrap();
        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.current_user_name.as_deref(), Some("holgith"));
        assert_eq!(reloaded.db_url, "sqlite:other.db");
        assert_eq!(reloaded.browse_limit, 10);
    }
}

#[cfg(test)]
mod database_integration_tests {
    use super::common::*;
    use chrono::Utc;
    use gator::db::{Database, NewFeed, NewPost};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_data_persists_across_connections() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);

        {
            let db = Database::new(&db_url).await.unwrap();
            db.initialize().await.unwrap();
            let user = db.create_user(Uuid::new_v4(), "alice", Utc::now()).await.unwrap();
            let feed = db
                .create_feed(
                    &NewFeed {
                        name: "Blog",
                        url: "https://blog.example.com/rss",
                        user_id: user.id,
                    },
                    Utc::now(),
                )
                .await
                .unwrap();
            db.create_feed_follow(user.id, feed.id, Utc::now()).await.unwrap();
            db.create_post(
                &NewPost {
                    feed_id: feed.id,
                    title: "Hello",
                    url: "https://blog.example.com/hello",
                    description: "First post",
                    published_at: Utc::now(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        }

        let db = Database::new(&db_url).await.unwrap();
        db.initialize().await.unwrap();

        let user = db.get_user("alice").await.unwrap().expect("user persisted");
        let posts = db.get_posts_for_user(user.id, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].feed_name, "Blog");
        assert_eq!(posts[0].title, "Hello");
    }

    #[tokio::test]
    async fn test_reset_cascades_through_everything() {
        let temp_dir = create_temp_dir();
        let db = Database::new(&create_db_path(&temp_dir)).await.unwrap();
        db.initialize().await.unwrap();

        let user = db.create_user(Uuid::new_v4(), "alice", Utc::now()).await.unwrap();
        let feed = db
            .create_feed(
                &NewFeed {
                    name: "Blog",
                    url: "https://blog.example.com/rss",
                    user_id: user.id,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        db.create_feed_follow(user.id, feed.id, Utc::now()).await.unwrap();
        db.create_post(
            &NewPost {
                feed_id: feed.id,
                title: "Hello",
                url: "https://blog.example.com/hello",
                description: "First post",
                published_at: Utc::now(),
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(db.delete_all_users().await.unwrap(), 1);
        assert!(db.get_all_feeds().await.unwrap().is_empty());
        assert!(db.get_all_feed_follows().await.unwrap().is_empty());
        assert_eq!(db.count_posts_for_feed(feed.id).await.unwrap(), 0);
    }
}

#[cfg(test)]
mod command_integration_tests {
    use super::common::*;
    use gator::cache::CacheError;
    use gator::commands::{self, CommandError, DispatchError};
    use gator::scheduler::{Scheduler, TickOutcome};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_full_aggregation_workflow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss_document(&[
                (
                    "Fresh &amp; new",
                    "https://blog.example.com/fresh",
                    "Tue, 10 Dec 2024 12:00:00 GMT",
                ),
                (
                    "Older",
                    "https://blog.example.com/older",
                    "2024-12-01T08:00:00Z",
                ),
                ("", "https://blog.example.com/untitled", ""),
            ])))
            .mount(&server)
            .await;
        let feed_url = format!("{}/rss", server.uri());

        let temp_dir = create_temp_dir();
        let opener = RecordingOpener::default();
        let opened = opener.opened.clone();
        let state = create_state(&temp_dir, Box::new(opener)).await;
        let registry = commands::registry();

        run(&registry, &state, "register alice").await.unwrap();
        run(&registry, &state, &format!("addfeed Blog {}", feed_url))
            .await
            .unwrap();
        run(&registry, &state, "following").await.unwrap();

        let alice = state.db.get_user("alice").await.unwrap().unwrap();
        let follows = state.db.get_follows_by_user(alice.id).await.unwrap();
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].feed_name, "Blog");

        let scheduler = Scheduler::new(state.db.clone(), state.fetcher.clone());
        match scheduler.tick().await.unwrap() {
            TickOutcome::Ingested { report, .. } => {
                assert_eq!(report.inserted, 2);
                assert_eq!(report.skipped, 1);
            }
            other => panic!("unexpected tick outcome: {:?}", other),
        }

        // A second pass over the same document stores nothing new.
        match scheduler.tick().await.unwrap() {
            TickOutcome::Ingested { report, .. } => {
                assert_eq!(report.inserted, 0);
                assert_eq!(report.duplicates, 2);
            }
            other => panic!("unexpected tick outcome: {:?}", other),
        }

        run(&registry, &state, "browse 1").await.unwrap();
        let cached = state.cache.load().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].url, "https://blog.example.com/fresh");
        assert_eq!(cached[0].title, "Fresh & new");
        assert_eq!(cached[0].feed_name, "Blog");

        run(&registry, &state, "openpost 0").await.unwrap();
        assert_eq!(
            *opened.lock().unwrap(),
            vec!["https://blog.example.com/fresh".to_string()]
        );

        let err = run(&registry, &state, "openpost 5").await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Failed {
                error: CommandError::Cache(CacheError::InvalidIndex { index: 5, max: 0 }),
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "openpost: Invalid post index 5. Use a number between 0 and 0."
        );
    }

    #[tokio::test]
    async fn test_unreachable_feed_does_not_stop_aggregation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/good"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss_document(&[(
                "Works",
                "https://good.example.com/1",
                "Mon, 09 Dec 2024 12:00:00 GMT",
            )])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let state = create_state(&temp_dir, Box::new(RecordingOpener::default())).await;
        let registry = commands::registry();

        run(&registry, &state, "register alice").await.unwrap();
        run(&registry, &state, &format!("addfeed Bad {}/bad", server.uri()))
            .await
            .unwrap();
        run(&registry, &state, &format!("addfeed Good {}/good", server.uri()))
            .await
            .unwrap();

        let scheduler = Scheduler::new(state.db.clone(), state.fetcher.clone());
        assert!(matches!(
            scheduler.tick().await.unwrap(),
            TickOutcome::FetchFailed { .. }
        ));
        assert!(matches!(
            scheduler.tick().await.unwrap(),
            TickOutcome::Ingested { .. }
        ));

        let feeds = state.db.get_all_feeds().await.unwrap();
        assert!(feeds.iter().all(|f| f.last_fetched_at.is_some()));
    }

    #[tokio::test]
    async fn test_browser_failure_still_succeeds() {
        let temp_dir = create_temp_dir();
        let state = create_state(&temp_dir, Box::new(FailingOpener)).await;
        let registry = commands::registry();

        state
            .cache
            .save(&[gator::cache::CachedPost {
                url: "https://blog.example.com/a".to_string(),
                feed_name: "Blog".to_string(),
                title: "A".to_string(),
                published_at: chrono::Utc::now(),
            }])
            .unwrap();

        run(&registry, &state, "openpost 0").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_command_is_reported() {
        let temp_dir = create_temp_dir();
        let state = create_state(&temp_dir, Box::new(RecordingOpener::default())).await;
        let registry = commands::registry();

        let err = run(&registry, &state, "frobnicate now").await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownCommand(ref name) if name == "frobnicate"));
    }

    #[tokio::test]
    async fn test_current_user_survives_restart() {
        let temp_dir = create_temp_dir();
        let registry = commands::registry();

        {
            let state = create_state(&temp_dir, Box::new(RecordingOpener::default())).await;
            run(&registry, &state, "register alice").await.unwrap();
        }

        let config =
            gator::config::Config::load(temp_dir.path().join("gatorconfig.toml")).unwrap();
        assert_eq!(config.current_user_name.as_deref(), Some("alice"));
    }
}
