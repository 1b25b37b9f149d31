use std::collections::HashMap;

use tracing::{info, warn};
use uuid::Uuid;

use super::registry::{HandlerFuture, Invocation};
use super::CommandError;
use crate::browser::validate_url_for_open;
use crate::cache::CachedPost;
use crate::db::{DbError, Feed, NewFeed, User};
use crate::scheduler::{parse_interval, Scheduler};
use crate::state::AppState;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Exactly `N` arguments, or a usage error.
fn exact_args<const N: usize>(args: &[String]) -> Result<[&str; N], CommandError> {
    if args.len() != N {
        return Err(CommandError::usage());
    }
    Ok(std::array::from_fn(|i| args[i].as_str()))
}

/// Zero or one argument.
fn optional_arg(args: &[String]) -> Result<Option<&str>, CommandError> {
    match args {
        [] => Ok(None),
        [arg] => Ok(Some(arg.as_str())),
        _ => Err(CommandError::usage()),
    }
}

async fn set_current_user(state: &AppState, name: &str) -> Result<(), CommandError> {
    let mut config = state.config.write().await;
    config.set_current_user(name, &state.config_path)?;
    Ok(())
}

async fn follow_feed(state: &AppState, user: &User, feed: &Feed) -> Result<(), CommandError> {
    let row = state
        .db
        .create_feed_follow(user.id, feed.id, state.clock.now())
        .await
        .map_err(|e| match e {
            DbError::Conflict { .. } => CommandError::AlreadyFollowing(feed.name.clone()),
            other => other.into(),
        })?;

    println!("{} is now following {}", row.user_name, row.feed_name);
    Ok(())
}

async fn feed_by_url(state: &AppState, url: &str) -> Result<Feed, CommandError> {
    state
        .db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| CommandError::UnknownFeed(url.to_string()))
}

// Users

pub fn register(inv: Invocation<'_>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let [name] = exact_args::<1>(inv.args())?;
        let state = inv.state;

        let user = state
            .db
            .create_user(Uuid::new_v4(), name, state.clock.now())
            .await?;
        set_current_user(state, &user.name).await?;

        info!("Registered user {}", user.name);
        println!("User {} created", user.name);
        println!("  ID:         {}", user.id);
        println!("  Created at: {}", user.created_at.format(TIME_FORMAT));
        Ok(())
    })
}

pub fn login(inv: Invocation<'_>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let [name] = exact_args::<1>(inv.args())?;
        let state = inv.state;

        let user = state
            .db
            .get_user(name)
            .await?
            .ok_or_else(|| CommandError::UnknownUser(name.to_string()))?;
        set_current_user(state, &user.name).await?;

        println!("Logged in as {}", user.name);
        Ok(())
    })
}

pub fn users(inv: Invocation<'_>) -> HandlerFuture<'_> {
    Box::pin(async move {
        exact_args::<0>(inv.args())?;
        let state = inv.state;

        let current = state.config.read().await.current_user_name.clone();
        for user in state.db.get_users().await? {
            if current.as_deref() == Some(user.name.as_str()) {
                println!("* {} (current)", user.name);
            } else {
                println!("* {}", user.name);
            }
        }
        Ok(())
    })
}

pub fn reset(inv: Invocation<'_>) -> HandlerFuture<'_> {
    Box::pin(async move {
        exact_args::<0>(inv.args())?;

        let removed = inv.state.db.delete_all_users().await?;
        info!("Reset removed {} users", removed);
        println!("Database reset: removed {} users and everything they owned", removed);
        Ok(())
    })
}

// Feeds and follows

pub fn add_feed(inv: Invocation<'_>, user: User) -> HandlerFuture<'_> {
    Box::pin(async move {
        let [name, url] = exact_args::<2>(inv.args())?;
        let state = inv.state;

        let new_feed = NewFeed {
            name,
            url,
            user_id: user.id,
        };
        let feed = state.db.create_feed(&new_feed, state.clock.now()).await?;

        info!("Added feed {} ({})", feed.name, feed.url);
        println!("Feed added");
        println!("  Name: {}", feed.name);
        println!("  URL:  {}", feed.url);
        println!("  ID:   {}", feed.id);

        follow_feed(state, &user, &feed).await
    })
}

pub fn feeds(inv: Invocation<'_>, _user: User) -> HandlerFuture<'_> {
    Box::pin(async move {
        exact_args::<0>(inv.args())?;
        let state = inv.state;

        let owners: HashMap<Uuid, String> = state
            .db
            .get_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let feeds = state.db.get_all_feeds().await?;
        if feeds.is_empty() {
            println!("No feeds yet. Add one with 'addfeed <name> <url>'.");
            return Ok(());
        }

        for feed in feeds {
            let owner = owners.get(&feed.user_id).map_or("unknown", String::as_str);
            let fetched = feed
                .last_fetched_at
                .map(|t| t.format(TIME_FORMAT).to_string())
                .unwrap_or_else(|| "never".to_string());
            println!("* {}", feed.name);
            println!("  URL:          {}", feed.url);
            println!("  Added by:     {}", owner);
            println!("  Last fetched: {}", fetched);
        }
        Ok(())
    })
}

pub fn follow(inv: Invocation<'_>, user: User) -> HandlerFuture<'_> {
    Box::pin(async move {
        let [url] = exact_args::<1>(inv.args())?;
        let feed = feed_by_url(inv.state, url).await?;
        follow_feed(inv.state, &user, &feed).await
    })
}

pub fn unfollow(inv: Invocation<'_>, user: User) -> HandlerFuture<'_> {
    Box::pin(async move {
        let [url] = exact_args::<1>(inv.args())?;
        let state = inv.state;

        let feed = feed_by_url(state, url).await?;
        if state.db.delete_feed_follow(user.id, feed.id).await? == 0 {
            return Err(CommandError::NotFollowing(feed.name));
        }

        println!("{} unfollowed {}", user.name, feed.name);
        Ok(())
    })
}

pub fn following(inv: Invocation<'_>, user: User) -> HandlerFuture<'_> {
    Box::pin(async move {
        exact_args::<0>(inv.args())?;

        let follows = inv.state.db.get_follows_by_user(user.id).await?;
        if follows.is_empty() {
            println!("{} is not following any feeds", user.name);
            return Ok(());
        }

        println!("{} follows:", user.name);
        for follow in follows {
            println!("* {}", follow.feed_name);
        }
        Ok(())
    })
}

pub fn all_follows(inv: Invocation<'_>) -> HandlerFuture<'_> {
    Box::pin(async move {
        exact_args::<0>(inv.args())?;

        for follow in inv.state.db.get_all_feed_follows().await? {
            println!("* {} follows {}", follow.user_name, follow.feed_name);
        }
        Ok(())
    })
}

// Posts

pub fn browse(inv: Invocation<'_>, user: User) -> HandlerFuture<'_> {
    Box::pin(async move {
        let state = inv.state;
        let limit = match optional_arg(inv.args())? {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| CommandError::usage_hint("limit must be a positive whole number"))?,
            None => {
                let limit = state.config.read().await.browse_limit;
                if limit <= 0 {
                    return Err(CommandError::InvalidBrowseLimit(limit));
                }
                limit
            }
        };

        let posts = state.db.get_posts_for_user(user.id, limit).await?;

        let entries: Vec<CachedPost> = posts.iter().map(CachedPost::from).collect();
        if let Err(e) = state.cache.save(&entries) {
            warn!("Could not cache browse results at {}: {}", state.cache.path().display(), e);
        }

        if posts.is_empty() {
            println!("No posts yet. Follow a feed and run 'agg' to collect some.");
            return Ok(());
        }

        for (i, post) in posts.iter().enumerate() {
            println!(
                "[{}] {} from {}",
                i,
                post.published_at.format(TIME_FORMAT),
                post.feed_name
            );
            println!("    {}", post.title);
            println!("    {}", post.description);
            println!("    Link: {}", post.url);
        }
        println!();
        println!("Run 'openpost <index>' to open one in your browser.");
        Ok(())
    })
}

pub fn open_post(inv: Invocation<'_>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let [raw] = exact_args::<1>(inv.args())?;
        let state = inv.state;

        let index: i64 = raw
            .parse()
            .map_err(|_| CommandError::usage_hint("index must be a whole number"))?;
        let url = state.cache.resolve(index)?;
        validate_url_for_open(&url)?;

        println!("Opening {}", url);
        if let Err(e) = state.opener.open(&url) {
            warn!("Could not open a browser for {}: {}", url, e);
            println!("Could not open a browser. The link is {}", url);
        }
        Ok(())
    })
}

// Aggregation

pub fn agg(inv: Invocation<'_>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let [raw] = exact_args::<1>(inv.args())?;
        let state = inv.state;

        let interval =
            parse_interval(raw).map_err(|e| CommandError::usage_hint(e.to_string()))?;

        let scheduler = Scheduler::new(state.db.clone(), state.fetcher.clone())
            .with_clock(state.clock.clone());

        println!("Collecting feeds every {}", raw);
        let ticks = scheduler
            .run(interval, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Could not listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await;

        println!("Stopped after {} fetches", ticks);
        Ok(())
    })
}

// Help

pub fn help(inv: Invocation<'_>) -> HandlerFuture<'_> {
    Box::pin(async move {
        match optional_arg(inv.args())? {
            Some(name) => {
                let usage = inv
                    .registry
                    .describe(name)
                    .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
                println!("{}", usage);
            }
            None => {
                println!("Available commands:");
                for (_, usage) in inv.registry.describe_all() {
                    println!("  {}", usage);
                }
            }
        }
        Ok(())
    })
}
