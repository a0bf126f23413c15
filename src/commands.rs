use crate::{emit_success, Context, OutputMode};
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Instant;
use storemap::catalog::{FavoritesService, ReviewLog, StoreRepository};
use storemap::config::{self, StoremapConfig};
use storemap::query::{GeoIndex, GeoQuery, RatingAggregator, SearchIndex, TagAggregator};
use storemap::storage::SqliteStore;
use storemap::store::{NewLocation, NewStore, Store, StoreId, StorePatch};
use storemap::ui::{self, store_table, theme, Icons, ImportProgress, StoreRow};
use storemap::{NewReview, User};

/// Flags of `add-store`
pub struct StoreArgs {
    pub name: String,
    pub address: String,
    pub lng: f64,
    pub lat: f64,
    pub author: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub photo: Option<String>,
}

/// Flags of `update-store`; `None` keeps the stored value
pub struct PatchArgs {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<(String, f64, f64)>,
    pub photo: Option<String>,
}

fn open(ctx: &Context) -> anyhow::Result<SqliteStore> {
    config::ensure_db_dir(&ctx.database_path)?;
    Ok(SqliteStore::open_with_timeout(&ctx.database_path, ctx.config.busy_timeout())?)
}

fn print_stores(stores: &[Store], extra: impl Fn(&Store) -> String) {
    if stores.is_empty() {
        println!("{} {}", Icons::CROSS, ui::muted("No stores found."));
        return;
    }
    let rows: Vec<StoreRow> = stores.iter().map(|s| StoreRow::new(s, extra(s))).collect();
    println!("{}", store_table(&rows));
}

fn print_store(store: &Store) {
    ui::header(&store.name);
    ui::info("Slug", &store.slug.style(theme().accent.clone()).to_string());
    ui::info("Address", &store.location.address);
    ui::info(
        "Coordinates",
        &format!("{:.6}, {:.6} (lat, lng)", store.location.lat(), store.location.lng()),
    );
    if let Some(description) = &store.description {
        ui::info("Description", description);
    }
    if !store.tags.is_empty() {
        ui::info("Tags", &store.tags.join(", "));
    }
    if let Some(photo) = &store.photo {
        ui::info("Photo", photo);
    }
    ui::info("Author", &store.author_id);
    ui::info("Created", &store.created_at.format("%Y-%m-%d %H:%M UTC").to_string());
}

pub fn run_init(ctx: &Context, force: bool) -> anyhow::Result<()> {
    let database = ctx
        .config
        .database
        .clone()
        .unwrap_or_else(|| config::default_database_path().display().to_string());
    let written = StoremapConfig {
        database: Some(database),
        ..ctx.config.clone()
    };
    config::write_config(&ctx.config_path, &written, force)?;

    let database_path = written.database_path();
    config::ensure_db_dir(&database_path)?;
    SqliteStore::open_with_timeout(&database_path, written.busy_timeout())?;

    if ctx.output_mode.is_human() {
        ui::success(&format!("Wrote {}", ctx.config_path.display()));
        ui::info("Database", &database_path.display().to_string());
    }
    emit_success(ctx.output_mode, "init", serde_json::json!({
        "config": ctx.config_path,
        "database": database_path,
    }))
}

pub fn run_add_store(ctx: &Context, args: StoreArgs) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let mut input = NewStore::new(args.name, NewLocation::point(args.address, args.lng, args.lat), args.author)
        .with_tags(args.tags);
    if let Some(description) = args.description {
        input = input.with_description(description);
    }
    if let Some(photo) = args.photo {
        input = input.with_photo(photo);
    }

    let store = StoreRepository::new(&db).create(input)?;
    if ctx.output_mode.is_human() {
        ui::success(&format!("Created store {} ({})", store.name, store.slug));
    }
    emit_success(ctx.output_mode, "add-store", &store)
}

pub fn run_update_store(ctx: &Context, id: StoreId, user: &str, args: PatchArgs) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let patch = StorePatch {
        name: args.name,
        description: args.description,
        tags: args.tags,
        location: args.location.map(|(address, lng, lat)| NewLocation::point(address, lng, lat)),
        photo: args.photo,
    };

    let store = StoreRepository::new(&db).update(id, patch, user)?;
    if ctx.output_mode.is_human() {
        ui::success(&format!("Updated store {} ({})", store.name, store.slug));
    }
    emit_success(ctx.output_mode, "update-store", &store)
}

pub fn run_show(ctx: &Context, slug: &str) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let detail = StoreRepository::new(&db).get_by_slug(slug)?;

    if ctx.output_mode.is_human() {
        print_store(&detail.store);
        ui::section(&format!("Reviews ({})", detail.reviews.len()));
        for review in &detail.reviews {
            println!(
                "  {} {}  {}  {}",
                Icons::STAR,
                review.rating.style(theme().accent.clone()),
                review.text,
                ui::dim(&format!("- {}", review.author_id))
            );
        }
    }
    emit_success(ctx.output_mode, "show", &detail)
}

pub fn run_list(ctx: &Context, page: u32) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let listing = StoreRepository::new(&db)
        .with_page_size(ctx.config.page_size)
        .list_page(page)?;

    if ctx.output_mode.is_human() {
        print_stores(&listing.stores, |s| s.created_at.format("%Y-%m-%d").to_string());
        ui::summary_row(
            "Page",
            &format!("{} of {} ({} stores)", listing.page, listing.pages.max(1), listing.count),
        );
    }
    emit_success(ctx.output_mode, "list", &listing)
}

pub fn run_search(ctx: &Context, query: &str, limit: Option<usize>) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let hits = SearchIndex::new(&db)
        .with_limit(limit.unwrap_or(ctx.config.search_limit))
        .search_scored(query)?;

    if ctx.output_mode.is_human() {
        println!("{} Searching for: '{}'", Icons::SEARCH, query);
        if hits.is_empty() {
            println!("{} {}", Icons::CROSS, ui::muted("No stores found."));
        } else {
            let rows: Vec<StoreRow> = hits
                .iter()
                .map(|hit| StoreRow::new(&hit.store, format!("score {:.2}", hit.score)))
                .collect();
            println!("{}", store_table(&rows));
        }
    }
    emit_success(ctx.output_mode, "search", &hits)
}

pub fn run_near(
    ctx: &Context,
    lat: f64,
    lng: f64,
    max_distance: Option<f64>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let query = GeoQuery::new(lat, lng)?
        .with_max_distance(max_distance.unwrap_or(ctx.config.nearby_max_distance_m))?
        .with_limit(limit.unwrap_or(ctx.config.nearby_limit));
    let stores = GeoIndex::new(&db).query(&query)?;

    if ctx.output_mode.is_human() {
        println!(
            "{} Within {:.0} m of {:.5}, {:.5}",
            Icons::PIN,
            query.max_distance_meters,
            query.lat,
            query.lng
        );
        if stores.is_empty() {
            println!("{} {}", Icons::CROSS, ui::muted("No stores nearby."));
        }
        for store in &stores {
            println!(
                "  {:>8}  {} {}",
                format!("{:.0} m", store.distance_meters).style(theme().accent.clone()),
                store.name,
                ui::dim(&format!("({}, {})", store.slug, store.location.address))
            );
        }
    }
    emit_success(ctx.output_mode, "near", &stores)
}

pub fn run_tags(ctx: &Context, tag: Option<&str>) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let page = TagAggregator::new(&db).tag_page(tag)?;

    if ctx.output_mode.is_human() {
        let cloud: Vec<String> = page
            .tags
            .iter()
            .map(|t| {
                let label = format!("{} ({})", t.tag, t.count);
                if page.tag.as_deref() == Some(t.tag.as_str()) {
                    label.style(theme().accent.clone()).to_string()
                } else {
                    label
                }
            })
            .collect();
        println!("{} {}", Icons::TAG, cloud.join("  "));
        println!();
        print_stores(&page.stores, |s| s.tags.join(", "));
    }
    emit_success(ctx.output_mode, "tags", &page)
}

pub fn run_top(ctx: &Context, limit: Option<usize>) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let ranked = RatingAggregator::new(&db).top_rated(limit.unwrap_or(ctx.config.top_limit))?;

    if ctx.output_mode.is_human() {
        ui::header("Top stores");
        if ranked.is_empty() {
            println!("{} {}", Icons::CROSS, ui::muted("No store has enough reviews yet."));
        }
        for (rank, entry) in ranked.iter().enumerate() {
            println!(
                "  {:>2}. {} {:.2}  {} {}",
                rank + 1,
                Icons::STAR,
                entry.average_rating.style(theme().accent.clone()),
                entry.store.name,
                ui::dim(&format!("({} reviews)", entry.review_count))
            );
        }
    }
    emit_success(ctx.output_mode, "top", &ranked)
}

pub fn run_heart(ctx: &Context, user: &str, store_id: StoreId) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let hearts = FavoritesService::new(&db).toggle_heart(user, store_id)?;

    if ctx.output_mode.is_human() {
        let verb = if hearts.contains(&store_id) { "Hearted" } else { "Un-hearted" };
        println!("{} {} store {} ({} hearted)", Icons::HEART, verb, store_id, hearts.len());
    }
    emit_success(ctx.output_mode, "heart", &hearts)
}

pub fn run_hearts(ctx: &Context, user: &str) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let stores = FavoritesService::new(&db).list_hearted(user)?;

    if ctx.output_mode.is_human() {
        println!("{} Hearted by {}", Icons::HEART, user);
        print_stores(&stores, |_| String::new());
    }
    emit_success(ctx.output_mode, "hearts", &stores)
}

pub fn run_add_user(ctx: &Context, id: String, name: String, email: Option<String>) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let mut user = User::new(id, name);
    if let Some(email) = email {
        user = user.with_email(email);
    }
    db.upsert_user(&user)?;

    if ctx.output_mode.is_human() {
        println!("{} Saved user {} ({})", Icons::PERSON, user.id, user.name);
    }
    emit_success(ctx.output_mode, "add-user", &user)
}

pub fn run_add_review(ctx: &Context, store_id: StoreId, user: String, rating: i64, text: String) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let review = ReviewLog::new(&db).add_review(NewReview::new(store_id, user, rating, text))?;

    if ctx.output_mode.is_human() {
        ui::success(&format!("Recorded a {}-star review of store {}", review.rating, review.store_id));
    }
    emit_success(ctx.output_mode, "add-review", &review)
}

pub fn run_import(ctx: &Context, file: &Path) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)?;
    let inputs: Vec<NewStore> = serde_json::from_str(&contents)?;
    let db = open(ctx)?;
    let repo = StoreRepository::new(&db);

    let started = Instant::now();
    let progress = (ctx.output_mode == OutputMode::Human).then(|| ImportProgress::new(inputs.len()));
    let mut created = Vec::new();
    let mut skipped = Vec::new();

    for input in inputs {
        let name = input.name.clone();
        match repo.create(input) {
            Ok(store) => {
                if let Some(p) = &progress {
                    p.imported(&store.name);
                }
                created.push(store);
            }
            Err(e) => {
                tracing::warn!("Skipping '{}': {}", name, e);
                if let Some(p) = &progress {
                    p.skipped(&name, &e.to_string());
                }
                skipped.push(serde_json::json!({ "name": name, "error": e.to_string() }));
            }
        }
    }

    if let Some(p) = &progress {
        p.finish_with_summary(started.elapsed(), created.len(), skipped.len());
    }
    emit_success(ctx.output_mode, "import", serde_json::json!({
        "imported": created,
        "skipped": skipped,
    }))
}

pub fn run_stats(ctx: &Context) -> anyhow::Result<()> {
    let db = open(ctx)?;
    let stats = db.stats()?;

    if ctx.output_mode.is_human() {
        println!("{} Storemap Statistics ({})", Icons::STATS, ctx.database_path.display());
        println!(
            "{}",
            ui::stats_table(&[
                ("Stores", stats.stores.to_string()),
                ("Distinct tags", stats.tags.to_string()),
                ("Reviews", stats.reviews.to_string()),
                ("Users", stats.users.to_string()),
                ("Hearts", stats.hearts.to_string()),
            ])
        );
    }
    emit_success(ctx.output_mode, "stats", &stats)
}

pub fn run_serve(ctx: Context, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = ctx.config;
    if let Some(port) = port {
        config.port = port;
    }
    config::ensure_db_dir(&ctx.database_path)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(storemap::server::start_server(config, ctx.database_path))
}
