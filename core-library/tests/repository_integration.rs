//! Repository behavior checked against both stores: the in-memory arena and
//! SQLite through the native adapter.

use bridge_traits::database::{DatabaseAdapter, DatabaseConfig};
use core_library::models::{Episode, Genre, Resource, Season, Show, Studio};
use core_library::query::sort::Sort;
use core_library::{
    Filter, LibraryError, LibraryManager, ListRequest, MemoryStore, Pagination, SqlStore,
    SqliteAdapter, Store,
};
use core_runtime::LibraryConfig;
use std::collections::HashSet;
use std::sync::Arc;

async fn sqlite_store() -> Arc<dyn Store> {
    let mut adapter = SqliteAdapter::new(DatabaseConfig::in_memory())
        .await
        .expect("open in-memory database");
    adapter.initialize().await.expect("initialize adapter");
    let store = SqlStore::new(Arc::new(adapter));
    store.initialize().await.expect("apply migrations");
    Arc::new(store)
}

/// One manager per store implementation, each over an empty library.
async fn managers() -> Vec<(&'static str, LibraryManager)> {
    let config = LibraryConfig::default();
    vec![
        (
            "memory",
            LibraryManager::new(Arc::new(MemoryStore::new()), config.clone()).unwrap(),
        ),
        (
            "sqlite",
            LibraryManager::new(sqlite_store().await, config).unwrap(),
        ),
    ]
}

fn request(params: &[(&str, &str)]) -> ListRequest {
    ListRequest::parse(Show::schema(), params.iter().copied()).unwrap()
}

fn titles(shows: &[Show]) -> Vec<&str> {
    shows.iter().map(|s| s.title.as_str()).collect()
}

async fn seed_shows(manager: &LibraryManager, titles: &[&str]) -> Vec<Show> {
    let mut created = Vec::new();
    for title in titles {
        created.push(manager.shows().create(Show::new(*title)).await.unwrap());
    }
    created
}

/// Walk every page of `sort` and return the concatenated items.
async fn walk(manager: &LibraryManager, sort: &Sort, limit: u32) -> Vec<Show> {
    let mut all = Vec::new();
    let mut pagination = Pagination::new(limit);
    loop {
        let page = manager
            .shows()
            .get_all(Filter::True, sort, pagination)
            .await
            .unwrap();
        let full = page.len() == limit as usize;
        if let Some(last) = page.last() {
            pagination = pagination.after(last.id);
        }
        all.extend(page);
        if !full {
            return all;
        }
    }
}

// =============================================================================
// Filtering
// =============================================================================

#[tokio::test]
async fn test_title_contains() {
    for (store, manager) in managers().await {
        seed_shows(&manager, &["Anohana"]).await;

        let found = manager.shows().list(&request(&[("title", "ctn:Ano")])).await.unwrap();
        assert_eq!(titles(&found), vec!["Anohana"], "{}", store);

        let found = manager.shows().list(&request(&[("title", "ctn:ZZZ")])).await.unwrap();
        assert!(found.is_empty(), "{}", store);
    }
}

#[tokio::test]
async fn test_genre_filter_is_conjunctive() {
    for (store, manager) in managers().await {
        let shows = [
            ("Both", vec!["Action", "Comedy"]),
            ("Action Only", vec!["Action"]),
            ("Comedy Only", vec!["Comedy", "Drama"]),
        ];
        for (title, genres) in shows {
            let mut show = Show::new(title);
            show.genres = Some(genres.into_iter().map(Genre::new).collect());
            manager.shows().create(show).await.unwrap();
        }

        let found = manager
            .shows()
            .list(&request(&[("genres", "ctn:action,comedy")]))
            .await
            .unwrap();
        assert_eq!(titles(&found), vec!["Both"], "{}", store);

        let found = manager
            .shows()
            .list(&request(&[("genres", "action")]))
            .await
            .unwrap();
        assert_eq!(titles(&found), vec!["Action Only", "Both"], "{}", store);

        let found = manager
            .shows()
            .list(&request(&[("genres", "not:action")]))
            .await
            .unwrap();
        assert_eq!(titles(&found), vec!["Comedy Only"], "{}", store);
    }
}

#[tokio::test]
async fn test_invalid_filter_names_the_field() {
    let err = ListRequest::parse(Show::schema(), [("rating", "gt:3")]).unwrap_err();
    assert!(matches!(err, LibraryError::InvalidFilter { ref field, .. } if field == "rating"));

    let err = ListRequest::parse(Show::schema(), [("startAir", "gt:yesterday")]).unwrap_err();
    assert!(matches!(err, LibraryError::InvalidFilter { ref field, .. } if field == "start_air"));
}

// =============================================================================
// Sorting and pagination
// =============================================================================

#[tokio::test]
async fn test_pagination_visits_every_row_once() {
    for (store, manager) in managers().await {
        let seeded = seed_shows(
            &manager,
            &[
                "Kanon", "Clannad", "Air", "Toradora", "Anohana", "Steins Gate", "Bakemonogatari",
                "Nichijou", "Hyouka", "Mushishi", "Haibane Renmei",
            ],
        )
        .await;
        // Most rows tie on the flag so the id tie-break decides.
        for show in seeded.iter().step_by(3) {
            manager
                .shows()
                .patch(show.id, |s: &mut Show| {
                    s.is_movie = true;
                    Ok(())
                })
                .await
                .unwrap();
        }

        for descriptor in ["title", "title:desc", "isMovie,title:desc", "is_movie:desc", "random:7"] {
            let sort = Sort::parse(Show::schema(), descriptor).unwrap();
            let expected = manager
                .shows()
                .get_all(Filter::True, &sort, Pagination::new(100))
                .await
                .unwrap();
            assert_eq!(expected.len(), seeded.len(), "{} {}", store, descriptor);

            for limit in [1, 3, 4, 11] {
                let walked = walk(&manager, &sort, limit).await;
                assert_eq!(
                    titles(&walked),
                    titles(&expected),
                    "{} sorted by {} with pages of {}",
                    store,
                    descriptor,
                    limit
                );
                let unique: HashSet<i64> = walked.iter().map(|s| s.id).collect();
                assert_eq!(unique.len(), seeded.len());
            }
        }
    }
}

#[tokio::test]
async fn test_random_order_is_stable_for_a_seed() {
    for (store, manager) in managers().await {
        seed_shows(&manager, &["A", "B", "C", "D", "E", "F", "G", "H"]).await;

        let listing = request(&[("sortBy", "random:42")]);
        let first = manager.shows().list(&listing).await.unwrap();
        let second = manager.shows().list(&listing).await.unwrap();
        assert_eq!(first, second, "{}", store);
    }
}

#[tokio::test]
async fn test_random_order_matches_across_stores() {
    let mut orders = Vec::new();
    for (_, manager) in managers().await {
        seed_shows(&manager, &["A", "B", "C", "D", "E", "F", "G", "H"]).await;
        let shows = manager
            .shows()
            .list(&request(&[("sortBy", "random:42")]))
            .await
            .unwrap();
        orders.push(titles(&shows).join(","));
    }
    assert_eq!(orders[0], orders[1]);
}

#[tokio::test]
async fn test_page_links() {
    for (store, manager) in managers().await {
        let seeded = seed_shows(&manager, &["A", "B"]).await;

        let page = manager
            .shows()
            .page(&request(&[("limit", "1")]), "/shows")
            .await
            .unwrap();
        assert_eq!(titles(&page.items), vec!["A"], "{}", store);
        assert_eq!(page.this, "/shows?limit=1");
        assert_eq!(page.first, "/shows?limit=1");
        assert_eq!(
            page.next,
            Some(format!("/shows?limit=1&afterID={}", seeded[0].id))
        );

        let cursor = seeded[0].id.to_string();
        let page = manager
            .shows()
            .page(&request(&[("limit", "1"), ("afterID", cursor.as_str())]), "/shows")
            .await
            .unwrap();
        assert_eq!(titles(&page.items), vec!["B"], "{}", store);
        assert_eq!(page.first, "/shows?limit=1");
        assert_eq!(
            page.next,
            Some(format!("/shows?limit=1&afterID={}", seeded[1].id))
        );

        let cursor = seeded[1].id.to_string();
        let page = manager
            .shows()
            .page(&request(&[("limit", "1"), ("afterID", cursor.as_str())]), "/shows")
            .await
            .unwrap();
        assert!(page.is_empty(), "{}", store);
        assert_eq!(page.next, None);
    }
}

#[tokio::test]
async fn test_limit_is_capped() {
    let config = LibraryConfig::builder()
        .default_page_size(2)
        .max_page_size(2)
        .build().unwrap();
    let manager = LibraryManager::new(Arc::new(MemoryStore::new()), config).unwrap();
    seed_shows(&manager, &["A", "B", "C"]).await;

    let shows = manager.shows().list(&request(&[("limit", "50")])).await.unwrap();
    assert_eq!(shows.len(), 2);
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_create_if_not_exists_returns_the_stored_row() {
    for (store, manager) in managers().await {
        let first = manager
            .studios()
            .create_if_not_exists(Studio::new("Kyoto Animation"))
            .await
            .unwrap();
        let second = manager
            .studios()
            .create_if_not_exists(Studio::new("Kyoto Animation"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id, "{}", store);
        assert_eq!(manager.studios().get_count(&Filter::True).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_ids_are_unique_across_kinds() {
    for (store, manager) in managers().await {
        let show = manager.shows().create(Show::new("Anohana")).await.unwrap();
        let genre = manager.genres().create(Genre::new("Drama")).await.unwrap();
        assert_ne!(show.id, genre.id, "{}", store);
    }
}

#[tokio::test]
async fn test_edit_with_and_without_reset() {
    for (store, manager) in managers().await {
        let mut show = Show::new("Anohana");
        show.overview = Some("Six friends".to_string());
        show.genres = Some(vec![Genre::new("Drama")]);
        let show = manager.shows().create(show).await.unwrap();

        let edited = Show {
            slug: "anohana".to_string(),
            title: "Ano Hi Mita Hana".to_string(),
            ..Default::default()
        };
        let kept = manager.shows().edit(edited.clone(), false).await.unwrap();
        assert_eq!(kept.id, show.id, "{}", store);
        assert_eq!(kept.title, "Ano Hi Mita Hana");
        assert_eq!(kept.overview.as_deref(), Some("Six friends"));
        let kept = manager.load(kept, "genres").await.unwrap();
        assert_eq!(kept.genres.map(|g| g.len()), Some(1), "{}", store);

        let reset = manager.shows().edit(edited, true).await.unwrap();
        assert_eq!(reset.id, show.id);
        assert_eq!(reset.slug, "anohana");
        assert_eq!(reset.overview, None, "{}", store);
        let reset = manager.load(reset, "genres").await.unwrap();
        assert_eq!(reset.genres, Some(Vec::new()), "{}", store);
    }
}

#[tokio::test]
async fn test_invalid_relations_are_rejected() {
    for (store, manager) in managers().await {
        let err = manager.seasons().create(Season::default()).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidRelation { .. }), "{}", store);

        let err = manager.seasons().create(Season::new(999, 1)).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidRelation { .. }), "{}", store);

        let anohana = manager.shows().create(Show::new("Anohana")).await.unwrap();
        let clannad = manager.shows().create(Show::new("Clannad")).await.unwrap();
        let season = manager.seasons().create(Season::new(clannad.id, 1)).await.unwrap();
        let episode = Episode {
            show_id: Some(anohana.id),
            season_id: Some(season.id),
            season_number: Some(1),
            episode_number: Some(1),
            ..Default::default()
        };
        let err = manager.episodes().create(episode).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidRelation { .. }), "{}", store);
    }
}

// =============================================================================
// Deletes
// =============================================================================

#[tokio::test]
async fn test_delete_cascades_to_owned_children() {
    for (store, manager) in managers().await {
        let mut show = Show::new("Anohana");
        show.genres = Some(vec![Genre::new("Drama")]);
        let show = manager.shows().create(show).await.unwrap();
        let season = manager.seasons().create(Season::new(show.id, 1)).await.unwrap();
        assert_eq!(season.slug, "anohana-s1");
        for number in 1..=3 {
            let episode = Episode {
                show_id: Some(show.id),
                season_id: Some(season.id),
                season_number: Some(1),
                episode_number: Some(number),
                ..Default::default()
            };
            manager.episodes().create(episode).await.unwrap();
        }

        let found = manager.episodes().get_episode("anohana", 1, 2).await.unwrap();
        assert_eq!(found.slug, "anohana-s1e2", "{}", store);
        let found = manager.seasons().get_season(show.id, 1).await.unwrap();
        assert_eq!(found.id, season.id);

        manager.shows().delete("anohana").await.unwrap();
        assert_eq!(manager.seasons().get_count(&Filter::True).await.unwrap(), 0, "{}", store);
        assert_eq!(manager.episodes().get_count(&Filter::True).await.unwrap(), 0, "{}", store);
        // Linked genres are not owned.
        let genre = manager.genres().get("drama").await.unwrap();
        let genre = manager.load(genre, "shows").await.unwrap();
        assert_eq!(genre.shows, Some(Vec::new()), "{}", store);
    }
}

#[tokio::test]
async fn test_delete_detaches_non_owned_references() {
    for (store, manager) in managers().await {
        let mut show = Show::new("Anohana");
        show.studio = Some(Box::new(Studio::new("A-1 Pictures")));
        let show = manager.shows().create(show).await.unwrap();
        assert!(show.studio_id.is_some());

        manager.studios().delete("a-1-pictures").await.unwrap();
        let show = manager.shows().get(show.id).await.unwrap();
        assert_eq!(show.studio_id, None, "{}", store);
    }
}

#[tokio::test]
async fn test_delete_all_counts_matches() {
    for (store, manager) in managers().await {
        seed_shows(&manager, &["Kanon", "Clannad", "Air"]).await;
        let removed = manager
            .shows()
            .delete_all(request(&[("title", "ctn:n")]).filter)
            .await
            .unwrap();
        assert_eq!(removed, 2, "{}", store);
        let left = manager.shows().list(&request(&[])).await.unwrap();
        assert_eq!(titles(&left), vec!["Air"]);
    }
}
