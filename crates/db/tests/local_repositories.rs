//! Integration tests for the local (SQLite) repositories.
//!
//! These cover the positional invariants end to end through the repository
//! traits, plus the board and connection registries.

use std::sync::Arc;

use chrono::Utc;
use db::{
    models::{
        RepositoryError,
        board::{BackendKind, Board, CreateBoard},
        card::{Card, CardRepository, CreateCard, LocalCardRepository, UpdateCard},
        checklist_item::{
            ChecklistRepository, CreateChecklistItem, LocalChecklistRepository,
            UpdateChecklistItem,
        },
        column::{ColumnRepository, CreateColumn, LocalColumnRepository, UpdateColumn},
        comment::{CommentRepository, CreateComment, LocalCommentRepository},
        connection::{CreateConnection, PgConnection, SslMode, UpdateConnection},
        person::{CreatePerson, LocalPersonRepository, PersonRepository},
    },
    test_utils::create_test_pool,
};
use sqlx::SqlitePool;

async fn create_board(pool: &SqlitePool) -> Board {
    Board::create(pool, &CreateBoard::local("Test board"))
        .await
        .expect("Failed to create board")
}

async fn create_column(pool: &SqlitePool, board_id: i64, name: &str, done: bool) -> i64 {
    LocalColumnRepository::new(pool.clone())
        .create(&CreateColumn {
            board_id,
            name: name.to_string(),
            is_done_column: done,
        })
        .await
        .expect("Failed to create column")
        .id
}

async fn create_cards(repo: &LocalCardRepository, column_id: i64, count: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for i in 0..count {
        let card = repo
            .create(&CreateCard {
                column_id,
                title: format!("Card {i}"),
                description: String::new(),
            })
            .await
            .expect("Failed to create card");
        ids.push(card.id);
    }
    ids
}

fn assert_dense(cards: &[Card]) {
    for (index, card) in cards.iter().enumerate() {
        assert_eq!(card.position, index as i32, "gap or duplicate in {cards:?}");
    }
}

fn ids(cards: &[Card]) -> Vec<i64> {
    cards.iter().map(|c| c.id).collect()
}

#[tokio::test]
async fn test_columns_append_move_and_delete_stay_dense() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let repo = LocalColumnRepository::new(pool.clone());

    let todo = create_column(&pool, board.id, "To Do", false).await;
    let doing = create_column(&pool, board.id, "In Progress", false).await;
    let done = create_column(&pool, board.id, "Done", true).await;

    let moved = repo.move_to(done, 0).await.unwrap();
    assert_eq!(moved.position, 0);

    let columns = repo.find_by_board(board.id).await.unwrap();
    let order: Vec<i64> = columns.iter().map(|c| c.id).collect();
    assert_eq!(order, vec![done, todo, doing]);
    assert_eq!(
        columns.iter().map(|c| c.position).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    repo.delete(todo).await.unwrap();
    let columns = repo.find_by_board(board.id).await.unwrap();
    assert_eq!(
        columns.iter().map(|c| (c.id, c.position)).collect::<Vec<_>>(),
        vec![(done, 0), (doing, 1)]
    );

    let renamed = repo
        .update(
            doing,
            &UpdateColumn {
                name: Some("Doing".to_string()),
                is_done_column: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Doing");
    assert!(!renamed.is_done_column);
}

#[tokio::test]
async fn test_column_reorder_requires_full_permutation() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let repo = LocalColumnRepository::new(pool.clone());

    let a = create_column(&pool, board.id, "A", false).await;
    let b = create_column(&pool, board.id, "B", false).await;
    let c = create_column(&pool, board.id, "C", false).await;

    let partial = repo.reorder(board.id, &[c, a]).await;
    assert!(matches!(partial, Err(RepositoryError::InvalidOrder(_))));

    repo.reorder(board.id, &[c, a, b]).await.unwrap();
    let order: Vec<i64> = repo
        .find_by_board(board.id)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(order, vec![c, a, b]);
}

#[tokio::test]
async fn test_card_move_across_columns_renumbers_both() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let todo = create_column(&pool, board.id, "To Do", false).await;
    let done = create_column(&pool, board.id, "Done", true).await;
    let repo = LocalCardRepository::new(pool.clone());

    let todo_cards = create_cards(&repo, todo, 3).await;
    let done_cards = create_cards(&repo, done, 2).await;

    let stamp = Utc::now();
    let moved = repo
        .move_card(todo_cards[0], done, 1, Some(stamp))
        .await
        .unwrap();
    assert_eq!(moved.column_id, done);
    assert_eq!(moved.position, 1);
    assert!(moved.completed_at.is_some());

    let source = repo.find_by_column(todo).await.unwrap();
    let target = repo.find_by_column(done).await.unwrap();
    assert_dense(&source);
    assert_dense(&target);
    assert_eq!(ids(&source), vec![todo_cards[1], todo_cards[2]]);
    assert_eq!(ids(&target), vec![done_cards[0], todo_cards[0], done_cards[1]]);

    let back = repo.move_card(todo_cards[0], todo, 0, None).await.unwrap();
    assert!(back.completed_at.is_none());
    assert_eq!(back.position, 0);
}

#[tokio::test]
async fn test_card_move_to_missing_card_changes_nothing() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let todo = create_column(&pool, board.id, "To Do", false).await;
    let repo = LocalCardRepository::new(pool.clone());
    let cards = create_cards(&repo, todo, 2).await;

    let result = repo.move_card(9999, todo, 0, None).await;
    assert!(matches!(
        result,
        Err(RepositoryError::NotFound { entity: "card", id: 9999 })
    ));
    assert_eq!(ids(&repo.find_by_column(todo).await.unwrap()), cards);
}

#[tokio::test]
async fn test_failed_cross_column_move_rolls_back() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let todo = create_column(&pool, board.id, "To Do", false).await;
    let repo = LocalCardRepository::new(pool.clone());
    let cards = create_cards(&repo, todo, 3).await;

    // The destination column does not exist, so the foreign key rejects the
    // final write after siblings were already shifted.
    let result = repo.move_card(cards[0], 424242, 0, None).await;
    assert!(matches!(result, Err(RepositoryError::Database(_))));

    let after = repo.find_by_column(todo).await.unwrap();
    assert_dense(&after);
    assert_eq!(ids(&after), cards);
}

#[tokio::test]
async fn test_card_update_and_delete() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let todo = create_column(&pool, board.id, "To Do", false).await;
    let repo = LocalCardRepository::new(pool.clone());
    let cards = create_cards(&repo, todo, 3).await;

    let updated = repo
        .update(
            cards[1],
            &UpdateCard {
                title: None,
                description: Some("Details".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Card 1");
    assert_eq!(updated.description, "Details");
    assert!(updated.updated_at >= updated.created_at);

    repo.delete(cards[0]).await.unwrap();
    let remaining = repo.find_by_column(todo).await.unwrap();
    assert_dense(&remaining);
    assert_eq!(ids(&remaining), vec![cards[1], cards[2]]);

    assert!(repo.delete(cards[0]).await.unwrap_err().is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_partial_updates_keep_both_fields() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let todo = create_column(&pool, board.id, "To Do", false).await;
    let cards = Arc::new(LocalCardRepository::new(pool.clone()));
    let columns = Arc::new(LocalColumnRepository::new(pool.clone()));
    let items = Arc::new(LocalChecklistRepository::new(pool.clone()));

    for round in 0..50 {
        let card_id = create_cards(&cards, todo, 1).await[0];
        let item_id = items
            .create(&CreateChecklistItem {
                card_id,
                content: "Draft".to_string(),
            })
            .await
            .unwrap()
            .id;
        let done = round % 2 == 0;

        let title = UpdateCard {
            title: Some(format!("Title {round}")),
            ..Default::default()
        };
        let description = UpdateCard {
            description: Some(format!("Description {round}")),
            ..Default::default()
        };
        let name = UpdateColumn {
            name: Some(format!("Column {round}")),
            ..Default::default()
        };
        let flag = UpdateColumn {
            is_done_column: Some(done),
            ..Default::default()
        };
        let content = UpdateChecklistItem {
            content: Some(format!("Item {round}")),
            ..Default::default()
        };
        let completed = UpdateChecklistItem {
            is_completed: Some(true),
            ..Default::default()
        };

        let mut handles = Vec::new();
        for update in [title, description] {
            let cards = cards.clone();
            handles.push(tokio::spawn(async move {
                cards.update(card_id, &update).await.map(|_| ())
            }));
        }
        for update in [name, flag] {
            let columns = columns.clone();
            handles.push(tokio::spawn(async move {
                columns.update(todo, &update).await.map(|_| ())
            }));
        }
        for update in [content, completed] {
            let items = items.clone();
            handles.push(tokio::spawn(async move {
                items.update(item_id, &update).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let card = cards.find_by_id(card_id).await.unwrap().unwrap();
        assert_eq!(card.title, format!("Title {round}"));
        assert_eq!(card.description, format!("Description {round}"));

        let column = columns.find_by_id(todo).await.unwrap().unwrap();
        assert_eq!(column.name, format!("Column {round}"));
        assert_eq!(column.is_done_column, done);

        let item = items.find_by_id(item_id).await.unwrap().unwrap();
        assert_eq!(item.content, format!("Item {round}"));
        assert!(item.is_completed);
    }
}

#[tokio::test]
async fn test_update_of_missing_rows_is_not_found() {
    let (pool, _dir) = create_test_pool().await;

    let card = LocalCardRepository::new(pool.clone())
        .update(
            404,
            &UpdateCard {
                title: Some("Ghost".to_string()),
                description: None,
            },
        )
        .await;
    assert!(matches!(
        card,
        Err(RepositoryError::NotFound { entity: "card", id: 404 })
    ));

    let column = LocalColumnRepository::new(pool.clone())
        .update(404, &UpdateColumn::default())
        .await;
    assert!(column.unwrap_err().is_not_found());

    let item = LocalChecklistRepository::new(pool)
        .update(404, &UpdateChecklistItem::default())
        .await;
    assert!(item.unwrap_err().is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cross_column_moves_stay_dense() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let left = create_column(&pool, board.id, "Left", false).await;
    let right = create_column(&pool, board.id, "Right", false).await;
    let repo = Arc::new(LocalCardRepository::new(pool.clone()));

    let mut all = create_cards(&repo, left, 10).await;
    all.extend(create_cards(&repo, right, 10).await);

    let mut handles = Vec::new();
    for (i, card_id) in all.iter().copied().enumerate() {
        let repo = repo.clone();
        let target = if i < 10 { right } else { left };
        handles.push(tokio::spawn(async move {
            repo.move_card(card_id, target, (i % 4) as i32, None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut seen = Vec::new();
    for column_id in [left, right] {
        let listed = repo.find_by_column(column_id).await.unwrap();
        assert_eq!(listed.len(), 10);
        assert_dense(&listed);
        seen.extend(ids(&listed));
    }
    seen.sort_unstable();
    all.sort_unstable();
    assert_eq!(seen, all);
}

#[tokio::test]
async fn test_checklist_items_move_between_cards() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let todo = create_column(&pool, board.id, "To Do", false).await;
    let cards = create_cards(&LocalCardRepository::new(pool.clone()), todo, 2).await;
    let repo = LocalChecklistRepository::new(pool.clone());

    let mut first = Vec::new();
    for content in ["a", "b", "c"] {
        let item = repo
            .create(&CreateChecklistItem {
                card_id: cards[0],
                content: content.to_string(),
            })
            .await
            .unwrap();
        first.push(item.id);
    }

    let moved = repo.move_item(first[2], cards[1], 0).await.unwrap();
    assert_eq!((moved.card_id, moved.position), (cards[1], 0));

    let remaining = repo.find_by_card(cards[0]).await.unwrap();
    assert_eq!(
        remaining.iter().map(|i| (i.id, i.position)).collect::<Vec<_>>(),
        vec![(first[0], 0), (first[1], 1)]
    );

    let toggled = repo
        .update(
            first[0],
            &UpdateChecklistItem {
                content: None,
                is_completed: Some(true),
            },
        )
        .await
        .unwrap();
    assert!(toggled.is_completed);
    assert_eq!(toggled.content, "a");

    repo.reorder(cards[0], &[first[1], first[0]]).await.unwrap();
    let reordered = repo.find_by_card(cards[0]).await.unwrap();
    assert_eq!(reordered[0].id, first[1]);
}

#[tokio::test]
async fn test_people_and_assignees() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let todo = create_column(&pool, board.id, "To Do", false).await;
    let cards = create_cards(&LocalCardRepository::new(pool.clone()), todo, 1).await;
    let repo = LocalPersonRepository::new(pool.clone());

    let mut people = Vec::new();
    for name in ["Zoe", "Adam", "Maya"] {
        let person = repo
            .create(&CreatePerson {
                board_id: board.id,
                name: name.to_string(),
            })
            .await
            .unwrap();
        people.push(person);
    }

    let names: Vec<String> = repo
        .find_by_board(board.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Adam", "Maya", "Zoe"]);

    repo.set_card_assignees(cards[0], &[people[0].id, people[2].id])
        .await
        .unwrap();
    let assigned: Vec<String> = repo
        .find_by_card(cards[0])
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(assigned, vec!["Maya", "Zoe"]);

    repo.set_card_assignees(cards[0], &[]).await.unwrap();
    assert!(repo.find_by_card(cards[0]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_comments_newest_first() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let todo = create_column(&pool, board.id, "To Do", false).await;
    let cards = create_cards(&LocalCardRepository::new(pool.clone()), todo, 1).await;
    let repo = LocalCommentRepository::new(pool.clone());

    let first = repo
        .create(&CreateComment {
            card_id: cards[0],
            content: "first".to_string(),
        })
        .await
        .unwrap();
    let second = repo
        .create(&CreateComment {
            card_id: cards[0],
            content: "second".to_string(),
        })
        .await
        .unwrap();

    let listed = repo.find_by_card(cards[0]).await.unwrap();
    assert_eq!(
        listed.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );

    repo.delete(first.id).await.unwrap();
    assert_eq!(repo.find_by_card(cards[0]).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_deleting_board_cascades_local_content() {
    let (pool, _dir) = create_test_pool().await;
    let board = create_board(&pool).await;
    let todo = create_column(&pool, board.id, "To Do", false).await;
    create_cards(&LocalCardRepository::new(pool.clone()), todo, 2).await;

    assert_eq!(Board::delete(&pool, board.id).await.unwrap(), 1);

    let cards: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(cards, 0);
}

#[tokio::test]
async fn test_connection_registry() {
    let (pool, _dir) = create_test_pool().await;

    let staging = PgConnection::create(
        &pool,
        &CreateConnection {
            name: "Staging".to_string(),
            host: "localhost".to_string(),
            port: None,
            username: "plank".to_string(),
            password: "secret".to_string(),
            ssl_mode: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(staging.port, 5432);
    assert_eq!(staging.ssl_mode, SslMode::Disable);

    PgConnection::create(
        &pool,
        &CreateConnection {
            name: "Archive".to_string(),
            host: "archive".to_string(),
            port: Some(6543),
            username: "plank".to_string(),
            password: String::new(),
            ssl_mode: Some(SslMode::Require),
        },
    )
    .await
    .unwrap();

    let names: Vec<String> = PgConnection::find_all(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Archive", "Staging"]);

    let updated = PgConnection::update(
        &pool,
        staging.id,
        &UpdateConnection {
            host: Some("db.internal".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(updated.host, "db.internal");
    assert_eq!(updated.password, "secret");

    let board = Board::create(
        &pool,
        &CreateBoard::external("Roadmap", staging.id, "roadmap"),
    )
    .await
    .unwrap();
    assert_eq!(board.backend, BackendKind::External);
    assert_eq!(board.external_target(), Some((staging.id, "roadmap")));
    assert!(Board::exists_for_connection(&pool, staging.id).await.unwrap());

    // Referenced connections cannot be removed.
    assert!(PgConnection::delete(&pool, staging.id).await.is_err());

    Board::delete(&pool, board.id).await.unwrap();
    assert!(!Board::exists_for_connection(&pool, staging.id).await.unwrap());
    assert_eq!(PgConnection::delete(&pool, staging.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_board_registry_default_and_rename() {
    let (pool, _dir) = create_test_pool().await;
    assert!(Board::find_default(&pool).await.unwrap().is_none());

    let first = create_board(&pool).await;
    let second = create_board(&pool).await;
    assert_eq!(Board::find_default(&pool).await.unwrap().unwrap().id, first.id);

    let renamed = Board::update_name(&pool, second.id, "Renamed")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.name, "Renamed");
    assert!(Board::update_name(&pool, 999, "x").await.unwrap().is_none());
    assert_eq!(Board::find_all(&pool).await.unwrap().len(), 2);
}
