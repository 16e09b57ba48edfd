//! The operation set bound to one board.
//!
//! A [`KanbanService`] holds one repository per entity type, all sharing the
//! connection of the board's backend. The backend is chosen once, when the
//! service is built; nothing downstream branches on it again.

use std::sync::Arc;

use chrono::Utc;
use db::models::{
    RepositoryError,
    board::Board,
    card::{Card, CardRepository, LocalCardRepository},
    checklist_item::{ChecklistItem, ChecklistRepository, LocalChecklistRepository},
    column::{Column, ColumnRepository, CreateColumn, LocalColumnRepository},
    comment::{Comment, CommentRepository, LocalCommentRepository},
    person::{LocalPersonRepository, Person, PersonRepository},
};
use remote::db::{
    PgCardRepository, PgChecklistRepository, PgColumnRepository, PgCommentRepository,
    PgPersonRepository,
};
use serde::Serialize;
use sqlx::{PgPool, SqlitePool};
use tracing::debug;

/// Columns every new board starts with, in order. The flag marks the done
/// column.
pub const DEFAULT_COLUMNS: [(&str, bool); 3] =
    [("To Do", false), ("In Progress", false), ("Done", true)];

#[derive(Debug, Clone, Serialize)]
pub struct CardWithDetails {
    #[serde(flatten)]
    pub card: Card,
    pub assignees: Vec<Person>,
    pub comments: Vec<Comment>,
    pub checklist: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnWithCards {
    #[serde(flatten)]
    pub column: Column,
    pub cards: Vec<CardWithDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardWithData {
    #[serde(flatten)]
    pub board: Board,
    pub columns: Vec<ColumnWithCards>,
    pub people: Vec<Person>,
}

pub struct KanbanService {
    board_id: i64,
    columns: Arc<dyn ColumnRepository>,
    cards: Arc<dyn CardRepository>,
    checklist: Arc<dyn ChecklistRepository>,
    people: Arc<dyn PersonRepository>,
    comments: Arc<dyn CommentRepository>,
}

impl std::fmt::Debug for KanbanService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KanbanService")
            .field("board_id", &self.board_id)
            .finish_non_exhaustive()
    }
}

impl KanbanService {
    /// Operations for a board stored in the shared local database.
    pub fn local(board_id: i64, pool: SqlitePool) -> Self {
        Self {
            board_id,
            columns: Arc::new(LocalColumnRepository::new(pool.clone())),
            cards: Arc::new(LocalCardRepository::new(pool.clone())),
            checklist: Arc::new(LocalChecklistRepository::new(pool.clone())),
            people: Arc::new(LocalPersonRepository::new(pool.clone())),
            comments: Arc::new(LocalCommentRepository::new(pool)),
        }
    }

    /// Operations for a board with its own Postgres database.
    pub fn external(board_id: i64, pool: PgPool) -> Self {
        Self {
            board_id,
            columns: Arc::new(PgColumnRepository::new(pool.clone())),
            cards: Arc::new(PgCardRepository::new(pool.clone())),
            checklist: Arc::new(PgChecklistRepository::new(pool.clone())),
            people: Arc::new(PgPersonRepository::new(pool.clone(), board_id)),
            comments: Arc::new(PgCommentRepository::new(pool)),
        }
    }

    pub fn board_id(&self) -> i64 {
        self.board_id
    }

    pub fn columns(&self) -> &dyn ColumnRepository {
        self.columns.as_ref()
    }

    pub fn cards(&self) -> &dyn CardRepository {
        self.cards.as_ref()
    }

    pub fn checklist(&self) -> &dyn ChecklistRepository {
        self.checklist.as_ref()
    }

    pub fn people(&self) -> &dyn PersonRepository {
        self.people.as_ref()
    }

    pub fn comments(&self) -> &dyn CommentRepository {
        self.comments.as_ref()
    }

    pub async fn create_default_columns(&self) -> Result<Vec<Column>, RepositoryError> {
        let mut created = Vec::with_capacity(DEFAULT_COLUMNS.len());
        for (name, is_done_column) in DEFAULT_COLUMNS {
            let column = self
                .columns
                .create(&CreateColumn {
                    board_id: self.board_id,
                    name: name.to_string(),
                    is_done_column,
                })
                .await?;
            created.push(column);
        }
        Ok(created)
    }

    /// A column of this board, or `NotFound` if it belongs elsewhere.
    pub async fn column(&self, column_id: i64) -> Result<Column, RepositoryError> {
        self.columns
            .find_by_id(column_id)
            .await?
            .filter(|c| c.board_id == self.board_id)
            .ok_or(RepositoryError::NotFound {
                entity: "column",
                id: column_id,
            })
    }

    /// A card of this board, or `NotFound` if it belongs elsewhere.
    pub async fn card(&self, card_id: i64) -> Result<Card, RepositoryError> {
        let not_found = RepositoryError::NotFound {
            entity: "card",
            id: card_id,
        };
        let Some(card) = self.cards.find_by_id(card_id).await? else {
            return Err(not_found);
        };
        match self.column(card.column_id).await {
            Ok(_) => Ok(card),
            Err(e) if e.is_not_found() => Err(not_found),
            Err(e) => Err(e),
        }
    }

    /// Move a card, stamping it completed when it lands in a done column and
    /// clearing the stamp otherwise.
    pub async fn move_card(
        &self,
        card_id: i64,
        column_id: i64,
        position: i32,
    ) -> Result<Card, RepositoryError> {
        self.card(card_id).await?;
        let destination = self.column(column_id).await?;
        let completed_at = destination.is_done_column.then(Utc::now);

        debug!(
            board_id = self.board_id,
            card_id,
            column_id,
            position,
            done = destination.is_done_column,
            "Moving card"
        );
        self.cards
            .move_card(card_id, column_id, position, completed_at)
            .await
    }

    pub async fn card_with_details(&self, card_id: i64) -> Result<CardWithDetails, RepositoryError> {
        let card = self.card(card_id).await?;
        self.hydrate(card).await
    }

    async fn hydrate(&self, card: Card) -> Result<CardWithDetails, RepositoryError> {
        let assignees = self.people.find_by_card(card.id).await?;
        let comments = self.comments.find_by_card(card.id).await?;
        let checklist = self.checklist.find_by_card(card.id).await?;
        Ok(CardWithDetails {
            card,
            assignees,
            comments,
            checklist,
        })
    }

    /// Load the full board: columns, their cards, and each card's details.
    ///
    /// Assembled with sequential loads and never cached.
    pub async fn board_with_data(&self, board: Board) -> Result<BoardWithData, RepositoryError> {
        let mut columns = Vec::new();
        for column in self.columns.find_by_board(self.board_id).await? {
            let mut cards = Vec::new();
            for card in self.cards.find_by_column(column.id).await? {
                cards.push(self.hydrate(card).await?);
            }
            columns.push(ColumnWithCards { column, cards });
        }
        let people = self.people.find_by_board(self.board_id).await?;

        Ok(BoardWithData {
            board,
            columns,
            people,
        })
    }
}
