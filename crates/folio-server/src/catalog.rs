//! The catalog demo surface.
//!
//! A deliberately thin book catalog that exercises the whole pipeline
//! end to end: three mutating commands routed through tracing, error
//! translation, idempotency and transaction stages, plus a direct read
//! path. The repository is in-memory; it stands in for whatever
//! persistence a real service would wire behind the handlers.

use dashmap::DashMap;
use folio_core::{
    Command, CommandHandler, CommandResult, DomainError, ErrorCategory, ErrorMappings,
    ExecutionContext, MappingError, NoContent, NoopUnitOfWork,
};
use folio_guard::IdempotencyService;
use folio_pipeline::{
    ErrorTranslationStage, IdempotencyStage, Pipeline, TracingStage, TransactionStage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Every domain error code the catalog can raise.
///
/// Each must have exactly one entry in [`catalog_mappings`].
pub const CATALOG_ERROR_CODES: [&str; 4] = [
    "book.not_found",
    "book.isbn_taken",
    "book.title_empty",
    "book.edition_closed",
];

/// Builds the startup error-mapping table for the catalog.
///
/// # Errors
///
/// [`MappingError::DuplicateCode`] if a code is registered twice.
pub fn catalog_mappings() -> Result<ErrorMappings, MappingError> {
    ErrorMappings::builder()
        .map("book.not_found", ErrorCategory::NotFound, None)
        .map("book.isbn_taken", ErrorCategory::AlreadyExists, Some("isbn"))
        .map("book.title_empty", ErrorCategory::BusinessRule, Some("title"))
        .map("book.edition_closed", ErrorCategory::BusinessRule, None)
        .build()
}

/// A catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Stable identifier, assigned at creation.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Unique ISBN.
    pub isbn: String,
    /// A closed edition no longer accepts changes.
    pub edition_closed: bool,
}

/// In-memory book storage keyed by id, with a unique-isbn rule.
#[derive(Debug, Clone, Default)]
pub struct BookRepository {
    books: Arc<DashMap<Uuid, Book>>,
}

impl BookRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a book up by id.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Book> {
        self.books.get(&id).map(|entry| entry.clone())
    }

    /// Inserts a new book.
    ///
    /// # Errors
    ///
    /// `book.isbn_taken` when another book already carries the ISBN.
    pub fn insert(&self, title: String, isbn: String) -> Result<Book, DomainError> {
        if self.books.iter().any(|entry| entry.isbn == isbn) {
            return Err(DomainError::new(
                "book.isbn_taken",
                format!("isbn '{isbn}' is already registered"),
            ));
        }
        let book = Book {
            id: Uuid::now_v7(),
            title,
            isbn,
            edition_closed: false,
        };
        self.books.insert(book.id, book.clone());
        Ok(book)
    }

    /// Retitles an existing, open book.
    ///
    /// # Errors
    ///
    /// `book.not_found` for an unknown id, `book.edition_closed` when
    /// the edition no longer accepts changes.
    pub fn retitle(&self, id: Uuid, title: String) -> Result<Book, DomainError> {
        let mut entry = self.books.get_mut(&id).ok_or_else(|| {
            DomainError::new("book.not_found", format!("no book with id {id}"))
        })?;
        if entry.edition_closed {
            return Err(DomainError::new(
                "book.edition_closed",
                format!("book {id} belongs to a closed edition"),
            ));
        }
        entry.title = title;
        Ok(entry.clone())
    }

    /// Removes a book.
    ///
    /// # Errors
    ///
    /// `book.not_found` for an unknown id.
    pub fn remove(&self, id: Uuid) -> Result<(), DomainError> {
        self.books
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::new("book.not_found", format!("no book with id {id}")))
    }

    /// Marks a book's edition as closed.
    ///
    /// # Errors
    ///
    /// `book.not_found` for an unknown id.
    pub fn close_edition(&self, id: Uuid) -> Result<(), DomainError> {
        let mut entry = self.books.get_mut(&id).ok_or_else(|| {
            DomainError::new("book.not_found", format!("no book with id {id}"))
        })?;
        entry.edition_closed = true;
        Ok(())
    }
}

/// Creates a book.
#[derive(Debug, Deserialize)]
pub struct CreateBook {
    /// Display title; must not be blank.
    pub title: String,
    /// Unique ISBN.
    pub isbn: String,
}

/// Retitles a book.
#[derive(Debug)]
pub struct UpdateBook {
    /// The book to retitle.
    pub id: Uuid,
    /// The new title; must not be blank.
    pub title: String,
}

/// Deletes a book.
#[derive(Debug)]
pub struct DeleteBook {
    /// The book to remove.
    pub id: Uuid,
}

impl Command for CreateBook {
    type Output = Book;

    fn name(&self) -> &'static str {
        "CreateBook"
    }

    fn supports_idempotency(&self) -> bool {
        true
    }
}

impl Command for UpdateBook {
    type Output = Book;

    fn name(&self) -> &'static str {
        "UpdateBook"
    }

    fn supports_idempotency(&self) -> bool {
        true
    }
}

impl Command for DeleteBook {
    type Output = NoContent;

    fn name(&self) -> &'static str {
        "DeleteBook"
    }

    fn supports_idempotency(&self) -> bool {
        true
    }
}

fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::new("book.title_empty", "title must not be empty"));
    }
    Ok(())
}

/// Handles [`CreateBook`].
pub struct CreateBookHandler {
    repo: BookRepository,
}

impl CommandHandler<CreateBook> for CreateBookHandler {
    async fn handle(
        &self,
        _ctx: &ExecutionContext,
        command: CreateBook,
    ) -> Result<Book, DomainError> {
        validate_title(&command.title)?;
        self.repo.insert(command.title, command.isbn)
    }
}

/// Handles [`UpdateBook`].
pub struct UpdateBookHandler {
    repo: BookRepository,
}

impl CommandHandler<UpdateBook> for UpdateBookHandler {
    async fn handle(
        &self,
        _ctx: &ExecutionContext,
        command: UpdateBook,
    ) -> Result<Book, DomainError> {
        validate_title(&command.title)?;
        self.repo.retitle(command.id, command.title)
    }
}

/// Handles [`DeleteBook`].
pub struct DeleteBookHandler {
    repo: BookRepository,
}

impl CommandHandler<DeleteBook> for DeleteBookHandler {
    async fn handle(
        &self,
        _ctx: &ExecutionContext,
        command: DeleteBook,
    ) -> Result<NoContent, DomainError> {
        self.repo.remove(command.id)?;
        Ok(NoContent {})
    }
}

/// The wired catalog: one repository, one pipeline per command.
///
/// Mutations run the full default stack; reads go straight to the
/// repository.
pub struct CatalogApp {
    repo: BookRepository,
    create_pipeline: Pipeline<CreateBook>,
    update_pipeline: Pipeline<UpdateBook>,
    delete_pipeline: Pipeline<DeleteBook>,
    create_handler: CreateBookHandler,
    update_handler: UpdateBookHandler,
    delete_handler: DeleteBookHandler,
}

impl CatalogApp {
    /// Wires the catalog over a guard service.
    ///
    /// # Errors
    ///
    /// [`MappingError`] when the mapping table is inconsistent.
    pub fn new(guard: Arc<IdempotencyService>) -> Result<Self, MappingError> {
        let repo = BookRepository::new();
        let mappings = Arc::new(catalog_mappings()?);

        fn stack<C: Command>(
            mappings: &Arc<ErrorMappings>,
            guard: &Arc<IdempotencyService>,
            success_status: u16,
        ) -> Pipeline<C> {
            Pipeline::new()
                .pipe(TracingStage::new())
                .pipe(ErrorTranslationStage::new(mappings.clone()))
                .pipe(IdempotencyStage::new(guard.clone()).with_success_status(success_status))
                .pipe(TransactionStage::new(Arc::new(NoopUnitOfWork)))
        }

        Ok(Self {
            create_pipeline: stack(&mappings, &guard, 201),
            update_pipeline: stack(&mappings, &guard, 200),
            delete_pipeline: stack(&mappings, &guard, 204),
            create_handler: CreateBookHandler { repo: repo.clone() },
            update_handler: UpdateBookHandler { repo: repo.clone() },
            delete_handler: DeleteBookHandler { repo: repo.clone() },
            repo,
        })
    }

    /// The underlying repository.
    #[must_use]
    pub fn repo(&self) -> &BookRepository {
        &self.repo
    }

    /// Runs `CreateBook` through the full pipeline.
    pub async fn create(
        &self,
        ctx: &mut ExecutionContext,
        command: CreateBook,
    ) -> CommandResult<Book> {
        self.create_pipeline
            .execute(ctx, command, &self.create_handler)
            .await
    }

    /// Runs `UpdateBook` through the full pipeline.
    pub async fn update(
        &self,
        ctx: &mut ExecutionContext,
        command: UpdateBook,
    ) -> CommandResult<Book> {
        self.update_pipeline
            .execute(ctx, command, &self.update_handler)
            .await
    }

    /// Runs `DeleteBook` through the full pipeline.
    pub async fn delete(
        &self,
        ctx: &mut ExecutionContext,
        command: DeleteBook,
    ) -> CommandResult<NoContent> {
        self.delete_pipeline
            .execute(ctx, command, &self.delete_handler)
            .await
    }
}

impl std::fmt::Debug for CatalogApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogApp")
            .field("stages", &self.create_pipeline.stage_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{CommandError, ErrorCategory};
    use folio_guard::IdempotencyConfig;
    use folio_store::MemoryStore;

    fn app() -> CatalogApp {
        let guard = Arc::new(IdempotencyService::new(
            Arc::new(MemoryStore::new()),
            IdempotencyConfig::default(),
        ));
        CatalogApp::new(guard).expect("valid mappings")
    }

    fn assert_category(err: &CommandError, code: &str, category: ErrorCategory) {
        match err {
            CommandError::Application(app) => {
                assert_eq!(app.code(), code);
                assert_eq!(app.category(), category);
            }
            other => panic!("expected an application error, got {other:?}"),
        }
    }

    #[test]
    fn test_every_catalog_code_is_mapped_exactly_once() {
        let mappings = catalog_mappings().expect("table builds");
        assert_eq!(mappings.len(), CATALOG_ERROR_CODES.len());
        for code in CATALOG_ERROR_CODES {
            assert!(mappings.contains(code), "unmapped catalog code: {code}");
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let app = app();
        let mut ctx = ExecutionContext::new();

        let book = app
            .create(
                &mut ctx,
                CreateBook {
                    title: "The Personal MBA".to_string(),
                    isbn: "978-1591845577".to_string(),
                },
            )
            .await
            .unwrap();

        let found = app.repo().get(book.id).expect("book persisted");
        assert_eq!(found.title, "The Personal MBA");
        assert!(!found.edition_closed);
    }

    #[tokio::test]
    async fn test_duplicate_isbn_maps_to_already_exists() {
        let app = app();
        let mut ctx = ExecutionContext::new();

        app.create(
            &mut ctx,
            CreateBook {
                title: "First".to_string(),
                isbn: "978-0000000001".to_string(),
            },
        )
        .await
        .unwrap();

        let mut ctx = ExecutionContext::new();
        let err = app
            .create(
                &mut ctx,
                CreateBook {
                    title: "Second".to_string(),
                    isbn: "978-0000000001".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert_category(&err, "book.isbn_taken", ErrorCategory::AlreadyExists);
        if let CommandError::Application(app_err) = &err {
            assert_eq!(app_err.field(), Some("isbn"));
        }
    }

    #[tokio::test]
    async fn test_empty_title_maps_to_business_rule() {
        let app = app();
        let mut ctx = ExecutionContext::new();

        let err = app
            .create(
                &mut ctx,
                CreateBook {
                    title: "   ".to_string(),
                    isbn: "978-0000000002".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert_category(&err, "book.title_empty", ErrorCategory::BusinessRule);
    }

    #[tokio::test]
    async fn test_update_unknown_book_maps_to_not_found() {
        let app = app();
        let mut ctx = ExecutionContext::new();

        let err = app
            .update(
                &mut ctx,
                UpdateBook {
                    id: Uuid::now_v7(),
                    title: "New Title".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert_category(&err, "book.not_found", ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn test_closed_edition_rejects_update() {
        let app = app();
        let mut ctx = ExecutionContext::new();

        let book = app
            .create(
                &mut ctx,
                CreateBook {
                    title: "Frozen".to_string(),
                    isbn: "978-0000000003".to_string(),
                },
            )
            .await
            .unwrap();
        app.repo().close_edition(book.id).unwrap();

        let mut ctx = ExecutionContext::new();
        let err = app
            .update(
                &mut ctx,
                UpdateBook {
                    id: book.id,
                    title: "Thawed".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert_category(&err, "book.edition_closed", ErrorCategory::BusinessRule);
    }

    #[tokio::test]
    async fn test_delete_removes_the_book() {
        let app = app();
        let mut ctx = ExecutionContext::new();

        let book = app
            .create(
                &mut ctx,
                CreateBook {
                    title: "Ephemeral".to_string(),
                    isbn: "978-0000000004".to_string(),
                },
            )
            .await
            .unwrap();

        let mut ctx = ExecutionContext::new();
        app.delete(&mut ctx, DeleteBook { id: book.id }).await.unwrap();
        assert!(app.repo().get(book.id).is_none());
    }

    #[tokio::test]
    async fn test_idempotent_create_returns_the_same_book() {
        let app = app();

        let mut ctx = ExecutionContext::new().with_idempotency_key("create-1");
        let first = app
            .create(
                &mut ctx,
                CreateBook {
                    title: "Once".to_string(),
                    isbn: "978-0000000005".to_string(),
                },
            )
            .await
            .unwrap();

        let mut ctx = ExecutionContext::new().with_idempotency_key("create-1");
        let second = app
            .create(
                &mut ctx,
                CreateBook {
                    title: "Once".to_string(),
                    isbn: "978-0000000005".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id, "replay must not create a second book");
    }
}
