//! Book inventory service

use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    fines::LibraryPolicy,
    models::book::{Book, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
    policy: LibraryPolicy,
}

impl BooksService {
    pub fn new(repository: Repository, policy: LibraryPolicy) -> Self {
        Self { repository, policy }
    }

    pub async fn list_books(&self, keyword: Option<&str>) -> AppResult<Vec<Book>> {
        self.repository.books.list(keyword).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Add a title to the catalog
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        if self.repository.books.isbn_exists(&book.isbn, None).await? {
            return Err(AppError::Conflict(format!("ISBN {} already exists", book.isbn)));
        }

        let replacement_cost = book
            .replacement_cost
            .unwrap_or(self.policy.default_replacement_cost);
        if replacement_cost < Decimal::ZERO {
            return Err(AppError::Validation(
                "Replacement cost cannot be negative".to_string(),
            ));
        }

        let created = self.repository.books.create(&book, replacement_cost).await?;
        tracing::info!(book_id = created.id, "Book created");
        Ok(created)
    }

    /// Update a book. A new total shifts the available count by the same amount.
    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        let current = self.repository.books.get_by_id(id).await?;

        if let Some(ref isbn) = update.isbn {
            if isbn != &current.isbn && self.repository.books.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict(format!("ISBN {} already exists", isbn)));
            }
        }

        let merged = apply_update(current, update)?;
        self.repository.books.update(&merged).await
    }

    /// Delete a book that was never rented
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.get_by_id(id).await?;
        if self.repository.books.has_transactions(id).await? {
            return Err(AppError::Conflict(
                "Book has rental history and cannot be deleted".to_string(),
            ));
        }
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}

fn apply_update(mut book: Book, update: UpdateBook) -> AppResult<Book> {
    if let Some(total) = update.total_quantity {
        let available = book.available_quantity + (total - book.total_quantity);
        if available < 0 {
            return Err(AppError::BusinessRule(format!(
                "{} copies are rented out, total cannot go below that",
                book.total_quantity - book.available_quantity
            )));
        }
        book.total_quantity = total;
        book.available_quantity = available;
    }
    if let Some(cost) = update.replacement_cost {
        if cost < Decimal::ZERO {
            return Err(AppError::Validation(
                "Replacement cost cannot be negative".to_string(),
            ));
        }
        book.replacement_cost = cost;
    }

    if let Some(title) = update.title {
        book.title = title;
    }
    if let Some(author) = update.author {
        book.author = author;
    }
    if let Some(isbn) = update.isbn {
        book.isbn = isbn;
    }
    if let Some(category) = update.category {
        book.category = category;
    }
    if update.description.is_some() {
        book.description = update.description;
    }
    if update.cover_image.is_some() {
        book.cover_image = update.cover_image;
    }
    if update.shelf_location.is_some() {
        book.shelf_location = update.shelf_location;
    }
    Ok(book)
}
