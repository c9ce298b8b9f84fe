//! Books repository for database operations

use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List books, optionally filtered by a case-insensitive title keyword
    pub async fn list(&self, keyword: Option<&str>) -> AppResult<Vec<Book>> {
        let books = match keyword.map(str::trim).filter(|k| !k.is_empty()) {
            Some(keyword) => {
                sqlx::query_as::<_, Book>(
                    "SELECT * FROM books WHERE title ILIKE $1 ORDER BY title",
                )
                .bind(format!("%{}%", keyword))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(books)
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Check if an ISBN is already catalogued
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::INTEGER IS NULL OR id != $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert a new book; every copy starts on the shelf
    pub async fn create(&self, book: &CreateBook, replacement_cost: Decimal) -> AppResult<Book> {
        let quantity = book.total_quantity.unwrap_or(1);
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, category, description, cover_image,
                               total_quantity, available_quantity, shelf_location, replacement_cost)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.category)
        .bind(&book.description)
        .bind(&book.cover_image)
        .bind(quantity)
        .bind(&book.shelf_location)
        .bind(replacement_cost)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Write back every editable column of a book
    pub async fn update(&self, book: &Book) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = $2, author = $3, isbn = $4, category = $5, description = $6,
                cover_image = $7, total_quantity = $8, available_quantity = $9,
                shelf_location = $10, replacement_cost = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.category)
        .bind(&book.description)
        .bind(&book.cover_image)
        .bind(book.total_quantity)
        .bind(book.available_quantity)
        .bind(&book.shelf_location)
        .bind(book.replacement_cost)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book.id)))
    }

    /// Whether any rental references the book
    pub async fn has_transactions(&self, id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM transactions WHERE book_id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Delete a book
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    /// Take one copy off the shelf. Returns false when none is available.
    pub async fn take_copy(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books SET available_quantity = available_quantity - 1, updated_at = NOW()
            WHERE id = $1 AND available_quantity > 0
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Put one copy back on the shelf
    pub async fn return_copy(&self, id: i32) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books SET available_quantity = LEAST(available_quantity + 1, total_quantity),
                             updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Count catalogued titles
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
