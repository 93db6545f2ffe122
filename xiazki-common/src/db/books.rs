//! Book persistence, including author/tag/translator/narrator relations

use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::begin_write;
use super::models::{AuthorBooks, Book, NameKind, NewBook};
use crate::isbn::{is_valid_isbn10, is_valid_isbn13, normalize_isbn};
use crate::{Error, Result};

const BOOK_COLUMNS: &str = "id, title, summary, isbn10, isbn13, language, publisher, publish_date, \
    page_count, series_name, series_number, cover_url, created_at, updated_at";

fn book_from_row(row: &SqliteRow) -> Book {
    Book {
        id: row.get("id"),
        title: row.get("title"),
        summary: row.get("summary"),
        isbn10: row.get("isbn10"),
        isbn13: row.get("isbn13"),
        language: row.get("language"),
        publisher: row.get("publisher"),
        publish_date: row.get("publish_date"),
        page_count: row.get("page_count"),
        series_name: row.get("series_name"),
        series_number: row.get("series_number"),
        cover_url: row.get("cover_url"),
        authors: Vec::new(),
        author_ids: Vec::new(),
        tags: Vec::new(),
        translators: Vec::new(),
        narrators: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Trim text fields, drop empty ones and check ISBN checksums
fn normalize_new_book(book: &NewBook) -> Result<NewBook> {
    fn text(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn names(values: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in values.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            if !out.iter().any(|existing| existing == name) {
                out.push(name.to_string());
            }
        }
        out
    }

    let title = book.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("Title is required".to_string()));
    }

    let isbn10 = text(&book.isbn10).map(|s| normalize_isbn(&s));
    if let Some(isbn) = &isbn10 {
        if !is_valid_isbn10(isbn) {
            return Err(Error::InvalidInput(format!("Invalid ISBN-10: {}", isbn)));
        }
    }
    let isbn13 = text(&book.isbn13).map(|s| normalize_isbn(&s));
    if let Some(isbn) = &isbn13 {
        if !is_valid_isbn13(isbn) {
            return Err(Error::InvalidInput(format!("Invalid ISBN-13: {}", isbn)));
        }
    }

    if book.page_count.is_some_and(|n| n < 0) {
        return Err(Error::InvalidInput("Page count cannot be negative".to_string()));
    }
    if book.series_number.is_some_and(|n| n < 0) {
        return Err(Error::InvalidInput("Series number cannot be negative".to_string()));
    }

    Ok(NewBook {
        title: title.to_string(),
        summary: text(&book.summary),
        isbn10,
        isbn13,
        language: text(&book.language),
        publisher: text(&book.publisher),
        publish_date: book.publish_date,
        page_count: book.page_count,
        series_name: text(&book.series_name),
        series_number: book.series_number,
        cover_url: text(&book.cover_url),
        authors: names(&book.authors),
        tags: names(&book.tags),
        translators: names(&book.translators),
        narrators: names(&book.narrators),
    })
}

/// Link `names` to a book, creating missing name rows
async fn insert_names(
    conn: &mut SqliteConnection,
    book_id: i64,
    kind: NameKind,
    names: &[String],
) -> Result<()> {
    let insert_name = format!(
        "INSERT INTO {} (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
        kind.table()
    );
    let select_id = format!("SELECT id FROM {} WHERE name = ?", kind.table());
    let insert_link = format!(
        "INSERT INTO {} (book_id, {}, position) VALUES (?, ?, ?)",
        kind.link_table(),
        kind.link_column()
    );

    for (position, name) in names.iter().enumerate() {
        sqlx::query(&insert_name).bind(name).execute(&mut *conn).await?;

        let name_id: i64 = sqlx::query_scalar(&select_id)
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;

        sqlx::query(&insert_link)
            .bind(book_id)
            .bind(name_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn replace_names(
    conn: &mut SqliteConnection,
    book_id: i64,
    kind: NameKind,
    names: &[String],
) -> Result<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE book_id = ?", kind.link_table()))
        .bind(book_id)
        .execute(&mut *conn)
        .await?;

    insert_names(conn, book_id, kind, names).await
}

/// `(name id, name)` pairs of one kind for a set of books, keyed by book
/// id, in link order
async fn load_names(
    pool: &SqlitePool,
    kind: NameKind,
    book_id: Option<i64>,
) -> Result<HashMap<i64, Vec<(i64, String)>>> {
    let filter = if book_id.is_some() { "WHERE l.book_id = ?" } else { "" };
    let sql = format!(
        "SELECT l.book_id, n.id, n.name FROM {link} l JOIN {table} n ON n.id = l.{column} {filter} \
         ORDER BY l.book_id, l.position",
        link = kind.link_table(),
        table = kind.table(),
        column = kind.link_column(),
    );

    let mut query = sqlx::query_as::<_, (i64, i64, String)>(&sql);
    if let Some(id) = book_id {
        query = query.bind(id);
    }

    let mut grouped: HashMap<i64, Vec<(i64, String)>> = HashMap::new();
    for (book, name_id, name) in query.fetch_all(pool).await? {
        grouped.entry(book).or_default().push((name_id, name));
    }
    Ok(grouped)
}

/// Fill in the name lists of already loaded books
async fn attach_names(pool: &SqlitePool, books: &mut [Book]) -> Result<()> {
    if books.is_empty() {
        return Ok(());
    }

    // One book: filter in SQL; several: load everything once
    let single = match &*books {
        [book] => Some(book.id),
        _ => None,
    };

    for kind in NameKind::ALL {
        let mut names = load_names(pool, kind, single).await?;
        for book in books.iter_mut() {
            book.set_names(kind, names.remove(&book.id).unwrap_or_default());
        }
    }
    Ok(())
}

/// Insert a book with its name relations in one transaction
pub async fn insert_book(pool: &SqlitePool, book: &NewBook) -> Result<Book> {
    let book = normalize_new_book(book)?;
    let mut tx = begin_write(pool).await?;

    let book_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO books (
            title, summary, isbn10, isbn13, language, publisher, publish_date,
            page_count, series_name, series_number, cover_url
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&book.title)
    .bind(&book.summary)
    .bind(&book.isbn10)
    .bind(&book.isbn13)
    .bind(&book.language)
    .bind(&book.publisher)
    .bind(book.publish_date)
    .bind(book.page_count)
    .bind(&book.series_name)
    .bind(book.series_number)
    .bind(&book.cover_url)
    .fetch_one(&mut *tx)
    .await?;

    for kind in NameKind::ALL {
        insert_names(&mut *tx, book_id, kind, book.names(kind)).await?;
    }

    tx.commit().await?;

    info!(book_id, title = %book.title, "Added book");
    get_book(pool, book_id).await
}

/// Replace a book's fields and all of its name relations
pub async fn update_book(pool: &SqlitePool, book_id: i64, book: &NewBook) -> Result<Book> {
    let book = normalize_new_book(book)?;
    let mut tx = begin_write(pool).await?;

    let updated = sqlx::query(
        r#"
        UPDATE books SET
            title = ?, summary = ?, isbn10 = ?, isbn13 = ?, language = ?, publisher = ?,
            publish_date = ?, page_count = ?, series_name = ?, series_number = ?, cover_url = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&book.title)
    .bind(&book.summary)
    .bind(&book.isbn10)
    .bind(&book.isbn13)
    .bind(&book.language)
    .bind(&book.publisher)
    .bind(book.publish_date)
    .bind(book.page_count)
    .bind(&book.series_name)
    .bind(book.series_number)
    .bind(&book.cover_url)
    .bind(book_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound(format!("Book {}", book_id)));
    }

    for kind in NameKind::ALL {
        replace_names(&mut *tx, book_id, kind, book.names(kind)).await?;
    }

    tx.commit().await?;

    info!(book_id, title = %book.title, "Updated book");
    get_book(pool, book_id).await
}

/// Book with all of its name relations
pub async fn get_book(pool: &SqlitePool, book_id: i64) -> Result<Book> {
    let row = sqlx::query(&format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS))
        .bind(book_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Book {}", book_id)))?;

    let mut books = [book_from_row(&row)];
    attach_names(pool, &mut books).await?;

    let [book] = books;
    Ok(book)
}

/// All books, newest first
pub async fn list_books(pool: &SqlitePool) -> Result<Vec<Book>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM books ORDER BY created_at DESC, id DESC",
        BOOK_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    let mut books: Vec<Book> = rows.iter().map(book_from_row).collect();
    attach_names(pool, &mut books).await?;

    debug!(count = books.len(), "Listed books");
    Ok(books)
}

/// An author and their books, newest first
pub async fn list_books_by_author(pool: &SqlitePool, author_id: i64) -> Result<AuthorBooks> {
    let name: String = sqlx::query_scalar("SELECT name FROM authors WHERE id = ?")
        .bind(author_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Author {}", author_id)))?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM books \
         WHERE id IN (SELECT book_id FROM book_authors WHERE author_id = ?) \
         ORDER BY created_at DESC, id DESC",
        BOOK_COLUMNS
    ))
    .bind(author_id)
    .fetch_all(pool)
    .await?;

    let mut books: Vec<Book> = rows.iter().map(book_from_row).collect();
    attach_names(pool, &mut books).await?;

    debug!(author_id, count = books.len(), "Listed books by author");
    Ok(AuthorBooks { id: author_id, name, books })
}

/// Delete a book; links, events and reviews cascade
pub async fn delete_book(pool: &SqlitePool, book_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM books WHERE id = ?")
        .bind(book_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Book {}", book_id)));
    }

    info!(book_id, "Deleted book");
    Ok(())
}
