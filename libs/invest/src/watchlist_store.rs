use std::str::FromStr;

use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::errors::InvestError;

/// A user's saved (ticker, figi) pair, optionally grouped under a portfolio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Favorite {
    pub id: i64,
    pub ticker: String,
    pub figi: String,
    pub portfolio_id: Option<i64>,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        username TEXT UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS portfolios (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id)
    )",
    "CREATE TABLE IF NOT EXISTS favourites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        portfolio_id INTEGER,
        ticker TEXT NOT NULL,
        figi TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id),
        FOREIGN KEY (portfolio_id) REFERENCES portfolios (id)
    )",
];

#[derive(Clone)]
pub struct WatchlistStore {
    pool: SqlitePool,
}

impl WatchlistStore {
    /// Opens (or creates) the database and makes sure the schema exists.
    pub async fn connect(url: &str) -> Result<Self, InvestError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // sqlite allows a single writer; one pooled connection keeps every
        // call its own serialized transaction without SQLITE_BUSY errors.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Upserts the user row, then records the favorite. Duplicate tickers per
    /// user are allowed; each call inserts a fresh row.
    pub async fn add_favorite(
        &self,
        user_id: i64,
        username: Option<&str>,
        ticker: &str,
        figi: &str,
    ) -> Result<(), InvestError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (id, username) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING")
            .bind(user_id)
            .bind(username)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO favourites (user_id, ticker, figi) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(ticker)
            .bind(figi)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes the first favorite matching (user, ticker). Returns whether a
    /// row was removed; duplicates lose exactly one row per call.
    pub async fn remove_favorite(&self, user_id: i64, ticker: &str) -> Result<bool, InvestError> {
        let result = sqlx::query(
            "DELETE FROM favourites WHERE id = (
                SELECT id FROM favourites
                WHERE user_id = ?1 AND ticker = ?2
                ORDER BY id LIMIT 1
            )",
        )
        .bind(user_id)
        .bind(ticker)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_favorites(&self, user_id: i64) -> Result<Vec<Favorite>, InvestError> {
        let rows = sqlx::query(
            "SELECT id, ticker, figi, portfolio_id FROM favourites WHERE user_id = ?1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut favorites = Vec::with_capacity(rows.len());
        for row in rows {
            favorites.push(Favorite {
                id: row.try_get("id")?,
                ticker: row.try_get("ticker")?,
                figi: row.try_get("figi")?,
                portfolio_id: row.try_get("portfolio_id")?,
            });
        }

        Ok(favorites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> WatchlistStore {
        WatchlistStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn connect_is_idempotent_on_existing_schema() {
        let s = store().await;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&s.pool).await.unwrap();
        }
    }

    #[tokio::test]
    async fn add_then_list_returns_the_favorite() {
        let s = store().await;
        s.add_favorite(1, Some("alice"), "SBER", "BBG004730N88")
            .await
            .unwrap();

        let favorites = s.list_favorites(1).await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].ticker, "SBER");
        assert_eq!(favorites[0].figi, "BBG004730N88");
        assert_eq!(favorites[0].portfolio_id, None);
    }

    #[tokio::test]
    async fn duplicate_tickers_are_allowed() {
        let s = store().await;
        s.add_favorite(1, None, "SBER", "BBG004730N88").await.unwrap();
        s.add_favorite(1, None, "SBER", "BBG004730N88").await.unwrap();

        assert_eq!(s.list_favorites(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn remove_deletes_exactly_one_duplicate() {
        let s = store().await;
        s.add_favorite(1, None, "SBER", "BBG004730N88").await.unwrap();
        s.add_favorite(1, None, "SBER", "BBG004730N88").await.unwrap();

        assert!(s.remove_favorite(1, "SBER").await.unwrap());
        assert_eq!(s.list_favorites(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_without_match_reports_not_found() {
        let s = store().await;
        s.add_favorite(1, None, "YNDX", "BBG006L8G4H1").await.unwrap();

        assert!(!s.remove_favorite(1, "SBER").await.unwrap());
        assert_eq!(s.list_favorites(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn favorites_are_scoped_per_user() {
        let s = store().await;
        s.add_favorite(1, Some("alice"), "SBER", "BBG004730N88")
            .await
            .unwrap();
        s.add_favorite(2, Some("bob"), "YNDX", "BBG006L8G4H1")
            .await
            .unwrap();

        assert!(!s.remove_favorite(2, "SBER").await.unwrap());
        assert_eq!(s.list_favorites(1).await.unwrap().len(), 1);
        assert_eq!(s.list_favorites(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn user_upsert_tolerates_repeat_adds() {
        let s = store().await;
        s.add_favorite(1, Some("alice"), "SBER", "BBG004730N88")
            .await
            .unwrap();
        // Handle changed since the first insert; the stored row is kept as-is.
        s.add_favorite(1, Some("alice_new"), "YNDX", "BBG006L8G4H1")
            .await
            .unwrap();

        assert_eq!(s.list_favorites(1).await.unwrap().len(), 2);
    }
}
